//! Error codes for runtime conditions.
//!
//! Format: a letter and four digits.
//! - W1xxx: advisories (a best-effort value was still produced)
//! - E2xxx: structural failures of a single operation
//! - E9xxx: fatal to the runtime instance

use std::fmt;

/// Stable identifier for every condition the runtime reports.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Advisories (W1xxx)
    /// String used as a number was not fully numeric
    W1001,
    /// Undefined value used where a defined one was expected
    W1002,
    /// Lexical name declared twice in the same scope
    W1003,
    /// Parent list names a package that does not exist
    W1004,
    /// Method replaced an existing definition
    W1005,

    // Structural failures (E2xxx)
    /// Coercion between incompatible value kinds
    E2001,
    /// Write to a read-only cell
    E2002,
    /// Structural mutation of a restricted table
    E2003,
    /// Cycle in the inheritance graph
    E2004,
    /// C3 merge could not produce a consistent order
    E2005,
    /// Activation handle no longer refers to a live activation
    E2006,

    // Fatal (E9xxx)
    /// Allocator exhaustion
    E9001,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::W1001,
        ErrorCode::W1002,
        ErrorCode::W1003,
        ErrorCode::W1004,
        ErrorCode::W1005,
        ErrorCode::E2001,
        ErrorCode::E2002,
        ErrorCode::E2003,
        ErrorCode::E2004,
        ErrorCode::E2005,
        ErrorCode::E2006,
        ErrorCode::E9001,
    ];

    /// The code as printed, e.g. `"W1001"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::W1001 => "W1001",
            ErrorCode::W1002 => "W1002",
            ErrorCode::W1003 => "W1003",
            ErrorCode::W1004 => "W1004",
            ErrorCode::W1005 => "W1005",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// One-line explanation for `--explain`-style lookups.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::W1001 => "argument isn't numeric",
            ErrorCode::W1002 => "use of uninitialized value",
            ErrorCode::W1003 => "variable masks earlier declaration in same scope",
            ErrorCode::W1004 => "can't locate package named in parent list",
            ErrorCode::W1005 => "subroutine redefined",
            ErrorCode::E2001 => "value kind mismatch",
            ErrorCode::E2002 => "modification of a read-only value attempted",
            ErrorCode::E2003 => "attempt to access disallowed key in a restricted hash",
            ErrorCode::E2004 => "recursive inheritance detected",
            ErrorCode::E2005 => "inconsistent hierarchy during C3 merge",
            ErrorCode::E2006 => "activation is no longer live",
            ErrorCode::E9001 => "out of memory",
        }
    }

    /// Advisory codes never abort the operation that reported them.
    pub fn is_advisory(&self) -> bool {
        self.as_str().starts_with('W')
    }

    /// Fatal codes terminate the runtime instance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a code string like `"W1001"`. Case-insensitive.
pub fn parse_error_code(s: &str) -> Option<ErrorCode> {
    ErrorCode::ALL
        .iter()
        .copied()
        .find(|code| code.as_str().eq_ignore_ascii_case(s))
}
