//! Advisory conditions.

use std::fmt;

use crate::ErrorCode;

/// Identifies the place in a compiled program that triggered a condition.
///
/// Opaque to the runtime: the compiler hands out one per operation that can
/// coerce or read values, and de-duplication is keyed on it so each site
/// reports a given condition at most once.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct Site(pub u32);

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site #{}", self.0)
    }
}

/// The kind of an advisory condition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AdvisoryKind {
    /// A string coerced to a number had non-numeric content.
    NotNumeric,
    /// An undefined value was read as a defined one.
    Uninitialized,
    /// A lexical name was declared twice in one scope.
    DuplicateDeclaration,
    /// A parent list names a package that does not exist.
    MissingPackage,
    /// A method definition replaced an existing one.
    Redefined,
}

impl AdvisoryKind {
    /// The error code for this kind.
    pub fn code(self) -> ErrorCode {
        match self {
            AdvisoryKind::NotNumeric => ErrorCode::W1001,
            AdvisoryKind::Uninitialized => ErrorCode::W1002,
            AdvisoryKind::DuplicateDeclaration => ErrorCode::W1003,
            AdvisoryKind::MissingPackage => ErrorCode::W1004,
            AdvisoryKind::Redefined => ErrorCode::W1005,
        }
    }
}

/// One reported advisory condition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    /// Originating site, when the caller supplied one.
    pub site: Option<Site>,
    pub message: String,
}

impl Advisory {
    pub fn new(kind: AdvisoryKind, message: impl Into<String>) -> Self {
        Advisory {
            kind,
            site: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn at(mut self, site: Option<Site>) -> Self {
        self.site = site;
        self
    }

    /// `Argument "<text>" isn't numeric`.
    pub fn not_numeric(text: &[u8]) -> Self {
        Advisory::new(
            AdvisoryKind::NotNumeric,
            format!("Argument \"{}\" isn't numeric", escape_for_message(text)),
        )
    }

    /// `Use of uninitialized value in <context>`.
    pub fn uninitialized(context: &str) -> Self {
        Advisory::new(
            AdvisoryKind::Uninitialized,
            format!("Use of uninitialized value in {context}"),
        )
    }

    /// `"my" variable <name> masks earlier declaration in same scope`.
    pub fn duplicate_declaration(declarator: &str, name: &str) -> Self {
        Advisory::new(
            AdvisoryKind::DuplicateDeclaration,
            format!("\"{declarator}\" variable {name} masks earlier declaration in same scope"),
        )
    }

    /// `Can't locate package <parent> for @<child>::ISA`.
    pub fn missing_package(parent: &str, child: &str) -> Self {
        Advisory::new(
            AdvisoryKind::MissingPackage,
            format!("Can't locate package {parent} for @{child}::ISA"),
        )
    }

    /// `Subroutine <package>::<name> redefined`.
    pub fn redefined(package: &str, name: &str) -> Self {
        Advisory::new(
            AdvisoryKind::Redefined,
            format!("Subroutine {package}::{name} redefined"),
        )
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning[{}]: {}", self.code(), self.message)?;
        if let Some(site) = self.site {
            write!(f, " at {site}")?;
        }
        Ok(())
    }
}

/// Render bytes for a message: printable ASCII as-is, the rest escaped,
/// truncated after 32 characters.
fn escape_for_message(bytes: &[u8]) -> String {
    const MAX_SHOWN: usize = 32;
    let mut out = String::with_capacity(bytes.len().min(MAX_SHOWN));
    for &byte in bytes.iter().take(MAX_SHOWN) {
        match byte {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\x{byte:02X}")),
        }
    }
    if bytes.len() > MAX_SHOWN {
        out.push_str("...");
    }
    out
}
