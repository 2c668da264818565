//! Body types and the upgrade lattice.
//!
//! Scalar body types form a chain; each can hold everything it needs plus
//! what the types below it held when upgrading preserves cached forms.
//! Aggregates sit outside the chain and are reachable only from `Undef`.
//!
//! ```text
//! Undef < Int < Float < Ref < Str < StrInt < StrNum < Magical
//! Undef -> Array | Hash | Code | Handle
//! ```

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Payload slots a body type has room for.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Caps: u8 {
        const INT = 1 << 0;
        const NUM = 1 << 1;
        const STR = 1 << 2;
        const REF = 1 << 3;
        const MAGIC = 1 << 4;
    }
}

/// Body type of a value cell.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SvType {
    Undef,
    Int,
    Float,
    Ref,
    Str,
    StrInt,
    StrNum,
    Magical,
    Array,
    Hash,
    Code,
    Handle,
}

/// Scalar body types in lattice order.
const SCALAR_CHAIN: [SvType; 8] = [
    SvType::Undef,
    SvType::Int,
    SvType::Float,
    SvType::Ref,
    SvType::Str,
    SvType::StrInt,
    SvType::StrNum,
    SvType::Magical,
];

impl SvType {
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            SvType::Array | SvType::Hash | SvType::Code | SvType::Handle
        )
    }

    /// Position in the scalar chain; aggregates rank above every scalar.
    fn rank(self) -> usize {
        SCALAR_CHAIN
            .iter()
            .position(|&ty| ty == self)
            .unwrap_or(SCALAR_CHAIN.len())
    }

    pub fn caps(self) -> Caps {
        match self {
            SvType::Undef => Caps::empty(),
            SvType::Int => Caps::INT,
            SvType::Float => Caps::INT | Caps::NUM,
            SvType::Ref => Caps::REF,
            SvType::Str => Caps::STR | Caps::REF,
            SvType::StrInt => Caps::STR | Caps::REF | Caps::INT,
            SvType::StrNum => Caps::STR | Caps::REF | Caps::INT | Caps::NUM,
            SvType::Magical => Caps::all(),
            // Aggregates carry their own payload plus a magic list.
            SvType::Array | SvType::Hash | SvType::Code | SvType::Handle => Caps::MAGIC,
        }
    }

    /// Smallest type at or above `self` with room for `need`.
    ///
    /// `None` when no such type exists: an aggregate never becomes a
    /// scalar, and a scalar never becomes an aggregate this way.
    pub fn upgrade_for(self, need: Caps) -> Option<SvType> {
        if self.caps().contains(need) {
            return Some(self);
        }
        if self.is_aggregate() {
            return None;
        }
        SCALAR_CHAIN[self.rank()..]
            .iter()
            .copied()
            .find(|ty| ty.caps().contains(need))
    }

    /// Whether a cell of type `self` may become `target`.
    pub fn can_upgrade_to(self, target: SvType) -> bool {
        if self == target {
            return true;
        }
        if target.is_aggregate() {
            return self == SvType::Undef;
        }
        !self.is_aggregate() && self.rank() <= target.rank()
    }

    /// Kind name as used in reference strings and messages.
    pub fn ref_name(self) -> &'static str {
        match self {
            SvType::Array => "ARRAY",
            SvType::Hash => "HASH",
            SvType::Code => "CODE",
            SvType::Handle => "GLOB",
            _ => "SCALAR",
        }
    }
}

impl fmt::Display for SvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SvType::Undef => "undef",
            SvType::Int => "integer",
            SvType::Float => "float",
            SvType::Ref => "reference",
            SvType::Str => "string",
            SvType::StrInt => "string/integer",
            SvType::StrNum => "string/number",
            SvType::Magical => "magical scalar",
            SvType::Array => "array",
            SvType::Hash => "hash",
            SvType::Code => "code",
            SvType::Handle => "handle",
        })
    }
}
