//! Metadata of one pad slot.

use std::fmt;

use bitflags::bitflags;
use opal_hash::{HashKey, HashTable};
use opal_value::{Sv, UnitId};

/// Index of a slot in a pad.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Slot(pub u32);

impl Slot {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of variable a name declares.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Sigil {
    Scalar,
    Array,
    Hash,
    Code,
}

impl Sigil {
    pub fn as_char(self) -> char {
        match self {
            Sigil::Scalar => '$',
            Sigil::Array => '@',
            Sigil::Hash => '%',
            Sigil::Code => '&',
        }
    }

    pub fn from_char(c: char) -> Option<Sigil> {
        match c {
            '$' => Some(Sigil::Scalar),
            '@' => Some(Sigil::Array),
            '%' => Some(Sigil::Hash),
            '&' => Some(Sigil::Code),
            _ => None,
        }
    }

    /// A fresh, empty cell of the right kind.
    pub fn fresh_cell(self) -> Sv {
        match self {
            Sigil::Scalar | Sigil::Code => Sv::undef(),
            Sigil::Array => Sv::array(Vec::new()),
            Sigil::Hash => Sv::hash(HashTable::new()),
        }
    }
}

/// How a name was declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Declarator {
    My,
    /// Alias for a package variable of the given package.
    Our(HashKey),
    /// Keeps its value across calls.
    State,
}

impl Declarator {
    pub fn keyword(&self) -> &'static str {
        match self {
            Declarator::My => "my",
            Declarator::Our(_) => "our",
            Declarator::State => "state",
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct PadNameFlags: u8 {
        const OUR = 1 << 0;
        const STATE = 1 << 1;
        /// Alias for a variable of an enclosing unit.
        const OUTER = 1 << 2;
        /// Holds a closure prototype, cloned along with the pad.
        const CLOSURE = 1 << 3;
    }
}

/// A named pad slot.
///
/// A name is visible to a lookup at sequence `s` when
/// `min_seq < s <= max_seq`. It has no `min_seq` until it is introduced,
/// and no `max_seq` while its scope is open. Captured names are always
/// visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PadName {
    pub(crate) name: HashKey,
    pub(crate) sigil: Sigil,
    pub(crate) flags: PadNameFlags,
    pub(crate) min_seq: Option<u32>,
    pub(crate) max_seq: Option<u32>,
    /// Slot in the enclosing unit this name aliases.
    pub(crate) outer_slot: Option<Slot>,
    /// Package of an `our` name.
    pub(crate) package: Option<HashKey>,
    pub(crate) type_name: Option<HashKey>,
    /// Unit of a closure prototype slot.
    pub(crate) nested: Option<UnitId>,
}

impl PadName {
    pub(crate) fn new(name: HashKey, sigil: Sigil, declarator: Declarator) -> Self {
        let (flags, package) = match declarator {
            Declarator::My => (PadNameFlags::empty(), None),
            Declarator::Our(package) => (PadNameFlags::OUR, Some(package)),
            Declarator::State => (PadNameFlags::STATE, None),
        };
        PadName {
            name,
            sigil,
            flags,
            min_seq: None,
            max_seq: None,
            outer_slot: None,
            package,
            type_name: None,
            nested: None,
        }
    }

    pub(crate) fn captured(template: &PadName, outer_slot: Slot) -> Self {
        PadName {
            name: template.name.clone(),
            sigil: template.sigil,
            flags: (template.flags & !PadNameFlags::CLOSURE) | PadNameFlags::OUTER,
            min_seq: None,
            max_seq: None,
            outer_slot: Some(outer_slot),
            package: template.package.clone(),
            type_name: template.type_name.clone(),
            nested: None,
        }
    }

    pub fn name(&self) -> &HashKey {
        &self.name
    }

    pub fn sigil(&self) -> Sigil {
        self.sigil
    }

    pub fn flags(&self) -> PadNameFlags {
        self.flags
    }

    pub fn min_seq(&self) -> Option<u32> {
        self.min_seq
    }

    pub fn max_seq(&self) -> Option<u32> {
        self.max_seq
    }

    pub fn outer_slot(&self) -> Option<Slot> {
        self.outer_slot
    }

    pub fn package(&self) -> Option<&HashKey> {
        self.package.as_ref()
    }

    pub fn type_name(&self) -> Option<&HashKey> {
        self.type_name.as_ref()
    }

    pub fn nested(&self) -> Option<UnitId> {
        self.nested
    }

    pub fn is_captured(&self) -> bool {
        self.flags.contains(PadNameFlags::OUTER)
    }

    pub fn is_our(&self) -> bool {
        self.flags.contains(PadNameFlags::OUR)
    }

    pub fn is_state(&self) -> bool {
        self.flags.contains(PadNameFlags::STATE)
    }

    /// Declared but not yet introduced.
    pub fn is_pending(&self) -> bool {
        !self.is_captured() && self.min_seq.is_none()
    }

    /// Scope still open.
    pub fn is_open(&self) -> bool {
        self.max_seq.is_none()
    }

    pub fn visible_at(&self, seq: u32) -> bool {
        if self.is_captured() {
            return true;
        }
        match self.min_seq {
            Some(min) => min < seq && self.max_seq.map_or(true, |max| seq <= max),
            None => false,
        }
    }

    pub(crate) fn matches(&self, name: &HashKey, sigil: Sigil) -> bool {
        self.sigil == sigil && self.name == *name
    }

    /// Cell a new activation gets for this slot when nothing is shared.
    pub(crate) fn fresh_cell(&self) -> Sv {
        self.sigil.fresh_cell()
    }
}

impl fmt::Display for PadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sigil.as_char(), self.name.to_text())
    }
}

#[cfg(test)]
mod tests;
