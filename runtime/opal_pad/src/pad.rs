//! Pads: a shared name list and one array of live cells per activation.

#![expect(
    clippy::disallowed_types,
    reason = "Rc is the implementation of PadNames"
)]

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use opal_value::{Sv, UnitId};

use crate::name::{PadName, Slot};

/// Name list of one unit, shared by every pad of that unit.
///
/// A `None` entry is a temporary slot with no name.
#[derive(Clone, Default)]
pub struct PadNames(Rc<RefCell<Vec<Option<PadName>>>>);

impl PadNames {
    pub fn new() -> Self {
        PadNames::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, slot: Slot) -> Option<PadName> {
        self.0.borrow().get(slot.index()).cloned().flatten()
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Option<PadName>>> {
        self.0.borrow()
    }

    /// Same list.
    pub fn ptr_eq(&self, other: &PadNames) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn push(&self, name: Option<PadName>) -> Slot {
        let mut names = self.0.borrow_mut();
        let slot = Slot(u32::try_from(names.len()).unwrap_or(u32::MAX));
        names.push(name);
        slot
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Vec<Option<PadName>>) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl fmt::Debug for PadNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.0.borrow();
        f.debug_list()
            .entries(names.iter().map(|name| match name {
                Some(name) => name.to_string(),
                None => "<temp>".to_string(),
            }))
            .finish()
    }
}

/// Names and values of one activation of a unit.
#[derive(Clone, Debug)]
pub struct Pad {
    unit: UnitId,
    names: PadNames,
    values: Vec<Sv>,
}

impl Pad {
    /// A pad for `unit`. A pad made for cloning starts empty and is
    /// filled slot by slot; any other pad gets a fresh cell per slot.
    pub fn new(unit: UnitId, names: PadNames, for_clone: bool) -> Self {
        let values = if for_clone {
            Vec::with_capacity(names.len())
        } else {
            names
                .borrow()
                .iter()
                .map(|name| name.as_ref().map_or_else(Sv::undef, PadName::fresh_cell))
                .collect()
        };
        Pad {
            unit,
            names,
            values,
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn names(&self) -> &PadNames {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, slot: Slot) -> Option<&Sv> {
        self.values.get(slot.index())
    }

    pub fn values(&self) -> &[Sv] {
        &self.values
    }

    pub(crate) fn push(&mut self, value: Sv) {
        self.values.push(value);
    }

    /// Put `value` in `slot`, returning what was there.
    pub(crate) fn replace(&mut self, slot: Slot, value: Sv) -> Option<Sv> {
        self.values
            .get_mut(slot.index())
            .map(|cell| std::mem::replace(cell, value))
    }
}
