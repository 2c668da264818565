//! Compile-time side of pads: declaring names, scoping them by sequence
//! number, and resolving names against enclosing units.

use opal_diagnostic::{Advisory, AdvisorySink};
use opal_hash::HashKey;
use opal_value::{RuntimeError, RuntimeResult, UnitId};
use smallvec::SmallVec;

use crate::arena::{PadArena, Unit};
use crate::name::{Declarator, PadName, PadNameFlags, Sigil, Slot};
use crate::pad::PadNames;

/// Marks the names a scope declared, for [`PadArena::leave_scope`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[must_use = "a scope must be left with its mark"]
pub struct ScopeMark {
    pub unit: UnitId,
    floor: usize,
    depth: usize,
}

impl PadArena {
    /// Open a new unit, compiled inside `outer` at the current sequence.
    pub fn new_unit(&mut self, name: Option<&str>, outer: Option<UnitId>) -> RuntimeResult<UnitId> {
        if let Some(outer) = outer {
            self.unit(outer)?;
        }
        let name = name.map(|name| self.intern(name)).transpose()?;
        let id = UnitId(u32::try_from(self.units.len()).unwrap_or(u32::MAX));
        self.units.push(Unit {
            id,
            name,
            outer,
            outer_seq: self.seq,
            names: PadNames::new(),
            scopes: Vec::new(),
            captures: false,
        });
        tracing::trace!(unit = id.0, outer = ?outer.map(|unit| unit.0), "new unit");
        Ok(id)
    }

    pub(crate) fn intern(&mut self, name: &str) -> RuntimeResult<HashKey> {
        let key = self.keys.intern_key(name)?;
        self.interned.push(key.clone());
        Ok(key)
    }

    /// Declare a name in `unit`. It is not visible until introduced.
    ///
    /// Declaring a name already open in the same scope reports a
    /// duplicate-declaration advisory; the new name masks the old one.
    pub fn add_name(
        &mut self,
        unit: UnitId,
        name: &str,
        sigil: Sigil,
        declarator: Declarator,
        sink: &dyn AdvisorySink,
    ) -> RuntimeResult<Slot> {
        let key = self.intern(name)?;
        let entry = PadName::new(key, sigil, declarator.clone());
        if self.masks_open_name(unit, &entry)? {
            sink.advise(Advisory::duplicate_declaration(
                declarator.keyword(),
                &entry.to_string(),
            ));
        }
        Ok(self.unit(unit)?.names.push(Some(entry)))
    }

    fn masks_open_name(&self, unit: UnitId, entry: &PadName) -> RuntimeResult<bool> {
        let unit = self.unit(unit)?;
        let floor = unit.scope_floor();
        let names = unit.names.borrow();
        let masks = names[floor.min(names.len())..]
            .iter()
            .flatten()
            .filter(|old| !old.is_captured() && old.is_open())
            .any(|old| {
                if !old.matches(&entry.name, entry.sigil) {
                    return false;
                }
                // An `our` only clashes with an `our` of its own package.
                match (entry.is_our(), old.is_our()) {
                    (true, true) => old.package == entry.package,
                    _ => true,
                }
            });
        Ok(masks)
    }

    /// Record a type annotation on a declared name.
    pub fn set_type_annotation(&mut self, unit: UnitId, slot: Slot, type_name: &str) -> RuntimeResult<()> {
        let key = self.intern(type_name)?;
        self.unit(unit)?.names.update(|names| {
            if let Some(Some(name)) = names.get_mut(slot.index()) {
                name.type_name = Some(key);
            }
        });
        Ok(())
    }

    /// A nameless slot for compiler temporaries.
    pub fn add_temp_slot(&mut self, unit: UnitId) -> RuntimeResult<Slot> {
        Ok(self.unit(unit)?.names.push(None))
    }

    /// A slot holding the closure prototype `nested`, cloned together
    /// with every activation of `unit`. `nested` must have been compiled
    /// directly inside `unit`.
    pub fn add_closure_slot(&mut self, unit: UnitId, nested: UnitId) -> RuntimeResult<Slot> {
        if self.unit(nested)?.outer != Some(unit) {
            return Err(RuntimeError::TypeMismatch {
                expected: "a unit compiled inside the enclosing unit",
                got: "a unit compiled elsewhere",
            });
        }
        let key = self.intern("__ANON__")?;
        let mut entry = PadName::new(key, Sigil::Code, Declarator::My);
        entry.flags.insert(PadNameFlags::CLOSURE);
        entry.nested = Some(nested);
        entry.min_seq = Some(self.seq);
        Ok(self.unit(unit)?.names.push(Some(entry)))
    }

    /// Make every pending name of `unit` visible from the next sequence
    /// on. Returns the sequence they were introduced at.
    pub fn intro_names(&mut self, unit: UnitId) -> RuntimeResult<u32> {
        let seq = self.seq;
        let introduced = self.unit(unit)?.names.update(|names| {
            let mut count = 0usize;
            for name in names.iter_mut().flatten().filter(|name| name.is_pending()) {
                name.min_seq = Some(seq);
                count += 1;
            }
            count
        });
        self.seq += 1;
        tracing::trace!(unit = unit.0, seq, introduced, "introduced names");
        Ok(seq)
    }

    /// Open a scope in `unit`.
    pub fn enter_scope(&mut self, unit: UnitId) -> RuntimeResult<ScopeMark> {
        let entry = self.unit_mut(unit)?;
        let floor = entry.names.len();
        entry.scopes.push(floor);
        Ok(ScopeMark {
            unit,
            floor,
            depth: entry.scopes.len(),
        })
    }

    /// Close the scope `mark` opened, and any left open inside it. Names
    /// it declared stop being visible after the current sequence.
    pub fn leave_scope(&mut self, mark: ScopeMark) -> RuntimeResult<()> {
        let seq = self.seq;
        let unit = self.unit_mut(mark.unit)?;
        unit.scopes.truncate(mark.depth.saturating_sub(1));
        let closed = unit.names.update(|names| {
            let mut count = 0usize;
            for name in names.iter_mut().skip(mark.floor).flatten() {
                if !name.is_captured() && name.is_open() {
                    // A name never introduced was never visible.
                    name.min_seq.get_or_insert(seq);
                    name.max_seq = Some(seq);
                    count += 1;
                }
            }
            count
        });
        self.seq += 1;
        tracing::trace!(unit = mark.unit.0, seq, closed, "left scope");
        Ok(())
    }

    /// Slot of `name` visible in `unit` at the current sequence. A unit id
    /// from another arena has no names.
    pub fn find_in_current_scope(&self, unit: UnitId, name: &str, sigil: Sigil) -> Option<Slot> {
        self.find_at(unit, name, sigil, self.seq)
    }

    /// Slot of `name` visible in `unit` at sequence `seq`. The latest
    /// declaration wins.
    pub fn find_at(&self, unit: UnitId, name: &str, sigil: Sigil, seq: u32) -> Option<Slot> {
        let key = HashKey::new(name, self.hasher);
        find_visible(self.unit(unit).ok()?, &key, sigil, seq)
    }

    /// Resolve `name` through the units enclosing `unit`.
    ///
    /// On success the name is captured: an alias slot is added to `unit`
    /// and to every unit between it and the one declaring the name, and
    /// the slot in `unit` is returned. A name already captured is reused.
    pub fn find_in_enclosing(&mut self, unit: UnitId, name: &str, sigil: Sigil) -> Option<Slot> {
        let key = HashKey::new(name, self.hasher);
        self.capture(unit, &key, sigil)
    }

    /// Current unit first, then the enclosing ones.
    pub fn lookup(&mut self, unit: UnitId, name: &str, sigil: Sigil) -> Option<Slot> {
        self.find_in_current_scope(unit, name, sigil)
            .or_else(|| self.find_in_enclosing(unit, name, sigil))
    }

    fn capture(&mut self, unit: UnitId, key: &HashKey, sigil: Sigil) -> Option<Slot> {
        // Units from `unit` outwards up to the one declaring the name.
        let mut chain: SmallVec<[UnitId; 4]> = SmallVec::new();
        let mut inner = self.unit(unit).ok()?;
        let (owner, mut slot) = loop {
            chain.push(inner.id);
            let outer_id = inner.outer?;
            let seq = inner.outer_seq;
            let outer = self.unit(outer_id).ok()?;
            if let Some(slot) = find_visible(outer, key, sigil, seq) {
                break (outer_id, slot);
            }
            inner = outer;
        };
        tracing::trace!(
            unit = unit.0,
            declared_in = owner.0,
            depth = chain.len(),
            "captured outer name"
        );

        // Alias inwards, innermost last.
        for &id in chain.iter().rev() {
            let outer_unit = self.unit(id).ok()?.outer?;
            let template = self.unit(outer_unit).ok()?.names.get(slot)?;
            let existing = find_captured(self.unit(id).ok()?, key, sigil, slot);
            slot = match existing {
                Some(existing) => existing,
                None => {
                    let entry = self.unit_mut(id).ok()?;
                    entry.captures = true;
                    entry.names.push(Some(PadName::captured(&template, slot)))
                }
            };
        }
        Some(slot)
    }
}

fn slot_at(index: usize) -> Slot {
    Slot(u32::try_from(index).unwrap_or(u32::MAX))
}

fn find_visible(unit: &Unit, key: &HashKey, sigil: Sigil, seq: u32) -> Option<Slot> {
    let names = unit.names.borrow();
    names
        .iter()
        .enumerate()
        .rev()
        .find(|(_, name)| {
            name.as_ref()
                .is_some_and(|name| name.matches(key, sigil) && name.visible_at(seq))
        })
        .map(|(index, _)| slot_at(index))
}

fn find_captured(unit: &Unit, key: &HashKey, sigil: Sigil, outer_slot: Slot) -> Option<Slot> {
    let names = unit.names.borrow();
    names
        .iter()
        .position(|name| {
            name.as_ref().is_some_and(|name| {
                name.is_captured() && name.outer_slot == Some(outer_slot) && name.matches(key, sigil)
            })
        })
        .map(slot_at)
}
