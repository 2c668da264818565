//! Storage for compiled units and their activations.
//!
//! Units are numbered in creation order and never go away. Activations
//! live in a generational arena: a handle names a slot and the generation
//! the slot had when the activation was made, so a handle that outlives
//! its activation is reported as stale instead of reaching whatever
//! reused the slot.

use opal_hash::{HashKey, KeyHasher, KeySource, SharedKeys};
use opal_value::{ActivationId, RuntimeError, RuntimeResult, Sv, UnitId, WeakSv};

use crate::pad::{Pad, PadNames};

/// A compiled unit: a file, a named routine or an anonymous routine.
#[derive(Debug)]
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) name: Option<HashKey>,
    /// Unit this one was compiled inside.
    pub(crate) outer: Option<UnitId>,
    /// Compile sequence at which this unit was opened inside `outer`.
    pub(crate) outer_seq: u32,
    pub(crate) names: PadNames,
    /// Name floors of the scopes currently open.
    pub(crate) scopes: Vec<usize>,
    /// Captures something from an enclosing unit, so every activation
    /// must be cloned against a live outer activation.
    pub(crate) captures: bool,
}

impl Unit {
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> Option<&HashKey> {
        self.name.as_ref()
    }

    pub fn outer(&self) -> Option<UnitId> {
        self.outer
    }

    pub fn names(&self) -> &PadNames {
        &self.names
    }

    pub fn captures(&self) -> bool {
        self.captures
    }

    /// Scopes currently open during compilation.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn scope_floor(&self) -> usize {
        self.scopes.last().copied().unwrap_or(0)
    }
}

/// One activation of a unit.
#[derive(Debug)]
pub struct Activation {
    pub(crate) unit: UnitId,
    pub(crate) pad: Pad,
    pub(crate) outer: Option<ActivationId>,
    /// Calls currently running on this activation.
    pub(crate) depth: u32,
    /// For a recursion frame, the activation it was pushed from.
    pub(crate) base: Option<ActivationId>,
    /// Code cell this activation was cloned for; the activation can be
    /// swept once it is gone.
    pub(crate) owner: Option<WeakSv>,
}

impl Activation {
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn pad(&self) -> &Pad {
        &self.pad
    }

    pub fn outer(&self) -> Option<ActivationId> {
        self.outer
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn base(&self) -> Option<ActivationId> {
        self.base
    }

    pub fn is_frame(&self) -> bool {
        self.base.is_some()
    }
}

#[derive(Debug, Default)]
struct ArenaSlot {
    generation: u32,
    entry: Option<Activation>,
}

/// Units, activations, and the compile sequence clock.
pub struct PadArena {
    pub(crate) units: Vec<Unit>,
    slots: Vec<ArenaSlot>,
    free: Vec<u32>,
    live: usize,
    /// Compile sequence clock; names are scoped by its values.
    pub(crate) seq: u32,
    pub(crate) keys: SharedKeys,
    pub(crate) hasher: KeyHasher,
    /// Names interned by this arena, released with it.
    pub(crate) interned: Vec<HashKey>,
}

impl PadArena {
    pub fn new(keys: SharedKeys) -> Self {
        PadArena {
            units: Vec::new(),
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            seq: 1,
            hasher: keys.hasher(),
            keys,
            interned: Vec::new(),
        }
    }

    pub fn keys(&self) -> &SharedKeys {
        &self.keys
    }

    /// Current compile sequence.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Move the compile sequence on by one, as each statement does.
    pub fn advance_seq(&mut self) -> u32 {
        self.seq += 1;
        self.seq
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn unit(&self, id: UnitId) -> RuntimeResult<&Unit> {
        self.units.get(id.0 as usize).ok_or(foreign_unit())
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> RuntimeResult<&mut Unit> {
        self.units.get_mut(id.0 as usize).ok_or(foreign_unit())
    }

    pub fn live_activations(&self) -> usize {
        self.live
    }

    pub fn is_live(&self, id: ActivationId) -> bool {
        self.activation(id).is_ok()
    }

    pub fn activation(&self, id: ActivationId) -> RuntimeResult<&Activation> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(stale(id))
    }

    pub(crate) fn activation_mut(&mut self, id: ActivationId) -> RuntimeResult<&mut Activation> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(stale(id))
    }

    pub(crate) fn insert(&mut self, activation: Activation) -> ActivationId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(activation);
            return ActivationId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(ArenaSlot {
            generation: 0,
            entry: Some(activation),
        });
        ActivationId {
            index,
            generation: 0,
        }
    }

    /// Take an activation out of the arena. Its slot's generation moves
    /// on, so `id` is stale from here on.
    pub(crate) fn remove(&mut self, id: ActivationId) -> RuntimeResult<Activation> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or(stale(id))?;
        let activation = slot.entry.take().ok_or(stale(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(activation)
    }

    /// Handles of every live activation.
    pub fn activation_ids(&self) -> Vec<ActivationId> {
        self.slots
            .iter()
            .zip(0u32..)
            .filter(|(slot, _)| slot.entry.is_some())
            .map(|(slot, index)| ActivationId {
                index,
                generation: slot.generation,
            })
            .collect()
    }

    pub(crate) fn owner_is_gone(&self, id: ActivationId) -> bool {
        self.activation(id).is_ok_and(|activation| {
            activation.depth == 0
                && activation
                    .owner
                    .as_ref()
                    .is_some_and(|owner| !owner.is_alive())
        })
    }

    pub(crate) fn set_owner(&mut self, id: ActivationId, owner: &Sv) -> RuntimeResult<()> {
        self.activation_mut(id)?.owner = Some(owner.downgrade());
        Ok(())
    }
}

/// A unit id this arena never handed out.
fn foreign_unit() -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: "a unit of this arena",
        got: "a foreign unit id",
    }
}

pub(crate) fn stale(id: ActivationId) -> RuntimeError {
    RuntimeError::StaleActivation {
        index: id.index,
        generation: id.generation,
    }
}

impl Drop for PadArena {
    fn drop(&mut self) {
        tracing::debug!(
            units = self.units.len(),
            activations = self.live,
            names = self.interned.len(),
            "dropping pad arena"
        );
        // Values first: they may hold the last handles to code cells.
        for slot in &mut self.slots {
            drop(slot.entry.take());
        }
        for key in self.interned.drain(..) {
            self.keys.release(&key);
        }
    }
}

impl std::fmt::Debug for PadArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadArena")
            .field("units", &self.units.len())
            .field("activations", &self.live)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
