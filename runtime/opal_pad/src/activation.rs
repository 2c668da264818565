//! Run-time side of pads: activations, closures and recursion.
//!
//! Cloning a unit makes an activation: its names are the unit's, shared;
//! its values are fresh cells, except that captured slots share the cell
//! of the outer activation and closure prototype slots hold closures
//! cloned against the new activation itself. Those nested clones refer to
//! the new activation by handle, which is why it is inserted into the
//! arena before they are made.

use opal_stack::ensure_sufficient_stack;
use opal_value::{ActivationId, CodeBody, RuntimeError, RuntimeResult, Sv, UnitId};
use smallvec::SmallVec;

use crate::arena::{Activation, PadArena};
use crate::name::{PadName, Slot};
use crate::pad::Pad;

/// Closure prototype slots still to be filled in a new activation.
type PendingClosures = SmallVec<[(Slot, UnitId); 2]>;

impl PadArena {
    /// Make an activation of `unit` whose captured slots share the cells
    /// of `outer`, which must be an activation of the enclosing unit.
    ///
    /// Without an outer activation, captured slots get fresh cells.
    #[tracing::instrument(level = "debug", skip_all, fields(unit = unit.0))]
    pub fn clone_for_activation(
        &mut self,
        unit: UnitId,
        outer: Option<ActivationId>,
    ) -> RuntimeResult<ActivationId> {
        ensure_sufficient_stack(|| self.clone_unit(unit, outer))
    }

    fn clone_unit(&mut self, unit: UnitId, outer: Option<ActivationId>) -> RuntimeResult<ActivationId> {
        let enclosing = self.unit(unit)?.outer;
        let names = self.unit(unit)?.names.clone();
        let outer_pad = match outer {
            Some(id) => {
                let activation = self.activation(id)?;
                if Some(activation.unit) != enclosing {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "an activation of the enclosing unit",
                        got: "an activation of another unit",
                    });
                }
                Some(&activation.pad)
            }
            None => None,
        };

        let mut pad = Pad::new(unit, names.clone(), true);
        let mut pending = PendingClosures::new();
        for (index, name) in names.borrow().iter().enumerate() {
            let cell = match name {
                None => Sv::undef(),
                Some(name) if name.is_captured() => name
                    .outer_slot
                    .zip(outer_pad)
                    .and_then(|(slot, outer)| outer.get(slot).cloned())
                    .unwrap_or_else(|| name.fresh_cell()),
                Some(name) => {
                    if let Some(nested) = name.nested {
                        pending.push((slot_at(index), nested));
                    }
                    name.fresh_cell()
                }
            };
            pad.push(cell);
        }

        let id = self.insert(Activation {
            unit,
            pad,
            outer,
            depth: 0,
            base: None,
            owner: None,
        });
        if let Err(err) = self.fill_closures(id, pending) {
            self.discard_unfinished(id);
            return Err(err);
        }
        tracing::trace!(index = id.index, generation = id.generation, "cloned activation");
        Ok(id)
    }

    fn fill_closures(&mut self, id: ActivationId, pending: PendingClosures) -> RuntimeResult<()> {
        for (slot, nested) in pending {
            let closure = self.make_closure(nested, Some(id))?;
            let old = self.activation_mut(id)?.pad.replace(slot, closure);
            drop(old);
        }
        Ok(())
    }

    /// Take back an activation whose closures could not all be made,
    /// along with the closure activations already cloned against it.
    fn discard_unfinished(&mut self, id: ActivationId) {
        if let Ok(activation) = self.remove(id) {
            tracing::debug!(unit = activation.unit.0, "discarded unfinished activation");
            drop(activation);
        }
        self.sweep();
    }

    /// Clone `unit` against `outer` and wrap the activation in a code
    /// cell. The activation lives until the cell is gone and
    /// [`sweep`](Self::sweep) runs.
    pub fn make_closure(&mut self, unit: UnitId, outer: Option<ActivationId>) -> RuntimeResult<Sv> {
        let id = self.clone_for_activation(unit, outer)?;
        let code = Sv::code(CodeBody {
            name: self.unit(unit)?.name.clone(),
            unit: Some(unit),
            activation: Some(id),
            ..CodeBody::default()
        });
        self.set_owner(id, &code)?;
        Ok(code)
    }

    /// Start a call on `base`. The first call runs on `base` itself; a
    /// recursive call gets a new frame whose captured and `state` slots
    /// share the cells of `base` and whose other slots are fresh.
    pub fn push_activation(&mut self, base: ActivationId) -> RuntimeResult<ActivationId> {
        let activation = self.activation_mut(base)?;
        activation.depth += 1;
        if activation.depth == 1 {
            return Ok(base);
        }
        let depth = activation.depth;
        let unit = activation.unit;
        let outer = activation.outer;
        let base_pad = activation.pad.clone();
        let names = base_pad.names().clone();

        let mut pad = Pad::new(unit, names.clone(), true);
        let mut pending = PendingClosures::new();
        for (index, name) in names.borrow().iter().enumerate() {
            let shared = name.as_ref().is_some_and(shares_across_frames);
            let cell = match name {
                Some(_) if shared => base_pad
                    .get(slot_at(index))
                    .cloned()
                    .unwrap_or_else(Sv::undef),
                Some(name) => {
                    if let Some(nested) = name.nested {
                        pending.push((slot_at(index), nested));
                    }
                    name.fresh_cell()
                }
                None => Sv::undef(),
            };
            pad.push(cell);
        }

        let frame = self.insert(Activation {
            unit,
            pad,
            outer,
            depth,
            base: Some(base),
            owner: None,
        });
        if let Err(err) = self.fill_closures(frame, pending) {
            self.discard_unfinished(frame);
            if let Ok(base) = self.activation_mut(base) {
                base.depth = base.depth.saturating_sub(1);
            }
            return Err(err);
        }
        tracing::trace!(unit = unit.0, depth, "pushed recursion frame");
        Ok(frame)
    }

    /// End the call running on `frame`.
    ///
    /// A recursion frame is discarded. When the last call on a base
    /// activation ends, its plain slots get fresh cells, so closures that
    /// captured the old cells keep them and the next call starts clean.
    pub fn pop_activation(&mut self, frame: ActivationId) -> RuntimeResult<()> {
        let base = self.activation(frame)?.base;
        if let Some(base) = base {
            let discarded = self.remove(frame)?;
            if let Ok(base) = self.activation_mut(base) {
                base.depth = base.depth.saturating_sub(1);
            }
            drop(discarded);
            return Ok(());
        }

        let activation = self.activation_mut(frame)?;
        activation.depth = activation.depth.saturating_sub(1);
        if activation.depth > 0 {
            return Ok(());
        }
        let names = activation.pad.names().clone();
        let mut released = Vec::new();
        for (index, name) in names.borrow().iter().enumerate() {
            let Some(name) = name else { continue };
            if shares_across_frames(name) || name.nested.is_some() {
                continue;
            }
            if let Some(old) = activation.pad.replace(slot_at(index), name.fresh_cell()) {
                released.push(old);
            }
        }
        drop(released);
        Ok(())
    }

    /// Cell in `slot` of activation `id`.
    pub fn cell(&self, id: ActivationId, slot: Slot) -> RuntimeResult<Sv> {
        self.activation(id)?
            .pad
            .get(slot)
            .cloned()
            .ok_or(RuntimeError::TypeMismatch {
                expected: "a pad slot",
                got: "an index past the end of the pad",
            })
    }

    /// Discard activation `id` now. Its handle is stale afterwards.
    pub fn release_activation(&mut self, id: ActivationId) -> RuntimeResult<()> {
        let activation = self.remove(id)?;
        drop(activation);
        Ok(())
    }

    /// Discard activations whose code cell is gone, repeating while
    /// discarding one frees further code cells. Returns how many went.
    pub fn sweep(&mut self) -> usize {
        let mut swept = 0;
        loop {
            let dead: Vec<ActivationId> = self
                .activation_ids()
                .into_iter()
                .filter(|&id| self.owner_is_gone(id))
                .collect();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                if let Ok(activation) = self.remove(id) {
                    drop(activation);
                    swept += 1;
                }
            }
        }
        if swept > 0 {
            tracing::debug!(swept, live = self.live_activations(), "swept activations");
        }
        swept
    }
}

/// Slots every frame of one base activation shares.
fn shares_across_frames(name: &PadName) -> bool {
    name.is_captured() || name.is_state() || name.is_our()
}

fn slot_at(index: usize) -> Slot {
    Slot(u32::try_from(index).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests;
