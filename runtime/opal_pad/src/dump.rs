//! Text dumps of pads for debugging.

use std::fmt::Write;

use opal_diagnostic::NullSink;
use opal_value::{ActivationId, RuntimeResult, Sv, UnitId};

use crate::arena::PadArena;
use crate::name::PadName;

impl PadArena {
    /// One line per slot of `unit`: its name and where it is visible.
    pub fn dump_pad(&self, unit: UnitId) -> RuntimeResult<String> {
        let unit = self.unit(unit)?;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "unit {}{}",
            unit.id.0,
            unit.name
                .as_ref()
                .map(|name| format!(" ({})", name.to_text()))
                .unwrap_or_default()
        );
        for (index, name) in unit.names.borrow().iter().enumerate() {
            let _ = writeln!(out, "{index:>4}. {}", describe(name.as_ref()));
        }
        Ok(out)
    }

    /// Like [`dump_pad`](Self::dump_pad), with each slot's current value.
    pub fn dump_activation(&self, id: ActivationId) -> RuntimeResult<String> {
        let activation = self.activation(id)?;
        let names = activation.pad.names().borrow();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "activation {}/{} of unit {} depth {}",
            id.index, id.generation, activation.unit.0, activation.depth
        );
        for (index, value) in activation.pad.values().iter().enumerate() {
            let name = names.get(index).and_then(Option::as_ref);
            let _ = writeln!(out, "{index:>4}. {} = {}", describe(name), show(value));
        }
        Ok(out)
    }
}

fn describe(name: Option<&PadName>) -> String {
    let Some(name) = name else {
        return "<temp>".to_string();
    };
    let mut line = name.to_string();
    if let Some(outer) = name.outer_slot {
        let _ = write!(line, " [outer <- slot {}]", outer.0);
    } else if let Some(nested) = name.nested {
        let _ = write!(line, " [closure {}]", nested.0);
    } else {
        let min = name.min_seq.map_or_else(|| "pending".to_string(), |seq| seq.to_string());
        let max = name.max_seq.map_or_else(|| "open".to_string(), |seq| seq.to_string());
        let _ = write!(line, " [{min}..{max}]");
    }
    if name.is_our() {
        line.push_str(" our");
    }
    if name.is_state() {
        line.push_str(" state");
    }
    line
}

fn show(value: &Sv) -> String {
    match value.kind() {
        kind if kind.is_aggregate() => format!("{kind:?}"),
        _ if !value.is_defined() => "undef".to_string(),
        _ => value
            .get_as_string(&NullSink, None)
            .map_or_else(|err| format!("<{err}>"), |text| format!("{text:?}")),
    }
}

#[cfg(test)]
mod tests;
