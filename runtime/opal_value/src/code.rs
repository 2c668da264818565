//! Payloads of code and handle cells.

use std::fmt;

use opal_hash::HashKey;

use crate::{RuntimeResult, Sv};

/// A compiled unit, as numbered by the pad arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct UnitId(pub u32);

/// Generation-checked handle to one activation of a unit.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ActivationId {
    pub index: u32,
    pub generation: u32,
}

/// Body of a built-in routine.
pub type NativeFn = fn(&[Sv]) -> RuntimeResult<Sv>;

/// What a code cell runs.
#[derive(Clone, Default)]
pub struct CodeBody {
    pub name: Option<HashKey>,
    /// Package the routine was defined in.
    pub package: Option<HashKey>,
    pub unit: Option<UnitId>,
    /// Activation a closure was cloned for.
    pub activation: Option<ActivationId>,
    pub native: Option<NativeFn>,
}

impl CodeBody {
    pub fn native(name: Option<HashKey>, body: NativeFn) -> Self {
        CodeBody {
            name,
            native: Some(body),
            ..CodeBody::default()
        }
    }

    pub fn for_unit(unit: UnitId) -> Self {
        CodeBody {
            unit: Some(unit),
            ..CodeBody::default()
        }
    }

    /// A closure is a unit bound to an activation.
    pub fn is_closure(&self) -> bool {
        self.unit.is_some() && self.activation.is_some()
    }

    /// Run a built-in body. `None` for units, which the interpreter runs.
    pub fn call(&self, args: &[Sv]) -> Option<RuntimeResult<Sv>> {
        self.native.map(|body| body(args))
    }
}

impl fmt::Debug for CodeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBody")
            .field("name", &self.name.as_ref().map(HashKey::to_text))
            .field("package", &self.package.as_ref().map(HashKey::to_text))
            .field("unit", &self.unit)
            .field("activation", &self.activation)
            .field("native", &self.native.is_some())
            .finish()
    }
}

/// Payload of a handle cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandleBody {
    pub name: String,
}

impl HandleBody {
    pub fn new(name: impl Into<String>) -> Self {
        HandleBody { name: name.into() }
    }
}
