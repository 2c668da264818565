//! Attachments ("magic") that intercept reads and writes of a cell.
//!
//! A cell carries an ordered list of attachments. Reads run every `get`
//! hook in attach order before the value is looked at; writes run every
//! `set` hook in attach order after the value is stored. While hooks run,
//! the cell is flagged `IN_MAGIC`, which keeps a hook's own writes from
//! re-entering the hook list.

// Attachments are shared between the cell and the hook run that clones them.
#![expect(clippy::disallowed_types, reason = "Rc is the attachment handle")]

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use opal_diagnostic::NullSink;
use smallvec::SmallVec;

use crate::{Caps, RuntimeResult, Sv, SvFlags};

/// Closed set of attachment kinds.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MagicKind {
    /// User-supplied hooks standing in for the value.
    Tied,
    Taint,
    /// Element of the process environment.
    EnvElement,
    /// Writes are refused.
    Restricted,
    /// Host extension.
    Ext,
}

/// Hooks of one attachment. Every hook defaults to doing nothing.
pub trait MagicVtable {
    /// Before a read.
    fn get(&self, _sv: &Sv) -> RuntimeResult<()> {
        Ok(())
    }

    /// After a write.
    fn set(&self, _sv: &Sv) -> RuntimeResult<()> {
        Ok(())
    }

    /// When the value is cleared on request.
    fn clear(&self, _sv: &Sv) -> RuntimeResult<()> {
        Ok(())
    }

    /// Whether plain writes are allowed at all.
    fn allows_write(&self) -> bool {
        true
    }

    /// When the attachment goes away, with its cell or on detach.
    fn free(&self) {}
}

/// One attachment on a cell.
#[derive(Clone)]
pub struct Magic {
    pub(crate) kind: MagicKind,
    pub(crate) vtable: Rc<dyn MagicVtable>,
}

impl Magic {
    pub fn kind(&self) -> MagicKind {
        self.kind
    }
}

impl fmt::Debug for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Magic({:?})", self.kind)
    }
}

#[derive(Copy, Clone)]
enum Phase {
    Get,
    Set,
    Clear,
}

impl Sv {
    /// Append an attachment. A scalar moves up to the magical body type;
    /// aggregates already have room.
    pub fn attach_magic(
        &self,
        kind: MagicKind,
        vtable: impl MagicVtable + 'static,
    ) -> RuntimeResult<()> {
        let mut body = self.body_mut();
        body.make_room(Caps::MAGIC)?;
        body.magic.push(Magic {
            kind,
            vtable: Rc::new(vtable),
        });
        tracing::trace!(?kind, count = body.magic.len(), "attached magic");
        Ok(())
    }

    /// Remove every attachment of `kind`, running their `free` hooks.
    /// Returns whether anything was removed. The body type stays.
    pub fn detach_magic(&self, kind: MagicKind) -> bool {
        let removed: SmallVec<[Magic; 1]> = {
            let mut body = self.body_mut();
            let (removed, kept) = body.magic.drain(..).partition(|magic| magic.kind == kind);
            body.magic = kept;
            removed
        };
        for magic in &removed {
            magic.vtable.free();
        }
        !removed.is_empty()
    }

    pub fn has_magic(&self, kind: MagicKind) -> bool {
        self.body().magic.iter().any(|magic| magic.kind == kind)
    }

    pub fn magic_kinds(&self) -> Vec<MagicKind> {
        self.body().magic.iter().map(Magic::kind).collect()
    }

    pub fn call_get_magic(&self) -> RuntimeResult<()> {
        self.run_magic(Phase::Get)
    }

    pub fn call_set_magic(&self) -> RuntimeResult<()> {
        self.run_magic(Phase::Set)
    }

    pub fn call_clear_magic(&self) -> RuntimeResult<()> {
        self.run_magic(Phase::Clear)
    }

    pub fn set_tainted(&self, tainted: bool) {
        self.body_mut().flags.set(SvFlags::TAINTED, tainted);
    }

    fn run_magic(&self, phase: Phase) -> RuntimeResult<()> {
        let hooks = {
            let body = self.body();
            if body.magic.is_empty() || body.flags.contains(SvFlags::IN_MAGIC) {
                return Ok(());
            }
            body.magic.clone()
        };
        self.body_mut().flags.insert(SvFlags::IN_MAGIC);
        let result = hooks.iter().try_for_each(|magic| match phase {
            Phase::Get => magic.vtable.get(self),
            Phase::Set => magic.vtable.set(self),
            Phase::Clear => magic.vtable.clear(self),
        });
        self.body_mut().flags.remove(SvFlags::IN_MAGIC);
        result
    }
}

/// "Tainted data seen in this statement" flag shared by taint attachments.
#[derive(Clone, Default)]
pub struct TaintState(Rc<Cell<bool>>);

impl TaintState {
    pub fn new() -> Self {
        TaintState::default()
    }

    pub fn is_tainted(&self) -> bool {
        self.0.get()
    }

    pub fn set_tainted(&self, tainted: bool) {
        self.0.set(tainted);
    }
}

impl fmt::Debug for TaintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaintState({})", self.is_tainted())
    }
}

/// Taint tracking: a write taints the cell when tainted data is in
/// flight, and reading a tainted cell puts tainted data in flight.
pub struct TaintMagic {
    state: TaintState,
}

impl TaintMagic {
    pub fn new(state: TaintState) -> Self {
        TaintMagic { state }
    }
}

impl MagicVtable for TaintMagic {
    fn get(&self, sv: &Sv) -> RuntimeResult<()> {
        if sv.is_tainted() {
            self.state.set_tainted(true);
        }
        Ok(())
    }

    fn set(&self, sv: &Sv) -> RuntimeResult<()> {
        sv.set_tainted(self.state.is_tainted());
        Ok(())
    }
}

/// Where environment attachments read and write variables.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
    fn vars(&self) -> Vec<(String, String)>;
    fn set_var(&self, key: &str, value: &str);
    fn remove_var(&self, key: &str);
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }

    fn set_var(&self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }

    fn remove_var(&self, key: &str) {
        std::env::remove_var(key);
    }
}

/// A cell standing for one environment variable.
///
/// The value is read from the environment on the first read, and every
/// write goes straight through to it. Storing undef removes the variable.
pub struct EnvElement {
    key: String,
    case_insensitive: bool,
    env: Rc<dyn Environment>,
    materialized: Cell<bool>,
}

impl EnvElement {
    pub fn new(key: impl Into<String>, env: impl Environment + 'static) -> Self {
        EnvElement {
            key: key.into(),
            case_insensitive: false,
            env: Rc::new(env),
            materialized: Cell::new(false),
        }
    }

    /// Match the variable name without regard to ASCII case.
    #[must_use]
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    fn lookup(&self) -> Option<String> {
        if !self.case_insensitive {
            return self.env.var(&self.key);
        }
        self.env
            .vars()
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.key))
            .map(|(_, value)| value)
    }

    /// Name under which the variable is stored, preferring an existing
    /// spelling when matching without case.
    fn stored_name(&self) -> String {
        if self.case_insensitive {
            if let Some((name, _)) = self
                .env
                .vars()
                .into_iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&self.key))
            {
                return name;
            }
        }
        self.key.clone()
    }
}

impl MagicVtable for EnvElement {
    fn get(&self, sv: &Sv) -> RuntimeResult<()> {
        if self.materialized.replace(true) {
            return Ok(());
        }
        tracing::trace!(key = %self.key, "materializing environment element");
        match self.lookup() {
            Some(value) => sv.set_str(&value),
            None => sv.set_undef(),
        }
    }

    fn set(&self, sv: &Sv) -> RuntimeResult<()> {
        self.materialized.set(true);
        let name = self.stored_name();
        if sv.is_defined() {
            let value = sv.get_as_string(&NullSink, None)?;
            self.env.set_var(&name, &value);
        } else {
            self.env.remove_var(&name);
        }
        Ok(())
    }

    fn clear(&self, _sv: &Sv) -> RuntimeResult<()> {
        self.env.remove_var(&self.stored_name());
        Ok(())
    }
}

/// Refuses plain writes to the cell it is attached to.
#[derive(Clone, Copy, Debug, Default)]
pub struct RestrictedMagic;

impl MagicVtable for RestrictedMagic {
    fn allows_write(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests;
