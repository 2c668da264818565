//! The value cell.
//!
//! An [`Sv`] is a shared handle to one cell body. Cloning the handle is the
//! increment of the cell's reference count and dropping it the decrement;
//! the body and everything it owns go away with the last strong handle.
//!
//! The body type only moves up the lattice in [`SvType`]. Writes pick the
//! smallest type with room for the new value; reads that cache a converted
//! form pick the smallest type that also keeps the forms already cached.

// Rc is the implementation of Sv and WeakSv.
#![expect(clippy::disallowed_types, reason = "Rc is the implementation of Sv")]

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use opal_hash::{HashKey, HashTable, TableValue};
use opal_stack::ensure_sufficient_stack;
use smallvec::SmallVec;

use crate::magic::Magic;
use crate::{Caps, CodeBody, HandleBody, RuntimeError, RuntimeResult, SvFlags, SvType};

/// Scalar slots. Which ones are meaningful is decided by the body type
/// and the `*_OK` flags.
#[derive(Default)]
pub(crate) struct Scalar {
    pub(crate) iv: i64,
    pub(crate) nv: f64,
    pub(crate) pv: Vec<u8>,
    pub(crate) rv: Option<RefTarget>,
}

/// Payload of an aggregate body.
pub(crate) enum Aggregate {
    None,
    Array(Vec<Sv>),
    Hash(HashTable<Sv>),
    Code(CodeBody),
    Handle(HandleBody),
}

/// What a reference cell points at.
pub(crate) enum RefTarget {
    Strong(Sv),
    Weak(WeakSv),
}

impl RefTarget {
    pub(crate) fn get(&self) -> Option<Sv> {
        match self {
            RefTarget::Strong(sv) => Some(sv.clone()),
            RefTarget::Weak(weak) => weak.upgrade(),
        }
    }
}

pub(crate) struct SvBody {
    pub(crate) kind: SvType,
    pub(crate) flags: SvFlags,
    pub(crate) scalar: Scalar,
    pub(crate) aggregate: Aggregate,
    pub(crate) magic: SmallVec<[Magic; 1]>,
    /// Package a blessed cell belongs to.
    pub(crate) stash: Option<HashKey>,
}

impl SvBody {
    fn new(kind: SvType) -> Self {
        SvBody {
            kind,
            flags: SvFlags::empty(),
            scalar: Scalar::default(),
            aggregate: Aggregate::None,
            magic: SmallVec::new(),
            stash: None,
        }
    }

    pub(crate) fn expect_scalar(&self) -> RuntimeResult<()> {
        if self.kind.is_aggregate() {
            return Err(RuntimeError::TypeMismatch {
                expected: "a scalar",
                got: self.kind.ref_name(),
            });
        }
        Ok(())
    }

    /// Refuse writes to read-only cells and to cells whose magic forbids
    /// them. Writes made by magic hooks skip the magic check.
    pub(crate) fn check_writable(&self) -> RuntimeResult<()> {
        if self.flags.contains(SvFlags::READONLY) {
            return Err(RuntimeError::Immutable);
        }
        if !self.flags.contains(SvFlags::IN_MAGIC)
            && self.magic.iter().any(|magic| !magic.vtable.allows_write())
        {
            return Err(RuntimeError::Immutable);
        }
        Ok(())
    }

    /// Move up the lattice until `need` fits.
    pub(crate) fn make_room(&mut self, need: Caps) -> RuntimeResult<()> {
        match self.kind.upgrade_for(need) {
            Some(kind) => {
                self.kind = kind;
                Ok(())
            }
            None => Err(RuntimeError::TypeMismatch {
                expected: "a scalar",
                got: self.kind.ref_name(),
            }),
        }
    }

    /// Room for `extra` while keeping the numeric forms already held.
    pub(crate) fn make_room_keeping(&mut self, extra: Caps) -> RuntimeResult<()> {
        let keep = self.kind.caps() & (Caps::INT | Caps::NUM);
        self.make_room(keep | extra)
    }

    /// Forget the current scalar value. The old referent is handed back so
    /// the caller can drop it after releasing the borrow.
    pub(crate) fn clear_value(&mut self) -> Option<RefTarget> {
        self.flags
            .remove(SvFlags::OK | SvFlags::UTF8 | SvFlags::WEAKREF);
        self.scalar.pv.clear();
        self.scalar.rv.take()
    }

    pub(crate) fn referent(&self) -> Option<Sv> {
        if !self.flags.contains(SvFlags::ROK) {
            return None;
        }
        self.scalar.rv.as_ref().and_then(RefTarget::get)
    }
}

/// A reference-counted value cell.
pub struct Sv(Rc<RefCell<SvBody>>);

/// Non-owning handle to a cell.
#[derive(Clone)]
pub struct WeakSv(Weak<RefCell<SvBody>>);

impl WeakSv {
    /// The cell, if it is still alive.
    pub fn upgrade(&self) -> Option<Sv> {
        self.0.upgrade().map(Sv)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakSv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakSv(alive: {})", self.is_alive())
    }
}

impl Sv {
    fn from_body(body: SvBody) -> Self {
        Sv(Rc::new(RefCell::new(body)))
    }

    /// A fresh undefined cell.
    pub fn undef() -> Self {
        Sv::from_body(SvBody::new(SvType::Undef))
    }

    pub fn int(value: i64) -> Self {
        let mut body = SvBody::new(SvType::Int);
        body.scalar.iv = value;
        body.flags = SvFlags::INT_OK | SvFlags::P_INT_OK;
        Sv::from_body(body)
    }

    pub fn float(value: f64) -> Self {
        let mut body = SvBody::new(SvType::Float);
        body.scalar.nv = value;
        body.flags = SvFlags::NUM_OK | SvFlags::P_NUM_OK;
        Sv::from_body(body)
    }

    /// Byte string without character semantics.
    pub fn bytes(value: &[u8]) -> Self {
        let mut body = SvBody::new(SvType::Str);
        body.scalar.pv = value.to_vec();
        body.flags = SvFlags::STR_OK;
        Sv::from_body(body)
    }

    /// Character string; flagged UTF-8 unless it is plain ASCII.
    pub fn string(value: &str) -> Self {
        let sv = Sv::bytes(value.as_bytes());
        if !value.is_ascii() {
            sv.body_mut().flags.insert(SvFlags::UTF8);
        }
        sv
    }

    /// A reference to `target`.
    pub fn new_ref(target: &Sv) -> Self {
        let mut body = SvBody::new(SvType::Ref);
        body.scalar.rv = Some(RefTarget::Strong(target.clone()));
        body.flags = SvFlags::ROK;
        Sv::from_body(body)
    }

    pub fn array(items: Vec<Sv>) -> Self {
        let mut body = SvBody::new(SvType::Array);
        body.aggregate = Aggregate::Array(items);
        Sv::from_body(body)
    }

    pub fn hash(table: HashTable<Sv>) -> Self {
        let mut body = SvBody::new(SvType::Hash);
        body.aggregate = Aggregate::Hash(table);
        Sv::from_body(body)
    }

    pub fn code(code: CodeBody) -> Self {
        let mut body = SvBody::new(SvType::Code);
        body.aggregate = Aggregate::Code(code);
        Sv::from_body(body)
    }

    pub fn handle(handle: HandleBody) -> Self {
        let mut body = SvBody::new(SvType::Handle);
        body.aggregate = Aggregate::Handle(handle);
        Sv::from_body(body)
    }

    pub(crate) fn body(&self) -> Ref<'_, SvBody> {
        self.0.borrow()
    }

    pub(crate) fn body_mut(&self) -> RefMut<'_, SvBody> {
        self.0.borrow_mut()
    }

    pub fn kind(&self) -> SvType {
        self.body().kind
    }

    pub fn flags(&self) -> SvFlags {
        self.body().flags
    }

    /// Holds a value (not undef, not a dead weak reference).
    pub fn is_defined(&self) -> bool {
        let body = self.body();
        if body.kind.is_aggregate() {
            return true;
        }
        if body.flags.contains(SvFlags::ROK) {
            return body.referent().is_some();
        }
        body.flags.intersects(SvFlags::OK)
    }

    /// Take another strong handle.
    #[must_use]
    pub fn inc_ref(&self) -> Sv {
        self.clone()
    }

    /// Give up this handle; the cell is destroyed with its last one.
    pub fn dec_ref(self) {
        drop(self);
    }

    /// Strong handles to this cell.
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn downgrade(&self) -> WeakSv {
        WeakSv(Rc::downgrade(&self.0))
    }

    /// Same cell.
    pub fn ptr_eq(&self, other: &Sv) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Cell identity as a number, as used in reference strings.
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<u8>() as usize
    }

    /// Move the body type up to `target`.
    ///
    /// Asking for a scalar type at or below the current one is a no-op;
    /// aggregates are reachable only from `Undef`.
    pub fn upgrade(&self, target: SvType) -> RuntimeResult<()> {
        let mut body = self.body_mut();
        let current = body.kind;
        if current.can_upgrade_to(target) {
            body.kind = target;
            if target.is_aggregate() && current != target {
                body.aggregate = match target {
                    SvType::Array => Aggregate::Array(Vec::new()),
                    SvType::Hash => Aggregate::Hash(HashTable::new()),
                    SvType::Code => Aggregate::Code(CodeBody::default()),
                    _ => Aggregate::Handle(HandleBody::default()),
                };
            }
            return Ok(());
        }
        if !current.is_aggregate() && !target.is_aggregate() {
            return Ok(());
        }
        Err(RuntimeError::TypeMismatch {
            expected: target.ref_name(),
            got: current.ref_name(),
        })
    }

    pub fn is_readonly(&self) -> bool {
        self.flags().contains(SvFlags::READONLY)
    }

    pub fn set_readonly(&self, readonly: bool) {
        self.body_mut().flags.set(SvFlags::READONLY, readonly);
    }

    pub fn is_tainted(&self) -> bool {
        self.flags().contains(SvFlags::TAINTED)
    }

    /// Store a scalar value: check, make room, clear, store, then run the
    /// set hooks.
    pub(crate) fn write_scalar(
        &self,
        need: Caps,
        store: impl FnOnce(&mut SvBody),
    ) -> RuntimeResult<()> {
        let old = {
            let mut body = self.body_mut();
            body.check_writable()?;
            body.make_room(need)?;
            let old = body.clear_value();
            store(&mut body);
            old
        };
        drop(old);
        self.call_set_magic()
    }

    pub fn set_int(&self, value: i64) -> RuntimeResult<()> {
        self.write_scalar(Caps::INT, |body| {
            body.scalar.iv = value;
            body.flags.insert(SvFlags::INT_OK | SvFlags::P_INT_OK);
        })
    }

    pub fn set_float(&self, value: f64) -> RuntimeResult<()> {
        self.write_scalar(Caps::NUM, |body| {
            body.scalar.nv = value;
            body.flags.insert(SvFlags::NUM_OK | SvFlags::P_NUM_OK);
        })
    }

    pub fn set_bytes(&self, value: &[u8]) -> RuntimeResult<()> {
        self.write_scalar(Caps::STR, |body| {
            body.scalar.pv.extend_from_slice(value);
            body.flags.insert(SvFlags::STR_OK);
        })
    }

    pub fn set_str(&self, value: &str) -> RuntimeResult<()> {
        self.write_scalar(Caps::STR, |body| {
            body.scalar.pv.extend_from_slice(value.as_bytes());
            body.flags.insert(SvFlags::STR_OK);
            body.flags.set(SvFlags::UTF8, !value.is_ascii());
        })
    }

    /// Make the cell undefined. Scalars keep their body type; aggregates
    /// are emptied.
    pub fn set_undef(&self) -> RuntimeResult<()> {
        let (old_ref, old_aggregate) = {
            let mut body = self.body_mut();
            body.check_writable()?;
            let old_ref = body.clear_value();
            let old_aggregate = match &mut body.aggregate {
                Aggregate::Array(items) => Some(Aggregate::Array(mem::take(items))),
                Aggregate::Hash(table) => {
                    let emptied = match table.shared_keys() {
                        Some(shared) => HashTable::with_shared_keys(shared.clone()),
                        None => HashTable::with_hasher(table.hasher()),
                    };
                    Some(Aggregate::Hash(mem::replace(table, emptied)))
                }
                Aggregate::Code(code) => Some(Aggregate::Code(mem::take(code))),
                Aggregate::None | Aggregate::Handle(_) => None,
            };
            (old_ref, old_aggregate)
        };
        drop(old_ref);
        drop(old_aggregate);
        self.call_set_magic()
    }

    /// Copy the value of `source` into this cell, running get hooks on the
    /// source and set hooks here.
    pub fn copy_from(&self, source: &Sv) -> RuntimeResult<()> {
        if self.ptr_eq(source) {
            return Ok(());
        }
        source.call_get_magic()?;
        let (kind, flags, iv, nv, pv, rv) = {
            let src = source.body();
            src.expect_scalar()?;
            let rv = if src.flags.contains(SvFlags::ROK) {
                src.scalar.rv.as_ref().map(|target| match target {
                    RefTarget::Strong(sv) => RefTarget::Strong(sv.clone()),
                    RefTarget::Weak(weak) => RefTarget::Weak(weak.clone()),
                })
            } else {
                None
            };
            (
                src.kind,
                src.flags & (SvFlags::OK | SvFlags::UTF8 | SvFlags::WEAKREF | SvFlags::TAINTED),
                src.scalar.iv,
                src.scalar.nv,
                src.scalar.pv.clone(),
                rv,
            )
        };
        // Copies own their referent even when the source was weak.
        let rv = rv.map(|target| match target {
            RefTarget::Weak(weak) => weak
                .upgrade()
                .map_or(RefTarget::Weak(weak), RefTarget::Strong),
            strong @ RefTarget::Strong(_) => strong,
        });
        let flags = if matches!(rv, Some(RefTarget::Strong(_))) {
            flags - SvFlags::WEAKREF
        } else {
            flags
        };
        let need = kind.caps() & (Caps::INT | Caps::NUM | Caps::STR | Caps::REF);
        self.write_scalar(need, |body| {
            body.scalar.iv = iv;
            body.scalar.nv = nv;
            body.scalar.pv = pv;
            body.scalar.rv = rv;
            body.flags.insert(flags);
        })
    }
}

impl Clone for Sv {
    fn clone(&self) -> Self {
        Sv(Rc::clone(&self.0))
    }
}

impl Default for Sv {
    fn default() -> Self {
        Sv::undef()
    }
}

impl Drop for Sv {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let Ok(mut body) = self.0.try_borrow_mut() else {
            return;
        };
        let magic = mem::take(&mut body.magic);
        let referent = body.scalar.rv.take();
        let aggregate = mem::replace(&mut body.aggregate, Aggregate::None);
        drop(body);

        for attached in &magic {
            attached.vtable.free();
        }
        // Nested cells can be arbitrarily deep.
        ensure_sufficient_stack(move || {
            drop(referent);
            drop(aggregate);
        });
    }
}

impl TableValue for Sv {
    fn is_read_only(&self) -> bool {
        self.is_readonly()
    }
}

impl fmt::Debug for Sv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(body) = self.0.try_borrow() else {
            return f.write_str("Sv(<borrowed>)");
        };
        let mut out = f.debug_struct("Sv");
        out.field("kind", &body.kind).field("flags", &body.flags);
        if body.flags.intersects(SvFlags::INT_OK | SvFlags::P_INT_OK) {
            out.field("iv", &body.scalar.iv);
        }
        if body.flags.intersects(SvFlags::NUM_OK | SvFlags::P_NUM_OK) {
            out.field("nv", &body.scalar.nv);
        }
        if body.flags.contains(SvFlags::STR_OK) {
            out.field("pv", &String::from_utf8_lossy(&body.scalar.pv));
        }
        if body.flags.contains(SvFlags::ROK) {
            let target = body.referent().map(|sv| sv.address());
            out.field("rv", &target.map(|addr| format!("{addr:#x}")));
        }
        match &body.aggregate {
            Aggregate::Array(items) => {
                out.field("len", &items.len());
            }
            Aggregate::Hash(table) => {
                out.field("keys", &table.len());
            }
            Aggregate::Code(code) => {
                out.field("code", code);
            }
            Aggregate::Handle(handle) => {
                out.field("handle", &handle.name);
            }
            Aggregate::None => {}
        }
        if let Some(stash) = &body.stash {
            out.field("stash", &stash.to_text());
        }
        out.finish()
    }
}
