//! References, weak references and blessing.

use opal_hash::HashKey;

use crate::sv::RefTarget;
use crate::{Caps, RuntimeError, RuntimeResult, Sv, SvFlags, SvType};

impl Sv {
    /// Make this cell a reference to `target`.
    pub fn set_ref(&self, target: &Sv) -> RuntimeResult<()> {
        let target = target.clone();
        self.write_scalar(Caps::REF, |body| {
            body.scalar.rv = Some(RefTarget::Strong(target));
            body.flags.insert(SvFlags::ROK);
        })
    }

    pub fn is_ref(&self) -> bool {
        self.flags().contains(SvFlags::ROK)
    }

    /// The referent, if this is a reference to a live cell.
    pub fn deref(&self) -> Option<Sv> {
        self.body().referent()
    }

    /// Turn an owning reference into a non-owning one. Returns whether
    /// anything changed. The referent is destroyed here if this was its
    /// last owner.
    pub fn weaken(&self) -> RuntimeResult<bool> {
        let released = {
            let mut body = self.body_mut();
            if body.flags.contains(SvFlags::READONLY) {
                return Err(RuntimeError::Immutable);
            }
            if !body.flags.contains(SvFlags::ROK) {
                return Err(RuntimeError::TypeMismatch {
                    expected: "a reference",
                    got: body.kind.ref_name(),
                });
            }
            let target = match body.scalar.rv.take() {
                Some(RefTarget::Strong(target)) => target,
                other => {
                    body.scalar.rv = other;
                    return Ok(false);
                }
            };
            body.scalar.rv = Some(RefTarget::Weak(target.downgrade()));
            body.flags.insert(SvFlags::WEAKREF);
            target
        };
        drop(released);
        Ok(true)
    }

    pub fn is_weak(&self) -> bool {
        self.flags().contains(SvFlags::WEAKREF)
    }

    /// Mark the referent as an object of `package`. Scalar referents move
    /// up to the magical body type, which has room for a package.
    pub fn bless(&self, package: &HashKey) -> RuntimeResult<()> {
        let target = self.deref().ok_or(RuntimeError::TypeMismatch {
            expected: "a reference",
            got: self.kind().ref_name(),
        })?;
        let mut body = target.body_mut();
        if body.flags.contains(SvFlags::READONLY) {
            return Err(RuntimeError::Immutable);
        }
        body.make_room(Caps::MAGIC)?;
        body.stash = Some(package.clone());
        body.flags.insert(SvFlags::OBJECT);
        Ok(())
    }

    /// Package of the object this reference points at.
    pub fn blessed(&self) -> Option<HashKey> {
        self.deref().and_then(|target| target.package())
    }

    /// Package this cell itself was blessed into.
    pub fn package(&self) -> Option<HashKey> {
        self.body().stash.clone()
    }

    /// Kind name of the referent: `SCALAR`, `REF`, `ARRAY`, `HASH`, `CODE`
    /// or `GLOB`.
    pub fn reftype(&self) -> Option<&'static str> {
        let target = self.deref()?;
        let body = target.body();
        Some(if body.kind.is_aggregate() {
            body.kind.ref_name()
        } else if body.flags.contains(SvFlags::ROK) {
            "REF"
        } else {
            SvType::Undef.ref_name()
        })
    }

    /// `HASH(0x…)`, or `Pkg=HASH(0x…)` for an object.
    pub fn ref_string(&self) -> Option<String> {
        let target = self.deref()?;
        let kind = self.reftype()?;
        let address = target.address();
        Some(match target.package() {
            Some(package) => format!("{}={kind}({address:#x})", package.to_text()),
            None => format!("{kind}({address:#x})"),
        })
    }
}
