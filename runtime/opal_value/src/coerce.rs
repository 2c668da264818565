//! Reading a cell as a number, a string or a truth value.
//!
//! Every read runs the cell's get hooks first. A conversion that succeeds
//! exactly is cached on the cell, moving the body type up so that the
//! forms already held survive. A string that is only partly numeric
//! yields its leading number and a `NotNumeric` advisory; its conversion
//! is cached with private flags only, so the next read parses again and
//! the advisory is reported again for the queue to de-duplicate by site.

use opal_diagnostic::{Advisory, AdvisorySink, Site};

use crate::numeric::{float_is_int, float_to_int, format_float, parse_number, Number};
use crate::sv::SvBody;
use crate::{Caps, RuntimeResult, Sv, SvFlags};

/// What a read found before any conversion.
enum Source {
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    Ref(Sv),
    Undef,
}

fn source_of(body: &SvBody) -> Source {
    let flags = body.flags;
    if flags.contains(SvFlags::INT_OK) {
        Source::Int(body.scalar.iv)
    } else if flags.contains(SvFlags::NUM_OK) {
        Source::Float(body.scalar.nv)
    } else if flags.contains(SvFlags::ROK) {
        body.referent().map_or(Source::Undef, Source::Ref)
    } else if flags.contains(SvFlags::STR_OK) {
        Source::Str(body.scalar.pv.clone())
    } else {
        Source::Undef
    }
}

/// Cache a parse result on the cell. Exact results get public flags,
/// partial ones private flags only.
fn cache_number(body: &mut SvBody, number: Number, exact: bool) -> RuntimeResult<()> {
    match number {
        Number::Int(value) => {
            body.make_room_keeping(Caps::STR | Caps::INT)?;
            body.scalar.iv = value;
            body.flags.insert(SvFlags::P_INT_OK);
            if exact {
                body.flags.insert(SvFlags::INT_OK);
            }
        }
        Number::Float(value) => {
            body.make_room_keeping(Caps::STR | Caps::INT | Caps::NUM)?;
            body.scalar.nv = value;
            body.flags.insert(SvFlags::P_NUM_OK);
            if exact {
                body.flags.insert(SvFlags::NUM_OK);
            }
            if float_is_int(value) {
                body.scalar.iv = float_to_int(value);
                body.flags.insert(SvFlags::P_INT_OK);
                if exact {
                    body.flags.insert(SvFlags::INT_OK);
                }
            }
        }
    }
    Ok(())
}

/// Bytes of a string as characters: UTF-8 when flagged, Latin-1 otherwise.
pub(crate) fn decode(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|&byte| char::from(byte)).collect()
    }
}

impl Sv {
    /// Parse the string slot, cache the result, and report a partial parse.
    fn numify_string(
        &self,
        bytes: &[u8],
        sink: &dyn AdvisorySink,
        site: Option<Site>,
    ) -> RuntimeResult<Number> {
        let parsed = parse_number(bytes);
        cache_number(&mut self.body_mut(), parsed.number, parsed.numeric)?;
        if !parsed.numeric {
            sink.advise(Advisory::not_numeric(bytes).at(site));
        }
        Ok(parsed.number)
    }

    fn read_source(&self) -> RuntimeResult<Source> {
        self.call_get_magic()?;
        let body = self.body();
        body.expect_scalar()?;
        Ok(source_of(&body))
    }

    /// Read as an integer.
    pub fn get_as_int(&self, sink: &dyn AdvisorySink, site: Option<Site>) -> RuntimeResult<i64> {
        match self.read_source()? {
            Source::Int(value) => Ok(value),
            Source::Float(value) => {
                if float_is_int(value) {
                    let mut body = self.body_mut();
                    body.make_room_keeping(Caps::INT)?;
                    body.scalar.iv = float_to_int(value);
                    body.flags.insert(SvFlags::INT_OK | SvFlags::P_INT_OK);
                }
                Ok(float_to_int(value))
            }
            Source::Ref(target) => Ok(address_as_int(&target)),
            Source::Str(bytes) => Ok(self.numify_string(&bytes, sink, site)?.as_int()),
            Source::Undef => {
                sink.advise(Advisory::uninitialized("numeric conversion").at(site));
                Ok(0)
            }
        }
    }

    /// Read as a float.
    #[expect(
        clippy::cast_precision_loss,
        reason = "integers wider than the mantissa round like any float"
    )]
    pub fn get_as_float(&self, sink: &dyn AdvisorySink, site: Option<Site>) -> RuntimeResult<f64> {
        match self.read_source()? {
            Source::Float(value) => Ok(value),
            Source::Int(value) => {
                let mut body = self.body_mut();
                body.make_room_keeping(Caps::NUM)?;
                body.scalar.nv = value as f64;
                body.flags.insert(SvFlags::NUM_OK | SvFlags::P_NUM_OK);
                Ok(value as f64)
            }
            Source::Ref(target) => Ok(address_as_int(&target) as f64),
            Source::Str(bytes) => Ok(self.numify_string(&bytes, sink, site)?.as_float()),
            Source::Undef => {
                sink.advise(Advisory::uninitialized("numeric conversion").at(site));
                Ok(0.0)
            }
        }
    }

    /// Read as bytes. Numbers are formatted and the text cached.
    pub fn get_as_bytes(
        &self,
        sink: &dyn AdvisorySink,
        site: Option<Site>,
    ) -> RuntimeResult<Vec<u8>> {
        self.call_get_magic()?;
        let source = {
            let body = self.body();
            body.expect_scalar()?;
            if body.flags.contains(SvFlags::STR_OK) {
                return Ok(body.scalar.pv.clone());
            }
            source_of(&body)
        };
        let text = match source {
            Source::Int(value) => value.to_string(),
            Source::Float(value) => format_float(value),
            Source::Ref(_) => return Ok(self.ref_string().unwrap_or_default().into_bytes()),
            Source::Str(bytes) => return Ok(bytes),
            Source::Undef => {
                sink.advise(Advisory::uninitialized("string conversion").at(site));
                return Ok(Vec::new());
            }
        };
        let mut body = self.body_mut();
        body.make_room_keeping(Caps::STR)?;
        body.scalar.pv = text.clone().into_bytes();
        body.flags.insert(SvFlags::STR_OK);
        Ok(text.into_bytes())
    }

    /// Read as text, decoding bytes by the cell's UTF-8 flag.
    pub fn get_as_string(
        &self,
        sink: &dyn AdvisorySink,
        site: Option<Site>,
    ) -> RuntimeResult<String> {
        let bytes = self.get_as_bytes(sink, site)?;
        Ok(decode(&bytes, self.flags().contains(SvFlags::UTF8)))
    }

    /// Truth value: undef, `""`, `"0"`, `0` and `0.0` are false; a live
    /// reference is true; an aggregate is true when it is not empty.
    pub fn is_true(&self) -> RuntimeResult<bool> {
        self.call_get_magic()?;
        let body = self.body();
        if body.kind.is_aggregate() {
            return Ok(match &body.aggregate {
                crate::sv::Aggregate::Array(items) => !items.is_empty(),
                crate::sv::Aggregate::Hash(table) => !table.is_empty(),
                _ => true,
            });
        }
        let flags = body.flags;
        Ok(if flags.contains(SvFlags::STR_OK) {
            let pv = &body.scalar.pv;
            !(pv.is_empty() || pv.as_slice() == b"0")
        } else if flags.contains(SvFlags::INT_OK) {
            body.scalar.iv != 0
        } else if flags.contains(SvFlags::NUM_OK) {
            body.scalar.nv != 0.0
        } else if flags.contains(SvFlags::ROK) {
            body.referent().is_some()
        } else {
            false
        })
    }

    /// Whether reading the cell as a number would be exact.
    pub fn looks_like_number(&self) -> bool {
        let body = self.body();
        let flags = body.flags;
        if flags.intersects(SvFlags::INT_OK | SvFlags::NUM_OK) {
            true
        } else if flags.contains(SvFlags::STR_OK) {
            crate::numeric::looks_like_number(&body.scalar.pv)
        } else {
            false
        }
    }
}

#[expect(
    clippy::cast_possible_wrap,
    reason = "addresses are reported as the integer with the same bits"
)]
fn address_as_int(target: &Sv) -> i64 {
    target.address() as i64
}
