//! Hash keys.
//!
//! A key is immutable bytes plus its hash and encoding flags. Keys are
//! shared (`Arc`) so interned keys can be handed out to many tables and
//! compared by identity; a key that is not interned is simply a key with
//! one owner.

// Arc is the representation of HashKey: keys cross threads when interning
// is process-wide.
#![expect(
    clippy::disallowed_types,
    reason = "Arc is the implementation of HashKey"
)]

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;

use crate::KeyHasher;

bitflags! {
    /// Encoding flags carried by a key.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct KeyFlags: u8 {
        /// Bytes are UTF-8 encoded characters (some above U+00FF).
        const UTF8 = 1 << 0;
        /// Key was supplied as UTF-8 but downgraded to single bytes.
        const WAS_UTF8 = 1 << 1;
    }
}

impl KeyFlags {
    /// Flags that take part in key identity.
    pub const IDENTITY: KeyFlags = KeyFlags::UTF8;
}

/// Borrowed key used for lookups, already in normalized form.
#[derive(Clone, Debug)]
pub struct KeyRef<'a> {
    bytes: Cow<'a, [u8]>,
    flags: KeyFlags,
    origin: Option<&'a HashKey>,
}

impl<'a> KeyRef<'a> {
    /// Raw bytes with no encoding semantics.
    pub fn bytes(bytes: &'a [u8]) -> Self {
        KeyRef {
            bytes: Cow::Borrowed(bytes),
            flags: KeyFlags::empty(),
            origin: None,
        }
    }

    /// Character string. Pure ASCII stays as-is; strings whose characters
    /// all fit in one byte are downgraded to Latin-1 bytes and flagged
    /// `WAS_UTF8`; anything wider keeps UTF-8 bytes and the `UTF8` flag.
    pub fn utf8(text: &'a str) -> Self {
        if text.is_ascii() {
            return KeyRef::bytes(text.as_bytes());
        }
        let downgraded: Option<Vec<u8>> = text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect();
        match downgraded {
            Some(latin1) => KeyRef {
                bytes: Cow::Owned(latin1),
                flags: KeyFlags::WAS_UTF8,
                origin: None,
            },
            None => KeyRef {
                bytes: Cow::Borrowed(text.as_bytes()),
                flags: KeyFlags::UTF8,
                origin: None,
            },
        }
    }

    /// Bytes already encoded with known flags (e.g. from a value cell).
    pub fn with_flags(bytes: &'a [u8], flags: KeyFlags) -> Self {
        if flags.contains(KeyFlags::UTF8) {
            if let Ok(text) = std::str::from_utf8(bytes) {
                return KeyRef::utf8(text);
            }
        }
        KeyRef {
            bytes: Cow::Borrowed(bytes),
            flags: flags - KeyFlags::UTF8,
            origin: None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn flags(&self) -> KeyFlags {
        self.flags
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(KeyFlags::UTF8)
    }

    /// The existing key this lookup was made from, if any.
    pub(crate) fn origin(&self) -> Option<&'a HashKey> {
        self.origin
    }

    /// Make an owned key hashed with `hasher`.
    pub fn to_key(&self, hasher: KeyHasher) -> HashKey {
        self.to_key_hashed(hasher.hash(&self.bytes))
    }

    /// Make an owned key with a hash the caller already computed. Reuses
    /// the originating key when its hash agrees.
    pub(crate) fn to_key_hashed(&self, hash: u32) -> HashKey {
        match self.origin {
            Some(origin) if origin.hash_value() == hash => origin.clone(),
            _ => HashKey::from_parts(self.bytes.to_vec(), hash, self.flags),
        }
    }
}

impl<'a> From<&'a str> for KeyRef<'a> {
    fn from(text: &'a str) -> Self {
        KeyRef::utf8(text)
    }
}

impl<'a> From<&'a String> for KeyRef<'a> {
    fn from(text: &'a String) -> Self {
        KeyRef::utf8(text)
    }
}

impl<'a> From<&'a [u8]> for KeyRef<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        KeyRef::bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for KeyRef<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        KeyRef::bytes(bytes)
    }
}

impl<'a> From<&'a HashKey> for KeyRef<'a> {
    fn from(key: &'a HashKey) -> Self {
        KeyRef {
            bytes: Cow::Borrowed(key.as_bytes()),
            flags: key.flags(),
            origin: Some(key),
        }
    }
}

struct KeyData {
    bytes: Box<[u8]>,
    hash: u32,
    flags: KeyFlags,
}

/// An immutable, shareable hash key.
///
/// Equality compares identity first, then (hash, bytes, UTF-8 flag).
#[derive(Clone)]
pub struct HashKey(Arc<KeyData>);

impl HashKey {
    pub(crate) fn from_parts(bytes: Vec<u8>, hash: u32, flags: KeyFlags) -> Self {
        HashKey(Arc::new(KeyData {
            bytes: bytes.into_boxed_slice(),
            hash,
            flags,
        }))
    }

    /// Build a standalone key from anything key-like.
    pub fn new<'a>(key: impl Into<KeyRef<'a>>, hasher: KeyHasher) -> Self {
        key.into().to_key(hasher)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    /// Hash computed when the key was made.
    pub fn hash_value(&self) -> u32 {
        self.0.hash
    }

    pub fn flags(&self) -> KeyFlags {
        self.0.flags
    }

    pub fn is_utf8(&self) -> bool {
        self.0.flags.contains(KeyFlags::UTF8)
    }

    pub fn len(&self) -> usize {
        self.0.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.bytes.is_empty()
    }

    /// Same allocation: the fast path for interned names.
    #[inline]
    pub fn ptr_eq(&self, other: &HashKey) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this key (table entries, pads, caches).
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Does this key match (hash, bytes, flags) under key identity rules?
    #[inline]
    pub(crate) fn matches(&self, hash: u32, bytes: &[u8], flags: KeyFlags) -> bool {
        self.0.hash == hash
            && self.0.bytes.len() == bytes.len()
            && *self.0.bytes == *bytes
            && (self.0.flags ^ flags).intersection(KeyFlags::IDENTITY).is_empty()
    }

    /// Text form: UTF-8 keys decode directly, byte keys map each byte to a
    /// character.
    pub fn to_text(&self) -> String {
        if self.is_utf8() {
            String::from_utf8_lossy(self.as_bytes()).into_owned()
        } else {
            self.as_bytes().iter().copied().map(char::from).collect()
        }
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || other.matches(self.0.hash, &self.0.bytes, self.0.flags)
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0.hash);
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashKey({:?}", self.to_text())?;
        if !self.flags().is_empty() {
            write!(f, ", {:?}", self.flags())?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests;
