use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_ascii_has_no_flags() {
    let key = KeyRef::utf8("count");
    assert_eq!(key.flags(), KeyFlags::empty());
    assert_eq!(key.as_bytes(), b"count");
}

#[test]
fn test_latin1_downgrades() {
    let key = KeyRef::utf8("caf\u{e9}");
    assert_eq!(key.flags(), KeyFlags::WAS_UTF8);
    assert_eq!(key.as_bytes(), b"caf\xe9");
}

#[test]
fn test_wide_chars_stay_utf8() {
    let key = KeyRef::utf8("\u{263a}");
    assert!(key.is_utf8());
    assert_eq!(key.as_bytes(), "\u{263a}".as_bytes());
}

#[test]
fn test_downgraded_equals_raw_bytes() {
    let hasher = KeyHasher::default();
    let from_text = HashKey::new("caf\u{e9}", hasher);
    let from_bytes = HashKey::new(&b"caf\xe9"[..], hasher);
    assert_eq!(from_text, from_bytes);
}

#[test]
fn test_utf8_flag_distinguishes_keys() {
    let hasher = KeyHasher::default();
    let wide = HashKey::new("\u{263a}", hasher);
    let raw = HashKey::new("\u{263a}".as_bytes(), hasher);
    assert_ne!(wide, raw);
}

#[test]
fn test_with_flags_normalizes() {
    let key = KeyRef::with_flags("caf\u{e9}".as_bytes(), KeyFlags::UTF8);
    assert_eq!(key.flags(), KeyFlags::WAS_UTF8);
    assert_eq!(key.as_bytes(), b"caf\xe9");
}

#[test]
fn test_ptr_eq_and_handle_count() {
    let key = HashKey::new("x", KeyHasher::default());
    let alias = key.clone();
    assert!(key.ptr_eq(&alias));
    assert_eq!(key.handle_count(), 2);
    let other = HashKey::new("x", KeyHasher::default());
    assert!(!key.ptr_eq(&other));
    assert_eq!(key, other);
}

#[test]
fn test_to_text() {
    let hasher = KeyHasher::default();
    assert_eq!(HashKey::new("caf\u{e9}", hasher).to_text(), "caf\u{e9}");
    assert_eq!(HashKey::new("\u{263a}", hasher).to_text(), "\u{263a}");
}
