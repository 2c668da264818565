use super::*;
use opal_diagnostic::{AdvisoryKind, DiagnosticConfig, Diagnostics, NullSink};
use opal_hash::{KeyHasher, SharedKeys};
use opal_value::{CodeBody, RuntimeError, RuntimeResult};
use pretty_assertions::assert_eq;

use crate::cache::MroConfig;

fn answer(_args: &[Sv]) -> RuntimeResult<Sv> {
    Ok(Sv::int(42))
}

fn method() -> Sv {
    Sv::code(CodeBody::native(None, answer))
}

fn cache() -> MroCache {
    MroCache::new(SharedKeys::local(KeyHasher::default()), MroConfig::default())
}

fn define(cache: &mut MroCache, package: &str, name: &str) -> Sv {
    let code = method();
    if let Err(err) = cache.define_method(package, name, code.clone(), &NullSink) {
        panic!("define {package}::{name}: {err}");
    }
    code
}

fn owner(found: RuntimeResult<Option<ResolvedMethod>>) -> Option<String> {
    match found {
        Ok(found) => found.map(|found| found.package.to_text()),
        Err(err) => panic!("resolve: {err}"),
    }
}

/// `C` inherits from `B`, which inherits from `A`.
fn chain() -> MroCache {
    let mut cache = cache();
    let _ = cache.define_package("A");
    let _ = cache.set_parents("B", &["A"]);
    let _ = cache.set_parents("C", &["B"]);
    cache
}

#[test]
fn test_inherited_method_resolves_to_definer() {
    let mut cache = chain();
    let code = define(&mut cache, "A", "hello");
    let Ok(Some(found)) = cache.resolve_method("C", "hello", &NullSink) else {
        panic!("hello should be inherited");
    };
    assert!(found.code.ptr_eq(&code));
    assert_eq!(found.package.to_text(), "A");
    assert_eq!(
        found.code.code_body().ok().and_then(|body| body.package).map(|p| p.to_text()),
        Some("A".to_string())
    );
    let result = found.code.code_body().ok().and_then(|body| body.call(&[]));
    assert_eq!(result.map(|sv| sv.and_then(|sv| sv.get_as_int(&NullSink, None))), Some(Ok(42)));
}

#[test]
fn test_override_retires_cached_lookup() {
    let mut cache = chain();
    define(&mut cache, "A", "hello");
    assert_eq!(owner(cache.resolve_method("C", "hello", &NullSink)), Some("A".to_string()));
    define(&mut cache, "B", "hello");
    assert_eq!(owner(cache.resolve_method("C", "hello", &NullSink)), Some("B".to_string()));
}

#[test]
fn test_misses_are_cached_until_a_method_appears() {
    let mut cache = chain();
    assert_eq!(owner(cache.resolve_method("C", "later", &NullSink)), None);
    assert_eq!(cache.can("C", "later", &NullSink), Ok(false));
    define(&mut cache, "A", "later");
    assert_eq!(cache.can("C", "later", &NullSink), Ok(true));
}

#[test]
fn test_parent_change_retires_cached_lookup() {
    let mut cache = chain();
    define(&mut cache, "A", "speak");
    define(&mut cache, "Other", "speak");
    assert_eq!(owner(cache.resolve_method("C", "speak", &NullSink)), Some("A".to_string()));
    let generation = cache.sub_generation();
    let _ = cache.set_parents("B", &["Other"]);
    assert_eq!(cache.sub_generation(), generation);
    assert_eq!(owner(cache.resolve_method("C", "speak", &NullSink)), Some("Other".to_string()));
}

#[test]
fn test_redefinition_advises() {
    let mut cache = cache();
    let diagnostics = Diagnostics::new(DiagnosticConfig::default());
    assert_eq!(cache.define_method("A", "run", method(), &diagnostics), Ok(()));
    assert!(diagnostics.is_empty());
    assert_eq!(cache.define_method("A", "run", method(), &diagnostics), Ok(()));
    let advisories = diagnostics.take();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].kind, AdvisoryKind::Redefined);
    assert_eq!(advisories[0].message, "Subroutine A::run redefined");
}

#[test]
fn test_super_skips_own_definition() {
    let mut cache = chain();
    define(&mut cache, "A", "new");
    define(&mut cache, "B", "new");
    assert_eq!(owner(cache.resolve_method("B", "new", &NullSink)), Some("B".to_string()));
    assert_eq!(owner(cache.resolve_super("B", "new", &NullSink)), Some("A".to_string()));
    assert_eq!(owner(cache.resolve_super("A", "new", &NullSink)), None);
}

#[test]
fn test_missing_parent_is_skipped_with_advisory() {
    let mut cache = cache();
    let diagnostics = Diagnostics::new(DiagnosticConfig::default());
    let _ = cache.set_parents("Child", &["Missing", "Present"]);
    define(&mut cache, "Present", "go");
    assert_eq!(owner(cache.resolve_method("Child", "go", &diagnostics)), Some("Present".to_string()));
    let advisories = diagnostics.take();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].kind, AdvisoryKind::MissingPackage);
    assert_eq!(advisories[0].message, "Can't locate package Missing for @Child::ISA");
}

#[test]
fn test_universal_is_the_last_resort() {
    let mut cache = chain();
    let diagnostics = Diagnostics::new(DiagnosticConfig::default());
    assert_eq!(owner(cache.resolve_method("C", "isa", &diagnostics)), None);
    // An undefined UNIVERSAL is not a missing parent.
    assert!(diagnostics.is_empty());
    define(&mut cache, "UNIVERSAL", "isa");
    assert_eq!(owner(cache.resolve_method("C", "isa", &diagnostics)), Some("UNIVERSAL".to_string()));
}

#[test]
fn test_remove_method() {
    let mut cache = chain();
    define(&mut cache, "A", "gone");
    assert_eq!(cache.can("C", "gone", &NullSink), Ok(true));
    assert!(matches!(cache.remove_method("A", "gone"), Ok(Some(_))));
    assert_eq!(cache.can("C", "gone", &NullSink), Ok(false));
    assert!(matches!(cache.remove_method("A", "gone"), Ok(None)));
}

#[test]
fn test_only_code_can_be_a_method() {
    let mut cache = cache();
    let result = cache.define_method("A", "value", Sv::int(1), &NullSink);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { .. })));
}

#[test]
fn test_cycle_fails_resolution() {
    let mut cache = cache();
    let _ = cache.set_parents("A", &["B"]);
    let _ = cache.set_parents("B", &["A"]);
    assert!(matches!(
        cache.resolve_method("A", "anything", &NullSink),
        Err(RuntimeError::InheritanceCycle { .. })
    ));
}
