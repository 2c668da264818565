use super::*;
use opal_hash::KeyHasher;
use opal_value::CodeBody;
use pretty_assertions::assert_eq;

fn table() -> PackageTable {
    PackageTable::new(SharedKeys::local(KeyHasher::default()))
}

fn texts(keys: &[HashKey]) -> Vec<String> {
    keys.iter().map(HashKey::to_text).collect()
}

#[test]
fn test_define_is_idempotent() {
    let mut packages = table();
    let (Ok(first), Ok(second)) = (packages.define("Animal"), packages.define("Animal")) else {
        panic!("define");
    };
    assert!(first.ptr_eq(&second));
    assert_eq!(packages.len(), 1);
    assert!(packages.contains("Animal"));
    assert!(!packages.contains("Plant"));
}

#[test]
fn test_parents_round_trip_through_isa() {
    let mut packages = table();
    assert_eq!(packages.write_parents("Dog", &["Animal", "Pet"]), Ok(()));
    let dog = packages.lookup_key("Dog");
    assert_eq!(packages.parents(&dog).map(|p| texts(&p)), Ok(vec!["Animal".to_string(), "Pet".to_string()]));

    assert_eq!(packages.write_parents("Dog", &["Wolf"]), Ok(()));
    assert_eq!(packages.parents(&dog).map(|p| texts(&p)), Ok(vec!["Wolf".to_string()]));
}

#[test]
fn test_missing_package_has_no_parents() {
    let packages = table();
    let ghost = packages.lookup_key("Ghost");
    assert_eq!(packages.parents(&ghost), Ok(Vec::new()));
    assert!(matches!(packages.own_method(&ghost, "boo"), Ok(None)));
}

#[test]
fn test_only_code_entries_are_methods() {
    let mut packages = table();
    let Ok(stash) = packages.define("Counter") else {
        panic!("define");
    };
    let _ = stash.hash_store("count", Sv::int(3));
    let _ = packages.store_method("Counter", "inc", Sv::code(CodeBody::default()));
    let _ = packages.write_parents("Counter", &["Base"]);
    let counter = packages.lookup_key("Counter");

    assert_eq!(packages.own_method(&counter, "count").map(|m| m.is_some()), Ok(false));
    assert_eq!(packages.own_method(&counter, "inc").map(|m| m.is_some()), Ok(true));
    assert_eq!(packages.own_method(&counter, ISA).map(|m| m.is_some()), Ok(false));

    // Removing a non-method leaves it alone.
    assert_eq!(packages.remove_method("Counter", "count").map(|m| m.is_some()), Ok(false));
    assert_eq!(stash.hash_exists("count"), Ok(true));
    assert_eq!(packages.remove_method("Counter", "inc").map(|m| m.is_some()), Ok(true));
    assert_eq!(packages.own_method(&counter, "inc").map(|m| m.is_some()), Ok(false));
}

#[test]
fn test_scalar_isa_is_rejected() {
    let mut packages = table();
    let Ok(stash) = packages.define("Odd") else {
        panic!("define");
    };
    let _ = stash.hash_store(ISA, Sv::string("Base"));
    let odd = packages.lookup_key("Odd");
    assert_eq!(packages.parents(&odd), Ok(Vec::new()));
    assert!(packages.write_parents("Odd", &["Base"]).is_err());
}

#[test]
fn test_package_names_are_interned() {
    let keys = SharedKeys::local(KeyHasher::default());
    let mut packages = PackageTable::new(keys.clone());
    let _ = packages.define("Shared");
    let Some(key) = packages.key("Shared") else {
        panic!("key");
    };
    let Ok(interned) = keys.intern_key("Shared") else {
        panic!("intern");
    };
    assert!(key.ptr_eq(&interned));
    assert_eq!(texts(&packages.names()), vec!["Shared".to_string()]);
}
