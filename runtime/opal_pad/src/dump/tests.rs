use super::*;
use opal_diagnostic::NullSink;
use opal_hash::{KeyHasher, SharedKeys};
use pretty_assertions::assert_eq;

use crate::name::{Declarator, Sigil, Slot};

#[test]
fn test_dump_pad_lists_every_slot() {
    let mut arena = PadArena::new(SharedKeys::local(KeyHasher::default()));
    let Ok(file) = arena.new_unit(Some("main"), None) else {
        panic!("unit");
    };
    let _ = arena.add_name(file, "x", Sigil::Scalar, Declarator::My, &NullSink);
    let _ = arena.intro_names(file);
    let _ = arena.add_temp_slot(file);
    let Ok(anon) = arena.new_unit(None, Some(file)) else {
        panic!("unit");
    };
    let _ = arena.lookup(anon, "x", Sigil::Scalar);
    let _ = arena.add_closure_slot(file, anon);
    let _ = arena.add_name(file, "later", Sigil::Array, Declarator::State, &NullSink);

    assert_eq!(
        arena.dump_pad(file).as_deref(),
        Ok("unit 0 (main)\n   0. $x [1..open]\n   1. <temp>\n   2. &__ANON__ [closure 1]\n   3. @later [pending..open] state\n")
    );
    assert_eq!(
        arena.dump_pad(anon).as_deref(),
        Ok("unit 1\n   0. $x [outer <- slot 0]\n")
    );
    assert!(arena.dump_pad(UnitId(anon.0 + 1)).is_err());
}

#[test]
fn test_dump_activation_shows_values() {
    let mut arena = PadArena::new(SharedKeys::local(KeyHasher::default()));
    let Ok(unit) = arena.new_unit(None, None) else {
        panic!("unit");
    };
    let _ = arena.add_name(unit, "n", Sigil::Scalar, Declarator::My, &NullSink);
    let _ = arena.add_name(unit, "s", Sigil::Scalar, Declarator::My, &NullSink);
    let _ = arena.add_name(unit, "h", Sigil::Hash, Declarator::My, &NullSink);
    let _ = arena.intro_names(unit);
    let Ok(id) = arena.clone_for_activation(unit, None) else {
        panic!("clone");
    };
    if let Ok(cell) = arena.cell(id, Slot(0)) {
        let _ = cell.set_int(42);
    }
    assert_eq!(
        arena.dump_activation(id),
        Ok(format!(
            "activation {}/{} of unit 0 depth 0\n   0. $n [1..open] = \"42\"\n   1. $s [1..open] = undef\n   2. %h [1..open] = Hash\n",
            id.index, id.generation
        ))
    );

    let _ = arena.release_activation(id);
    assert!(arena.dump_activation(id).is_err());
}
