use super::*;
use opal_diagnostic::NullSink;
use opal_hash::{KeyHasher, SharedKeys};
use opal_value::SvType;
use pretty_assertions::assert_eq;

use crate::name::{Declarator, PadNameFlags, Sigil};

fn arena() -> PadArena {
    PadArena::new(SharedKeys::local(KeyHasher::default()))
}

fn declare(arena: &mut PadArena, unit: UnitId, name: &str, declarator: Declarator) -> Slot {
    let slot = arena
        .add_name(unit, name, Sigil::Scalar, declarator, &NullSink)
        .unwrap_or(Slot(u32::MAX));
    if let Err(err) = arena.intro_names(unit) {
        panic!("intro names: {err}");
    }
    slot
}

fn new_unit(arena: &mut PadArena, outer: Option<UnitId>) -> UnitId {
    match arena.new_unit(None, outer) {
        Ok(unit) => unit,
        Err(err) => panic!("new unit: {err}"),
    }
}

/// A closure prototype slot in `unit` for a `nested` unit that was not
/// compiled inside it, which the compile-time checks never let through.
fn add_misplaced_closure(arena: &mut PadArena, unit: UnitId, nested: UnitId) {
    let Ok(key) = arena.intern("__ANON__") else {
        panic!("intern");
    };
    let mut entry = PadName::new(key, Sigil::Code, Declarator::My);
    entry.flags.insert(PadNameFlags::CLOSURE);
    entry.nested = Some(nested);
    let Ok(unit) = arena.unit_mut(unit) else {
        panic!("unit");
    };
    let _ = unit.names.push(Some(entry));
}

fn activation_of(code: &Sv) -> ActivationId {
    match code.code_body().map(|body| body.activation) {
        Ok(Some(id)) => id,
        other => panic!("not a closure: {other:?}"),
    }
}

/// `my $x; sub { $x }`: the file unit, its `$x`, the anonymous unit, and
/// the slot of the file unit holding the closure prototype.
struct Fixture {
    arena: PadArena,
    file: UnitId,
    x: Slot,
    anon: UnitId,
    anon_x: Slot,
    prototype: Slot,
}

fn closure_fixture() -> Fixture {
    let mut arena = arena();
    let file = new_unit(&mut arena, None);
    let x = declare(&mut arena, file, "x", Declarator::My);
    let anon = new_unit(&mut arena, Some(file));
    let Some(anon_x) = arena.lookup(anon, "x", Sigil::Scalar) else {
        panic!("x should be captured");
    };
    let Ok(prototype) = arena.add_closure_slot(file, anon) else {
        panic!("closure slot");
    };
    Fixture {
        arena,
        file,
        x,
        anon,
        anon_x,
        prototype,
    }
}

#[test]
fn test_closure_shares_captured_cell() {
    let Fixture {
        mut arena,
        file,
        x,
        anon_x,
        prototype,
        ..
    } = closure_fixture();
    let Ok(main) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    let (Ok(outer_x), Ok(code)) = (arena.cell(main, x), arena.cell(main, prototype)) else {
        panic!("cells");
    };
    assert_eq!(code.kind(), SvType::Code);
    let closure = activation_of(&code);
    let Ok(inner_x) = arena.cell(closure, anon_x) else {
        panic!("captured cell");
    };
    assert!(inner_x.ptr_eq(&outer_x));

    assert_eq!(outer_x.set_int(5), Ok(()));
    assert_eq!(inner_x.get_as_int(&NullSink, None), Ok(5));
}

#[test]
fn test_each_closure_gets_its_own_activation() {
    let Fixture {
        mut arena,
        file,
        anon,
        anon_x,
        ..
    } = closure_fixture();
    let Ok(main) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    let (Ok(first), Ok(second)) = (
        arena.make_closure(anon, Some(main)),
        arena.make_closure(anon, Some(main)),
    ) else {
        panic!("closures");
    };
    let (first, second) = (activation_of(&first), activation_of(&second));
    assert_ne!(first, second);
    let (Ok(a), Ok(b)) = (arena.cell(first, anon_x), arena.cell(second, anon_x)) else {
        panic!("cells");
    };
    // Both closures see the same outer variable.
    assert!(a.ptr_eq(&b));
}

#[test]
fn test_clone_against_unrelated_activation_fails() {
    let Fixture {
        mut arena, anon, ..
    } = closure_fixture();
    let Ok(wrong) = arena.clone_for_activation(anon, None) else {
        panic!("clone");
    };
    let result = arena.clone_for_activation(anon, Some(wrong));
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { .. })));
}

#[test]
fn test_clone_without_outer_gets_fresh_cells() {
    let Fixture {
        mut arena,
        anon,
        anon_x,
        ..
    } = closure_fixture();
    let Ok(id) = arena.clone_for_activation(anon, None) else {
        panic!("clone");
    };
    let Ok(cell) = arena.cell(id, anon_x) else {
        panic!("cell");
    };
    assert!(!cell.is_defined());
    assert_eq!(cell.refcount(), 2);
}

#[test]
fn test_recursion_frames_share_captured_and_state() {
    let mut arena = arena();
    let file = new_unit(&mut arena, None);
    declare(&mut arena, file, "total", Declarator::My);
    let f = new_unit(&mut arena, Some(file));
    let n = declare(&mut arena, f, "n", Declarator::My);
    let count = declare(&mut arena, f, "count", Declarator::State);
    let Some(total) = arena.lookup(f, "total", Sigil::Scalar) else {
        panic!("capture");
    };
    let Ok(main) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    let Ok(base) = arena.clone_for_activation(f, Some(main)) else {
        panic!("clone");
    };

    assert_eq!(arena.push_activation(base), Ok(base));
    let Ok(frame) = arena.push_activation(base) else {
        panic!("frame");
    };
    assert_ne!(frame, base);
    assert_eq!(arena.activation(base).map(Activation::depth), Ok(2));
    assert_eq!(arena.activation(frame).map(Activation::is_frame), Ok(true));

    let cells = |arena: &PadArena, id, slot| match arena.cell(id, slot) {
        Ok(cell) => cell,
        Err(err) => panic!("cell: {err}"),
    };
    assert!(!cells(&arena, frame, n).ptr_eq(&cells(&arena, base, n)));
    assert!(cells(&arena, frame, count).ptr_eq(&cells(&arena, base, count)));
    assert!(cells(&arena, frame, total).ptr_eq(&cells(&arena, base, total)));

    assert_eq!(arena.pop_activation(frame), Ok(()));
    assert!(!arena.is_live(frame));
    assert_eq!(arena.activation(base).map(Activation::depth), Ok(1));
}

#[test]
fn test_last_pop_renews_plain_cells() {
    let mut arena = arena();
    let f = new_unit(&mut arena, None);
    let n = declare(&mut arena, f, "n", Declarator::My);
    let count = declare(&mut arena, f, "count", Declarator::State);
    let Ok(base) = arena.clone_for_activation(f, None) else {
        panic!("clone");
    };
    let _ = arena.push_activation(base);
    let (Ok(old_n), Ok(old_count)) = (arena.cell(base, n), arena.cell(base, count)) else {
        panic!("cells");
    };
    assert_eq!(old_n.set_int(1), Ok(()));
    assert_eq!(old_count.set_int(7), Ok(()));

    assert_eq!(arena.pop_activation(base), Ok(()));
    let (Ok(new_n), Ok(new_count)) = (arena.cell(base, n), arena.cell(base, count)) else {
        panic!("cells");
    };
    assert!(!new_n.ptr_eq(&old_n));
    assert!(!new_n.is_defined());
    // Whoever held on to the old cell still sees its value.
    assert_eq!(old_n.get_as_int(&NullSink, None), Ok(1));
    assert!(new_count.ptr_eq(&old_count));
}

#[test]
fn test_released_handle_is_stale() {
    let Fixture {
        mut arena, file, x, ..
    } = closure_fixture();
    let Ok(id) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    assert_eq!(arena.release_activation(id), Ok(()));
    let stale = RuntimeError::StaleActivation {
        index: id.index,
        generation: id.generation,
    };
    assert_eq!(arena.cell(id, x).err(), Some(stale.clone()));
    assert_eq!(arena.release_activation(id), Err(stale.clone()));

    // The slot is reused under a new generation; the old handle stays stale.
    let Ok(again) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    assert_eq!(again.index, id.index);
    assert_ne!(again.generation, id.generation);
    assert_eq!(arena.cell(id, x).err(), Some(stale));
    assert!(arena.cell(again, x).is_ok());
}

#[test]
fn test_nested_prototypes_are_cloned_recursively() {
    let mut arena = arena();
    let file = new_unit(&mut arena, None);
    let x = declare(&mut arena, file, "x", Declarator::My);
    let middle = new_unit(&mut arena, Some(file));
    let inner = new_unit(&mut arena, Some(middle));
    let Some(inner_x) = arena.lookup(inner, "x", Sigil::Scalar) else {
        panic!("capture");
    };
    let (Ok(middle_proto), Ok(inner_proto)) = (
        arena.add_closure_slot(file, middle),
        arena.add_closure_slot(middle, inner),
    ) else {
        panic!("closure slots");
    };

    let Ok(main) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    // main, the middle closure, and the inner closure it holds.
    assert_eq!(arena.live_activations(), 3);
    let Ok(middle_code) = arena.cell(main, middle_proto) else {
        panic!("middle closure");
    };
    let Ok(inner_code) = arena.cell(activation_of(&middle_code), inner_proto) else {
        panic!("inner closure");
    };
    let (Ok(deep), Ok(top)) = (arena.cell(activation_of(&inner_code), inner_x), arena.cell(main, x)) else {
        panic!("cells");
    };
    assert!(deep.ptr_eq(&top));
}

#[test]
fn test_sweep_discards_activations_of_dropped_closures() {
    let mut arena = arena();
    let file = new_unit(&mut arena, None);
    let middle = new_unit(&mut arena, Some(file));
    let inner = new_unit(&mut arena, Some(middle));
    let _ = arena.add_closure_slot(middle, inner);
    let Ok(main) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    let Ok(code) = arena.make_closure(middle, Some(main)) else {
        panic!("closure");
    };
    let closure = activation_of(&code);
    assert_eq!(arena.live_activations(), 3);
    assert_eq!(arena.sweep(), 0);

    drop(code);
    // The middle activation goes first, which frees the inner closure.
    assert_eq!(arena.sweep(), 2);
    assert_eq!(arena.live_activations(), 1);
    assert!(!arena.is_live(closure));
    assert!(arena.is_live(main));
}

#[test]
fn test_running_activation_is_not_swept() {
    let Fixture {
        mut arena,
        file,
        anon,
        ..
    } = closure_fixture();
    let Ok(main) = arena.clone_for_activation(file, None) else {
        panic!("clone");
    };
    let Ok(code) = arena.make_closure(anon, Some(main)) else {
        panic!("closure");
    };
    let id = activation_of(&code);
    let _ = arena.push_activation(id);
    drop(code);
    assert_eq!(arena.sweep(), 0);
    assert_eq!(arena.pop_activation(id), Ok(()));
    assert_eq!(arena.sweep(), 1);
}

#[test]
fn test_failed_clone_leaves_no_activations() {
    let Fixture {
        mut arena, file, ..
    } = closure_fixture();
    let stray = new_unit(&mut arena, None);
    add_misplaced_closure(&mut arena, file, stray);

    let result = arena.clone_for_activation(file, None);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { .. })));
    // Neither the file activation nor the closure made before the failure.
    assert_eq!(arena.live_activations(), 0);
    assert!(arena.activation_ids().is_empty());
}

#[test]
fn test_failed_frame_push_restores_depth() {
    let mut arena = arena();
    let f = new_unit(&mut arena, None);
    declare(&mut arena, f, "n", Declarator::My);
    let Ok(base) = arena.clone_for_activation(f, None) else {
        panic!("clone");
    };
    let stray = new_unit(&mut arena, None);
    add_misplaced_closure(&mut arena, f, stray);

    assert_eq!(arena.push_activation(base), Ok(base));
    let result = arena.push_activation(base);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { .. })));
    assert_eq!(arena.live_activations(), 1);
    assert_eq!(arena.activation(base).map(Activation::depth), Ok(1));
    assert_eq!(arena.pop_activation(base), Ok(()));
    assert_eq!(arena.activation(base).map(Activation::depth), Ok(0));
}
