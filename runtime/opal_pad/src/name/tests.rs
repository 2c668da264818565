use super::*;
use opal_hash::KeyHasher;
use pretty_assertions::assert_eq;

fn key(name: &str) -> HashKey {
    HashKey::new(name, KeyHasher::default())
}

#[test]
fn test_pending_name_is_invisible() {
    let name = PadName::new(key("x"), Sigil::Scalar, Declarator::My);
    assert!(name.is_pending());
    assert!(name.is_open());
    assert!(!name.visible_at(1));
    assert!(!name.visible_at(u32::MAX));
}

#[test]
fn test_visibility_range_excludes_intro_sequence() {
    let mut name = PadName::new(key("x"), Sigil::Scalar, Declarator::My);
    name.min_seq = Some(5);
    assert!(!name.visible_at(5));
    assert!(name.visible_at(6));
    assert!(name.visible_at(1000));

    name.max_seq = Some(8);
    assert!(name.visible_at(8));
    assert!(!name.visible_at(9));
}

#[test]
fn test_captured_name_is_always_visible() {
    let mut template = PadName::new(key("x"), Sigil::Scalar, Declarator::State);
    template.flags.insert(PadNameFlags::CLOSURE);
    let alias = PadName::captured(&template, Slot(3));
    assert!(alias.is_captured());
    assert!(alias.is_state());
    assert!(!alias.flags().contains(PadNameFlags::CLOSURE));
    assert_eq!(alias.outer_slot(), Some(Slot(3)));
    assert!(alias.visible_at(0));
    assert!(!alias.is_pending());
}

#[test]
fn test_declarators_set_flags() {
    let pkg = key("main");
    let our = PadName::new(key("v"), Sigil::Array, Declarator::Our(pkg.clone()));
    assert!(our.is_our());
    assert_eq!(our.package(), Some(&pkg));
    assert_eq!(Declarator::Our(pkg).keyword(), "our");
    assert_eq!(Declarator::State.keyword(), "state");
    assert_eq!(Declarator::My.keyword(), "my");
}

#[test]
fn test_matches_needs_name_and_sigil() {
    let name = PadName::new(key("x"), Sigil::Scalar, Declarator::My);
    assert!(name.matches(&key("x"), Sigil::Scalar));
    assert!(!name.matches(&key("x"), Sigil::Array));
    assert!(!name.matches(&key("y"), Sigil::Scalar));
}

#[test]
fn test_display_and_sigils() {
    let name = PadName::new(key("list"), Sigil::Array, Declarator::My);
    assert_eq!(name.to_string(), "@list");
    for c in ['$', '@', '%', '&'] {
        assert_eq!(Sigil::from_char(c).map(Sigil::as_char), Some(c));
    }
    assert_eq!(Sigil::from_char('*'), None);
}

#[test]
fn test_fresh_cells_match_sigil() {
    assert_eq!(Sigil::Scalar.fresh_cell().kind(), opal_value::SvType::Undef);
    assert_eq!(Sigil::Array.fresh_cell().kind(), opal_value::SvType::Array);
    assert_eq!(Sigil::Hash.fresh_cell().kind(), opal_value::SvType::Hash);
}
