use super::*;
use opal_hash::KeyHasher;
use pretty_assertions::assert_eq;

fn order(names: &[&str]) -> Linearization {
    Linearization::new(
        names
            .iter()
            .map(|name| HashKey::new(*name, KeyHasher::default()))
            .collect(),
    )
}

#[test]
fn test_inherited_drops_trailing_universal() {
    let full = order(&["C", "B", "UNIVERSAL"]);
    assert_eq!(full.inherited().len(), 2);
    assert_eq!(full.names(), vec!["C", "B", "UNIVERSAL"]);

    let bare = order(&["UNIVERSAL", "C"]);
    assert_eq!(bare.inherited().len(), 2);
}

#[test]
fn test_clones_share_storage() {
    let first = order(&["A"]);
    let second = first.clone();
    assert!(first.ptr_eq(&second));
    assert!(!first.ptr_eq(&order(&["A"])));
    assert_eq!(first, order(&["A"]));
    assert_eq!(format!("{first:?}"), "[\"A\"]");
}

#[test]
fn test_algorithm_names() {
    for algorithm in [MroAlgorithm::Dfs, MroAlgorithm::C3] {
        assert_eq!(MroAlgorithm::from_name(algorithm.name()), Some(algorithm));
    }
    assert_eq!(MroAlgorithm::from_name("bfs"), None);
    assert_eq!(MroAlgorithm::default(), MroAlgorithm::Dfs);
}
