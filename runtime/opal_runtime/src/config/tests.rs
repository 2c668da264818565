use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_defaults() {
    let config = RuntimeConfig::default();
    assert_eq!(config.mro_recursion_limit, 100);
    assert_eq!(config.reverse_index, ReverseIndexPolicy::Incremental);
    assert_eq!(config.default_mro, MroAlgorithm::Dfs);
    assert_eq!(config.hash_seed, None);
}

#[test]
fn test_builder_setters() {
    let builder = RuntimeBuilder::new()
        .interning(InterningMode::InstanceLocal)
        .hash_seed(7)
        .mro_recursion_limit(12)
        .reverse_index(ReverseIndexPolicy::Lazy)
        .diagnostics(DiagnosticConfig::unlimited())
        .default_mro(MroAlgorithm::C3);
    let config = builder.config();
    assert_eq!(config.interning, InterningMode::InstanceLocal);
    assert_eq!(config.hash_seed, Some(7));
    assert_eq!(config.reverse_index, ReverseIndexPolicy::Lazy);
    assert_eq!(config.default_mro, MroAlgorithm::C3);

    let mro = config.mro();
    assert_eq!(mro.recursion_limit, 12);
    assert_eq!(mro.default_algorithm, MroAlgorithm::C3);
}

#[test]
fn test_explicit_seed_wins() {
    let config = RuntimeConfig {
        hash_seed: Some(99),
        ..RuntimeConfig::default()
    };
    assert_eq!(config.hasher().seed(), KeyHasher::from_seed(99).seed());
}
