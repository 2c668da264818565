use super::*;
use crate::Site;

#[test]
fn test_diagnostics_collects_through_trait() {
    let diags = Diagnostics::default();
    let sink: &dyn AdvisorySink = &diags;
    sink.advise(Advisory::not_numeric(b"abc").at(Some(Site(1))));
    sink.advise(Advisory::not_numeric(b"abc").at(Some(Site(1))));
    assert_eq!(diags.len(), 1);
    assert_eq!(diags.count_of(AdvisoryKind::NotNumeric), 1);

    let taken = diags.take();
    assert_eq!(taken.len(), 1);
    assert!(diags.is_empty());
}

#[test]
fn test_null_sink_discards() {
    let sink = NullSink;
    sink.advise(Advisory::uninitialized("print"));
}

#[test]
fn test_reset_rearms_sites() {
    let diags = Diagnostics::new(DiagnosticConfig::default());
    diags.advise(Advisory::uninitialized("print").at(Some(Site(4))));
    diags.advise(Advisory::uninitialized("print").at(Some(Site(4))));
    assert_eq!(diags.len(), 1);
    diags.reset();
    diags.advise(Advisory::uninitialized("print").at(Some(Site(4))));
    assert_eq!(diags.len(), 1);
}
