// Test code uses unwrap for clarity; a panic is a good failure message
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Runtimes on many threads sharing the process-wide key table.

use opal_runtime::{set_process_wide_interning, InterningMode, Runtime};
use pretty_assertions::assert_eq;
use rayon::prelude::*;

fn work(id: usize) -> usize {
    let mut rt = Runtime::default();
    assert_eq!(rt.config().interning, InterningMode::ProcessWide);
    let package = format!("Worker{}", id % 4);
    rt.set_parents(&package, &["SharedBase"]).unwrap();
    for round in 0..20 {
        rt.intern(&format!("shared_key_{}", round % 5)).unwrap();
    }
    rt.linearize(&package).unwrap().len()
}

#[test]
fn test_instances_share_and_release_keys() {
    set_process_wide_interning(true);
    let lengths: Vec<usize> = (0..64).into_par_iter().map(work).collect();
    assert!(lengths.iter().all(|&len| len == 3));

    let probe = Runtime::default();
    for round in 0..5 {
        assert_eq!(probe.keys().refcount(format!("shared_key_{round}").as_str()), 0);
    }
    assert_eq!(probe.keys().refcount("SharedBase"), 0);

    let mut a = Runtime::default();
    let mut b = Runtime::default();
    let from_a = a.intern("crossing").unwrap();
    let from_b = b.intern("crossing").unwrap();
    assert!(from_a.ptr_eq(&from_b));
    drop(a);
    assert_eq!(probe.keys().refcount("crossing"), 1);
    drop(b);
    assert_eq!(probe.keys().refcount("crossing"), 0);
    set_process_wide_interning(false);
}
