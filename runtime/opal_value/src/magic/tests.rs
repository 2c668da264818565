use super::*;
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::{RuntimeError, SvType};
use opal_diagnostic::NullSink;
use pretty_assertions::assert_eq;

type Log = &'static RefCell<Vec<String>>;

fn new_log() -> Log {
    Box::leak(Box::new(RefCell::new(Vec::new())))
}

struct Recorder {
    name: &'static str,
    log: Log,
}

impl MagicVtable for Recorder {
    fn get(&self, _sv: &Sv) -> RuntimeResult<()> {
        self.log.borrow_mut().push(format!("get {}", self.name));
        Ok(())
    }

    fn set(&self, sv: &Sv) -> RuntimeResult<()> {
        let value = sv.get_as_int(&NullSink, None)?;
        self.log
            .borrow_mut()
            .push(format!("set {} = {value}", self.name));
        Ok(())
    }

    fn free(&self) {
        self.log.borrow_mut().push(format!("free {}", self.name));
    }
}

#[test]
fn test_hooks_run_in_attach_order() {
    let log = new_log();
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::Tied, Recorder { name: "a", log }).unwrap();
    sv.attach_magic(MagicKind::Ext, Recorder { name: "b", log }).unwrap();
    assert_eq!(sv.kind(), SvType::Magical);

    sv.set_int(3).unwrap();
    assert_eq!(log.borrow().as_slice(), ["set a = 3", "set b = 3"]);

    log.borrow_mut().clear();
    assert_eq!(sv.get_as_int(&NullSink, None).unwrap(), 3);
    assert_eq!(log.borrow().as_slice(), ["get a", "get b"]);
    assert!(!sv.flags().contains(SvFlags::IN_MAGIC));
}

#[test]
fn test_free_runs_on_detach_and_on_destruction() {
    let log = new_log();
    let sv = Sv::int(1);
    sv.attach_magic(MagicKind::Tied, Recorder { name: "a", log }).unwrap();
    sv.attach_magic(MagicKind::Ext, Recorder { name: "b", log }).unwrap();

    assert!(sv.detach_magic(MagicKind::Tied));
    assert!(!sv.detach_magic(MagicKind::Tied));
    assert_eq!(log.borrow().as_slice(), ["free a"]);
    assert_eq!(sv.magic_kinds(), vec![MagicKind::Ext]);
    // Detaching never downgrades.
    assert_eq!(sv.kind(), SvType::Magical);

    drop(sv);
    assert_eq!(log.borrow().as_slice(), ["free a", "free b"]);
}

struct Counter {
    value: Cell<i64>,
}

impl MagicVtable for Counter {
    fn get(&self, sv: &Sv) -> RuntimeResult<()> {
        self.value.set(self.value.get() + 1);
        sv.set_int(self.value.get())
    }
}

#[test]
fn test_get_hook_materializes_value() {
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::Tied, Counter { value: Cell::new(0) })
        .unwrap();
    assert_eq!(sv.get_as_int(&NullSink, None).unwrap(), 1);
    assert_eq!(sv.get_as_int(&NullSink, None).unwrap(), 2);
    assert_eq!(sv.get_as_string(&NullSink, None).unwrap(), "3");
}

struct Failing;

impl MagicVtable for Failing {
    fn get(&self, _sv: &Sv) -> RuntimeResult<()> {
        Err(RuntimeError::Immutable)
    }
}

#[test]
fn test_hook_error_aborts_read() {
    let sv = Sv::int(1);
    sv.attach_magic(MagicKind::Ext, Failing).unwrap();
    assert_eq!(sv.get_as_int(&NullSink, None), Err(RuntimeError::Immutable));
    assert!(!sv.flags().contains(SvFlags::IN_MAGIC));
}

#[test]
fn test_restricted_magic_refuses_writes() {
    let sv = Sv::int(1);
    sv.attach_magic(MagicKind::Restricted, RestrictedMagic).unwrap();
    assert_eq!(sv.set_int(2), Err(RuntimeError::Immutable));
    assert_eq!(sv.get_as_int(&NullSink, None).unwrap(), 1);

    sv.detach_magic(MagicKind::Restricted);
    sv.set_int(2).unwrap();
    assert_eq!(sv.get_as_int(&NullSink, None).unwrap(), 2);
}

#[test]
fn test_restricted_aggregate_refuses_mutation() {
    let array = Sv::array(vec![Sv::int(1)]);
    array.attach_magic(MagicKind::Restricted, RestrictedMagic).unwrap();
    assert_eq!(array.kind(), SvType::Array);
    assert_eq!(array.array_push(Sv::int(2)), Err(RuntimeError::Immutable));
    assert_eq!(array.array_len().unwrap(), 1);
}

#[test]
fn test_taint_follows_state_on_write() {
    let state = TaintState::new();
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::Taint, TaintMagic::new(state.clone()))
        .unwrap();

    state.set_tainted(true);
    sv.set_str("from outside").unwrap();
    assert!(sv.is_tainted());

    state.set_tainted(false);
    sv.set_str("clean").unwrap();
    assert!(!sv.is_tainted());
}

#[test]
fn test_reading_tainted_cell_taints_state() {
    let state = TaintState::new();
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::Taint, TaintMagic::new(state.clone()))
        .unwrap();
    state.set_tainted(true);
    sv.set_int(1).unwrap();
    state.set_tainted(false);

    sv.get_as_int(&NullSink, None).unwrap();
    assert!(state.is_tainted());
}

#[derive(Default)]
struct MapEnv {
    vars: RefCell<BTreeMap<String, String>>,
}

impl MapEnv {
    fn leaked(pairs: &[(&str, &str)]) -> &'static MapEnv {
        let env = MapEnv::default();
        for (key, value) in pairs {
            env.vars
                .borrow_mut()
                .insert((*key).to_string(), (*value).to_string());
        }
        Box::leak(Box::new(env))
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars.borrow().get(key).cloned()
    }
}

impl Environment for &'static MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key)
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn set_var(&self, key: &str, value: &str) {
        self.vars
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_var(&self, key: &str) {
        self.vars.borrow_mut().remove(key);
    }
}

#[test]
fn test_env_element_materializes_on_first_read() {
    let env = MapEnv::leaked(&[("HOME", "/home/opal")]);
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::EnvElement, EnvElement::new("HOME", env))
        .unwrap();
    assert!(!sv.is_defined());

    assert_eq!(sv.get_as_string(&NullSink, None).unwrap(), "/home/opal");

    // Later changes to the environment are not re-read.
    env.set_var("HOME", "/elsewhere");
    assert_eq!(sv.get_as_string(&NullSink, None).unwrap(), "/home/opal");
}

#[test]
fn test_env_element_writes_through() {
    let env = MapEnv::leaked(&[]);
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::EnvElement, EnvElement::new("EDITOR", env))
        .unwrap();
    sv.set_str("vi").unwrap();
    assert_eq!(env.get("EDITOR").as_deref(), Some("vi"));

    sv.set_undef().unwrap();
    assert_eq!(env.get("EDITOR"), None);
}

#[test]
fn test_env_element_case_insensitive() {
    let env = MapEnv::leaked(&[("Path", "/bin")]);
    let sv = Sv::undef();
    let element = EnvElement::new("PATH", env).case_insensitive(true);
    sv.attach_magic(MagicKind::EnvElement, element).unwrap();
    assert_eq!(sv.get_as_string(&NullSink, None).unwrap(), "/bin");

    sv.set_str("/usr/bin").unwrap();
    assert_eq!(env.get("Path").as_deref(), Some("/usr/bin"));
    assert_eq!(env.get("PATH"), None);
}

#[test]
fn test_env_element_missing_variable_is_undef() {
    let env = MapEnv::leaked(&[]);
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::EnvElement, EnvElement::new("NOPE", env))
        .unwrap();
    assert_eq!(sv.get_as_string(&NullSink, None).unwrap(), "");
    assert!(!sv.is_defined());
}

#[test]
fn test_clear_hook_removes_variable() {
    let env = MapEnv::leaked(&[("TMP", "/tmp")]);
    let sv = Sv::undef();
    sv.attach_magic(MagicKind::EnvElement, EnvElement::new("TMP", env))
        .unwrap();
    sv.call_clear_magic().unwrap();
    assert_eq!(env.get("TMP"), None);
}
