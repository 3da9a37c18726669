//! Structural violations abort the process, so each case runs in a child
//! copy of this test binary.

use std::process::{Command, Output};
use std::sync::Arc;

use molt_capi::ffi::molt_capi_state_add_module;
use molt_capi::{Bridge, BridgeConfig, InProcessRuntime, ModuleDef};

const CHILD_CASE: &str = "MOLT_CAPI_FATAL_CASE";

fn run_case(case: &str) -> Output {
    let exe = std::env::current_exe().expect("test binary path");
    Command::new(exe)
        .args(["--exact", "fatal_child", "--nocapture", "--test-threads=1"])
        .env(CHILD_CASE, case)
        .output()
        .expect("spawn child test process")
}

fn assert_aborted(output: &Output, message: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "child exited cleanly; stderr: {stderr}");
    assert!(stderr.contains(message), "missing {message:?} in stderr: {stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("survived"));
}

#[test]
fn fatal_child() {
    let Ok(case) = std::env::var(CHILD_CASE) else {
        return;
    };
    let runtime = Arc::new(InProcessRuntime::new());
    let bridge = Bridge::with_config(Arc::clone(&runtime), BridgeConfig::default());
    let module = runtime.new_module("doomed");
    match case.as_str() {
        "null-def" => {
            let _ = bridge.add_module(module, None);
        }
        "zero-index" => {
            let _ = bridge.remove_module(&ModuleDef::new());
        }
        "ffi-null-def" => unsafe {
            molt_capi_state_add_module(module.bits(), std::ptr::null());
        },
        other => panic!("unknown fatal case {other}"),
    }
    println!("survived {case}");
}

#[test]
fn adding_without_a_definition_aborts() {
    let output = run_case("null-def");
    assert_aborted(&output, "Fatal Python error: PyState_AddModule: Module Definition is NULL");
}

#[test]
fn removing_an_unassigned_index_aborts() {
    let output = run_case("zero-index");
    assert_aborted(&output, "Fatal Python error: PyState_RemoveModule: Module index invalid.");
}

#[test]
fn abi_add_with_null_definition_aborts() {
    let output = run_case("ffi-null-def");
    assert_aborted(&output, "Fatal Python error: PyState_AddModule: Module Definition is NULL");
}

#[test]
fn slot_definition_with_zero_index_is_not_fatal() {
    let runtime = Arc::new(InProcessRuntime::new());
    let bridge = Bridge::with_config(Arc::clone(&runtime), BridgeConfig::default());
    assert!(bridge.remove_module(&ModuleDef::with_slots()).is_err());
}
