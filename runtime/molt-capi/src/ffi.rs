//! C ABI entry points for extension code. Handles cross as raw bits; a 0
//! result (or -1 for status returns) means the error indicator is set.

use molt_capi_handles::{Handle, HandleKind, ModuleHandle};

use crate::bridge::with_bridge;
use crate::concurrency::{gil_ensure, gil_release, GilState};
use crate::fatal::{fatal_error, FatalInvariant};
use crate::modules::{ModuleDef, ADD_MODULE};
use crate::state::tls::err_set;
use crate::upcall::UpcallOp;
use crate::{err_clear, err_occurred, CapiError, UpcallError};

fn report<T>(result: Result<T, CapiError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            err_set(&err);
            None
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn molt_capi_thread_state_get() -> u64 {
    let result = with_bridge(|bridge| bridge.current_thread_state()).and_then(|r| r);
    report(result.map_err(CapiError::from)).map_or(0, |ts| ts.bits())
}

#[unsafe(no_mangle)]
pub extern "C" fn molt_capi_thread_state_get_dict() -> u64 {
    let result = with_bridge(|bridge| bridge.thread_state_dict()).and_then(|r| r);
    report(result.map_err(CapiError::from)).map_or(0, |dict| dict.bits())
}

#[unsafe(no_mangle)]
pub extern "C" fn molt_capi_gilstate_ensure() -> i32 {
    gil_ensure().as_raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn molt_capi_gilstate_release(state: i32) {
    // Values this side never handed out are tolerated like the real ones.
    if let Some(state) = GilState::from_raw(state) {
        gil_release(state);
    }
}

/// Returns the module registered for `def`, or 0 if there is none. A null
/// `def` is treated as "not found".
///
/// # Safety
///
/// `def` must be null or point to a live [`ModuleDef`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn molt_capi_state_find_module(def: *const ModuleDef) -> u64 {
    let Some(def) = (unsafe { def.as_ref() }) else {
        return 0;
    };
    let result = with_bridge(|bridge| bridge.find_module(def)).and_then(|r| r);
    report(result.map_err(CapiError::from))
        .flatten()
        .map_or(0, |module| module.bits())
}

/// Returns 0 on success and -1 with the error indicator set on failure. A null
/// `def` aborts the process.
///
/// # Safety
///
/// `def` must be null or point to a live [`ModuleDef`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn molt_capi_state_add_module(module_bits: u64, def: *const ModuleDef) -> i32 {
    let Some(def) = (unsafe { def.as_ref() }) else {
        fatal_error(ADD_MODULE, FatalInvariant::NullModuleDef);
    };
    let Some(module) = ModuleHandle::try_from_handle(Handle::from_bits(module_bits)) else {
        err_set(&CapiError::Upcall(UpcallError::InvalidArgument {
            op: UpcallOp::AddModuleByIndex,
            detail: format!("expected a {} handle", HandleKind::Module),
        }));
        return -1;
    };
    let result = with_bridge(|bridge| bridge.add_module(module, Some(def)))
        .map_err(CapiError::from)
        .and_then(|r| r);
    match report(result) {
        Some(()) => 0,
        None => -1,
    }
}

/// Returns 0 on success and -1 with the error indicator set on failure. A
/// definition whose index was never assigned aborts the process.
///
/// # Safety
///
/// `def` must point to a live [`ModuleDef`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn molt_capi_state_remove_module(def: *const ModuleDef) -> i32 {
    let Some(def) = (unsafe { def.as_ref() }) else {
        fatal_error(crate::modules::REMOVE_MODULE, FatalInvariant::NullModuleDef);
    };
    let result = with_bridge(|bridge| bridge.remove_module(def))
        .map_err(CapiError::from)
        .and_then(|r| r);
    match report(result) {
        Some(()) => 0,
        None => -1,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn molt_capi_err_occurred() -> i32 {
    i32::from(err_occurred())
}

#[unsafe(no_mangle)]
pub extern "C" fn molt_capi_err_clear() {
    err_clear();
}
