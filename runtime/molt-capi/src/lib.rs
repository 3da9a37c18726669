//! Molt C-API bridge
//! Lets extension code written against the reference interpreter's
//! pointer-based state API run against the Molt managed runtime. Thread
//! state, the interpreter lock and the single-phase module table are answered
//! through named upcalls; nothing here dereferences managed memory.

pub mod bridge;
pub mod concurrency;
pub mod config;
mod error;
pub mod fatal;
pub mod ffi;
pub mod modules;
pub mod state;
pub mod upcall;

pub use bridge::{install, installed, uninstall, with_bridge, Bridge};
pub use concurrency::{gil_ensure, gil_release, with_gil_state, GilState, GilStateGuard};
pub use config::BridgeConfig;
pub use error::{CapiError, UpcallError};
pub use fatal::{fatal_error, FatalInvariant};
pub use modules::{ModuleDef, ModuleIndex, ModuleRegistry};
pub use state::{err_clear, err_fetch, err_occurred, PendingError, UpcallStats};
pub use upcall::{InProcessRuntime, Upcall, UpcallOp};

pub use molt_capi_handles::{DictHandle, Handle, HandleKind, ModuleHandle, ThreadStateHandle};

#[cfg(test)]
pub(crate) static TEST_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
