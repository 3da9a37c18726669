//! The call gate into the managed runtime.
//!
//! Every piece of interpreter state the bridge hands to native code is owned
//! by the managed side and reached only through [`Upcall::invoke`]. The gate
//! is synchronous: a call returns only once the managed runtime has answered,
//! and calls issued from one thread are observed in issue order.

mod in_process;

pub use in_process::InProcessRuntime;

use std::fmt;

use molt_capi_handles::{Handle, HandleKind};

use crate::UpcallError;

pub(crate) const UPCALL_OP_COUNT: usize = 6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpcallOp {
    ResolveCurrentThreadState,
    ThreadStateDict,
    FindModuleByIndex,
    AddModuleByIndex,
    RemoveModuleByIndex,
    AssignModuleIndex,
}

impl UpcallOp {
    pub const ALL: [UpcallOp; UPCALL_OP_COUNT] = [
        UpcallOp::ResolveCurrentThreadState,
        UpcallOp::ThreadStateDict,
        UpcallOp::FindModuleByIndex,
        UpcallOp::AddModuleByIndex,
        UpcallOp::RemoveModuleByIndex,
        UpcallOp::AssignModuleIndex,
    ];

    /// Operation name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::ResolveCurrentThreadState => "resolve-current-thread-state",
            Self::ThreadStateDict => "thread-state-dict",
            Self::FindModuleByIndex => "find-module-by-index",
            Self::AddModuleByIndex => "add-module-by-index",
            Self::RemoveModuleByIndex => "remove-module-by-index",
            Self::AssignModuleIndex => "assign-module-index",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for UpcallOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A managed runtime reachable through named operations.
///
/// Implementations block until the managed side completes the operation. No
/// timeout and no cancellation: a stalled runtime stalls the caller.
pub trait Upcall: Send + Sync {
    fn invoke(&self, op: UpcallOp, args: &[Handle]) -> Result<Handle, UpcallError>;
}

impl<U: Upcall + ?Sized> Upcall for std::sync::Arc<U> {
    fn invoke(&self, op: UpcallOp, args: &[Handle]) -> Result<Handle, UpcallError> {
        (**self).invoke(op, args)
    }
}

/// Rejects a returned handle whose tag is not `expected`.
pub(crate) fn expect_kind(
    op: UpcallOp,
    handle: Handle,
    expected: HandleKind,
) -> Result<Handle, UpcallError> {
    if handle.is_kind(expected) {
        Ok(handle)
    } else {
        Err(UpcallError::UnexpectedHandle {
            op,
            expected,
            found: format!("{handle:?}"),
        })
    }
}

/// Like [`expect_kind`], but `Handle::NULL` means "no value".
pub(crate) fn expect_optional_kind(
    op: UpcallOp,
    handle: Handle,
    expected: HandleKind,
) -> Result<Option<Handle>, UpcallError> {
    if handle.is_null() {
        return Ok(None);
    }
    expect_kind(op, handle, expected).map(Some)
}
