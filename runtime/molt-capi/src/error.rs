use molt_capi_handles::HandleKind;

use crate::modules::ModuleIndex;
use crate::upcall::UpcallOp;

/// Failure signalled by the managed runtime, or by the gate while checking
/// what the managed runtime returned. Surfaced to callers unchanged.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UpcallError {
    #[error("no managed runtime is attached to the bridge")]
    NotAttached,

    #[error("no current thread state")]
    NoThreadState,

    #[error("{op}: invalid argument: {detail}")]
    InvalidArgument { op: UpcallOp, detail: String },

    #[error("{op}: expected a {expected} handle, got {found}")]
    UnexpectedHandle {
        op: UpcallOp,
        expected: HandleKind,
        found: String,
    },

    #[error("{0}")]
    Managed(String),
}

/// Recoverable errors of the native-facing API.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CapiError {
    /// Slot-based definitions must go through multi-phase initialization.
    #[error("{func} called on module with slots")]
    InvalidModuleKind { func: &'static str },

    #[error("module already added at index {index}")]
    ModuleAlreadyAdded { index: ModuleIndex },

    #[error(transparent)]
    Upcall(#[from] UpcallError),
}

impl CapiError {
    /// Name of the Python exception class this error is reported as.
    pub fn exception_type(&self) -> &'static str {
        match self {
            Self::InvalidModuleKind { .. } | Self::ModuleAlreadyAdded { .. } => "SystemError",
            Self::Upcall(UpcallError::InvalidArgument { .. }) => "TypeError",
            Self::Upcall(_) => "RuntimeError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_call() {
        let err = CapiError::InvalidModuleKind { func: "PyState_AddModule" };
        assert_eq!(err.to_string(), "PyState_AddModule called on module with slots");
        assert_eq!(err.exception_type(), "SystemError");
    }

    #[test]
    fn upcall_errors_pass_through_transparently() {
        let err = CapiError::from(UpcallError::NoThreadState);
        assert_eq!(err.to_string(), "no current thread state");
        assert_eq!(err.exception_type(), "RuntimeError");

        let err = CapiError::from(UpcallError::UnexpectedHandle {
            op: UpcallOp::ThreadStateDict,
            expected: HandleKind::Dict,
            found: "Handle(NULL)".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "thread-state-dict: expected a dict handle, got Handle(NULL)"
        );
    }
}
