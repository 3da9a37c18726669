use std::cell::RefCell;

use crate::CapiError;

/// A recoverable error waiting to be picked up by native code, in the shape
/// the reference interpreter reports it: exception class plus message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingError {
    pub exc_type: &'static str,
    pub message: String,
}

impl From<&CapiError> for PendingError {
    fn from(err: &CapiError) -> Self {
        Self {
            exc_type: err.exception_type(),
            message: err.to_string(),
        }
    }
}

thread_local! {
    pub(crate) static ERROR_INDICATOR: RefCell<Option<PendingError>> = const { RefCell::new(None) };
}

pub(crate) fn err_set(err: &CapiError) {
    log::debug!("error indicator set: {}: {err}", err.exception_type());
    let pending = PendingError::from(err);
    let _ = ERROR_INDICATOR.try_with(|slot| {
        *slot.borrow_mut() = Some(pending);
    });
}

pub fn err_occurred() -> bool {
    ERROR_INDICATOR
        .try_with(|slot| slot.borrow().is_some())
        .unwrap_or(false)
}

/// Takes the pending error, leaving the indicator clear.
pub fn err_fetch() -> Option<PendingError> {
    ERROR_INDICATOR
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
}

pub fn err_clear() {
    let _ = ERROR_INDICATOR.try_with(|slot| slot.borrow_mut().take());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_is_per_thread() {
        err_clear();
        err_set(&CapiError::InvalidModuleKind { func: "PyState_RemoveModule" });
        assert!(err_occurred());
        std::thread::scope(|s| {
            s.spawn(|| assert!(!err_occurred()));
        });
        let pending = err_fetch().unwrap();
        assert_eq!(pending.exc_type, "SystemError");
        assert_eq!(pending.message, "PyState_RemoveModule called on module with slots");
        assert!(!err_occurred());
        assert_eq!(err_fetch(), None);
    }
}
