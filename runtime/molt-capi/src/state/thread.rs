use molt_capi_handles::{DictHandle, HandleKind, ThreadStateHandle};

use crate::upcall::{expect_kind, UpcallOp};
use crate::{Bridge, UpcallError};

impl Bridge {
    /// Resolves the calling thread's state through the managed runtime.
    ///
    /// Never cached on this side: the managed runtime alone knows which
    /// thread state is current, and it may switch between two calls.
    pub fn current_thread_state(&self) -> Result<ThreadStateHandle, UpcallError> {
        let op = UpcallOp::ResolveCurrentThreadState;
        let handle = expect_kind(op, self.upcall(op, &[])?, HandleKind::ThreadState)?;
        ThreadStateHandle::try_from_handle(handle).ok_or(UpcallError::NoThreadState)
    }

    /// The generic-storage dict attached to the current thread state.
    pub fn thread_state_dict(&self) -> Result<DictHandle, UpcallError> {
        let thread_state = self.current_thread_state()?;
        self.dict_of(thread_state)
    }

    /// The dict attached to `thread_state`. Attribute reads are operations of
    /// the managed runtime, never field reads on this side.
    pub fn dict_of(&self, thread_state: ThreadStateHandle) -> Result<DictHandle, UpcallError> {
        let op = UpcallOp::ThreadStateDict;
        let handle = expect_kind(op, self.upcall(op, &[thread_state.handle()])?, HandleKind::Dict)?;
        DictHandle::try_from_handle(handle).ok_or_else(|| UpcallError::UnexpectedHandle {
            op,
            expected: HandleKind::Dict,
            found: format!("{handle:?}"),
        })
    }
}
