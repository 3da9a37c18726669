use std::marker::PhantomData;

/// Value handed out by [`gil_ensure`] and handed back to [`gil_release`].
/// Numbering matches the reference interpreter's `PyGILState_STATE`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GilState {
    Locked = 0,
    Unlocked = 1,
}

impl GilState {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Locked),
            1 => Some(Self::Unlocked),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Placeholder for acquiring the interpreter lock.
///
/// The managed runtime serializes every native/managed handoff at the upcall
/// gate, so there is nothing to lock here; the call always reports
/// [`GilState::Unlocked`].
#[inline]
pub fn gil_ensure() -> GilState {
    GilState::Unlocked
}

/// Counterpart of [`gil_ensure`]. Accepts any state previously returned by it
/// and currently does nothing.
#[inline]
pub fn gil_release(state: GilState) {
    let _ = state;
}

/// Scoped [`gil_ensure`]/[`gil_release`] pair. Releases on every exit path,
/// including early returns and unwinding, and stays on the thread that
/// ensured it.
#[must_use = "dropping the guard releases the interpreter lock"]
pub struct GilStateGuard {
    state: GilState,
    _not_send: PhantomData<*const ()>,
}

impl GilStateGuard {
    pub fn ensure() -> Self {
        Self {
            state: gil_ensure(),
            _not_send: PhantomData,
        }
    }

    pub fn state(&self) -> GilState {
        self.state
    }
}

impl Drop for GilStateGuard {
    fn drop(&mut self) {
        gil_release(self.state);
    }
}

pub fn with_gil_state<F, R>(f: F) -> R
where
    F: FnOnce(GilState) -> R,
{
    let guard = GilStateGuard::ensure();
    f(guard.state())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_always_unlocked() {
        for _ in 0..4 {
            assert_eq!(gil_ensure(), GilState::Unlocked);
        }
    }

    #[test]
    fn release_accepts_every_state() {
        let state = gil_ensure();
        gil_release(state);
        gil_release(GilState::Locked);
        gil_release(GilState::Unlocked);
        assert_eq!(gil_ensure(), GilState::Unlocked);
    }

    #[test]
    fn raw_values_round_trip() {
        assert_eq!(GilState::from_raw(GilState::Locked.as_raw()), Some(GilState::Locked));
        assert_eq!(GilState::from_raw(GilState::Unlocked.as_raw()), Some(GilState::Unlocked));
        assert_eq!(GilState::from_raw(7), None);
    }

    #[test]
    fn guards_nest() {
        let outer = GilStateGuard::ensure();
        {
            let inner = GilStateGuard::ensure();
            assert_eq!(inner.state(), GilState::Unlocked);
        }
        assert_eq!(outer.state(), GilState::Unlocked);
    }

    #[test]
    fn guard_survives_error_and_panic_paths() {
        fn fails() -> Result<(), &'static str> {
            let _guard = GilStateGuard::ensure();
            Err::<(), _>("boom")?;
            Ok(())
        }
        assert_eq!(fails(), Err("boom"));

        let result = std::panic::catch_unwind(|| {
            let _guard = GilStateGuard::ensure();
            panic!("unwinding through the guard");
        });
        assert!(result.is_err());
        assert_eq!(with_gil_state(|state| state), GilState::Unlocked);
    }
}
