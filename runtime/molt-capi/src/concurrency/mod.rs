pub(crate) mod gil;

pub use gil::{gil_ensure, gil_release, with_gil_state, GilState, GilStateGuard};

#[macro_export]
macro_rules! with_gil_state_entry {
    ($state:ident, $body:block) => {{
        let _gil_state_guard = $crate::concurrency::GilStateGuard::ensure();
        let $state = _gil_state_guard.state();
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::GilState;

    #[test]
    fn entry_macro_exposes_the_state() {
        let seen = crate::with_gil_state_entry!(state, { state });
        assert_eq!(seen, GilState::Unlocked);
    }
}
