use std::sync::OnceLock;

/// Environment switches read once per process.
///
/// `MOLT_CAPI_TRACE_UPCALLS=1` logs every upcall with its arguments,
/// `MOLT_CAPI_TRACE_MODULES=1` logs registry mutations and
/// `MOLT_PROFILE` (any value other than empty or `0`) counts upcalls per
/// operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub trace_upcalls: bool,
    pub trace_modules: bool,
    pub profile: bool,
}

fn flag_is_one(value: Option<String>) -> bool {
    matches!(value.as_deref(), Some("1"))
}

fn flag_is_set(value: Option<String>) -> bool {
    value.map(|val| !val.is_empty() && val != "0").unwrap_or(false)
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            trace_upcalls: flag_is_one(lookup("MOLT_CAPI_TRACE_UPCALLS")),
            trace_modules: flag_is_one(lookup("MOLT_CAPI_TRACE_MODULES")),
            profile: cfg!(feature = "profile_always") || flag_is_set(lookup("MOLT_PROFILE")),
        }
    }

    /// The process-wide configuration, read from the environment on first use.
    pub fn global() -> &'static BridgeConfig {
        static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();
        CONFIG.get_or_init(Self::from_env)
    }
}
