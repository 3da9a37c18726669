use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use molt_capi_handles::Handle;

use crate::config::BridgeConfig;
use crate::state::UpcallStats;
use crate::upcall::{Upcall, UpcallOp};
use crate::UpcallError;

/// Native-facing side of the interpreter-state bridge.
///
/// Holds no interpreter state of its own: thread states, their dicts and the
/// module table all live behind the upcall gate and are re-resolved on every
/// call.
pub struct Bridge {
    runtime: Arc<dyn Upcall>,
    config: BridgeConfig,
    stats: UpcallStats,
}

impl Bridge {
    pub fn new<U: Upcall + 'static>(runtime: U) -> Self {
        Self::with_config(runtime, *BridgeConfig::global())
    }

    pub fn with_config<U: Upcall + 'static>(runtime: U, config: BridgeConfig) -> Self {
        Self {
            runtime: Arc::new(runtime),
            config,
            stats: UpcallStats::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> &UpcallStats {
        &self.stats
    }

    pub(crate) fn upcall(&self, op: UpcallOp, args: &[Handle]) -> Result<Handle, UpcallError> {
        if self.config.trace_upcalls {
            log::info!("upcall {op} {args:?}");
        } else {
            log::trace!("upcall {op} {args:?}");
        }
        let result = self.runtime.invoke(op, args);
        if self.config.profile {
            self.stats.hit(op, result.is_ok());
        }
        match &result {
            Ok(handle) => log::trace!("upcall {op} -> {handle:?}"),
            Err(err) => log::debug!("upcall {op} failed: {err}"),
        }
        result
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("upcalls", &self.stats.total())
            .finish_non_exhaustive()
    }
}

static INSTALLED: RwLock<Option<Arc<Bridge>>> = RwLock::new(None);

/// Makes `bridge` the one the C ABI entry points use. Returns the bridge it
/// replaced, if any.
pub fn install(bridge: Bridge) -> Option<Arc<Bridge>> {
    let mut slot = INSTALLED.write().unwrap_or_else(PoisonError::into_inner);
    slot.replace(Arc::new(bridge))
}

pub fn uninstall() -> Option<Arc<Bridge>> {
    let mut slot = INSTALLED.write().unwrap_or_else(PoisonError::into_inner);
    slot.take()
}

pub fn installed() -> Option<Arc<Bridge>> {
    INSTALLED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Runs `f` against the installed bridge. The registration lock is not held
/// while `f` runs, so `f` may block on the managed runtime.
pub fn with_bridge<F, R>(f: F) -> Result<R, UpcallError>
where
    F: FnOnce(&Bridge) -> R,
{
    let bridge = installed().ok_or(UpcallError::NotAttached)?;
    Ok(f(&bridge))
}
