//! Single-phase module registration (`PyState_FindModule` and friends).
//!
//! Validation happens here and fails fast; the table itself lives with the
//! managed runtime, which answers every lookup.

mod def;
mod registry;

pub use def::{ModuleDef, ModuleIndex};
pub use registry::ModuleRegistry;

use molt_capi_handles::{Handle, HandleKind, ModuleHandle};

use crate::fatal::{fatal_error, FatalInvariant};
use crate::upcall::{expect_kind, expect_optional_kind, UpcallOp};
use crate::{Bridge, CapiError, UpcallError};

pub(crate) const ADD_MODULE: &str = "PyState_AddModule";
pub(crate) const REMOVE_MODULE: &str = "PyState_RemoveModule";

pub(crate) fn index_handle(op: UpcallOp, index: ModuleIndex) -> Result<Handle, UpcallError> {
    let raw = i64::try_from(index.get())
        .ok()
        .filter(|raw| *raw <= molt_capi_handles::HANDLE_INT_MAX)
        .ok_or_else(|| UpcallError::InvalidArgument {
            op,
            detail: format!("module index {index} does not fit a handle"),
        })?;
    Ok(Handle::from_int(raw))
}

fn optional_module(op: UpcallOp, handle: Handle) -> Result<Option<ModuleHandle>, UpcallError> {
    Ok(expect_optional_kind(op, handle, HandleKind::Module)?.and_then(ModuleHandle::try_from_handle))
}

impl Bridge {
    fn trace_registry(&self, args: std::fmt::Arguments<'_>) {
        if self.config().trace_modules {
            log::info!("{args}");
        } else {
            log::debug!("{args}");
        }
    }

    /// Looks up the module registered for `def`. Absence is an answer, not an
    /// error. Slot-based and never-initialized definitions are never in the
    /// table, so they are answered without asking the managed runtime.
    pub fn find_module(&self, def: &ModuleDef) -> Result<Option<ModuleHandle>, UpcallError> {
        if def.has_slots() {
            return Ok(None);
        }
        match def.index() {
            Some(index) => self.find_module_by_index(index),
            None => Ok(None),
        }
    }

    /// An index too large to cross the gate can never have been registered,
    /// so it is answered as "not found".
    pub fn find_module_by_index(
        &self,
        index: ModuleIndex,
    ) -> Result<Option<ModuleHandle>, UpcallError> {
        let op = UpcallOp::FindModuleByIndex;
        let Ok(arg) = index_handle(op, index) else {
            return Ok(None);
        };
        let handle = self.upcall(op, &[arg])?;
        optional_module(op, handle)
    }

    /// Gives `def` its registry index, asking the managed runtime for a fresh
    /// one if the definition has none yet. Idempotent.
    pub fn init_module_def(&self, def: &ModuleDef) -> Result<ModuleIndex, UpcallError> {
        if let Some(index) = def.index() {
            return Ok(index);
        }
        let op = UpcallOp::AssignModuleIndex;
        let handle = expect_kind(op, self.upcall(op, &[])?, HandleKind::Int)?;
        let index = handle
            .as_int()
            .and_then(|raw| usize::try_from(raw).ok())
            .and_then(ModuleIndex::new)
            .ok_or_else(|| UpcallError::UnexpectedHandle {
                op,
                expected: HandleKind::Int,
                found: format!("{handle:?}"),
            })?;
        Ok(def.claim(index))
    }

    /// Registers `module` under `def`'s index.
    ///
    /// A missing definition aborts the process. A slot-based definition is
    /// rejected with [`CapiError::InvalidModuleKind`] and the table is left
    /// untouched. A definition without an index gets one from the managed
    /// runtime first. Adding the module already registered at that index
    /// fails with [`CapiError::ModuleAlreadyAdded`]; a different module
    /// replaces the previous entry.
    pub fn add_module(&self, module: ModuleHandle, def: Option<&ModuleDef>) -> Result<(), CapiError> {
        let Some(def) = def else {
            fatal_error(ADD_MODULE, FatalInvariant::NullModuleDef);
        };
        if def.has_slots() {
            return Err(CapiError::InvalidModuleKind { func: ADD_MODULE });
        }
        let index = self.init_module_def(def)?;

        let op = UpcallOp::AddModuleByIndex;
        let handle = self.upcall(op, &[module.handle(), index_handle(op, index)?])?;
        match optional_module(op, handle)? {
            Some(previous) if previous == module => {
                return Err(CapiError::ModuleAlreadyAdded { index });
            }
            Some(previous) => log::warn!(
                "{ADD_MODULE}: module {:?} replaced {:?} at index {index}",
                module.handle(),
                previous.handle()
            ),
            None => self.trace_registry(format_args!(
                "{ADD_MODULE}: module {:?} added at index {index}",
                module.handle()
            )),
        }
        Ok(())
    }

    /// Drops the entry for `def`'s index. A definition that was never
    /// assigned an index aborts the process; removing an index with no entry
    /// is a no-op.
    pub fn remove_module(&self, def: &ModuleDef) -> Result<(), CapiError> {
        if def.has_slots() {
            return Err(CapiError::InvalidModuleKind { func: REMOVE_MODULE });
        }
        let Some(index) = def.index() else {
            fatal_error(REMOVE_MODULE, FatalInvariant::ZeroModuleIndex);
        };

        let op = UpcallOp::RemoveModuleByIndex;
        let handle = self.upcall(op, &[index_handle(op, index)?])?;
        match optional_module(op, handle)? {
            Some(removed) => self.trace_registry(format_args!(
                "{REMOVE_MODULE}: module {:?} removed from index {index}",
                removed.handle()
            )),
            None => self.trace_registry(format_args!(
                "{REMOVE_MODULE}: index {index} had no module"
            )),
        }
        Ok(())
    }
}
