use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use molt_capi_handles::{
    DictHandle, Handle, HandleKind, HandleTable, ModuleHandle, ThreadStateHandle,
};

use super::{Upcall, UpcallOp};
use crate::modules::{ModuleIndex, ModuleRegistry};
use crate::UpcallError;

enum ManagedValue {
    ThreadState { dict: Option<Handle> },
    Dict(HashMap<String, Handle>),
    Module { name: String },
}

#[derive(Default)]
struct HostState {
    objects: HandleTable<ManagedValue>,
    threads: HashMap<ThreadId, Handle>,
    modules: ModuleRegistry,
    // Highest module index seen or handed out.
    max_index: usize,
}

impl HostState {
    fn new_thread_state(&mut self, tid: ThreadId) -> Handle {
        let handle = self
            .objects
            .insert(HandleKind::ThreadState, ManagedValue::ThreadState { dict: None });
        self.threads.insert(tid, handle);
        handle
    }

    fn drop_thread_state(&mut self, tid: ThreadId) -> bool {
        let Some(handle) = self.threads.remove(&tid) else {
            return false;
        };
        if let Some(ManagedValue::ThreadState { dict: Some(dict) }) = self.objects.remove(handle) {
            self.objects.remove(dict);
        }
        true
    }

    fn note_index(&mut self, index: ModuleIndex) {
        self.max_index = self.max_index.max(index.get());
    }

    fn next_index(&mut self) -> Option<ModuleIndex> {
        let next = self.max_index.checked_add(1)?;
        let fits = i64::try_from(next).is_ok_and(|raw| raw <= molt_capi_handles::HANDLE_INT_MAX);
        if !fits {
            return None;
        }
        self.max_index = next;
        ModuleIndex::new(next)
    }
}

/// Drops a thread's states in every live runtime when the OS thread exits.
struct ThreadExit {
    tid: ThreadId,
    hosts: Vec<Weak<Mutex<HostState>>>,
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        for host in self.hosts.drain(..).filter_map(|host| host.upgrade()) {
            host.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drop_thread_state(self.tid);
        }
    }
}

thread_local! {
    static THREAD_EXIT: RefCell<Option<ThreadExit>> = const { RefCell::new(None) };
}

fn reclaim_on_exit(host: &Arc<Mutex<HostState>>, tid: ThreadId) {
    let _ = THREAD_EXIT.try_with(|slot| {
        let mut slot = slot.borrow_mut();
        let exit = slot.get_or_insert_with(|| ThreadExit {
            tid,
            hosts: Vec::new(),
        });
        exit.hosts.retain(|known| known.strong_count() > 0);
        if !exit.hosts.iter().any(|known| known.as_ptr() == Arc::as_ptr(host)) {
            exit.hosts.push(Arc::downgrade(host));
        }
    });
}

/// A managed runtime that lives in the same process as the bridge.
///
/// Embedders without a separate managed heap use it directly; it also backs
/// the bridge's tests. Thread states are keyed by OS thread, created on first
/// resolve (or only by [`attach_current_thread`](Self::attach_current_thread)
/// in explicit-attach mode), and each gets its dict the first time the dict
/// is read. A thread's state and dict are dropped when the OS thread exits.
/// Module indices it hands out lie above every index it has seen. All operations are serialized by one lock, which is the exclusion
/// the bridge's lock emulation relies on.
#[derive(Default)]
pub struct InProcessRuntime {
    state: Arc<Mutex<HostState>>,
    explicit_attach: bool,
}

impl InProcessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolving the current thread state fails with
    /// [`UpcallError::NoThreadState`] until the thread attaches.
    pub fn with_explicit_attach() -> Self {
        Self {
            state: Arc::default(),
            explicit_attach: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self, state: &mut HostState, tid: ThreadId) -> Handle {
        let handle = state.new_thread_state(tid);
        reclaim_on_exit(&self.state, tid);
        handle
    }

    // The table tags every handle with the kind it was inserted under.
    fn typed<T>(handle: Handle, wrap: fn(Handle) -> Option<T>) -> T {
        match wrap(handle) {
            Some(value) => value,
            None => unreachable!("handle table returned a handle of the wrong kind"),
        }
    }

    pub fn attach_current_thread(&self) -> ThreadStateHandle {
        let tid = thread::current().id();
        let mut state = self.lock();
        let handle = match state.threads.get(&tid).copied() {
            Some(handle) => handle,
            None => self.attach(&mut state, tid),
        };
        Self::typed(handle, ThreadStateHandle::try_from_handle)
    }

    /// Gives the calling thread a fresh thread state, as when the managed
    /// runtime switches the thread it runs on this OS thread.
    pub fn switch_thread_state(&self) -> ThreadStateHandle {
        let tid = thread::current().id();
        let mut state = self.lock();
        state.drop_thread_state(tid);
        let handle = self.attach(&mut state, tid);
        Self::typed(handle, ThreadStateHandle::try_from_handle)
    }

    /// Drops the calling thread's state and its dict. Returns whether the
    /// thread had one.
    pub fn detach_current_thread(&self) -> bool {
        let tid = thread::current().id();
        self.lock().drop_thread_state(tid)
    }

    pub fn new_module(&self, name: &str) -> ModuleHandle {
        let handle = self.lock().objects.insert(
            HandleKind::Module,
            ManagedValue::Module {
                name: name.to_string(),
            },
        );
        Self::typed(handle, ModuleHandle::try_from_handle)
    }

    pub fn module_name(&self, module: ModuleHandle) -> Option<String> {
        match self.lock().objects.get(module.handle()) {
            Some(ManagedValue::Module { name }) => Some(name.clone()),
            _ => None,
        }
    }

    /// Stores `value` under `key`. Returns `false` if `dict` is not live.
    pub fn dict_set(&self, dict: DictHandle, key: &str, value: Handle) -> bool {
        match self.lock().objects.get_mut(dict.handle()) {
            Some(ManagedValue::Dict(entries)) => {
                entries.insert(key.to_string(), value);
                true
            }
            _ => false,
        }
    }

    pub fn dict_get(&self, dict: DictHandle, key: &str) -> Option<Handle> {
        match self.lock().objects.get(dict.handle()) {
            Some(ManagedValue::Dict(entries)) => entries.get(key).copied(),
            _ => None,
        }
    }

    pub fn dict_len(&self, dict: DictHandle) -> Option<usize> {
        match self.lock().objects.get(dict.handle()) {
            Some(ManagedValue::Dict(entries)) => Some(entries.len()),
            _ => None,
        }
    }

    pub fn registered_module(&self, index: ModuleIndex) -> Option<ModuleHandle> {
        self.lock().modules.get(index)
    }

    pub fn registered_module_count(&self) -> usize {
        self.lock().modules.len()
    }

    pub fn live_objects(&self) -> usize {
        self.lock().objects.len()
    }

    fn resolve_current_thread_state(&self) -> Result<Handle, UpcallError> {
        let tid = thread::current().id();
        let mut state = self.lock();
        if let Some(handle) = state.threads.get(&tid).copied() {
            return Ok(handle);
        }
        if self.explicit_attach {
            return Err(UpcallError::NoThreadState);
        }
        Ok(self.attach(&mut state, tid))
    }

    fn thread_state_dict(&self, op: UpcallOp, thread_state: Handle) -> Result<Handle, UpcallError> {
        let mut state = self.lock();
        let existing = match state.objects.get(thread_state) {
            Some(ManagedValue::ThreadState { dict }) => *dict,
            _ => return Err(invalid(op, "not a live thread state")),
        };
        if let Some(dict) = existing {
            return Ok(dict);
        }
        let dict = state
            .objects
            .insert(HandleKind::Dict, ManagedValue::Dict(HashMap::new()));
        if let Some(ManagedValue::ThreadState { dict: slot }) = state.objects.get_mut(thread_state) {
            *slot = Some(dict);
        }
        Ok(dict)
    }
}

fn invalid(op: UpcallOp, detail: &str) -> UpcallError {
    UpcallError::InvalidArgument {
        op,
        detail: detail.to_string(),
    }
}

fn arity(op: UpcallOp, args: &[Handle], expected: usize) -> Result<(), UpcallError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(invalid(
            op,
            &format!("expected {expected} argument(s), got {}", args.len()),
        ))
    }
}

fn module_index(op: UpcallOp, handle: Handle) -> Result<ModuleIndex, UpcallError> {
    handle
        .as_int()
        .and_then(|raw| usize::try_from(raw).ok())
        .and_then(ModuleIndex::new)
        .ok_or_else(|| invalid(op, "module index must be a positive int"))
}

impl Upcall for InProcessRuntime {
    fn invoke(&self, op: UpcallOp, args: &[Handle]) -> Result<Handle, UpcallError> {
        match op {
            UpcallOp::ResolveCurrentThreadState => {
                arity(op, args, 0)?;
                self.resolve_current_thread_state()
            }
            UpcallOp::ThreadStateDict => {
                arity(op, args, 1)?;
                self.thread_state_dict(op, args[0])
            }
            UpcallOp::FindModuleByIndex => {
                arity(op, args, 1)?;
                let index = module_index(op, args[0])?;
                let mut state = self.lock();
                state.note_index(index);
                Ok(state
                    .modules
                    .get(index)
                    .map_or(Handle::NULL, ModuleHandle::handle))
            }
            UpcallOp::AddModuleByIndex => {
                arity(op, args, 2)?;
                let index = module_index(op, args[1])?;
                let mut state = self.lock();
                let module = match state.objects.get(args[0]) {
                    Some(ManagedValue::Module { .. }) => ModuleHandle::try_from_handle(args[0]),
                    _ => None,
                }
                .ok_or_else(|| invalid(op, "not a live module"))?;
                state.note_index(index);
                Ok(state
                    .modules
                    .insert(index, module)
                    .map_or(Handle::NULL, ModuleHandle::handle))
            }
            UpcallOp::RemoveModuleByIndex => {
                arity(op, args, 1)?;
                let index = module_index(op, args[0])?;
                let mut state = self.lock();
                state.note_index(index);
                Ok(state
                    .modules
                    .remove(index)
                    .map_or(Handle::NULL, ModuleHandle::handle))
            }
            UpcallOp::AssignModuleIndex => {
                arity(op, args, 0)?;
                let index = self
                    .lock()
                    .next_index()
                    .ok_or_else(|| UpcallError::Managed(format!("{op}: module index space exhausted")))?;
                Ok(Handle::from_int(index.get() as i64))
            }
        }
    }
}
