use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Registry key of a single-phase module. Index 0 marks a definition that was
/// never initialized and cannot be represented.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleIndex(NonZeroUsize);

impl ModuleIndex {
    pub fn new(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for ModuleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The parts of an extension module definition the bridge looks at.
#[repr(C)]
#[derive(Debug)]
pub struct ModuleDef {
    index: AtomicUsize,
    has_slots: bool,
}

impl ModuleDef {
    /// A single-phase definition whose index has not been assigned yet. The
    /// managed runtime assigns one through
    /// [`Bridge::init_module_def`](crate::Bridge::init_module_def).
    pub const fn new() -> Self {
        Self {
            index: AtomicUsize::new(0),
            has_slots: false,
        }
    }

    /// A multi-phase (slot-based) definition.
    pub const fn with_slots() -> Self {
        Self {
            index: AtomicUsize::new(0),
            has_slots: true,
        }
    }

    /// A definition with an explicit raw index, as handed over by a host that
    /// assigns indices itself. `raw == 0` yields an unassigned definition.
    pub const fn with_index(raw: usize, has_slots: bool) -> Self {
        Self {
            index: AtomicUsize::new(raw),
            has_slots,
        }
    }

    /// Stores an index handed out by the managed runtime. If another caller
    /// stored one first, that index wins and is returned.
    pub(crate) fn claim(&self, index: ModuleIndex) -> ModuleIndex {
        match self.index.compare_exchange(
            0,
            index.get(),
            AtomicOrdering::AcqRel,
            AtomicOrdering::Acquire,
        ) {
            Ok(_) => index,
            Err(current) => ModuleIndex::new(current).unwrap_or(index),
        }
    }

    pub fn raw_index(&self) -> usize {
        self.index.load(AtomicOrdering::Acquire)
    }

    pub fn index(&self) -> Option<ModuleIndex> {
        ModuleIndex::new(self.raw_index())
    }

    pub fn has_slots(&self) -> bool {
        self.has_slots
    }
}

impl Default for ModuleDef {
    fn default() -> Self {
        Self::new()
    }
}
