use std::collections::HashMap;

use molt_capi_handles::ModuleHandle;

use super::ModuleIndex;

/// Single-phase module table: one module handle per [`ModuleIndex`].
///
/// This is the authoritative table the managed side consults when answering
/// `find-module-by-index`; it has process lifetime.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    by_index: HashMap<ModuleIndex, ModuleHandle>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `module` under `index`, returning the module it replaced.
    pub fn insert(&mut self, index: ModuleIndex, module: ModuleHandle) -> Option<ModuleHandle> {
        self.by_index.insert(index, module)
    }

    pub fn get(&self, index: ModuleIndex) -> Option<ModuleHandle> {
        self.by_index.get(&index).copied()
    }

    pub fn remove(&mut self, index: ModuleIndex) -> Option<ModuleHandle> {
        self.by_index.remove(&index)
    }

    pub fn contains(&self, index: ModuleIndex) -> bool {
        self.by_index.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleIndex, ModuleHandle)> + '_ {
        self.by_index.iter().map(|(index, module)| (*index, *module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molt_capi_handles::{HandleKind, HandleTable};

    fn modules(n: usize) -> Vec<ModuleHandle> {
        let mut table = HandleTable::new();
        (0..n)
            .filter_map(|i| ModuleHandle::try_from_handle(table.insert(HandleKind::Module, i)))
            .collect()
    }

    #[test]
    fn insert_replace_remove() {
        let mods = modules(2);
        let index = ModuleIndex::new(3).unwrap();
        let mut registry = ModuleRegistry::new();
        assert_eq!(registry.insert(index, mods[0]), None);
        assert_eq!(registry.get(index), Some(mods[0]));
        assert_eq!(registry.insert(index, mods[1]), Some(mods[0]));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove(index), Some(mods[1]));
        assert!(!registry.contains(index));
        assert!(registry.is_empty());
    }

    #[test]
    fn iter_reports_every_entry() {
        let mods = modules(3);
        let mut registry = ModuleRegistry::new();
        for (i, module) in mods.iter().enumerate() {
            registry.insert(ModuleIndex::new(i + 1).unwrap(), *module);
        }
        let mut seen: Vec<usize> = registry.iter().map(|(index, _)| index.get()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
