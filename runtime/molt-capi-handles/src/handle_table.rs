use crate::{Handle, HandleKind};

const HANDLE_GEN_BITS: u64 = 16;
const HANDLE_INDEX_BITS: u64 = 40;
const HANDLE_INDEX_MASK: u64 = (1u64 << HANDLE_INDEX_BITS) - 1;
const HANDLE_GEN_MASK: u64 = (1u64 << HANDLE_GEN_BITS) - 1;

struct HandleSlot<T> {
    value: Option<T>,
    kind: HandleKind,
    generation: u16,
}

/// Generational slot table backing handles with managed-side values.
///
/// A handle stays valid until it is removed; after that the slot's generation
/// moves on and the stale handle resolves to `None` even once the slot is
/// reused. Generation 0 is never issued, so a live handle is never
/// [`Handle::NULL`].
pub struct HandleTable<T> {
    slots: Vec<HandleSlot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_handle(kind: HandleKind, index: u32, generation: u16) -> Handle {
    Handle::from_parts(kind, ((generation as u64) << HANDLE_INDEX_BITS) | (index as u64))
}

fn decode_handle(handle: Handle) -> Option<(HandleKind, u32, u16)> {
    let kind = handle.kind()?;
    if kind == HandleKind::Int {
        return None;
    }
    let payload = handle.payload();
    let index = payload & HANDLE_INDEX_MASK;
    let generation = ((payload >> HANDLE_INDEX_BITS) & HANDLE_GEN_MASK) as u16;
    if generation == 0 || index > u32::MAX as u64 {
        return None;
    }
    Some((kind, index as u32, generation))
}

fn next_generation(generation: u16) -> u16 {
    let next = generation.wrapping_add(1);
    if next == 0 { 1 } else { next }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Stores `value` and returns a fresh handle tagged with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`HandleKind::Int`]; integers are carried inline
    /// and never occupy a slot.
    pub fn insert(&mut self, kind: HandleKind, value: T) -> Handle {
        assert!(kind != HandleKind::Int, "int handles are not table-backed");
        let (index, generation) = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = next_generation(slot.generation);
            slot.kind = kind;
            slot.value = Some(value);
            (index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HandleSlot {
                value: Some(value),
                kind,
                generation: 1,
            });
            (index, 1)
        };
        self.live += 1;
        encode_handle(kind, index, generation)
    }

    fn slot_index(&self, handle: Handle) -> Option<usize> {
        let (kind, index, generation) = decode_handle(handle)?;
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation || slot.kind != kind || slot.value.is_none() {
            return None;
        }
        Some(index as usize)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_mut()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.slot_index(handle).is_some()
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = self.slot_index(handle)?;
        let slot = &mut self.slots[index];
        let value = slot.value.take();
        slot.generation = next_generation(slot.generation);
        self.free.push(index as u32);
        self.live -= 1;
        value
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_get_remove() {
        let mut table = HandleTable::new();
        let a = table.insert(HandleKind::Dict, "a");
        let b = table.insert(HandleKind::Module, "b");
        assert_ne!(a, b);
        assert!(a.is_kind(HandleKind::Dict));
        assert!(b.is_kind(HandleKind::Module));
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.remove(a), Some("a"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.remove(a), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reused_slot_rejects_stale_handle() {
        let mut table = HandleTable::new();
        let first = table.insert(HandleKind::Object, 1u32);
        table.remove(first);
        let second = table.insert(HandleKind::Object, 2u32);
        assert_ne!(first, second);
        assert_eq!(table.get(first), None);
        assert_eq!(table.get(second), Some(&2));
    }

    #[test]
    fn retagged_handle_does_not_resolve() {
        let mut table = HandleTable::new();
        let dict = table.insert(HandleKind::Dict, ());
        let forged = Handle::from_parts(HandleKind::Module, dict.payload());
        assert!(table.contains(dict));
        assert!(!table.contains(forged));
        assert!(!table.contains(Handle::NULL));
        assert!(!table.contains(Handle::from_int(0)));
    }

    proptest! {
        #[test]
        fn live_handles_are_distinct_and_non_null(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut table = HandleTable::new();
            let mut live: Vec<Handle> = Vec::new();
            for (step, insert) in ops.into_iter().enumerate() {
                if insert || live.is_empty() {
                    let handle = table.insert(HandleKind::Object, step);
                    prop_assert!(!handle.is_null());
                    prop_assert!(!live.contains(&handle));
                    live.push(handle);
                } else {
                    let handle = live.remove(step % live.len());
                    prop_assert!(table.remove(handle).is_some());
                    prop_assert!(table.get(handle).is_none());
                }
                prop_assert_eq!(table.len(), live.len());
            }
        }
    }
}
