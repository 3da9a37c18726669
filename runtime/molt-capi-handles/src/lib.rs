//! Opaque handles for the Molt C-API bridge.
//! A handle is 64 bits: an 8-bit kind tag over a 56-bit payload. Native code
//! may hold, compare and pass handles but never reads managed data through
//! them; every attribute access is a separate managed-side operation.

mod handle_table;

pub use handle_table::HandleTable;

use std::fmt;

const TAG_SHIFT: u64 = 56;
const TAG_MASK: u64 = 0xFF << TAG_SHIFT;
const PAYLOAD_MASK: u64 = (1u64 << TAG_SHIFT) - 1;
const INT_WIDTH: u64 = 56;
const INT_SIGN_BIT: u64 = 1 << (INT_WIDTH - 1);

/// Largest integer that survives a trip through [`Handle::from_int`].
pub const HANDLE_INT_MAX: i64 = (INT_SIGN_BIT - 1) as i64;
/// Smallest integer that survives a trip through [`Handle::from_int`].
pub const HANDLE_INT_MIN: i64 = -(INT_SIGN_BIT as i64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleKind {
    Int = 1,
    ThreadState = 2,
    Dict = 3,
    Module = 4,
    Object = 5,
}

impl HandleKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Int),
            2 => Some(Self::ThreadState),
            3 => Some(Self::Dict),
            4 => Some(Self::Module),
            5 => Some(Self::Object),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::ThreadState => "thread-state",
            Self::Dict => "dict",
            Self::Module => "module",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The "no value" handle. The managed side answers "not found" with it.
    pub const NULL: Handle = Handle(0);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn from_parts(kind: HandleKind, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK, "handle payload exceeds 56 bits");
        Self(((kind as u64) << TAG_SHIFT) | (payload & PAYLOAD_MASK))
    }

    pub(crate) fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    /// Tag of a non-null handle. Unknown tags read as `None`.
    pub fn kind(self) -> Option<HandleKind> {
        if self.is_null() {
            return None;
        }
        HandleKind::from_tag(((self.0 & TAG_MASK) >> TAG_SHIFT) as u8)
    }

    pub fn is_kind(self, kind: HandleKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn from_int(i: i64) -> Self {
        debug_assert!(
            (HANDLE_INT_MIN..=HANDLE_INT_MAX).contains(&i),
            "integer does not fit a handle payload"
        );
        Self::from_parts(HandleKind::Int, (i as u64) & PAYLOAD_MASK)
    }

    pub fn as_int(self) -> Option<i64> {
        if !self.is_kind(HandleKind::Int) {
            return None;
        }
        let val = self.payload();
        if (val & INT_SIGN_BIT) != 0 {
            Some((val as i64) - ((1u64 << INT_WIDTH) as i64))
        } else {
            Some(val as i64)
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            None if self.is_null() => f.write_str("Handle(NULL)"),
            None => write!(f, "Handle(?{:#x})", self.0),
            Some(HandleKind::Int) => write!(f, "Handle(int {})", self.as_int().unwrap_or_default()),
            Some(kind) => write!(f, "Handle({kind} {:#x})", self.payload()),
        }
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(Handle);

        impl $name {
            pub const KIND: HandleKind = $kind;

            /// Accepts `handle` only if it carries this wrapper's kind tag.
            pub fn try_from_handle(handle: Handle) -> Option<Self> {
                handle.is_kind(Self::KIND).then_some(Self(handle))
            }

            pub fn handle(self) -> Handle {
                self.0
            }

            pub fn bits(self) -> u64 {
                self.0.bits()
            }
        }

        impl From<$name> for Handle {
            fn from(value: $name) -> Handle {
                value.0
            }
        }
    };
}

typed_handle!(
    /// The managed runtime's per-thread execution context. Borrowed by native
    /// code for the duration of one call.
    ThreadStateHandle,
    HandleKind::ThreadState
);
typed_handle!(
    /// Generic key/value storage owned by the managed runtime.
    DictHandle,
    HandleKind::Dict
);
typed_handle!(ModuleHandle, HandleKind::Module);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_has_no_kind() {
        assert!(Handle::NULL.is_null());
        assert_eq!(Handle::NULL.kind(), None);
        assert_eq!(Handle::NULL.as_int(), None);
    }

    #[test]
    fn int_handles_keep_sign() {
        assert_eq!(Handle::from_int(42).as_int(), Some(42));
        assert_eq!(Handle::from_int(-1).as_int(), Some(-1));
        assert_eq!(Handle::from_int(HANDLE_INT_MAX).as_int(), Some(HANDLE_INT_MAX));
        assert_eq!(Handle::from_int(HANDLE_INT_MIN).as_int(), Some(HANDLE_INT_MIN));
        assert!(!Handle::from_int(0).is_null());
    }

    #[test]
    fn typed_wrappers_check_tag() {
        let module = Handle::from_parts(HandleKind::Module, 7);
        assert!(ModuleHandle::try_from_handle(module).is_some());
        assert!(DictHandle::try_from_handle(module).is_none());
        assert!(ThreadStateHandle::try_from_handle(Handle::NULL).is_none());
        assert!(ModuleHandle::try_from_handle(Handle::from_int(7)).is_none());
    }

    #[test]
    fn unknown_tag_is_not_a_kind() {
        let bogus = Handle::from_bits((0xFFu64 << TAG_SHIFT) | 1);
        assert_eq!(bogus.kind(), None);
        assert!(!bogus.is_null());
    }
}
