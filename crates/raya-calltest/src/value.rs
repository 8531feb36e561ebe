//! Boxed runtime values
//!
//! The tagged 64-bit representation generated code hands back when a
//! signature returns [`MachineType::AnyTagged`](crate::MachineType::AnyTagged).
//! Only what the call bridge and its tests need is modelled here; the layout
//! matches the Raya VM value encoding.
//!
//! # Encoding
//!
//! ```text
//! Pointer:  pppppppppppppppppppppppppppppppppppppppppppppppppppppppppp000
//! i32:      iiiiiiiiiiiiiiiiiiiiiiiiiiiiiiii00000000000000000000000000000001
//! bool:     000000000000000000000000000000000000000000000000000000000b010
//! null:     0000000000000000000000000000000000000000000000000000000000110
//! ```

use std::fmt;
use std::ptr::NonNull;

/// Tagged runtime value
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    /// Mask of the tag bits
    pub const TAG_MASK: u64 = 0b111;
    /// Tag of heap pointers
    pub const TAG_PTR: u64 = 0b000;
    /// Tag of inline i32s
    pub const TAG_I32: u64 = 0b001;
    /// Tag of booleans
    pub const TAG_BOOL: u64 = 0b010;
    /// Tag of null
    pub const TAG_NULL: u64 = 0b110;

    const NULL: u64 = Self::TAG_NULL;
    const TRUE: u64 = (1 << 3) | Self::TAG_BOOL;
    const FALSE: u64 = Self::TAG_BOOL;

    /// Create a null value
    #[inline]
    pub const fn null() -> Self {
        Value(Self::NULL)
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Value(if b { Self::TRUE } else { Self::FALSE })
    }

    /// Create an i32 value
    #[inline]
    pub const fn i32(i: i32) -> Self {
        Value((((i as i64) as u64) << 32) | Self::TAG_I32)
    }

    /// Create a pointer value
    ///
    /// # Safety
    ///
    /// The pointer must be 8-byte aligned and stay valid for as long as the
    /// value is used.
    #[inline]
    pub unsafe fn from_ptr<T>(ptr: NonNull<T>) -> Self {
        let addr = ptr.as_ptr() as usize as u64;
        debug_assert_eq!(addr & Self::TAG_MASK, 0, "Pointer must be 8-byte aligned");
        Value(addr)
    }

    /// Reinterpret a raw machine word as a value. No tag validation is done.
    ///
    /// # Safety
    ///
    /// `bits` must be a well-formed value produced by the runtime or by
    /// generated code that follows the encoding above.
    #[inline]
    pub const unsafe fn from_raw(bits: u64) -> Self {
        Value(bits)
    }

    /// Raw bits of the value
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Tag bits
    #[inline]
    pub const fn tag(&self) -> u64 {
        self.0 & Self::TAG_MASK
    }

    /// Check if this value is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == Self::NULL
    }

    /// Check if this value is a boolean
    #[inline]
    pub const fn is_bool(&self) -> bool {
        self.tag() == Self::TAG_BOOL
    }

    /// Check if this value is an i32
    #[inline]
    pub const fn is_i32(&self) -> bool {
        self.tag() == Self::TAG_I32
    }

    /// Check if this value is a heap pointer
    #[inline]
    pub const fn is_ptr(&self) -> bool {
        self.tag() == Self::TAG_PTR
    }

    /// Extract boolean value
    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        if self.is_bool() {
            Some((self.0 >> 3) != 0)
        } else {
            None
        }
    }

    /// Extract i32 value
    #[inline]
    pub const fn as_i32(&self) -> Option<i32> {
        if self.is_i32() {
            Some((self.0 >> 32) as i32)
        } else {
            None
        }
    }

    /// Extract pointer value
    ///
    /// # Safety
    ///
    /// The value must actually hold a live pointer to a `T`.
    #[inline]
    pub unsafe fn as_ptr<T>(&self) -> Option<NonNull<T>> {
        if self.is_ptr() {
            NonNull::new(self.0 as usize as *mut T)
        } else {
            None
        }
    }

    /// Get type name for debugging
    pub const fn type_name(&self) -> &'static str {
        match self.tag() {
            Self::TAG_NULL => "null",
            Self::TAG_BOOL => "bool",
            Self::TAG_I32 => "i32",
            Self::TAG_PTR => "pointer",
            _ => "unknown",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(b) = self.as_bool() {
            write!(f, "bool({})", b)
        } else if let Some(i) = self.as_i32() {
            write!(f, "i32({})", i)
        } else if self.is_null() {
            write!(f, "null")
        } else if self.is_ptr() {
            write!(f, "ptr({:#x})", self.0)
        } else {
            write!(f, "Value({:#x})", self.0)
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_i32() {
        let v = Value::i32(42);
        assert!(v.is_i32());
        assert_eq!(v.as_i32(), Some(42));
        assert_eq!(Value::i32(-100).as_i32(), Some(-100));
        assert_eq!(Value::i32(i32::MIN).as_i32(), Some(i32::MIN));
        assert_eq!(Value::i32(i32::MAX).as_i32(), Some(i32::MAX));
    }

    #[test]
    fn test_value_bool_and_null() {
        assert_eq!(Value::bool(true).as_bool(), Some(true));
        assert_eq!(Value::bool(false).as_bool(), Some(false));
        assert!(Value::null().is_null());
        assert_eq!(Value::default(), Value::null());
        assert_eq!(Value::null().type_name(), "null");
    }

    #[test]
    fn test_from_raw_keeps_bits() {
        let bits = Value::i32(7).raw();
        let v = unsafe { Value::from_raw(bits) };
        assert_eq!(v.raw(), bits);
        assert_eq!(v.as_i32(), Some(7));
        assert_eq!(std::mem::size_of::<Value>(), std::mem::size_of::<u64>());
    }

    #[test]
    fn test_pointer_round_trip() {
        let boxed = Box::new(0u64);
        let ptr = NonNull::from(boxed.as_ref());
        let v = unsafe { Value::from_ptr(ptr) };
        assert!(v.is_ptr());
        assert_eq!(unsafe { v.as_ptr::<u64>() }, Some(ptr));
        assert_eq!(format!("{:?}", Value::i32(3)), "i32(3)");
    }
}
