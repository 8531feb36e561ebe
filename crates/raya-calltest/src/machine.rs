//! Machine value kinds
//!
//! A `MachineType` names the machine-level representation of a single
//! parameter or return value crossing the generated-code boundary. Host types
//! opt in through [`MachineRepr`]; a type without an impl cannot be passed to
//! generated code at all, so most signature mistakes are compile errors.

use std::fmt;

use crate::code::Address;
use crate::value::Value;

/// Representation class of a machine value (register/stack slot width and bank)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineRepresentation {
    /// 8-bit integer word
    Word8,
    /// 16-bit integer word
    Word16,
    /// 32-bit integer word
    Word32,
    /// 64-bit integer word
    Word64,
    /// Single-precision float
    Float32,
    /// Double-precision float
    Float64,
    /// Tagged runtime value (a pointer-sized word with tag bits)
    Tagged,
}

/// Machine value kind of a parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer (also C `bool` results)
    Uint8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    Uint16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    Uint32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    Uint64,
    /// Untagged address-sized word
    Pointer,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Boxed runtime value (`Value`)
    AnyTagged,
}

impl MachineType {
    /// Representation class of this kind
    pub const fn representation(self) -> MachineRepresentation {
        match self {
            MachineType::Int8 | MachineType::Uint8 => MachineRepresentation::Word8,
            MachineType::Int16 | MachineType::Uint16 => MachineRepresentation::Word16,
            MachineType::Int32 | MachineType::Uint32 => MachineRepresentation::Word32,
            MachineType::Int64 | MachineType::Uint64 => MachineRepresentation::Word64,
            MachineType::Pointer => {
                if cfg!(target_pointer_width = "64") {
                    MachineRepresentation::Word64
                } else {
                    MachineRepresentation::Word32
                }
            }
            MachineType::Float32 => MachineRepresentation::Float32,
            MachineType::Float64 => MachineRepresentation::Float64,
            MachineType::AnyTagged => MachineRepresentation::Tagged,
        }
    }

    /// Size of the value in bytes
    pub const fn size(self) -> usize {
        match self.representation() {
            MachineRepresentation::Word8 => 1,
            MachineRepresentation::Word16 => 2,
            MachineRepresentation::Word32 | MachineRepresentation::Float32 => 4,
            MachineRepresentation::Word64
            | MachineRepresentation::Float64
            | MachineRepresentation::Tagged => 8,
        }
    }

    /// Whether this kind lives in a float register
    pub const fn is_float(self) -> bool {
        matches!(self, MachineType::Float32 | MachineType::Float64)
    }

    /// Whether this kind is a signed integer
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            MachineType::Int8 | MachineType::Int16 | MachineType::Int32 | MachineType::Int64
        )
    }

    /// Whether this kind is the boxed runtime value
    pub const fn is_tagged(self) -> bool {
        matches!(self, MachineType::AnyTagged)
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MachineType::Int8 => "i8",
            MachineType::Uint8 => "u8",
            MachineType::Int16 => "i16",
            MachineType::Uint16 => "u16",
            MachineType::Int32 => "i32",
            MachineType::Uint32 => "u32",
            MachineType::Int64 => "i64",
            MachineType::Uint64 => "u64",
            MachineType::Pointer => "ptr",
            MachineType::Float32 => "f32",
            MachineType::Float64 => "f64",
            MachineType::AnyTagged => "tagged",
        };
        f.write_str(name)
    }
}

/// A host type that can cross the generated-code boundary by value
///
/// Every implementor maps to exactly one [`MachineType`].
///
/// # Safety
///
/// The type must be ABI-identical to the C type of its kind: same size,
/// alignment and register class, passed and returned exactly like it. Every
/// bit pattern of that kind must be a valid value of the type, since
/// generated code may produce any of them. `bool` is not `MachineRepr` for
/// this reason; it is only decoded as a result (see
/// [`CallResult`](crate::CallResult)).
pub unsafe trait MachineRepr: Copy {
    /// The machine kind this type is passed as
    const MACHINE_TYPE: MachineType;
}

macro_rules! impl_machine_repr {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            unsafe impl MachineRepr for $ty {
                const MACHINE_TYPE: MachineType = MachineType::$kind;
            }
        )*
    };
}

impl_machine_repr! {
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    isize => Pointer,
    usize => Pointer,
    Address => Pointer,
    f32 => Float32,
    f64 => Float64,
    Value => AnyTagged,
}

unsafe impl<T> MachineRepr for *const T {
    const MACHINE_TYPE: MachineType = MachineType::Pointer;
}

unsafe impl<T> MachineRepr for *mut T {
    const MACHINE_TYPE: MachineType = MachineType::Pointer;
}
