//! The call helper: verified, typed calls into generated code
//!
//! Every call goes through the same steps:
//! 1. verify the call site against the bound [`MachineSignature`]
//! 2. re-resolve the entry address (never cached; code may be regenerated)
//! 3. invoke the entry through [`GeneratedCode`] with the arguments unchanged
//! 4. convert the raw return word into the requested result type
//!
//! Step 4 is the identity for plain machine values. A `bool` result is read
//! as the returned byte and compared against zero. For boxed results
//! ([`Value`]) the code returns a raw 64-bit word which is reinterpreted as a
//! `Value` without copying or validating it.

use log::trace;

use crate::code::Address;
use crate::context::ExecutionContext;
use crate::generated::{CallArgs, GeneratedCode};
use crate::machine::{MachineRepr, MachineType};
use crate::signature::MachineSignature;
use crate::value::Value;

/// A type that generated code can return
pub trait CallResult: Sized {
    /// Machine kind returned (`None` for no return value)
    const MACHINE_TYPE: Option<MachineType>;

    /// Whether the result is rebuilt from a raw word (boxed values)
    const IS_BOXED: bool = false;

    /// What the low-level invocation actually returns
    type Raw: Copy;

    /// Convert the raw return of the invocation into `Self`
    fn from_raw(raw: Self::Raw) -> Self;
}

macro_rules! impl_direct_result {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CallResult for $ty {
                const MACHINE_TYPE: Option<MachineType> = Some(<$ty as MachineRepr>::MACHINE_TYPE);
                type Raw = $ty;

                #[inline]
                fn from_raw(raw: $ty) -> $ty {
                    raw
                }
            }
        )*
    };
}

impl_direct_result!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, Address, f32, f64);

// Generated code returning a `Uint8` may hand back any byte
impl CallResult for bool {
    const MACHINE_TYPE: Option<MachineType> = Some(MachineType::Uint8);
    type Raw = u8;

    #[inline]
    fn from_raw(raw: u8) -> bool {
        raw != 0
    }
}

impl<T> CallResult for *const T {
    const MACHINE_TYPE: Option<MachineType> = Some(MachineType::Pointer);
    type Raw = *const T;

    #[inline]
    fn from_raw(raw: *const T) -> *const T {
        raw
    }
}

impl<T> CallResult for *mut T {
    const MACHINE_TYPE: Option<MachineType> = Some(MachineType::Pointer);
    type Raw = *mut T;

    #[inline]
    fn from_raw(raw: *mut T) -> *mut T {
        raw
    }
}

impl CallResult for () {
    const MACHINE_TYPE: Option<MachineType> = None;
    type Raw = ();

    #[inline]
    fn from_raw(_: ()) {}
}

impl CallResult for Value {
    const MACHINE_TYPE: Option<MachineType> = Some(MachineType::AnyTagged);
    const IS_BOXED: bool = true;
    type Raw = u64;

    #[inline]
    fn from_raw(raw: u64) -> Value {
        // Safety: the helper's contract makes the code return a well-formed value
        unsafe { Value::from_raw(raw) }
    }
}

/// Typed, signature-verified calls into generated code returning `R`
///
/// Implementors only supply the context, the signature and the
/// entry-resolution hook; [`CallHelper::call`] does the rest.
///
/// # Safety
///
/// Every address returned by [`CallHelper::resolve_entry`] must be executable
/// code implementing [`CallHelper::signature`] under the C calling
/// convention.
pub unsafe trait CallHelper<R: CallResult> {
    /// Execution context calls run in
    fn context(&self) -> &ExecutionContext;

    /// Signature every call site is checked against
    fn signature(&self) -> &MachineSignature;

    /// Current entry address of the code to call
    fn resolve_entry(&self) -> Address;

    /// Call the generated code with `args`.
    ///
    /// # Panics
    ///
    /// Panics before entering the code if `A`/`R` do not match the signature.
    #[track_caller]
    fn call<A: CallArgs>(&self, args: A) -> R {
        self.signature().verify::<A, R>();
        let entry = self.resolve_entry();
        trace!("call {} at {} (boxed: {})", self.signature(), entry, R::IS_BOXED);
        // Safety: signature checked above; entry validity is the trait contract
        let code = unsafe { GeneratedCode::<A, R::Raw>::from_address(self.context(), entry) };
        R::from_raw(code.call(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_kinds() {
        assert_eq!(<i32 as CallResult>::MACHINE_TYPE, Some(MachineType::Int32));
        assert_eq!(<() as CallResult>::MACHINE_TYPE, None);
        assert_eq!(<*mut u8 as CallResult>::MACHINE_TYPE, Some(MachineType::Pointer));
        assert_eq!(<Value as CallResult>::MACHINE_TYPE, Some(MachineType::AnyTagged));
    }

    #[test]
    fn test_only_values_are_boxed() {
        assert!(<Value as CallResult>::IS_BOXED);
        assert!(!<u64 as CallResult>::IS_BOXED);
        assert!(!<usize as CallResult>::IS_BOXED);
        assert!(!<() as CallResult>::IS_BOXED);
    }

    #[test]
    fn test_bool_result_decodes_any_byte() {
        assert_eq!(<bool as CallResult>::MACHINE_TYPE, Some(MachineType::Uint8));
        assert!(!<bool as CallResult>::from_raw(0));
        assert!(<bool as CallResult>::from_raw(1));
        assert!(<bool as CallResult>::from_raw(2));
        assert!(<bool as CallResult>::from_raw(0xFF));
    }

    #[test]
    fn test_boxed_from_raw_is_reinterpretation() {
        let raw = Value::bool(true).raw();
        let value = <Value as CallResult>::from_raw(raw);
        assert_eq!(value.raw(), raw);
        assert_eq!(value.as_bool(), Some(true));
    }

    struct FixedEntry {
        context: ExecutionContext,
        signature: MachineSignature,
        entry: Address,
    }

    unsafe impl CallHelper<i32> for FixedEntry {
        fn context(&self) -> &ExecutionContext {
            &self.context
        }

        fn signature(&self) -> &MachineSignature {
            &self.signature
        }

        fn resolve_entry(&self) -> Address {
            self.entry
        }
    }

    extern "C" fn negate(x: i32) -> i32 {
        -x
    }

    #[test]
    fn test_default_call_path() {
        let helper = FixedEntry {
            context: ExecutionContext::new("test"),
            signature: MachineSignature::of::<(i32,), i32>(),
            entry: Address::new(negate as extern "C" fn(i32) -> i32 as usize),
        };
        assert_eq!(helper.call((5,)), -5);
        assert_eq!(helper.context().invocations(), 1);
    }

    #[test]
    #[should_panic(expected = "parameter 0")]
    fn test_mismatch_aborts_before_entering() {
        let helper = FixedEntry {
            context: ExecutionContext::new("test"),
            signature: MachineSignature::of::<(i32,), i32>(),
            // Never called: verification fails first
            entry: Address::NULL,
        };
        helper.call((5i64,));
    }
}
