//! Low-level typed invocation of generated code
//!
//! [`GeneratedCode`] turns an entry address into a C-ABI function pointer of
//! the requested shape and calls it. Argument marshalling is left entirely to
//! the platform calling convention of `extern "C" fn`.

use std::fmt;
use std::marker::PhantomData;

use crate::code::{Address, Code};
use crate::context::ExecutionContext;
use crate::machine::{MachineRepr, MachineType};

/// A tuple of arguments that can be passed to generated code
///
/// Implemented for tuples of up to eight [`MachineRepr`] values, including
/// the empty tuple.
pub trait CallArgs: Copy {
    /// Machine kinds of the tuple elements, in order
    const TYPES: &'static [MachineType];

    /// Call the C-ABI function at `entry` with these arguments.
    ///
    /// # Safety
    ///
    /// `entry` must be a function taking exactly these arguments and returning
    /// `R` under the C calling convention.
    #[doc(hidden)]
    unsafe fn invoke<R: Copy>(self, entry: Address) -> R;
}

macro_rules! impl_call_args {
    ($($ty:ident $arg:ident),*) => {
        impl<$($ty: MachineRepr),*> CallArgs for ($($ty,)*) {
            const TYPES: &'static [MachineType] = &[$(<$ty as MachineRepr>::MACHINE_TYPE),*];

            #[inline]
            unsafe fn invoke<R: Copy>(self, entry: Address) -> R {
                let ($($arg,)*) = self;
                let f = unsafe {
                    std::mem::transmute::<*const u8, extern "C" fn($($ty),*) -> R>(entry.as_ptr())
                };
                f($($arg),*)
            }
        }
    };
}

impl_call_args!();
impl_call_args!(A a);
impl_call_args!(A a, B b);
impl_call_args!(A a, B b, C c);
impl_call_args!(A a, B b, C c, D d);
impl_call_args!(A a, B b, C c, D d, E e);
impl_call_args!(A a, B b, C c, D d, E e, F f);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g, H h);

/// Generated code viewed as a typed function `extern "C" fn(A...) -> R`
pub struct GeneratedCode<'a, A, R> {
    context: &'a ExecutionContext,
    entry: Address,
    _fn: PhantomData<fn(A) -> R>,
}

impl<'a, A: CallArgs, R: Copy> GeneratedCode<'a, A, R> {
    /// View the code at `entry` as a typed function.
    ///
    /// # Safety
    ///
    /// `entry` must be executable code with the C signature `fn(A...) -> R`.
    pub unsafe fn from_address(context: &'a ExecutionContext, entry: Address) -> Self {
        GeneratedCode {
            context,
            entry,
            _fn: PhantomData,
        }
    }

    /// View the current entry of a code object as a typed function.
    ///
    /// # Safety
    ///
    /// Same contract as [`GeneratedCode::from_address`].
    pub unsafe fn from_code(context: &'a ExecutionContext, code: &Code) -> Self {
        unsafe { Self::from_address(context, code.entry()) }
    }

    /// Entry address this view calls
    pub fn entry(&self) -> Address {
        self.entry
    }

    /// Call the code. Whatever the code does (including faulting) happens
    /// directly on this thread.
    pub fn call(&self, args: A) -> R {
        let _scope = self.context.enter(self.entry);
        // Safety: guaranteed by the constructor contract
        unsafe { args.invoke(self.entry) }
    }
}

impl<A, R> fmt::Debug for GeneratedCode<'_, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCode")
            .field("context", &self.context.name())
            .field("entry", &self.entry)
            .finish()
    }
}
