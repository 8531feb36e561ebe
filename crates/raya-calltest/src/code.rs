//! Generated-code objects and handles
//!
//! A [`Code`] object is what a code generator hands back: a named block of
//! machine code with an entry address. Tests hold it through a [`CodeHandle`]
//! or through a [`CodeWrapper`] container; both shapes normalise to the same
//! handle via [`IntoCodeHandle`] before any entry is resolved.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Machine address of executable code
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Address(usize);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    /// Wrap a raw address
    pub const fn new(addr: usize) -> Self {
        Address(addr)
    }

    /// Address of a code pointer
    pub fn from_ptr(ptr: *const u8) -> Self {
        Address(ptr as usize)
    }

    /// Raw address
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Address as a code pointer
    pub fn as_ptr(self) -> *const u8 {
        self.0 as *const u8
    }

    /// Whether this is the null address
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A generated code object
///
/// The entry can be swapped when the object is re-generated; callers that
/// read [`Code::entry`] each time they call always see the newest code.
pub struct Code {
    name: String,
    entry: AtomicUsize,
    size: AtomicUsize,
    generation: AtomicU32,
}

impl Code {
    /// Wrap generated code starting at `entry`.
    ///
    /// # Safety
    ///
    /// `entry` must point to executable code that stays mapped for as long as
    /// this object (or any handle to it) is used to make calls.
    pub unsafe fn from_entry(name: impl Into<String>, entry: Address, size: usize) -> Self {
        Code {
            name: name.into(),
            entry: AtomicUsize::new(entry.as_usize()),
            size: AtomicUsize::new(size),
            generation: AtomicU32::new(0),
        }
    }

    /// Name given by the code generator
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current entry address
    pub fn entry(&self) -> Address {
        Address(self.entry.load(Ordering::Acquire))
    }

    /// Size of the current code block in bytes (0 if unknown)
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of times this object has been re-generated
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Point this object at re-generated code.
    ///
    /// # Safety
    ///
    /// Same contract as [`Code::from_entry`], and the new code must implement
    /// the same signature as the old one.
    pub unsafe fn replace_entry(&self, entry: Address, size: usize) {
        self.size.store(size, Ordering::Relaxed);
        self.entry.store(entry.as_usize(), Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("code '{}' regenerated (gen {}) at {}", self.name, generation, entry);
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("name", &self.name)
            .field("entry", &self.entry())
            .field("size", &self.size())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Shared handle to a [`Code`] object
#[derive(Debug, Clone)]
pub struct CodeHandle(Arc<Code>);

impl CodeHandle {
    /// Take ownership of a code object
    pub fn new(code: Code) -> Self {
        CodeHandle(Arc::new(code))
    }

    /// Whether both handles refer to the same code object
    pub fn ptr_eq(&self, other: &CodeHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for CodeHandle {
    type Target = Code;

    fn deref(&self) -> &Code {
        &self.0
    }
}

/// Container shape of a code handle, unwrapped before use
#[derive(Debug, Clone)]
pub struct CodeWrapper {
    code: CodeHandle,
}

impl CodeWrapper {
    /// Wrap a code handle
    pub fn new(code: CodeHandle) -> Self {
        CodeWrapper { code }
    }

    /// The wrapped code object
    pub fn code(&self) -> &CodeHandle {
        &self.code
    }

    /// Unwrap into the canonical handle
    pub fn into_code(self) -> CodeHandle {
        self.code
    }
}

/// Normalisation of every accepted code-handle shape to a [`CodeHandle`]
pub trait IntoCodeHandle {
    /// Convert into the canonical handle
    fn into_code_handle(self) -> CodeHandle;
}

impl IntoCodeHandle for CodeHandle {
    fn into_code_handle(self) -> CodeHandle {
        self
    }
}

impl IntoCodeHandle for &CodeHandle {
    fn into_code_handle(self) -> CodeHandle {
        self.clone()
    }
}

impl IntoCodeHandle for CodeWrapper {
    fn into_code_handle(self) -> CodeHandle {
        self.into_code()
    }
}

impl IntoCodeHandle for &CodeWrapper {
    fn into_code_handle(self) -> CodeHandle {
        self.code.clone()
    }
}

impl IntoCodeHandle for Code {
    fn into_code_handle(self) -> CodeHandle {
        CodeHandle::new(self)
    }
}
