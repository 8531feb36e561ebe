//! Boxed results are rebuilt from the returned word without allocating.
//!
//! Lives in its own test binary: the counting allocator replaces the global
//! one and nothing here installs a logger. Counts are per thread so tests
//! running in parallel do not see each other's allocations.

use raya_calltest::{
    Address, CallHelper, Code, CodeHandle, CodeRunner, ExecutionContext, MachineSignature,
    MachineType, Value,
};

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

struct CountingAlloc;

thread_local! {
    // const-initialised without a destructor: safe to touch from the allocator
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

fn count() {
    let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
}

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        count();
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        count();
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

extern "C" fn boxed_seven() -> u64 {
    Value::i32(7).raw()
}

extern "C" fn box_i32(x: i32) -> u64 {
    Value::i32(x).raw()
}

fn code(name: &str, entry: usize) -> CodeHandle {
    CodeHandle::new(unsafe { Code::from_entry(name, Address::new(entry), 0) })
}

#[test]
fn boxed_call_does_not_allocate() {
    let ctx = ExecutionContext::new("alloc");
    let sig = MachineSignature::new(&[], Some(MachineType::AnyTagged));
    let entry = boxed_seven as extern "C" fn() -> u64 as usize;
    let runner: CodeRunner<'_, Value> =
        unsafe { CodeRunner::new(&ctx, code("seven", entry), &sig) };

    let before = allocations();
    let value = runner.call(());
    let after = allocations();

    assert_eq!(after, before, "boxed call allocated {} time(s)", after - before);
    assert_eq!(value, Value::i32(7));
}

#[test]
fn repeated_boxed_calls_do_not_allocate() {
    let ctx = ExecutionContext::new("alloc");
    let sig = MachineSignature::new(&[MachineType::Int32], Some(MachineType::AnyTagged));
    let entry = box_i32 as extern "C" fn(i32) -> u64 as usize;
    let runner: CodeRunner<'_, Value> = unsafe { CodeRunner::new(&ctx, code("box", entry), &sig) };

    let before = allocations();
    let mut last = Value::null();
    for i in 0..1000 {
        last = runner.call((i,));
    }
    let after = allocations();

    assert_eq!(after, before, "boxed calls allocated {} time(s)", after - before);
    assert_eq!(last, Value::i32(999));
}
