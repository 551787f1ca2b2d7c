// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Platform execution contexts behind one interface.
//!
//! An `ExecutionContext` is either the thread's native context (`native()`) or a
//! fresh context bound to its own stack and an entry function (`new()`).
//! `switch()` saves the running context into `from` and restores `to`. Dropping an
//! `ExecutionContext` destroys it together with the stack it owns.
//!
//! Entry functions never return. Their last act is a `switch()` away from their
//! own context, which is the link to whatever runs after them.

use std::os::raw::c_void;

/// Entry function of a new context, called with the `arg` given to `ExecutionContext::new()`.
pub type EntryFn = unsafe fn(arg: *mut c_void) -> !;

#[cfg(unix)]
pub use self::fcontext::ExecutionContext;

#[cfg(windows)]
pub use self::fiber::ExecutionContext;

#[cfg(unix)]
mod fcontext {
    use std::cell::Cell;
    use std::io;
    use std::os::raw::c_void;

    use super::EntryFn;
    use crate::context::{Context, Transfer};
    use crate::error::StackError;
    use crate::stack::ProtectedFixedSizeStack;

    /// Passed as `Transfer::data` on every jump.
    struct Switch {
        from: *const ExecutionContext,
        to: *const ExecutionContext,
    }

    pub struct ExecutionContext {
        // Saved state while this context is not running. `None` while it runs.
        saved: Cell<Option<Context>>,
        entry: Option<(EntryFn, *mut c_void)>,
        // Declared last: `saved` points into it.
        stack: Option<ProtectedFixedSizeStack>,
    }

    impl ExecutionContext {
        pub fn native() -> ExecutionContext {
            ExecutionContext {
                saved: Cell::new(None),
                entry: None,
                stack: None,
            }
        }

        pub fn new(stack_size: usize, entry: EntryFn, arg: *mut c_void) -> Result<ExecutionContext, StackError> {
            let stack = ProtectedFixedSizeStack::new(stack_size)?;
            let context = unsafe { Context::new(&stack, trampoline) };

            Ok(ExecutionContext {
                saved: Cell::new(Some(context)),
                entry: Some((entry, arg)),
                stack: Some(stack),
            })
        }

        /// Nothing to prepare, the native context is captured by the first switch.
        pub fn attach_thread(&self) -> io::Result<()> {
            Ok(())
        }

        pub fn stack_size(&self) -> Option<usize> {
            self.stack.as_ref().map(|stack| stack.len())
        }

        /// Saves the running state into `from` and continues `to`.
        ///
        /// Returns once some other context switches back to `from`.
        ///
        /// It is unsafe because `from` has to be the running context and `to` a suspended one,
        /// and both have to stay alive until the switch back.
        pub unsafe fn switch(from: &ExecutionContext, to: &ExecutionContext) {
            let target = match to.saved.take() {
                Some(context) => context,
                None => unreachable!("switch to a context that is running"),
            };

            let switch = Switch { from, to };
            let t = target.resume(&switch as *const Switch as usize);
            store_switcher(t);
        }
    }

    // Whoever wakes up records the context of the side that just suspended.
    #[inline(always)]
    unsafe fn store_switcher(t: Transfer) -> *const ExecutionContext {
        let switch = &*(t.data as *const Switch);
        (*switch.from).saved.set(Some(t.context));
        switch.to
    }

    extern "C" fn trampoline(t: Transfer) -> ! {
        unsafe {
            let this = &*store_switcher(t);
            match this.entry {
                Some((entry, arg)) => entry(arg),
                None => unreachable!("native context has no entry function"),
            }
        }
    }
}

#[cfg(windows)]
mod fiber {
    use std::cell::Cell;
    use std::io;
    use std::os::raw::c_void;
    use std::ptr;

    use super::EntryFn;
    use crate::error::StackError;
    use crate::sys;

    struct Entry {
        f: EntryFn,
        arg: *mut c_void,
    }

    pub struct ExecutionContext {
        fiber: Cell<*mut c_void>,
        // Set when the native context converted the thread itself.
        converted: Cell<bool>,
        entry: *mut Entry,
        stack_size: Option<usize>,
    }

    impl ExecutionContext {
        pub fn native() -> ExecutionContext {
            ExecutionContext {
                fiber: Cell::new(ptr::null_mut()),
                converted: Cell::new(false),
                entry: ptr::null_mut(),
                stack_size: None,
            }
        }

        pub fn new(stack_size: usize, entry: EntryFn, arg: *mut c_void) -> Result<ExecutionContext, StackError> {
            let max_stack_size = sys::max_stack_size();
            if stack_size > max_stack_size {
                return Err(StackError::ExceedsMaximumSize(max_stack_size));
            }
            let stack_size = stack_size.max(sys::min_stack_size());

            let entry = Box::into_raw(Box::new(Entry { f: entry, arg }));
            match sys::create_fiber(stack_size, fiber_proc, entry as *mut c_void) {
                Ok(fiber) => Ok(ExecutionContext {
                    fiber: Cell::new(fiber),
                    converted: Cell::new(false),
                    entry,
                    stack_size: Some(stack_size),
                }),
                Err(err) => {
                    drop(unsafe { Box::from_raw(entry) });
                    Err(StackError::Io(err))
                }
            }
        }

        /// Turns the calling thread into a fiber so that fibers can switch back to it.
        pub fn attach_thread(&self) -> io::Result<()> {
            if self.fiber.get().is_null() {
                let (fiber, converted) = sys::current_thread_fiber()?;
                self.fiber.set(fiber);
                self.converted.set(converted);
            }
            Ok(())
        }

        pub fn stack_size(&self) -> Option<usize> {
            self.stack_size
        }

        /// Continues `to`. The fiber of `from` keeps its own state.
        ///
        /// It is unsafe because `from` has to be the running context and `to` a suspended one,
        /// and both have to stay alive until the switch back.
        pub unsafe fn switch(from: &ExecutionContext, to: &ExecutionContext) {
            debug_assert!(!from.fiber.get().is_null());
            sys::switch_to_fiber(to.fiber.get());
        }
    }

    impl Drop for ExecutionContext {
        fn drop(&mut self) {
            unsafe {
                if !self.entry.is_null() {
                    sys::delete_fiber(self.fiber.get());
                    drop(Box::from_raw(self.entry));
                } else if self.converted.get() {
                    sys::convert_fiber_to_thread();
                }
            }
        }
    }

    unsafe extern "system" fn fiber_proc(param: *mut c_void) {
        let entry = &*(param as *const Entry);
        (entry.f)(entry.arg)
    }
}
