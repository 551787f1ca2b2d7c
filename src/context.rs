// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::os::raw::c_void;
use std::ptr;

use crate::stack::Stack;

// Requires cdecl calling convention on x86, which is the default for "C" blocks.
extern "C" {
    /// Creates a new `Context` ontop of some stack.
    ///
    /// # Arguments
    /// * `sp`   - A pointer to the bottom of the stack.
    /// * `size` - The size of the stack.
    /// * `f`    - A function to be invoked on the first call to jump_fcontext(this, _).
    fn make_fcontext(sp: *mut c_void, size: usize, f: ContextFn) -> *const c_void;

    /// Yields the execution to another `Context`.
    ///
    /// # Arguments
    /// * `to` - A pointer to the `Context` with whom we swap execution.
    /// * `p`  - An arbitrary argument that will be set as the `data` field
    ///          of the `Transfer` object passed to the other Context.
    fn jump_fcontext(to: *const c_void, p: usize) -> Transfer;
}

/// Functions of this signature are used as the entry point for a new `Context`.
///
/// The function must never return: the assembly "finish" routine behind it exits the process.
pub type ContextFn = extern "C" fn(t: Transfer) -> !;

/// A `Context` provides the capability of saving and restoring the current state of execution.
///
/// If we have 2 or more `Context` instances, we can thus easily "freeze" the
/// current state of execution and explicitely switch to another `Context`.
/// This `Context` is then resumed exactly where it left of and
/// can in turn "freeze" and switch to another `Context`.
///
/// A `Context` is a one-shot handle: `resume()` consumes it and the suspended
/// side gets a fresh one back in the `Transfer` it receives.
#[repr(C)]
#[derive(Debug, Eq, PartialEq)]
pub struct Context(*const c_void);

// NOTE: Rustc is kinda dumb and introduces a overhead of up to 500% compared to the asm methods
//       if we don't explicitely inline them or use LTO (e.g.: 3ns/iter VS. 18ns/iter on i7 3770).
impl Context {
    /// Returns a `Context` which does not refer to any saved state.
    ///
    /// Resuming it is undefined behaviour.
    #[inline(always)]
    pub unsafe fn empty() -> Context {
        Context(ptr::null())
    }

    /// Creates a new `Context` prepared to execute `f` at the beginning of `stack`.
    ///
    /// `f` is not executed until the first call to `resume()`.
    ///
    /// It is unsafe because `stack` has to outlive every use of the returned `Context`.
    #[inline(always)]
    pub unsafe fn new(stack: &Stack, f: ContextFn) -> Context {
        Context(make_fcontext(stack.top(), stack.len(), f))
    }

    /// Yields the execution to another `Context`.
    ///
    /// The current state of execution is preserved somewhere and the previously saved state
    /// in the `Context` pointed to by `self` is restored and executed next.
    ///
    /// This behaviour is similiar in spirit to regular function calls with the difference
    /// that the call to `resume()` only returns when someone resumes the caller in turn.
    ///
    /// The returned `Transfer` struct contains the previously active `Context` and
    /// the `data` argument used to resume the current one.
    ///
    /// It is unsafe because the stack `self` lives on has to still be allocated.
    #[inline(always)]
    pub unsafe fn resume(self, data: usize) -> Transfer {
        jump_fcontext(self.0, data)
    }

    /// Returns `true` if this is an `empty()` context.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

/// This is the return value by `Context::resume()`.
#[repr(C)]
#[derive(Debug)]
pub struct Transfer {
    /// The previously executed `Context` which yielded to resume the current one.
    pub context: Context,

    /// The `data` which was passed to `Context::resume()` to resume the current `Context`.
    pub data: usize,
}

impl Transfer {
    /// Returns a new `Transfer` struct with the members set to their respective arguments.
    #[inline(always)]
    pub fn new(context: Context, data: usize) -> Transfer {
        Transfer { context, data }
    }
}

#[cfg(test)]
mod tests {
    use std::mem;
    use std::os::raw::c_void;

    use super::*;
    use crate::stack::ProtectedFixedSizeStack;

    #[test]
    fn type_sizes() {
        assert_eq!(mem::size_of::<Context>(), mem::size_of::<usize>());
        assert_eq!(mem::size_of::<Context>(), mem::size_of::<*const c_void>());
        assert_eq!(mem::size_of::<Transfer>(), 2 * mem::size_of::<usize>());
    }

    // This test ensure that stack frames are aligned by at least 16 bytes.
    // This is important as some compilers including rustc assume a stack frame alignment of 16
    // bytes to use SSE with fixed offsets instead of aligning the frame for every function call.
    #[test]
    fn stack_alignment() {
        #[allow(dead_code)]
        #[repr(align(16))]
        struct Aligned([u8; 512]);

        extern "C" fn context_function(t: Transfer) -> ! {
            let i = Aligned([0; 512]);
            let addr = &i as *const _ as usize;
            unsafe { t.context.resume(addr % 16) };
            unreachable!();
        }

        let stack = ProtectedFixedSizeStack::default();
        assert_eq!(stack.top() as usize % 16, 0);
        assert_eq!(stack.bottom() as usize % 16, 0);

        let mut t = Transfer::new(unsafe { Context::new(&stack, context_function) }, 0);
        t = unsafe { t.context.resume(0) };
        assert_eq!(t.data, 0);
    }

    #[test]
    fn number_generator() {
        extern "C" fn context_function(mut t: Transfer) -> ! {
            for i in 0usize.. {
                assert_eq!(t.data, i);
                t = unsafe { t.context.resume(i) };
            }

            unreachable!();
        }

        let stack = ProtectedFixedSizeStack::default();
        let mut t = Transfer::new(unsafe { Context::new(&stack, context_function) }, 0);

        for i in 0..10usize {
            t = unsafe { t.context.resume(i) };
            assert_eq!(t.data, i);

            if t.data == 9 {
                break;
            }
        }
    }

    #[test]
    fn empty_context() {
        let ctx = unsafe { Context::empty() };
        assert!(ctx.is_empty());

        let stack = ProtectedFixedSizeStack::default();
        extern "C" fn never_run(_: Transfer) -> ! {
            unreachable!();
        }
        let ctx = unsafe { Context::new(&stack, never_run) };
        assert!(!ctx.is_empty());
    }
}
