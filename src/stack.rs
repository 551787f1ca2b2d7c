// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ops::Deref;
use std::os::raw::c_void;

use crate::error::StackError;
use crate::sys;

/// Represents any kind of stack memory.
///
/// `ProtectedFixedSizeStack` can be used to allocate actual stack space.
#[derive(Debug)]
pub struct Stack {
    top: *mut c_void,
    bottom: *mut c_void,
}

impl Stack {
    /// Creates a (non-owning) representation of some stack memory.
    ///
    /// It is unsafe because it is your reponsibility to make sure that `top` and `buttom` are valid
    /// addresses.
    #[inline]
    pub unsafe fn new(top: *mut c_void, bottom: *mut c_void) -> Stack {
        debug_assert!(top >= bottom);

        Stack { top, bottom }
    }

    /// Returns the top of the stack from which on it grows downwards towards bottom().
    #[inline]
    pub fn top(&self) -> *mut c_void {
        self.top
    }

    /// Returns the bottom of the stack and thus it's end.
    #[inline]
    pub fn bottom(&self) -> *mut c_void {
        self.bottom
    }

    /// Returns the size of the stack between top() and bottom().
    #[inline]
    pub fn len(&self) -> usize {
        self.top as usize - self.bottom as usize
    }

    /// Returns the minimal stack size allowed by the current platform.
    #[inline]
    pub fn min_size() -> usize {
        sys::min_stack_size()
    }

    /// Returns the maximum stack size allowed by the current platform.
    #[inline]
    pub fn max_size() -> usize {
        sys::max_stack_size()
    }

    /// Returns a implementation defined default stack size.
    ///
    /// This value can vary greatly between platforms, but is usually only a couple
    /// memory pages in size and enough for most use-cases with little recursion.
    /// Coroutines use the larger `DEFAULT_STACK_SIZE` instead.
    #[inline]
    pub fn default_size() -> usize {
        sys::default_stack_size()
    }

    /// Allocates a new stack of at least `size` usable bytes below one guard page.
    fn allocate(size: usize) -> Result<Stack, StackError> {
        let page_size = sys::page_size();
        let max_stack_size = sys::max_stack_size();

        let size = size.max(sys::min_stack_size());

        let usable = match size.checked_add(page_size - 1) {
            Some(size) => size & !(page_size - 1),
            None => return Err(StackError::ExceedsMaximumSize(max_stack_size)),
        };

        if usable > max_stack_size {
            return Err(StackError::ExceedsMaximumSize(max_stack_size));
        }

        // `usable <= max_stack_size` keeps this from overflowing.
        let mapped = usable + page_size;
        let stack = unsafe { sys::allocate_stack(mapped)? };

        match unsafe { sys::protect_stack(&stack) } {
            Ok(protected) => Ok(protected),
            Err(err) => {
                unsafe { sys::deallocate_stack(stack.bottom(), stack.len()) };
                Err(StackError::Io(err))
            }
        }
    }
}

unsafe impl Send for Stack {}

/// Stack memory with an inaccessible guard page below it.
///
/// Allocates stack space using virtual memory, whose pages will
/// only be mapped to physical memory if they are used.
///
/// If a stack overflow occurs it should (hopefully) hit the guard page and
/// cause a segmentation fault instead letting the memory being overwritten silently.
#[derive(Debug)]
pub struct ProtectedFixedSizeStack(Stack);

impl ProtectedFixedSizeStack {
    /// Allocates a new stack of **at least** `size` bytes + one additional guard page.
    ///
    /// `size` is rounded up to a multiple of the size of a memory page and
    /// does not include the size of the guard page itself.
    pub fn new(size: usize) -> Result<ProtectedFixedSizeStack, StackError> {
        Stack::allocate(size).map(ProtectedFixedSizeStack)
    }
}

impl Deref for ProtectedFixedSizeStack {
    type Target = Stack;

    fn deref(&self) -> &Stack {
        &self.0
    }
}

impl Default for ProtectedFixedSizeStack {
    fn default() -> ProtectedFixedSizeStack {
        ProtectedFixedSizeStack::new(Stack::default_size()).unwrap_or_else(|err| {
            panic!("Failed to allocate ProtectedFixedSizeStack with {:?}", err)
        })
    }
}

impl Drop for ProtectedFixedSizeStack {
    fn drop(&mut self) {
        let page_size = sys::page_size();
        let guard = (self.0.bottom() as usize - page_size) as *mut c_void;
        let size_with_guard = self.0.len() + page_size;
        unsafe {
            sys::deallocate_stack(guard, size_with_guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::write_bytes;

    use super::*;
    use crate::sys;

    #[test]
    fn stack_size_too_small() {
        let stack = ProtectedFixedSizeStack::new(0).unwrap();
        assert_eq!(stack.len(), sys::min_stack_size());

        unsafe { write_bytes(stack.bottom() as *mut u8, 0x1d, stack.len()) };
    }

    #[test]
    fn stack_size_rounded_to_pages() {
        let page_size = sys::page_size();
        let stack = ProtectedFixedSizeStack::new(sys::min_stack_size() + 1).unwrap();
        assert_eq!(stack.len(), sys::min_stack_size() + page_size);
        assert_eq!(stack.len() % page_size, 0);

        unsafe { write_bytes(stack.bottom() as *mut u8, 0x1d, stack.len()) };
    }

    #[test]
    fn stack_size_too_large() {
        let stack_size = sys::max_stack_size() & !(sys::page_size() - 1);

        match ProtectedFixedSizeStack::new(stack_size + 1) {
            Err(StackError::ExceedsMaximumSize(max)) => assert_eq!(max, sys::max_stack_size()),
            other => panic!("unexpected result {:?}", other),
        }

        match ProtectedFixedSizeStack::new(usize::max_value()) {
            Err(StackError::ExceedsMaximumSize(..)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn stack_alignment() {
        let stack = ProtectedFixedSizeStack::default();
        assert_eq!(stack.top() as usize % 16, 0);
        assert_eq!(stack.bottom() as usize % 16, 0);
        assert_eq!(stack.len(), Stack::default_size());
    }
}
