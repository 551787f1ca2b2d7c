// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::stack::Stack;

pub unsafe fn allocate_stack(size: usize) -> io::Result<Stack> {
    const PROT: libc::c_int = libc::PROT_READ | libc::PROT_WRITE;
    const TYPE: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

    let ptr = libc::mmap(ptr::null_mut(), size, PROT, TYPE, -1, 0);

    if ptr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(Stack::new((ptr as usize + size) as *mut c_void, ptr as *mut c_void))
    }
}

/// Turns the lowest page of `stack` into an inaccessible guard page and returns the
/// remaining usable region.
pub unsafe fn protect_stack(stack: &Stack) -> io::Result<Stack> {
    let page_size = page_size();

    debug_assert!(stack.len() % page_size == 0 && stack.len() != 0);

    let ret = libc::mprotect(stack.bottom(), page_size, libc::PROT_NONE);

    if ret != 0 {
        Err(io::Error::last_os_error())
    } else {
        let bottom = (stack.bottom() as usize + page_size) as *mut c_void;
        Ok(Stack::new(stack.top(), bottom))
    }
}

pub unsafe fn deallocate_stack(ptr: *mut c_void, size: usize) {
    let ret = libc::munmap(ptr, size);
    debug_assert_eq!(ret, 0);
}

pub fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

    let mut ret = PAGE_SIZE.load(Ordering::Relaxed);

    if ret == 0 {
        ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
        debug_assert!(ret.is_power_of_two());

        PAGE_SIZE.store(ret, Ordering::Relaxed);
    }

    ret
}

// Leaves room for the panic machinery, which runs on the coroutine stack.
pub fn min_stack_size() -> usize {
    page_size() * 4
}

pub fn max_stack_size() -> usize {
    static MAX_SIZE: AtomicUsize = AtomicUsize::new(0);

    let mut ret = MAX_SIZE.load(Ordering::Relaxed);

    if ret == 0 {
        let mut limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        let limit_ret = unsafe { libc::getrlimit(libc::RLIMIT_STACK, &mut limit) };

        ret = if limit_ret == 0 && limit.rlim_max != libc::RLIM_INFINITY {
            limit.rlim_max as usize
        } else {
            // RLIM_INFINITY
            1024 * 1024 * 1024
        };

        MAX_SIZE.store(ret, Ordering::Relaxed);
    }

    ret
}
