// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::mem;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use winapi::shared::minwindef::LPVOID;
use winapi::um::{fibersapi, sysinfoapi, winbase, winnt};

/// Entry point of a fiber created by `create_fiber()`.
pub type FiberProc = unsafe extern "system" fn(param: LPVOID);

/// Returns the fiber of the calling thread, converting the thread if necessary.
///
/// The flag is `true` if the thread was converted by this call and thus
/// has to be converted back with `convert_fiber_to_thread()`.
pub fn current_thread_fiber() -> io::Result<(*mut c_void, bool)> {
    unsafe {
        if fibersapi::IsThreadAFiber() != 0 {
            return Ok((winnt::GetCurrentFiber() as *mut c_void, false));
        }

        let fiber = winbase::ConvertThreadToFiber(ptr::null_mut());

        if fiber.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok((fiber as *mut c_void, true))
        }
    }
}

pub fn convert_fiber_to_thread() {
    unsafe {
        winbase::ConvertFiberToThread();
    }
}

pub fn create_fiber(stack_size: usize, f: FiberProc, param: *mut c_void) -> io::Result<*mut c_void> {
    let fiber = unsafe { winbase::CreateFiber(stack_size, Some(f), param as LPVOID) };

    if fiber.is_null() {
        Err(io::Error::last_os_error())
    } else {
        Ok(fiber as *mut c_void)
    }
}

pub unsafe fn switch_to_fiber(fiber: *mut c_void) {
    winbase::SwitchToFiber(fiber as LPVOID);
}

pub unsafe fn delete_fiber(fiber: *mut c_void) {
    winbase::DeleteFiber(fiber as LPVOID);
}

pub fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

    let mut ret = PAGE_SIZE.load(Ordering::Relaxed);

    if ret == 0 {
        ret = unsafe {
            let mut info = mem::zeroed();
            sysinfoapi::GetSystemInfo(&mut info);
            info.dwPageSize as usize
        };

        PAGE_SIZE.store(ret, Ordering::Relaxed);
    }

    ret
}

// Windows does not seem to provide a stack limit API
pub fn min_stack_size() -> usize {
    page_size()
}

// Windows does not seem to provide a stack limit API
pub fn max_stack_size() -> usize {
    1024 * 1024 * 1024
}
