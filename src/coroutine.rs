// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Nested stackful coroutines, based on underlying contexts.
//!
//! Every `Coroutine` owns a stack and an execution context and occupies one frame of the
//! thread's call stack. `resume()` switches into a coroutine from the frame directly below
//! it, `yield_now()` switches from whatever runs back down exactly one frame.
//!
//! ```text
//!   frame 0 (root) --resume--> frame 1 --resume--> frame 2
//!                  <--yield---         <--yield---
//! ```

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::os::raw::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr::NonNull;
use std::thread;

use crate::backend::ExecutionContext;
use crate::error::{CoroutineError, StackError, TaskPanic};
use crate::registry::{CallStack, Frame};

/// Stack size of coroutines created without an explicit size.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

type Task<'a> = Box<dyn FnOnce() + 'a>;

/// Service structure which is located on the heap and handles the coroutine's state.
struct Inner<'a> {
    frame: Frame,
    /// Taken by the coroutine when it starts running
    task: Cell<Option<Task<'a>>>,
}

/// Coroutine configuration.
///
/// ```
/// use nestco::Builder;
///
/// let mut co = Builder::new()
///     .name("worker")
///     .stack_size(64 * 1024)
///     .create(|| println!("hello"))
///     .unwrap();
///
/// assert_eq!(co.name(), Some("worker"));
/// co.resume().unwrap();
/// assert!(co.is_finished());
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    name: Option<String>,
    stack_size: usize,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            name: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Names the coroutine. The name shows up in log records.
    pub fn name<S: Into<String>>(mut self, name: S) -> Builder {
        self.name = Some(name.into());
        self
    }

    /// Sets the size of the coroutine's stack in bytes.
    ///
    /// The size is rounded up to whole pages and to the platform minimum.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.stack_size = size;
        self
    }

    /// Creates a coroutine running `task` and registers it on top of the thread's call stack.
    ///
    /// `task` does not run until the first `resume()`.
    pub fn create<'a, F>(self, task: F) -> Result<Coroutine<'a>, CoroutineError>
        where F: FnOnce() + 'a
    {
        CallStack::with(|stack| -> Result<Coroutine<'a>, CoroutineError> {
            stack.attach_root().map_err(StackError::Io)?;

            let index = stack.next_index();
            let mut inner = Box::new(Inner {
                frame: Frame::new(ExecutionContext::native(), index, self.name),
                task: Cell::new(Some(Box::new(task) as Task<'a>)),
            });

            // `inner` is boxed, the entry function may keep pointing at it.
            let arg = &*inner as *const Inner<'a> as *mut c_void;
            inner.frame.context = ExecutionContext::new(self.stack_size, coroutine_main, arg)?;

            unsafe { stack.register(NonNull::from(&inner.frame)) };

            debug!("created coroutine {} (frame {}) with {} bytes of stack",
                   inner.frame.label(),
                   index,
                   inner.frame.context.stack_size().unwrap_or(0));

            Ok(Coroutine {
                inner: ManuallyDrop::new(inner),
                _marker: PhantomData,
            })
        })
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

/// A stackful coroutine bound to the thread it was created on.
///
/// Coroutines nest: a running coroutine may create and resume further coroutines.
/// They have to be destroyed in the reverse order of their creation.
pub struct Coroutine<'a> {
    inner: ManuallyDrop<Box<Inner<'a>>>,
    // The call stack is per thread.
    _marker: PhantomData<*mut ()>,
}

impl<'a> Coroutine<'a> {
    /// Creates a coroutine with a stack of `DEFAULT_STACK_SIZE` bytes.
    pub fn new<F>(task: F) -> Result<Coroutine<'a>, CoroutineError>
        where F: FnOnce() + 'a
    {
        Builder::new().create(task)
    }

    /// Creates a coroutine with a stack of at least `stack_size` bytes.
    pub fn with_stack_size<F>(stack_size: usize, task: F) -> Result<Coroutine<'a>, CoroutineError>
        where F: FnOnce() + 'a
    {
        Builder::new().stack_size(stack_size).create(task)
    }

    /// Runs the coroutine until it yields or finishes.
    ///
    /// Has to be called from the frame directly below the coroutine, which is the frame that
    /// was on top of the call stack when the coroutine was created.
    ///
    /// If the task panics the coroutine is finished and the panic is returned as
    /// `CoroutineError::TaskFailure`.
    pub fn resume(&mut self) -> Result<(), CoroutineError> {
        let frame = &self.inner.frame;

        if frame.finished.get() {
            return Err(CoroutineError::AlreadyFinished);
        }

        let switch = CallStack::with(|stack| stack.enter(frame))?;
        trace!("resuming coroutine {} (frame {})", frame.label(), frame.index);

        unsafe {
            ExecutionContext::switch(&switch.from.as_ref().context, &frame.context);
        }

        match frame.failure.take() {
            Some(payload) => {
                let panic = TaskPanic::new(payload);
                debug!("coroutine {} (frame {}) failed: {}", frame.label(), frame.index, panic);
                Err(CoroutineError::TaskFailure(panic))
            }
            None => Ok(()),
        }
    }

    /// Resumes the coroutine until its task returns and reports how many resumes it took.
    pub fn run_to_completion(&mut self) -> Result<usize, CoroutineError> {
        let mut resumes = 0;

        while !self.is_finished() {
            self.resume()?;
            resumes += 1;
        }

        Ok(resumes)
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.inner.frame.finished.get()
    }

    /// Position of the coroutine in the thread's call stack, 1 for the outermost.
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.inner.frame.index
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.inner.frame.name.as_ref().map(|s| s.as_str())
    }

    /// Usable stack size in bytes.
    pub fn stack_size(&self) -> Option<usize> {
        self.inner.frame.context.stack_size()
    }

    /// Unregisters the coroutine and releases its stack.
    ///
    /// Fails if newer coroutines are still registered above it, or if it is executing.
    /// The coroutine is handed back in that case.
    ///
    /// Objects living on the stack of an unfinished coroutine are not dropped.
    pub fn destroy(self) -> Result<(), (Coroutine<'a>, CoroutineError)> {
        match CallStack::with(|stack| stack.unregister(&self.inner.frame)) {
            Ok(()) => {
                let mut this = ManuallyDrop::new(self);
                this.release();
                Ok(())
            }
            Err(err) => Err((self, err)),
        }
    }

    // The frame has to be unregistered already.
    fn release(&mut self) {
        let frame = &self.inner.frame;
        if frame.finished.get() {
            debug!("destroying coroutine {} (frame {})", frame.label(), frame.index);
        } else {
            debug!("destroying suspended coroutine {} (frame {})", frame.label(), frame.index);
        }

        unsafe { ManuallyDrop::drop(&mut self.inner) };
    }
}

impl<'a> Drop for Coroutine<'a> {
    fn drop(&mut self) {
        match CallStack::with(|stack| stack.unregister(&self.inner.frame)) {
            Ok(()) => self.release(),
            Err(err) => {
                // Still reachable through the call stack, so the frame and its stack are leaked.
                error!("leaking coroutine {} (frame {}): {}",
                       self.inner.frame.label(),
                       self.inner.frame.index,
                       err);
                CallStack::with(|stack| stack.abandon(&self.inner.frame));

                if !thread::panicking() {
                    panic!("coroutine dropped out of order: {}", err);
                }
            }
        }
    }
}

impl<'a> fmt::Debug for Coroutine<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("name", &self.name())
            .field("frame_index", &self.frame_index())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Suspends the running coroutine and continues the frame that resumed it.
///
/// Returns when the coroutine is resumed again. Fails with `CoroutineError::NotInCoroutine`
/// when called outside of any coroutine.
pub fn yield_now() -> Result<(), CoroutineError> {
    let switch = CallStack::with(|stack| stack.leave())?;

    unsafe {
        let from = switch.from.as_ref();
        let to = switch.to.as_ref();
        trace!("coroutine {} (frame {}) yields to frame {}", from.label(), from.index, to.index);
        ExecutionContext::switch(&from.context, &to.context);
    }

    Ok(())
}

/// Returns `true` if called from inside a coroutine.
pub fn in_coroutine() -> bool {
    CallStack::with(|stack| stack.current() != 0)
}

/// Number of coroutines registered on this thread.
pub fn depth() -> usize {
    CallStack::with(|stack| stack.depth())
}

/// Index of the frame that is executing, 0 outside of any coroutine.
pub fn current_frame() -> usize {
    CallStack::with(|stack| stack.current())
}

unsafe fn coroutine_main(arg: *mut c_void) -> ! {
    let inner = &*(arg as *const Inner<'static>);
    let frame = &inner.frame;

    if let Some(task) = inner.task.take() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            frame.failure.set(Some(payload));
        }
    }

    frame.finished.set(true);
    debug!("coroutine {} (frame {}) finished", frame.label(), frame.index);

    match CallStack::with(|stack| stack.leave()) {
        Ok(switch) => ExecutionContext::switch(&frame.context, &switch.to.as_ref().context),
        Err(err) => error!("coroutine {} (frame {}) cannot return: {}", frame.label(), frame.index, err),
    }

    // Finished coroutines are never switched to again.
    process::abort();
}
