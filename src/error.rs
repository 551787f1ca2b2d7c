// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::any::Any;
use std::fmt;
use std::io;
use std::panic;

use thiserror::Error;

/// Error type returned by stack and context allocation.
#[derive(Debug, Error)]
pub enum StackError {
    /// Contains the maximum amount of memory allowed to be allocated as stack space.
    #[error("Requested more than max size of {0} bytes for a stack")]
    ExceedsMaximumSize(usize),

    /// Returned if some kind of I/O error happens during allocation.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Error type returned by the coroutine operations.
#[derive(Debug, Error)]
pub enum CoroutineError {
    /// `resume()` was called on a coroutine whose task already returned.
    #[error("coroutine finished")]
    AlreadyFinished,

    /// `yield_now()` was called from the thread's native context.
    #[error("not in coroutine")]
    NotInCoroutine,

    /// The stack or execution context of a new coroutine could not be created.
    #[error("failed to allocate coroutine context")]
    ContextAllocationFailed(#[from] StackError),

    /// The task panicked. The coroutine is finished.
    #[error("coroutine task failed: {0}")]
    TaskFailure(TaskPanic),

    /// `resume()` was called from a frame other than the one directly below the coroutine.
    #[error("frame {frame} cannot be resumed while frame {current} is running")]
    NotResumable { frame: usize, current: usize },

    /// The coroutine has newer coroutines registered above it.
    #[error("frame {frame} is not the topmost frame ({top})")]
    NotTopmost { frame: usize, top: usize },

    /// The coroutine is running, or is suspended inside a nested `resume()`.
    #[error("frame {frame} is still executing")]
    FrameActive { frame: usize },
}

/// The payload of a panic raised by a coroutine task.
pub struct TaskPanic {
    payload: Box<dyn Any + Send + 'static>,
}

impl TaskPanic {
    pub(crate) fn new(payload: Box<dyn Any + Send + 'static>) -> TaskPanic {
        TaskPanic { payload }
    }

    /// Returns the panic message if the payload is a string.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else if let Some(s) = self.payload.downcast_ref::<String>() {
            Some(s.as_str())
        } else {
            None
        }
    }

    /// Returns the raw panic payload.
    pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Continues the panic on the current stack.
    pub fn resume_unwind(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for TaskPanic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TaskPanic")
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for TaskPanic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.message() {
            Some(msg) => f.write_str(msg),
            None => f.write_str("Box<dyn Any>"),
        }
    }
}
