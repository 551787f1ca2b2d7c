// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Nested stackful coroutines.
//!
//! A `Coroutine` runs a task on its own stack. The task can suspend itself with
//! `yield_now()` at any depth of nested calls, and can in turn create and resume
//! coroutines of its own. `yield_now()` always returns control to the frame that
//! issued the matching `resume()`.
//!
//! ```
//! use std::cell::Cell;
//! use nestco::{yield_now, Coroutine};
//!
//! let counter = Cell::new(0);
//! let mut co = Coroutine::new(|| {
//!     for _ in 0..3 {
//!         counter.set(counter.get() + 1);
//!         yield_now().unwrap();
//!     }
//! }).unwrap();
//!
//! while !co.is_finished() {
//!     co.resume().unwrap();
//! }
//! assert_eq!(counter.get(), 3);
//! ```
//!
//! On Unix the contexts are switched by the Boost.Context assembly routines and every
//! coroutine owns a guard-page protected stack. On Windows the fiber API is used.

#[macro_use]
extern crate log;

pub use crate::coroutine::{current_frame, depth, in_coroutine, yield_now, Builder, Coroutine,
                           DEFAULT_STACK_SIZE};
pub use crate::error::{CoroutineError, StackError, TaskPanic};

#[cfg(unix)]
pub use crate::context::{Context, Transfer};
#[cfg(unix)]
pub use crate::stack::Stack;

#[cfg(unix)]
pub mod context;
#[cfg(unix)]
pub mod stack;

mod backend;
mod coroutine;
mod error;
mod registry;
mod sys;
