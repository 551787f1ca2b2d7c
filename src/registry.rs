// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-thread call stack of coroutine frames.
//!
//! Index 0 is the root frame standing for the thread's native context, indices 1..N are
//! the live coroutines from outermost to innermost. `current` names the frame that holds
//! the CPU. The call stack never owns a coroutine frame: it stores pointers to frames owned
//! by `Coroutine` handles, which register on construction and unregister on destruction.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::io;
use std::ptr::NonNull;

use crate::backend::ExecutionContext;
use crate::error::CoroutineError;

thread_local!(static CALL_STACK: CallStack = CallStack::new());

/// One entry of the call stack.
pub(crate) struct Frame {
    pub context: ExecutionContext,
    pub index: usize,
    pub name: Option<String>,
    pub finished: Cell<bool>,
    // Set when the owning handle went away while the frame was not destroyable.
    pub abandoned: Cell<bool>,
    pub failure: Cell<Option<Box<dyn Any + Send + 'static>>>,
}

impl Frame {
    pub fn new(context: ExecutionContext, index: usize, name: Option<String>) -> Frame {
        Frame {
            context,
            index,
            name,
            finished: Cell::new(false),
            abandoned: Cell::new(false),
            failure: Cell::new(None),
        }
    }

    // Never finished, never resumable.
    fn root() -> Frame {
        Frame::new(ExecutionContext::native(), 0, None)
    }

    /// Display name used in log records.
    pub fn label(&self) -> &str {
        match self.name {
            Some(ref name) => name.as_str(),
            None if self.index == 0 => "<root>",
            None => "<unnamed>",
        }
    }
}

/// A pair of frames taking part in one switch.
pub(crate) struct Switch {
    pub from: NonNull<Frame>,
    pub to: NonNull<Frame>,
}

pub(crate) struct CallStack {
    root: Box<Frame>,
    frames: RefCell<Vec<NonNull<Frame>>>,
    current: Cell<usize>,
}

impl CallStack {
    fn new() -> CallStack {
        let root = Box::new(Frame::root());
        let frames = vec![NonNull::from(&*root)];

        CallStack {
            root,
            frames: RefCell::new(frames),
            current: Cell::new(0),
        }
    }

    /// Runs `f` with the call stack of the current thread.
    pub fn with<F, R>(f: F) -> R
        where F: FnOnce(&CallStack) -> R
    {
        CALL_STACK.with(f)
    }

    /// Makes sure the root frame can be switched back to.
    pub fn attach_root(&self) -> io::Result<()> {
        self.root.context.attach_thread()
    }

    /// Index the next registered frame will get.
    pub fn next_index(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn current(&self) -> usize {
        self.current.get()
    }

    /// Number of registered coroutine frames, root excluded.
    pub fn depth(&self) -> usize {
        self.frames.borrow().len() - 1
    }

    /// Registers `frame` on top of the call stack.
    ///
    /// It is unsafe because `frame` has to stay at its address until `unregister()`.
    pub unsafe fn register(&self, frame: NonNull<Frame>) {
        let mut frames = self.frames.borrow_mut();
        debug_assert_eq!(frame.as_ref().index, frames.len());
        frames.push(frame);
    }

    /// Unregisters the topmost frame, which has to be `frame`.
    pub fn unregister(&self, frame: &Frame) -> Result<(), CoroutineError> {
        let mut frames = self.frames.borrow_mut();
        let top = frames.len() - 1;

        if frame.index != top {
            return Err(CoroutineError::NotTopmost {
                frame: frame.index,
                top,
            });
        }

        if self.current.get() >= frame.index {
            return Err(CoroutineError::FrameActive { frame: frame.index });
        }

        debug_assert!(frames[top] == NonNull::from(frame));
        frames.pop();
        self.purge(&mut frames);
        Ok(())
    }

    /// Marks `frame` as abandoned by its handle.
    ///
    /// The frame stays registered while frames above it or the running frame depend on it,
    /// and is popped as soon as it is topmost and inactive. Its memory has to be leaked.
    pub fn abandon(&self, frame: &Frame) {
        frame.abandoned.set(true);
        let mut frames = self.frames.borrow_mut();
        self.purge(&mut frames);
    }

    // Pops abandoned frames above the current one.
    fn purge(&self, frames: &mut Vec<NonNull<Frame>>) {
        let current = self.current.get();

        while frames.len() - 1 > current {
            let top = unsafe { frames[frames.len() - 1].as_ref() };
            if !top.abandoned.get() {
                break;
            }

            debug!("dropping abandoned frame {} from the call stack", top.index);
            frames.pop();
        }
    }

    /// Enters `frame` from the frame directly below it and makes it current.
    pub fn enter(&self, frame: &Frame) -> Result<Switch, CoroutineError> {
        let frames = self.frames.borrow();
        let current = self.current.get();

        if frame.index == 0 || frame.index >= frames.len() || current + 1 != frame.index {
            return Err(CoroutineError::NotResumable {
                frame: frame.index,
                current,
            });
        }

        debug_assert!(frames[frame.index] == NonNull::from(frame));
        self.current.set(frame.index);

        Ok(Switch {
            from: frames[current],
            to: frames[frame.index],
        })
    }

    /// Leaves the current frame towards the one directly below it.
    pub fn leave(&self) -> Result<Switch, CoroutineError> {
        let mut frames = self.frames.borrow_mut();
        let current = self.current.get();

        if frames.len() <= 1 || current == 0 {
            return Err(CoroutineError::NotInCoroutine);
        }

        self.current.set(current - 1);
        let switch = Switch {
            from: frames[current],
            to: frames[current - 1],
        };

        self.purge(&mut frames);
        Ok(switch)
    }
}
