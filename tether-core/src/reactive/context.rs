//! Dependency Tracking Context
//!
//! The tracking context records which store fields are read while a
//! computation runs. A read checks the innermost frame and, if that frame
//! is recording, appends the (store, field) pair to it.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Starting a recording pushes a
//! fresh frame; finishing it pops the frame and hands back what it
//! collected. The enclosing frame is untouched while the inner one is
//! active, so a recording started from inside another (for example a
//! derived field recomputed from a listener that runs during a tracked
//! function) gets its own clean accumulation and the outer one resumes
//! exactly where it left off.
//!
//! Frames can also be pushed in a non-recording state, which suspends
//! collection for the duration of a closure.

use std::cell::RefCell;

use super::dependency::{dedup, Dependency};

thread_local! {
    static FRAME_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One entry of the tracking stack.
#[derive(Debug)]
struct Frame {
    /// Whether reads should be collected into this frame.
    recording: bool,
    /// Dependencies read so far, in read order, possibly repeated.
    dependencies: Vec<Dependency>,
}

/// Guard for one frame of the tracking stack.
///
/// The frame is popped when the guard is finished or dropped, which keeps
/// the stack balanced even if the computation panics.
pub struct ReactiveContext {
    depth: usize,
    finished: bool,
}

impl ReactiveContext {
    /// Push a frame that collects dependencies.
    pub fn enter() -> Self {
        Self::push(true)
    }

    /// Push a frame that ignores reads.
    pub fn suspend() -> Self {
        Self::push(false)
    }

    fn push(recording: bool) -> Self {
        let depth = FRAME_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(Frame {
                recording,
                dependencies: Vec::new(),
            });
            stack.len()
        });

        Self {
            depth,
            finished: false,
        }
    }

    /// Pop the frame and return its dependencies, first occurrence wins.
    pub fn finish(mut self) -> Vec<Dependency> {
        self.finished = true;
        self.pop().map(|frame| dedup(frame.dependencies)).unwrap_or_default()
    }

    fn pop(&self) -> Option<Frame> {
        FRAME_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext mismatch: frames were not popped in order"
            );
            stack.pop()
        })
    }

    /// Check whether reads are currently being recorded.
    pub fn is_recording() -> bool {
        FRAME_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|frame| frame.recording)
        })
    }

    /// Record a read in the innermost frame, if it is recording.
    pub fn record(dependency: Dependency) {
        FRAME_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if frame.recording {
                    frame.dependencies.push(dependency);
                }
            }
        });
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        FRAME_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}

/// Run `f` in a fresh recording frame and return its result together with
/// the deduplicated dependencies it read.
pub fn with_recording<R>(f: impl FnOnce() -> R) -> (R, Vec<Dependency>) {
    let ctx = ReactiveContext::enter();
    let result = f();
    (result, ctx.finish())
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::suspend();
    f()
}
