//! Call-stack frame paths
//!
//! A frame id is a byte derived from a branch's ordinal position among its
//! siblings, never from runtime data. The sequence of ids currently on the
//! stack identifies "this syntactic position under this chain of branch
//! selections" and is stable across rounds and across devices evaluating
//! structurally equal trees.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one call-stack frame: the branch's ordinal, as a byte.
pub type FrameId = u8;

/// A root-to-here sequence of frame ids.
///
/// Paths order lexicographically by frame sequence, which makes them usable
/// as export-map keys. Displayed slash-separated, `/` for the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(Vec<FrameId>);

impl Path {
    /// The empty path: the root of an evaluation.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// This path extended by one frame.
    pub fn child(&self, id: FrameId) -> Path {
        let mut frames = self.0.clone();
        frames.push(id);
        Path(frames)
    }

    pub fn frames(&self) -> &[FrameId] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for id in &self.0 {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

/// The live stack of frame ids for one evaluation thread.
///
/// Empty at the start of each round's root evaluation; must return to empty
/// when root evaluation completes. Push/pop are balanced by the branch
/// helpers on every exit path, including failures.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<FrameId>,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack { frames: Vec::new() }
    }

    /// A stack already positioned at `path`, used when forking a branch
    /// evaluation off the main thread.
    pub fn from_path(path: Path) -> Self {
        CallStack { frames: path.0 }
    }

    pub fn push(&mut self, id: FrameId) {
        self.frames.push(id);
    }

    /// Removes the most recently pushed frame.
    ///
    /// # Panics
    ///
    /// Panics on an empty stack: a pop without a matching push is a defect
    /// in the interpreter, not a condition callers can recover from.
    pub fn pop(&mut self) {
        self.frames
            .pop()
            .expect("call stack underflow: return without a matching frame");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Snapshot of the current root-to-here path.
    pub fn path(&self) -> Path {
        Path(self.frames.clone())
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }
}
