//! Overlay
//!
//! The virtual output tree a generation pass proposes, the seam to the real
//! output directory, and the diff-aware merge that applies one onto the other.

pub mod merge;
pub mod path;
pub mod target;
pub mod tree;

pub use merge::{apply_overlay, MergeAction, MergeDecision, MergeReport};
pub use target::{FsTarget, MemoryTarget, OutputTarget, OutputView};
pub use tree::{Overlay, OverlayEntry};
