//! Audio timeline reconstruction.
//!
//! Turns cues and their independently produced clips back into one gapless
//! stream in which every cue starts at its scheduled time.

pub mod assembler;
pub mod normalize;
pub mod parallel;
pub mod segment;
pub mod workspace;

pub use assembler::{AssembledTimeline, AssemblyStats, PreparedCue, TimelineAssembler};
pub use normalize::{Adjustment, AdjustmentPolicy, NormalizedClip, Normalizer, TimelineRules};
pub use parallel::ParallelTimeline;
pub use segment::TimelineSegment;
pub use workspace::JobWorkspace;
