//! Cue timelines and parallel chunked transcription.

pub mod chunker;
pub mod stage;
pub mod stitcher;
pub mod transcriber;
pub mod types;

pub use chunker::ChunkPlan;
pub use stage::ChunkedTranscription;
pub use stitcher::ChunkStitcher;
pub use transcriber::{ChunkTranscriber, MockChunkTranscriber};
pub use types::{Chunk, ChunkWindow, Cue};
