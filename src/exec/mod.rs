//! Bounded-parallelism execution shared by every pipeline stage.
//!
//! A `WorkPool` fans ordered inputs out to worker threads and gathers results
//! back by index. `ResourceGate`s bound the total number of heavy operations
//! across every pool in the process.

pub mod cancel;
pub mod gate;
pub mod pool;
pub mod progress;

pub use cancel::CancelToken;
pub use gate::{GatePermit, GateSet, ResourceGate};
pub use pool::{Outcome, PoolHandle, PoolReport, WorkItem, WorkPool, WorkResult};
pub use progress::{ProgressEvent, ProgressReceiver, ProgressSender, progress_channel};
