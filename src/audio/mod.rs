//! Audio files and the tools that transform them.

pub mod command;
pub mod format;
pub mod tempo;
pub mod toolkit;
pub mod wav;

pub use command::{CommandExecutor, MockCommandExecutor, SystemCommandExecutor};
pub use format::PcmFormat;
pub use toolkit::{AudioToolkit, FfmpegToolkit, WavToolkit};
