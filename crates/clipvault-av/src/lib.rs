//! clipvault-av: external transcoder integration.
//!
//! Wraps the ffmpeg/ffprobe CLIs behind async traits: [`Probe`] for metadata
//! inspection and [`Extract`] for range extraction and thumbnail rendering.
//! [`ToolCommand`] provides bounded subprocess execution and
//! [`ToolRegistry`] tool discovery.

pub mod command;
pub mod extract;
pub mod probe;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use extract::{Extract, FfmpegExtractor, ThumbnailOptions};
pub use probe::{FfprobeProber, MediaInfo, Probe};
pub use tools::{ToolInfo, ToolRegistry};
