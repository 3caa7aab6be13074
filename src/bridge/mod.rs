//! Execution bridge between the host and the sandboxed engine.
//!
//! # Components
//!
//! - [`ArgumentMarshaler`] - Encodes argv into engine memory inside a [`ScratchFrame`]
//! - [`OutputCollector`] - Buffers printed lines and parses inspection output into tracks
//! - [`VirtualFilesystem`] - Host directory the engine sees as its root
//! - [`ExecutionSession`] - Single-flight `execute` over one [`EngineContext`](crate::engine::EngineContext)
//!
//! # Example
//!
//! ```ignore
//! use filterflow_rs::bridge::{ExecutionRequest, ExecutionSession};
//!
//! let session = ExecutionSession::open(Box::new(engine), &config, None)?;
//! let tracks = session.inspect(&std::fs::read("clip.mp4")?)?;
//! for track in &tracks {
//!     println!("{} {}", track.pid, track.stream_type);
//! }
//! ```

pub mod marshal;
pub mod output;
pub mod request;
pub mod session;
pub mod vfs;

pub use marshal::{decode_argv, encoded_size, ArgumentMarshaler, OpaqueArgv, ScratchFrame};
pub use output::{parse_tracks, OutputCollector};
pub use request::{ExecutionOutput, ExecutionRequest, RequestKind};
pub use session::{ExecutionSession, SessionState, SessionStats};
pub use vfs::{VirtualFilesystem, WriteMode};
