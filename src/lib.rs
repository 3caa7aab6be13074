//! # FilterFlow-RS: Filter Graphs over a Sandboxed Media Engine
//!
//! Turns a user-edited graph of media filters into invocations of a single
//! embedded, single-threaded multimedia engine (a WebAssembly build of GPAC)
//! and brings structured results back.
//!
//! ## Architecture
//!
//! - **Catalog**: Read-only filter descriptors with typed option schemas, plus the codec list
//! - **Graph**: Edge validation at edit time and topological compilation into engine arguments
//! - **Bridge**: Argument marshaling, single-flight execution, output capture and parsing
//! - **Engine**: The wasmtime-hosted module behind the `EngineModule` seam
//! - **Backend**: A dedicated engine thread reached over crossbeam channels
//!
//! ## Configuration
//!
//! Configuration and the engine's persistent filesystem root live in the
//! platform data directory under `dev.hxyulin.filterflow-rs`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.filterflow-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.filterflow-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.filterflow-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use filterflow_rs::{
//!     bridge::ExecutionSession,
//!     catalog::FilterCatalog,
//!     config::AppConfig,
//!     engine::WasmEngine,
//!     graph::FilterGraph,
//! };
//!
//! let config = AppConfig::load_or_default();
//! let root = config.filesystem.resolved_root().unwrap();
//! let engine = WasmEngine::load(&config.engine, &root, &config.filesystem.guest_root)?;
//! let session = ExecutionSession::open(Box::new(engine), &config, Some(root))?;
//!
//! let tracks = session.inspect(&std::fs::read("clip.mp4")?)?;
//!
//! let catalog = FilterCatalog::load("filters.json")?;
//! let mut graph = FilterGraph::new();
//! let src = graph.add_source(session.input_slot());
//! graph.set_tracks(src, tracks)?;
//! let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
//! graph.connect(src, dec, "video/Visual".parse()?, "Visual".parse()?)?;
//!
//! let plan = graph.compile(session.output_slot())?;
//! let output = session.execute(plan.into_request())?;
//! ```

pub mod backend;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod types;

// Re-export commonly used types
pub use backend::{EditorBridge, EngineCommand, EngineMessage, EngineWorker};
pub use bridge::{ExecutionOutput, ExecutionRequest, ExecutionSession};
pub use catalog::{CodecCatalog, FilterCatalog, FilterDescriptor};
pub use config::AppConfig;
pub use error::{BridgeError, FilterFlowError, Result};
pub use graph::{CompiledPlan, FilterGraph, GraphCompiler, GraphValidator};
pub use types::{StreamType, Track};
