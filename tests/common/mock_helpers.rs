//! Mock construction helpers

#[cfg(feature = "mock-engine")]
use filterflow_rs::{
    bridge::{ExecutionSession, VirtualFilesystem},
    config::FilesystemSettings,
    engine::{EngineContext, MockEngine},
};
#[cfg(feature = "mock-engine")]
use tempfile::TempDir;

/// Session over a mock engine whose guest `/root` is a fresh temp dir.
///
/// Keep the `TempDir` alive for as long as the session.
#[cfg(feature = "mock-engine")]
pub fn create_test_session(engine: MockEngine) -> (TempDir, ExecutionSession) {
    let dir = TempDir::new().unwrap();
    let engine = engine.with_filesystem(dir.path(), "/root");
    let vfs = VirtualFilesystem::new(dir.path(), "/root");
    vfs.mount().unwrap();
    let context = EngineContext::new(Box::new(engine)).unwrap();
    let session = ExecutionSession::new(context, vfs, "gpac", FilesystemSettings::default());
    (dir, session)
}
