//! Engine seam.
//!
//! This module provides a common trait for the sandboxed engine, enabling
//! both the real wasmtime-hosted module and an in-memory engine for tests.
//!
//! The engine is single-threaded and non-reentrant. It owns a private linear
//! memory with a downward-growing stack that doubles as the scratch region
//! for argument encoding, a line-oriented output stream, and a completion
//! hook slot it fires with the exit code.

pub mod context;
#[cfg(any(test, feature = "mock-engine"))]
pub mod mock;
pub mod wasm;

pub use context::EngineContext;
#[cfg(any(test, feature = "mock-engine"))]
pub use mock::{MockEngine, MockExit, MockHandle, MockIo};
pub use wasm::WasmEngine;

use thiserror::Error;

/// Unexpected trap or host failure. Always fatal for the invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineFault(pub String);

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// How the entry point ended.
///
/// The engine exits either by returning from `main` or through its own halt
/// signal. Both are normal termination; faults are reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Returned(i32),
    Halted(i32),
}

impl Termination {
    pub fn code(self) -> i32 {
        match self {
            Termination::Returned(code) | Termination::Halted(code) => code,
        }
    }
}

/// Raw bytes the engine wrote during one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Engine module interface.
///
/// Memory addresses are 32-bit offsets into the engine's linear memory.
#[cfg_attr(test, mockall::automock)]
pub trait EngineModule: Send {
    /// Reset per-invocation state: output capture and the completion slot
    fn begin_invocation(&mut self) -> Result<(), EngineFault>;

    /// Current stack pointer, used as a release mark
    fn stack_save(&mut self) -> Result<u32, EngineFault>;

    /// Allocate `size` bytes on the stack, returning the new (aligned) pointer
    fn stack_alloc(&mut self, size: u32) -> Result<u32, EngineFault>;

    /// Release the stack back to a mark from [`stack_save`](Self::stack_save)
    fn stack_restore(&mut self, mark: u32) -> Result<(), EngineFault>;

    /// Bytes that can still be allocated on the stack
    fn scratch_available(&mut self) -> Result<usize, EngineFault>;

    fn write_memory(&mut self, addr: u32, bytes: &[u8]) -> Result<(), EngineFault>;

    fn read_memory(&mut self, addr: u32, len: u32) -> Result<Vec<u8>, EngineFault>;

    /// Run the entry point with a marshaled argv
    fn call_main(&mut self, argc: i32, argv: u32) -> Result<Termination, EngineFault>;

    /// Exit code delivered through the completion hook, if it fired
    fn take_completion(&mut self) -> Option<i32>;

    /// Output captured since [`begin_invocation`](Self::begin_invocation)
    fn take_output(&mut self) -> EngineOutput;
}
