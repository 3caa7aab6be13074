//! Argument encoding into the engine's scratch region.
//!
//! Arguments become a C `argv`: a pointer array of `argc + 1` slots, the last
//! one null, each other slot pointing at a NUL-terminated string. Everything
//! lives on the engine stack. A [`ScratchFrame`] records the stack mark taken
//! before encoding and restores it when dropped, so the region never stays
//! grown, whatever way the invocation ends.

use crate::engine::{EngineFault, EngineModule};
use crate::error::BridgeError;
use std::ops::{Deref, DerefMut};

/// Engine stack allocations are aligned to this many bytes
const STACK_ALIGN: usize = 16;

const POINTER_SIZE: usize = 4;

/// Location of an encoded argv in engine memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueArgv {
    pub argc: i32,
    pub ptr: u32,
}

fn align_up(n: usize) -> usize {
    n.div_ceil(STACK_ALIGN) * STACK_ALIGN
}

/// Scratch bytes needed to encode `args`, alignment padding included.
pub fn encoded_size(args: &[String]) -> usize {
    let table = align_up((args.len() + 1) * POINTER_SIZE);
    let strings: usize = args.iter().map(|a| align_up(a.len() + 1)).sum();
    table + strings
}

/// A marshaled argv that owns a stretch of the engine stack.
///
/// Derefs to the engine so the entry point can be called through it.
pub struct ScratchFrame<'a> {
    engine: &'a mut dyn EngineModule,
    mark: u32,
    argv: OpaqueArgv,
}

impl<'a> ScratchFrame<'a> {
    pub fn argv(&self) -> OpaqueArgv {
        self.argv
    }

    pub fn mark(&self) -> u32 {
        self.mark
    }
}

impl<'a> Deref for ScratchFrame<'a> {
    type Target = dyn EngineModule + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.engine
    }
}

impl<'a> DerefMut for ScratchFrame<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.engine
    }
}

impl Drop for ScratchFrame<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.stack_restore(self.mark) {
            tracing::warn!("Failed to release scratch region to {:#x}: {}", self.mark, e);
        }
    }
}

pub struct ArgumentMarshaler;

impl ArgumentMarshaler {
    /// Encode `program` followed by `args` into engine memory.
    ///
    /// Capacity is checked before anything is allocated, so an overflow
    /// leaves the engine untouched.
    pub fn marshal<'a>(
        engine: &'a mut dyn EngineModule,
        program: &str,
        args: &[String],
    ) -> Result<ScratchFrame<'a>, BridgeError> {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(program.to_string());
        all.extend(args.iter().cloned());

        if let Some(index) = all.iter().position(|a| a.as_bytes().contains(&0)) {
            return Err(BridgeError::InvalidArgument { index });
        }
        let required = encoded_size(&all);
        let available = engine.scratch_available()?;
        // An argc past i32 can never fit either, so both report the real sizes.
        let argc = i32::try_from(all.len())
            .ok()
            .filter(|_| required <= available)
            .ok_or(BridgeError::MarshalOverflow {
                required,
                available,
            })?;

        let mark = engine.stack_save()?;
        let mut frame = ScratchFrame {
            engine,
            mark,
            argv: OpaqueArgv { argc, ptr: 0 },
        };

        let table_len = (all.len() + 1) * POINTER_SIZE;
        let table = frame.stack_alloc(table_len as u32)?;
        let mut pointers = Vec::with_capacity(table_len);
        for arg in &all {
            let mut bytes = Vec::with_capacity(arg.len() + 1);
            bytes.extend_from_slice(arg.as_bytes());
            bytes.push(0);
            let ptr = frame.stack_alloc(bytes.len() as u32)?;
            frame.write_memory(ptr, &bytes)?;
            pointers.extend_from_slice(&ptr.to_le_bytes());
        }
        pointers.extend_from_slice(&0u32.to_le_bytes());
        frame.write_memory(table, &pointers)?;

        frame.argv.ptr = table;
        Ok(frame)
    }
}

/// Read an argv back out of engine memory.
pub fn decode_argv(
    engine: &mut dyn EngineModule,
    argv: OpaqueArgv,
) -> Result<Vec<String>, EngineFault> {
    let count = argv.argc.max(0) as u32;
    let table = engine.read_memory(argv.ptr, (count + 1) * POINTER_SIZE as u32)?;
    let mut words = table
        .chunks_exact(POINTER_SIZE)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]));

    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let ptr = words
            .next()
            .ok_or_else(|| EngineFault::new("argv table truncated"))?;
        args.push(read_cstr(engine, ptr)?);
    }
    if words.next() != Some(0) {
        return Err(EngineFault::new("argv is not null-terminated"));
    }
    Ok(args)
}

fn read_cstr(engine: &mut dyn EngineModule, ptr: u32) -> Result<String, EngineFault> {
    const CHUNK: u32 = 64;
    let mut bytes = Vec::new();
    let mut addr = ptr;
    loop {
        let chunk = engine.read_memory(addr, CHUNK).or_else(|_| engine.read_memory(addr, 1))?;
        if let Some(end) = chunk.iter().position(|&b| b == 0) {
            bytes.extend_from_slice(&chunk[..end]);
            break;
        }
        bytes.extend_from_slice(&chunk);
        addr += chunk.len() as u32;
    }
    String::from_utf8(bytes).map_err(|e| EngineFault::new(format!("argument is not UTF-8: {}", e)))
}
