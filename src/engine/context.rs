//! The process-wide engine instance.
//!
//! The engine's memory and completion slot are global to the process, so at
//! most one [`EngineContext`] may be live at a time. Creating a second one
//! fails with [`BridgeError::ContextAlreadyLive`]; dropping the live context
//! releases the slot.

use super::EngineModule;
use crate::error::BridgeError;
use std::sync::atomic::{AtomicBool, Ordering};

static CONTEXT_LIVE: AtomicBool = AtomicBool::new(false);

pub struct EngineContext {
    module: Box<dyn EngineModule>,
}

impl EngineContext {
    /// Take ownership of an initialized engine.
    pub fn new(module: Box<dyn EngineModule>) -> Result<Self, BridgeError> {
        CONTEXT_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BridgeError::ContextAlreadyLive)?;
        tracing::info!("Engine context initialized");
        Ok(Self { module })
    }

    /// Whether a context is live in this process
    pub fn is_live() -> bool {
        CONTEXT_LIVE.load(Ordering::Acquire)
    }

    pub fn module(&mut self) -> &mut dyn EngineModule {
        self.module.as_mut()
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        CONTEXT_LIVE.store(false, Ordering::Release);
        tracing::info!("Engine context torn down");
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_second_context_rejected() {
        let first = EngineContext::new(Box::new(MockEngine::new())).unwrap();
        assert!(EngineContext::is_live());

        let second = EngineContext::new(Box::new(MockEngine::new()));
        assert!(matches!(second, Err(BridgeError::ContextAlreadyLive)));

        drop(first);
        assert!(!EngineContext::is_live());
    }

    #[test]
    #[serial]
    fn test_context_reusable_after_teardown() {
        let first = EngineContext::new(Box::new(MockEngine::new())).unwrap();
        drop(first);
        let second = EngineContext::new(Box::new(MockEngine::new()));
        assert!(second.is_ok());
    }
}
