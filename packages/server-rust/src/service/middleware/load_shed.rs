//! Load-shedding plugin.
//!
//! Rejects calls when the service is overloaded (concurrent count exceeds
//! `max_concurrent_calls`) with `CallError::Overloaded`.

use std::sync::Arc;

use async_trait::async_trait;
use switchboard_core::{CallError, Context, RequestPlugin};
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// LoadShedPlugin
// ---------------------------------------------------------------------------

/// Request-scope plugin that limits concurrent calls via a semaphore.
///
/// When all permits are taken, incoming calls are rejected immediately
/// rather than queued.
#[derive(Debug, Clone)]
pub struct LoadShedPlugin {
    semaphore: Arc<Semaphore>,
}

impl LoadShedPlugin {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }

    /// Permits not currently held by a call.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl RequestPlugin for LoadShedPlugin {
    async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let Ok(_permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            tracing::warn!(operation = ctx.operation(), "shedding call");
            return Err(CallError::Overloaded);
        };
        ctx.process_request().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use switchboard_core::{CallInfo, ExceptionRegistry, PluginChain, Terminal};
    use tokio::sync::Notify;

    use super::*;

    /// Terminal that parks until notified.
    struct Parked {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Terminal for Parked {
        async fn invoke(&self, _ctx: &mut Context<'_>) -> Result<(), CallError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    struct Immediate;

    #[async_trait]
    impl Terminal for Immediate {
        async fn invoke(&self, _ctx: &mut Context<'_>) -> Result<(), CallError> {
            Ok(())
        }
    }

    fn info() -> CallInfo {
        let registry = ExceptionRegistry::new(Vec::<String>::new()).unwrap();
        CallInfo::new("busy", 1, Arc::new(registry))
    }

    #[tokio::test]
    async fn allows_calls_under_limit() {
        let plugin = LoadShedPlugin::new(10);
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(plugin.clone()));
        let mut ctx = Context::new(info(), &chain, &Immediate);
        ctx.run().await.unwrap();
        assert_eq!(plugin.available(), 10);
    }

    #[tokio::test]
    async fn rejects_when_overloaded() {
        let plugin = LoadShedPlugin::new(1);
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(plugin.clone()));
        let chain = Arc::new(chain);

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let parked = Arc::new(Parked {
            entered: entered.clone(),
            release: release.clone(),
        });

        // First call takes the single permit and parks.
        let in_flight = tokio::spawn({
            let chain = chain.clone();
            let parked = parked.clone();
            async move {
                let mut ctx = Context::new(info(), &chain, parked.as_ref());
                ctx.run().await
            }
        });
        entered.notified().await;

        // Second call is rejected immediately.
        let mut ctx = Context::new(info(), &chain, &Immediate);
        let err = ctx.run().await.unwrap_err();
        assert!(matches!(err, CallError::Overloaded));

        release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), in_flight)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(plugin.available(), 1);
    }
}
