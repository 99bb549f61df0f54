use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use anyhow::anyhow;
use futures::FutureExt;

use crate::{
    error::{IngestError, IngestResult},
    network::{gate::allowlist_cidr, AddressResolver, NetworkGate},
};

#[derive(Clone)]
pub struct AllowlistGate {
    pub resolver: Arc<dyn AddressResolver>,
    pub gate: Arc<dyn NetworkGate>,
}

/// Whether invocations must allowlist their own address before touching the store.
#[derive(Clone)]
pub enum GatePolicy {
    Enabled(AllowlistGate),
    Disabled,
}

impl GatePolicy {
    /// Runs `work` inside an allowlist window.
    ///
    /// The address is resolved fresh and the gate opened before `work` starts; if
    /// either step fails `work` never runs. Once the gate is open, close is attempted
    /// exactly once, whether `work` succeeds, fails or panics. A failed close is
    /// logged and does not change the result.
    pub async fn run_gated<T, F>(&self, work: F) -> IngestResult<T>
    where
        F: Future<Output = IngestResult<T>>,
    {
        let AllowlistGate { resolver, gate } = match self {
            GatePolicy::Disabled => return catch_panics(work).await,
            GatePolicy::Enabled(allowlist) => allowlist,
        };

        let addr = resolver.resolve().await.map_err(|e| {
            tracing::error!("Could not resolve public address: {}", e);
            IngestError::AddressLookup(e)
        })?;

        gate.open(addr).await.map_err(|e| {
            tracing::error!("Failed to allowlist {}: {}", allowlist_cidr(addr), e);
            IngestError::Gate(e)
        })?;

        let result = catch_panics(work).await;

        if let Err(e) = gate.close(addr).await {
            tracing::error!(
                "Failed to revoke {}, rule left in place: {}",
                allowlist_cidr(addr),
                e
            );
        }

        result
    }
}

async fn catch_panics<T, F>(work: F) -> IngestResult<T>
where
    F: Future<Output = IngestResult<T>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Unknown panic".to_string());
            tracing::error!("Pipeline panicked, recovering: {}", msg);
            Err(IngestError::Internal(anyhow!("pipeline panicked: {}", msg)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fakes::{GateCall, RecordingGate, StaticResolver};

    fn enabled(resolver: StaticResolver, gate: Arc<RecordingGate>) -> GatePolicy {
        GatePolicy::Enabled(AllowlistGate {
            resolver: Arc::new(resolver),
            gate,
        })
    }

    #[tokio::test]
    async fn test_opens_and_closes_around_work() {
        let gate = Arc::new(RecordingGate::default());
        let policy = enabled(StaticResolver::ok("203.0.113.7"), gate.clone());

        let value = policy.run_gated(async { Ok(7) }).await.unwrap();

        assert_eq!(value, 7);
        let addr = "203.0.113.7".parse().unwrap();
        assert_eq!(gate.calls(), vec![GateCall::Open(addr), GateCall::Close(addr)]);
    }

    #[tokio::test]
    async fn test_closes_after_failed_work() {
        let gate = Arc::new(RecordingGate::default());
        let policy = enabled(StaticResolver::ok("203.0.113.7"), gate.clone());

        let result: IngestResult<()> = policy
            .run_gated(async { Err(IngestError::InvalidPath("x".to_string())) })
            .await;

        assert!(matches!(result, Err(IngestError::InvalidPath(_))));
        assert_eq!(gate.close_count(), 1);
    }

    #[tokio::test]
    async fn test_closes_after_panic() {
        let gate = Arc::new(RecordingGate::default());
        let policy = enabled(StaticResolver::ok("203.0.113.7"), gate.clone());

        let explode = true;
        let result: IngestResult<()> = policy
            .run_gated(async move {
                if explode {
                    panic!("summarizer exploded");
                }
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(IngestError::Internal(_))));
        assert_eq!(gate.close_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_gate_and_work() {
        let gate = Arc::new(RecordingGate::default());
        let policy = enabled(StaticResolver::failing(), gate.clone());
        let mut ran = false;

        let result = policy
            .run_gated(async {
                ran = true;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(IngestError::AddressLookup(_))));
        assert!(!ran);
        assert!(gate.calls().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_aborts_without_close() {
        let gate = Arc::new(RecordingGate::default().failing_open());
        let policy = enabled(StaticResolver::ok("203.0.113.7"), gate.clone());
        let mut ran = false;

        let result = policy
            .run_gated(async {
                ran = true;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(IngestError::Gate(_))));
        assert!(!ran);
        assert_eq!(gate.close_count(), 0);
    }

    #[tokio::test]
    async fn test_close_failure_keeps_work_result() {
        let gate = Arc::new(RecordingGate::default().failing_close());
        let policy = enabled(StaticResolver::ok("203.0.113.7"), gate.clone());

        let value = policy.run_gated(async { Ok("done") }).await.unwrap();

        assert_eq!(value, "done");
        assert_eq!(gate.close_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_runs_work_directly() {
        let result = GatePolicy::Disabled.run_gated(async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
