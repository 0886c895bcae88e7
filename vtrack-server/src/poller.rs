//! Background pull ingestion on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::pipeline::IngestPipeline;

/// Run `ingest_pull` every `every` until the task is aborted. Failures are
/// logged and the loop keeps going.
pub fn spawn(pipeline: Arc<IngestPipeline>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // No catch-up burst after a slow lookup
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match pipeline.ingest_pull().await {
                Ok(record) => {
                    debug!(id = record.id.as_deref().unwrap_or_default(), "poll ingested")
                }
                Err(e) => warn!(error = %e, "poll failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::db::MemoryStore;
    use crate::pipeline::tests::{chennai, pipeline_with, FixedSource};

    #[tokio::test]
    async fn test_poller_ingests_repeatedly() {
        let source = Arc::new(FixedSource::new(Some(chennai())));
        let pipeline = Arc::new(pipeline_with(source.clone(), Arc::new(MemoryStore::new())));

        let handle = spawn(Arc::clone(&pipeline), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(source.calls.load(Ordering::SeqCst) >= 2);
        assert!(pipeline.store().count().await.unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_poller_survives_failures() {
        let source = Arc::new(FixedSource::new(None));
        let pipeline = Arc::new(pipeline_with(source.clone(), Arc::new(MemoryStore::new())));

        let handle = spawn(Arc::clone(&pipeline), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!handle.is_finished());
        handle.abort();

        assert!(source.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(pipeline.store().count().await.unwrap(), 0);
    }
}
