use anyhow::anyhow;
use derive_more::derive::Display;

use crate::{
    error::{IngestError, IngestResult},
    model::response::InvocationResponse,
    storage::StorageError,
};

use super::{
    events::{BatchEvent, ObjectLocation},
    pipeline::{FileOutcome, Ingestor, MissingSubject},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Display)]
#[display("processed={processed} skipped={skipped} failed={failed} continued={continued}")]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub continued: bool,
}

fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

impl Ingestor {
    /// Processes one page of `prefix` and schedules at most one continuation.
    ///
    /// Per-file failures are counted and logged. Listing failures and a failed
    /// continuation dispatch fail the whole invocation.
    pub async fn run_batch(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> IngestResult<BatchReport> {
        let prefix = normalize_prefix(prefix);
        let missing_subject =
            MissingSubject::Substitute(self.settings.missing_subject_placeholder.clone());

        let (mut report, next_token) = self
            .services
            .gate
            .run_gated(async {
                let page = self
                    .services
                    .objects
                    .list_objects(bucket, &prefix, continuation_token)
                    .await?;
                let next_token = match (page.is_truncated, page.next_token) {
                    (false, _) => None,
                    (true, Some(token)) => Some(token),
                    (true, None) => return Err(StorageError::MissingToken.into()),
                };

                let mut report = BatchReport::default();
                let mut session = self.store_session();
                for key in page.keys.into_iter().filter(|k| !k.ends_with('/')) {
                    let location = ObjectLocation {
                        bucket: bucket.to_string(),
                        key,
                    };
                    match self
                        .process_object(&location, &missing_subject, &mut session)
                        .await
                    {
                        Ok(FileOutcome::Stored { .. }) => report.processed += 1,
                        Ok(FileOutcome::Skipped { .. }) => report.skipped += 1,
                        Err(e) => {
                            tracing::error!("Failed to process {}: {}", location.key, e);
                            report.failed += 1;
                        }
                    }
                }
                session.close().await;

                Ok::<_, IngestError>((report, next_token))
            })
            .await?;

        // dispatched after the allowlist window has closed
        if let Some(token) = next_token {
            self.services
                .scheduler
                .schedule(&token)
                .await
                .map_err(IngestError::Continuation)?;
            report.continued = true;
        }

        tracing::info!("Batch page finished: {}", report);
        Ok(report)
    }

    pub async fn handle_batch(&self, event: BatchEvent) -> InvocationResponse {
        let Some(bucket) = self.batch_target.bucket.as_deref() else {
            return IngestError::Internal(anyhow!("S3_BUCKET_NAME is not set")).into();
        };

        match self
            .run_batch(
                bucket,
                &self.batch_target.prefix,
                event.continuation_token.as_deref(),
            )
            .await
        {
            Ok(report) => {
                InvocationResponse::ok(&format!("Batch processing completed: {report}"))
            }
            Err(e) => e.into(),
        }
    }
}
