use crate::{
    error::{IngestError, IngestResult},
    model::response::InvocationResponse,
};

use super::{
    events::ObjectCreatedEvent,
    pipeline::{FileOutcome, Ingestor, MissingSubject},
};

impl Ingestor {
    /// Handles one storage-creation notification end to end.
    pub async fn handle_object_created(&self, event: ObjectCreatedEvent) -> InvocationResponse {
        match self.ingest_object_created(event).await {
            Ok(FileOutcome::Stored { subject, replaced }) => {
                tracing::info!("Stored summary for {:?}, replaced {}", subject, replaced);
                InvocationResponse::ok("Success")
            }
            Ok(FileOutcome::Skipped { .. }) => {
                InvocationResponse::ok("SPAM detected, skipped processing")
            }
            Err(e) => e.into(),
        }
    }

    pub async fn ingest_object_created(
        &self,
        event: ObjectCreatedEvent,
    ) -> IngestResult<FileOutcome> {
        let location = event.location()?;
        tracing::info!("Object created: {}/{}", location.bucket, location.key);
        if !location.key.starts_with(&self.settings.folder_prefix) {
            return Err(IngestError::InvalidPath(location.key));
        }

        self.services
            .gate
            .run_gated(async {
                let mut session = self.store_session();
                let result = self
                    .process_object(&location, &MissingSubject::Reject, &mut session)
                    .await;
                session.close().await;
                result
            })
            .await
    }
}
