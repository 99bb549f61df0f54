use std::sync::Arc;

use anyhow::Context;

use crate::{
    email::{decoded_message::DecodeError, DecodedMessage, SubjectFilter},
    error::{IngestError, IngestResult},
    model::{
        mongo::MongoConnector,
        summary_store::{upsert_by_subject, StoreConnector, SummaryCollection},
    },
    network::{CommandGate, HttpAddressResolver},
    prompt::{ClaudeSummarizer, Summarize, SummaryRequest},
    server_config::{IngestConfig, ServerConfig},
    storage::{LocalObjectStore, ObjectStore},
    HttpClient,
};

use super::{
    continuation::{ContinuationScheduler, HttpContinuationScheduler},
    events::ObjectLocation,
    gate_scope::{AllowlistGate, GatePolicy},
};

/// What to do with a message that has no `Subject:` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingSubject {
    Reject,
    Substitute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Stored { subject: String, replaced: u64 },
    Skipped { keyword: String },
}

/// External collaborators the pipeline reaches through narrow interfaces.
pub struct IngestServices {
    pub objects: Arc<dyn ObjectStore>,
    pub summarizer: Arc<dyn Summarize>,
    pub store: Arc<dyn StoreConnector>,
    pub gate: GatePolicy,
    pub scheduler: Arc<dyn ContinuationScheduler>,
}

/// Default scan target of the batch driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTarget {
    pub bucket: Option<String>,
    pub prefix: String,
}

#[derive(Clone)]
pub struct Ingestor {
    pub(super) services: Arc<IngestServices>,
    pub(super) filter: Arc<SubjectFilter>,
    pub(super) settings: Arc<IngestConfig>,
    pub(super) batch_target: Arc<BatchTarget>,
}

impl Ingestor {
    pub fn new(
        services: IngestServices,
        filter: SubjectFilter,
        settings: IngestConfig,
        batch_target: BatchTarget,
    ) -> Self {
        Self {
            services: Arc::new(services),
            filter: Arc::new(filter),
            settings: Arc::new(settings),
            batch_target: Arc::new(batch_target),
        }
    }

    /// Wires the production adapters from configuration.
    pub fn from_config(config: &ServerConfig, http_client: HttpClient) -> anyhow::Result<Self> {
        let gate = if config.gate.enabled {
            GatePolicy::Enabled(AllowlistGate {
                resolver: Arc::new(HttpAddressResolver::new(
                    http_client.clone(),
                    &config.address,
                )),
                gate: Arc::new(CommandGate::new(&config.gate)),
            })
        } else {
            tracing::warn!("Network allowlist gate is disabled");
            GatePolicy::Disabled
        };

        let scheduler = HttpContinuationScheduler::from_config(http_client.clone(), config)
            .context("Could not build continuation scheduler")?;

        let services = IngestServices {
            objects: Arc::new(LocalObjectStore::from_config(
                &config.storage,
                config.ingest.list_page_size,
            )),
            summarizer: Arc::new(ClaudeSummarizer::new(
                http_client,
                &config.summarizer,
                config.env.claude_api_key.clone(),
            )),
            store: Arc::new(MongoConnector::new(&config.env, &config.store)),
            gate,
            scheduler: Arc::new(scheduler),
        };

        let batch_target = BatchTarget {
            bucket: config.env.s3_bucket_name.clone(),
            prefix: config
                .env
                .s3_folder_name
                .clone()
                .unwrap_or_else(|| config.ingest.folder_prefix.clone()),
        };

        let filter = SubjectFilter::from_config(&config.filter);
        tracing::info!("Subject filter loaded with {} keywords", filter.len());

        Ok(Self::new(
            services,
            filter,
            config.ingest.clone(),
            batch_target,
        ))
    }

    pub fn settings(&self) -> &IngestConfig {
        &self.settings
    }

    pub(super) fn store_session(&self) -> StoreSession {
        StoreSession::new(self.services.store.clone())
    }

    /// Fetch, decode, classify, summarize and upsert one object.
    pub async fn process_object(
        &self,
        location: &ObjectLocation,
        missing_subject: &MissingSubject,
        session: &mut StoreSession,
    ) -> IngestResult<FileOutcome> {
        tracing::info!("Processing {}/{}", location.bucket, location.key);

        let raw = self
            .services
            .objects
            .get_object(&location.bucket, &location.key)
            .await?;

        let decoded = DecodedMessage::parse(&raw, &self.settings.empty_body_placeholder)?;
        let subject = match (decoded.subject.clone(), missing_subject) {
            (Some(subject), _) => subject,
            (None, MissingSubject::Substitute(placeholder)) => placeholder.clone(),
            (None, MissingSubject::Reject) => return Err(DecodeError::MissingSubject.into()),
        };
        tracing::debug!("Subject: {}", subject);

        if let Some(keyword) = self.filter.matched_keyword(&subject) {
            tracing::info!(
                "SPAM detected (keyword {:?}), skipping {}",
                keyword,
                location.key
            );
            return Ok(FileOutcome::Skipped {
                keyword: keyword.to_string(),
            });
        }

        let received_at = decoded.received_at_rfc3339();
        let mut record = self
            .services
            .summarizer
            .summarize(SummaryRequest {
                body_text: &decoded.body_text,
                subject: &subject,
                source_key: &location.key,
                received_at: received_at.as_deref(),
            })
            .await?;
        record.backfill_date(received_at.as_deref());

        let collection = session.collection().await?;
        let outcome = upsert_by_subject(collection, &record)
            .await
            .map_err(IngestError::StoreOperation)?;

        Ok(FileOutcome::Stored {
            subject: record.subject,
            replaced: outcome.replaced,
        })
    }
}

/// Document-store connection opened on first use and closed once per invocation.
pub struct StoreSession {
    connector: Arc<dyn StoreConnector>,
    collection: Option<Box<dyn SummaryCollection>>,
}

impl StoreSession {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            collection: None,
        }
    }

    pub async fn collection(&mut self) -> IngestResult<&dyn SummaryCollection> {
        if self.collection.is_none() {
            let collection = self
                .connector
                .connect()
                .await
                .map_err(IngestError::StoreConnect)?;
            self.collection = Some(collection);
        }

        match self.collection.as_deref() {
            Some(collection) => Ok(collection),
            None => Err(anyhow::anyhow!("store session lost its connection").into()),
        }
    }

    pub async fn close(self) {
        if let Some(collection) = self.collection {
            collection.close().await;
        }
    }
}
