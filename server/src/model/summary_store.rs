use async_trait::async_trait;
use derive_more::derive::Display;

use super::summary_record::SummaryRecord;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display("could not connect: {_0}")]
    Connect(String),
    #[display("{_0} timed out")]
    Timeout(&'static str),
    #[display("{_0}")]
    Operation(String),
}

impl std::error::Error for StoreError {}

/// The three document-store operations the upsert protocol needs.
#[async_trait]
pub trait SummaryCollection: Send + Sync {
    /// Counts records with `subject` without decoding them, so documents of any
    /// shape still count.
    async fn count_by_subject(&self, subject: &str) -> Result<u64, StoreError>;

    /// Returns the number of deleted records.
    async fn delete_by_subject(&self, subject: &str) -> Result<u64, StoreError>;

    async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError>;

    async fn close(&self);
}

/// Opens a connection to the document store for one invocation.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SummaryCollection>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub replaced: u64,
}

/// Leaves exactly one record for `record.subject`: every existing record with that
/// subject is deleted, then the new one is inserted.
///
/// Not atomic. Two concurrent runs for the same subject can interleave, and the
/// slower run wins. Callers needing stricter guarantees must serialize per subject.
pub async fn upsert_by_subject(
    collection: &dyn SummaryCollection,
    record: &SummaryRecord,
) -> Result<UpsertOutcome, StoreError> {
    let mut replaced = 0;

    if collection.count_by_subject(&record.subject).await? > 0 {
        tracing::info!(
            "Found existing record for subject, replacing: {}",
            record.subject
        );
        replaced = collection.delete_by_subject(&record.subject).await?;
        tracing::info!("Deleted {} existing record(s)", replaced);
    }

    collection.insert(record).await?;
    tracing::info!("Inserted record for subject: {}", record.subject);

    Ok(UpsertOutcome { replaced })
}
