use std::time::Duration;

use async_trait::async_trait;
use mongodb::{bson::doc, options::ClientOptions, Client, Collection};
use tokio::time::timeout;

use crate::server_config::{EnvConfig, StoreConfig};

use super::{
    summary_record::SummaryRecord,
    summary_store::{StoreConnector, StoreError, SummaryCollection},
};

#[derive(Debug, Clone)]
pub struct MongoConnector {
    uri: String,
    db_name: String,
    collection_name: String,
    timeout: Duration,
}

impl MongoConnector {
    pub fn new(env: &EnvConfig, store: &StoreConfig) -> Self {
        Self {
            uri: env.mongodb_uri.clone(),
            db_name: env.mongodb_db_name.clone(),
            collection_name: env.mongodb_collection_name.clone(),
            timeout: Duration::from_secs(store.timeout_secs),
        }
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self) -> Result<Box<dyn SummaryCollection>, StoreError> {
        tracing::info!("Connecting to document store");
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(self.timeout);

        let client = Client::with_options(options).map_err(|e| StoreError::Connect(e.to_string()))?;

        // liveness check before any real work
        timeout(self.timeout, async {
            client.database("admin").run_command(doc! { "ping": 1 }).await
        })
        .await
        .map_err(|_| StoreError::Connect("liveness check timed out".to_string()))?
        .map_err(|e| StoreError::Connect(e.to_string()))?;

        let collection = client
            .database(&self.db_name)
            .collection::<SummaryRecord>(&self.collection_name);

        Ok(Box::new(MongoCollection {
            client,
            collection,
            op_timeout: self.timeout,
        }))
    }
}

pub struct MongoCollection {
    client: Client,
    collection: Collection<SummaryRecord>,
    op_timeout: Duration,
}

#[async_trait]
impl SummaryCollection for MongoCollection {
    async fn count_by_subject(&self, subject: &str) -> Result<u64, StoreError> {
        timeout(self.op_timeout, async {
            self.collection
                .count_documents(doc! { "subject": subject })
                .await
        })
        .await
        .map_err(|_| StoreError::Timeout("count"))?
        .map_err(|e| StoreError::Operation(e.to_string()))
    }

    async fn delete_by_subject(&self, subject: &str) -> Result<u64, StoreError> {
        let result = timeout(self.op_timeout, async {
            self.collection
                .delete_many(doc! { "subject": subject })
                .await
        })
        .await
        .map_err(|_| StoreError::Timeout("delete"))?
        .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(result.deleted_count)
    }

    async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        timeout(self.op_timeout, async { self.collection.insert_one(record).await })
            .await
            .map_err(|_| StoreError::Timeout("insert"))?
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::debug!("Document store connection closed");
    }
}
