use std::sync::Arc;

use serde_json::json;

use crate::{
    email::SubjectFilter,
    server_config::{EnvConfig, IngestConfig, ServerConfig},
    state::ingest::{
        gate_scope::{AllowlistGate, GatePolicy},
        pipeline::{BatchTarget, IngestServices},
        Ingestor, ObjectCreatedEvent,
    },
};

use super::fakes::{
    MemoryObjectStore, MemoryStore, RecordingGate, RecordingScheduler, ScriptedSummarizer,
    StaticResolver,
};

pub const TEST_KEYWORDS: [&str; 6] = ["SPAM", "人材紹介", "要員情報", "KANAME要員", "Re:", "RE:"];

/// One set of fakes. Clones share state, so assertions can be made after the run.
#[derive(Clone, Default)]
pub struct TestHarness {
    pub objects: MemoryObjectStore,
    pub summarizer: ScriptedSummarizer,
    pub store: MemoryStore,
    pub resolver: StaticResolver,
    pub gate: RecordingGate,
    pub scheduler: RecordingScheduler,
}

pub fn test_ingestor(harness: &TestHarness) -> Ingestor {
    let services = IngestServices {
        objects: Arc::new(harness.objects.clone()),
        summarizer: Arc::new(harness.summarizer.clone()),
        store: Arc::new(harness.store.clone()),
        gate: GatePolicy::Enabled(AllowlistGate {
            resolver: Arc::new(harness.resolver.clone()),
            gate: Arc::new(harness.gate.clone()),
        }),
        scheduler: Arc::new(harness.scheduler.clone()),
    };

    Ingestor::new(
        services,
        SubjectFilter::new(TEST_KEYWORDS),
        IngestConfig::default(),
        BatchTarget {
            bucket: Some("mail-bucket".to_string()),
            prefix: "emails/job-offers".to_string(),
        },
    )
}

pub fn test_env() -> EnvConfig {
    EnvConfig {
        claude_api_key: "test-key".to_string(),
        mongodb_uri: "mongodb://localhost:27017".to_string(),
        mongodb_db_name: "jobs".to_string(),
        mongodb_collection_name: "offers".to_string(),
        s3_bucket_name: Some("mail-bucket".to_string()),
        s3_folder_name: None,
        port: 5006,
    }
}

/// The bundled `config/config.toml` with test credentials.
pub fn test_config() -> Arc<ServerConfig> {
    let path = format!("{}/../config/config.toml", env!("CARGO_MANIFEST_DIR"));
    Arc::new(ServerConfig::from_file(&path, test_env()).expect("Bundled config is invalid"))
}

pub fn fixture(name: &str) -> Vec<u8> {
    let root = env!("CARGO_MANIFEST_DIR");
    std::fs::read(format!("{root}/src/testing/data/{name}")).expect("Unable to read fixture")
}

/// Storage notification for `key`, which is used as given (already URL-encoded).
pub fn object_created(bucket: &str, key: &str) -> ObjectCreatedEvent {
    serde_json::from_value(json!({
        "Records": [{
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": bucket },
                "object": { "key": key }
            }
        }]
    }))
    .expect("Invalid test event")
}
