use std::{
    net::IpAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    model::{
        summary_record::SummaryRecord,
        summary_store::{StoreConnector, StoreError, SummaryCollection},
    },
    network::{address::AddressLookupError, gate::GateError, AddressResolver, NetworkGate},
    prompt::{claude::SummarizeError, Summarize, SummaryRequest},
    state::ingest::continuation::{ContinuationError, ContinuationScheduler},
    storage::{object_store::ObjectPage, ObjectStore, StorageError},
};

#[derive(Clone)]
pub struct StaticResolver {
    addr: Option<IpAddr>,
}

impl StaticResolver {
    pub fn ok(addr: &str) -> Self {
        Self {
            addr: Some(addr.parse().unwrap()),
        }
    }

    pub fn failing() -> Self {
        Self { addr: None }
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::ok("203.0.113.7")
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self) -> Result<IpAddr, AddressLookupError> {
        self.addr
            .ok_or_else(|| AddressLookupError::InvalidAddress("lookup unavailable".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCall {
    Open(IpAddr),
    Close(IpAddr),
}

/// Records gate calls in order.
#[derive(Clone, Default)]
pub struct RecordingGate {
    calls: Arc<Mutex<Vec<GateCall>>>,
    fail_open: bool,
    fail_close: bool,
}

impl RecordingGate {
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn calls(&self) -> Vec<GateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GateCall::Open(_)))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GateCall::Close(_)))
            .count()
    }

    fn denied(action: &'static str) -> GateError {
        GateError::Failed {
            action,
            code: Some(1),
            stderr: "denied".to_string(),
        }
    }
}

#[async_trait]
impl NetworkGate for RecordingGate {
    async fn open(&self, addr: IpAddr) -> Result<(), GateError> {
        self.calls.lock().unwrap().push(GateCall::Open(addr));
        if self.fail_open {
            return Err(Self::denied("open"));
        }
        Ok(())
    }

    async fn close(&self, addr: IpAddr) -> Result<(), GateError> {
        self.calls.lock().unwrap().push(GateCall::Close(addr));
        if self.fail_close {
            return Err(Self::denied("close"));
        }
        Ok(())
    }
}

type ListCall = (String, String, Option<String>);

/// Objects keyed by `(bucket, key)`. Listing pages by key order unless a fixed page is set.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    fixed_listing: Option<ObjectPage>,
    get_calls: Arc<Mutex<Vec<String>>>,
    list_calls: Arc<Mutex<Vec<ListCall>>>,
}

impl MemoryObjectStore {
    pub fn with_listing(mut self, page: ObjectPage) -> Self {
        self.fixed_listing = Some(page);
        self
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap();
        objects.retain(|(b, k, _)| !(b == bucket && k == key));
        objects.push((bucket.to_string(), key.to_string(), bytes));
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.get_calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get_calls.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(b, k, _)| b == bucket && k == key)
            .map(|(_, _, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{key}")))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, StorageError> {
        self.list_calls.lock().unwrap().push((
            bucket.to_string(),
            prefix.to_string(),
            continuation_token.map(|t| t.to_string()),
        ));

        if let Some(page) = &self.fixed_listing {
            return Ok(page.clone());
        }

        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, k, _)| b == bucket && k.starts_with(prefix))
            .filter(|(_, k, _)| continuation_token.map_or(true, |t| k.as_str() > t))
            .map(|(_, k, _)| k.clone())
            .collect();
        keys.sort();

        Ok(ObjectPage {
            keys,
            is_truncated: false,
            next_token: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub body_text: String,
    pub subject: String,
    pub source_key: String,
    pub received_at: Option<String>,
}

/// Echoes the request back as a record unless a fixed reply is set.
#[derive(Clone, Default)]
pub struct ScriptedSummarizer {
    reply: Arc<Mutex<Option<SummaryRecord>>>,
    fail: bool,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedSummarizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn set_reply(&self, record: SummaryRecord) {
        *self.reply.lock().unwrap() = Some(record);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarize for ScriptedSummarizer {
    async fn summarize(&self, req: SummaryRequest<'_>) -> Result<SummaryRecord, SummarizeError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            body_text: req.body_text.to_string(),
            subject: req.subject.to_string(),
            source_key: req.source_key.to_string(),
            received_at: req.received_at.map(|s| s.to_string()),
        });

        if self.fail {
            return Err(SummarizeError::Status {
                status: 500,
                body: "upstream error".to_string(),
            });
        }

        if let Some(record) = self.reply.lock().unwrap().clone() {
            return Ok(record);
        }

        Ok(SummaryRecord {
            email: Some("offers@example.co.jp".to_string()),
            info: Some(req.body_text.chars().take(200).collect()),
            date: None,
            subject: req.subject.to_string(),
            key: Some(req.source_key.to_string()),
        })
    }
}

#[derive(Default)]
struct MemoryStoreState {
    records: Vec<SummaryRecord>,
    connects: usize,
    closes: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryStoreState>>,
    fail_connect: bool,
    fail_insert: bool,
}

impl MemoryStore {
    pub fn with_records(records: Vec<SummaryRecord>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().records = records;
        store
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    pub fn records(&self) -> Vec<SummaryRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn records_for(&self, subject: &str) -> Vec<SummaryRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.subject == subject)
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn SummaryCollection>, StoreError> {
        if self.fail_connect {
            return Err(StoreError::Connect("connection refused".to_string()));
        }
        self.state.lock().unwrap().connects += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl SummaryCollection for MemoryStore {
    async fn count_by_subject(&self, subject: &str) -> Result<u64, StoreError> {
        Ok(self.records_for(subject).len() as u64)
    }

    async fn delete_by_subject(&self, subject: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let before = state.records.len();
        state.records.retain(|r| r.subject != subject);
        Ok((before - state.records.len()) as u64)
    }

    async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        if self.fail_insert {
            return Err(StoreError::Operation("write rejected".to_string()));
        }
        self.state.lock().unwrap().records.push(record.clone());
        Ok(())
    }

    async fn close(&self) {
        self.state.lock().unwrap().closes += 1;
    }
}

#[derive(Clone, Default)]
pub struct RecordingScheduler {
    tokens: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingScheduler {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContinuationScheduler for RecordingScheduler {
    async fn schedule(&self, continuation_token: &str) -> Result<(), ContinuationError> {
        if self.fail {
            return Err(ContinuationError::Rejected(503));
        }
        self.tokens
            .lock()
            .unwrap()
            .push(continuation_token.to_string());
        Ok(())
    }
}
