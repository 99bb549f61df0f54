use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

/// Storage-creation notification, in the shape object stores deliver them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectCreatedEvent {
    #[serde(default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub s3: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    /// URL-encoded, `+` standing for a space.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectCreatedEvent {
    /// Location of the first record with its key decoded.
    pub fn location(&self) -> IngestResult<ObjectLocation> {
        let record = self
            .records
            .first()
            .ok_or_else(|| IngestError::InvalidEvent("event has no records".to_string()))?;

        Ok(ObjectLocation {
            bucket: record.s3.bucket.name.clone(),
            key: decode_object_key(&record.s3.object.key)?,
        })
    }
}

pub fn decode_object_key(raw: &str) -> IngestResult<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|e| IngestError::InvalidEvent(format!("object key is not valid UTF-8: {e}")))
}

/// Batch trigger. The token is absent on the first invocation of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvent {
    #[serde(default, alias = "continuation_token", skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}
