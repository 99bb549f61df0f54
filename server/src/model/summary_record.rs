use serde::{Deserialize, Serialize};

/// One summarized job-offer email as persisted in the document store.
///
/// Field names are part of the contract with the summarization prompt; the model
/// is told to emit exactly these five keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SummaryRecord {
    /// `info` is kept on a single line.
    pub fn sanitize_info(&mut self) {
        if let Some(info) = self.info.as_mut() {
            *info = info.replace('\r', "").replace('\n', " ").trim().to_string();
        }
    }

    /// Fill `date` from the message's own timestamp when the model left it out.
    pub fn backfill_date(&mut self, received_at: Option<&str>) {
        if self.date.is_none() {
            self.date = received_at.map(|s| s.to_string());
        }
    }
}
