use std::time::Duration;

use async_trait::async_trait;
use derive_more::derive::Display;
use indoc::indoc;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::model::summary_record::SummaryRecord;
use crate::server_config::SummarizerConfig;
use crate::HttpClient;

/// Instruction sent as the `system` field. The five field names are the contract
/// with `SummaryRecord`; renaming any of them breaks parsing.
pub const DEFAULT_SYSTEM_PROMPT: &str = indoc! {"
    投げた文章は5つのフィールドのみでMongoDBに取り込めるJson形式に成形してください。\
    フィールド名はemail,info,date,subject,keyの5つです。\
    subjectはsubject:の件名を加工せずに入れます。\
    dateにはメールの受信日時がYYYY/MM/DD―hh:mmの形式で入ります。\
    infoフィールドには改行を含めないでください。\
    keyにはemails/job-offers/～のようなパスが入ります。\
    案件の概要、スキル、金額、テレワークやリモートの有無、勤務時間や場所などを200文字以内にシンプルにまとめてください。"
};

const UNKNOWN_RECEIVED_AT: &str = "不明";

#[derive(Debug, Display)]
pub enum SummarizeError {
    #[display("request failed: {_0}")]
    Http(reqwest::Error),
    #[display("request timed out")]
    Timeout,
    #[display("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[display("response had no text content")]
    EmptyResponse,
    #[display("model output is not a valid record: {error}")]
    InvalidJson { error: String, content: String },
}

impl std::error::Error for SummarizeError {}

impl From<reqwest::Error> for SummarizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SummarizeError::Timeout
        } else {
            SummarizeError::Http(e)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub body_text: &'a str,
    pub subject: &'a str,
    pub source_key: &'a str,
    pub received_at: Option<&'a str>,
}

/// The user turn: body, tagged subject, storage key and received time.
pub fn summary_user_prompt(req: &SummaryRequest) -> String {
    format!(
        "メール本文: {body}\nsubject:{subject}\n{key}\n受信日時: {received_at}",
        body = req.body_text,
        subject = req.subject,
        key = req.source_key,
        received_at = req.received_at.unwrap_or(UNKNOWN_RECEIVED_AT)
    )
}

#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, req: SummaryRequest<'_>) -> Result<SummaryRecord, SummarizeError>;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct ClaudeSummarizer {
    http_client: HttpClient,
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_version: String,
    system_prompt: String,
    timeout: Duration,
}

impl ClaudeSummarizer {
    pub fn new(http_client: HttpClient, config: &SummarizerConfig, api_key: String) -> Self {
        Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_version: config.api_version.clone(),
            system_prompt: config.system_prompt().to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl Summarize for ClaudeSummarizer {
    async fn summarize(&self, req: SummaryRequest<'_>) -> Result<SummaryRecord, SummarizeError> {
        let resp = self
            .http_client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "system": &self.system_prompt,
                "messages": [
                    { "role": "user", "content": summary_user_prompt(&req) }
                ]
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = resp.json::<MessagesResponse>().await?;
        let content = parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or(SummarizeError::EmptyResponse)?;

        tracing::debug!("Model content: {}", content);

        let mut record = parse_record(&content)?;
        record.sanitize_info();

        Ok(record)
    }
}

fn parse_record(content: &str) -> Result<SummaryRecord, SummarizeError> {
    serde_json::from_str::<SummaryRecord>(content.trim()).map_err(|e| {
        tracing::error!("Could not parse model output: {}", e);
        tracing::error!("Original content: {}", content);
        SummarizeError::InvalidJson {
            error: e.to_string(),
            content: content.to_string(),
        }
    })
}
