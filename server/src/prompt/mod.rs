pub(crate) mod claude;

pub use claude::{ClaudeSummarizer, Summarize, SummaryRequest};
