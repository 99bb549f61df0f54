use crate::server_config::FilterConfig;

#[derive(Debug, Clone)]
struct Keyword {
    original: String,
    normalized: String,
}

/// Rejects subjects that look like spam, agency staffing offers, or replies.
#[derive(Debug, Clone, Default)]
pub struct SubjectFilter {
    keywords: Vec<Keyword>,
}

impl SubjectFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k| !k.trim().is_empty())
            .map(|original| Keyword {
                normalized: original.to_uppercase(),
                original,
            })
            .collect();

        Self { keywords }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.keywords.iter().cloned())
    }

    /// First configured keyword contained in `subject`, ignoring case.
    pub fn matched_keyword(&self, subject: &str) -> Option<&str> {
        let subject = subject.to_uppercase();
        self.keywords
            .iter()
            .find(|k| subject.contains(&k.normalized))
            .map(|k| k.original.as_str())
    }

    pub fn is_excluded(&self, subject: &str) -> bool {
        self.matched_keyword(subject).is_some()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
