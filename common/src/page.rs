use futures::future::BoxFuture;
use thiserror::Error;

/// Raw response for one fetched page.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub body: String,
}

/// Text pulled out of a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub headings: Vec<String>,
    pub words: Vec<String>,
}

impl Page {
    /// Lowercased body words.
    pub fn words_lowercase(&self) -> impl Iterator<Item = String> + '_ {
        self.words.iter().map(|w| w.to_lowercase())
    }

    /// Lowercased title split on whitespace.
    pub fn title_words(&self) -> impl Iterator<Item = String> + '_ {
        self.title.split_whitespace().map(|w| w.to_lowercase())
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid document {url}: {reason}")]
pub struct InvalidDocument {
    pub url: String,
    pub reason: String,
}

/// Source of documents. Each call is expected to return a fresh page.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Document, FetchError>>;
}

/// Turns a document into title, headings and words.
pub trait Extract: Send + Sync {
    fn extract(&self, document: &Document) -> Result<Page, InvalidDocument>;
}
