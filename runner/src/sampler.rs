use std::{fmt, sync::Arc, time::Duration};

use common::{Extract, Fetch, FetchError, InvalidDocument, Page};
use thiserror::Error;
use tokio::time;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Invalid(InvalidDocument),
}

/// Fetches and extracts one random page per call.
#[derive(Clone)]
pub struct Sampler {
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extract>,
    url: String,
    timeout: Duration,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Sampler {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        extractor: Arc<dyn Extract>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn sample(&self) -> Result<Page, SampleError> {
        let document = match time::timeout(self.timeout, self.fetcher.fetch(&self.url)).await {
            Ok(fetched) => fetched.map_err(SampleError::Fetch)?,
            Err(_) => {
                return Err(SampleError::Fetch(FetchError::Timeout {
                    url: self.url.clone(),
                }))
            }
        };
        self.extractor
            .extract(&document)
            .map_err(SampleError::Invalid)
    }
}
