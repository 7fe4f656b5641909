use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use common::{Page, TableSet};
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::{sampler::Sampler, store};

/// What a worker tells the coordinator, in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Parsed { worker: usize, documents: u64 },
    Written { worker: usize, file: Option<PathBuf> },
}

#[derive(Debug)]
pub struct Worker {
    index: usize,
    run_time: Duration,
    sampler: Sampler,
    path: PathBuf,
    signals: UnboundedSender<Signal>,

    tables: TableSet,
    documents: u64,
}

impl Worker {
    pub fn new(
        index: usize,
        run_time: Duration,
        sampler: Sampler,
        path: PathBuf,
        signals: UnboundedSender<Signal>,
    ) -> Self {
        Self {
            index,
            run_time,
            sampler,
            path,
            signals,
            tables: TableSet::new(),
            documents: 0,
        }
    }

    pub async fn run(mut self) {
        let start = Instant::now();
        while start.elapsed() < self.run_time {
            match self.sampler.sample().await {
                Ok(page) => self.record(&page),
                Err(e) => debug!("worker {} skipped a document: {}", self.index, e),
            }
        }
        info!(
            "worker {} parsed {} documents in {:.1}s",
            self.index,
            self.documents,
            start.elapsed().as_secs_f64()
        );

        self.signal(Signal::Parsed {
            worker: self.index,
            documents: self.documents,
        });

        let file = match store::save(&self.path, &self.tables).await {
            Ok(()) => Some(self.path.clone()),
            Err(e) => {
                warn!("worker {} could not save its results: {:?}", self.index, e);
                None
            }
        };

        self.signal(Signal::Written {
            worker: self.index,
            file,
        });
    }

    fn record(&mut self, page: &Page) {
        self.tables.words.add_many(page.words_lowercase());
        self.tables.headings.add_many(&page.headings);
        self.tables.titles.add_many(page.title_words());
        self.documents += 1;
    }

    fn signal(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            warn!("worker {}: coordinator is gone", self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::tests::{sampler, FakeExtractor, FakeFetcher};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn worker_signals_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker-0.txt");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sampler = sampler(
            FakeFetcher {
                fail_every: 3,
                ..Default::default()
            },
            FakeExtractor { invalid_every: 5 },
        );
        let worker = Worker::new(0, Duration::from_millis(30), sampler, path.clone(), tx);
        worker.run().await;

        let documents = match rx.recv().await {
            Some(Signal::Parsed {
                worker: 0,
                documents,
            }) => documents,
            other => panic!("unexpected signal: {:?}", other),
        };
        assert_eq!(
            rx.recv().await,
            Some(Signal::Written {
                worker: 0,
                file: Some(path.clone()),
            })
        );
        assert_eq!(rx.recv().await, None);

        assert!(documents > 0);
        let tables = store::load(&path).await.unwrap();
        assert_eq!(tables.words.get("the"), Some(2 * documents));
        assert_eq!(tables.words.get("cat"), Some(documents));
        assert_eq!(tables.words.get("The"), None);
        assert_eq!(tables.headings.get("See also"), Some(documents));
        assert_eq!(tables.titles.get("the"), Some(documents));
    }

    #[tokio::test]
    async fn failed_write_still_signals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("worker-1.txt");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sampler = sampler(FakeFetcher::default(), FakeExtractor::default());
        Worker::new(1, Duration::from_millis(5), sampler, path, tx)
            .run()
            .await;

        assert!(matches!(rx.recv().await, Some(Signal::Parsed { worker: 1, .. })));
        assert_eq!(
            rx.recv().await,
            Some(Signal::Written {
                worker: 1,
                file: None
            })
        );
    }
}
