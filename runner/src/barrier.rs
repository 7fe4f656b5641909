use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Counts {
    parsed: usize,
    written: usize,
    documents: u64,
}

/// Two-phase arrival counter shared by the coordinator's callbacks.
///
/// Every increment and its threshold check happen under one lock, so each
/// phase is crossed by exactly one caller.
#[derive(Debug)]
pub struct Barrier {
    parties: usize,
    counts: Mutex<Counts>,
}

impl Barrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            counts: Mutex::new(Counts::default()),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Records one worker's parsed-document count. Returns the total once,
    /// to the caller that completes the phase.
    pub async fn parsing_done(&self, documents: u64) -> Option<u64> {
        let mut counts = self.counts.lock().await;
        counts.documents += documents;
        counts.parsed += 1;
        if counts.parsed == self.parties {
            Some(counts.documents)
        } else {
            None
        }
    }

    /// Records one worker's file write. True for exactly one caller.
    pub async fn writing_done(&self) -> bool {
        let mut counts = self.counts.lock().await;
        counts.written += 1;
        counts.written == self.parties
    }

    pub async fn documents(&self) -> u64 {
        self.counts.lock().await.documents
    }

    pub async fn writing_crossed(&self) -> bool {
        self.counts.lock().await.written >= self.parties
    }
}

#[cfg(test)]
mod tests {
    use super::Barrier;
    use futures::future::join_all;
    use rand::Rng;
    use std::{sync::Arc, time::Duration};
    use tokio::time;

    #[tokio::test]
    async fn barrier() {
        let barrier = Barrier::new(2);
        assert_eq!(barrier.parsing_done(3).await, None);
        assert_eq!(barrier.parsing_done(4).await, Some(7));
        assert_eq!(barrier.writing_done().await, false);
        assert_eq!(barrier.writing_crossed().await, false);
        assert_eq!(barrier.writing_done().await, true);
        assert_eq!(barrier.writing_crossed().await, true);

        // a straggler past the threshold never crosses again
        assert_eq!(barrier.writing_done().await, false);
        assert_eq!(barrier.documents().await, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exactly_one_crossing() {
        for parties in [1usize, 2, 7, 32].iter().copied() {
            let barrier = Arc::new(Barrier::new(parties));

            let arrivals = (0..parties).map(|i| {
                let barrier = Arc::clone(&barrier);
                let delay = rand::thread_rng().gen_range(0..20);
                tokio::spawn(async move {
                    time::sleep(Duration::from_millis(delay)).await;
                    let parsed = barrier.parsing_done(i as u64).await.is_some();
                    time::sleep(Duration::from_millis(delay / 2)).await;
                    let written = barrier.writing_done().await;
                    (parsed, written)
                })
            });

            let results: Vec<_> = join_all(arrivals)
                .await
                .into_iter()
                .map(|r| r.unwrap())
                .collect();

            assert_eq!(results.iter().filter(|(p, _)| *p).count(), 1);
            assert_eq!(results.iter().filter(|(_, w)| *w).count(), 1);
            let expected: u64 = (0..parties as u64).sum();
            assert_eq!(barrier.documents().await, expected);
        }
    }
}
