use std::{
    fmt,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use common::{thousands, TableSet};
use dashmap::DashMap;
use eyre::{Result, WrapErr};
use futures::future::join_all;
use itertools::Itertools;
use log::{error, info, warn};
use tokio::{
    fs,
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    barrier::Barrier,
    sampler::Sampler,
    store::{self, CUMULATIVE_FILE, RUN_LOG_FILE},
    worker::{Signal, Worker},
};

const RANKED_FILES: [(&str, &str); 3] = [
    ("article-words.txt", "Words in article:"),
    ("headings.txt", "Headings:"),
    ("title-words.txt", "Words in titles:"),
];

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_time: Duration,
    pub workers: usize,
    /// Delete worker files once merged.
    pub cleanup: bool,
    /// Write ranked report files.
    pub output: bool,
    /// Resume from and save to the cumulative file.
    pub cumulative: bool,
    pub results_dir: PathBuf,
    /// Entries shown per table in the summary.
    pub top: usize,
}

impl RunConfig {
    pub fn new(run_time: Duration, workers: usize, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_time,
            workers,
            cleanup: false,
            output: false,
            cumulative: false,
            results_dir: results_dir.into(),
            top: 10,
        }
    }

    pub fn cumulative_file(&self) -> PathBuf {
        self.results_dir.join(CUMULATIVE_FILE)
    }
}

#[derive(Debug)]
pub struct Coordinator {
    config: RunConfig,
    sampler: Sampler,
    run_id: String,
    started: Instant,

    barrier: Barrier,
    tables: TableSet,
    worker_files: DashMap<usize, PathBuf>,
}

impl Coordinator {
    pub fn new(config: RunConfig, sampler: Sampler) -> Self {
        let barrier = Barrier::new(config.workers);
        Self {
            config,
            sampler,
            run_id: Uuid::new_v4().to_simple().to_string(),
            started: Instant::now(),
            barrier,
            tables: TableSet::new(),
            worker_files: DashMap::new(),
        }
    }

    pub fn worker_file(&self, index: usize) -> PathBuf {
        store::worker_file(&self.config.results_dir, index, &self.run_id)
    }

    /// Loads previous results if asked to, then starts every worker and
    /// returns without waiting for them.
    pub async fn launch(mut self) -> Result<Run> {
        fs::create_dir_all(&self.config.results_dir)
            .await
            .wrap_err_with(|| format!("create {}", self.config.results_dir.display()))?;

        self.started = Instant::now();
        if self.config.cumulative {
            info!("Loading previous results...");
            self.tables = load_cumulative(&self.config.cumulative_file()).await;
            info!("Done loading in {:.1} seconds", self.elapsed_secs());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handles = (0..self.config.workers)
            .map(|index| {
                let worker = Worker::new(
                    index,
                    self.config.run_time,
                    self.sampler.clone(),
                    self.worker_file(index),
                    tx.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect_vec();
        drop(tx);

        info!(
            "Parsing random articles with {} workers for {:.1} seconds...",
            self.config.workers,
            self.config.run_time.as_secs_f64()
        );
        Ok(Run {
            coordinator: self,
            signals: rx,
            handles,
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub async fn notify_parsing_done(&self, documents: u64) {
        if let Some(total) = self.barrier.parsing_done(documents).await {
            info!(
                "Done parsing {} articles in {:.1} seconds",
                thousands(total),
                self.elapsed_secs()
            );
            info!("Writing results...");
        }
    }

    /// True for the single call that completes the writing phase.
    pub async fn notify_writing_done(&self) -> bool {
        let crossed = self.barrier.writing_done().await;
        if crossed {
            info!("Done writing in {:.1} seconds", self.elapsed_secs());
        }
        crossed
    }

    /// Folds every worker file into the global tables, in worker order.
    async fn merge(&mut self) -> usize {
        let files = (0..self.config.workers)
            .map(|index| (index, self.worker_files.get(&index).map(|f| f.value().clone())))
            .collect_vec();
        merge_files(&mut self.tables, files, self.config.cleanup).await
    }

    async fn save_cumulative(&self) -> Result<()> {
        store::save(&self.config.cumulative_file(), &self.tables).await
    }

    async fn save_ranked(&self) -> Result<()> {
        let tables = [
            &self.tables.words,
            &self.tables.headings,
            &self.tables.titles,
        ];
        for ((name, header), table) in RANKED_FILES.iter().zip(tables.iter()) {
            let path = self.config.results_dir.join(name);
            store::write_ranked(&path, header, &table.ranked()).await?;
        }
        Ok(())
    }
}

async fn load_cumulative(path: &Path) -> TableSet {
    match store::load_optional(path).await {
        Ok(Some(tables)) => tables,
        Ok(None) => {
            info!("no previous results at {}, starting fresh", path.display());
            TableSet::new()
        }
        Err(e) => {
            warn!("ignoring previous results: {:?}", e);
            TableSet::new()
        }
    }
}

/// Merges each listed worker file into `tables`. Files that are missing or
/// malformed contribute nothing. Returns how many files were merged.
pub async fn merge_files<I>(tables: &mut TableSet, files: I, cleanup: bool) -> usize
where
    I: IntoIterator<Item = (usize, Option<PathBuf>)>,
{
    let mut merged = 0;
    for (index, file) in files {
        let path = match file {
            Some(path) => path,
            None => {
                warn!("worker {} left no results", index);
                continue;
            }
        };

        match store::load(&path).await {
            Ok(worker_tables) => {
                tables.merge(&worker_tables);
                merged += 1;
            }
            Err(e) => warn!("discarding results of worker {}: {:?}", index, e),
        }

        if cleanup {
            if let Err(e) = store::remove(&path).await {
                warn!("cleanup: {:?}", e);
            }
        }
    }
    merged
}

/// A launched run. [`Run::finish`] drives it to the end.
#[derive(Debug)]
pub struct Run {
    coordinator: Coordinator,
    signals: UnboundedReceiver<Signal>,
    handles: Vec<JoinHandle<()>>,
}

impl Run {
    /// Waits for both barriers, merges, persists and reports.
    pub async fn finish(mut self) -> Result<Summary> {
        let mut crossed = false;
        while let Some(signal) = self.signals.recv().await {
            match signal {
                Signal::Parsed { documents, .. } => {
                    self.coordinator.notify_parsing_done(documents).await
                }
                Signal::Written { worker, file } => {
                    if let Some(file) = file {
                        self.coordinator.worker_files.insert(worker, file);
                    }
                    if self.coordinator.notify_writing_done().await {
                        crossed = true;
                        break;
                    }
                }
            }
        }

        for joined in join_all(self.handles.drain(..)).await {
            if let Err(e) = joined {
                error!("worker task failed: {}", e);
            }
        }
        if !crossed {
            error!(
                "workers exited before all of them reported, merging {} files",
                self.coordinator.worker_files.len()
            );
        }

        let coordinator = &mut self.coordinator;
        let config = coordinator.config.clone();

        info!("Loading results...");
        let merged = coordinator.merge().await;
        info!(
            "Done loading {} of {} worker files in {:.1} seconds",
            merged,
            config.workers,
            coordinator.elapsed_secs()
        );
        if config.cleanup {
            info!("Done cleaning in {:.1} seconds", coordinator.elapsed_secs());
        }

        if config.cumulative {
            info!("Saving to cumulative file...");
            match coordinator.save_cumulative().await {
                Ok(()) => info!("Done saving in {:.1} seconds", coordinator.elapsed_secs()),
                Err(e) => warn!("could not save cumulative results: {:?}", e),
            }
        }

        if config.output {
            info!("Saving results to file...");
            match coordinator.save_ranked().await {
                Ok(()) => info!("Done saving in {:.1} seconds", coordinator.elapsed_secs()),
                Err(e) => warn!("could not save ranked results: {:?}", e),
            }
        }

        let summary = Summary {
            workers: config.workers,
            documents: coordinator.barrier.documents().await,
            elapsed: coordinator.started.elapsed(),
            merged,
            top: config.top,
            tables: std::mem::take(&mut coordinator.tables),
        };

        let log = config.results_dir.join(RUN_LOG_FILE);
        if let Err(e) = store::append_line(&log, &summary.log_line()).await {
            warn!("could not append to run log: {:?}", e);
        }
        Ok(summary)
    }
}

/// Outcome of a run.
#[derive(Debug)]
pub struct Summary {
    pub workers: usize,
    pub documents: u64,
    pub elapsed: Duration,
    /// Worker files that made it into the merge.
    pub merged: usize,
    pub top: usize,
    pub tables: TableSet,
}

impl Summary {
    /// Documents per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.documents as f64 / secs
        } else {
            0.0
        }
    }

    pub fn log_line(&self) -> String {
        format!(
            "{} threads\t{:.0} seconds\t{:.1} articles per second",
            thousands(self.workers as u64),
            self.elapsed.as_secs_f64(),
            self.rate()
        )
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Parsed {} articles in {:.1} seconds!",
            thousands(self.documents),
            self.elapsed.as_secs_f64()
        )?;
        writeln!(f, "Parsed {:.2} articles per second!", self.rate())?;

        let sections = [
            ("words", &self.tables.words),
            ("headings", &self.tables.headings),
            ("title words", &self.tables.titles),
        ];
        for (name, table) in sections.iter() {
            writeln!(f)?;
            writeln!(f, "Top {} {}:", self.top, name)?;
            for entry in table.top_k(self.top) {
                writeln!(f, "{}", entry)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::tests::{sampler, FakeExtractor, FakeFetcher};
    use common::WordCount;
    use rand::seq::SliceRandom;

    fn config(dir: &Path, workers: usize) -> RunConfig {
        RunConfig::new(Duration::from_millis(60), workers, dir)
    }

    fn fake_sampler() -> Sampler {
        sampler(
            FakeFetcher {
                fail_every: 4,
                delay: Duration::from_millis(1),
                ..Default::default()
            },
            FakeExtractor { invalid_every: 7 },
        )
    }

    fn worker_files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("worker-"))
            .count()
    }

    async fn run(config: RunConfig) -> Summary {
        Coordinator::new(config, fake_sampler())
            .launch()
            .await
            .unwrap()
            .finish()
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merges_every_worker() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(config(dir.path(), 4)).await;

        assert_eq!(summary.workers, 4);
        assert_eq!(summary.merged, 4);
        assert!(summary.documents > 0);

        let docs = summary.documents;
        assert_eq!(summary.tables.words.get("cat"), Some(docs));
        assert_eq!(summary.tables.words.get("the"), Some(2 * docs));
        assert_eq!(summary.tables.headings.get("History"), Some(docs));
        assert_eq!(summary.tables.titles.get("cat"), Some(docs));

        assert_eq!(worker_files_in(dir.path()), 4);
        let log = std::fs::read_to_string(dir.path().join(RUN_LOG_FILE)).unwrap();
        assert!(log.starts_with("4 threads\t"));

        let report = summary.to_string();
        assert!(report.contains("Top 10 words:"));
        assert!(report.contains(&WordCount::new("the", 2 * docs).to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cleanup_removes_worker_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 3);
        config.cleanup = true;
        let summary = run(config).await;

        assert_eq!(summary.merged, 3);
        assert_eq!(worker_files_in(dir.path()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cumulative_runs_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 2);
        config.cumulative = true;
        config.cleanup = true;

        let first = run(config.clone()).await;
        let second = run(config.clone()).await;

        let docs = first.documents + second.documents;
        assert_eq!(second.tables.words.get("cat"), Some(docs));
        assert_eq!(second.tables.titles.get("the"), Some(docs));

        let saved = store::load(&config.cumulative_file()).await.unwrap();
        assert_eq!(saved, second.tables);

        let log = std::fs::read_to_string(dir.path().join(RUN_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_cumulative_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 1);
        config.cumulative = true;
        std::fs::write(config.cumulative_file(), "5\ncat\n1000\n").unwrap();

        let summary = run(config.clone()).await;
        assert_eq!(summary.tables.words.get("cat"), Some(summary.documents));

        let saved = store::load(&config.cumulative_file()).await.unwrap();
        assert_eq!(saved.words.get("cat"), Some(summary.documents));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ranked_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 2);
        config.output = true;
        let summary = run(config).await;

        for (name, header) in RANKED_FILES.iter() {
            let text = std::fs::read_to_string(dir.path().join(name)).unwrap();
            assert_eq!(text.lines().next(), Some(*header));
        }
        let words = std::fs::read_to_string(dir.path().join("article-words.txt")).unwrap();
        let first = words.lines().nth(1).unwrap();
        assert!(first.starts_with("the "));
        assert!(first.ends_with(&thousands(2 * summary.documents)));
    }

    #[tokio::test]
    async fn signals_in_any_order_merge_once() {
        let dir = tempfile::tempdir().unwrap();
        let workers = 6;
        let coordinator = Coordinator::new(config(dir.path(), workers), fake_sampler());

        let mut signals = Vec::new();
        for index in 0..workers {
            let only = format!("only{}", index);
            let mut tables = TableSet::new();
            tables.words.add_many(&["shared", only.as_str()]);
            let path = coordinator.worker_file(index);
            store::save(&path, &tables).await.unwrap();
            signals.push(Signal::Parsed {
                worker: index,
                documents: 1,
            });
            signals.push(Signal::Written {
                worker: index,
                file: Some(path),
            });
        }

        // any interleaving where each worker's Parsed precedes its Written
        signals.shuffle(&mut rand::thread_rng());
        for index in 0..workers {
            let parsed = signals
                .iter()
                .position(|s| matches!(s, Signal::Parsed { worker, .. } if *worker == index))
                .unwrap();
            let written = signals
                .iter()
                .position(|s| matches!(s, Signal::Written { worker, .. } if *worker == index))
                .unwrap();
            if parsed > written {
                signals.swap(parsed, written);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for signal in signals {
            tx.send(signal).unwrap();
        }
        // a duplicate arrival after the barrier must not merge again
        tx.send(Signal::Written {
            worker: 0,
            file: Some(coordinator.worker_file(0)),
        })
        .unwrap();

        let run = Run {
            coordinator,
            signals: rx,
            handles: Vec::new(),
        };
        let summary = run.finish().await.unwrap();

        assert_eq!(summary.documents, workers as u64);
        assert_eq!(summary.merged, workers);
        assert_eq!(summary.tables.words.get("shared"), Some(workers as u64));
        for index in 0..workers {
            assert_eq!(summary.tables.words.get(&format!("only{}", index)), Some(1));
        }
    }

    #[tokio::test]
    async fn malformed_worker_file_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("worker-0.txt");
        let short = dir.path().join("worker-1.txt");

        let mut tables = TableSet::new();
        tables.words.add_many(&["a", "a", "b"]);
        store::save(&good, &tables).await.unwrap();
        std::fs::write(&short, "3\na\n1\nb\n2\n0\n0\n").unwrap();

        let mut globals = TableSet::new();
        globals.words.add_many(&["c"]);
        let files = vec![
            (0, Some(good.clone())),
            (1, Some(short.clone())),
            (2, None),
            (3, Some(dir.path().join("worker-3.txt"))),
        ];
        let merged = merge_files(&mut globals, files, true).await;

        assert_eq!(merged, 1);
        assert_eq!(globals.words.get("a"), Some(2));
        assert_eq!(globals.words.get("b"), Some(1));
        assert_eq!(globals.words.get("c"), Some(1));
        assert!(!good.exists());
        assert!(!short.exists());
    }
}
