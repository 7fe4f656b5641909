//! Files shared between workers and the coordinator.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use common::{thousands, RankedTable, TableSet};
use eyre::{Result, WrapErr};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use uuid::Uuid;

pub const CUMULATIVE_FILE: &str = "cumulative-results.txt";
pub const RUN_LOG_FILE: &str = "threads.txt";

pub fn worker_file(dir: &Path, index: usize, run_id: &str) -> PathBuf {
    dir.join(format!("worker-{}-{}.txt", index, run_id))
}

fn temp_file(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

/// Replaces `path` with `contents`. Readers see either the old file or the
/// complete new one.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_file(path);
    let written = async {
        let mut temp = File::create(&temp_path)
            .await
            .wrap_err_with(|| format!("create {}", temp_path.display()))?;
        temp.write_all(contents)
            .await
            .wrap_err_with(|| format!("write {}", temp_path.display()))?;
        // sync
        temp.sync_all()
            .await
            .wrap_err_with(|| format!("sync {}", temp_path.display()))?;
        drop(temp);
        // rename
        fs::rename(&temp_path, path)
            .await
            .wrap_err_with(|| format!("rename into {}", path.display()))
    }
    .await;

    if written.is_err() {
        // never leave a partial temp file behind
        let _ = fs::remove_file(&temp_path).await;
    }
    written
}

pub async fn save(path: &Path, tables: &TableSet) -> Result<()> {
    write_atomic(path, &tables.to_bytes()).await
}

pub async fn load(path: &Path) -> Result<TableSet> {
    let content = fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("read {}", path.display()))?;
    TableSet::read_from(content.as_bytes()).wrap_err_with(|| format!("decode {}", path.display()))
}

/// Like [`load`], but a missing file is `Ok(None)`.
pub async fn load_optional(path: &Path) -> Result<Option<TableSet>> {
    match fs::metadata(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        _ => load(path).await.map(Some),
    }
}

pub async fn remove(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .await
        .wrap_err_with(|| format!("remove {}", path.display()))
}

pub fn render_ranked(header: &str, table: &RankedTable) -> String {
    let mut out = format!("{}\n", header);
    for entry in table {
        out.push_str(&format!(
            "{:<15} {}\n",
            entry.word,
            thousands(entry.occurrences)
        ));
    }
    out
}

pub async fn write_ranked(path: &Path, header: &str, table: &RankedTable) -> Result<()> {
    write_atomic(path, render_ranked(header, table).as_bytes()).await
}

pub async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .wrap_err_with(|| format!("open {}", path.display()))?;
    file.write_all(format!("{}\n", line).as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
