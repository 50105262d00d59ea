use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::lcapi::RepositorySource;
use crate::models::{BackupOutcome, BackupSnapshot, RepositorySummary};

const MAX_NAME_ATTEMPTS: u32 = 100;

/// Snapshots every repository visible to `source` into a new JSON file under `backup_dir`.
///
/// Never fails: errors are logged and reported through the returned [`BackupOutcome`].
pub async fn backup_repositories(
    source: &dyn RepositorySource,
    backup_dir: &Path,
    now: NaiveDateTime,
) -> BackupOutcome {
    match write_snapshot(source, backup_dir, now).await {
        Ok((backup_file, repos)) => {
            log::info!("[backup_repositories] Backed up {repos} repositories to {backup_file}");
            BackupOutcome::succeeded(backup_file, repos)
        }
        Err(err) => {
            log::error!("[backup_repositories] Backup failed: {err:#}");
            BackupOutcome::failed(format!("{err:#}"))
        }
    }
}

/// `github_backup_YYYYmmdd_HHMMSS.json`
pub fn backup_filename(now: NaiveDateTime) -> String {
    format!("github_backup_{}.json", now.format("%Y%m%d_%H%M%S"))
}

async fn write_snapshot(
    source: &dyn RepositorySource,
    backup_dir: &Path,
    now: NaiveDateTime,
) -> Result<(String, usize)> {
    let user = source.login().await.context("Could not fetch account login")?;
    let repositories: Vec<RepositorySummary> = source
        .list_repositories()
        .await
        .context("Could not list repositories")?
        .into_iter()
        .map(RepositorySummary::from)
        .collect();

    let snapshot = BackupSnapshot {
        timestamp: now,
        total_repos: repositories.len(),
        user,
        repositories,
    };
    let serialized = serde_json::to_string_pretty(&snapshot)?;

    fs::create_dir_all(backup_dir)
        .await
        .with_context(|| format!("Could not create backup directory {}", backup_dir.display()))?;

    let filename = create_unique(backup_dir, now, serialized.as_bytes()).await?;
    Ok((filename, snapshot.total_repos))
}

/// Writes `contents` to a file that did not exist before. A second backup within the same
/// second gets a numeric suffix instead of replacing the first.
async fn create_unique(backup_dir: &Path, now: NaiveDateTime, contents: &[u8]) -> Result<String> {
    let base = backup_filename(now);
    let stem = base.trim_end_matches(".json");

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let filename = match attempt {
            0 => base.clone(),
            n => format!("{stem}_{n}.json"),
        };
        let path = backup_dir.join(&filename);

        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => {
                fill_or_remove(&path, file, contents).await?;
                return Ok(filename);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("Could not create {}", path.display()));
            }
        }
    }

    Err(anyhow!("{MAX_NAME_ATTEMPTS} backups named {base} already exist in {}", backup_dir.display()))
}

/// Writes `contents` into the freshly created `file`, deleting `path` if the write fails.
async fn fill_or_remove<W: AsyncWrite + Unpin>(path: &Path, mut file: W, contents: &[u8]) -> Result<()> {
    let written = async {
        file.write_all(contents).await?;
        file.flush().await
    }
    .await;

    if let Err(err) = written {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path).await {
            log::warn!("[fill_or_remove] Could not remove partial {}: {remove_err}", path.display());
        }
        return Err(err).with_context(|| format!("Could not write {}", path.display()));
    }

    Ok(())
}
