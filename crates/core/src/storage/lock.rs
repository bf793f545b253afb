use anyhow::Context;
use chrono::{NaiveDate, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive marker for one date's batch run, removed on drop.
///
/// Created with `create_new`, so only one process can hold it. A crashed run leaves the file
/// behind; it must be removed by hand before that date can run again.
#[derive(Debug)]
pub struct DateLock {
    path: PathBuf,
    released: bool,
}

fn lock_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!(".recommendation_{date}.lock"))
}

/// `Ok(None)` when another run already holds the lock for `date`.
pub fn try_acquire_date_lock(dir: &Path, date: NaiveDate) -> anyhow::Result<Option<DateLock>> {
    let path = lock_path(dir, date);
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to create lock {}", path.display()))
        }
    };

    writeln!(file, "pid={} acquired_at={}", std::process::id(), Utc::now().to_rfc3339())
        .with_context(|| format!("failed to write lock {}", path.display()))?;

    Ok(Some(DateLock {
        path,
        released: false,
    }))
}

impl DateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> anyhow::Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path)
            .with_context(|| format!("failed to release lock {}", self.path.display()))
    }
}

impl Drop for DateLock {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
            }
        }
    }
}
