use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::platform;

/// Durable list of files this tool has placed in the cache tier.
///
/// Plain text, one absolute path per line. Appends are serialized in-process
/// by a mutex and across processes by an exclusive advisory lock on the file,
/// so concurrent movers never interleave partial lines. The only other write
/// is `remove_many`, a full rewrite done between move passes.
#[derive(Debug)]
pub struct ExcludeLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ExcludeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &Path) -> Result<(), Error> {
        if platform::path_bytes(entry).contains(&b'\n') {
            return Err(Error::Other(format!(
                "Cannot record {:?} in ledger: path contains a newline",
                entry
            )));
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|e| Error::Other(format!("Ledger lock poisoned: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let written = write_entry(&mut file, entry);
        let _ = file.unlock();
        written?;

        debug!("Ledger += {}", entry.display());
        Ok(())
    }

    /// Every entry in file order. Duplicates are kept; callers treat the
    /// result as a set. A missing or unreadable ledger reads as empty.
    pub fn read_all(&self) -> Vec<PathBuf> {
        match self.try_read_all() {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Could not read ledger {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Entries with duplicates removed, first occurrence order.
    pub fn unique_entries(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.read_all()
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    fn try_read_all(&self) -> io::Result<Vec<PathBuf>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.split(b'\n') {
            let line = line?;
            let trimmed = line.trim_ascii();
            if !trimmed.is_empty() {
                entries.push(platform::path_from_bytes(trimmed));
            }
        }
        Ok(entries)
    }

    /// Rewrite the ledger without `paths`. Returns how many lines were dropped.
    pub fn remove_many(&self, paths: &[PathBuf]) -> Result<usize, Error> {
        if paths.is_empty() {
            return Ok(0);
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|e| Error::Other(format!("Ledger lock poisoned: {}", e)))?;

        let current = match self.try_read_all() {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Ledger {} does not exist, nothing to remove", self.path.display());
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let to_remove: HashSet<&PathBuf> = paths.iter().collect();
        let kept: Vec<&PathBuf> = current.iter().filter(|p| !to_remove.contains(p)).collect();
        let removed = current.len() - kept.len();

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.lock_exclusive()?;
            for entry in &kept {
                write_entry(&mut tmp, entry)?;
            }
            tmp.sync_all()?;
            let _ = tmp.unlock();
        }
        fs::rename(&tmp_path, &self.path)?;

        info!("Removed {} entries from ledger", removed);
        Ok(removed)
    }
}

/// One entry per line, raw path bytes so names that are not valid UTF-8
/// survive a rewrite unchanged.
fn write_entry(out: &mut impl Write, entry: &Path) -> io::Result<()> {
    let mut line = platform::path_bytes(entry).into_owned();
    line.push(b'\n');
    out.write_all(&line)
}
