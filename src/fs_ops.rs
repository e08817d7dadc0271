use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeUnit {
    KB,
    MB,
    GB,
    TB,
}

impl SizeUnit {
    fn exponent(self) -> i32 {
        match self {
            SizeUnit::KB => 1,
            SizeUnit::MB => 2,
            SizeUnit::GB => 3,
            SizeUnit::TB => 4,
        }
    }
}

/// An amount of storage in a human-scale unit (base 1024).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub amount: f64,
    pub unit: SizeUnit,
}

impl Size {
    pub fn new(amount: f64, unit: SizeUnit) -> Self {
        Self { amount, unit }
    }

    pub fn from_bytes(bytes: u64) -> Self {
        let bytes = bytes as f64;
        let unit = [SizeUnit::TB, SizeUnit::GB, SizeUnit::MB]
            .into_iter()
            .find(|unit| bytes >= 1024f64.powi(unit.exponent()))
            .unwrap_or(SizeUnit::KB);
        Self {
            amount: bytes / 1024f64.powi(unit.exponent()),
            unit,
        }
    }

    pub fn bytes(&self) -> u64 {
        (self.amount * 1024f64.powi(self.unit.exponent())).round() as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {:?}", self.amount, self.unit)
    }
}

/// The filesystem operations the tiering core needs.
///
/// `LocalFileOps` is the real implementation; tests substitute instrumented
/// versions to observe concurrency or inject failures.
pub trait FileOps: Send + Sync {
    /// Move `src` into `dest_dir`, keeping its name, permissions, ownership
    /// and modification time. Returns the destination file path.
    fn move_file(&self, src: &Path, dest_dir: &Path) -> io::Result<PathBuf>;

    /// Create `dir` (and missing ancestors) with the configured permission
    /// bits, owned like `reference` where the platform allows it.
    fn create_dir_with_permissions(&self, dir: &Path, reference: &Path) -> io::Result<()>;

    fn free_space(&self, path: &Path) -> io::Result<Size>;

    /// Combined size of the files that exist; missing files count as zero.
    fn total_size(&self, files: &[PathBuf]) -> Size;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileOps {
    permissions: u32,
}

impl LocalFileOps {
    pub fn new(permissions: u32) -> Self {
        Self { permissions }
    }
}

impl Default for LocalFileOps {
    fn default() -> Self {
        Self::new(0o777)
    }
}

impl FileOps for LocalFileOps {
    fn move_file(&self, src: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
        let file_name = src.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", src.display()),
            )
        })?;
        let dest = dest_dir.join(file_name);

        match fs::rename(src, &dest) {
            Ok(()) => return Ok(dest),
            Err(e) => debug!(
                "Rename {} -> {} failed ({}), copying instead",
                src.display(),
                dest.display(),
                e
            ),
        }

        copy_preserving(src, &dest)?;
        fs::remove_file(src)?;
        Ok(dest)
    }

    fn create_dir_with_permissions(&self, dir: &Path, reference: &Path) -> io::Result<()> {
        let missing: Vec<&Path> = dir.ancestors().take_while(|p| !p.exists()).collect();
        if missing.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(dir)?;

        for created in missing.iter().rev() {
            platform::set_mode(created, self.permissions)?;
            if reference.exists() {
                if let Err(e) = platform::copy_ownership(reference, created) {
                    debug!("Could not set owner of {}: {}", created.display(), e);
                }
            }
        }
        Ok(())
    }

    fn free_space(&self, path: &Path) -> io::Result<Size> {
        fs2::available_space(path).map(Size::from_bytes)
    }

    fn total_size(&self, files: &[PathBuf]) -> Size {
        let bytes = files
            .iter()
            .filter_map(|f| match fs::metadata(f) {
                Ok(m) => Some(m.len()),
                Err(e) => {
                    warn!("Could not read size of {}: {}", f.display(), e);
                    None
                }
            })
            .sum();
        Size::from_bytes(bytes)
    }
}

/// Copy through a hidden partial file so an interrupted copy never leaves a
/// destination that looks complete.
fn copy_preserving(src: &Path, dest: &Path) -> io::Result<()> {
    let partial = dest.with_file_name(format!(
        ".{}.partial",
        dest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    ));

    let result = (|| {
        fs::copy(src, &partial)?;
        let modified = fs::metadata(src)?.modified()?;
        File::options().write(true).open(&partial)?.set_modified(modified)?;
        if let Err(e) = platform::copy_ownership(src, &partial) {
            debug!("Could not preserve owner of {}: {}", src.display(), e);
        }
        fs::rename(&partial, dest)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}
