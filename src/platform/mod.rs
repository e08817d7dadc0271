#[cfg(unix)]
pub mod unix;

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

/// Give `target` the owner and group of `reference`.
#[cfg(unix)]
pub fn copy_ownership(reference: &Path, target: &Path) -> io::Result<()> {
    unix::copy_ownership(reference, target)
}

#[cfg(not(unix))]
pub fn copy_ownership(_reference: &Path, _target: &Path) -> io::Result<()> {
    Ok(())
}

/// Apply permission bits (e.g. `0o777`) to `path`.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    unix::set_mode(path, mode)
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Raw bytes of a path as stored on disk.
#[cfg(unix)]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    unix::path_bytes(path)
}

#[cfg(not(unix))]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    unix::path_from_bytes(bytes)
}

#[cfg(not(unix))]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
