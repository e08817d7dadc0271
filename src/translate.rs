use std::path::PathBuf;
use tracing::debug;

use crate::error::Error;

/// Maps media-server paths onto the real filesystem namespace.
///
/// A path under `source_root` has that prefix replaced with `real_root`, then
/// the first library-folder mapping whose source folder occurs in the
/// remainder is applied once. Anything else passes through untouched, which
/// makes translating an already-translated path a no-op.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    source_root: Option<String>,
    real_root: String,
    folder_map: Vec<(String, String)>,
}

impl PathTranslator {
    pub fn new(
        source_root: Option<&str>,
        real_root: &str,
        source_folders: &[String],
        real_folders: &[String],
    ) -> Result<Self, Error> {
        if source_folders.len() != real_folders.len() {
            return Err(Error::InvalidConfig(format!(
                "library folder mapping has {} source folders but {} destination folders",
                source_folders.len(),
                real_folders.len()
            )));
        }

        let folder_map = source_folders
            .iter()
            .zip(real_folders)
            .map(|(from, to)| (strip_slashes(from), strip_slashes(to)))
            .filter(|(from, _)| !from.is_empty())
            .collect();

        Ok(Self {
            source_root: source_root
                .filter(|s| !s.trim().is_empty())
                .map(with_trailing_slash),
            real_root: with_trailing_slash(real_root),
            folder_map,
        })
    }

    /// A translator that passes every path through.
    pub fn identity() -> Self {
        Self {
            source_root: None,
            real_root: String::new(),
            folder_map: Vec::new(),
        }
    }

    pub fn translate<S: AsRef<str>>(&self, paths: &[S]) -> Vec<PathBuf> {
        paths.iter().map(|p| self.translate_one(p.as_ref())).collect()
    }

    pub fn translate_one(&self, path: &str) -> PathBuf {
        let Some(rest) = self
            .source_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root))
        else {
            return PathBuf::from(path);
        };

        let rest = match self.folder_map.iter().find(|(from, _)| rest.contains(from.as_str())) {
            Some((from, to)) => rest.replacen(from.as_str(), to, 1),
            None => rest.to_string(),
        };

        let translated = PathBuf::from(format!("{}{}", self.real_root, rest));
        debug!("Translated {} -> {}", path, translated.display());
        translated
    }
}

/// Ensure a POSIX root carries a leading and trailing slash. Windows-style
/// roots (containing a drive colon) are left alone.
pub fn with_trailing_slash(value: &str) -> String {
    let mut value = value.trim().to_string();
    if value.contains(':') {
        return value;
    }
    if !value.starts_with('/') {
        value.insert(0, '/');
    }
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

fn strip_slashes(value: &str) -> String {
    value.trim_matches(|c| c == '/' || c == '\\').to_string()
}
