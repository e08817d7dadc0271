use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const DEFAULT_SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".vtt", ".sbv", ".sub", ".idx"];

/// Finds external subtitle files that travel with a media file.
#[derive(Debug, Clone)]
pub struct SubtitleFinder {
    extensions: Vec<String>,
}

impl Default for SubtitleFinder {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_SUBTITLE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl SubtitleFinder {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// `media` followed by the subtitles found next to each media file.
    pub fn with_subtitles(&self, media: &[PathBuf], skip: &HashSet<PathBuf>) -> Vec<PathBuf> {
        let mut all = media.to_vec();
        let mut processed = HashSet::new();

        for file in media {
            if skip.contains(file) || !processed.insert(file) {
                continue;
            }
            let Some(dir) = file.parent().filter(|d| d.exists()) else {
                continue;
            };
            for subtitle in self.find_in(dir, file) {
                info!("Subtitle found: {}", subtitle.display());
                all.push(subtitle);
            }
        }

        all
    }

    fn find_in(&self, dir: &Path, media: &Path) -> Vec<PathBuf> {
        let (Some(media_name), Some(stem)) = (
            media.file_name().and_then(|n| n.to_str()),
            media.file_stem().and_then(|s| s.to_str()),
        ) else {
            return Vec::new();
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Cannot access directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut found: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let is_subtitle = name.starts_with(stem)
                    && name != media_name
                    && self.extensions.iter().any(|ext| name.ends_with(ext.as_str()));
                is_subtitle.then(|| entry.path())
            })
            .collect();
        found.sort();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_finds_sibling_subtitles() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        for name in ["Movie.mkv", "Movie.en.srt", "Movie.forced.vtt", "Other.srt", "Movie.nfo"] {
            fs::write(dir.join(name), "x").unwrap();
        }

        let media = vec![dir.join("Movie.mkv")];
        let all = SubtitleFinder::default().with_subtitles(&media, &HashSet::new());

        assert_eq!(
            all,
            vec![
                dir.join("Movie.mkv"),
                dir.join("Movie.en.srt"),
                dir.join("Movie.forced.vtt"),
            ]
        );
    }

    #[test]
    fn test_skipped_media_gets_no_subtitles() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("Ep.mkv"), "x").unwrap();
        fs::write(tmp.path().join("Ep.srt"), "x").unwrap();

        let media = vec![tmp.path().join("Ep.mkv")];
        let skip: HashSet<PathBuf> = media.iter().cloned().collect();
        assert_eq!(SubtitleFinder::default().with_subtitles(&media, &skip), media);
    }
}
