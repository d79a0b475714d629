// factory-devices/src/display.rs
use factory_pipeline::{DisplayError, DisplaySink};
use image::RgbImage;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// `Cam1 live` → `cam1-live`
pub fn title_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Keeps the latest image of each title as `<dir>/<slug>.png`.
pub struct SnapshotDisplay {
    dir: PathBuf,
    files: BTreeMap<String, PathBuf>,
}

impl SnapshotDisplay {
    pub fn new(dir: &Path) -> Result<Self, DisplayError> {
        std::fs::create_dir_all(dir).map_err(|source| DisplayError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            files: BTreeMap::new(),
        })
    }

    /// Files written so far, keyed by title.
    pub fn files(&self) -> &BTreeMap<String, PathBuf> {
        &self.files
    }
}

impl DisplaySink for SnapshotDisplay {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<(), DisplayError> {
        let path = match self.files.get(title) {
            Some(path) => path.clone(),
            None => {
                let path = self.dir.join(format!("{}.png", title_slug(title)));
                debug!("snapshot surface {title} → {}", path.display());
                self.files.insert(title.to_string(), path.clone());
                path
            }
        };
        image.save(&path).map_err(|source| DisplayError::Encode {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Discards images, remembering only what was shown.
#[derive(Debug, Default)]
pub struct NullDisplay {
    shown: u64,
    titles: BTreeSet<String>,
}

impl NullDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    pub fn titles(&self) -> &BTreeSet<String> {
        &self.titles
    }
}

impl DisplaySink for NullDisplay {
    fn show(&mut self, title: &str, _image: &RgbImage) -> Result<(), DisplayError> {
        self.shown += 1;
        if !self.titles.contains(title) {
            self.titles.insert(title.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_file_safe() {
        assert_eq!(title_slug("Cam1 live"), "cam1-live");
        assert_eq!(title_slug("  Cam2 / detected "), "cam2-detected");
        assert_eq!(title_slug("***"), "untitled");
    }

    #[test]
    fn null_display_counts_every_show_once_per_title() {
        let mut d = NullDisplay::new();
        let img = RgbImage::new(2, 2);
        d.show("Cam1 live", &img).unwrap();
        d.show("Cam1 live", &img).unwrap();
        d.show("Cam2 live", &img).unwrap();
        assert_eq!(d.shown(), 3);
        assert_eq!(d.titles().len(), 2);
    }
}
