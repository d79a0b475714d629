// factory-camera/src/sequence.rs
use crate::{CameraError, Frame, FrameSource, Result};
use log::debug;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ppm"];

/// A directory of still images played back in file-name order.
///
/// Files are decoded lazily, one per `next_frame` call.
pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|source| CameraError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CameraError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(CameraError::Empty(dir.display().to_string()));
        }
        files.sort();
        debug!("image sequence {} has {} frames", dir.display(), files.len());

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|source| CameraError::Decode {
                path: path.display().to_string(),
                source,
            })?
            .to_rgb8();
        let frame = Frame::new(image, self.cursor as u64);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
