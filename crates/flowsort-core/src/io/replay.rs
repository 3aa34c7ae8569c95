use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, SortError};
use crate::frame::{Frame, Illumination};
use crate::hardware::{CaptureRequest, FrameSource};

use super::image_io::load_frame;

/// Frame source that cycles through saved images, for driving the loop
/// offline.
///
/// Images are looked up per channel in `<dir>/<channel>/` (for example
/// `<dir>/cyan/`). Brightfield also accepts images directly in `<dir>`.
/// Files are replayed in name order and wrap around.
pub struct ReplayFrameSource {
    frames: BTreeMap<Illumination, Vec<PathBuf>>,
    cursors: BTreeMap<Illumination, usize>,
}

fn is_image(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("png" | "tif" | "tiff")
    )
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl ReplayFrameSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut frames = BTreeMap::new();
        for channel in Illumination::ALL {
            let mut files = list_images(&dir.join(channel.as_str()))?;
            if files.is_empty() && channel == Illumination::Brightfield {
                files = list_images(dir)?;
            }
            if !files.is_empty() {
                frames.insert(channel, files);
            }
        }
        if !frames.contains_key(&Illumination::Brightfield) {
            return Err(SortError::Capture(format!(
                "no brightfield frames under {}",
                dir.display()
            )));
        }
        for (channel, files) in &frames {
            info!(channel = %channel, frames = files.len(), "Replay source");
        }
        Ok(Self {
            frames,
            cursors: BTreeMap::new(),
        })
    }

    pub fn frame_count(&self, illumination: Illumination) -> usize {
        self.frames.get(&illumination).map_or(0, Vec::len)
    }
}

impl FrameSource for ReplayFrameSource {
    fn capture(&mut self, request: &CaptureRequest) -> Result<Frame> {
        let files = self.frames.get(&request.illumination).ok_or_else(|| {
            SortError::Capture(format!("no replay frames for {}", request.illumination))
        })?;
        let cursor = self.cursors.entry(request.illumination).or_insert(0);
        let path = &files[*cursor % files.len()];
        *cursor += 1;
        load_frame(path, request.illumination)
            .map_err(|e| SortError::Capture(format!("{}: {e}", path.display())))
    }
}
