// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 图片序列视频源: 目录内的图片按文件名排序当作视频帧

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::debug;

use super::source::VideoSource;
use crate::error::{PipelineError, Result};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    cursor: usize,
    fps: Option<f64>,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, fps: Option<f64>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(PipelineError::config(format!(
                "no images found in {}",
                dir.display()
            )));
        }
        paths.sort();
        debug!("{} images in {}", paths.len(), dir.display());
        Ok(Self {
            dir,
            paths,
            cursor: 0,
            fps,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoSource for ImageSequenceSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|e| PipelineError::capture(format!("{}: {}", path.display(), e)))?;
        self.cursor += 1;
        Ok(Some(image.to_rgb8()))
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_reads_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10), ("c.jpg", 30)] {
            RgbImage::from_pixel(4, 3, Rgb([value, value, value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), Some(25.0)).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.fps(), Some(25.0));

        let first = source.read().unwrap().unwrap();
        assert_eq!(first.dimensions(), (4, 3));
        assert_eq!(first.get_pixel(0, 0)[0], 10);
        assert_eq!(source.read().unwrap().unwrap().get_pixel(0, 0)[0], 20);
        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), None),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_unreadable_image_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let mut source = ImageSequenceSource::open(dir.path(), None).unwrap();
        assert!(matches!(source.read(), Err(PipelineError::Capture(_))));
    }
}
