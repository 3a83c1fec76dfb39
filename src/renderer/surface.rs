// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 显示端 (where annotated frames go)

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::annotate::AnnotatedFrame;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Continue,
    /// 用户请求退出
    Quit,
}

pub trait RenderSurface {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent>;

    /// 关闭窗口 / 刷新输出; 由 SurfaceGuard 保证只调用一次
    fn release(&mut self) {}
}

impl<R: RenderSurface + ?Sized> RenderSurface for Box<R> {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
        (**self).present(frame)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// 持有显示端, 离开作用域时释放一次
pub struct SurfaceGuard<R: RenderSurface> {
    surface: R,
    released: bool,
}

impl<R: RenderSurface> SurfaceGuard<R> {
    pub fn new(surface: R) -> Self {
        Self {
            surface,
            released: false,
        }
    }

    pub fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
        self.surface.present(frame)
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.surface.release();
            debug!("Render surface released");
        }
    }
}

impl<R: RenderSurface> Drop for SurfaceGuard<R> {
    fn drop(&mut self) {
        self.release();
    }
}

/// 不显示, 只统计
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    frames: u64,
    detections: u64,
    last_fps: u32,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderSurface for HeadlessSurface {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
        self.frames += 1;
        self.detections += frame.annotations.len() as u64;
        if frame.fps != self.last_fps {
            self.last_fps = frame.fps;
            info!(
                "🖥️ {} | frame {} | {} detections so far",
                frame.fps_caption(),
                frame.sequence,
                self.detections
            );
        }
        for a in &frame.annotations {
            debug!("frame {}: {} at {:?}", frame.sequence, a.caption, a.bbox);
        }
        Ok(SurfaceEvent::Continue)
    }

    fn release(&mut self) {
        info!(
            "✅ Headless output closed: {} frames, {} detections",
            self.frames, self.detections
        );
    }
}

/// 标注后的帧逐张写入目录
pub struct ImageDirSurface {
    dir: PathBuf,
    written: u64,
}

impl ImageDirSurface {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("💾 Writing annotated frames to {}", dir.display());
        Ok(Self { dir, written: 0 })
    }

    pub fn frame_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.jpg", sequence))
    }
}

impl RenderSurface for ImageDirSurface {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
        frame.image.save(self.frame_path(frame.sequence))?;
        self.written += 1;
        Ok(SurfaceEvent::Continue)
    }

    fn release(&mut self) {
        info!("✅ {} frames written to {}", self.written, self.dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn annotated(sequence: u64) -> AnnotatedFrame {
        AnnotatedFrame {
            sequence,
            image: RgbImage::new(8, 6),
            annotations: vec![],
            fps: 0,
            text_rendered: false,
        }
    }

    struct CountingRelease(Arc<AtomicUsize>);

    impl RenderSurface for CountingRelease {
        fn present(&mut self, _frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
            Ok(SurfaceEvent::Continue)
        }

        fn release(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut guard = SurfaceGuard::new(CountingRelease(count.clone()));
        guard.present(&annotated(0)).unwrap();
        guard.release();
        guard.release();
        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_image_dir_writes_numbered_frames() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut surface = ImageDirSurface::create(&out).unwrap();
        assert_eq!(surface.present(&annotated(0)).unwrap(), SurfaceEvent::Continue);
        surface.present(&annotated(12)).unwrap();

        assert!(out.join("frame_000000.jpg").is_file());
        let img = image::open(out.join("frame_000012.jpg")).unwrap();
        assert_eq!((img.width(), img.height()), (8, 6));
    }

    #[test]
    fn test_headless_counts_frames() {
        let mut surface = HeadlessSurface::new();
        for i in 0..3 {
            assert_eq!(surface.present(&annotated(i)).unwrap(), SurfaceEvent::Continue);
        }
        assert_eq!(surface.frames(), 3);
    }
}
