// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 视频帧 (one captured frame travelling through the pipeline)

use std::time::Instant;

use image::RgbImage;

/// 被接收的一帧; 所有权沿流水线单向转移, 不复制
#[derive(Debug)]
pub struct Frame {
    sequence: u64,
    source_index: u64,
    captured_at: Instant,
    image: RgbImage,
}

impl Frame {
    pub fn new(sequence: u64, source_index: u64, image: RgbImage) -> Self {
        Self {
            sequence,
            source_index,
            captured_at: Instant::now(),
            image,
        }
    }

    /// 接收顺序编号, 从0开始连续递增
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// 在原始视频中的序号 (从1开始计数, 含被跳过的帧)
    pub fn source_index(&self) -> u64 {
        self.source_index
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}
