// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测解码 (Detection decoding)
///
/// 纯函数, 与线程/队列无关:
/// - types:   Bbox / Detection / DetectionSet / RawDetectionCell
/// - decoder: 置信度过滤 + 坐标解码 + 按类别 NMS
pub mod decoder;
pub mod types;

pub use decoder::{collect_candidates, decode, non_max_suppression, DetectionDecoder};
pub use types::{Bbox, Detection, DetectionSet, RawDetectionCell};
