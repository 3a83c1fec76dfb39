// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测系统数据结构定义
//! Data structures for the detection decoder

use ndarray::{s, ArrayView1};

/// 每行原始输出前5个值: cx, cy, w, h, objectness
pub const CELL_HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object, pixel space
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    /// 中心点形式 → 左上角形式
    pub fn from_cxcywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2., cy - height / 2., width, height)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    /// 宽或高非正的框面积为0
    pub fn area(&self) -> f32 {
        self.width.max(0.) * self.height.max(0.)
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        if self.area() == 0. || another.area() == 0. {
            return 0.;
        }
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}

/// 解码后的检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    bbox: Bbox,
    class_id: usize,
    confidence: f32,
}

impl Detection {
    pub fn new(bbox: Bbox, class_id: usize, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }

    pub fn bbox(&self) -> &Bbox {
        &self.bbox
    }

    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// 单帧 NMS 之后的检测集合 (按输出顺序, 即置信度降序)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet(Vec<Detection>);

impl DetectionSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Detection> {
        self.0
    }
}

impl From<Vec<Detection>> for DetectionSet {
    fn from(detections: Vec<Detection>) -> Self {
        Self(detections)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// 原始输出的一行: [cx, cy, w, h, objectness, score_0 .. score_{K-1}]
#[derive(Debug, Clone)]
pub struct RawDetectionCell<'a> {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub objectness: f32,
    pub class_scores: ArrayView1<'a, f32>,
}

impl<'a> RawDetectionCell<'a> {
    /// 少于6个值的行没有类别分数, 返回 None
    pub fn from_row(row: ArrayView1<'a, f32>) -> Option<Self> {
        if row.len() <= CELL_HEADER_LEN {
            return None;
        }
        Some(Self {
            cx: row[0],
            cy: row[1],
            w: row[2],
            h: row[3],
            objectness: row[4],
            class_scores: row.slice_move(s![CELL_HEADER_LEN..]),
        })
    }

    /// argmax(class_scores), 并列时取第一个
    pub fn best_class(&self) -> Option<(usize, f32)> {
        self.class_scores
            .iter()
            .copied()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = Bbox::new(0., 0., 10., 10.);
        let b = Bbox::new(20., 20., 10., 10.);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);
        // 仅边相接
        let c = Bbox::new(10., 0., 10., 10.);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = Bbox::new(0., 0., 10., 10.);
        let b = Bbox::new(5., 0., 10., 10.);
        assert!((a.iou(&b) - 50. / 150.).abs() < 1e-6);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn test_iou_degenerate_boxes() {
        let a = Bbox::new(0., 0., 10., 10.);
        let zero = Bbox::new(2., 2., 0., 5.);
        let negative = Bbox::new(2., 2., -4., -4.);
        assert_eq!(zero.area(), 0.0);
        assert_eq!(negative.area(), 0.0);
        assert_eq!(a.iou(&zero), 0.0);
        assert_eq!(a.iou(&negative), 0.0);
        assert_eq!(negative.iou(&negative), 0.0);
    }

    #[test]
    fn test_from_cxcywh() {
        let b = Bbox::from_cxcywh(50., 40., 20., 10.);
        assert_eq!(b.xmin(), 40.);
        assert_eq!(b.ymin(), 35.);
        assert_eq!(b.xmax(), 60.);
        assert_eq!(b.ymax(), 45.);
    }

    #[test]
    fn test_cell_best_class_first_max_wins() {
        let row = arr1(&[0.5f32, 0.5, 0.1, 0.1, 0.9, 0.2, 0.7, 0.7]);
        let cell = RawDetectionCell::from_row(row.view()).unwrap();
        assert_eq!(cell.objectness, 0.9);
        assert_eq!(cell.best_class(), Some((1, 0.7)));
    }

    #[test]
    fn test_cell_without_scores_is_rejected() {
        let row = arr1(&[0.5f32, 0.5, 0.1, 0.1, 0.9]);
        assert!(RawDetectionCell::from_row(row.view()).is_none());
    }
}
