/// Parameters handed to a detector backend on every call.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectParams {
    /// Minimum class score for a candidate to be kept.
    pub confidence: f32,
    /// IoU above which overlapping boxes are suppressed.
    pub iou: f32,
    /// Class ids to keep. Empty keeps every class.
    pub classes: Vec<usize>,
    /// Square model input size in pixels.
    pub input_size: u32,
}

impl DetectParams {
    pub fn allows(&self, class_id: usize) -> bool {
        self.classes.is_empty() || self.classes.contains(&class_id)
    }
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            iou: 0.65,
            classes: vec![
                super::COCO_PERSON,
                super::COCO_CAT,
                super::COCO_DOG,
            ],
            input_size: 480,
        }
    }
}

/// One detected object in frame pixel coordinates (top-left origin).
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Detection {
    pub fn label(&self) -> String {
        super::class_name(self.class_id)
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Drop detections outside the class filter.
    pub fn retain_classes(&mut self, params: &DetectParams) {
        self.detections.retain(|d| params.allows(d.class_id));
    }

    /// Sorted, de-duplicated labels of every detection.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.detections.iter().map(Detection::label).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Greedy non-maximum suppression: keep the highest-confidence box of every
/// overlapping cluster.
pub(crate) fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept).any(|prev| detections[prev].iou(&detections[index]) > iou_threshold);
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}
