// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/detect.rs - 目标检测解码与非极大值抑制
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use tracing::{debug, warn};

use super::{Decoder, InferenceMode, Labels, result::Detection};
use crate::{dims::Dims, frame::Letterbox};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// YOLO11 检测头解码器
///
/// 输出张量布局通常为 `[1, 4 + 类别数, 候选数]`，按通道优先存储：
/// 通道 `j`、候选 `i` 的值位于 `j * N + i`。转置后的 `[1, 候选数, 4 + 类别数]`
/// 同样可以解码。
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
  labels: Labels,
  iou_threshold: f32,
}

impl DetectionDecoder {
  pub fn new(labels: Labels) -> Self {
    Self {
      labels,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
    }
  }

  pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  pub fn set_iou_threshold(&mut self, iou_threshold: f32) {
    self.iou_threshold = iou_threshold;
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  /// 解码全部候选，不做抑制
  pub fn candidates(
    &self,
    raw: &[f32],
    output_dims: &Dims,
    letterbox: &Letterbox,
    confidence_threshold: f32,
  ) -> Vec<Detection> {
    let (rows, cols) = match output_dims.rank() {
      3 => (output_dims.get(1), output_dims.get(2)),
      2 => (output_dims.get(0), output_dims.get(1)),
      _ => {
        warn!("检测输出维度不受支持: {}", output_dims);
        return Vec::new();
      }
    };
    let layout = Layout::detect(rows, cols, self.labels.len() + 4);
    let (channels, anchors) = match layout {
      Layout::ChannelMajor => (rows, cols),
      Layout::AnchorMajor => (cols, rows),
    };
    if channels <= 4 || anchors == 0 {
      warn!("检测输出维度不受支持: {}", output_dims);
      return Vec::new();
    }
    debug!("检测输出布局: {:?}, 通道 {}, 候选 {}", layout, channels, anchors);
    let num_classes = channels - 4;
    if num_classes != self.labels.len() {
      debug!(
        "输出类别数 {} 与类别名称数量 {} 不一致",
        num_classes,
        self.labels.len()
      );
    }
    if raw.len() < channels * anchors {
      warn!(
        "输出张量长度不足: 期望 {}, 实际 {}",
        channels * anchors,
        raw.len()
      );
    }

    let at = |channel: usize, anchor: usize| {
      raw
        .get(layout.index(channels, anchors, channel, anchor))
        .copied()
    };
    let mut detections = Vec::new();
    for i in 0..anchors {
      let (Some(cx), Some(cy), Some(w), Some(h)) = (at(0, i), at(1, i), at(2, i), at(3, i)) else {
        continue;
      };

      let mut best: Option<(usize, f32)> = None;
      for class_id in 0..num_classes {
        let Some(score) = at(4 + class_id, i) else {
          break;
        };
        if score > best.map_or(0.0, |(_, s)| s) {
          best = Some((class_id, score));
        }
      }

      let Some((class_id, confidence)) = best else {
        continue;
      };
      if confidence < confidence_threshold {
        continue;
      }

      let (x1, y1) = letterbox.to_original(cx - w / 2.0, cy - h / 2.0);
      let (x2, y2) = letterbox.to_original(cx + w / 2.0, cy + h / 2.0);
      detections.push(Detection {
        x1,
        y1,
        x2,
        y2,
        confidence,
        class_id,
        class_name: self.labels.name(class_id),
      });
    }
    detections
  }
}

/// 检测输出的存储顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
  /// `[4 + 类别数, 候选数]`，通道 `j`、候选 `i` 位于 `j * N + i`
  ChannelMajor,
  /// `[候选数, 4 + 类别数]`，通道 `j`、候选 `i` 位于 `i * C + j`
  AnchorMajor,
}

impl Layout {
  /// 先按类别数匹配通道轴，都不匹配时取较短的一维，
  /// 较短一维容纳不下边框与类别时按通道优先处理
  fn detect(rows: usize, cols: usize, expected_channels: usize) -> Self {
    if rows == expected_channels {
      Layout::ChannelMajor
    } else if cols == expected_channels {
      Layout::AnchorMajor
    } else if rows > cols && cols > 4 {
      Layout::AnchorMajor
    } else {
      Layout::ChannelMajor
    }
  }

  fn index(self, channels: usize, anchors: usize, channel: usize, anchor: usize) -> usize {
    match self {
      Layout::ChannelMajor => channel * anchors + anchor,
      Layout::AnchorMajor => anchor * channels + channel,
    }
  }
}

impl Decoder for DetectionDecoder {
  type Output = Detection;

  const MODE: InferenceMode = InferenceMode::Detection;

  fn decode(
    &self,
    raw: &[f32],
    output_dims: &Dims,
    letterbox: &Letterbox,
    confidence_threshold: f32,
  ) -> Vec<Detection> {
    let candidates = self.candidates(raw, output_dims, letterbox, confidence_threshold);
    let before = candidates.len();
    let kept = apply_nms(candidates, self.iou_threshold);
    debug!("NMS: {} 个候选, 保留 {} 个", before, kept.len());
    kept
  }
}

/// 两个检测框的交并比，不相交或并集为 0 时返回 0
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);
  if x2 <= x1 || y2 <= y1 {
    return 0.0;
  }

  let intersection = (x2 - x1) * (y2 - y1);
  let union = a.area() + b.area() - intersection;
  if union <= 0.0 {
    return 0.0;
  }
  intersection / union
}

/// 贪心非极大值抑制，与类别无关
///
/// 按置信度降序稳定排序，依次保留最高者并丢弃与其交并比超过阈值的候选。
pub fn apply_nms(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut suppressed = vec![false; candidates.len()];
  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    for j in (i + 1)..candidates.len() {
      if !suppressed[j] && iou(&candidates[i], &candidates[j]) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  candidates
    .into_iter()
    .zip(suppressed)
    .filter_map(|(det, dropped)| (!dropped).then_some(det))
    .collect()
}
