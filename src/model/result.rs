// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/result.rs - 推理结果定义
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

use std::{collections::BTreeMap, fmt};

#[cfg(feature = "serde")]
use serde::Serialize;

/// 目标检测结果，坐标为原图像素
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Detection {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub confidence: f32,
  pub class_id: usize,
  pub class_name: String,
}

impl Detection {
  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn center(&self) -> (f32, f32) {
    ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn is_valid(&self) -> bool {
    self.x2 > self.x1 && self.y2 > self.y1 && self.confidence > 0.0
  }

  /// 取整后的整数矩形 `(x, y, width, height)`，左上角不小于 0，宽高至少为 1
  pub fn to_rect(&self) -> (u32, u32, u32, u32) {
    (
      self.x1.round().max(0.0) as u32,
      self.y1.round().max(0.0) as u32,
      self.width().abs().round().max(1.0) as u32,
      self.height().abs().round().max(1.0) as u32,
    )
  }
}

impl fmt::Display for Detection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} ({:.3}): [{:.1}, {:.1}, {:.1}, {:.1}]",
      self.class_name, self.confidence, self.x1, self.y1, self.x2, self.y2
    )
  }
}

/// 图像分类结果
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Classification {
  pub class_id: usize,
  pub class_name: String,
  /// softmax 概率
  pub confidence: f32,
}

impl Classification {
  pub fn is_valid(&self) -> bool {
    self.confidence > 0.0
  }
}

impl fmt::Display for Classification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({:.3})", self.class_name, self.confidence)
  }
}

/// 检测结果统计
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DetectionStats {
  pub total: usize,
  pub mean_confidence: f32,
  pub per_class: BTreeMap<String, usize>,
}

impl DetectionStats {
  pub fn from_detections(detections: &[Detection]) -> Self {
    if detections.is_empty() {
      return Self::default();
    }

    let mut per_class = BTreeMap::new();
    for det in detections {
      *per_class.entry(det.class_name.clone()).or_insert(0) += 1;
    }
    let sum: f32 = detections.iter().map(|d| d.confidence).sum();

    Self {
      total: detections.len(),
      mean_confidence: sum / detections.len() as f32,
      per_class,
    }
  }
}

/// 定向边界框，角度为弧度
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OrientedBox {
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub angle: f32,
  pub confidence: f32,
  pub class_id: usize,
  pub class_name: String,
}

impl OrientedBox {
  pub fn angle_degrees(&self) -> f32 {
    self.angle.to_degrees()
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  /// 左上、右上、右下、左下
  pub fn corner_points(&self) -> [(f32, f32); 4] {
    let (sin, cos) = self.angle.sin_cos();
    let hw = self.width / 2.0;
    let hh = self.height / 2.0;
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(dx, dy)| {
      (
        self.center_x + dx * cos - dy * sin,
        self.center_y + dx * sin + dy * cos,
      )
    })
  }

  /// 轴对齐外接框 `[x_min, y_min, x_max, y_max]`
  pub fn axis_aligned_bounds(&self) -> [f32; 4] {
    let corners = self.corner_points();
    let mut bounds = [corners[0].0, corners[0].1, corners[0].0, corners[0].1];
    for &(x, y) in &corners[1..] {
      bounds[0] = bounds[0].min(x);
      bounds[1] = bounds[1].min(y);
      bounds[2] = bounds[2].max(x);
      bounds[3] = bounds[3].max(y);
    }
    bounds
  }

  pub fn is_valid(&self) -> bool {
    self.width > 0.0 && self.height > 0.0 && self.confidence > 0.0
  }
}

/// 关键点，`visibility` 大于 0.5 视为可见
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub visibility: f32,
}

impl Keypoint {
  pub fn is_visible(&self) -> bool {
    self.visibility > 0.5
  }
}

/// COCO 17 点关键点名称
pub const COCO_KEYPOINT_NAMES: [&str; 17] = [
  "nose",
  "left_eye",
  "right_eye",
  "left_ear",
  "right_ear",
  "left_shoulder",
  "right_shoulder",
  "left_elbow",
  "right_elbow",
  "left_wrist",
  "right_wrist",
  "left_hip",
  "right_hip",
  "left_knee",
  "right_knee",
  "left_ankle",
  "right_ankle",
];

/// 骨架连接
pub const COCO_SKELETON: [(usize, usize); 17] = [
  (15, 13),
  (13, 11),
  (16, 14),
  (14, 12),
  (11, 12),
  (5, 11),
  (6, 12),
  (5, 6),
  (5, 7),
  (6, 8),
  (7, 9),
  (8, 10),
  (1, 2),
  (0, 1),
  (0, 2),
  (1, 3),
  (2, 4),
];

/// 姿态估计结果
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoseItem {
  pub detection: Detection,
  pub keypoints: Vec<Keypoint>,
}

impl PoseItem {
  pub fn visible_count(&self) -> usize {
    self.keypoints.iter().filter(|k| k.is_visible()).count()
  }

  /// 可见关键点的平均可见度
  pub fn pose_confidence(&self) -> f32 {
    let visible = self.visible_count();
    if visible == 0 {
      return 0.0;
    }
    let sum: f32 = self
      .keypoints
      .iter()
      .filter(|k| k.is_visible())
      .map(|k| k.visibility)
      .sum();
    sum / visible as f32
  }

  /// 可见关键点外接框 `[x_min, y_min, x_max, y_max]`
  pub fn pose_bounds(&self) -> Option<[f32; 4]> {
    self
      .keypoints
      .iter()
      .filter(|k| k.is_visible())
      .fold(None, |acc, k| {
        Some(match acc {
          None => [k.x, k.y, k.x, k.y],
          Some([x0, y0, x1, y1]) => [x0.min(k.x), y0.min(k.y), x1.max(k.x), y1.max(k.y)],
        })
      })
  }

  /// 两个可见关键点之间的距离
  pub fn keypoint_distance(&self, a: usize, b: usize) -> Option<f32> {
    let ka = self.keypoints.get(a).filter(|k| k.is_visible())?;
    let kb = self.keypoints.get(b).filter(|k| k.is_visible())?;
    Some((ka.x - kb.x).hypot(ka.y - kb.y))
  }

  pub fn is_valid(&self) -> bool {
    self.detection.is_valid() && self.visible_count() > 0
  }
}

/// 实例分割结果，掩码按行存储
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SegmentItem {
  pub detection: Detection,
  pub mask: Vec<f32>,
  pub mask_width: usize,
  pub mask_height: usize,
}

impl SegmentItem {
  pub fn binary_mask(&self, threshold: f32) -> Vec<bool> {
    self.mask.iter().map(|&v| v > threshold).collect()
  }

  pub fn mask_area(&self, threshold: f32) -> usize {
    self.mask.iter().filter(|&&v| v > threshold).count()
  }

  pub fn is_valid(&self) -> bool {
    self.detection.is_valid()
      && !self.mask.is_empty()
      && self.mask.len() == self.mask_width * self.mask_height
  }
}
