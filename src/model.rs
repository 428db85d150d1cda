// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型任务与结果解码
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

use std::{fmt, str::FromStr};

use tracing::warn;

use crate::{dims::Dims, frame::Letterbox};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 任务相关的输出解码策略，在构造流水线时选定
pub trait Decoder {
  type Output;

  const MODE: InferenceMode;

  fn decode(
    &self,
    raw: &[f32],
    output_dims: &Dims,
    letterbox: &Letterbox,
    confidence_threshold: f32,
  ) -> Vec<Self::Output>;
}

/// YOLO11 推理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceMode {
  Detection,
  Classification,
  Segmentation,
  OrientedBoundingBox,
  PoseEstimation,
}

impl InferenceMode {
  /// 是否具备解码实现
  pub fn is_supported(&self) -> bool {
    matches!(
      self,
      InferenceMode::Detection | InferenceMode::Classification
    )
  }

  /// 缺少类别文件时的占位类别数量
  pub fn default_class_count(&self) -> usize {
    match self {
      InferenceMode::Classification => IMAGENET_CLASS_NUM,
      _ => COCO_CLASS_NUM,
    }
  }

  /// 根据输出维度推断推理模式
  pub fn from_output_dims(dims: &Dims) -> Self {
    match dims.rank() {
      2 => InferenceMode::Classification,
      3 => {
        // 通道轴 (4 + 类别数 [+ 掩码系数]) 总是较短的一维
        let channels = dims.get(1).min(dims.get(2));
        if (84..=100).contains(&channels) {
          InferenceMode::Detection
        } else if channels > 100 {
          InferenceMode::Segmentation
        } else {
          warn!("无法自动检测推理模式，输出维度: {}，默认使用检测模式", dims);
          InferenceMode::Detection
        }
      }
      _ => {
        warn!("无法自动检测推理模式，输出维度: {}，默认使用检测模式", dims);
        InferenceMode::Detection
      }
    }
  }
}

impl fmt::Display for InferenceMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      InferenceMode::Detection => "detect",
      InferenceMode::Classification => "classify",
      InferenceMode::Segmentation => "segment",
      InferenceMode::OrientedBoundingBox => "obb",
      InferenceMode::PoseEstimation => "pose",
    };
    f.write_str(name)
  }
}

impl FromStr for InferenceMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "detect" | "detection" => Ok(InferenceMode::Detection),
      "classify" | "classification" => Ok(InferenceMode::Classification),
      "segment" | "segmentation" => Ok(InferenceMode::Segmentation),
      "obb" => Ok(InferenceMode::OrientedBoundingBox),
      "pose" => Ok(InferenceMode::PoseEstimation),
      other => Err(format!("未知推理模式: {}", other)),
    }
  }
}

pub const COCO_CLASS_NUM: usize = 80;
pub const IMAGENET_CLASS_NUM: usize = 1000;

mod classify;
mod detect;
mod labels;
mod result;

pub use self::classify::{ClassificationDecoder, softmax, top_k};
pub use self::detect::{DEFAULT_IOU_THRESHOLD, DetectionDecoder, apply_nms, iou};
pub use self::labels::Labels;
pub use self::result::{
  COCO_KEYPOINT_NAMES, COCO_SKELETON, Classification, Detection, DetectionStats, Keypoint,
  OrientedBox, PoseItem, SegmentItem,
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mode_from_output_dims() {
    let cls = Dims::from_slice(&[1, 1000]).unwrap();
    assert_eq!(InferenceMode::from_output_dims(&cls), InferenceMode::Classification);

    let det = Dims::from_slice(&[1, 8400, 84]).unwrap();
    assert_eq!(InferenceMode::from_output_dims(&det), InferenceMode::Detection);

    let channel_major = Dims::from_slice(&[1, 84, 8400]).unwrap();
    assert_eq!(InferenceMode::from_output_dims(&channel_major), InferenceMode::Detection);

    let seg = Dims::from_slice(&[1, 116, 8400]).unwrap();
    assert_eq!(InferenceMode::from_output_dims(&seg), InferenceMode::Segmentation);

    let odd = Dims::from_slice(&[1, 2, 3, 4]).unwrap();
    assert_eq!(InferenceMode::from_output_dims(&odd), InferenceMode::Detection);
  }

  #[test]
  fn mode_round_trips_through_str() {
    for mode in [
      InferenceMode::Detection,
      InferenceMode::Classification,
      InferenceMode::Segmentation,
      InferenceMode::OrientedBoundingBox,
      InferenceMode::PoseEstimation,
    ] {
      assert_eq!(mode.to_string().parse::<InferenceMode>(), Ok(mode));
    }
    assert!("panoptic".parse::<InferenceMode>().is_err());
  }

  #[test]
  fn only_detection_and_classification_decode() {
    assert!(InferenceMode::Detection.is_supported());
    assert!(InferenceMode::Classification.is_supported());
    assert!(!InferenceMode::PoseEstimation.is_supported());
    assert_eq!(InferenceMode::Classification.default_class_count(), 1000);
    assert_eq!(InferenceMode::Detection.default_class_count(), 80);
  }
}
