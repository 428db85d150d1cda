// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/classify.rs - 图像分类解码
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

use tracing::debug;

use super::{Decoder, InferenceMode, Labels, result::Classification};
use crate::{dims::Dims, frame::Letterbox};

#[derive(Debug, Clone)]
pub struct ClassificationDecoder {
  labels: Labels,
}

impl ClassificationDecoder {
  pub fn new(labels: Labels) -> Self {
    Self { labels }
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }
}

impl Decoder for ClassificationDecoder {
  type Output = Classification;

  const MODE: InferenceMode = InferenceMode::Classification;

  fn decode(
    &self,
    raw: &[f32],
    _output_dims: &Dims,
    _letterbox: &Letterbox,
    confidence_threshold: f32,
  ) -> Vec<Classification> {
    let mut results: Vec<Classification> = softmax(raw)
      .into_iter()
      .enumerate()
      .filter(|(_, p)| *p >= confidence_threshold)
      .map(|(class_id, confidence)| Classification {
        class_id,
        class_name: self.labels.name(class_id),
        confidence,
      })
      .collect();
    results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    debug!("分类: {} 个类别, {} 个超过阈值", raw.len(), results.len());
    results
  }
}

/// 数值稳定的 softmax，先减去最大值再取指数
pub fn softmax(logits: &[f32]) -> Vec<f32> {
  if logits.is_empty() {
    return Vec::new();
  }
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
  let sum: f32 = exps.iter().sum();
  exps.into_iter().map(|e| e / sum).collect()
}

/// 截取已排序结果的前 `k` 项
pub fn top_k(mut results: Vec<Classification>, k: usize) -> Vec<Classification> {
  results.truncate(k);
  results
}
