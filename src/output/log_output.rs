// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::convert::Infallible;

use image::RgbImage;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Classification, Detection, DetectionStats},
  output::{OutputError, Render},
};

/// 将结果写入日志，检测结果附带统计
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput {
  verbose: bool,
}

impl LogOutput {
  /// 逐条打印每个结果
  pub fn verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  /// `log://?verbose=false` 只打印汇总
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    let verbose = url
      .query_pairs()
      .find(|(key, _)| key == "verbose")
      .is_none_or(|(_, value)| value != "false");
    Ok(Self::default().verbose(verbose))
  }
}

impl Render<RgbImage, Vec<Detection>> for LogOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &RgbImage, result: &Vec<Detection>) -> Result<(), Self::Error> {
    let (width, height) = frame.dimensions();
    info!("图像 {}x{}: 检测到 {} 个目标", width, height, result.len());
    if self.verbose {
      for (i, det) in result.iter().enumerate() {
        info!("  [{}] {}", i, det);
      }
    }

    let stats = DetectionStats::from_detections(result);
    if stats.total > 0 {
      info!("平均置信度: {:.3}", stats.mean_confidence);
      for (name, count) in &stats.per_class {
        info!("  {}: {}", name, count);
      }
    }
    Ok(())
  }
}

impl Render<RgbImage, Vec<Classification>> for LogOutput {
  type Error = Infallible;

  fn render_result(
    &self,
    frame: &RgbImage,
    result: &Vec<Classification>,
  ) -> Result<(), Self::Error> {
    let (width, height) = frame.dimensions();
    match result.first() {
      Some(best) => info!("图像 {}x{}: 分类结果 {}", width, height, best),
      None => info!("图像 {}x{}: 没有超过阈值的类别", width, height),
    }
    if self.verbose {
      for (i, cls) in result.iter().enumerate() {
        info!("  [{}] {}", i, cls);
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verbose_from_query() {
    let quiet = LogOutput::from_url(&Url::parse("log://?verbose=false").unwrap()).unwrap();
    assert!(!quiet.verbose);
    let loud = LogOutput::from_url(&Url::parse("log://").unwrap()).unwrap();
    assert!(loud.verbose);
  }

  #[test]
  fn renders_without_subscriber() {
    let detections = vec![Detection {
      x1: 0.0,
      y1: 0.0,
      x2: 2.0,
      y2: 2.0,
      confidence: 0.6,
      class_id: 0,
      class_name: "person".to_string(),
    }];
    let output = LogOutput::default().verbose(true);
    assert!(output.render_result(&RgbImage::new(2, 2), &detections).is_ok());
  }
}
