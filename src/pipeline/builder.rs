// 该文件是 Beifeng （北风） 项目的一部分。
// src/pipeline/builder.rs - YOLO11 流水线构建
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

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use url::Url;

use super::{PipelineError, Yolo11Classification, Yolo11Detection, check_threshold};
use crate::{
  FromUrl, FromUrlWithScheme,
  engine::Engine,
  model::{ClassificationDecoder, DEFAULT_IOU_THRESHOLD, DetectionDecoder, InferenceMode, Labels},
  pipeline::Pipeline,
  url_file_path,
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

const ENGINE_EXTENSION: &str = "engine";

/// 按推理模式创建流水线
///
/// ```text
/// yolo11:///models/yolo11n.engine?mode=detect&labels=/models/coco.names&conf=0.25&iou=0.45
/// ```
#[derive(Debug, Clone)]
pub struct Yolo11Builder {
  model_path: PathBuf,
  mode: InferenceMode,
  labels: Option<PathBuf>,
  confidence_threshold: f32,
  iou_threshold: f32,
}

impl FromUrlWithScheme for Yolo11Builder {
  const SCHEME: &'static str = "yolo11";
}

impl FromUrl for Yolo11Builder {
  type Error = PipelineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(PipelineError::InvalidArgument(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let model_path = url_file_path(url)
      .map_err(|e| PipelineError::InvalidArgument(format!("模型路径不是有效的 UTF-8: {}", e)))?;
    let mut builder = Yolo11Builder::new(model_path);
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "mode" => {
          let mode = value.parse().map_err(PipelineError::InvalidArgument)?;
          builder = builder.mode(mode);
        }
        "labels" => builder = builder.labels(value.into_owned()),
        "conf" => builder = builder.confidence_threshold(parse_f32(&key, &value)?),
        "iou" => builder = builder.iou_threshold(parse_f32(&key, &value)?),
        other => warn!("忽略未知参数: {}={}", other, value),
      }
    }
    Ok(builder)
  }
}

fn parse_f32(key: &str, value: &str) -> Result<f32, PipelineError> {
  value
    .parse()
    .map_err(|_| PipelineError::InvalidArgument(format!("参数 {} 不是有效数值: {}", key, value)))
}

/// 按模式创建的流水线
pub enum Yolo11Pipeline<E: Engine> {
  Detection(Yolo11Detection<E>),
  Classification(Yolo11Classification<E>),
}

impl<E: Engine> Yolo11Pipeline<E> {
  pub fn mode(&self) -> InferenceMode {
    match self {
      Yolo11Pipeline::Detection(p) => p.mode(),
      Yolo11Pipeline::Classification(p) => p.mode(),
    }
  }

  pub fn dispose(&mut self) {
    match self {
      Yolo11Pipeline::Detection(p) => p.dispose(),
      Yolo11Pipeline::Classification(p) => p.dispose(),
    }
  }
}

impl Yolo11Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      mode: InferenceMode::Detection,
      labels: None,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
    }
  }

  pub fn mode(mut self, mode: InferenceMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn labels(mut self, path: impl Into<PathBuf>) -> Self {
    self.labels = Some(path.into());
    self
  }

  pub fn confidence_threshold(mut self, value: f32) -> Self {
    self.confidence_threshold = value;
    self
  }

  pub fn iou_threshold(mut self, value: f32) -> Self {
    self.iou_threshold = value;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn inference_mode(&self) -> InferenceMode {
    self.mode
  }

  /// 空路径与缺失文件为错误，扩展名不是 `.engine` 只给出警告
  pub fn validate_engine_path(&self) -> Result<(), PipelineError> {
    if self.model_path.as_os_str().is_empty() {
      return Err(PipelineError::InvalidArgument("模型路径为空".to_string()));
    }
    if !self.model_path.is_file() {
      return Err(PipelineError::EngineLoad(format!(
        "模型文件不存在: {}",
        self.model_path.display()
      )));
    }
    let is_engine = self
      .model_path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case(ENGINE_EXTENSION));
    if !is_engine {
      warn!(
        "模型文件扩展名不是 .{}: {}",
        ENGINE_EXTENSION,
        self.model_path.display()
      );
    }
    Ok(())
  }

  fn load_engine<E: Engine>(&self) -> Result<E, PipelineError> {
    self.validate_engine_path()?;
    info!("加载模型文件: {}", self.model_path.display());
    E::load(&self.model_path).map_err(|e| PipelineError::EngineLoad(e.to_string()))
  }

  fn load_labels(&self, mode: InferenceMode) -> Labels {
    let labels = Labels::load_or_default(self.labels.as_deref(), mode.default_class_count());
    debug!("类别数量: {}", labels.len());
    labels
  }

  /// 加载引擎，根据第一个输出的维度推断模式后立即释放
  pub fn detect_mode<E: Engine>(&self) -> Result<InferenceMode, PipelineError> {
    let mut engine: E = self.load_engine()?;
    let shape = engine
      .output_name(0)
      .ok_or_else(|| PipelineError::EngineInit("模型没有输出绑定".to_string()))
      .and_then(|name| {
        engine
          .binding_shape(&name)
          .map_err(|e| PipelineError::EngineInit(e.to_string()))
      });
    engine.release();

    let mode = InferenceMode::from_output_dims(&shape?);
    info!("检测到推理模式: {}", mode);
    Ok(mode)
  }

  pub fn build_detection<E: Engine>(self) -> Result<Yolo11Detection<E>, PipelineError> {
    check_threshold("IoU 阈值", self.iou_threshold)?;
    check_threshold("置信度阈值", self.confidence_threshold)?;
    let labels = self.load_labels(InferenceMode::Detection);
    let engine = self.load_engine()?;
    info!("IoU 阈值: {}", self.iou_threshold);
    let decoder = DetectionDecoder::new(labels).with_iou_threshold(self.iou_threshold);
    Pipeline::new(engine, decoder, self.confidence_threshold)
  }

  pub fn build_classification<E: Engine>(self) -> Result<Yolo11Classification<E>, PipelineError> {
    check_threshold("置信度阈值", self.confidence_threshold)?;
    let labels = self.load_labels(InferenceMode::Classification);
    let engine = self.load_engine()?;
    Pipeline::new(
      engine,
      ClassificationDecoder::new(labels),
      self.confidence_threshold,
    )
  }

  /// 按配置的模式创建流水线，分割、旋转框与姿态模式尚无解码实现
  pub fn build<E: Engine>(self) -> Result<Yolo11Pipeline<E>, PipelineError> {
    match self.mode {
      InferenceMode::Detection => self.build_detection().map(Yolo11Pipeline::Detection),
      InferenceMode::Classification => {
        self.build_classification().map(Yolo11Pipeline::Classification)
      }
      other => Err(PipelineError::Unsupported(other)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_url_with_query() {
    let url = Url::parse(
      "yolo11:///models/yolo11n-cls.engine?mode=classify&labels=/models/imagenet.names&conf=0.1&iou=0.5",
    )
    .unwrap();
    let builder = Yolo11Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), Path::new("/models/yolo11n-cls.engine"));
    assert_eq!(builder.inference_mode(), InferenceMode::Classification);
    assert_eq!(builder.labels.as_deref(), Some(Path::new("/models/imagenet.names")));
    assert_eq!(builder.confidence_threshold, 0.1);
    assert_eq!(builder.iou_threshold, 0.5);
  }

  #[test]
  fn defaults_without_query() {
    let url = Url::parse("yolo11:///models/yolo11n.engine").unwrap();
    let builder = Yolo11Builder::from_url(&url).unwrap();
    assert_eq!(builder.inference_mode(), InferenceMode::Detection);
    assert_eq!(builder.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
    assert_eq!(builder.iou_threshold, DEFAULT_IOU_THRESHOLD);
    assert!(builder.labels.is_none());
  }

  #[test]
  fn model_path_is_percent_decoded() {
    let url = Url::parse("yolo11:///模型/yolo11n v2.engine?mode=detect").unwrap();
    let builder = Yolo11Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), Path::new("/模型/yolo11n v2.engine"));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("yolo26:///models/yolo11n.engine").unwrap();
    assert!(matches!(
      Yolo11Builder::from_url(&url),
      Err(PipelineError::InvalidArgument(_))
    ));
  }

  #[test]
  fn bad_query_values_are_rejected() {
    for query in ["mode=panoptic", "conf=high", "iou=x"] {
      let url = Url::parse(&format!("yolo11:///m.engine?{}", query)).unwrap();
      assert!(matches!(
        Yolo11Builder::from_url(&url),
        Err(PipelineError::InvalidArgument(_))
      ));
    }
  }

  #[test]
  fn engine_path_validation() {
    assert!(matches!(
      Yolo11Builder::new("").validate_engine_path(),
      Err(PipelineError::InvalidArgument(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.engine");
    assert!(matches!(
      Yolo11Builder::new(&missing).validate_engine_path(),
      Err(PipelineError::EngineLoad(_))
    ));

    let onnx = dir.path().join("model.onnx");
    std::fs::write(&onnx, b"{}").unwrap();
    assert!(Yolo11Builder::new(&onnx).validate_engine_path().is_ok());
  }
}
