// 该文件是 Beifeng （北风） 项目的一部分。
// src/pipeline.rs - 推理流水线
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

use std::sync::{Mutex, PoisonError};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[cfg(feature = "read_image_file")]
use crate::input::ImageFileInputError;
use crate::{
  dims::Dims,
  engine::{Engine, EngineBinding, EngineError},
  model::{
    Classification, ClassificationDecoder, Decoder, DetectionDecoder, InferenceMode, Model, top_k,
  },
  preprocess::{PreprocessError, Preprocessor},
};

mod builder;

pub use self::builder::{DEFAULT_CONFIDENCE_THRESHOLD, Yolo11Builder, Yolo11Pipeline};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("参数无效: {0}")]
  InvalidArgument(String),
  #[error("图像无效: {0}")]
  InvalidImage(String),
  #[error("引擎加载失败: {0}")]
  EngineLoad(String),
  #[error("引擎初始化失败: {0}")]
  EngineInit(String),
  #[error("流水线已释放")]
  UseAfterDispose,
  #[error("推理模式 {0} 尚未实现")]
  Unsupported(InferenceMode),
  #[error("引擎错误: {0}")]
  Engine(#[from] EngineError),
  #[error("预处理错误: {0}")]
  Preprocess(PreprocessError),
  #[cfg(feature = "read_image_file")]
  #[error("图像读取错误: {0}")]
  ImageInput(#[from] ImageFileInputError),
}

impl From<PreprocessError> for PipelineError {
  fn from(err: PreprocessError) -> Self {
    match err {
      PreprocessError::InvalidImage { width, height } => {
        PipelineError::InvalidImage(format!("图像尺寸无效: {}x{}", width, height))
      }
      other => PipelineError::Preprocess(other),
    }
  }
}

/// 置信度阈值必须位于 (0, 1]
pub(crate) fn check_threshold(name: &str, value: f32) -> Result<(), PipelineError> {
  if value > 0.0 && value <= 1.0 {
    Ok(())
  } else {
    Err(PipelineError::InvalidArgument(format!(
      "{} 必须位于 (0, 1] 区间, 实际为 {}",
      name, value
    )))
  }
}

/// 单张图像推理流水线：预处理 → 上传 → 执行 → 取回 → 解码
///
/// 流水线独占引擎，`dispose` 或离开作用域时释放且只释放一次。
pub struct Pipeline<E: Engine, D: Decoder> {
  engine: Option<E>,
  input: EngineBinding,
  output: EngineBinding,
  preprocessor: Preprocessor,
  decoder: D,
  confidence_threshold: f32,
}

pub type Yolo11Detection<E> = Pipeline<E, DetectionDecoder>;
pub type Yolo11Classification<E> = Pipeline<E, ClassificationDecoder>;

impl<E: Engine, D: Decoder> Pipeline<E, D> {
  /// 接管引擎并读取绑定元数据；失败时引擎会被立即释放
  pub fn new(mut engine: E, decoder: D, confidence_threshold: f32) -> Result<Self, PipelineError> {
    let prepared = check_threshold("置信度阈值", confidence_threshold)
      .and_then(|_| inspect_bindings(&engine));
    let (input, output, preprocessor) = match prepared {
      Ok(prepared) => prepared,
      Err(e) => {
        error!("流水线初始化失败: {}", e);
        engine.release();
        return Err(e);
      }
    };

    let detected = InferenceMode::from_output_dims(&output.shape);
    if detected != D::MODE {
      warn!(
        "输出维度 {} 看起来像 {} 模式，但流水线以 {} 模式解码",
        output.shape,
        detected,
        D::MODE
      );
    }

    info!("推理模式: {}", D::MODE);
    info!("输入: {} {}", input.name, input.shape);
    info!("输出: {} {}", output.name, output.shape);
    info!(
      "输入尺寸: {}x{}",
      preprocessor.target_size().0,
      preprocessor.target_size().1
    );
    info!("置信度阈值: {}", confidence_threshold);

    Ok(Self {
      engine: Some(engine),
      input,
      output,
      preprocessor,
      decoder,
      confidence_threshold,
    })
  }

  pub fn infer(&mut self, image: &RgbImage) -> Result<Vec<D::Output>, PipelineError> {
    let engine = self.engine.as_mut().ok_or(PipelineError::UseAfterDispose)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(PipelineError::InvalidImage(format!(
        "图像尺寸无效: {}x{}",
        width, height
      )));
    }

    let preprocessed = self.preprocessor.preprocess(image)?;
    engine.set_input(&self.input.name, preprocessed.tensor.as_slice())?;
    engine.run()?;
    let raw = engine.get_output(&self.output.name)?;
    debug!("输出张量长度: {}", raw.len());

    Ok(self.decoder.decode(
      &raw,
      &self.output.shape,
      &preprocessed.letterbox,
      self.confidence_threshold,
    ))
  }

  #[cfg(feature = "read_image_file")]
  pub fn infer_path(
    &mut self,
    path: impl AsRef<std::path::Path>,
  ) -> Result<Vec<D::Output>, PipelineError> {
    if self.engine.is_none() {
      return Err(PipelineError::UseAfterDispose);
    }
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
      return Err(PipelineError::InvalidArgument("图像路径为空".to_string()));
    }
    let image = crate::input::load_image(path)?;
    self.infer(&image)
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn set_confidence_threshold(&mut self, value: f32) -> Result<(), PipelineError> {
    if self.engine.is_none() {
      return Err(PipelineError::UseAfterDispose);
    }
    check_threshold("置信度阈值", value)?;
    self.confidence_threshold = value;
    Ok(())
  }

  /// 模型输入尺寸 `(宽, 高)`
  pub fn input_size(&self) -> (u32, u32) {
    self.preprocessor.target_size()
  }

  pub fn mode(&self) -> InferenceMode {
    D::MODE
  }

  pub fn input_binding(&self) -> &EngineBinding {
    &self.input
  }

  pub fn output_dims(&self) -> &Dims {
    &self.output.shape
  }

  pub fn decoder(&self) -> &D {
    &self.decoder
  }

  pub fn decoder_mut(&mut self) -> &mut D {
    &mut self.decoder
  }

  pub fn is_disposed(&self) -> bool {
    self.engine.is_none()
  }

  /// 释放引擎，可重复调用
  pub fn dispose(&mut self) {
    if let Some(mut engine) = self.engine.take() {
      engine.release();
      info!("推理引擎已释放");
    }
  }
}

impl<E: Engine> Pipeline<E, DetectionDecoder> {
  pub fn iou_threshold(&self) -> f32 {
    self.decoder.iou_threshold()
  }

  pub fn set_iou_threshold(&mut self, value: f32) -> Result<(), PipelineError> {
    if self.engine.is_none() {
      return Err(PipelineError::UseAfterDispose);
    }
    check_threshold("IoU 阈值", value)?;
    self.decoder.set_iou_threshold(value);
    Ok(())
  }
}

impl<E: Engine> Pipeline<E, ClassificationDecoder> {
  /// 完整解码后截取前 `k` 项
  pub fn top_k(&mut self, image: &RgbImage, k: usize) -> Result<Vec<Classification>, PipelineError> {
    let results = self.infer(image)?;
    if let Some(best) = results.first() {
      debug!("Top-1: {}", best);
    }
    Ok(top_k(results, k))
  }
}

impl<E: Engine, D: Decoder> Drop for Pipeline<E, D> {
  fn drop(&mut self) {
    self.dispose();
  }
}

impl<E: Engine, D: Decoder> Model for Pipeline<E, D> {
  type Input = RgbImage;
  type Output = Vec<D::Output>;
  type Error = PipelineError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Pipeline::infer(self, input)
  }
}

fn first_binding(name: Option<String>, kind: &str) -> Result<String, PipelineError> {
  match name {
    Some(name) if !name.is_empty() => Ok(name),
    _ => Err(PipelineError::EngineInit(format!("{}绑定未命名", kind))),
  }
}

fn inspect_bindings<E: Engine>(
  engine: &E,
) -> Result<(EngineBinding, EngineBinding, Preprocessor), PipelineError> {
  let num_inputs = engine.input_count();
  let num_outputs = engine.output_count();
  debug!("模型输入数量: {}", num_inputs);
  debug!("模型输出数量: {}", num_outputs);
  if num_inputs == 0 || num_outputs == 0 {
    return Err(PipelineError::EngineInit(format!(
      "模型缺少输入或输出: 输入 {}, 输出 {}",
      num_inputs, num_outputs
    )));
  }

  let input_name = first_binding(engine.input_name(0), "输入")?;
  let output_name = first_binding(engine.output_name(0), "输出")?;
  let input_shape = engine
    .binding_shape(&input_name)
    .map_err(|e| PipelineError::EngineInit(e.to_string()))?;
  let output_shape = engine
    .binding_shape(&output_name)
    .map_err(|e| PipelineError::EngineInit(e.to_string()))?;

  if input_shape.rank() != 4 {
    return Err(PipelineError::EngineInit(format!(
      "输入维度必须为 4 (N, C, H, W), 实际为 {}",
      input_shape
    )));
  }
  if input_shape.get(0) != 1 {
    return Err(PipelineError::EngineInit(format!(
      "仅支持批大小为 1 的输入, 实际为 {}",
      input_shape
    )));
  }

  let to_u32 = |v: usize| {
    u32::try_from(v).map_err(|_| PipelineError::EngineInit(format!("输入维度过大: {}", input_shape)))
  };
  let preprocessor = Preprocessor::new(
    to_u32(input_shape.get(3))?,
    to_u32(input_shape.get(2))?,
    to_u32(input_shape.get(1))?,
  )
  .map_err(|e| PipelineError::EngineInit(e.to_string()))?;

  Ok((
    EngineBinding {
      name: input_name,
      shape: input_shape,
      is_input: true,
    },
    EngineBinding {
      name: output_name,
      shape: output_shape,
      is_input: false,
    },
    preprocessor,
  ))
}

/// 以单个互斥锁包装整个推理调用，供多线程共享
pub struct SharedPipeline<E: Engine, D: Decoder> {
  inner: Mutex<Pipeline<E, D>>,
}

impl<E: Engine, D: Decoder> SharedPipeline<E, D> {
  pub fn new(pipeline: Pipeline<E, D>) -> Self {
    Self {
      inner: Mutex::new(pipeline),
    }
  }

  pub fn infer(&self, image: &RgbImage) -> Result<Vec<D::Output>, PipelineError> {
    // 推理出错不会破坏流水线状态，锁中毒时继续使用
    let mut pipeline = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    pipeline.infer(image)
  }

  pub fn dispose(&self) {
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .dispose();
  }

  pub fn into_inner(self) -> Pipeline<E, D> {
    self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<E: Engine, D: Decoder> From<Pipeline<E, D>> for SharedPipeline<E, D> {
  fn from(pipeline: Pipeline<E, D>) -> Self {
    Self::new(pipeline)
  }
}

impl<E: Engine, D: Decoder> Model for SharedPipeline<E, D> {
  type Input = RgbImage;
  type Output = Vec<D::Output>;
  type Error = PipelineError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    SharedPipeline::infer(self, input)
  }
}
