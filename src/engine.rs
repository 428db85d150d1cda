// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine.rs - 推理引擎适配层
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

use std::path::Path;

use thiserror::Error;

use crate::dims::Dims;

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("模型加载错误: {path}, 原因: {reason}")]
  Load { path: String, reason: String },
  #[error("绑定错误: {0}")]
  Binding(String),
  #[error("推理执行错误: {0}")]
  Runtime(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[cfg(feature = "replay_engine")]
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn load(path: &Path, reason: impl Into<String>) -> Self {
    EngineError::Load {
      path: path.display().to_string(),
      reason: reason.into(),
    }
  }
}

/// 输入/输出绑定元数据，构造流水线时获取一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinding {
  pub name: String,
  pub shape: Dims,
  pub is_input: bool,
}

/// 外部推理引擎
///
/// 实现方负责模型文件格式与实际执行；缓冲区在边界处按值复制，
/// 调用方不会持有引擎内部内存的引用。
pub trait Engine {
  fn load(path: &Path) -> Result<Self, EngineError>
  where
    Self: Sized;

  fn input_count(&self) -> usize;
  fn output_count(&self) -> usize;
  fn input_name(&self, index: usize) -> Option<String>;
  fn output_name(&self, index: usize) -> Option<String>;
  fn binding_shape(&self, name: &str) -> Result<Dims, EngineError>;

  fn set_input(&mut self, name: &str, data: &[f32]) -> Result<(), EngineError>;
  fn run(&mut self) -> Result<(), EngineError>;
  fn get_output(&mut self, name: &str) -> Result<Vec<f32>, EngineError>;

  /// 释放底层句柄，由流水线保证只调用一次
  fn release(&mut self);
}

#[cfg(feature = "replay_engine")]
mod replay;
#[cfg(feature = "replay_engine")]
pub use self::replay::{ReplayBinding, ReplayEngine, ReplayScript};
