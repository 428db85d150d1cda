// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/replay.rs - 回放引擎
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

//! 从 JSON 文件回放预先录制的输出张量，用于在没有加速器的环境中
//! 调试后处理流程。
//!
//! ```json
//! {
//!   "inputs": [{ "name": "images", "shape": [1, 3, 640, 640] }],
//!   "outputs": [{ "name": "output0", "shape": [1, 84, 8400], "data": [] }]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Engine, EngineError};
use crate::dims::Dims;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayBinding {
  pub name: String,
  pub shape: Vec<usize>,
  #[serde(default)]
  pub data: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
  pub inputs: Vec<ReplayBinding>,
  pub outputs: Vec<ReplayBinding>,
}

pub struct ReplayEngine {
  script: ReplayScript,
  uploaded: Option<(String, usize)>,
  executed: bool,
  released: bool,
}

impl ReplayEngine {
  pub fn from_script(script: ReplayScript) -> Self {
    Self {
      script,
      uploaded: None,
      executed: false,
      released: false,
    }
  }

  pub fn is_released(&self) -> bool {
    self.released
  }

  /// 最近一次上传的输入名称与元素数量
  pub fn last_upload(&self) -> Option<(&str, usize)> {
    self
      .uploaded
      .as_ref()
      .map(|(name, len)| (name.as_str(), *len))
  }

  fn find(&self, name: &str) -> Option<&ReplayBinding> {
    self
      .script
      .inputs
      .iter()
      .chain(self.script.outputs.iter())
      .find(|binding| binding.name == name)
  }

  fn check_alive(&self) -> Result<(), EngineError> {
    if self.released {
      return Err(EngineError::Runtime("引擎已释放".to_string()));
    }
    Ok(())
  }
}

impl Engine for ReplayEngine {
  fn load(path: &Path) -> Result<Self, EngineError> {
    info!("加载回放脚本: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let script: ReplayScript = serde_json::from_str(&content)?;
    debug!(
      "回放脚本: {} 个输入, {} 个输出",
      script.inputs.len(),
      script.outputs.len()
    );
    Ok(Self::from_script(script))
  }

  fn input_count(&self) -> usize {
    self.script.inputs.len()
  }

  fn output_count(&self) -> usize {
    self.script.outputs.len()
  }

  fn input_name(&self, index: usize) -> Option<String> {
    self.script.inputs.get(index).map(|b| b.name.clone())
  }

  fn output_name(&self, index: usize) -> Option<String> {
    self.script.outputs.get(index).map(|b| b.name.clone())
  }

  fn binding_shape(&self, name: &str) -> Result<Dims, EngineError> {
    let binding = self
      .find(name)
      .ok_or_else(|| EngineError::Binding(format!("未知绑定: {}", name)))?;
    Dims::from_slice(&binding.shape).map_err(|e| EngineError::Binding(e.to_string()))
  }

  fn set_input(&mut self, name: &str, data: &[f32]) -> Result<(), EngineError> {
    self.check_alive()?;
    let binding = self
      .script
      .inputs
      .iter()
      .find(|b| b.name == name)
      .ok_or_else(|| EngineError::Binding(format!("未知输入: {}", name)))?;

    let expected: usize = binding.shape.iter().product();
    if data.len() != expected {
      return Err(EngineError::Binding(format!(
        "输入 {} 长度不匹配: 期望 {}, 实际 {}",
        name,
        expected,
        data.len()
      )));
    }
    self.uploaded = Some((name.to_string(), data.len()));
    self.executed = false;
    Ok(())
  }

  fn run(&mut self) -> Result<(), EngineError> {
    self.check_alive()?;
    if self.uploaded.is_none() {
      return Err(EngineError::Runtime("尚未设置输入".to_string()));
    }
    self.executed = true;
    Ok(())
  }

  fn get_output(&mut self, name: &str) -> Result<Vec<f32>, EngineError> {
    self.check_alive()?;
    if !self.executed {
      return Err(EngineError::Runtime("尚未执行推理".to_string()));
    }
    let binding = self
      .script
      .outputs
      .iter()
      .find(|b| b.name == name)
      .ok_or_else(|| EngineError::Binding(format!("未知输出: {}", name)))?;
    Ok(binding.data.clone())
  }

  fn release(&mut self) {
    if self.released {
      warn!("回放引擎被重复释放");
    }
    self.released = true;
  }
}
