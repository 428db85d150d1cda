// 该文件是 Beifeng （北风） 项目的一部分。
// src/output.rs - 结果输出
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
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Classification, Detection},
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod log_output;
pub use self::log_output::LogOutput;

#[cfg(feature = "save_json_file")]
mod save_json_file;
#[cfg(feature = "save_json_file")]
pub use self::save_json_file::{SaveJsonFileError, SaveJsonFileOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_json_file")]
  #[error("保存 JSON 文件错误: {0}")]
  SaveJsonFileError(#[from] SaveJsonFileError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

impl From<Infallible> for OutputError {
  fn from(never: Infallible) -> Self {
    match never {}
  }
}

/// 根据 URL 方案选择输出：`log://` 或 `json:///path/to/result.json`
pub enum OutputWrapper {
  Log(LogOutput),
  #[cfg(feature = "save_json_file")]
  SaveJsonFile(SaveJsonFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == LogOutput::SCHEME {
      return Ok(OutputWrapper::Log(LogOutput::from_url(url)?));
    }
    #[cfg(feature = "save_json_file")]
    {
      if url.scheme() == SaveJsonFileOutput::SCHEME {
        let output = SaveJsonFileOutput::from_url(url)?;
        return Ok(OutputWrapper::SaveJsonFile(output));
      }
    }
    Err(OutputError::SchemeMismatch)
  }
}

impl Render<RgbImage, Vec<Detection>> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbImage, result: &Vec<Detection>) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output.render_result(frame, result)?,
      #[cfg(feature = "save_json_file")]
      OutputWrapper::SaveJsonFile(output) => output.render_result(frame, result)?,
    }
    Ok(())
  }
}

impl Render<RgbImage, Vec<Classification>> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &RgbImage,
    result: &Vec<Classification>,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output.render_result(frame, result)?,
      #[cfg(feature = "save_json_file")]
      OutputWrapper::SaveJsonFile(output) => output.render_result(frame, result)?,
    }
    Ok(())
  }
}
