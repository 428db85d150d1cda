// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/save_json_file.rs - 保存 JSON 结果文件
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

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, url_file_path};

#[derive(Error, Debug)]
pub enum SaveJsonFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径不是有效的 UTF-8: {0}")]
  InvalidPath(std::string::FromUtf8Error),
}

/// 将每次推理结果写入同一个 JSON 文件，后一次覆盖前一次
pub struct SaveJsonFileOutput {
  path: PathBuf,
}

#[derive(Serialize)]
struct Record<'a, T> {
  width: u32,
  height: u32,
  count: usize,
  results: &'a [T],
}

impl FromUrlWithScheme for SaveJsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for SaveJsonFileOutput {
  type Error = SaveJsonFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveJsonFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }
    let path = url_file_path(uri).map_err(SaveJsonFileError::InvalidPath)?;
    Ok(Self::new(path))
  }
}

impl SaveJsonFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl<T: Serialize> Render<RgbImage, Vec<T>> for SaveJsonFileOutput {
  type Error = SaveJsonFileError;

  fn render_result(&self, frame: &RgbImage, result: &Vec<T>) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveJsonFileError::IoError)?;
    }

    let (width, height) = frame.dimensions();
    let record = Record {
      width,
      height,
      count: result.len(),
      results: result,
    };
    let content = serde_json::to_string_pretty(&record).map_err(SaveJsonFileError::JsonError)?;
    std::fs::write(&self.path, content).map_err(SaveJsonFileError::IoError)?;

    info!("保存结果到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;

  #[test]
  fn writes_detections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("result.json");
    let output = SaveJsonFileOutput::new(&path);

    let detections = vec![Detection {
      x1: 1.0,
      y1: 2.0,
      x2: 3.0,
      y2: 4.0,
      confidence: 0.5,
      class_id: 7,
      class_name: "truck".to_string(),
    }];
    output
      .render_result(&RgbImage::new(16, 9), &detections)
      .unwrap();

    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["width"], 16);
    assert_eq!(value["count"], 1);
    assert_eq!(value["results"][0]["class_name"], "truck");
    assert_eq!(value["results"][0]["class_id"], 7);
  }

  #[test]
  fn output_path_is_percent_decoded() {
    let url = Url::parse("json:///结果/第 1 帧.json").unwrap();
    let output = SaveJsonFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), Path::new("/结果/第 1 帧.json"));
  }

  #[test]
  fn scheme_is_checked() {
    assert!(SaveJsonFileOutput::from_url(&Url::parse("json:///tmp/r.json").unwrap()).is_ok());
    assert!(matches!(
      SaveJsonFileOutput::from_url(&Url::parse("image:///tmp/r.json").unwrap()),
      Err(SaveJsonFileError::SchemeMismatch(_))
    ));
  }
}
