// 该文件是 Beifeng （北风） 项目的一部分。
// src/lib.rs - 库主文件
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

//! YOLO11 推理后处理流水线
//!
//! 推理引擎由 [`engine::Engine`] 抽象，流水线负责信箱预处理、结果解码
//! 与非极大值抑制。

use std::{path::PathBuf, string::FromUtf8Error};

pub mod dims;
pub mod engine;
pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 URL 路径还原为本地路径，百分号编码按 UTF-8 解码
pub fn url_file_path(url: &url::Url) -> Result<PathBuf, FromUtf8Error> {
  urlencoding::decode(url.path()).map(|path| PathBuf::from(path.into_owned()))
}
