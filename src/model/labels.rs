// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/labels.rs - 类别名称表
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

use tracing::{info, warn};

/// 类别编号到名称的映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
  names: Vec<String>,
}

impl Labels {
  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 生成 `class_<id>` 形式的占位名称
  pub fn placeholder(count: usize) -> Self {
    Self {
      names: (0..count).map(|i| format!("class_{}", i)).collect(),
    }
  }

  /// 每行一个类别名称，跳过空行
  pub fn load(path: &Path) -> std::io::Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let names: Vec<String> = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    info!("从 {} 加载了 {} 个类别名称", path.display(), names.len());
    Ok(Self { names })
  }

  /// 无法读取类别文件时使用占位名称
  pub fn load_or_default(path: Option<&Path>, default_count: usize) -> Self {
    match path {
      Some(path) => match Self::load(path) {
        Ok(labels) => labels,
        Err(e) => {
          warn!(
            "无法读取类别文件 {}: {}，使用 {} 个默认类别名称",
            path.display(),
            e,
            default_count
          );
          Self::placeholder(default_count)
        }
      },
      None => Self::placeholder(default_count),
    }
  }

  /// 超出列表范围的编号返回 `unknown_<id>`
  pub fn name(&self, id: usize) -> String {
    self
      .names
      .get(id)
      .cloned()
      .unwrap_or_else(|| format!("unknown_{}", id))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}
