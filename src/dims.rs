// 该文件是 Beifeng （北风） 项目的一部分。
// src/dims.rs - 张量维度描述
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

use std::fmt;

use thiserror::Error;

/// 支持的最大维度数
pub const MAX_DIMS: usize = 8;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimsError {
  #[error("维度索引越界: {0} (最大 {MAX_DIMS})")]
  OutOfRange(usize),
}

/// 定长张量形状，最多 8 维
///
/// `rank` 记录最高已设置索引加一，调用方应按递增顺序设置各维度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dims {
  rank: usize,
  extent: [usize; MAX_DIMS],
}

impl Dims {
  pub fn new() -> Self {
    Self::default()
  }

  /// 由维度切片构造，超过 8 维时返回错误
  pub fn from_slice(extents: &[usize]) -> Result<Self, DimsError> {
    let mut dims = Self::new();
    for (index, &value) in extents.iter().enumerate() {
      dims.set(index, value)?;
    }
    Ok(dims)
  }

  pub fn rank(&self) -> usize {
    self.rank
  }

  pub fn set(&mut self, index: usize, value: usize) -> Result<(), DimsError> {
    if index >= MAX_DIMS {
      return Err(DimsError::OutOfRange(index));
    }
    self.extent[index] = value;
    if index >= self.rank {
      self.rank = index + 1;
    }
    Ok(())
  }

  /// 越界或未设置的维度返回 0
  pub fn get(&self, index: usize) -> usize {
    if index < self.rank {
      self.extent[index]
    } else {
      0
    }
  }

  /// 元素总数；空形状约定为 1
  pub fn element_count(&self) -> usize {
    self.as_slice().iter().product()
  }

  pub fn as_slice(&self) -> &[usize] {
    &self.extent[..self.rank]
  }
}

impl fmt::Display for Dims {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, value) in self.as_slice().iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", value)?;
    }
    write!(f, "]")
  }
}
