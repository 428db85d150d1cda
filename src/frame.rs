// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - NCHW 浮点帧与信箱变换
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

/// 通道优先的浮点张量，布局为 `[c][y][x]`
#[derive(Debug, Clone, PartialEq)]
pub struct NchwTensor {
  data: Box<[f32]>,
  channels: usize,
  height: usize,
  width: usize,
}

impl NchwTensor {
  pub fn with_shape(channels: usize, height: usize, width: usize) -> Self {
    let data = vec![0.0f32; channels * height * width].into_boxed_slice();
    Self {
      data,
      channels,
      height,
      width,
    }
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
    c * self.height * self.width + y * self.width + x
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_inner(self) -> Box<[f32]> {
    self.data
  }
}

impl AsMut<[f32]> for NchwTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

/// 信箱几何变换：模型坐标 → 原图坐标
///
/// `scale_x`/`scale_y` 是前向缩放比例的倒数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale_x: f32,
  pub scale_y: f32,
  pub pad_x: i32,
  pub pad_y: i32,
}

impl Default for Letterbox {
  fn default() -> Self {
    Self::identity()
  }
}

impl Letterbox {
  /// 无缩放、无填充
  pub fn identity() -> Self {
    Self {
      scale_x: 1.0,
      scale_y: 1.0,
      pad_x: 0,
      pad_y: 0,
    }
  }

  pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
    (
      (x - self.pad_x as f32) * self.scale_x,
      (y - self.pad_y as f32) * self.scale_y,
    )
  }

  pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
    (
      x / self.scale_x + self.pad_x as f32,
      y / self.scale_y + self.pad_y as f32,
    )
  }
}

/// 预处理结果，每次推理独立生成，由解码器消费一次
#[derive(Debug, Clone)]
pub struct Preprocessed {
  pub tensor: NchwTensor,
  pub letterbox: Letterbox,
}
