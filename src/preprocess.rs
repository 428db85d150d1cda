// 该文件是 Beifeng （北风） 项目的一部分。
// src/preprocess.rs - 信箱缩放预处理
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

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::debug;

use crate::frame::{Letterbox, NchwTensor, Preprocessed};

/// 信箱填充灰度值
pub const LETTERBOX_FILL: u8 = 114;

const RGB_CHANNELS: u32 = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImage { width: u32, height: u32 },
  #[error("参数无效: {0}")]
  InvalidArgument(String),
}

/// 信箱几何参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxGeometry {
  /// 前向缩放比例（原图 → 模型）
  pub scale: f32,
  pub new_width: u32,
  pub new_height: u32,
  pub pad_x: u32,
  pub pad_y: u32,
}

impl LetterboxGeometry {
  pub fn compute(
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
  ) -> Result<Self, PreprocessError> {
    if src_width == 0 || src_height == 0 {
      return Err(PreprocessError::InvalidImage {
        width: src_width,
        height: src_height,
      });
    }

    let scale = (dst_width as f32 / src_width as f32).min(dst_height as f32 / src_height as f32);
    let new_width = ((src_width as f32 * scale).floor() as u32).min(dst_width);
    let new_height = ((src_height as f32 * scale).floor() as u32).min(dst_height);

    Ok(Self {
      scale,
      new_width,
      new_height,
      pad_x: (dst_width - new_width) / 2,
      pad_y: (dst_height - new_height) / 2,
    })
  }

  pub fn letterbox(&self) -> Letterbox {
    Letterbox {
      scale_x: 1.0 / self.scale,
      scale_y: 1.0 / self.scale,
      pad_x: self.pad_x as i32,
      pad_y: self.pad_y as i32,
    }
  }
}

/// 将图像转换为模型输入张量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
  width: u32,
  height: u32,
  channels: u32,
}

impl Preprocessor {
  pub fn new(width: u32, height: u32, channels: u32) -> Result<Self, PreprocessError> {
    if width == 0 || height == 0 {
      return Err(PreprocessError::InvalidArgument(format!(
        "目标尺寸必须为正数, 实际为 {}x{}",
        width, height
      )));
    }
    if channels != 1 && channels != RGB_CHANNELS {
      return Err(PreprocessError::InvalidArgument(format!(
        "仅支持 1 或 {} 个通道, 实际为 {}",
        RGB_CHANNELS, channels
      )));
    }
    Ok(Self {
      width,
      height,
      channels,
    })
  }

  pub fn target_size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn channels(&self) -> u32 {
    self.channels
  }

  pub fn preprocess(&self, image: &RgbImage) -> Result<Preprocessed, PreprocessError> {
    let (src_width, src_height) = image.dimensions();
    let geometry = LetterboxGeometry::compute(src_width, src_height, self.width, self.height)?;

    let mut canvas = RgbImage::from_pixel(self.width, self.height, Rgb([LETTERBOX_FILL; 3]));
    // 极端长宽比下缩放区域可能为空，此时只保留填充
    if geometry.new_width > 0 && geometry.new_height > 0 {
      let resized = imageops::resize(
        image,
        geometry.new_width,
        geometry.new_height,
        FilterType::Triangle,
      );
      imageops::replace(
        &mut canvas,
        &resized,
        geometry.pad_x as i64,
        geometry.pad_y as i64,
      );
    }

    let tensor = self.to_tensor(&canvas);

    debug!("原图尺寸: {}x{}", src_width, src_height);
    debug!("模型输入尺寸: {}x{}", self.width, self.height);
    debug!("缩放比例: {:.3}", 1.0 / geometry.scale);
    debug!("填充: ({}, {})", geometry.pad_x, geometry.pad_y);

    Ok(Preprocessed {
      tensor,
      letterbox: geometry.letterbox(),
    })
  }

  /// 处理 BGR 顺序的紧凑像素缓冲区
  pub fn preprocess_bgr(
    &self,
    data: &[u8],
    width: u32,
    height: u32,
  ) -> Result<Preprocessed, PreprocessError> {
    if width == 0 || height == 0 {
      return Err(PreprocessError::InvalidImage { width, height });
    }
    let expected = (width as usize) * (height as usize) * RGB_CHANNELS as usize;
    if data.len() < expected {
      return Err(PreprocessError::InvalidArgument(format!(
        "BGR 数据长度不足: 期望 {}, 实际 {}",
        expected,
        data.len()
      )));
    }

    let row = width as usize;
    let image = RgbImage::from_fn(width, height, |x, y| {
      let offset = ((y as usize) * row + (x as usize)) * RGB_CHANNELS as usize;
      Rgb([data[offset + 2], data[offset + 1], data[offset]])
    });
    self.preprocess(&image)
  }

  /// 单通道模型使用亮度，三通道按 R、G、B 排列
  fn to_tensor(&self, canvas: &RgbImage) -> NchwTensor {
    let mut tensor = NchwTensor::with_shape(
      self.channels as usize,
      self.height as usize,
      self.width as usize,
    );
    let plane = (self.height as usize) * (self.width as usize);
    let slice = tensor.as_mut();

    if self.channels == 1 {
      let luma = imageops::grayscale(canvas);
      for (x, y, pixel) in luma.enumerate_pixels() {
        let offset = (y as usize) * (self.width as usize) + (x as usize);
        slice[offset] = pixel[0] as f32 / 255.0;
      }
      return tensor;
    }

    for (x, y, pixel) in canvas.enumerate_pixels() {
      let offset = (y as usize) * (self.width as usize) + (x as usize);
      for c in 0..self.channels as usize {
        slice[c * plane + offset] = pixel[c] as f32 / 255.0;
      }
    }
    tensor
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const FILL: f32 = LETTERBOX_FILL as f32 / 255.0;

  #[test]
  fn geometry_for_landscape_image() {
    let geometry = LetterboxGeometry::compute(1280, 720, 640, 640).unwrap();
    assert_eq!(geometry.scale, 0.5);
    assert_eq!((geometry.new_width, geometry.new_height), (640, 360));
    assert_eq!((geometry.pad_x, geometry.pad_y), (0, 140));

    let letterbox = geometry.letterbox();
    assert_eq!(letterbox.scale_x, 2.0);
    assert_eq!(letterbox.scale_y, 2.0);
  }

  #[test]
  fn geometry_floors_odd_padding() {
    let geometry = LetterboxGeometry::compute(128, 42, 64, 64).unwrap();
    assert_eq!(geometry.new_width, 64);
    assert_eq!(geometry.new_height, 21);
    assert_eq!(geometry.pad_y, 21);
  }

  #[test]
  fn zero_sized_image_is_rejected() {
    let preprocessor = Preprocessor::new(64, 64, 3).unwrap();
    let image = RgbImage::new(0, 10);
    assert_eq!(
      preprocessor.preprocess(&image).unwrap_err(),
      PreprocessError::InvalidImage {
        width: 0,
        height: 10
      }
    );
  }

  #[test]
  fn invalid_target_is_rejected() {
    assert!(Preprocessor::new(0, 640, 3).is_err());
    assert!(Preprocessor::new(640, 640, 4).is_err());
    assert!(Preprocessor::new(640, 640, 2).is_err());
  }

  #[test]
  fn tensor_has_expected_length_and_range() {
    let preprocessor = Preprocessor::new(64, 48, 3).unwrap();
    let image = RgbImage::from_fn(37, 91, |x, y| {
      Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let result = preprocessor.preprocess(&image).unwrap();
    assert_eq!(result.tensor.len(), 3 * 48 * 64);
    assert!(
      result
        .tensor
        .as_slice()
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
    );
  }

  #[test]
  fn padding_is_mid_gray_and_content_is_rgb() {
    let preprocessor = Preprocessor::new(8, 8, 3).unwrap();
    // 8x4 纯红图像，缩放比例 1，上下各填充 2 行
    let image = RgbImage::from_pixel(8, 4, Rgb([255, 0, 0]));
    let result = preprocessor.preprocess(&image).unwrap();
    let tensor = &result.tensor;
    let data = tensor.as_slice();

    assert_eq!(result.letterbox.pad_x, 0);
    assert_eq!(result.letterbox.pad_y, 2);
    for c in 0..3 {
      assert_eq!(data[tensor.index(c, 0, 0)], FILL);
      assert_eq!(data[tensor.index(c, 7, 7)], FILL);
    }
    assert_eq!(data[tensor.index(0, 3, 4)], 1.0);
    assert_eq!(data[tensor.index(1, 3, 4)], 0.0);
    assert_eq!(data[tensor.index(2, 3, 4)], 0.0);
  }

  #[test]
  fn single_channel_uses_luma() {
    let preprocessor = Preprocessor::new(4, 4, 1).unwrap();
    let image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
    let result = preprocessor.preprocess(&image).unwrap();
    let tensor = &result.tensor;
    assert_eq!(tensor.len(), 4 * 4);

    let expected = imageops::grayscale(&image).get_pixel(1, 1)[0] as f32 / 255.0;
    let value = tensor.as_slice()[tensor.index(0, 1, 1)];
    assert_eq!(value, expected);
    // 亮度而非红色通道
    assert!(value < 1.0 && value > 0.0);
  }

  #[test]
  fn bgr_offsets_span_rows() {
    let preprocessor = Preprocessor::new(3, 2, 3).unwrap();
    // 3x2 BGR 图像，最后一个像素为纯红
    let mut data = vec![0u8; 3 * 2 * 3];
    data[17] = 255;
    let result = preprocessor.preprocess_bgr(&data, 3, 2).unwrap();
    let tensor = &result.tensor;
    let slice = tensor.as_slice();
    assert_eq!(slice[tensor.index(0, 1, 2)], 1.0);
    assert_eq!(slice[tensor.index(2, 1, 2)], 0.0);
    assert_eq!(slice[tensor.index(0, 0, 0)], 0.0);
  }

  #[test]
  fn bgr_source_is_swapped() {
    let preprocessor = Preprocessor::new(2, 2, 3).unwrap();
    // BGR 顺序的纯蓝像素
    let data = [255u8, 0, 0].repeat(4);
    let result = preprocessor.preprocess_bgr(&data, 2, 2).unwrap();
    let tensor = &result.tensor;
    let slice = tensor.as_slice();
    assert_eq!(slice[tensor.index(0, 1, 1)], 0.0);
    assert_eq!(slice[tensor.index(2, 1, 1)], 1.0);
  }

  #[test]
  fn short_bgr_buffer_is_rejected() {
    let preprocessor = Preprocessor::new(2, 2, 3).unwrap();
    assert!(matches!(
      preprocessor.preprocess_bgr(&[0u8; 5], 2, 2),
      Err(PreprocessError::InvalidArgument(_))
    ));
  }

  #[test]
  fn extreme_aspect_ratio_keeps_fill() {
    let preprocessor = Preprocessor::new(16, 16, 3).unwrap();
    let image = RgbImage::from_pixel(1, 1000, Rgb([0, 0, 0]));
    let result = preprocessor.preprocess(&image).unwrap();
    assert_eq!(result.tensor.len(), 3 * 16 * 16);
  }
}
