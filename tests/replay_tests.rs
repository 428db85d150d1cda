// 该文件是 Beifeng （北风） 项目的一部分。
// tests/replay_tests.rs - 回放引擎端到端测试
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

#![cfg(all(feature = "replay_engine", feature = "read_image_file"))]

use std::path::{Path, PathBuf};

use beifeng::{
  FromUrl,
  engine::{ReplayBinding, ReplayEngine, ReplayScript},
  model::InferenceMode,
  pipeline::{PipelineError, Yolo11Builder, Yolo11Pipeline},
};
use image::{Rgb, RgbImage};
use url::Url;

fn write_script(dir: &Path, name: &str, output_shape: Vec<usize>, data: Vec<f32>) -> PathBuf {
  let script = ReplayScript {
    inputs: vec![ReplayBinding {
      name: "images".to_string(),
      shape: vec![1, 3, 32, 32],
      data: Vec::new(),
    }],
    outputs: vec![ReplayBinding {
      name: "output0".to_string(),
      shape: output_shape,
      data,
    }],
  };
  let path = dir.join(name);
  std::fs::write(&path, serde_json::to_string(&script).unwrap()).unwrap();
  path
}

/// 单个候选：中心 (16, 16)，尺寸 8x8，类别 1 分数 0.8
fn one_detection() -> (Vec<usize>, Vec<f32>) {
  let classes = 84 - 4;
  let mut data = vec![0.0; 84];
  data[..4].copy_from_slice(&[16.0, 16.0, 8.0, 8.0]);
  data[4 + 1] = 0.8;
  assert_eq!(data.len(), 4 + classes);
  (vec![1, 84, 1], data)
}

fn model_url(path: &Path, query: &str) -> Url {
  Url::parse(&format!("yolo11://{}?{}", path.display(), query)).unwrap()
}

#[test]
fn builds_detection_from_url() {
  let dir = tempfile::tempdir().unwrap();
  let (shape, data) = one_detection();
  let model = write_script(dir.path(), "yolo11n.engine", shape, data);
  let labels = dir.path().join("coco.names");
  std::fs::write(&labels, "person\nbicycle\n").unwrap();

  let url = model_url(&model, &format!("mode=detect&labels={}&conf=0.5", labels.display()));
  let pipeline = Yolo11Builder::from_url(&url)
    .unwrap()
    .build::<ReplayEngine>()
    .unwrap();
  let Yolo11Pipeline::Detection(mut pipeline) = pipeline else {
    panic!("期望检测流水线");
  };

  let image_path = dir.path().join("frame.png");
  RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]))
    .save(&image_path)
    .unwrap();
  let out = pipeline.infer_path(&image_path).unwrap();
  assert_eq!(out.len(), 1);
  assert_eq!(out[0].class_name, "bicycle");
  assert_eq!((out[0].x1, out[0].y1, out[0].x2, out[0].y2), (12.0, 12.0, 20.0, 20.0));
}

#[test]
fn classification_uses_placeholder_labels() {
  let dir = tempfile::tempdir().unwrap();
  let model = write_script(dir.path(), "cls.engine", vec![1, 4], vec![0.0, 5.0, 0.0, 0.0]);

  let pipeline = Yolo11Builder::new(&model)
    .mode(InferenceMode::Classification)
    .confidence_threshold(0.5)
    .build::<ReplayEngine>()
    .unwrap();
  assert_eq!(pipeline.mode(), InferenceMode::Classification);
  let Yolo11Pipeline::Classification(mut pipeline) = pipeline else {
    panic!("期望分类流水线");
  };

  let out = pipeline.infer(&RgbImage::new(10, 10)).unwrap();
  assert_eq!(out.len(), 1);
  assert_eq!(out[0].class_name, "class_1");
}

#[test]
fn detect_mode_inspects_first_output() {
  let dir = tempfile::tempdir().unwrap();
  let cls = write_script(dir.path(), "cls.engine", vec![1, 1000], Vec::new());
  let det = write_script(dir.path(), "det.engine", vec![1, 84, 8400], Vec::new());

  assert_eq!(
    Yolo11Builder::new(&cls).detect_mode::<ReplayEngine>().unwrap(),
    InferenceMode::Classification
  );
  assert_eq!(
    Yolo11Builder::new(&det).detect_mode::<ReplayEngine>().unwrap(),
    InferenceMode::Detection
  );
}

#[test]
fn unsupported_modes_are_reported() {
  let dir = tempfile::tempdir().unwrap();
  let model = write_script(dir.path(), "pose.engine", vec![1, 56, 8400], Vec::new());

  for mode in ["segment", "obb", "pose"] {
    let url = model_url(&model, &format!("mode={}", mode));
    let result = Yolo11Builder::from_url(&url).unwrap().build::<ReplayEngine>();
    assert!(matches!(result, Err(PipelineError::Unsupported(_))));
  }
}

#[test]
fn missing_and_malformed_engines() {
  let dir = tempfile::tempdir().unwrap();
  let missing = Yolo11Builder::new(dir.path().join("none.engine")).build::<ReplayEngine>();
  assert!(matches!(missing, Err(PipelineError::EngineLoad(_))));

  let broken = dir.path().join("broken.engine");
  std::fs::write(&broken, "not json").unwrap();
  let malformed = Yolo11Builder::new(&broken).build::<ReplayEngine>();
  assert!(matches!(malformed, Err(PipelineError::EngineLoad(_))));

  let invalid = Yolo11Builder::new(&broken)
    .confidence_threshold(0.0)
    .build::<ReplayEngine>();
  assert!(matches!(invalid, Err(PipelineError::InvalidArgument(_))));
}
