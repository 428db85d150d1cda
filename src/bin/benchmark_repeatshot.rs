// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理基准
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use beifeng::{
  FromUrl,
  engine::ReplayEngine,
  input::ImageFileInput,
  output::OutputWrapper,
  pipeline::{Yolo11Builder, Yolo11Pipeline},
  task::{RepeatShotTask, Task},
};

/// Beifeng 重复推理基准
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出
  #[arg(long, value_name = "OUTPUT", default_value = "log://?verbose=false")]
  pub output: Url,
  /// 推理次数
  #[arg(long, default_value_t = 1000)]
  pub repeat: usize,
  /// 预热次数
  #[arg(long, default_value_t = 2)]
  pub warmup: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("重复次数: {}, 预热次数: {}", args.repeat, args.warmup);

  let input = ImageFileInput::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let task = RepeatShotTask::default()
    .with_repeat(args.repeat)
    .with_warmup(args.warmup);

  let average = match Yolo11Builder::from_url(&args.model)?.build::<ReplayEngine>()? {
    Yolo11Pipeline::Detection(pipeline) => task.run_task(input, pipeline, output)?,
    Yolo11Pipeline::Classification(pipeline) => task.run_task(input, pipeline, output)?,
  };
  if let Some(average) = average {
    info!("平均推理时间: {:.2?}", average);
  }

  Ok(())
}
