use std::path::Path;

use anyhow::{Context, Result, bail};
use detector::{PredictionFileDetector, SymbolDetector, YoloDetector, YoloParams};
use matcher::Matcher;
use metadata::{Settings, VOCABULARY};
use ocr::PPOcr;
use tracing::{error, info};

use crate::annotator::Annotator;
use crate::args::Args;
use crate::log::init_log;
use crate::output::{audit_path, write_image, write_outputs};
use crate::pipeline::Pipeline;
use crate::preprocess::load_image;

mod annotator;
mod args;
mod error;
mod extractor;
mod log;
mod output;
mod pipeline;
mod preprocess;

/// 根据命令行参数创建符号检测器
///
/// # 参数
///
/// * `args` - 命令行参数
/// * `settings` - 识别配置
fn build_detector(args: &Args, settings: &Settings) -> Result<Box<dyn SymbolDetector>> {
    if let Some(predictions) = &args.predictions {
        info!("使用检测服务响应文件: {}", predictions);
        return Ok(Box::new(PredictionFileDetector::new(predictions)));
    }
    match (&args.detector_model, &args.detector_classes) {
        (Some(model), Some(classes)) => {
            info!("使用本地检测模型: {}", model);
            let params = YoloParams {
                input_size: settings.detector_input_size,
                ..YoloParams::default()
            };
            Ok(Box::new(YoloDetector::new(
                Path::new(model),
                Path::new(classes),
                params,
            )?))
        }
        _ => bail!("需要指定检测服务响应文件或本地检测模型"),
    }
}

/// 程序入口
fn application() -> Result<()> {
    let args = Args::new();

    init_log(&args)?;

    info!("欢迎使用 flowscan 手绘流程图识别工具");

    let settings = match &args.settings_file {
        Some(settings_file) => Settings::load(settings_file)?,
        None => Settings::default(),
    };

    let image_path = Path::new(&args.image);
    if !image_path.exists() {
        bail!("图片文件 {} 不存在", args.image);
    }
    let image = load_image(image_path, settings.canvas_size)?;

    // 符号检测
    let detector = build_detector(&args, &settings)?;
    // OCR 识别
    let pp_ocr = PPOcr::new(Path::new(&args.ocr_model), Path::new(&args.ocr_dict))
        .context("文字识别模型初始化失败")?;
    // 词汇匹配
    let matcher = Matcher::new(&VOCABULARY);

    let pipeline = Pipeline::new(detector.as_ref(), &pp_ocr, &matcher, &settings);
    let records = pipeline.run(&image)?;
    for record in records.iter() {
        info!("{}", record);
    }

    let annotator = Annotator::new(args.font.as_deref().map(Path::new), settings.label.clone())?;
    let output_dir = Path::new(&args.output_dir);
    let annotated = annotator.annotate(&image, &records);
    write_outputs(output_dir, image_path, &records, &annotated)?;

    if args.audit {
        let path = audit_path(output_dir, image_path)?;
        write_image(&path, &annotator.audit(&image, &records))?;
        info!("审计图已保存: {}", path.display());
    }
    Ok(())
}

fn main() {
    match application() {
        Ok(_) => info!("程序已执行完毕"),
        Err(e) => {
            error!("程序存在异常: {:#}", e);
            std::process::exit(1);
        }
    }
}
