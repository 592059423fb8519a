use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use image::{DynamicImage, RgbaImage};
use metadata::{DetectionRecord, records_to_json};
use tracing::info;

/// 识别结果输出文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// 识别记录 JSON, 以源图片名 (不含扩展名) 命名
    pub records: PathBuf,
    /// 标注图片, 与源图片同名
    pub image: PathBuf,
}

/// 源图片文件名, 作为输出文件的关联键
///
/// # 参数
///
/// * `source` - 源图片路径
fn source_names(source: &Path) -> Result<(String, String)> {
    let basename = source
        .file_name()
        .and_then(|name| name.to_str())
        .context("源图片路径没有文件名")?
        .to_string();
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(&basename)
        .to_string();
    Ok((basename, stem))
}

/// 写出识别记录与标注图片
///
/// 标注图片路径与源图片为同一文件时报错, 不覆盖源图片
///
/// # 参数
///
/// * `output_dir` - 输出目录
/// * `source` - 源图片路径
/// * `records` - 识别记录
/// * `annotated` - 标注图片
pub fn write_outputs(
    output_dir: &Path,
    source: &Path,
    records: &[DetectionRecord],
    annotated: &RgbaImage,
) -> Result<OutputPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("创建输出目录 {} 失败", output_dir.display()))?;
    let (basename, stem) = source_names(source)?;

    let image_path = output_dir.join(&basename);
    if is_same_file(&image_path, source)? {
        bail!(
            "输出目录 {} 与源图片所在目录相同, 标注图片会覆盖源图片 {}",
            output_dir.display(),
            source.display()
        );
    }

    let records_path = output_dir.join(format!("{}.json", stem));
    fs::write(&records_path, records_to_json(records)?)
        .with_context(|| format!("写入识别记录 {} 失败", records_path.display()))?;

    write_image(&image_path, annotated)?;

    info!(
        "识别结果已保存: {}, {}",
        records_path.display(),
        image_path.display()
    );
    Ok(OutputPaths {
        records: records_path,
        image: image_path,
    })
}

/// 两个路径是否指向同一文件, 任一路径不存在时为 `false`
///
/// # 参数
///
/// * `a` - 路径
/// * `b` - 路径
fn is_same_file(a: &Path, b: &Path) -> Result<bool> {
    if !a.exists() || !b.exists() {
        return Ok(false);
    }
    let a = a
        .canonicalize()
        .with_context(|| format!("解析路径 {} 失败", a.display()))?;
    let b = b
        .canonicalize()
        .with_context(|| format!("解析路径 {} 失败", b.display()))?;
    Ok(a == b)
}

/// 以 RGB 格式保存图片, 格式由扩展名决定
///
/// # 参数
///
/// * `path` - 保存路径
/// * `image` - 图片
pub fn write_image(path: &Path, image: &RgbaImage) -> Result<()> {
    DynamicImage::ImageRgba8(image.clone())
        .to_rgb8()
        .save(path)
        .with_context(|| format!("保存图片 {} 失败", path.display()))
}

/// 审计图保存路径, 形如 `chart_detections.png`
///
/// # 参数
///
/// * `output_dir` - 输出目录
/// * `source` - 源图片路径
pub fn audit_path(output_dir: &Path, source: &Path) -> Result<PathBuf> {
    let (_, stem) = source_names(source)?;
    Ok(output_dir.join(format!("{}_detections.png", stem)))
}
