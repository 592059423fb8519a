use std::path::Path;

use image::{
    DynamicImage, ImageDecoder, ImageError, ImageReader, RgbaImage,
    imageops::{self, FilterType},
};
use tracing::debug;

use crate::error::PipelineError;

/// 读取流程图图片: 按 EXIF 方向摆正, 并拉伸到正方形画布
///
/// # 参数
///
/// * `path` - 图片路径
/// * `canvas_size` - 画布边长
pub fn load_image(path: &Path, canvas_size: u32) -> Result<RgbaImage, PipelineError> {
    let unreadable = |source: ImageError| PipelineError::ImageUnreadable {
        path: path.display().to_string(),
        source,
    };

    let mut decoder = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| unreadable(ImageError::IoError(e)))?
        .into_decoder()
        .map_err(unreadable)?;
    let orientation = decoder.orientation().map_err(unreadable)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(unreadable)?;
    image.apply_orientation(orientation);

    debug!(
        "读取图片 {}: 原始尺寸 {:?}, 方向 {:?}",
        path.display(),
        (image.width(), image.height()),
        orientation
    );
    Ok(normalize_canvas(&image.to_rgba8(), canvas_size))
}

/// 将图像拉伸到 `canvas_size` x `canvas_size`
///
/// # 参数
///
/// * `image` - 摆正后的图像
/// * `canvas_size` - 画布边长
pub fn normalize_canvas(image: &RgbaImage, canvas_size: u32) -> RgbaImage {
    imageops::resize(image, canvas_size, canvas_size, FilterType::Lanczos3)
}
