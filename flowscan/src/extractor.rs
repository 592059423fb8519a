use common::{Region, Size, center_region, clamp_region};
use detector::SymbolDetection;
use image::{RgbaImage, imageops};
use tracing::debug;

/// 符号检测框对应的区域, 未限制在图像范围内
///
/// # 参数
///
/// * `detection` - 符号检测结果
pub fn detection_region(detection: &SymbolDetection) -> Region {
    center_region(&detection.center, detection.width, detection.height)
}

/// 裁剪符号所在区域用于文字识别
///
/// 超出图像的部分被截断, 截断后为空时返回 `None`
///
/// # 参数
///
/// * `image` - 预处理后的图像
/// * `detection` - 符号检测结果
pub fn crop_detection(image: &RgbaImage, detection: &SymbolDetection) -> Option<RgbaImage> {
    let region = detection_region(detection);
    let bounds = Size {
        width: image.width() as i32,
        height: image.height() as i32,
    };
    let Some(clamped) = clamp_region(&region, &bounds) else {
        debug!("符号 {} 的区域 {:?} 为空或超出图像范围", detection.class_label, region);
        return None;
    };
    if clamped != region {
        debug!("区域裁剪截断: {:?} -> {:?}", region, clamped);
    }
    Some(
        imageops::crop_imm(
            image,
            clamped.start.x as u32,
            clamped.start.y as u32,
            clamped.width(),
            clamped.height(),
        )
        .to_image(),
    )
}
