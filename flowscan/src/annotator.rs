use std::{fs, path::Path};

use ab_glyph::FontVec;
use anyhow::{Context, Result, anyhow};
use common::{center_region, point_offset};
use image::{Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use metadata::{DetectionRecord, LabelStyle};
use tracing::{debug, info};

const BBOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

const TEXT_COLOR: Rgba<u8> = Rgba([27, 117, 147, 255]);

const SYSTEM_FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 识别结果标注器
pub struct Annotator {
    font: Option<FontVec>,
    style: LabelStyle,
}

impl Annotator {
    /// 创建标注器
    ///
    /// 未指定字体时尝试加载系统字体, 均不可用时只绘制识别框
    ///
    /// # 参数
    ///
    /// * `font_path` - 字体路径
    /// * `style` - 标注样式
    pub fn new(font_path: Option<&Path>, style: LabelStyle) -> Result<Self> {
        let font = match font_path {
            Some(path) => Some(load_font(path)?),
            None => SYSTEM_FONT_PATHS.iter().find_map(|path| {
                let font = load_font(Path::new(path)).ok()?;
                info!("使用系统字体: {}", path);
                Some(font)
            }),
        };
        if font.is_none() {
            debug!("没有可用字体, 标注时跳过文字");
        }
        Ok(Self { font, style })
    }

    /// 绘制识别框
    ///
    /// # 参数
    ///
    /// * `canvas` - 画布
    /// * `record` - 识别记录
    fn draw_box(&self, canvas: &mut RgbaImage, record: &DetectionRecord) {
        let region = center_region(&record.coordinates, record.width, record.height);
        if region.is_empty() {
            return;
        }
        for thickness in 0..self.style.thickness.max(1) {
            let rect = Rect::at(region.start.x - thickness, region.start.y - thickness).of_size(
                region.width() + (2 * thickness) as u32,
                region.height() + (2 * thickness) as u32,
            );
            draw_hollow_rect_mut(canvas, rect, BBOX_COLOR);
        }
    }

    /// 在识别框右侧绘制 `编号. 类型 - 指令` 标注
    ///
    /// # 参数
    ///
    /// * `canvas` - 画布
    /// * `record` - 识别记录
    fn draw_label(&self, canvas: &mut RgbaImage, record: &DetectionRecord) {
        let Some(font) = &self.font else {
            return;
        };
        let region = center_region(&record.coordinates, record.width, record.height);
        let anchor = point_offset(
            &region.end,
            Some(self.style.offset_x),
            Some(region.start.y - region.end.y + self.style.offset_y),
        );
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            anchor.x,
            anchor.y,
            self.style.font_scale,
            font,
            &record.label(),
        );
    }

    /// 生成带编号与指令标注的识别结果图
    ///
    /// # 参数
    ///
    /// * `image` - 预处理后的图像
    /// * `records` - 识别记录
    pub fn annotate(&self, image: &RgbaImage, records: &[DetectionRecord]) -> RgbaImage {
        let mut canvas = image.clone();
        for record in records {
            self.draw_box(&mut canvas, record);
            self.draw_label(&mut canvas, record);
        }
        canvas
    }

    /// 生成仅含检测框的审计图
    ///
    /// # 参数
    ///
    /// * `image` - 预处理后的图像
    /// * `records` - 识别记录
    pub fn audit(&self, image: &RgbaImage, records: &[DetectionRecord]) -> RgbaImage {
        let mut canvas = image.clone();
        for record in records {
            self.draw_box(&mut canvas, record);
        }
        canvas
    }
}

/// 加载字体文件
///
/// # 参数
///
/// * `path` - 字体路径
fn load_font(path: &Path) -> Result<FontVec> {
    let data = fs::read(path).with_context(|| format!("读取字体 {} 失败", path.display()))?;
    FontVec::try_from_vec(data).map_err(|_| anyhow!("解析字体 {} 失败", path.display()))
}

#[cfg(test)]
mod tests {
    use common::Point;

    use super::*;

    fn record(x: i32, y: i32, width: i32, height: i32) -> DetectionRecord {
        DetectionRecord {
            id: 1,
            symbol_type: "rectangle".to_string(),
            coordinates: Point { x, y },
            text: "stop".to_string(),
            width,
            height,
            command: Some("stop".to_string()),
        }
    }

    fn annotator() -> Annotator {
        Annotator {
            font: None,
            style: LabelStyle::default(),
        }
    }

    #[test]
    fn test_annotate_draws_box_on_copy() {
        let image = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let annotated = annotator().annotate(&image, &[record(50, 50, 40, 20)]);

        // 左上角 (30, 40), 线宽 2 向外扩展
        assert_eq!(annotated.get_pixel(30, 40), &BBOX_COLOR);
        assert_eq!(annotated.get_pixel(29, 39), &BBOX_COLOR);
        assert_eq!(annotated.get_pixel(50, 50), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(30, 40), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_boxes_clipped_and_empty_skipped() {
        let image = RgbaImage::new(50, 50);
        let records = [record(45, 45, 30, 30), record(10, 10, 0, 10)];
        let audit = annotator().audit(&image, &records);
        assert_eq!(audit.get_pixel(30, 30), &BBOX_COLOR);
        assert_eq!(audit.get_pixel(10, 10), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_missing_font_file() {
        let result = Annotator::new(Some(Path::new("no-such-font.ttf")), LabelStyle::default());
        assert!(result.is_err());
    }
}
