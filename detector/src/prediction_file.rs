use std::{fs, path::PathBuf};

use image::RgbaImage;
use tracing::debug;

use crate::detector::{DetectionError, PredictionResponse, SymbolDetection, SymbolDetector};

/// 读取已保存的检测服务响应作为检测结果
///
/// 响应需对应同一张预处理后的图片
pub struct PredictionFileDetector {
    path: PathBuf,
}

impl PredictionFileDetector {
    /// 创建检测器
    ///
    /// # 参数
    ///
    /// * `path` - 检测服务响应文件路径
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SymbolDetector for PredictionFileDetector {
    fn detect(
        &self,
        image: &RgbaImage,
        confidence_threshold: f32,
    ) -> Result<Vec<SymbolDetection>, DetectionError> {
        let json = fs::read_to_string(&self.path).map_err(|e| {
            DetectionError::Unavailable(format!("读取 {} 失败: {}", self.path.display(), e))
        })?;
        let detections = PredictionResponse::parse(&json)?.into_detections(confidence_threshold)?;
        debug!(
            "从 {} 读取到 {} 个符号, 图片尺寸 {:?}",
            self.path.display(),
            detections.len(),
            image.dimensions()
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_detect_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"predictions": [
                {{"x": 100.0, "y": 80.0, "width": 60.0, "height": 30.0, "class": "rectangle", "confidence": 0.8}},
                {{"x": 100.0, "y": 20.0, "width": 60.0, "height": 30.0, "class": "oval", "confidence": 0.3}}
            ]}}"#
        )?;

        let detector = PredictionFileDetector::new(file.path());
        let detections = detector.detect(&RgbaImage::new(416, 416), 0.5)?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_label, "rectangle");

        let detections = detector.detect(&RgbaImage::new(416, 416), 0.2)?;
        assert_eq!(detections.len(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let detector = PredictionFileDetector::new("does-not-exist.json");
        let result = detector.detect(&RgbaImage::new(1, 1), 0.5);
        assert!(matches!(result, Err(DetectionError::Unavailable(_))));
    }
}
