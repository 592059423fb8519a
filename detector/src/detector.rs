use common::Point;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 符号检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDetection {
    /// 符号类别, 如 `arrow`, `rectangle`, `decision`
    pub class_label: String,
    pub center: Point,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

impl SymbolDetection {
    /// 由检测服务返回的预测构造检测结果, 坐标与尺寸向零取整
    ///
    /// # 参数
    ///
    /// * `prediction` - 单个预测
    pub fn from_prediction(prediction: &Prediction) -> Self {
        Self {
            class_label: prediction.class.clone(),
            center: Point {
                x: prediction.x as i32,
                y: prediction.y as i32,
            },
            width: prediction.width as i32,
            height: prediction.height as i32,
            confidence: prediction.confidence,
        }
    }
}

/// 检测服务返回的单个预测, 中心点坐标与宽高均为像素
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prediction {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub class: String,
    pub confidence: f32,
}

impl Prediction {
    /// 校验中心点坐标与宽高可以表示为像素
    fn validate(&self) -> Result<(), DetectionError> {
        // i32::MAX 转为 f32 后为 2^31, 取开区间
        let limit = i32::MAX as f32;
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= -limit || value >= limit {
                return Err(DetectionError::InvalidResponse(format!(
                    "符号 {} 的 {} 超出范围: {}",
                    self.class, name, value
                )));
            }
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(DetectionError::InvalidResponse(format!(
                "符号 {} 的尺寸为负: {} x {}",
                self.class, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// 检测服务响应
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PredictionResponse {
    pub predictions: Vec<Prediction>,
}

impl PredictionResponse {
    /// 解析检测服务响应
    ///
    /// # 参数
    ///
    /// * `json` - 响应内容
    pub fn parse(json: &str) -> Result<Self, DetectionError> {
        serde_json::from_str(json).map_err(|e| DetectionError::InvalidResponse(e.to_string()))
    }

    /// 转换为检测结果, 丢弃置信度低于阈值的预测, 保持原有顺序
    ///
    /// 坐标或尺寸非有限值, 尺寸为负或超出 `i32` 范围时返回 [`DetectionError::InvalidResponse`]
    ///
    /// # 参数
    ///
    /// * `confidence_threshold` - 最低置信度
    pub fn into_detections(
        self,
        confidence_threshold: f32,
    ) -> Result<Vec<SymbolDetection>, DetectionError> {
        self.predictions
            .iter()
            .filter(|prediction| prediction.confidence >= confidence_threshold)
            .map(|prediction| {
                prediction.validate()?;
                Ok(SymbolDetection::from_prediction(prediction))
            })
            .collect()
    }
}

/// 符号检测错误
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("符号检测服务不可用: {0}")]
    Unavailable(String),
    #[error("符号检测结果无法解析: {0}")]
    InvalidResponse(String),
}

/// 符号检测接口
pub trait SymbolDetector: Send + Sync {
    /// 检测整张图片中的流程图符号
    ///
    /// # 参数
    ///
    /// * `image` - 预处理后的图片
    /// * `confidence_threshold` - 最低置信度
    fn detect(
        &self,
        image: &RgbaImage,
        confidence_threshold: f32,
    ) -> Result<Vec<SymbolDetection>, DetectionError>;
}
