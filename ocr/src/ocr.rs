use image::RgbaImage;
use thiserror::Error;

/// OCR 结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextResult {
    /// 识别到的非空文字
    Text(String),
    /// 识别完成但没有文字
    NoText,
}

impl TextResult {
    /// 由识别文字构造结果, 空白文字视为未识别到文字
    ///
    /// # 参数
    ///
    /// * `text` - 识别文字
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            TextResult::NoText
        } else {
            TextResult::Text(text)
        }
    }

    /// 识别文字, 未识别到时为空字符串
    pub fn text(&self) -> &str {
        match self {
            TextResult::Text(text) => text,
            TextResult::NoText => "",
        }
    }
}

/// OCR 错误
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// 识别服务暂时不可用, 可重试
    #[error("文字识别服务不可用: {0}")]
    Unavailable(String),
    /// 输入图像无法识别, 重试无意义
    #[error("文字识别拒绝了输入图像: {0}")]
    Rejected(String),
    /// 识别服务拒绝授权, 后续识别均会失败
    #[error("文字识别服务授权失败: {0}")]
    Unauthorized(String),
}

impl RecognitionError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(self, RecognitionError::Unavailable(_))
    }

    /// 是否需要终止整个流程
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecognitionError::Unauthorized(_))
    }
}

/// OCR 接口
pub trait Ocr: Send + Sync {
    /// 识别图片中的文字
    ///
    /// # 参数
    ///
    /// * `image` - 待识别的图片
    fn recognize(&self, image: &RgbaImage) -> Result<TextResult, RecognitionError>;
}
