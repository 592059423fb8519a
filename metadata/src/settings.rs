use std::{fs, time::Duration};

use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 标注文字样式
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LabelStyle {
    #[schemars(title = "字体大小(像素)")]
    pub font_scale: f32,
    #[schemars(title = "标注相对识别框右边缘的水平偏移")]
    pub offset_x: i32,
    #[schemars(title = "标注相对识别框上边缘的垂直偏移")]
    pub offset_y: i32,
    #[schemars(title = "识别框线宽")]
    pub thickness: i32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_scale: 24.0,
            offset_x: 5,
            offset_y: 15,
            thickness: 2,
        }
    }
}

/// 流程图识别配置
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    #[schemars(title = "符号检测最低置信度")]
    pub confidence_threshold: f32,
    #[schemars(title = "预处理后的画布边长")]
    pub canvas_size: u32,
    #[schemars(title = "本地检测模型的输入边长")]
    pub detector_input_size: u32,
    #[schemars(title = "并行识别文字的线程数(1 为顺序执行)")]
    pub workers: usize,
    #[schemars(title = "文字识别服务不可用时的重试次数")]
    pub ocr_retries: u32,
    #[schemars(title = "文字识别重试间隔(毫秒), 按重试次数递增")]
    pub ocr_retry_delay: u64,
    #[schemars(title = "连接线类符号(不参与指令匹配)")]
    pub arrow_classes: Vec<String>,
    #[schemars(title = "标注样式")]
    pub label: LabelStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            canvas_size: 416,
            detector_input_size: 416,
            workers: 4,
            ocr_retries: 2,
            ocr_retry_delay: 200,
            arrow_classes: vec!["arrow".to_string(), "arrowhead".to_string()],
            label: LabelStyle::default(),
        }
    }
}

impl Settings {
    /// 通过文件名加载配置
    ///
    /// # 参数
    ///
    /// * `settings_file` - 配置文件名
    pub fn load(settings_file: &str) -> Result<Settings> {
        let settings_data = fs::read(settings_file).context("读取配置文件失败")?;
        let settings = serde_yaml::from_slice::<Settings>(settings_data.as_slice())
            .context("解析配置文件失败, 请检查格式是否正确")?;
        settings.validate()?;
        Ok(settings)
    }

    /// 校验配置取值范围
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            bail!("置信度阈值 {} 超出范围 [0, 1]", self.confidence_threshold);
        }
        if self.canvas_size == 0 {
            bail!("画布边长不能为 0");
        }
        if self.detector_input_size == 0 {
            bail!("检测模型输入边长不能为 0");
        }
        if self.workers == 0 {
            bail!("线程数不能为 0");
        }
        Ok(())
    }

    /// 第 `attempt` 次重试前的等待时间
    ///
    /// # 参数
    ///
    /// * `attempt` - 重试次数, 从 1 开始
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.ocr_retry_delay.saturating_mul(attempt as u64))
    }

    /// 符号类型是否属于连接线
    ///
    /// # 参数
    ///
    /// * `symbol_type` - 归一化后的符号类型
    pub fn is_arrow(&self, symbol_type: &str) -> bool {
        self.arrow_classes.iter().any(|class| class == symbol_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() -> Result<()> {
        let settings: Settings = serde_yaml::from_str("workers: 1\nlabel:\n  font_scale: 12.0")?;
        assert_eq!(settings.workers, 1);
        assert_eq!(settings.confidence_threshold, 0.5);
        assert_eq!(settings.label.font_scale, 12.0);
        assert_eq!(settings.label.offset_x, 5);
        assert!(settings.is_arrow("arrowhead"));
        assert!(!settings.is_arrow("decision"));
        Ok(())
    }

    #[test]
    fn test_validate_threshold() {
        let settings = Settings {
            confidence_threshold: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_detector_input_size_independent_of_canvas() -> Result<()> {
        let settings: Settings = serde_yaml::from_str("detector_input_size: 640")?;
        assert_eq!(settings.detector_input_size, 640);
        assert_eq!(settings.canvas_size, 416);

        let settings = Settings {
            detector_input_size: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_retry_delay_grows_with_attempt() {
        let settings = Settings {
            ocr_retry_delay: 150,
            ..Settings::default()
        };
        assert_eq!(settings.retry_delay(1), Duration::from_millis(150));
        assert_eq!(settings.retry_delay(3), Duration::from_millis(450));
    }
}
