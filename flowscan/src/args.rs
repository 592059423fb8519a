use clap::Parser;
use tracing::Level;

/// flowscan 手绘流程图识别工具
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 流程图图片路径
    #[arg(short, long)]
    pub image: String,

    /// 识别结果输出目录
    #[arg(short, long, default_value = "detected_images")]
    pub output_dir: String,

    /// 配置文件路径, 未指定时使用默认配置
    #[arg(short, long)]
    pub settings_file: Option<String>,

    /// 符号检测服务响应文件 (JSON)
    #[arg(long, conflicts_with = "detector_model", required_unless_present = "detector_model")]
    pub predictions: Option<String>,

    /// 本地符号检测模型路径 (ONNX)
    #[arg(long, requires = "detector_classes")]
    pub detector_model: Option<String>,

    /// 本地符号检测模型类别文件, 每行一个类别
    #[arg(long)]
    pub detector_classes: Option<String>,

    /// 文字识别模型路径 (ONNX)
    #[arg(long, default_value = "PP-OCRv4_mobile_rec_infer.onnx")]
    pub ocr_model: String,

    /// 文字识别字符字典路径
    #[arg(long, default_value = "character_dict.txt")]
    pub ocr_dict: String,

    /// 标注字体路径, 未指定时尝试系统字体
    #[arg(long)]
    pub font: Option<String>,

    /// 额外输出仅含检测框的审计图片
    #[arg(long, default_value_t = false)]
    pub audit: bool,

    /// 日志等级 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Option<Level>,

    /// 日志文件路径
    #[arg(long, default_value = "flowscan.log")]
    pub log_file: String,

    /// 追加日志到文件
    #[arg(long, default_value_t = false)]
    pub append_log: bool,
}

impl Args {
    /// 创建命令行参数解析器
    pub fn new() -> Self {
        Self::parse()
    }
}
