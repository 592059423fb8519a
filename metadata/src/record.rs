use std::fmt;

use anyhow::Result;
use common::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 流程图符号识别记录
///
/// 记录按中心点纵坐标自上而下排序, `id` 从 1 开始连续编号
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    #[schemars(title = "编号")]
    pub id: u32,
    #[schemars(title = "符号类型")]
    #[serde(rename = "type")]
    pub symbol_type: String,
    #[schemars(title = "中心点坐标 [x, y]", with = "(i32, i32)")]
    #[serde(with = "coordinates")]
    pub coordinates: Point,
    #[schemars(title = "识别文字")]
    pub text: String,
    #[schemars(title = "宽度")]
    pub width: i32,
    #[schemars(title = "高度")]
    pub height: i32,
    #[schemars(title = "匹配的指令或条件")]
    pub command: Option<String>,
}

impl DetectionRecord {
    /// 标注文字, 形如 `1. rectangle - start`
    pub fn label(&self) -> String {
        match &self.command {
            Some(command) => format!("{}. {} - {}", self.id, self.symbol_type, command),
            None => format!("{}. {}", self.id, self.symbol_type),
        }
    }
}

impl fmt::Display for DetectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "符号 {{ 编号: {}, 类型: {}, 坐标: ({}, {}), 尺寸: {}x{}, 文字: {:?}, 指令: {} }}",
            self.id,
            self.symbol_type,
            self.coordinates.x,
            self.coordinates.y,
            self.width,
            self.height,
            self.text,
            self.command.as_deref().unwrap_or("无")
        )
    }
}

/// 中心点坐标以 `[x, y]` 数组形式序列化
mod coordinates {
    use common::Point;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(point: &Point, serializer: S) -> Result<S::Ok, S::Error> {
        (point.x, point.y).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
        let (x, y) = <(i32, i32)>::deserialize(deserializer)?;
        Ok(Point { x, y })
    }
}

/// 识别记录序列化为 JSON, 缩进 4 个空格
///
/// # 参数
///
/// * `records` - 识别记录
pub fn records_to_json(records: &[DetectionRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    records.serialize(&mut serializer)?;
    Ok(String::from_utf8(buffer)?)
}

/// 从 JSON 解析识别记录
///
/// # 参数
///
/// * `json` - JSON 文本
pub fn records_from_json(json: &str) -> Result<Vec<DetectionRecord>> {
    Ok(serde_json::from_str(json)?)
}
