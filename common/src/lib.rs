use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

//常用结构体

/// 尺寸
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    #[schemars(title = "宽度")]
    pub width: i32,
    #[schemars(title = "高度")]
    pub height: i32,
}

/// 点坐标
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    #[schemars(title = "X 坐标")]
    pub x: i32,
    #[schemars(title = "Y 坐标")]
    pub y: i32,
}

/// 区域
///
/// 左上角坐标为 `start`，右下角坐标为 `end`
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    #[schemars(title = "区域左上角坐标")]
    pub start: Point,
    #[schemars(title = "区域右下角坐标")]
    pub end: Point,
}

impl Region {
    /// 区域宽度, 右下角在左上角左侧时为 0
    pub fn width(&self) -> u32 {
        self.end.x.saturating_sub(self.start.x).max(0) as u32
    }

    /// 区域高度, 右下角在左上角上方时为 0
    pub fn height(&self) -> u32 {
        self.end.y.saturating_sub(self.start.y).max(0) as u32
    }

    /// 区域是否为空
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// 为点增加偏移量
///
/// # 参数
///
/// - `point` - 点坐标
/// - `offset_x` - X 轴偏移量
/// - `offset_y` - Y 轴偏移量
pub fn point_offset(point: &Point, offset_x: Option<i32>, offset_y: Option<i32>) -> Point {
    let mut point = *point;
    if let Some(x) = offset_x {
        point.x = point.x.saturating_add(x);
    }
    if let Some(y) = offset_y {
        point.y = point.y.saturating_add(y);
    }
    point
}

/// 中心点与宽高转为区域
///
/// 半宽与半高均向下取整, 即 `[x - w/2, y - h/2, x + w/2, y + h/2]`
///
/// # 参数
///
/// - `center` - 中心点坐标
/// - `width` - 宽度
/// - `height` - 高度
pub fn center_region(center: &Point, width: i32, height: i32) -> Region {
    let half_width = width.div_euclid(2);
    let half_height = height.div_euclid(2);
    Region {
        start: point_offset(center, Some(-half_width), Some(-half_height)),
        end: point_offset(center, Some(half_width), Some(half_height)),
    }
}

/// 将区域限制在图像范围内
///
/// 超出部分被截断, 截断后面积为 0 时返回 `None`
///
/// # 参数
///
/// - `region` - 区域
/// - `bounds` - 图像尺寸
pub fn clamp_region(region: &Region, bounds: &Size) -> Option<Region> {
    let clamp = |point: &Point| Point {
        x: point.x.clamp(0, bounds.width.max(0)),
        y: point.y.clamp(0, bounds.height.max(0)),
    };
    let clamped = Region {
        start: clamp(&region.start),
        end: clamp(&region.end),
    };
    if clamped.is_empty() {
        None
    } else {
        Some(clamped)
    }
}
