use std::{fs, path::Path, sync::Mutex};

use anyhow::{Context, Result, bail};
use common::Point;
use image::{
    RgbaImage,
    imageops::{self, FilterType},
};
use ndarray::{Array, ArrayBase, ArrayView2, Dim, OwnedRepr};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use tracing::debug;

use crate::detector::{DetectionError, SymbolDetection, SymbolDetector};

/// YOLO 检测参数
#[derive(Debug, Clone)]
pub struct YoloParams {
    /// 模型输入边长
    pub input_size: u32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 416,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }
}

/// 候选框, 坐标为原图像素
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_index: usize,
    score: f32,
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
}

impl Candidate {
    fn bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.cx - self.w / 2.0,
            self.cy - self.h / 2.0,
            self.cx + self.w / 2.0,
            self.cy + self.h / 2.0,
        )
    }
}

/// 基于 YOLO ONNX 模型的本地符号检测
pub struct YoloDetector {
    session: Mutex<Session>,
    class_names: Vec<String>,
    params: YoloParams,
}

impl YoloDetector {
    /// 创建检测器
    ///
    /// # 参数
    ///
    /// * `model_path` - ONNX 检测模型路径
    /// * `classes_path` - 类别名称文件, 每行一个, 顺序与模型输出一致
    /// * `params` - 检测参数
    pub fn new(model_path: &Path, classes_path: &Path, params: YoloParams) -> Result<Self> {
        let class_names: Vec<String> = fs::read_to_string(classes_path)
            .with_context(|| format!("读取类别文件 {} 失败", classes_path.display()))?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if class_names.is_empty() {
            bail!("类别文件 {} 为空", classes_path.display());
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("加载检测模型 {} 失败", model_path.display()))?;

        debug!(
            "符号检测模型加载成功: {}, 类别 {:?}",
            model_path.display(),
            class_names
        );

        Ok(Self {
            session: Mutex::new(session),
            class_names,
            params,
        })
    }

    /// 将图像拉伸到模型输入尺寸并转换为张量
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    /// * `input_size` - 模型输入边长
    fn image_to_tensor(image: &RgbaImage, input_size: u32) -> ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>> {
        let resized = imageops::resize(image, input_size, input_size, FilterType::Triangle);
        let size = input_size as usize;
        let mut input = Array::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            input[[0, 0, y as usize, x as usize]] = r as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = g as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = b as f32 / 255.0;
        }
        input
    }
}

/// 解析 `[4 + 类别数, 候选数]` 形状的模型输出
///
/// 每列为 `cx, cy, w, h, 类别分数...`, 坐标为模型输入像素
///
/// # 参数
///
/// * `output` - 模型输出
/// * `num_classes` - 类别数
/// * `confidence_threshold` - 最低置信度
/// * `scale` - 模型输入坐标到原图坐标的缩放 `(x, y)`
fn decode_candidates(
    output: ArrayView2<f32>,
    num_classes: usize,
    confidence_threshold: f32,
    scale: (f32, f32),
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for column in output.columns() {
        let Some((class_index, &score)) = column
            .iter()
            .skip(4)
            .take(num_classes)
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };
        if score < confidence_threshold {
            continue;
        }
        candidates.push(Candidate {
            class_index,
            score,
            cx: column[0] * scale.0,
            cy: column[1] * scale.1,
            w: column[2] * scale.0,
            h: column[3] * scale.1,
        });
    }
    candidates
}

/// 计算两个候选框的交并比
fn calculate_iou(a: &Candidate, b: &Candidate) -> f32 {
    let (ax1, ay1, ax2, ay2) = a.bounds();
    let (bx1, by1, bx2, by2) = b.bounds();

    let x_min = ax1.max(bx1);
    let y_min = ay1.max(by1);
    let x_max = ax2.min(bx2);
    let y_max = ay2.min(by2);

    if x_max <= x_min || y_max <= y_min {
        return 0.0;
    }

    let intersection = (x_max - x_min) * (y_max - y_min);
    let union = a.w * a.h + b.w * b.h - intersection;
    if union > 0.0 { intersection / union } else { 0.0 }
}

/// 按类别进行非极大值抑制, 结果按分数从高到低排列
///
/// # 参数
///
/// * `candidates` - 候选框
/// * `iou_threshold` - 交并比阈值
/// * `max_detections` - 最多保留数量
fn apply_nms(mut candidates: Vec<Candidate>, iou_threshold: f32, max_detections: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.len() >= max_detections {
            break;
        }
        let suppressed = keep.iter().any(|kept| {
            kept.class_index == candidate.class_index
                && calculate_iou(kept, &candidate) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

impl SymbolDetector for YoloDetector {
    fn detect(
        &self,
        image: &RgbaImage,
        confidence_threshold: f32,
    ) -> Result<Vec<SymbolDetection>, DetectionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidResponse("输入图像为空".to_string()));
        }
        let input_size = self.params.input_size;
        let tensor = Self::image_to_tensor(image, input_size);
        let tensor = TensorRef::from_array_view(tensor.view())
            .map_err(|e| DetectionError::Unavailable(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectionError::Unavailable(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectionError::Unavailable(e.to_string()))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        let num_classes = self.class_names.len();
        if shape.len() != 3 || shape[0] != 1 || shape[1] as usize != 4 + num_classes {
            return Err(DetectionError::InvalidResponse(format!(
                "意想不到的输出形状: {:?}, 类别数 {}",
                shape, num_classes
            )));
        }
        let output = ArrayView2::from_shape((shape[1] as usize, shape[2] as usize), data)
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        let scale = (
            width as f32 / input_size as f32,
            height as f32 / input_size as f32,
        );
        let candidates = decode_candidates(output, num_classes, confidence_threshold, scale);
        let kept = apply_nms(candidates, self.params.iou_threshold, self.params.max_detections);

        let detections = kept
            .iter()
            .map(|candidate| SymbolDetection {
                class_label: self.class_names[candidate.class_index].clone(),
                center: Point {
                    x: candidate.cx as i32,
                    y: candidate.cy as i32,
                },
                width: candidate.w as i32,
                height: candidate.h as i32,
                confidence: candidate.score,
            })
            .collect::<Vec<_>>();
        debug!("检测到 {} 个符号", detections.len());
        Ok(detections)
    }
}
