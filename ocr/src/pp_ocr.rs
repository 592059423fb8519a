use std::{fs, path::Path, sync::Mutex};

use anyhow::{Context, Result, anyhow, bail};
use image::{
    RgbaImage,
    imageops::{self, FilterType},
};

use ndarray::{Array, ArrayBase, ArrayView2, Dim, OwnedRepr};
use ort::{
    session::{Session, SessionOutputs, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use tracing::debug;

use crate::ocr::{Ocr, RecognitionError, TextResult};

/// 模型输入高度
const TARGET_HEIGHT: u32 = 48;

/// 基于 PaddleOCR 文本行识别模型的 OCR 实现
pub struct PPOcr {
    session: Mutex<Session>,
    character_dict: Vec<String>,
}

impl PPOcr {
    /// 创建 PPOcr 实例
    ///
    /// # 参数
    ///
    /// * `model_path` - ONNX 识别模型路径
    /// * `dict_path` - 字符字典路径, 每行一个字符
    pub fn new(model_path: &Path, dict_path: &Path) -> Result<PPOcr> {
        let character_dict: Vec<String> = fs::read_to_string(dict_path)
            .with_context(|| format!("读取字符字典 {} 失败", dict_path.display()))?
            .lines()
            .map(String::from)
            .collect();
        if character_dict.is_empty() {
            bail!("字符字典 {} 为空", dict_path.display());
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("加载识别模型 {} 失败", model_path.display()))?;

        debug!("文字识别模型加载成功: {}", model_path.display());

        Ok(PPOcr {
            session: Mutex::new(session),
            character_dict,
        })
    }

    /// 将图像转换为张量数组数据
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    fn image_to_tensor_array_data(image: &RgbaImage) -> ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>> {
        let (width, height) = image.dimensions();

        let target_width =
            (((width as f32 / height as f32) * TARGET_HEIGHT as f32) as u32).max(1);

        let resized_image =
            imageops::resize(image, target_width, TARGET_HEIGHT, FilterType::Triangle);
        let mut input = Array::zeros((1, 3, TARGET_HEIGHT as usize, target_width as usize));

        for (x, y, pixel) in resized_image.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;

            input[[0, 0, y as usize, x as usize]] = r as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = g as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = b as f32 / 255.0;
        }
        input
    }

    /// 处理模型输出
    ///
    /// # 参数
    ///
    /// * `outputs` - 模型输出
    fn handle_session_outputs(&self, outputs: &SessionOutputs) -> Result<TextResult> {
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;

        if output_shape.len() != 3 {
            return Err(anyhow!("意想不到的输出形状: {:?}", output_shape));
        }

        let batch_size_out = output_shape[0] as usize;
        let seq_len = output_shape[1] as usize;
        let num_classes = output_shape[2] as usize;
        let expected_len = batch_size_out * seq_len * num_classes;

        if batch_size_out == 0 || output_data.len() != expected_len {
            return Err(anyhow!("意想不到的输出长度: {}", output_data.len()));
        }

        let preds = ArrayView2::from_shape((seq_len, num_classes), &output_data[..seq_len * num_classes])
            .map_err(|e| anyhow!("转换输出到数组视图失败: {}", e))?;

        let (text, confidence) = ctc_greedy_decode(preds, &self.character_dict)?;
        debug!("识别结果: {:?}, 置信度: {}", text, confidence);

        Ok(TextResult::from_text(text))
    }
}

/// CTC 贪心解码
///
/// 每个时间步取概率最大的类别, 合并相邻重复类别并去除空白类别 (索引 0)
///
/// # 参数
///
/// * `preds` - 形状为 `[时间步, 类别数]` 的概率
/// * `character_dict` - 字符字典, 类别 `i` 对应 `character_dict[i - 1]`
fn ctc_greedy_decode(preds: ArrayView2<f32>, character_dict: &[String]) -> Result<(String, f32)> {
    let blank_index = 0;
    let mut previous = None;
    let mut text = String::new();
    let mut probs = Vec::new();

    for row in preds.outer_iter() {
        let Some((idx, &prob)) = row.iter().enumerate().max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };
        if previous != Some(idx) && idx != blank_index {
            let character = character_dict
                .get(idx - 1)
                .ok_or_else(|| anyhow!("类别 {} 超出字符字典范围", idx))?;
            text.push_str(character);
            probs.push(prob);
        }
        previous = Some(idx);
    }

    if probs.is_empty() {
        return Ok((String::new(), 0.0));
    }
    let confidence = probs.iter().sum::<f32>() / probs.len() as f32;
    Ok((text.trim().to_string(), confidence))
}

impl Ocr for PPOcr {
    /// 识别图像中的文本
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    fn recognize(&self, image: &RgbaImage) -> Result<TextResult, RecognitionError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(TextResult::NoText);
        }
        let tensor = PPOcr::image_to_tensor_array_data(image);
        let tensor = TensorRef::from_array_view(tensor.view())
            .map_err(|e| RecognitionError::Rejected(e.to_string()))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;
        self.handle_session_outputs(&outputs)
            .map_err(|e| RecognitionError::Rejected(e.to_string()))
    }
}
