use std::thread;

use detector::{SymbolDetection, SymbolDetector};
use image::RgbaImage;
use matcher::Matcher;
use metadata::{DetectionRecord, Settings};
use ocr::{Ocr, TextResult};
use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::{debug, info, warn};

use crate::{error::PipelineError, extractor::crop_detection};

/// 归一化符号类型: 转为小写并去除旋转标记
///
/// # 参数
///
/// * `class_label` - 符号类别
pub fn normalize_symbol_type(class_label: &str) -> String {
    class_label
        .to_lowercase()
        .replace("rotation", "")
        .trim_matches(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .to_string()
}

/// 按中心点纵坐标稳定排序并从 1 开始编号
///
/// # 参数
///
/// * `records` - 按检测顺序排列的识别记录
pub fn order_records(mut records: Vec<DetectionRecord>) -> Vec<DetectionRecord> {
    records.sort_by_key(|record| record.coordinates.y);
    for (index, record) in records.iter_mut().enumerate() {
        record.id = index as u32 + 1;
    }
    records
}

/// 流程图识别流程
pub struct Pipeline<'a> {
    detector: &'a dyn SymbolDetector,
    ocr: &'a dyn Ocr,
    matcher: &'a Matcher<'a>,
    settings: &'a Settings,
}

impl<'a> Pipeline<'a> {
    /// 创建识别流程
    ///
    /// # 参数
    ///
    /// * `detector` - 符号检测器
    /// * `ocr` - 文字识别器
    /// * `matcher` - 词汇匹配器
    /// * `settings` - 识别配置
    pub fn new(
        detector: &'a dyn SymbolDetector,
        ocr: &'a dyn Ocr,
        matcher: &'a Matcher<'a>,
        settings: &'a Settings,
    ) -> Self {
        Self {
            detector,
            ocr,
            matcher,
            settings,
        }
    }

    /// 识别符号区域中的文字
    ///
    /// 服务不可用时按配置间隔重试, 仍失败或输入被拒绝时视为未识别到文字,
    /// 仅授权失败会终止流程
    ///
    /// # 参数
    ///
    /// * `index` - 符号检测序号
    /// * `image` - 预处理后的图像
    /// * `detection` - 符号检测结果
    fn recognize_detection(
        &self,
        index: usize,
        image: &RgbaImage,
        detection: &SymbolDetection,
    ) -> Result<TextResult, PipelineError> {
        let Some(region) = crop_detection(image, detection) else {
            return Ok(TextResult::NoText);
        };

        let mut attempt = 0;
        loop {
            match self.ocr.recognize(&region) {
                Ok(result) => return Ok(result),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) if e.is_transient() && attempt < self.settings.ocr_retries => {
                    attempt += 1;
                    warn!("第 {} 个符号文字识别失败, 第 {} 次重试: {}", index + 1, attempt, e);
                    thread::sleep(self.settings.retry_delay(attempt));
                }
                Err(e) => {
                    warn!("第 {} 个符号文字识别失败, 按未识别到文字处理: {}", index + 1, e);
                    return Ok(TextResult::NoText);
                }
            }
        }
    }

    /// 识别单个符号: 裁剪, 文字识别, 词汇匹配
    ///
    /// # 参数
    ///
    /// * `index` - 符号检测序号
    /// * `image` - 预处理后的图像
    /// * `detection` - 符号检测结果
    fn interpret(
        &self,
        index: usize,
        image: &RgbaImage,
        detection: &SymbolDetection,
    ) -> Result<DetectionRecord, PipelineError> {
        let symbol_type = normalize_symbol_type(&detection.class_label);

        let text = match self.recognize_detection(index, image, detection)? {
            TextResult::Text(text) if !self.matcher.is_no_text(&text) => text,
            _ => String::new(),
        };

        let command = if text.is_empty() || self.settings.is_arrow(&symbol_type) {
            None
        } else {
            self.matcher
                .match_text(&text)
                .map(|entry| entry.phrase.clone())
        };

        debug!(
            "第 {} 个符号: 类型 {}, 文字 {:?}, 指令 {:?}",
            index + 1,
            symbol_type,
            text,
            command
        );

        Ok(DetectionRecord {
            id: 0,
            symbol_type,
            coordinates: detection.center,
            text,
            width: detection.width,
            height: detection.height,
            command,
        })
    }

    /// 识别流程图, 返回自上而下排列的识别记录
    ///
    /// # 参数
    ///
    /// * `image` - 预处理后的图像
    pub fn run(&self, image: &RgbaImage) -> Result<Vec<DetectionRecord>, PipelineError> {
        let detections = self
            .detector
            .detect(image, self.settings.confidence_threshold)?;
        info!("检测到 {} 个流程图符号", detections.len());

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .build()?;
        let records = pool.install(|| {
            detections
                .par_iter()
                .enumerate()
                .map(|(index, detection)| self.interpret(index, image, detection))
                .collect::<Result<Vec<_>, _>>()
        })?;

        Ok(order_records(records))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };

    use anyhow::Result;
    use common::Point;
    use detector::{DetectionError, PredictionResponse};
    use metadata::VOCABULARY;
    use ocr::RecognitionError;

    use super::*;

    struct FakeDetector {
        detections: Vec<SymbolDetection>,
    }

    impl SymbolDetector for FakeDetector {
        fn detect(
            &self,
            _image: &RgbaImage,
            confidence_threshold: f32,
        ) -> Result<Vec<SymbolDetection>, DetectionError> {
            Ok(self
                .detections
                .iter()
                .filter(|detection| detection.confidence >= confidence_threshold)
                .cloned()
                .collect())
        }
    }

    struct FailingDetector;

    impl SymbolDetector for FailingDetector {
        fn detect(
            &self,
            _image: &RgbaImage,
            _confidence_threshold: f32,
        ) -> Result<Vec<SymbolDetection>, DetectionError> {
            Err(DetectionError::Unavailable("connection refused".to_string()))
        }
    }

    /// 解析检测服务响应的检测器
    struct ResponseDetector(&'static str);

    impl SymbolDetector for ResponseDetector {
        fn detect(
            &self,
            _image: &RgbaImage,
            confidence_threshold: f32,
        ) -> Result<Vec<SymbolDetection>, DetectionError> {
            PredictionResponse::parse(self.0)?.into_detections(confidence_threshold)
        }
    }

    #[derive(Clone, Copy)]
    enum Reply {
        Text(&'static str),
        Unavailable,
        Rejected,
        Unauthorized,
        /// 前 N 次不可用, 之后返回文字
        Flaky(usize, &'static str),
    }

    /// 按裁剪区域尺寸返回预设结果
    struct FakeOcr {
        replies: HashMap<(u32, u32), Reply>,
        calls: AtomicUsize,
    }

    impl FakeOcr {
        fn new(replies: &[((u32, u32), Reply)]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Ocr for FakeOcr {
        fn recognize(&self, image: &RgbaImage) -> Result<TextResult, RecognitionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(&image.dimensions()) {
                Some(Reply::Text(text)) => Ok(TextResult::from_text(*text)),
                Some(Reply::Unavailable) => Err(RecognitionError::Unavailable("timeout".into())),
                Some(Reply::Rejected) => Err(RecognitionError::Rejected("bad image".into())),
                Some(Reply::Unauthorized) => {
                    Err(RecognitionError::Unauthorized("invalid key".into()))
                }
                Some(Reply::Flaky(failures, text)) => {
                    if call < *failures {
                        Err(RecognitionError::Unavailable("timeout".into()))
                    } else {
                        Ok(TextResult::from_text(*text))
                    }
                }
                None => Ok(TextResult::NoText),
            }
        }
    }

    fn detection(class_label: &str, x: i32, y: i32, width: i32, height: i32) -> SymbolDetection {
        SymbolDetection {
            class_label: class_label.to_string(),
            center: Point { x, y },
            width,
            height,
            confidence: 0.9,
        }
    }

    fn settings(workers: usize) -> Settings {
        Settings {
            workers,
            ocr_retry_delay: 0,
            ..Settings::default()
        }
    }

    fn run(
        detections: Vec<SymbolDetection>,
        ocr: &FakeOcr,
        settings: &Settings,
    ) -> Result<Vec<DetectionRecord>, PipelineError> {
        let detector = FakeDetector { detections };
        let matcher = Matcher::new(&VOCABULARY);
        let pipeline = Pipeline::new(&detector, ocr, &matcher, settings);
        pipeline.run(&RgbaImage::new(416, 416))
    }

    #[test]
    fn test_normalize_symbol_type() {
        assert_eq!(normalize_symbol_type("Arrow"), "arrow");
        assert_eq!(normalize_symbol_type("arrowRotation"), "arrow");
        assert_eq!(normalize_symbol_type("arrow-rotation"), "arrow");
        assert_eq!(normalize_symbol_type("rotation_arrowhead"), "arrowhead");
        assert_eq!(normalize_symbol_type("decision"), "decision");
    }

    #[test]
    fn test_order_records_is_stable() {
        let record = |text: &str, y: i32| DetectionRecord {
            id: 0,
            symbol_type: "rectangle".to_string(),
            coordinates: Point { x: 10, y },
            text: text.to_string(),
            width: 10,
            height: 10,
            command: None,
        };
        let ordered = order_records(vec![
            record("c", 300),
            record("a1", 100),
            record("b", 200),
            record("a2", 100),
            record("a3", 100),
        ]);
        let texts: Vec<&str> = ordered.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a1", "a2", "a3", "b", "c"]);
        let ids: Vec<u32> = ordered.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_flowchart_scenario() -> Result<()> {
        let ocr = FakeOcr::new(&[
            ((100, 40), Reply::Text("start")),
            ((10, 60), Reply::Text("ignored")),
            ((90, 80), Reply::Text("if obstcle ahead")),
        ]);
        let detections = vec![
            detection("decision", 208, 200, 90, 80),
            detection("rectangle", 208, 50, 100, 40),
            detection("arrow", 208, 120, 10, 60),
        ];

        for workers in [1, 4] {
            let records = run(detections.clone(), &ocr, &settings(workers))?;
            assert_eq!(records.len(), 3);

            assert_eq!(records[0].id, 1);
            assert_eq!(records[0].symbol_type, "rectangle");
            assert_eq!(records[0].text, "start");
            assert_eq!(records[0].command.as_deref(), Some("start"));

            assert_eq!(records[1].id, 2);
            assert_eq!(records[1].symbol_type, "arrow");
            assert_eq!(records[1].text, "ignored");
            assert_eq!(records[1].command, None);

            assert_eq!(records[2].id, 3);
            assert_eq!(records[2].symbol_type, "decision");
            assert_eq!(records[2].coordinates, Point { x: 208, y: 200 });
            assert_eq!(records[2].command.as_deref(), Some("if obstacle ahead"));
        }
        Ok(())
    }

    #[test]
    fn test_arrows_never_match() -> Result<()> {
        let ocr = FakeOcr::new(&[
            ((20, 60), Reply::Text("turn left")),
            ((22, 60), Reply::Text("stop")),
        ]);
        let detections = vec![
            detection("Arrow", 100, 100, 20, 60),
            detection("arrowheadRotation", 200, 100, 22, 60),
        ];
        let records = run(detections, &ocr, &Settings::default())?;
        assert!(records.iter().all(|record| record.command.is_none()));
        assert_eq!(records[0].text, "turn left");
        assert_eq!(records[1].symbol_type, "arrowhead");
        Ok(())
    }

    #[test]
    fn test_equal_y_keeps_detection_order() -> Result<()> {
        let ocr = FakeOcr::new(&[
            ((30, 30), Reply::Text("spin")),
            ((32, 30), Reply::Text("stop")),
            ((34, 30), Reply::Text("repeat")),
        ]);
        let detections = vec![
            detection("rectangle", 300, 150, 34, 30),
            detection("rectangle", 100, 150, 30, 30),
            detection("rectangle", 200, 150, 32, 30),
        ];
        let records = run(detections, &ocr, &settings(3))?;
        let commands: Vec<&str> = records
            .iter()
            .map(|record| record.command.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(commands, vec!["repeat", "spin", "stop"]);
        Ok(())
    }

    #[test]
    fn test_no_text_and_empty_regions() -> Result<()> {
        let ocr = FakeOcr::new(&[((40, 40), Reply::Text("No Text Detected"))]);
        let detections = vec![
            detection("rectangle", 100, 100, 40, 40),
            detection("rectangle", 100, 200, 50, 50),
            detection("rectangle", 100, 300, 0, 50),
            detection("rectangle", 900, 900, 50, 50),
        ];
        let records = run(detections, &ocr, &Settings::default())?;
        assert_eq!(records.len(), 4);
        for record in &records {
            assert_eq!(record.text, "");
            assert_eq!(record.command, None);
        }
        // 空区域不调用文字识别
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_recoverable_ocr_failures_degrade() -> Result<()> {
        let ocr = FakeOcr::new(&[
            ((40, 40), Reply::Unavailable),
            ((42, 40), Reply::Rejected),
            ((44, 40), Reply::Text("play sound")),
        ]);
        let detections = vec![
            detection("rectangle", 100, 100, 40, 40),
            detection("rectangle", 100, 200, 42, 40),
            detection("rectangle", 100, 300, 44, 40),
        ];
        let settings = Settings {
            workers: 1,
            ocr_retries: 2,
            ocr_retry_delay: 0,
            ..Settings::default()
        };
        let records = run(detections, &ocr, &settings)?;
        assert_eq!(records[0].text, "");
        assert_eq!(records[1].text, "");
        assert_eq!(records[2].command.as_deref(), Some("play sound"));
        // 不可用: 1 次 + 2 次重试; 拒绝: 1 次; 正常: 1 次
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 5);
        Ok(())
    }

    #[test]
    fn test_transient_failure_retried() -> Result<()> {
        let ocr = FakeOcr::new(&[((40, 40), Reply::Flaky(2, "turn right"))]);
        let detections = vec![detection("rectangle", 100, 100, 40, 40)];
        let records = run(detections, &ocr, &settings(1))?;
        assert_eq!(records[0].command.as_deref(), Some("turn right"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[test]
    fn test_retries_wait_between_attempts() -> Result<()> {
        let ocr = FakeOcr::new(&[((40, 40), Reply::Flaky(2, "spin"))]);
        let detections = vec![detection("rectangle", 100, 100, 40, 40)];
        let settings = Settings {
            workers: 1,
            ocr_retry_delay: 20,
            ..Settings::default()
        };
        let started = Instant::now();
        let records = run(detections, &ocr, &settings)?;
        // 20ms + 40ms
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(records[0].command.as_deref(), Some("spin"));
        Ok(())
    }

    #[test]
    fn test_unauthorized_ocr_is_fatal() {
        let ocr = FakeOcr::new(&[((40, 40), Reply::Unauthorized)]);
        let detections = vec![
            detection("rectangle", 100, 100, 40, 40),
            detection("rectangle", 100, 200, 44, 40),
        ];
        let result = run(detections, &ocr, &Settings::default());
        assert!(matches!(
            result,
            Err(PipelineError::Recognition(RecognitionError::Unauthorized(_)))
        ));
    }

    #[test]
    fn test_detection_failure_is_fatal() {
        let ocr = FakeOcr::new(&[]);
        let matcher = Matcher::new(&VOCABULARY);
        let settings = Settings::default();
        let pipeline = Pipeline::new(&FailingDetector, &ocr, &matcher, &settings);
        let result = pipeline.run(&RgbaImage::new(416, 416));
        assert!(matches!(result, Err(PipelineError::Detection(_))));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_out_of_range_coordinates_are_detection_errors() {
        let detector = ResponseDetector(
            r#"{"predictions": [{"x": 3e9, "y": 50.0, "width": 100.0, "height": 40.0, "class": "rectangle", "confidence": 0.9}]}"#,
        );
        let ocr = FakeOcr::new(&[]);
        let matcher = Matcher::new(&VOCABULARY);
        let settings = settings(2);
        let pipeline = Pipeline::new(&detector, &ocr, &matcher, &settings);
        let result = pipeline.run(&RgbaImage::new(416, 416));
        assert!(matches!(
            result,
            Err(PipelineError::Detection(DetectionError::InvalidResponse(_)))
        ));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_confidence_threshold_passed_to_detector() -> Result<()> {
        let ocr = FakeOcr::new(&[]);
        let mut weak = detection("rectangle", 100, 100, 40, 40);
        weak.confidence = 0.55;
        let detections = vec![weak, detection("oval", 100, 200, 40, 40)];
        let settings = Settings {
            confidence_threshold: 0.6,
            ..Settings::default()
        };
        let records = run(detections, &ocr, &settings)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol_type, "oval");
        Ok(())
    }
}
