use detector::DetectionError;
use ocr::RecognitionError;
use thiserror::Error;

/// 流程图识别流程错误
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("无法读取图片 {path}: {source}")]
    ImageUnreadable {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("创建识别线程池失败: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
