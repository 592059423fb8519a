mod record;
mod settings;
mod vocabulary;

use lazy_static::lazy_static;

pub use record::*;
pub use settings::*;
pub use vocabulary::*;

lazy_static! {
    /// 流程图词汇表, 进程启动后只读
    pub static ref VOCABULARY: Vocabulary =
        Vocabulary::new().expect("加载内置词汇表失败");
}
