//! Text Adapter - 上传文本来源

mod file_text_source;

pub use file_text_source::FileTextSource;
