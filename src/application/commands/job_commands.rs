//! Job Commands

use crate::domain::job::JobId;

/// 书稿文本来源
#[derive(Debug, Clone)]
pub enum TextInput {
    /// 直接提交的纯文本
    Text(String),
    /// 已上传文件的引用（由 TextSourcePort 解析）
    Upload(String),
}

/// 提交生成任务
#[derive(Debug, Clone)]
pub struct SubmitJob {
    pub title: String,
    pub voice_id: String,
    pub input: TextInput,
}

/// 取消任务
#[derive(Debug, Clone)]
pub struct CancelJob {
    pub job_id: JobId,
}

/// 基于失败 / 取消的任务重新生成
#[derive(Debug, Clone)]
pub struct ResumeJob {
    pub job_id: JobId,
}
