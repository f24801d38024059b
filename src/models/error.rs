use std::time::Duration;
use serde::Serialize;
use thiserror::Error;

/// 单行解析错误
///
/// 只影响出错的那一行，解析器记录日志后跳过该行，继续处理后续内容
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseLineError {
    #[error("第{line}行: 无法识别的VFX标注 `{annotation}`")]
    UnknownVfxLevel { line: usize, annotation: String },

    #[error("第{line}行: 无效的页码 `{value}`")]
    InvalidPageNumber { line: usize, value: String },

    #[error("第{line}行: 格式错误的标注 `{annotation}`")]
    MalformedAnnotation { line: usize, annotation: String },
}

impl ParseLineError {
    /// 出错的行号(从0开始)
    pub fn line(&self) -> usize {
        match self {
            ParseLineError::UnknownVfxLevel { line, .. }
            | ParseLineError::InvalidPageNumber { line, .. }
            | ParseLineError::MalformedAnnotation { line, .. } => *line,
        }
    }
}

/// 整体操作错误
#[derive(Error, Debug)]
pub enum BreakdownError {
    #[error("无效的输入: {0}")]
    InvalidInput(String),

    #[error("文档转换超时: {0:?}")]
    ConversionTimeout(Duration),

    #[error("页数统计参数无效: {0}")]
    MetricsDegenerate(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("后台任务失败: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// 统一结果类型
pub type BreakdownResult<T> = Result<T, BreakdownError>;
