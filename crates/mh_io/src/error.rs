// crates/mh_io/src/error.rs
//! IO 错误类型定义
//!
//! 提供 IO 模块的统一错误枚举，支持通过 thiserror 自动转换底层错误。
//! 所有错误最终可转换为 MhError 以实现跨层错误传递。

use mh_foundation::MhError;
use thiserror::Error;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 底层 IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 文件格式识别失败
    #[error("无法识别文件格式: {path}")]
    UnknownFormat {
        /// 文件路径
        path: String,
    },

    /// 解析错误
    #[error("文件解析错误: {file}:{line} - {message}")]
    ParseError {
        /// 文件路径
        file: String,
        /// 行号
        line: usize,
        /// 错误信息
        message: String,
    },

    /// CSV 读写错误
    #[error("CSV 错误: {0}")]
    Csv(#[from] csv::Error),

    /// 容器损坏
    #[error("容器损坏: {file}, 原因: {reason}")]
    Corrupted {
        /// 文件路径
        file: String,
        /// 原因
        reason: String,
    },

    /// 版本不兼容
    #[error("版本不兼容: 文件版本 {file}, 当前版本 {current}")]
    Version {
        /// 文件版本
        file: u32,
        /// 当前支持的版本
        current: u32,
    },

    /// 校验和错误
    #[error("校验和错误: 期望 {expected:08x}, 实际 {found:08x}")]
    Checksum {
        /// 文件中记录的值
        expected: u32,
        /// 计算得到的值
        found: u32,
    },

    /// 基础层错误转换
    #[error("基础层错误: {0}")]
    Foundation(#[from] MhError),
}

impl IoError {
    /// 解析错误
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// 容器损坏
    pub fn corrupted(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

impl From<IoError> for MhError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Io(e) => MhError::from(e),
            IoError::UnknownFormat { path } => {
                MhError::invalid_input(format!("无法识别文件格式: {path}"))
            }
            IoError::ParseError { file, line, message } => MhError::parse(file, line, message),
            IoError::Csv(e) => MhError::serialization(format!("CSV: {e}")),
            IoError::Corrupted { file, reason } => {
                MhError::serialization(format!("{file}: {reason}"))
            }
            IoError::Version { file, current } => MhError::serialization(format!(
                "不支持的容器版本 {file} (当前 {current})"
            )),
            IoError::Checksum { expected, found } => MhError::serialization(format!(
                "校验和不匹配: 期望 {expected:08x}, 实际 {found:08x}"
            )),
            IoError::Foundation(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_converts() {
        let err: MhError = IoError::parse("lake_sh_1.csv", 3, "bad float").into();
        assert!(matches!(err, MhError::ParseError { line: 3, .. }));
    }

    #[test]
    fn test_foundation_passthrough() {
        let err: MhError = IoError::from(MhError::missing_table("lake_hq_3")).into();
        assert!(matches!(err, MhError::MissingTable { .. }));
    }
}
