// crates/mh_config/src/error.rs

//! 配置层错误类型

use mh_foundation::error::MhError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效的配置路径
    #[error("无效的配置路径 '{path}': {reason}")]
    InvalidPath {
        /// 配置路径
        path: String,
        /// 原因
        reason: String,
    },

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },
}

impl ConfigError {
    /// 无效路径
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 无效值
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for MhError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => MhError::io_with_source("配置文件读写失败", e),
            ConfigError::Parse(msg) => MhError::config(msg),
            ConfigError::InvalidPath { path, reason } => {
                MhError::invalid_config(path, "<path>", reason)
            }
            ConfigError::InvalidValue { key, value, reason } => {
                MhError::invalid_config(key, value, reason)
            }
        }
    }
}
