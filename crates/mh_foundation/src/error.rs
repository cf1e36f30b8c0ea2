// crates/mh_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `MhError` 枚举和 `MhResult` 类型别名，用于整个工作区的错误处理。
//! 各 crate 的局部错误（`ConfigError`、`IoError`）均可转换为 `MhError`。
//!
//! # 错误分类
//!
//! - **IO/解析**：文件读写、CSV/TOML/容器解析
//! - **命名**：名称翻译表之外的键
//! - **工作流验证**：变量列表长度不一致、缺少变量列表
//! - **存储访问**：字段/表/数据源不存在、网格参考不一致
//! - **数据一致性**：要素数量与参数数量不一致、缺少参数化方案
//!
//! # 示例
//!
//! ```
//! use mh_foundation::error::{MhError, MhResult};
//!
//! fn check(vars: &[&str], paths: &[&str]) -> MhResult<()> {
//!     MhError::check_lengths("variables", vars.len(), "wflow_variables", paths.len())
//! }
//!
//! let err = check(&["elevtn", "lndslp"], &["input.vertical.altitude"]).unwrap_err();
//! assert!(err.to_string().contains("Length of variables and wflow_variables lists must match"));
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type MhResult<T> = Result<T, MhError>;

/// MariHydro 错误类型
#[derive(Error, Debug)]
pub enum MhError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 文件解析错误
    #[error("文件解析错误: {file} 第{line}行: {message}")]
    ParseError {
        /// 文件路径
        file: PathBuf,
        /// 行号
        line: usize,
        /// 错误信息
        message: String,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    /// 投影错误
    #[error("投影错误: {0}")]
    Projection(String),

    // ========================================================================
    // 命名与工作流验证
    // ========================================================================

    /// 名称不在翻译表中
    #[error("Unknown key '{key}' in {vocabulary} vocabulary")]
    UnknownKey {
        /// 请求的键
        key: String,
        /// 词汇表名称
        vocabulary: &'static str,
    },

    /// 两个成对参数列表长度不一致
    #[error("Length of {left} and {right} lists must match ({left_len} != {right_len})")]
    LengthMismatch {
        /// 左侧参数名
        left: &'static str,
        /// 右侧参数名
        right: &'static str,
        /// 左侧长度
        left_len: usize,
        /// 右侧长度
        right_len: usize,
    },

    /// 需要变量列表但未提供
    #[error("{parameter} list is not provided (required when {required_by} is set)")]
    MissingVariables {
        /// 缺失的参数名
        parameter: &'static str,
        /// 依赖它的参数名
        required_by: &'static str,
    },

    // ========================================================================
    // 存储访问
    // ========================================================================

    /// 字段的空间参考与存储不一致
    #[error("Grid mismatch for '{name}': expected {expected}, got {actual}")]
    GridMismatch {
        /// 字段名
        name: String,
        /// 存储已建立的空间参考
        expected: String,
        /// 新字段的空间参考
        actual: String,
    },

    /// 静态图字段不存在
    #[error("Missing static field: {name}")]
    MissingField {
        /// 字段名
        name: String,
    },

    /// 表不存在
    #[error("Missing table: {name}")]
    MissingTable {
        /// 表名
        name: String,
    },

    /// 数据源不存在
    #[error("Data source not found in catalog: {id}")]
    MissingSource {
        /// 数据源标识
        id: String,
    },

    // ========================================================================
    // 数据一致性
    // ========================================================================

    /// 参数字段的有效值数量与要素数量不一致
    #[error("Cardinality mismatch in '{field}': {actual} non-missing values for {expected} features")]
    CardinalityMismatch {
        /// 参数字段名
        field: String,
        /// 要素数量
        expected: usize,
        /// 有效值数量
        actual: usize,
    },

    /// 要素既无外部率定曲线也无默认参数化
    #[error("Feature {feature} has neither a rating curve nor a default parameterization: {reason}")]
    MissingParameterization {
        /// 要素标识
        feature: String,
        /// 原因说明
        reason: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl MhError {
    /// 从消息创建 IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 从 IO 错误创建（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 解析错误
    pub fn parse(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 投影错误
    pub fn projection(message: impl Into<String>) -> Self {
        Self::Projection(message.into())
    }

    /// 未知键
    pub fn unknown_key(key: impl Into<String>, vocabulary: &'static str) -> Self {
        Self::UnknownKey {
            key: key.into(),
            vocabulary,
        }
    }

    /// 字段不存在
    pub fn missing_field(name: impl Into<String>) -> Self {
        Self::MissingField { name: name.into() }
    }

    /// 表不存在
    pub fn missing_table(name: impl Into<String>) -> Self {
        Self::MissingTable { name: name.into() }
    }

    /// 数据源不存在
    pub fn missing_source(id: impl Into<String>) -> Self {
        Self::MissingSource { id: id.into() }
    }

    /// 网格参考不一致
    pub fn grid_mismatch(
        name: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::GridMismatch {
            name: name.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// 缺少参数化方案
    pub fn missing_parameterization(
        feature: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::MissingParameterization {
            feature: feature.to_string(),
            reason: reason.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl MhError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> MhResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查两个成对参数列表长度是否一致
    #[inline]
    pub fn check_lengths(
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    ) -> MhResult<()> {
        if left_len != right_len {
            Err(Self::LengthMismatch {
                left,
                right,
                left_len,
                right_len,
            })
        } else {
            Ok(())
        }
    }

    /// 检查有效值数量与要素数量是否一致
    #[inline]
    pub fn check_cardinality(field: &str, expected: usize, actual: usize) -> MhResult<()> {
        if expected != actual {
            Err(Self::CardinalityMismatch {
                field: field.to_string(),
                expected,
                actual,
            })
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for MhError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 测试
// ========================================================================
