// crates/mh_config/src/lib.rs

//! MariHydro Config Layer
//!
//! 配置层，提供模型运行配置文档。
//!
//! # 模块概览
//!
//! - [`document`]: 扁平点分路径的配置文档，TOML 读写
//! - [`error`]: 配置错误类型
//!
//! # 设计原则
//!
//! 1. **扁平存储**: 内存中只有 `路径 → 标量`，树结构只在文件边界出现
//! 2. **覆盖写入**: 同一路径后写覆盖先写，不做合并
//! 3. **空值保留**: `null` 在内存中保留，写 TOML 时省略

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;

// 重导出核心类型
pub use document::{ConfigDocument, ConfigValue};
pub use error::ConfigError;
