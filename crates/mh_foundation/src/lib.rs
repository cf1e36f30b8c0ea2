// crates/mh_foundation/src/lib.rs

//! MariHydro Foundation Layer
//!
//! 基础层，提供整个预处理工作区共享的错误类型。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `MhError` 与 `MhResult`
//!
//! # 示例
//!
//! ```
//! use mh_foundation::error::{MhError, MhResult};
//!
//! fn lookup(key: &str) -> MhResult<&'static str> {
//!     Err(MhError::unknown_key(key, "display name"))
//! }
//!
//! assert!(lookup("nope").is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

// 重导出常用类型
pub use error::{MhError, MhResult};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{MhError, MhResult};
}
