// crates/mh_io/src/lib.rs

//! MariHydro IO 模块
//!
//! 提供预处理结果的持久化格式。
//!
//! # 模块
//!
//! - [`table`]: 数值表类型
//! - [`table_csv`]: 每表一个 CSV 文件的读写
//! - [`staticmaps`]: 静态图二进制容器 (`staticmaps.mhsm`)
//! - [`error`]: IO 错误类型
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use mh_io::staticmaps::{read_staticmaps, write_staticmaps};
//!
//! write_staticmaps(Path::new("staticmaps.mhsm"), Some(&grid), [("wflow_dem", &dem)])?;
//! let container = read_staticmaps(Path::new("staticmaps.mhsm"))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod staticmaps;
pub mod table;
pub mod table_csv;

// 重导出常用类型
pub use error::{IoError, IoResult};
pub use staticmaps::{read_staticmaps, write_staticmaps, StaticMapsContainer, STATICMAPS_FILE};
pub use table::Table;
pub use table_csv::{read_table, write_table};

/// 类型别名简化
pub type Result<T> = IoResult<T>;
