// crates/mh_geo/src/lib.rs

//! MariHydro 地理空间处理模块
//!
//! 提供模型网格的空间参考、矢量要素和几何运算。
//!
//! # 模块
//!
//! - `crs`: 坐标参考系统定义和解析
//! - `grid`: 规则网格的空间参考 (`GridSpec`)，所有静态图共享同一个
//! - `geometry`: 几何类型 (Point2D, Polygon, Geometry)
//! - `feature`: 带属性的矢量要素及其标识
//!
//! # 示例
//!
//! ```
//! use mh_geo::prelude::*;
//!
//! let grid = GridSpec::new(CrsDefinition::wgs84(), 12.0, 46.0, 0.25, -0.25, 4, 3);
//! assert_eq!(grid.n_cells(), 12);
//! assert!(grid.is_geographic());
//!
//! let center = grid.cell_center(0, 0);
//! assert_eq!(grid.cell_of(&center), Some((0, 0)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crs;
pub mod feature;
pub mod geometry;
pub mod grid;

/// 预导入模块
pub mod prelude {
    pub use crate::crs::CrsDefinition;
    pub use crate::feature::{Feature, FeatureId};
    pub use crate::geometry::{BoundingBox, Geometry, Point2D, Polygon};
    pub use crate::grid::{GeoTransform, GridSpec};
}

// 重导出常用类型
pub use crs::CrsDefinition;
pub use feature::{Feature, FeatureId};
pub use geometry::{BoundingBox, Geometry, Point2D, Polygon};
pub use grid::{GeoTransform, GridSpec};
