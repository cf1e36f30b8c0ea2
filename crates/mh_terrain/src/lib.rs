// crates/mh_terrain/src/lib.rs

//! 地形与栅格数据管理
//!
//! 提供对齐到模型网格的栅格存储、重采样、无数据填充、矢量栅格化
//! 以及 LDD 流向网络导航。
//!
//! # 模块
//!
//! - `raster`: 栅格数据管理
//! - `resample`: 重采样与重投影接口
//! - `fill`: 无数据填充
//! - `rasterize`: 矢量栅格化
//! - `ldd`: PCRaster 排水方向导航

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fill;
pub mod ldd;
pub mod raster;
pub mod rasterize;
pub mod resample;

// 重导出常用类型
pub use fill::FillMethod;
pub use ldd::FlowDirection;
pub use raster::{LayerDim, Raster};
pub use rasterize::{rasterize, rasterize_features};
pub use resample::{GridResampler, Reprojector, ResampleMethod};
