// crates/mh_workflow/src/lib.rs

//! MariHydro 静态图装配
//!
//! 在给定模型网格上，从数据目录中的栅格、矢量和表生成一组自洽的静态图字段、
//! 要素表和运行配置。
//!
//! # 模块结构
//!
//! - [`naming`]: 内部名、显示名与配置路径之间的翻译
//! - [`staticmaps`]: 共享空间参考的字段存储
//! - [`tables`]: 按要素标识命名的表存储
//! - [`catalog`]: 数据目录接口与内存实现
//! - [`methods`]: 河道与湖库的经验公式
//! - [`setup`]: 各装配流程
//! - [`model`]: 模型会话，原子提交装配结果
//! - [`recipe`]: 可序列化的步骤列表
//!
//! # 示例
//!
//! ```rust,ignore
//! use mh_workflow::{BuildRecipe, InMemoryCatalog, ModelMode, WflowModel};
//!
//! let mut model = WflowModel::new(grid, ModelMode::Standard);
//! let recipe = BuildRecipe::read("build.toml")?;
//! model.update(&catalog, &recipe)?;
//! model.write(Path::new("wflow_model"))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod methods;
pub mod model;
pub mod naming;
pub mod recipe;
pub mod setup;
pub mod staticmaps;
pub mod tables;

// 重导出核心类型
pub use catalog::{DataCatalog, InMemoryCatalog, RasterSource};
pub use model::{StagedUpdate, WflowModel};
pub use naming::{ModelMode, NameTranslator};
pub use recipe::{BuildRecipe, SetupStep};
pub use setup::{
    ElevationMap, FloodplainType, RiverRouting, SetupBasemaps, SetupFloodplains, SetupLakes,
    SetupMethod, SetupReservoirs, SetupRivers, StaticMapsFromRaster,
};
pub use staticmaps::StaticMaps;
pub use tables::{TableFamily, TableKey, TableStore};
