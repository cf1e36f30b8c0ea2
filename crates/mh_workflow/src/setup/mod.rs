// crates/mh_workflow/src/setup/mod.rs

//! 装配流程
//!
//! 每个流程都是一个可序列化的参数结构体，实现 [`SetupMethod`]：
//! 先做不依赖数据的参数校验，再读取数据源与已有字段生成 [`StagedUpdate`]，
//! 最后由模型会话原子提交。
//!
//! | 流程 | 产物 |
//! |------|------|
//! | [`SetupBasemaps`] | 流向、上游面积、高程、河网等级、子流域、坡度 |
//! | [`StaticMapsFromRaster`] | 任意栅格变量 |
//! | [`SetupRivers`] | 河道几何、糙率、修正高程 |
//! | [`SetupFloodplains`] | 一维库容-水深或二维四向修正高程 |
//! | [`SetupLakes`] | 湖泊分布、出口与参数，率定曲线表 |
//! | [`SetupReservoirs`] | 水库分布、出口与参数，面积时序表 |

pub mod basemaps;
pub mod floodplains;
pub mod lakes;
pub mod reservoirs;
pub mod rivers;
pub mod staticmaps;
mod waterbodies;

#[cfg(test)]
pub(crate) mod fixtures;

pub use basemaps::SetupBasemaps;
pub use floodplains::{FloodplainType, SetupFloodplains};
pub use lakes::SetupLakes;
pub use reservoirs::SetupReservoirs;
pub use rivers::{ElevationMap, RiverRouting, SetupRivers};
pub use staticmaps::StaticMapsFromRaster;

use crate::catalog::DataCatalog;
use crate::model::{StagedUpdate, WflowModel};
use mh_foundation::error::{MhError, MhResult};
use mh_terrain::{FlowDirection, Raster, ResampleMethod};
use std::collections::HashMap;

/// 装配步骤
pub trait SetupMethod {
    /// 步骤名
    fn name(&self) -> &'static str;

    /// 参数校验（不访问数据）
    fn validate(&self) -> MhResult<()> {
        Ok(())
    }

    /// 读取数据并生成暂存更新，不修改模型
    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate>;
}

/// 数据集图层请求
#[derive(Debug, Clone, Copy)]
pub(crate) struct LayerRequest {
    pub name: &'static str,
    pub method: ResampleMethod,
    pub required: bool,
}

impl LayerRequest {
    pub(crate) const fn required(name: &'static str, method: ResampleMethod) -> Self {
        Self { name, method, required: true }
    }

    pub(crate) const fn optional(name: &'static str, method: ResampleMethod) -> Self {
        Self { name, method, required: false }
    }
}

/// 从多变量数据集取出图层并重采样到模型网格
///
/// 缺少必需图层返回 `MissingField`，缺少可选图层直接跳过。
pub(crate) fn fetch_layers(
    model: &WflowModel,
    catalog: &dyn DataCatalog,
    id: &str,
    requests: &[LayerRequest],
) -> MhResult<HashMap<&'static str, Raster>> {
    let vars = catalog.raster(id, None)?.into_dataset(id)?;
    let mut out = HashMap::with_capacity(requests.len());
    for req in requests {
        match vars.iter().find(|(n, _)| n == req.name) {
            Some((_, raster)) => {
                out.insert(req.name, model.reproject(raster, req.method)?);
            }
            None if req.required => {
                return Err(MhError::missing_field(format!("{id}.{}", req.name)));
            }
            None => tracing::debug!(source = id, layer = req.name, "optional layer not present"),
        }
    }
    Ok(out)
}

/// 由已登记的 `wflow_ldd` 构建流向网络
pub(crate) fn model_flow_direction(model: &WflowModel) -> MhResult<FlowDirection> {
    let ldd_name = model.translator().to_display_name("flwdir")?;
    FlowDirection::from_ldd(model.staticmaps().get(ldd_name)?)
}

/// 已登记的上游面积图（可能不存在）
pub(crate) fn model_uparea(model: &WflowModel) -> MhResult<Option<&Raster>> {
    let name = model.translator().to_display_name("uparea")?;
    let maps = model.staticmaps();
    Ok(if maps.has(name) { Some(maps.get(name)?) } else { None })
}

/// 栅格首层取值为 Option，无数据为 None
pub(crate) fn valid_values(raster: &Raster) -> Vec<Option<f64>> {
    (0..raster.grid().n_cells()).map(|i| raster.value_at(i)).collect()
}
