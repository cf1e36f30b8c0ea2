// crates/mh_workflow/src/setup/basemaps.rs

//! 基础地形图
//!
//! 从水文数据集（预先计算好的 `flwdir`、`uparea`、`elevtn` 等图层）生成模型的
//! 排水网络相关字段。后续的河道、湖泊和水库流程都依赖这里登记的字段。

use super::{fetch_layers, LayerRequest, SetupMethod};
use crate::catalog::DataCatalog;
use crate::model::{StagedUpdate, WflowModel};
use mh_foundation::error::{MhError, MhResult};
use mh_geo::GridSpec;
use mh_terrain::{FlowDirection, Raster, ResampleMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DERIVED_NODATA: f64 = -9999.0;
const BASIN_NODATA: f64 = 0.0;

fn default_hydrography_fn() -> String {
    "merit_hydro".to_string()
}

/// 基础地形图装配参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupBasemaps {
    /// 水文数据集标识
    #[serde(default = "default_hydrography_fn")]
    pub hydrography_fn: String,
}

impl Default for SetupBasemaps {
    fn default() -> Self {
        Self {
            hydrography_fn: default_hydrography_fn(),
        }
    }
}

const LAYERS: [LayerRequest; 6] = [
    LayerRequest::required("flwdir", ResampleMethod::Nearest),
    LayerRequest::required("uparea", ResampleMethod::Max),
    LayerRequest::required("elevtn", ResampleMethod::Average),
    LayerRequest::optional("subelv", ResampleMethod::Min),
    LayerRequest::optional("strord", ResampleMethod::Max),
    LayerRequest::optional("lndslp", ResampleMethod::Average),
];

impl SetupMethod for SetupBasemaps {
    fn name(&self) -> &'static str {
        "setup_basemaps"
    }

    fn validate(&self) -> MhResult<()> {
        if self.hydrography_fn.trim().is_empty() {
            return Err(MhError::invalid_config("hydrography_fn", "", "must not be empty"));
        }
        Ok(())
    }

    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate> {
        let mut layers = fetch_layers(model, catalog, &self.hydrography_fn, &LAYERS)?;
        let names = model.translator();
        let mut update = StagedUpdate::new();

        let ldd = layers
            .remove("flwdir")
            .ok_or_else(|| MhError::missing_field("flwdir"))?;
        let fd = FlowDirection::from_ldd(&ldd)?;
        let elevtn = layers
            .remove("elevtn")
            .ok_or_else(|| MhError::missing_field("elevtn"))?;

        let strord = match layers.remove("strord") {
            Some(r) => r,
            None => strahler_order(&fd, model.grid()),
        };
        let slope = match layers.remove("lndslp") {
            Some(r) => r,
            None => terrain_slope(&elevtn),
        };
        let basins = subcatchments(&fd, model.grid());
        tracing::info!(
            source = %self.hydrography_fn,
            basins = basins.data().iter().copied().fold(0.0, f64::max),
            "drainage network prepared"
        );

        update.stage_mapped(names, names.to_display_name("flwdir")?, ldd)?;
        update.stage_mapped(names, names.to_display_name("elevtn")?, elevtn)?;
        if let Some(uparea) = layers.remove("uparea") {
            update.stage_mapped(names, names.to_display_name("uparea")?, uparea)?;
        }
        if let Some(subelv) = layers.remove("subelv") {
            update.stage_mapped(names, names.to_display_name("subelv")?, subelv)?;
        }
        update.stage_mapped(names, names.to_display_name("strord")?, strord)?;
        update.stage_mapped(names, names.to_display_name("basins")?, basins)?;
        update.stage_mapped(names, names.to_display_name("lndslp")?, slope)?;
        Ok(update)
    }
}

/// Strahler 河网分级
///
/// 源头为 1；汇入的上游等级最大值出现两次及以上时加一。
#[must_use]
pub fn strahler_order(fd: &FlowDirection, grid: &GridSpec) -> Raster {
    let n = fd.n_cells();
    let mut order = vec![0u32; n];
    let mut max_in = vec![0u32; n];
    let mut max_count = vec![0u32; n];
    for i in fd.topological_order() {
        order[i] = match max_in[i] {
            0 => 1,
            m if max_count[i] >= 2 => m + 1,
            m => m,
        };
        if let Some(j) = fd.downstream(i) {
            if order[i] > max_in[j] {
                max_in[j] = order[i];
                max_count[j] = 1;
            } else if order[i] == max_in[j] {
                max_count[j] += 1;
            }
        }
    }
    let data = (0..n)
        .map(|i| if fd.is_valid(i) { f64::from(order[i]) } else { DERIVED_NODATA })
        .collect();
    Raster::from_data(grid.clone(), data, DERIVED_NODATA)
        .unwrap_or_else(|_| Raster::new(grid.clone(), DERIVED_NODATA))
}

/// 子流域：按出口编号，编号从 1 开始，按出口单元索引排序
#[must_use]
pub fn subcatchments(fd: &FlowDirection, grid: &GridSpec) -> Raster {
    let outlets = fd.outlets();
    let ids: BTreeMap<usize, f64> = outlets
        .iter()
        .flatten()
        .copied()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(k, cell)| (cell, (k + 1) as f64))
        .collect();
    let data = outlets
        .iter()
        .map(|o| o.and_then(|cell| ids.get(&cell).copied()).unwrap_or(BASIN_NODATA))
        .collect();
    Raster::from_data(grid.clone(), data, BASIN_NODATA)
        .unwrap_or_else(|_| Raster::new(grid.clone(), BASIN_NODATA))
}

/// 地表坡度（中心差分，边界和无数据邻居处退化为单侧差分）
#[must_use]
pub fn terrain_slope(elevtn: &Raster) -> Raster {
    let grid = elevtn.grid();
    let (w, h) = (grid.width, grid.height);
    let at = |r: isize, c: isize| -> Option<f64> {
        (r >= 0 && c >= 0 && (r as usize) < h && (c as usize) < w)
            .then(|| elevtn.value_at(r as usize * w + c as usize))
            .flatten()
    };
    let gradient = |lo: Option<f64>, mid: f64, hi: Option<f64>, len: f64| -> f64 {
        match (lo, hi) {
            (Some(a), Some(b)) => (b - a) / (2.0 * len),
            (Some(a), None) => (mid - a) / len,
            (None, Some(b)) => (b - mid) / len,
            (None, None) => 0.0,
        }
    };

    let mut out = Raster::new(grid.clone(), DERIVED_NODATA);
    for r in 0..h {
        let (dx, dy) = grid.cell_lengths(r);
        for c in 0..w {
            let Some(z) = elevtn.value_at(r * w + c) else {
                continue;
            };
            let (ri, ci) = (r as isize, c as isize);
            let gx = gradient(at(ri, ci - 1), z, at(ri, ci + 1), dx);
            let gy = gradient(at(ri - 1, ci), z, at(ri + 1, ci), dy);
            out.set(r, c, gx.hypot(gy));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::naming::ModelMode;
    use mh_geo::CrsDefinition;

    fn grid() -> GridSpec {
        GridSpec::new(CrsDefinition::utm_zone(32, true), 0.0, 300.0, 100.0, -100.0, 3, 3)
    }

    // 3x3，全部汇入中心下方的出口 (2,1)
    //   3 2 1
    //   3 2 1
    //   6 5 4
    fn ldd() -> Raster {
        let data = vec![3.0, 2.0, 1.0, 3.0, 2.0, 1.0, 6.0, 5.0, 4.0];
        Raster::from_data(grid(), data, 255.0).unwrap()
    }

    #[test]
    fn test_strahler_order() {
        let fd = FlowDirection::from_ldd(&ldd()).unwrap();
        let order = strahler_order(&fd, &grid());
        // 中列第二行汇入两个一级源头（上方和对角），等级为 2
        assert_eq!(order.get(0, 1), Some(1.0));
        assert_eq!(order.get(1, 1), Some(2.0));
        assert_eq!(order.get(2, 1), Some(2.0));
    }

    #[test]
    fn test_single_subcatchment() {
        let fd = FlowDirection::from_ldd(&ldd()).unwrap();
        let basins = subcatchments(&fd, &grid());
        assert!(basins.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_terrain_slope_plane() {
        // 每列升高 10 m，坡度 0.1
        let data: Vec<f64> = (0..9).map(|i| (i % 3) as f64 * 10.0).collect();
        let dem = Raster::from_data(grid(), data, -9999.0).unwrap();
        let slope = terrain_slope(&dem);
        assert!(slope.data().iter().all(|&s| (s - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_stage_registers_network_maps() {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_dataset(
            "merit_hydro",
            [
                ("flwdir", ldd()),
                ("uparea", Raster::filled(grid(), 1.0, -9999.0)),
                ("elevtn", Raster::filled(grid(), 100.0, -9999.0)),
            ],
        );
        let mut model = WflowModel::new(grid(), ModelMode::Standard);
        model.run(&SetupBasemaps::default(), &catalog).unwrap();
        for name in ["wflow_ldd", "wflow_uparea", "wflow_dem", "wflow_streamorder", "wflow_subcatch", "Slope"] {
            assert!(model.staticmaps().has(name), "{name} missing");
        }
        assert!(!model.staticmaps().has("dem_subgrid"));
        assert_eq!(model.config().get_str("input.ldd"), Some("wflow_ldd"));
        assert_eq!(model.config().get_str("input.lateral.land.slope"), Some("Slope"));
    }

    #[test]
    fn test_missing_required_layer() {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_dataset("merit_hydro", [("flwdir", ldd())]);
        let mut model = WflowModel::new(grid(), ModelMode::Standard);
        let err = model.run(&SetupBasemaps::default(), &catalog).unwrap_err();
        assert!(matches!(err, MhError::MissingField { .. }));
        assert!(model.staticmaps().is_empty());
    }
}
