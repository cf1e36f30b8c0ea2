// crates/mh_workflow/src/setup/fixtures.rs

//! 单元测试用的合成水文数据
//!
//! 5x5 网格，100 m 分辨率。中间一行是自西向东的干流，出口在 (2,4)；
//! 上下两侧的单元垂直汇入干流。干流 (2,2) 处高程有一个凸起。

use crate::catalog::InMemoryCatalog;
use crate::model::WflowModel;
use crate::naming::ModelMode;
use crate::setup::SetupBasemaps;
use mh_geo::{CrsDefinition, GridSpec};
use mh_terrain::{FlowDirection, Raster};

pub(crate) const N: usize = 5;

pub(crate) fn grid() -> GridSpec {
    GridSpec::new(CrsDefinition::utm_zone(32, true), 0.0, 500.0, 100.0, -100.0, N, N)
}

pub(crate) fn ldd() -> Raster {
    let mut data = Vec::with_capacity(N * N);
    for r in 0..N {
        for c in 0..N {
            data.push(match r {
                0 | 1 => 2.0,
                2 if c == N - 1 => 5.0,
                2 => 6.0,
                _ => 8.0,
            });
        }
    }
    Raster::from_data(grid(), data, 255.0).unwrap()
}

pub(crate) fn elevtn() -> Raster {
    let mut data = Vec::with_capacity(N * N);
    for r in 0..N {
        for c in 0..N {
            let z = if r == 2 && c == 2 {
                97.0
            } else {
                100.0 - 5.0 * c as f64 + 2.0 * (r as f64 - 2.0).abs()
            };
            data.push(z);
        }
    }
    Raster::from_data(grid(), data, -9999.0).unwrap()
}

/// 上游面积 km²（每个单元 0.01 km²）
pub(crate) fn uparea() -> Raster {
    let fd = FlowDirection::from_ldd(&ldd()).unwrap();
    let acc = fd.accumulate(&vec![0.01; N * N]);
    Raster::from_data(grid(), acc, -9999.0).unwrap()
}

pub(crate) fn catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog.add_dataset(
        "merit_hydro",
        [
            ("flwdir", ldd()),
            ("uparea", uparea()),
            ("elevtn", elevtn()),
            ("subelv", elevtn().map_valid(|z| z - 1.0)),
            ("qbankfull", uparea().map_valid(|a| a * 10.0)),
        ],
    );
    catalog
}

pub(crate) fn model_with_basemaps(mode: ModelMode) -> (WflowModel, InMemoryCatalog) {
    let catalog = catalog();
    let mut model = WflowModel::new(grid(), mode);
    model.run(&SetupBasemaps::default(), &catalog).unwrap();
    (model, catalog)
}
