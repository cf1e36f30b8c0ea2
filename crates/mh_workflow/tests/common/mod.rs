// crates/mh_workflow/tests/common/mod.rs

//! 集成测试共用的合成数据
//!
//! 5x5 网格，100 m 分辨率。中间一行自西向东汇流，出口 (2,4)；上下两侧垂直汇入。

#![allow(dead_code)]

use mh_geo::{CrsDefinition, Feature, Geometry, GridSpec, Polygon};
use mh_terrain::{FlowDirection, Raster};
use mh_workflow::{InMemoryCatalog, ModelMode, SetupBasemaps, WflowModel};

pub const N: usize = 5;

pub fn grid() -> GridSpec {
    GridSpec::new(CrsDefinition::utm_zone(32, true), 0.0, 500.0, 100.0, -100.0, N, N)
}

pub fn ldd() -> Raster {
    let data = (0..N * N)
        .map(|i| match (i / N, i % N) {
            (0 | 1, _) => 2.0,
            (2, c) if c == N - 1 => 5.0,
            (2, _) => 6.0,
            _ => 8.0,
        })
        .collect();
    Raster::from_data(grid(), data, 255.0).unwrap()
}

pub fn elevtn() -> Raster {
    let data = (0..N * N)
        .map(|i| {
            let (r, c) = (i / N, i % N);
            100.0 - 5.0 * c as f64 + 2.0 * (r as f64 - 2.0).abs()
        })
        .collect();
    Raster::from_data(grid(), data, -9999.0).unwrap()
}

pub fn uparea() -> Raster {
    let fd = FlowDirection::from_ldd(&ldd()).unwrap();
    Raster::from_data(grid(), fd.accumulate(&vec![0.01; N * N]), -9999.0).unwrap()
}

/// 覆盖矩形区域的湖库多边形
pub fn waterbody(id: i64, min: (f64, f64), max: (f64, f64)) -> Feature {
    Feature::new(id, Geometry::Polygon(Polygon::rectangle(min.0, min.1, max.0, max.1)))
}

pub fn catalog() -> InMemoryCatalog {
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

pub fn model_with_basemaps(mode: ModelMode) -> (WflowModel, InMemoryCatalog) {
    let catalog = catalog();
    let mut model = WflowModel::new(grid(), mode);
    model.run(&SetupBasemaps::default(), &catalog).unwrap();
    (model, catalog)
}
