// crates/mh_terrain/src/resample.rs

//! 栅格重采样
//!
//! 将源栅格重采样到模型网格。[`Reprojector`] 是外部重投影的接口，
//! [`GridResampler`] 处理同一坐标系下的情形，跨坐标系请求返回投影错误。
//!
//! 聚合类方法（平均、众数、最小、最大、中位数）取目标单元范围内的所有源单元中心；
//! 目标单元比源单元小时（上采样）退化为最近邻。
//!
//! # 示例
//!
//! ```
//! use mh_geo::{CrsDefinition, GridSpec};
//! use mh_terrain::raster::Raster;
//! use mh_terrain::resample::{GridResampler, ResampleMethod, Reprojector};
//!
//! let src_grid = GridSpec::new(CrsDefinition::utm_zone(31, true), 0.0, 20.0, 10.0, -10.0, 2, 2);
//! let src = Raster::from_data(src_grid, vec![1.0, 2.0, 3.0, 4.0], -9999.0).unwrap();
//! let dst_grid = GridSpec::new(CrsDefinition::utm_zone(31, true), 0.0, 20.0, 20.0, -20.0, 1, 1);
//!
//! let out = GridResampler::default()
//!     .reproject(&src, &dst_grid, ResampleMethod::Average)
//!     .unwrap();
//! assert_eq!(out.data(), &[2.5]);
//! ```

use crate::raster::{is_nodata_value, LayerDim, Raster};
use mh_foundation::error::{MhError, MhResult};
use mh_geo::GridSpec;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 重采样方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    /// 最近邻
    #[default]
    Nearest,
    /// 双线性
    Bilinear,
    /// 面积平均
    Average,
    /// 众数（分类数据）
    Mode,
    /// 最小值
    Min,
    /// 最大值
    Max,
    /// 中位数
    Median,
}

impl ResampleMethod {
    /// 获取方法名称
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Average => "average",
            Self::Mode => "mode",
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResampleMethod {
    type Err = MhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            "bilinear" => Self::Bilinear,
            "average" | "mean" => Self::Average,
            "mode" => Self::Mode,
            "min" => Self::Min,
            "max" => Self::Max,
            "median" | "med" => Self::Median,
            other => {
                return Err(MhError::invalid_config(
                    "reproject_method",
                    other,
                    "expected one of nearest, bilinear, average, mode, min, max, median",
                ))
            }
        })
    }
}

/// 重投影接口
pub trait Reprojector {
    /// 将源栅格重采样到目标网格
    fn reproject(
        &self,
        source: &Raster,
        target: &GridSpec,
        method: ResampleMethod,
    ) -> MhResult<Raster>;
}

/// 同坐标系网格重采样器
#[derive(Debug, Clone)]
pub struct GridResampler {
    /// 目标单元数超过该值时并行计算
    pub parallel_threshold: usize,
}

impl Default for GridResampler {
    fn default() -> Self {
        Self {
            parallel_threshold: 10_000,
        }
    }
}

impl Reprojector for GridResampler {
    fn reproject(
        &self,
        source: &Raster,
        target: &GridSpec,
        method: ResampleMethod,
    ) -> MhResult<Raster> {
        let src_grid = source.grid();
        if !src_grid.same_crs(target) {
            return Err(MhError::projection(format!(
                "cannot resample from {} to {}: cross-CRS reprojection is not supported",
                src_grid.crs, target.crs
            )));
        }
        if src_grid == target {
            return source.clone().with_grid(target.clone());
        }

        let n = target.n_cells();
        let nodata = source.nodata();
        let mut data = Vec::with_capacity(n * source.n_layers());
        for k in 0..source.n_layers() {
            let layer = source.layer(k);
            let sample = |i: usize| sample_cell(layer, src_grid, target, i, method, nodata);
            let values: Vec<f64> = if n >= self.parallel_threshold {
                (0..n).into_par_iter().map(sample).collect()
            } else {
                (0..n).map(sample).collect()
            };
            data.extend(values);
        }
        tracing::debug!(
            method = method.name(),
            cells = n,
            layers = source.n_layers(),
            "resampled raster"
        );

        match source.layer_dim() {
            Some(dim) => Raster::from_layers(
                target.clone(),
                LayerDim {
                    name: dim.name.clone(),
                    coords: dim.coords.clone(),
                },
                data,
                nodata,
            ),
            None => Raster::from_data(target.clone(), data, nodata),
        }
    }
}

/// 计算一个目标单元的值
fn sample_cell(
    layer: &[f64],
    src: &GridSpec,
    dst: &GridSpec,
    index: usize,
    method: ResampleMethod,
    nodata: f64,
) -> f64 {
    let (row, col) = dst.row_col(index);
    match method {
        ResampleMethod::Nearest => nearest(layer, src, dst, row, col, nodata),
        ResampleMethod::Bilinear => bilinear(layer, src, dst, row, col, nodata),
        _ => {
            let values = footprint_values(layer, src, dst, row, col, nodata);
            if values.is_empty() {
                nearest(layer, src, dst, row, col, nodata)
            } else {
                aggregate(values, method)
            }
        }
    }
}

fn nearest(layer: &[f64], src: &GridSpec, dst: &GridSpec, row: usize, col: usize, nodata: f64) -> f64 {
    src.cell_of(&dst.cell_center(row, col))
        .map_or(nodata, |(r, c)| layer[src.index(r, c)])
}

fn bilinear(layer: &[f64], src: &GridSpec, dst: &GridSpec, row: usize, col: usize, nodata: f64) -> f64 {
    let p = dst.cell_center(row, col);
    let (px, py) = src.transform.geo_to_pixel(p.x, p.y);
    // 相对于源单元中心的连续坐标
    let (fx, fy) = (px - 0.5, py - 0.5);
    let (x0, y0) = (fx.floor() as isize, fy.floor() as isize);
    let (dx, dy) = (fx - x0 as f64, fy - y0 as f64);

    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for (ox, oy, w) in [
        (0, 0, (1.0 - dx) * (1.0 - dy)),
        (1, 0, dx * (1.0 - dy)),
        (0, 1, (1.0 - dx) * dy),
        (1, 1, dx * dy),
    ] {
        let (x, y) = (x0 + ox, y0 + oy);
        if x < 0 || y < 0 || x >= src.width as isize || y >= src.height as isize || w <= 0.0 {
            continue;
        }
        let v = layer[src.index(y as usize, x as usize)];
        if is_nodata_value(v, nodata) {
            continue;
        }
        sum += v * w;
        weight_sum += w;
    }
    if weight_sum < 1e-10 {
        nearest(layer, src, dst, row, col, nodata)
    } else {
        sum / weight_sum
    }
}

/// 中心落在目标单元内的有效源值
fn footprint_values(
    layer: &[f64],
    src: &GridSpec,
    dst: &GridSpec,
    row: usize,
    col: usize,
    nodata: f64,
) -> Vec<f64> {
    let (x0, y0) = dst.transform.pixel_to_geo(col as f64, row as f64);
    let (x1, y1) = dst.transform.pixel_to_geo(col as f64 + 1.0, row as f64 + 1.0);
    let (pa, pb) = (src.transform.geo_to_pixel(x0, y0), src.transform.geo_to_pixel(x1, y1));

    // 源单元 c 的中心在 c + 0.5
    let range = |a: f64, b: f64, len: usize| {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let start = (lo - 0.5).ceil().max(0.0) as usize;
        let end = ((hi - 0.5).ceil().max(0.0) as usize).min(len);
        start..end
    };

    let mut values = Vec::new();
    for r in range(pa.1, pb.1, src.height) {
        for c in range(pa.0, pb.0, src.width) {
            let v = layer[src.index(r, c)];
            if !is_nodata_value(v, nodata) {
                values.push(v);
            }
        }
    }
    values
}

fn aggregate(mut values: Vec<f64>, method: ResampleMethod) -> f64 {
    match method {
        ResampleMethod::Average => values.iter().sum::<f64>() / values.len() as f64,
        ResampleMethod::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        ResampleMethod::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ResampleMethod::Median => {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let n = values.len();
            if n % 2 == 1 {
                values[n / 2]
            } else {
                0.5 * (values[n / 2 - 1] + values[n / 2])
            }
        }
        ResampleMethod::Mode => {
            // 按位模式计数，票数相同时取较小值
            let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
            for v in &values {
                *counts.entry(v.to_bits()).or_default() += 1;
            }
            counts
                .into_iter()
                .map(|(bits, n)| (f64::from_bits(bits), n))
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal)))
                .map_or(f64::NAN, |(v, _)| v)
        }
        ResampleMethod::Nearest | ResampleMethod::Bilinear => values[0],
    }
}
