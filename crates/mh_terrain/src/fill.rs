// crates/mh_terrain/src/fill.rs

//! 无数据填充
//!
//! 重采样后的栅格可能在源数据覆盖不到的位置留下无数据单元，
//! 填充策略决定这些单元取什么值。

use crate::raster::Raster;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 无数据填充方法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    /// 取最近有效单元的值（4 邻域广度优先）
    Nearest,
    /// 填充常数
    Constant(f64),
}

impl FillMethod {
    /// 就地填充所有层，返回填充的单元数
    pub fn apply(&self, raster: &mut Raster) -> usize {
        let grid = raster.grid().clone();
        let nodata = raster.nodata();
        let mut filled = 0;
        for k in 0..raster.n_layers() {
            let layer = raster.layer_mut(k);
            filled += match *self {
                FillMethod::Constant(value) => fill_constant(layer, nodata, value),
                FillMethod::Nearest => fill_nearest(layer, grid.width, grid.height, nodata),
            };
        }
        if filled > 0 {
            tracing::debug!(cells = filled, method = ?self, "filled nodata cells");
        }
        filled
    }
}

fn fill_constant(layer: &mut [f64], nodata: f64, value: f64) -> usize {
    let mut n = 0;
    for v in layer.iter_mut() {
        if crate::raster::is_nodata_value(*v, nodata) {
            *v = value;
            n += 1;
        }
    }
    n
}

/// 多源广度优先：每个无数据单元取最先到达它的有效单元的值
fn fill_nearest(layer: &mut [f64], width: usize, height: usize, nodata: f64) -> usize {
    let mut visited: Vec<bool> = layer
        .iter()
        .map(|&v| !crate::raster::is_nodata_value(v, nodata))
        .collect();
    let mut queue: VecDeque<usize> = visited
        .iter()
        .enumerate()
        .filter_map(|(i, &valid)| valid.then_some(i))
        .collect();
    if queue.is_empty() {
        return 0;
    }

    let mut n = 0;
    while let Some(i) = queue.pop_front() {
        let (row, col) = (i / width, i % width);
        let neighbors = [
            (row > 0).then(|| i - width),
            (row + 1 < height).then(|| i + width),
            (col > 0).then(|| i - 1),
            (col + 1 < width).then(|| i + 1),
        ];
        for j in neighbors.into_iter().flatten() {
            if !visited[j] {
                visited[j] = true;
                layer[j] = layer[i];
                n += 1;
                queue.push_back(j);
            }
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_geo::{CrsDefinition, GridSpec};

    fn raster(data: Vec<f64>) -> Raster {
        let grid = GridSpec::new(CrsDefinition::utm_zone(31, true), 0.0, 30.0, 10.0, -10.0, 3, 3);
        Raster::from_data(grid, data, -9999.0).unwrap()
    }

    #[test]
    fn test_constant_fill() {
        let mut r = raster(vec![1.0, -9999.0, 2.0, f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(FillMethod::Constant(7.0).apply(&mut r), 2);
        assert_eq!(r.data()[1], 7.0);
        assert_eq!(r.data()[3], 7.0);
    }

    #[test]
    fn test_nearest_fill() {
        let nd = -9999.0;
        let mut r = raster(vec![5.0, nd, nd, nd, nd, nd, nd, nd, 9.0]);
        assert_eq!(FillMethod::Nearest.apply(&mut r), 7);
        assert_eq!(r.count_valid(), 9);
        assert_eq!(r.get(0, 1), Some(5.0));
        assert_eq!(r.get(2, 1), Some(9.0));
    }

    #[test]
    fn test_nearest_fill_all_nodata_is_noop() {
        let mut r = raster(vec![-9999.0; 9]);
        assert_eq!(FillMethod::Nearest.apply(&mut r), 0);
        assert_eq!(r.count_valid(), 0);
    }

    #[test]
    fn test_serde_forms() {
        let m: FillMethod = serde_json::from_str("\"nearest\"").unwrap();
        assert_eq!(m, FillMethod::Nearest);
        let c: FillMethod = serde_json::from_str(r#"{"constant": 0.5}"#).unwrap();
        assert_eq!(c, FillMethod::Constant(0.5));
    }
}
