// crates/mh_terrain/src/ldd.rs

//! PCRaster 局部排水方向 (LDD) 导航
//!
//! 编码按数字小键盘排列，5 为汇点（出口）：
//!
//! ```text
//! 7 8 9
//! 4 5 6
//! 1 2 3
//! ```
//!
//! 网格假定北向上（第 0 行在北）。无数据单元不属于排水网络，
//! 流出网格的单元视为出口。

use crate::raster::Raster;
use mh_foundation::error::{MhError, MhResult};
use std::collections::VecDeque;

/// 汇点编码
pub const LDD_PIT: u8 = 5;

/// 编码对应的 (行偏移, 列偏移)
#[must_use]
pub fn ldd_offset(code: u8) -> Option<(isize, isize)> {
    match code {
        1 => Some((1, -1)),
        2 => Some((1, 0)),
        3 => Some((1, 1)),
        4 => Some((0, -1)),
        5 => Some((0, 0)),
        6 => Some((0, 1)),
        7 => Some((-1, -1)),
        8 => Some((-1, 0)),
        9 => Some((-1, 1)),
        _ => None,
    }
}

/// 流向网络
#[derive(Debug, Clone)]
pub struct FlowDirection {
    width: usize,
    height: usize,
    codes: Vec<Option<u8>>,
    downstream: Vec<Option<usize>>,
}

impl FlowDirection {
    /// 从 LDD 栅格构建
    ///
    /// 非法编码返回无效输入错误；存在环路时同样报错。
    pub fn from_ldd(ldd: &Raster) -> MhResult<Self> {
        let grid = ldd.grid();
        let (width, height) = (grid.width, grid.height);
        let n = grid.n_cells();
        let mut codes = Vec::with_capacity(n);
        let mut downstream = Vec::with_capacity(n);

        for i in 0..n {
            let Some(v) = ldd.value_at(i) else {
                codes.push(None);
                downstream.push(None);
                continue;
            };
            let code = v as u8;
            let offset = (v.fract() == 0.0 && (1.0..=9.0).contains(&v))
                .then(|| ldd_offset(code))
                .flatten()
                .ok_or_else(|| MhError::invalid_input(format!("invalid LDD value {v} at cell {i}")))?;
            codes.push(Some(code));

            let (row, col) = (i / width, i % width);
            let (r, c) = (row as isize + offset.0, col as isize + offset.1);
            let ds = if code == LDD_PIT || r < 0 || c < 0 || r >= height as isize || c >= width as isize {
                None
            } else {
                Some(r as usize * width + c as usize)
            };
            downstream.push(ds);
        }

        // 下游为无数据的单元视为出口
        for i in 0..n {
            if let Some(j) = downstream[i] {
                if codes[j].is_none() {
                    downstream[i] = None;
                }
            }
        }

        let fd = Self { width, height, codes, downstream };
        fd.check_acyclic()?;
        Ok(fd)
    }

    /// 单元总数
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.codes.len()
    }

    /// 单元是否属于排水网络
    #[must_use]
    pub fn is_valid(&self, i: usize) -> bool {
        self.codes[i].is_some()
    }

    /// LDD 编码
    #[must_use]
    pub fn code(&self, i: usize) -> Option<u8> {
        self.codes[i]
    }

    /// 下游单元，出口返回 None
    #[inline]
    #[must_use]
    pub fn downstream(&self, i: usize) -> Option<usize> {
        self.downstream[i]
    }

    /// 是否为出口（汇点或流出网格）
    #[must_use]
    pub fn is_outlet(&self, i: usize) -> bool {
        self.is_valid(i) && self.downstream[i].is_none()
    }

    /// 到下游单元是否为对角方向
    #[must_use]
    pub fn is_diagonal(&self, i: usize) -> bool {
        matches!(self.codes[i], Some(1 | 3 | 7 | 9)) && self.downstream[i].is_some()
    }

    /// 上游邻居（直接流入 i 的单元）
    #[must_use]
    pub fn upstream_neighbors(&self, i: usize) -> Vec<usize> {
        let (row, col) = (i / self.width, i % self.width);
        let mut out = Vec::with_capacity(8);
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let (r, c) = (row as isize + dr, col as isize + dc);
                if r < 0 || c < 0 || r >= self.height as isize || c >= self.width as isize {
                    continue;
                }
                let j = r as usize * self.width + c as usize;
                if self.downstream[j] == Some(i) {
                    out.push(j);
                }
            }
        }
        out
    }

    /// 从上游到下游的拓扑顺序（仅网络内单元）
    #[must_use]
    pub fn topological_order(&self) -> Vec<usize> {
        let n = self.n_cells();
        let mut indegree = vec![0usize; n];
        for ds in self.downstream.iter().flatten() {
            indegree[*ds] += 1;
        }
        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&i| self.is_valid(i) && indegree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            if let Some(j) = self.downstream[i] {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }
        order
    }

    /// 沿下游方向的路径（不含起点），最多 `max_steps` 步
    pub fn downstream_path(&self, start: usize, max_steps: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.downstream[start], move |&i| self.downstream[i]).take(max_steps)
    }

    /// 沿网络累加权重（上游累积量）
    #[must_use]
    pub fn accumulate(&self, weights: &[f64]) -> Vec<f64> {
        let mut acc = weights.to_vec();
        for i in self.topological_order() {
            if let Some(j) = self.downstream[i] {
                acc[j] += acc[i];
            }
        }
        acc
    }

    /// 每个单元的出口单元
    #[must_use]
    pub fn outlets(&self) -> Vec<Option<usize>> {
        let mut out = vec![None; self.n_cells()];
        for i in self.topological_order().into_iter().rev() {
            out[i] = match self.downstream[i] {
                Some(j) => out[j],
                None => Some(i),
            };
        }
        out
    }

    fn check_acyclic(&self) -> MhResult<()> {
        let valid = self.codes.iter().filter(|c| c.is_some()).count();
        let ordered = self.topological_order().len();
        if ordered != valid {
            return Err(MhError::invalid_input(format!(
                "LDD contains a loop: {} of {} cells unreachable from headwaters",
                valid - ordered,
                valid
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_geo::{CrsDefinition, GridSpec};

    fn ldd(data: Vec<f64>, w: usize, h: usize) -> Raster {
        let grid = GridSpec::new(CrsDefinition::utm_zone(31, true), 0.0, 10.0 * h as f64, 10.0, -10.0, w, h);
        Raster::from_data(grid, data, 255.0).unwrap()
    }

    #[test]
    fn test_simple_chain() {
        // 3x1: 6 6 5
        let fd = FlowDirection::from_ldd(&ldd(vec![6.0, 6.0, 5.0], 3, 1)).unwrap();
        assert_eq!(fd.downstream(0), Some(1));
        assert_eq!(fd.downstream(1), Some(2));
        assert!(fd.is_outlet(2));
        assert_eq!(fd.topological_order(), vec![0, 1, 2]);
        assert_eq!(fd.accumulate(&[1.0, 1.0, 1.0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(fd.upstream_neighbors(2), vec![1]);
        assert_eq!(fd.downstream_path(0, 10).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_diagonal_and_outlets() {
        // 2x2: 3 2 / 6 5
        let fd = FlowDirection::from_ldd(&ldd(vec![3.0, 2.0, 6.0, 5.0], 2, 2)).unwrap();
        assert!(fd.is_diagonal(0));
        assert!(!fd.is_diagonal(1));
        assert_eq!(fd.outlets(), vec![Some(3); 4]);
    }

    #[test]
    fn test_flow_off_grid_is_outlet() {
        let fd = FlowDirection::from_ldd(&ldd(vec![4.0, 4.0], 2, 1)).unwrap();
        assert!(fd.is_outlet(0));
        assert_eq!(fd.downstream(1), Some(0));
    }

    #[test]
    fn test_nodata_not_in_network() {
        let fd = FlowDirection::from_ldd(&ldd(vec![6.0, 255.0], 2, 1)).unwrap();
        assert!(!fd.is_valid(1));
        assert!(fd.is_outlet(0));
    }

    #[test]
    fn test_invalid_code_and_loop() {
        assert!(FlowDirection::from_ldd(&ldd(vec![0.0, 5.0], 2, 1)).is_err());
        assert!(FlowDirection::from_ldd(&ldd(vec![6.0, 4.0], 2, 1)).is_err());
    }
}
