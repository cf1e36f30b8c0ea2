// crates/mh_terrain/src/raster.rs

//! 栅格数据管理
//!
//! 提供对齐到 [`GridSpec`] 的栅格存储和访问。栅格可以带一个额外的非空间维度
//! （例如 `flood_depth`），每个坐标对应一层，层按顺序连续存放。

use mh_foundation::error::{MhError, MhResult};
use mh_geo::GridSpec;

/// 额外的非空间维度
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDim {
    /// 维度名称
    pub name: String,
    /// 每层的坐标值
    pub coords: Vec<f64>,
}

/// 栅格数据
#[derive(Debug, Clone)]
pub struct Raster {
    grid: GridSpec,
    nodata: f64,
    layers: Option<LayerDim>,
    /// 层优先，层内行优先
    data: Vec<f64>,
}

impl Raster {
    /// 创建全部为无数据值的栅格
    #[must_use]
    pub fn new(grid: GridSpec, nodata: f64) -> Self {
        Self::filled(grid, nodata, nodata)
    }

    /// 创建常数栅格
    #[must_use]
    pub fn filled(grid: GridSpec, value: f64, nodata: f64) -> Self {
        let n = grid.n_cells();
        Self {
            grid,
            nodata,
            layers: None,
            data: vec![value; n],
        }
    }

    /// 从数据创建
    pub fn from_data(grid: GridSpec, data: Vec<f64>, nodata: f64) -> MhResult<Self> {
        MhError::check_size("raster data", grid.n_cells(), data.len())?;
        Ok(Self {
            grid,
            nodata,
            layers: None,
            data,
        })
    }

    /// 从多层数据创建
    pub fn from_layers(
        grid: GridSpec,
        dim: LayerDim,
        data: Vec<f64>,
        nodata: f64,
    ) -> MhResult<Self> {
        if dim.coords.is_empty() {
            return Err(MhError::invalid_input(format!(
                "layer dimension '{}' has no coordinates",
                dim.name
            )));
        }
        MhError::check_size("layered raster data", grid.n_cells() * dim.coords.len(), data.len())?;
        Ok(Self {
            grid,
            nodata,
            layers: Some(dim),
            data,
        })
    }

    /// 空间参考
    #[inline]
    #[must_use]
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// 无数据值
    #[inline]
    #[must_use]
    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    /// 额外维度
    #[must_use]
    pub fn layer_dim(&self) -> Option<&LayerDim> {
        self.layers.as_ref()
    }

    /// 层数（二维栅格为 1）
    #[must_use]
    pub fn n_layers(&self) -> usize {
        self.layers.as_ref().map_or(1, |d| d.coords.len())
    }

    /// 全部数据
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 第 k 层
    #[must_use]
    pub fn layer(&self, k: usize) -> &[f64] {
        let n = self.grid.n_cells();
        &self.data[k * n..(k + 1) * n]
    }

    /// 第 k 层（可变）
    pub fn layer_mut(&mut self, k: usize) -> &mut [f64] {
        let n = self.grid.n_cells();
        &mut self.data[k * n..(k + 1) * n]
    }

    /// 获取像素值（首层）
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.grid.height && col < self.grid.width {
            Some(self.data[self.grid.index(row, col)])
        } else {
            None
        }
    }

    /// 设置像素值（首层），越界忽略
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        if row < self.grid.height && col < self.grid.width {
            let idx = self.grid.index(row, col);
            self.data[idx] = value;
        }
    }

    /// 判断是否为无数据
    #[inline]
    #[must_use]
    pub fn is_nodata(&self, value: f64) -> bool {
        is_nodata_value(value, self.nodata)
    }

    /// 首层第 i 个单元的有效值
    #[inline]
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.data
            .get(index)
            .copied()
            .filter(|&v| !self.is_nodata(v))
    }

    /// 首层有效单元数量
    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.layer(0).iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// 首层有效单元的 (索引, 值)
    pub fn valid_cells(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.layer(0)
            .iter()
            .enumerate()
            .filter(|(_, &v)| !self.is_nodata(v))
            .map(|(i, &v)| (i, v))
    }

    /// 对有效值逐单元变换，无数据保持不变
    #[must_use]
    pub fn map_valid(&self, f: impl Fn(f64) -> f64) -> Self {
        let mut out = self.clone();
        let nodata = self.nodata;
        for v in out.data.iter_mut() {
            if !is_nodata_value(*v, nodata) {
                *v = f(*v);
            }
        }
        out
    }

    /// 更换空间参考（形状必须一致）
    pub fn with_grid(mut self, grid: GridSpec) -> MhResult<Self> {
        MhError::check_size("raster grid cells", self.grid.n_cells(), grid.n_cells())?;
        self.grid = grid;
        Ok(self)
    }
}

/// 判断单个值是否为无数据
#[inline]
#[must_use]
pub fn is_nodata_value(value: f64, nodata: f64) -> bool {
    value.is_nan() || (nodata.is_finite() && (value - nodata).abs() < 1e-10)
}
