// crates/mh_workflow/src/staticmaps.rs

//! 静态图存储
//!
//! 模型所有二维（或分层）参数字段的集合。所有字段共享同一个 [`GridSpec`]：
//! 第一个注册的字段建立空间参考（或构造时用 [`StaticMaps::with_grid`] 固定），
//! 之后任何空间参考不同的字段都会被拒绝，不做隐式重投影。
//!
//! 同名注册是覆盖（upsert），字段只会在整体 [`reset`](StaticMaps::reset) 时删除。

use mh_foundation::error::{MhError, MhResult};
use mh_geo::GridSpec;
use mh_io::staticmaps::{read_staticmaps, write_staticmaps};
use mh_terrain::Raster;
use std::collections::HashMap;
use std::path::Path;

/// 静态图存储
#[derive(Debug, Clone, Default)]
pub struct StaticMaps {
    grid: Option<GridSpec>,
    fixed: bool,
    order: Vec<String>,
    fields: HashMap<String, Raster>,
}

impl StaticMaps {
    /// 创建空存储，空间参考由第一个字段决定
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建固定空间参考的存储
    #[must_use]
    pub fn with_grid(grid: GridSpec) -> Self {
        Self {
            grid: Some(grid),
            fixed: true,
            ..Self::default()
        }
    }

    /// 已建立的空间参考
    #[must_use]
    pub fn grid(&self) -> Option<&GridSpec> {
        self.grid.as_ref()
    }

    /// 检查空间参考是否与存储一致
    pub fn check_compatible(&self, name: &str, grid: &GridSpec) -> MhResult<()> {
        match &self.grid {
            Some(expected) if expected != grid => Err(MhError::grid_mismatch(name, expected, grid)),
            _ => Ok(()),
        }
    }

    /// 注册字段（插入或覆盖）
    pub fn register(&mut self, name: impl Into<String>, raster: Raster) -> MhResult<()> {
        let name = name.into();
        self.check_compatible(&name, raster.grid())?;
        if self.grid.is_none() {
            self.grid = Some(raster.grid().clone());
        }
        if self.fields.insert(name.clone(), raster).is_some() {
            tracing::debug!(field = %name, "static map replaced");
        } else {
            tracing::debug!(field = %name, "static map added");
            self.order.push(name);
        }
        Ok(())
    }

    /// 读取字段
    pub fn get(&self, name: &str) -> MhResult<&Raster> {
        self.fields.get(name).ok_or_else(|| MhError::missing_field(name))
    }

    /// 是否存在字段
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// 字段名（按首次注册顺序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// 按注册顺序遍历字段
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster)> {
        self.order
            .iter()
            .filter_map(|n| self.fields.get(n).map(|r| (n.as_str(), r)))
    }

    /// 字段数
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 清空字段；未固定的空间参考一并清除
    pub fn reset(&mut self) {
        self.fields.clear();
        self.order.clear();
        if !self.fixed {
            self.grid = None;
        }
    }

    /// 写入容器文件
    pub fn write(&self, path: &Path) -> MhResult<()> {
        write_staticmaps(path, self.grid.as_ref(), self.iter())?;
        Ok(())
    }

    /// 从容器文件读取
    ///
    /// 容器里记录的空间参考成为固定参考。
    pub fn read(path: &Path) -> MhResult<Self> {
        let container = read_staticmaps(path)?;
        let mut maps = match container.grid {
            Some(grid) => Self::with_grid(grid),
            None => Self::new(),
        };
        for (name, raster) in container.fields {
            maps.register(name, raster)?;
        }
        Ok(maps)
    }
}
