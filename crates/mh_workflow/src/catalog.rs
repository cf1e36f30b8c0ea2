// crates/mh_workflow/src/catalog.rs

//! 数据目录接口
//!
//! 装配流程只通过 [`DataCatalog`] 按标识获取外部数据：栅格（单变量数组或多变量数据集）、
//! 矢量要素和表。[`InMemoryCatalog`] 是基于内存注册的实现，表可以指向磁盘 CSV
//! 并在首次访问时读取。
//!
//! # 占位符
//!
//! 表条目支持 `{name}` 占位符展开：
//!
//! ```
//! use mh_workflow::catalog::{DataCatalog, InMemoryCatalog};
//!
//! let mut catalog = InMemoryCatalog::new();
//! catalog
//!     .add_table_files(
//!         "lake_rating_test_{index}",
//!         "/data/rating_curve_{index}.csv",
//!         "index",
//!         &["169", "170"],
//!     )
//!     .unwrap();
//! assert!(catalog.contains("lake_rating_test_169"));
//! assert!(catalog.contains("lake_rating_test_170"));
//! ```

use mh_foundation::error::{MhError, MhResult};
use mh_geo::Feature;
use mh_io::table::Table;
use mh_io::table_csv::read_table;
use mh_terrain::Raster;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================
// 栅格数据源
// ============================================================

/// 栅格数据源
#[derive(Debug, Clone)]
pub enum RasterSource {
    /// 单变量数组（无变量名）
    Array(Raster),
    /// 多变量数据集，按源顺序
    Dataset(Vec<(String, Raster)>),
}

impl RasterSource {
    /// 是否为多变量数据集
    #[must_use]
    pub fn is_dataset(&self) -> bool {
        matches!(self, RasterSource::Dataset(_))
    }

    /// 变量数
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RasterSource::Array(_) => 1,
            RasterSource::Dataset(vars) => vars.len(),
        }
    }

    /// 是否没有变量
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 转为多变量形式，数据集中的变量按名称取出
    pub fn into_dataset(self, id: &str) -> MhResult<Vec<(String, Raster)>> {
        match self {
            RasterSource::Dataset(vars) => Ok(vars),
            RasterSource::Array(_) => Err(MhError::invalid_input(format!(
                "source '{id}' is a single-variable array, a multi-variable dataset is required"
            ))),
        }
    }
}

// ============================================================
// 目录接口
// ============================================================

/// 数据目录
pub trait DataCatalog {
    /// 是否包含数据源
    fn contains(&self, id: &str) -> bool;

    /// 读取栅格
    ///
    /// `variables` 仅对数据集生效，按给定顺序挑选变量。
    fn raster(&self, id: &str, variables: Option<&[String]>) -> MhResult<RasterSource>;

    /// 读取矢量要素
    fn geometries(&self, id: &str) -> MhResult<Vec<Feature>>;

    /// 读取表
    fn table(&self, id: &str) -> MhResult<Table>;
}

#[derive(Debug, Clone)]
enum CatalogEntry {
    Raster(RasterSource),
    Geometries(Vec<Feature>),
    Table(Table),
    TableFile(PathBuf),
}

impl CatalogEntry {
    fn kind(&self) -> &'static str {
        match self {
            CatalogEntry::Raster(_) => "raster",
            CatalogEntry::Geometries(_) => "geometries",
            CatalogEntry::Table(_) | CatalogEntry::TableFile(_) => "table",
        }
    }
}

/// 内存数据目录
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl InMemoryCatalog {
    /// 创建空目录
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单变量栅格
    pub fn add_raster(&mut self, id: impl Into<String>, raster: Raster) -> &mut Self {
        self.insert(id.into(), CatalogEntry::Raster(RasterSource::Array(raster)))
    }

    /// 注册多变量数据集
    pub fn add_dataset<S: Into<String>>(
        &mut self,
        id: impl Into<String>,
        variables: impl IntoIterator<Item = (S, Raster)>,
    ) -> &mut Self {
        let vars = variables.into_iter().map(|(n, r)| (n.into(), r)).collect();
        self.insert(id.into(), CatalogEntry::Raster(RasterSource::Dataset(vars)))
    }

    /// 注册矢量要素
    pub fn add_geometries(&mut self, id: impl Into<String>, features: Vec<Feature>) -> &mut Self {
        self.insert(id.into(), CatalogEntry::Geometries(features))
    }

    /// 注册内存表
    pub fn add_table(&mut self, id: impl Into<String>, table: Table) -> &mut Self {
        self.insert(id.into(), CatalogEntry::Table(table))
    }

    /// 注册 CSV 表文件（首次访问时读取）
    pub fn add_table_file(&mut self, id: impl Into<String>, path: impl AsRef<Path>) -> &mut Self {
        self.insert(id.into(), CatalogEntry::TableFile(path.as_ref().to_path_buf()))
    }

    /// 注册带占位符的表文件族
    ///
    /// `id_pattern` 和 `path_pattern` 中的 `{placeholder}` 依次替换为每个取值。
    /// 标识模式必须包含该占位符，否则展开后的条目会互相覆盖。
    pub fn add_table_files<S: AsRef<str>>(
        &mut self,
        id_pattern: &str,
        path_pattern: &str,
        placeholder: &str,
        values: &[S],
    ) -> MhResult<&mut Self> {
        let token = format!("{{{placeholder}}}");
        if !id_pattern.contains(&token) {
            return Err(MhError::invalid_config(
                "placeholders",
                id_pattern,
                format!("identifier does not contain '{token}'"),
            ));
        }
        for value in values {
            let value = value.as_ref();
            let id = id_pattern.replace(&token, value);
            let path = path_pattern.replace(&token, value);
            self.add_table_file(id, path);
        }
        Ok(self)
    }

    /// 已注册的标识
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn insert(&mut self, id: String, entry: CatalogEntry) -> &mut Self {
        tracing::debug!(source = %id, kind = entry.kind(), "catalog entry registered");
        self.entries.insert(id, entry);
        self
    }

    fn entry(&self, id: &str) -> MhResult<&CatalogEntry> {
        self.entries.get(id).ok_or_else(|| MhError::missing_source(id))
    }

    fn wrong_kind(id: &str, expected: &str, entry: &CatalogEntry) -> MhError {
        MhError::invalid_input(format!(
            "source '{id}' is a {} source, not {expected}",
            entry.kind()
        ))
    }
}

impl DataCatalog for InMemoryCatalog {
    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn raster(&self, id: &str, variables: Option<&[String]>) -> MhResult<RasterSource> {
        let entry = self.entry(id)?;
        let CatalogEntry::Raster(source) = entry else {
            return Err(Self::wrong_kind(id, "a raster", entry));
        };
        match (source, variables) {
            (RasterSource::Dataset(vars), Some(selection)) => {
                let mut picked = Vec::with_capacity(selection.len());
                for name in selection {
                    let (_, raster) = vars
                        .iter()
                        .find(|(n, _)| n == name)
                        .ok_or_else(|| MhError::unknown_key(name.as_str(), "source variable"))?;
                    picked.push((name.clone(), raster.clone()));
                }
                Ok(RasterSource::Dataset(picked))
            }
            (source, _) => Ok(source.clone()),
        }
    }

    fn geometries(&self, id: &str) -> MhResult<Vec<Feature>> {
        match self.entry(id)? {
            CatalogEntry::Geometries(features) => Ok(features.clone()),
            other => Err(Self::wrong_kind(id, "geometries", other)),
        }
    }

    fn table(&self, id: &str) -> MhResult<Table> {
        match self.entry(id)? {
            CatalogEntry::Table(table) => Ok(table.clone()),
            CatalogEntry::TableFile(path) => {
                if !path.exists() {
                    return Err(MhError::file_not_found(path));
                }
                Ok(read_table(path)?)
            }
            other => Err(Self::wrong_kind(id, "a table", other)),
        }
    }
}
