// crates/mh_workflow/src/tables.rs

//! 要素表存储
//!
//! 每个湖泊/水库可以拥有零到两张表（率定曲线、面积时序）。
//! 表在内部以 `(表族, 要素标识)` 复合键索引，只在持久化边界
//! 渲染为 `"<表族>_<标识>"` 字符串，即 CSV 文件名的主干。

use mh_foundation::error::{MhError, MhResult};
use mh_geo::FeatureId;
use mh_io::table::Table;
use mh_io::table_csv::{read_table, write_table};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 表族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableFamily {
    /// 湖泊库容-水位曲线
    LakeSh,
    /// 湖泊流量-水位曲线
    LakeHq,
    /// 水库水面面积时序
    ReservoirTimeseries,
}

impl TableFamily {
    /// 所有表族
    pub const ALL: [TableFamily; 3] = [
        TableFamily::LakeSh,
        TableFamily::LakeHq,
        TableFamily::ReservoirTimeseries,
    ];

    /// 名称前缀
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            TableFamily::LakeSh => "lake_sh",
            TableFamily::LakeHq => "lake_hq",
            TableFamily::ReservoirTimeseries => "reservoir_timeseries",
        }
    }
}

/// 表复合键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    /// 表族
    pub family: TableFamily,
    /// 要素标识
    pub feature: FeatureId,
}

impl TableKey {
    /// 创建键
    #[must_use]
    pub fn new(family: TableFamily, feature: impl Into<FeatureId>) -> Self {
        Self {
            family,
            feature: feature.into(),
        }
    }

    /// 检查渲染后的名称能唯一还原为本键
    ///
    /// 字符串标识 `"12"` 与整数标识 `12` 渲染相同，会在磁盘上互相覆盖；
    /// 含路径分隔符或首尾空白的标识也无法作为文件名还原。
    pub fn check_name(&self) -> MhResult<()> {
        let name = self.to_string();
        let round_trips = !name.contains(['/', '\\'])
            && name.parse::<TableKey>().is_ok_and(|back| back == *self);
        if round_trips {
            Ok(())
        } else {
            Err(MhError::invalid_input(format!(
                "table key {:?} renders as '{name}', which does not identify it uniquely",
                self.feature
            )))
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.family.prefix(), self.feature)
    }
}

impl FromStr for TableKey {
    type Err = MhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for family in TableFamily::ALL {
            if let Some(id) = s
                .strip_prefix(family.prefix())
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|id| !id.is_empty())
            {
                let feature = id.parse::<FeatureId>().unwrap_or_else(|never| match never {});
                return Ok(Self { family, feature });
            }
        }
        Err(MhError::unknown_key(s, "table name"))
    }
}

/// 要素表存储
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStore {
    tables: BTreeMap<TableKey, Table>,
}

impl TableStore {
    /// 创建空存储
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖
    ///
    /// 名称无法唯一还原的键被拒绝，见 [`TableKey::check_name`]。
    pub fn put(&mut self, key: TableKey, table: Table) -> MhResult<()> {
        key.check_name()?;
        tracing::debug!(table = %key, rows = table.n_rows(), "table stored");
        self.tables.insert(key, table);
        Ok(())
    }

    /// 读取
    pub fn get(&self, key: &TableKey) -> MhResult<&Table> {
        self.tables
            .get(key)
            .ok_or_else(|| MhError::missing_table(key.to_string()))
    }

    /// 按渲染后的名称读取
    pub fn get_by_name(&self, name: &str) -> MhResult<&Table> {
        let key: TableKey = name.parse().map_err(|_| MhError::missing_table(name))?;
        self.get(&key)
    }

    /// 是否存在
    #[must_use]
    pub fn contains(&self, key: &TableKey) -> bool {
        self.tables.contains_key(key)
    }

    /// 所有表名
    #[must_use]
    pub fn all_names(&self) -> BTreeSet<String> {
        self.tables.keys().map(ToString::to_string).collect()
    }

    /// 所有键
    pub fn keys(&self) -> impl Iterator<Item = &TableKey> {
        self.tables.keys()
    }

    /// 按键遍历
    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &Table)> {
        self.tables.iter()
    }

    /// 表数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// 清空
    pub fn clear(&mut self) {
        self.tables.clear();
    }

    /// 每个表写一个 `<名称>.csv`
    pub fn persist(&self, dir: &Path) -> MhResult<()> {
        std::fs::create_dir_all(dir)?;
        for (key, table) in &self.tables {
            write_table(&dir.join(format!("{key}.csv")), table)?;
        }
        tracing::info!(dir = %dir.display(), tables = self.len(), "tables persisted");
        Ok(())
    }

    /// 从目录恢复，替换当前内容
    ///
    /// 文件名主干不是合法表名的 CSV 会被跳过。
    pub fn restore(&mut self, dir: &Path) -> MhResult<()> {
        let mut tables = BTreeMap::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        entries.sort();

        for path in entries {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<TableKey>() {
                Ok(key) => {
                    tables.insert(key, read_table(&path)?);
                }
                Err(_) => {
                    tracing::warn!(file = %path.display(), "skipping CSV that is not a table");
                }
            }
        }

        self.tables = tables;
        tracing::info!(dir = %dir.display(), tables = self.len(), "tables restored");
        Ok(())
    }
}
