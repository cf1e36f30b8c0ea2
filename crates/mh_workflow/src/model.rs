// crates/mh_workflow/src/model.rs

//! 模型会话
//!
//! [`WflowModel`] 独占静态图存储、配置文档和要素表存储三者。装配流程不直接修改
//! 存储，而是先把所有输出收集到 [`StagedUpdate`]，再由 [`WflowModel::commit`]
//! 一次性校验并写入：任何校验失败都发生在第一次修改之前。

use crate::catalog::DataCatalog;
use crate::naming::{ModelMode, NameTranslator};
use crate::recipe::BuildRecipe;
use crate::setup::SetupMethod;
use crate::staticmaps::StaticMaps;
use crate::tables::{TableKey, TableStore};
use mh_config::{ConfigDocument, ConfigValue};
use mh_foundation::error::{MhError, MhResult};
use mh_geo::GridSpec;
use mh_io::staticmaps::STATICMAPS_FILE;
use mh_io::table::Table;
use mh_terrain::{GridResampler, Raster, Reprojector, ResampleMethod};
use std::fmt;
use std::path::Path;

// ============================================================
// 暂存更新
// ============================================================

/// 一次装配调用的全部输出
#[derive(Debug, Default)]
pub struct StagedUpdate {
    fields: Vec<(String, Raster)>,
    config: Vec<(String, ConfigValue)>,
    unset: Vec<String>,
    tables: Vec<(TableKey, Table)>,
}

impl StagedUpdate {
    /// 创建空更新
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 暂存字段
    pub fn stage_field(&mut self, name: impl Into<String>, raster: Raster) {
        self.fields.push((name.into(), raster));
    }

    /// 暂存配置项
    pub fn stage_config(&mut self, path: impl Into<String>, value: impl Into<ConfigValue>) {
        self.config.push((path.into(), value.into()));
    }

    /// 暂存配置项删除（在设置之后执行）
    pub fn unset_config(&mut self, path: impl Into<String>) {
        self.unset.push(path.into());
    }

    /// 暂存要素表
    pub fn stage_table(&mut self, key: TableKey, table: Table) {
        self.tables.push((key, table));
    }

    /// 暂存字段并通过翻译器写入对应配置路径
    ///
    /// 结构性字段只登记，不写配置；词汇表之外的名称返回 `UnknownKey`。
    pub fn stage_mapped(
        &mut self,
        translator: &NameTranslator,
        name: &str,
        raster: Raster,
    ) -> MhResult<()> {
        let path = translator.to_config_path(name)?;
        self.stage_field(name, raster);
        if let Some(path) = path {
            self.stage_config(path, name);
        }
        Ok(())
    }

    /// 已暂存的字段名
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// 按名称查看已暂存的字段
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Raster> {
        self.fields.iter().rev().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// 是否没有任何内容
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.config.is_empty() && self.unset.is_empty() && self.tables.is_empty()
    }
}

impl fmt::Display for StagedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fields, {} config entries, {} removals, {} tables",
            self.fields.len(),
            self.config.len(),
            self.unset.len(),
            self.tables.len()
        )
    }
}

// ============================================================
// 模型会话
// ============================================================

/// 模型会话
pub struct WflowModel {
    grid: GridSpec,
    translator: NameTranslator,
    staticmaps: StaticMaps,
    config: ConfigDocument,
    tables: TableStore,
    reprojector: Box<dyn Reprojector>,
}

impl fmt::Debug for WflowModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WflowModel")
            .field("grid", &self.grid)
            .field("mode", &self.translator.mode())
            .field("staticmaps", &self.staticmaps.len())
            .field("config", &self.config.len())
            .field("tables", &self.tables.len())
            .finish()
    }
}

impl WflowModel {
    /// 在给定模型网格上创建空会话
    #[must_use]
    pub fn new(grid: GridSpec, mode: ModelMode) -> Self {
        Self {
            staticmaps: StaticMaps::with_grid(grid.clone()),
            grid,
            translator: NameTranslator::new(mode),
            config: ConfigDocument::new(),
            tables: TableStore::new(),
            reprojector: Box::new(GridResampler::default()),
        }
    }

    /// 替换重投影实现
    #[must_use]
    pub fn with_reprojector(mut self, reprojector: impl Reprojector + 'static) -> Self {
        self.reprojector = Box::new(reprojector);
        self
    }

    /// 模型网格
    #[must_use]
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// 模型模式
    #[must_use]
    pub fn mode(&self) -> ModelMode {
        self.translator.mode()
    }

    /// 名称翻译器
    #[must_use]
    pub fn translator(&self) -> &NameTranslator {
        &self.translator
    }

    /// 静态图存储
    #[must_use]
    pub fn staticmaps(&self) -> &StaticMaps {
        &self.staticmaps
    }

    /// 配置文档
    #[must_use]
    pub fn config(&self) -> &ConfigDocument {
        &self.config
    }

    /// 读取配置项
    #[must_use]
    pub fn get_config(&self, path: &str) -> Option<&ConfigValue> {
        self.config.get(path)
    }

    /// 直接设置配置项
    pub fn set_config(&mut self, path: &str, value: impl Into<ConfigValue>) -> MhResult<()> {
        Ok(self.config.set(path, value)?)
    }

    /// 要素表存储
    #[must_use]
    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    /// 重采样到模型网格
    pub fn reproject(&self, source: &Raster, method: ResampleMethod) -> MhResult<Raster> {
        self.reprojector.reproject(source, &self.grid, method)
    }

    /// 校验并应用暂存更新
    ///
    /// 先校验全部字段的空间参考、配置路径和表名，再依次写入字段、配置和表。
    pub fn commit(&mut self, update: StagedUpdate) -> MhResult<()> {
        for (name, raster) in &update.fields {
            self.staticmaps.check_compatible(name, raster.grid())?;
        }
        for (path, _) in &update.config {
            ConfigDocument::validate_path(path)?;
        }
        for path in &update.unset {
            ConfigDocument::validate_path(path)?;
        }
        for (key, _) in &update.tables {
            key.check_name()?;
        }

        tracing::debug!(update = %update, "committing staged update");
        let StagedUpdate {
            fields,
            config,
            unset,
            tables,
        } = update;
        for (name, raster) in fields {
            self.staticmaps.register(name, raster)?;
        }
        for (path, value) in config {
            self.config.set(&path, value)?;
        }
        for path in unset {
            self.config.remove(&path);
        }
        for (key, table) in tables {
            self.tables.put(key, table)?;
        }
        Ok(())
    }

    /// 运行一个装配步骤
    pub fn run(&mut self, method: &dyn SetupMethod, catalog: &dyn DataCatalog) -> MhResult<()> {
        tracing::info!(step = method.name(), "running setup step");
        method.validate()?;
        let update = method.stage(self, catalog)?;
        tracing::info!(step = method.name(), update = %update, "setup step staged");
        self.commit(update)
    }

    /// 按构建配方依次运行全部步骤
    ///
    /// 配方整体先校验；每个步骤各自原子提交。
    pub fn update(&mut self, catalog: &dyn DataCatalog, recipe: &BuildRecipe) -> MhResult<()> {
        recipe.validate()?;
        for step in &recipe.steps {
            self.run(step.as_method(), catalog)?;
        }
        tracing::info!(steps = recipe.steps.len(), "model update finished");
        Ok(())
    }

    /// 清空字段、配置与表
    pub fn reset(&mut self) {
        self.staticmaps.reset();
        self.config = ConfigDocument::new();
        self.tables.clear();
    }

    // ============================================================
    // 持久化
    // ============================================================

    /// 写出到模型根目录
    ///
    /// 生成 `staticmaps.mhsm`、当前模式的 TOML 配置和每张表一个 CSV。
    pub fn write(&self, root: &Path) -> MhResult<()> {
        std::fs::create_dir_all(root)?;
        self.staticmaps.write(&root.join(STATICMAPS_FILE))?;
        self.config.write(root.join(self.mode().config_file_name()))?;
        self.tables.persist(root)?;
        tracing::info!(
            root = %root.display(),
            fields = self.staticmaps.len(),
            tables = self.tables.len(),
            "model written"
        );
        Ok(())
    }

    /// 从模型根目录读取
    ///
    /// 模型网格取自静态图容器；配置文件缺失时得到空配置。
    pub fn read(root: &Path, mode: ModelMode) -> MhResult<Self> {
        let staticmaps = StaticMaps::read(&root.join(STATICMAPS_FILE))?;
        let grid = staticmaps.grid().cloned().ok_or_else(|| {
            MhError::invalid_input(format!(
                "{} in {} carries no grid definition",
                STATICMAPS_FILE,
                root.display()
            ))
        })?;

        let config_path = root.join(mode.config_file_name());
        let config = if config_path.exists() {
            ConfigDocument::read(&config_path)?
        } else {
            tracing::warn!(path = %config_path.display(), "config file not found, starting empty");
            ConfigDocument::new()
        };

        let mut tables = TableStore::new();
        tables.restore(root)?;

        Ok(Self {
            grid,
            translator: NameTranslator::new(mode),
            staticmaps,
            config,
            tables,
            reprojector: Box::new(GridResampler::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TableFamily;
    use mh_geo::CrsDefinition;

    fn grid(res: f64) -> GridSpec {
        GridSpec::new(CrsDefinition::wgs84(), 12.0, 46.0, res, -res, 3, 2)
    }

    #[test]
    fn test_stage_mapped_writes_config() {
        let model = WflowModel::new(grid(0.5), ModelMode::Standard);
        let mut update = StagedUpdate::new();
        update
            .stage_mapped(model.translator(), "wflow_dem", Raster::filled(grid(0.5), 1.0, -9999.0))
            .unwrap();
        update
            .stage_mapped(model.translator(), "wflow_uparea", Raster::filled(grid(0.5), 1.0, -9999.0))
            .unwrap();
        let mut model = model;
        model.commit(update).unwrap();
        assert_eq!(model.config().get_str("input.vertical.altitude"), Some("wflow_dem"));
        assert_eq!(model.config().len(), 1);
        assert!(model.staticmaps().has("wflow_uparea"));
    }

    #[test]
    fn test_stage_mapped_unknown_name() {
        let model = WflowModel::new(grid(0.5), ModelMode::Standard);
        let mut update = StagedUpdate::new();
        let err = update
            .stage_mapped(model.translator(), "not_a_map", Raster::filled(grid(0.5), 1.0, -9999.0))
            .unwrap_err();
        assert!(matches!(err, MhError::UnknownKey { .. }));
        assert!(update.is_empty());
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut model = WflowModel::new(grid(0.5), ModelMode::Standard);
        let mut update = StagedUpdate::new();
        update.stage_field("good", Raster::filled(grid(0.5), 1.0, -9999.0));
        update.stage_config("model.reservoirs", true);
        update.stage_table(
            TableKey::new(TableFamily::ReservoirTimeseries, 1),
            Table::from_columns(vec![("area".into(), vec![1.0])]).unwrap(),
        );
        update.stage_field("bad", Raster::filled(grid(0.25), 1.0, -9999.0));

        let err = model.commit(update).unwrap_err();
        assert!(matches!(err, MhError::GridMismatch { .. }));
        assert!(model.staticmaps().is_empty());
        assert!(model.config().is_empty());
        assert!(model.tables().is_empty());
    }

    #[test]
    fn test_invalid_config_path_rejected_before_mutation() {
        let mut model = WflowModel::new(grid(0.5), ModelMode::Standard);
        let mut update = StagedUpdate::new();
        update.stage_field("good", Raster::filled(grid(0.5), 1.0, -9999.0));
        update.stage_config("model..lakes", true);
        assert!(model.commit(update).is_err());
        assert!(model.staticmaps().is_empty());
    }

    #[test]
    fn test_ambiguous_table_key_rejected_before_mutation() {
        let mut model = WflowModel::new(grid(0.5), ModelMode::Standard);
        let mut update = StagedUpdate::new();
        update.stage_field("good", Raster::filled(grid(0.5), 1.0, -9999.0));
        update.stage_table(
            TableKey::new(TableFamily::LakeHq, "12"),
            Table::from_columns(vec![("H".into(), vec![1.0])]).unwrap(),
        );
        assert!(matches!(model.commit(update).unwrap_err(), MhError::InvalidInput { .. }));
        assert!(model.staticmaps().is_empty());
        assert!(model.tables().is_empty());
    }

    #[test]
    fn test_unset_after_set() {
        let mut model = WflowModel::new(grid(0.5), ModelMode::Standard);
        model.set_config("input.lateral.land.elevation", "x").unwrap();
        let mut update = StagedUpdate::new();
        update.unset_config("input.lateral.land.elevation");
        model.commit(update).unwrap();
        assert!(model.get_config("input.lateral.land.elevation").is_none());
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = WflowModel::new(grid(0.5), ModelMode::Standard);
        let mut update = StagedUpdate::new();
        update
            .stage_mapped(model.translator(), "wflow_dem", Raster::filled(grid(0.5), 412.5, -9999.0))
            .unwrap();
        update.stage_config("model.lakes", true);
        update.stage_table(
            TableKey::new(TableFamily::LakeSh, 12),
            Table::from_columns(vec![("H".into(), vec![1.0, 2.0]), ("S".into(), vec![0.0, 5.0])]).unwrap(),
        );
        model.commit(update).unwrap();
        model.write(dir.path()).unwrap();
        assert!(dir.path().join("wflow_sbm.toml").exists());

        let back = WflowModel::read(dir.path(), ModelMode::Standard).unwrap();
        assert_eq!(back.grid(), model.grid());
        assert_eq!(back.get_config("model.lakes").and_then(ConfigValue::as_bool), Some(true));
        assert_eq!(back.tables(), model.tables());
        assert_eq!(back.staticmaps().get("wflow_dem").unwrap().data()[0], 412.5);
    }
}
