// crates/mh_workflow/tests/waterbodies.rs

//! 湖泊与水库集成测试
//! 水库参数数量一致性、湖泊外部率定曲线接入与表的往返

mod common;

use common::waterbody;
use mh_foundation::error::MhError;
use mh_io::table::Table;
use mh_io::write_table;
use mh_workflow::setup::reservoirs::RESERVOIR_PARAMETERS;
use mh_workflow::{ModelMode, SetupLakes, SetupReservoirs, WflowModel};

/// 测试每个必需水库参数在 K 个出口单元上恰有 K 个有效值
#[test]
fn test_reservoir_cardinality() {
    let (mut model, mut catalog) = common::model_with_basemaps(ModelMode::Standard);
    let reservoirs = vec![
        waterbody(11, (0.0, 300.0), (200.0, 500.0))
            .with_property("Capacity_max", 3.0e6)
            .with_property("Dis_avg", 1.5),
        waterbody(12, (300.0, 300.0), (500.0, 500.0))
            .with_property("Vol_avg", 2.0e6)
            .with_property("Area_avg", 3.0e6)
            .with_property("Dis_avg", 0.5),
        waterbody(13, (0.0, 0.0), (200.0, 200.0))
            .with_property("Vol_avg", 1.0e6)
            .with_property("Dis_avg", 0.2),
    ];
    catalog.add_geometries("hydro_reservoirs", reservoirs);
    model.run(&SetupReservoirs::default().with_min_area(0.0), &catalog).unwrap();

    let maps = model.staticmaps();
    let locs = maps.get("wflow_reservoirlocs").unwrap();
    let cells: Vec<usize> = locs.valid_cells().map(|(i, _)| i).collect();
    assert_eq!(cells.len(), 3);
    for name in RESERVOIR_PARAMETERS {
        let field = maps.get(name).unwrap();
        let at_locs = cells.iter().filter(|&&i| field.value_at(i).is_some()).count();
        assert_eq!(at_locs, 3, "{name}");
        assert_eq!(field.count_valid(), 3, "{name}");
    }
    assert_eq!(maps.get("wflow_reservoirareas").unwrap().count_valid(), 12);
    assert_eq!(model.config().get_bool("model.reservoirs"), Some(true));
    assert_eq!(
        model.config().get_str("input.lateral.river.reservoir.locs"),
        Some("wflow_reservoirlocs")
    );
}

/// 测试标识与无数据值相同的水库报错且不修改模型
#[test]
fn test_reservoir_id_equal_to_nodata() {
    let (mut model, mut catalog) = common::model_with_basemaps(ModelMode::Standard);
    catalog.add_geometries(
        "hydro_reservoirs",
        vec![waterbody(-999, (0.0, 300.0), (200.0, 500.0))
            .with_property("Capacity_max", 3.0e6)
            .with_property("Dis_avg", 1.5)],
    );
    let before = model.staticmaps().len();
    let err = model.run(&SetupReservoirs::default().with_min_area(0.0), &catalog).unwrap_err();
    assert!(matches!(err, MhError::InvalidInput { .. }));
    assert_eq!(model.staticmaps().len(), before);
    assert!(!model.staticmaps().has("wflow_reservoirlocs"));
    assert!(model.get_config("model.reservoirs").is_none());
}

/// 测试面积过滤后没有水库时不修改模型
#[test]
fn test_reservoirs_below_min_area() {
    let (mut model, mut catalog) = common::model_with_basemaps(ModelMode::Standard);
    catalog.add_geometries(
        "hydro_reservoirs",
        vec![waterbody(1, (0.0, 300.0), (200.0, 500.0))
            .with_property("Area_avg", 4.0e4)
            .with_property("Vol_avg", 1.0e5)
            .with_property("Dis_avg", 1.0)],
    );
    let before = model.staticmaps().len();
    model.run(&SetupReservoirs::default(), &catalog).unwrap();
    assert_eq!(model.staticmaps().len(), before);
}

/// 测试外部率定曲线生成两张表并切换函数代码，表可写出后读回
#[test]
fn test_lake_rating_curve_wiring() {
    let dir = tempfile::tempdir().unwrap();
    let lake_id = 1001;
    let levels: Vec<f64> = (0..6).map(|i| 120.0 + i as f64 * 0.5).collect();
    let nan = f64::NAN;
    let curve = Table::from_columns(vec![
        ("elevtn".to_string(), levels.clone()),
        ("volume".to_string(), levels.iter().map(|h| (h - 120.0) * 4.0e4).collect()),
        ("discharge".to_string(), vec![nan, nan, 0.0, 1.0, 2.0, nan]),
    ])
    .unwrap();
    write_table(&dir.path().join(format!("rating_curve_{lake_id}.csv")), &curve).unwrap();

    let (mut model, mut catalog) = common::model_with_basemaps(ModelMode::Standard);
    catalog.add_geometries(
        "hydro_lakes",
        vec![waterbody(lake_id, (300.0, 0.0), (500.0, 200.0))
            .with_property("Area_avg", 4.0e4)
            .with_property("Depth_avg", 2.5)
            .with_property("Dis_avg", 1.0)],
    );
    let pattern = dir.path().join("rating_curve_{index}.csv");
    catalog
        .add_table_files(
            "lake_rating_test_{index}",
            pattern.to_str().unwrap(),
            "index",
            &[lake_id.to_string()],
        )
        .unwrap();

    let step = SetupLakes::default()
        .with_min_area(0.0)
        .with_rating_curves([format!("lake_rating_test_{lake_id}")]);
    model.run(&step, &catalog).unwrap();

    let sh_name = format!("lake_sh_{lake_id}");
    let hq_name = format!("lake_hq_{lake_id}");
    assert!(model.tables().all_names().contains(&sh_name));
    assert!(model.tables().all_names().contains(&hq_name));
    assert_eq!(model.tables().get_by_name(&hq_name).unwrap().n_rows(), 3);

    let maps = model.staticmaps();
    let locs = maps.get("wflow_lakelocs").unwrap();
    let (cell, id) = locs.valid_cells().next().unwrap();
    assert_eq!(id, lake_id as f64);
    assert_eq!(maps.get("LakeStorFunc").unwrap().value_at(cell), Some(2.0));
    assert_eq!(maps.get("LakeOutflowFunc").unwrap().value_at(cell), Some(1.0));

    let root = dir.path().join("wflow_lake_test");
    model.write(&root).unwrap();
    let restored = WflowModel::read(&root, ModelMode::Standard).unwrap();
    assert_eq!(
        restored.tables().get_by_name(&sh_name).unwrap(),
        model.tables().get_by_name(&sh_name).unwrap()
    );
    assert_eq!(restored.tables().len(), 2);
}

/// 测试缺少率定曲线又无法解析参数化的湖泊报错且不修改模型
#[test]
fn test_lake_without_parameterization() {
    let (mut model, mut catalog) = common::model_with_basemaps(ModelMode::Standard);
    catalog.add_geometries(
        "hydro_lakes",
        vec![waterbody(5, (0.0, 300.0), (200.0, 500.0)).with_property("Area_avg", 4.0e4)],
    );
    let before = model.staticmaps().len();
    let err = model.run(&SetupLakes::default().with_min_area(0.0), &catalog).unwrap_err();
    assert!(matches!(err, MhError::MissingParameterization { .. }));
    assert_eq!(model.staticmaps().len(), before);
    assert!(model.tables().is_empty());
}

/// 测试率定曲线文件缺失时报错
#[test]
fn test_missing_rating_curve_file() {
    let dir = tempfile::tempdir().unwrap();
    let (mut model, mut catalog) = common::model_with_basemaps(ModelMode::Standard);
    catalog.add_geometries(
        "hydro_lakes",
        vec![waterbody(8, (0.0, 300.0), (200.0, 500.0))
            .with_property("Depth_avg", 2.0)
            .with_property("Dis_avg", 1.0)],
    );
    catalog.add_table_file("rc_8", dir.path().join("rating_curve_8.csv"));
    let step = SetupLakes::default().with_min_area(0.0).with_rating_curves(["rc_8"]);
    let err = model.run(&step, &catalog).unwrap_err();
    assert!(matches!(err, MhError::FileNotFound { .. }));
}
