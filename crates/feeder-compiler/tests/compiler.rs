//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "tests"
//! feeder_type: "test"
//! feeder_scope: "code"
//! feeder_description: "End-to-end compiles over small synthetic feeders."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::fs;

use feeder_common::CompileConfig;
use feeder_compiler::{
    compile_to_script,
    compiler::CompileWarning,
    engine::{CommandScript, ElementClass},
    geo::GeoLayerKind,
    io::{load_feeder, load_profile_pools},
    model::{
        CapacitorRecord, LineCodeRecord, LineRecord, LoadRecord, LoadStatus, LvLineRecord,
        TransformerRecord, WindingConnection,
    },
    profiles::{ProfilePool, ProfilePools, POINTS_PER_DAY},
    reports::{read_geo_layer, GEO_FILE, SUMMARY_FILE},
    source::TableName,
    stages::Stage,
    CompilerError, FeederCompiler, FeederRecords,
};
use tempfile::tempdir;

fn transformer(id: &str, bus1: &str, bus2: &str, conn: Option<&str>, kvs: (f64, f64)) -> TransformerRecord {
    TransformerRecord {
        substation_id: id.into(),
        bus1: bus1.into(),
        bus2: bus2.into(),
        connection_primary: Some(WindingConnection::Delta),
        connection_secondary: Some(WindingConnection::Wye),
        conn_type: conn.map(str::to_owned),
        kvs_primary: kvs.0,
        kvs_secondary: kvs.1,
        kvas_primary: 200.0,
        kvas_secondary: 200.0,
        loadloss: 1.1,
        noloadloss: 0.15,
        xhl: 4.5,
        wdg1_tap: Some(1.05),
        wdg1_numtaps: Some(33),
        kind: Some("RES".into()),
    }
}

fn line_code(id: &str, phases: u8, amps: (f64, f64)) -> LineCodeRecord {
    LineCodeRecord {
        linecode_id: id.into(),
        phases,
        r1: 0.4,
        x1: 0.38,
        b1: 0.0,
        r0: 0.7,
        x0: 1.2,
        b0: 0.0,
        units: "km".into(),
        ampacity1: amps.0,
        ampacity2: amps.1,
    }
}

fn mv_line(number: &str, name: &str, from: &str, to: &str, phases: u8) -> LineRecord {
    let suffix = if phases == 3 { "1.2.3" } else { "1" };
    LineRecord {
        line_number: number.into(),
        element_name: name.into(),
        start_node: from.into(),
        start_node_phase: suffix.into(),
        end_node: to.into(),
        end_node_phase: suffix.into(),
        phases,
        length: 1.25,
        units: "km".into(),
        linecode: "Mink".into(),
    }
}

fn load(name: &str, phases: u8, tx_cap: Option<f64>) -> LoadRecord {
    LoadRecord {
        load_name: name.into(),
        bus1: format!("lv0_{}.1", name),
        phases,
        kv: if phases == 1 { 0.23 } else { 0.4 },
        pf: 0.95,
        status: LoadStatus::Variable,
        enabled: None,
        tx_cap,
    }
}

fn feeder() -> FeederRecords {
    FeederRecords {
        name: Some("rural-7".into()),
        mv_net_txs: Some(vec![transformer("ZS1", "sourcebus", "1", Some("RWB"), (66.0, 22.0))]),
        linecodes: Some(vec![
            line_code("Mink-3ph", 3, (310.0, 280.0)),
            line_code("Mink-1ph", 1, (150.0, 160.0)),
            line_code("LV95", 3, (230.0, 215.0)),
        ]),
        lines: Some(vec![
            mv_line("1", "trunk", "1", "2", 3),
            mv_line("2", "DELETE", "2", "3", 3),
            mv_line("3", "spur", "2", "4", 1),
        ]),
        mvcaps: Some(vec![CapacitorRecord {
            element_id: "9".into(),
            bus1: "2".into(),
            phases: 3,
            kvar: 300.0,
            kvs: 22.0,
        }]),
        mvtx: Some(vec![transformer("R1_REG", "2", "5", Some("RWB"), (12.7, 12.7))]),
        lvtx: Some(vec![
            transformer("S1", "5", "", Some("RWB"), (22.0, 0.433)),
            transformer("S2", "4", "", Some("RB"), (22.0, 0.25)),
        ]),
        lv_lines: Some(vec![LvLineRecord {
            line_name: "lv0_l1".into(),
            bus1: "mv_f0_lv0_busbar".into(),
            bus2: "lv0_b1".into(),
            phases: 3,
            length: 120.0,
            units: "m".into(),
            linecode: "lc_LV95".into(),
        }]),
        lv_loads: Some(vec![
            load("house1", 1, None),
            load("shop1", 3, Some(10.0)),
            load("house2", 1, None),
        ]),
    }
}

fn pools() -> ProfilePools {
    let days = 365;
    let curves = |peaks: &[f64]| -> Vec<Vec<Vec<f64>>> {
        peaks
            .iter()
            .map(|peak| {
                (0..days)
                    .map(|_| {
                        let mut curve = vec![peak / 2.0; POINTS_PER_DAY];
                        curve[36] = *peak;
                        curve
                    })
                    .collect()
            })
            .collect()
    };
    ProfilePools::new(
        ProfilePool::from_nested("residential", curves(&[1.2, 2.5, 0.8, 3.1])).unwrap(),
        ProfilePool::from_nested("commercial", curves(&[12.0, 4.0, 7.5, 5.0, 4.99, 30.0])).unwrap(),
    )
}

fn compile(records: &FeederRecords, config: CompileConfig) -> feeder_compiler::Result<(CommandScript, feeder_compiler::CompileReport)> {
    let compiler = FeederCompiler::new(config)?;
    let mut script = CommandScript::new();
    let report = compiler.compile(records, &pools(), &mut script)?;
    Ok((script, report))
}

#[test]
fn emits_stages_in_fixed_order() {
    let (script, report) = compile(&feeder(), CompileConfig::default()).unwrap();
    let lines = script.lines();
    assert_eq!(lines[0], "clear");
    assert_eq!(lines[1], "set DefaultBaseFrequency=50");
    assert!(lines[2].starts_with("new circuit.rural-7 basekv=66"));
    assert!(lines[3].starts_with("edit vsource.source bus1=sourcebus"));
    assert!(lines[4].starts_with("new transformer.ZS1 phases=3 windings=2 buses=[sourcebus, mv_f0_n1]"));
    assert_eq!(
        lines[lines.len() - 2],
        "set VoltageBases=[66, 22, 12.7, 0.4, 0.2309]"
    );
    assert_eq!(lines[lines.len() - 1], "calcv");

    let order: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(order, Stage::ORDER.to_vec());
    assert_eq!(report.command_count, script.len());
    assert!(report.warnings.is_empty());

    let first = |class: ElementClass| {
        script
            .commands()
            .iter()
            .position(|c| c.creates(class))
            .unwrap()
    };
    assert!(first(ElementClass::Linecode) < first(ElementClass::Line));
    assert!(first(ElementClass::Line) < first(ElementClass::Capacitor));
    assert!(first(ElementClass::Capacitor) < first(ElementClass::Reactor));
    assert!(first(ElementClass::Reactor) < first(ElementClass::Load));
}

#[test]
fn equal_voltage_mv_transformer_becomes_regulator_assembly() {
    let (script, report) = compile(&feeder(), CompileConfig::default()).unwrap();
    let regulator = report
        .stages
        .iter()
        .find(|s| s.stage == Stage::Regulators)
        .unwrap();
    // one control-iteration directive plus twelve components
    assert_eq!(regulator.commands, 13);

    let components: Vec<_> = script
        .commands()
        .iter()
        .filter_map(|c| c.element())
        .filter(|e| e.name().contains("R1_REG"))
        .collect();
    assert_eq!(components.len(), 12);
    let lines = script.lines();
    let directive = lines
        .iter()
        .filter(|l| l.as_str() == "set maxcontroliter=100")
        .count();
    assert_eq!(directive, 1);
    assert!(lines.iter().any(|l| l.starts_with(
        "new reactor.Jumper_R1_REG_A_E phases=1 bus1=mv_f0_n2.1 bus2=Jumper_R1_REG_A.2"
    )));
    assert!(lines
        .iter()
        .any(|l| l.starts_with("new regcontrol.Reg_R1_REG_C transformer=R1_REG_C winding=2")));
    let geo = report.geo.get(GeoLayerKind::MvMvTxs, 0).unwrap();
    assert_eq!(geo.capacity_kva, Some(18.18));
}

#[test]
fn deleted_lines_leave_no_command_or_annotation() {
    let (script, report) = compile(&feeder(), CompileConfig::default()).unwrap();
    assert!(!script.lines().iter().any(|l| l.contains("line.mv_f0_l2 ")));
    assert!(report.geo.get(GeoLayerKind::MvLines, 1).is_none());
    assert_eq!(report.geo.layer(GeoLayerKind::MvLines).unwrap().len(), 2);
}

#[test]
fn line_annotations_carry_minimum_ampacity() {
    let (_, report) = compile(&feeder(), CompileConfig::default()).unwrap();
    assert_eq!(report.geo.get(GeoLayerKind::MvLines, 0).unwrap().ampacity, Some(280.0));
    assert_eq!(report.geo.get(GeoLayerKind::MvLines, 2).unwrap().ampacity, Some(150.0));
    assert_eq!(report.geo.get(GeoLayerKind::LvLines, 0).unwrap().ampacity, Some(215.0));
    let substation = report.geo.get(GeoLayerKind::MvlvTxs, 1).unwrap();
    assert_eq!(substation.dss_name, "mv_f0_lv_S2");
}

#[test]
fn commercial_loads_stay_under_half_transformer_capacity() {
    for seed in 0..25 {
        let config = CompileConfig {
            seed,
            ..CompileConfig::default()
        };
        let (script, _) = compile(&feeder(), config).unwrap();
        let shape = script
            .commands()
            .iter()
            .filter_map(|c| c.element())
            .find(|e| e.name() == "Load_shape_com_1")
            .unwrap();
        let text = shape.get("Pmult").unwrap().to_string();
        let peak = text
            .trim_matches(|c| c == '[' || c == ']')
            .split(", ")
            .map(|v| v.parse::<f64>().unwrap())
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(peak < 5.0, "seed {seed} bound peak {peak}");
    }
}

#[test]
fn same_seed_and_day_reproduce_the_stream() {
    let config = CompileConfig {
        seed: 42,
        day: Some(200),
        ..CompileConfig::default()
    };
    let (first, report) = compile(&feeder(), config.clone()).unwrap();
    let (second, _) = compile(&feeder(), config).unwrap();
    assert_eq!(first.render(), second.render());
    assert_eq!(report.date, "19 July");
    assert_eq!(report.season.to_string(), "Winter");

    let (drawn_a, report_a) = compile(&feeder(), CompileConfig::default()).unwrap();
    let (drawn_b, report_b) = compile(&feeder(), CompileConfig::default()).unwrap();
    assert_eq!(report_a.day, report_b.day);
    assert_eq!(drawn_a.render(), drawn_b.render());
}

#[test]
fn missing_required_table_aborts() {
    let records = FeederRecords {
        lvtx: None,
        ..feeder()
    };
    let err = compile(&records, CompileConfig::default()).unwrap_err();
    assert!(matches!(err, CompilerError::MissingTable("lvtx")));
}

#[test]
fn absent_optional_tables_are_reported_not_fatal() {
    let records = FeederRecords {
        mvcaps: None,
        mvtx: None,
        ..feeder()
    };
    let (script, report) = compile(&records, CompileConfig::default()).unwrap();
    assert!(report.warnings.contains(&CompileWarning::OptionalTableAbsent {
        table: TableName::Mvcaps
    }));
    assert!(report.warnings.contains(&CompileWarning::OptionalTableAbsent {
        table: TableName::Mvtx
    }));
    assert!(!script.commands().iter().any(|c| c.creates(ElementClass::Reactor)));
}

#[test]
fn bad_optional_record_is_skipped_whole() {
    let mut records = feeder();
    records.mvtx = Some(vec![
        transformer("M9", "2", "6", Some("RWBR"), (22.0, 11.0)),
        transformer("R1_REG", "2", "5", Some("RWB"), (12.7, 12.7)),
    ]);
    let (script, report) = compile(&records, CompileConfig::default()).unwrap();
    assert!(!script.lines().iter().any(|l| l.contains("transformer.M9 ")));
    match &report.warnings[..] {
        [CompileWarning::RecordSkipped { stage, record, id, .. }] => {
            assert_eq!(*stage, Stage::Regulators);
            assert_eq!(*record, 0);
            assert_eq!(id, "M9");
        }
        other => panic!("unexpected warnings {other:?}"),
    }
}

#[test]
fn required_stage_error_propagates() {
    let mut records = feeder();
    if let Some(lvtx) = records.lvtx.as_mut() {
        lvtx[0].conn_type = Some("RRW".into());
    }
    let err = compile(&records, CompileConfig::default()).unwrap_err();
    assert!(matches!(err, CompilerError::InvalidPhaseCode { .. }));
}

#[test]
fn exports_reports_and_reads_geo_back() {
    let dir = tempdir().unwrap();
    let (_, report) = compile_to_script(
        &feeder(),
        &pools(),
        &CompileConfig::default(),
        Some(dir.path()),
    )
    .unwrap();
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["feeder"], "rural-7");
    assert_eq!(summary["data"]["command_count"], report.command_count);
    assert_eq!(summary["data"]["statistics"]["regulators"], 1);
    let geo = read_geo_layer(dir.path().join(GEO_FILE)).unwrap();
    assert_eq!(geo, report.geo);
}

#[test]
fn compiles_from_csv_directory_and_json_pools() {
    let dir = tempdir().unwrap();
    let feeder_dir = dir.path().join("urban-3");
    fs::create_dir(&feeder_dir).unwrap();
    let write = |name: &str, text: &str| fs::write(feeder_dir.join(name), text).unwrap();
    write(
        "mv_net_txs.csv",
        "Substation_ID,Bus1,Bus2,Connection_Primary,Connection_Secondary,Conn_Type,kvs_primary,kvs_secondary,kvas_primary,kvas_secondary,loadloss,noloadloss,xhl\n\
         ZS1,sourcebus,1,Delta,Wye,RWB,66,22,20000,20000,0.5,0.05,8\n",
    );
    write(
        "linecodes.csv",
        "Linecode_ID,Phases,r1,x1,b1,r0,x0,b0,Units,Ampacity1,Ampacity2\nMink-3ph,3,0.4,0.38,0,0.7,1.2,0,km,310,280\n",
    );
    write(
        "lines.csv",
        "Line_Number,Element_Name,Start_Node,Start_Node_Phase,End_Node,End_Node_Phase,Phases,Length,Units,Linecode\n\
         1,trunk,1,1.2.3,2,1.2.3,3,2.5,km,Mink\n",
    );
    write(
        "lvtx.csv",
        "Substation_ID,Bus1,Bus2,Conn_Type,kvs_primary,kvs_secondary,kvas_primary,kvas_secondary,loadloss,noloadloss,xhl,wdg1_tap,Type\n\
         S1,2,,W,12.7,0.25,25,25,1.2,0.2,3.5,,RES\n",
    );
    write(
        "lv_lines.csv",
        "line_name,bus1,bus2,phases,length,units,linecode\nlv0_l1,mv_f0_lv0_busbar,lv0_b1,1,80,m,lc_Mink-3ph\n",
    );
    write(
        "lv_loads.csv",
        "load_name,bus1,phases,kv,pf,model,enabled,tx_cap\nhouse1,lv0_b1.1,1,0.23,0.95,variable,True,\n",
    );

    let nested = vec![vec![vec![0.5; POINTS_PER_DAY]; 365]; 2];
    let res = dir.path().join("res.json");
    let com = dir.path().join("com.json");
    fs::write(&res, serde_json::to_string(&nested).unwrap()).unwrap();
    fs::write(&com, serde_json::to_string(&nested).unwrap()).unwrap();

    let records = load_feeder(&feeder_dir).unwrap();
    let pools = load_profile_pools(&res, &com).unwrap();
    let compiler = FeederCompiler::new(CompileConfig::default()).unwrap();
    let mut script = CommandScript::new();
    let report = compiler.compile(&records, &pools, &mut script).unwrap();

    assert_eq!(report.feeder, "urban-3");
    assert_eq!(report.warnings.len(), 2);
    let text = script.render();
    assert!(text.contains(
        "new transformer.mv_f0_lv_S1 phases=1 windings=2 buses=[mv_f0_n2.2, mv_f0_lv0_busbar.1]"
    ));
    assert!(text.contains("tap=1 maxtap=1.137 mintap=1.028"));
    assert!(text.contains("new load.house1 phases=1 bus1=lv0_b1.1 kw=1"));
    assert!(text.contains("edit load.house1 daily=Load_shape_res_0"));
    assert_eq!(report.statistics.swer_lv_transformers, 1);
    assert_eq!(report.statistics.mv_line_km, 2.5);
}
