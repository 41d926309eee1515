//! End-to-end tests for the segment pipelines
//!
//! Datasets are synthesized as CSV text with a seeded RNG, loaded and
//! normalized the way the binary does it, then run through both pipelines.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use propensity_trainer::{
    load_normalized, run_segmentation, AppConfig, Column, FeatureNormalizer, PipelineError,
    ReportPolicy, SchemaConfig, SegmentPipeline, SegmentationSpec, SkipReason, Table,
    TrainingConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const HEADER: &str = "user_ID,sku_ID,request_time,channel,city_level,purchase,hour,weekday,\
activate_date,deactivate_date,first_order_month,attribute1,attribute2,gender,age";

/// Rows for one channel value; `positive_rate` of `None` makes every label 0
fn push_rows(
    csv: &mut String,
    rng: &mut StdRng,
    channel: &str,
    n: usize,
    positive_rate: Option<f64>,
) {
    for i in 0..n {
        let gender = if rng.gen_bool(0.5) { "F" } else { "M" };
        let attribute1: u32 = rng.gen_range(1..5);
        let city_level: u32 = rng.gen_range(1..4);
        let label = match positive_rate {
            Some(rate) => {
                let mut p = rate + 0.1 * f64::from(attribute1);
                if gender == "F" {
                    p += 0.4;
                }
                u8::from(rng.gen_bool(p.min(0.95)))
            }
            None => 0,
        };
        writeln!(
            csv,
            "u{channel}{i},s{i},2018-03-{day:02} 10:00:00,{channel},{city_level},{label},{hour},{weekday},\
2017-{month:02}-01,2018-12-31,2018-{month:02},{attribute1},{attribute2},{gender},{age}",
            day = rng.gen_range(1..29),
            hour = rng.gen_range(0..24),
            weekday = rng.gen_range(0..7),
            month = rng.gen_range(1..13),
            attribute2 = rng.gen_range(0..100),
            age = rng.gen_range(18..70),
        )
        .unwrap();
    }
}

fn write_csv(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn test_config(results_dir: &Path) -> AppConfig {
    AppConfig {
        results_dir: results_dir.to_path_buf(),
        training: TrainingConfig {
            n_estimators: 30,
            learning_rate: 0.1,
            min_data_in_leaf: 10,
            ..TrainingConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Scenario A data: channel A has 500 mixed rows, channel B 10 negative rows
fn scenario_a_csv() -> String {
    let mut rng = StdRng::seed_from_u64(7);
    let mut csv = format!("{HEADER}\n");
    push_rows(&mut csv, &mut rng, "A", 500, Some(0.05));
    push_rows(&mut csv, &mut rng, "B", 10, None);
    csv
}

#[test]
fn test_single_class_segment_is_skipped() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_csv(dir.path(), "data.csv", &scenario_a_csv());
    let config = test_config(&dir.path().join("results"));

    let table = load_normalized(&input, &config.schema)?;
    let report = run_segmentation(&table, SegmentationSpec::channel(), &config)?;

    assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["A"]);
    assert!(report.is_skipped("B"));
    assert_eq!(
        report.skipped[0].reason,
        SkipReason::SingleClass { classes: 1 }
    );

    let a = report.results.get("A").unwrap();
    assert!((0.0..=1.0).contains(&a.auc));
    assert!(a.auc > 0.6, "gender signal should be learned, auc {}", a.auc);
    assert_eq!(a.test_rows, 100);
    assert!(a.top_features.len() <= 10);
    for pair in a.top_features.windows(2) {
        assert!(pair[0].importance >= pair[1].importance);
    }

    let leaked = ["user_ID", "purchase", "channel", "hour", "weekday", "request_time"];
    assert!(report.features.iter().all(|f| !leaked.contains(&f.as_str())));
    assert!(report.features.contains(&"city_level".to_string()));

    let results_dir = dir.path().join("results");
    assert!(results_dir.join("channel_A_top_features.png").exists());
    assert!(!results_dir.join("channel_B_top_features.png").exists());
    assert!(results_dir.join("channel_results.json").exists());
    Ok(())
}

#[test]
fn test_unparsable_date_becomes_sentinel() -> Result<()> {
    let csv = "user_ID,channel,purchase,activate_date\n\
               u1,A,1,2018-01-15\n\
               u2,A,0,not-a-date\n\
               u3,B,1,2017-11-30\n";
    let table = FeatureNormalizer::new(SchemaConfig::default()).normalize(Table::from_reader(csv.as_bytes())?);

    assert!(!table.contains("activate_date"));
    assert_eq!(
        table.column("activate_date_year"),
        Some(&Column::Integer(vec![2018, -1, 2017]))
    );
    assert_eq!(
        table.column("activate_date_month"),
        Some(&Column::Integer(vec![1, -1, 11]))
    );
    Ok(())
}

#[test]
fn test_exactly_ten_features_all_ranked() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut csv = String::from("user_ID,channel,purchase");
    for f in 0..10 {
        write!(csv, ",f{f}")?;
    }
    csv.push('\n');
    for i in 0..300 {
        let label = u8::from(rng.gen_bool(0.4));
        write!(csv, "u{i},A,{label}")?;
        for _ in 0..10 {
            write!(csv, ",{}", rng.gen_range(0..50) + 20 * label as i32)?;
        }
        csv.push('\n');
    }

    let table = FeatureNormalizer::default().normalize(Table::from_reader(csv.as_bytes())?);
    let training = TrainingConfig {
        n_estimators: 20,
        min_data_in_leaf: 10,
        ..TrainingConfig::default()
    };
    let report = SegmentPipeline::new(SegmentationSpec::channel(), "purchase", &training).run(&table)?;

    let a = report.results.get("A").unwrap();
    assert_eq!(report.features.len(), 10);
    assert_eq!(a.top_features.len(), 10);
    let mut names: Vec<&str> = a.top_features.iter().map(|f| f.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, (0..10).map(|f| format!("f{f}")).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_missing_segmentation_column_aborts() -> Result<()> {
    let dir = TempDir::new()?;
    let results_dir = dir.path().join("results");
    let config = test_config(&results_dir);

    let csv = "user_ID,purchase,attribute1\nu1,1,3\nu2,0,4\n";
    let table = FeatureNormalizer::default().normalize(Table::from_reader(csv.as_bytes())?);

    let err = run_segmentation(&table, SegmentationSpec::channel(), &config).unwrap_err();
    assert!(matches!(&err, PipelineError::MissingColumn { column } if column == "channel"));
    assert!(err.to_string().contains("channel"));
    assert!(!results_dir.exists());

    let csv = "user_ID,channel,purchase\nu1,,1\nu2,,0\n";
    let table = FeatureNormalizer::default().normalize(Table::from_reader(csv.as_bytes())?);
    let err = run_segmentation(&table, SegmentationSpec::channel(), &config).unwrap_err();
    assert!(matches!(err, PipelineError::EmptySegmentationColumn { .. }));
    assert!(!results_dir.exists());
    Ok(())
}

#[test]
fn test_channel_and_region_pipelines_are_symmetric() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(5);
    let mut csv = format!("{HEADER}\n");
    for channel in ["C", "A", "B"] {
        push_rows(&mut csv, &mut rng, channel, 150, Some(0.05));
    }
    let table = FeatureNormalizer::default().normalize(Table::from_reader(csv.as_bytes())?);
    let training = TrainingConfig {
        n_estimators: 10,
        min_data_in_leaf: 10,
        ..TrainingConfig::default()
    };

    let channel = SegmentPipeline::new(SegmentationSpec::channel(), "purchase", &training).run(&table)?;
    let region = SegmentPipeline::new(SegmentationSpec::region(), "purchase", &training).run(&table)?;

    assert_eq!(channel.results.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    assert_eq!(region.results.keys().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    assert!(!region.features.contains(&"city_level".to_string()));
    assert!(!region.features.contains(&"channel".to_string()));

    // both refuse to run without their key
    let stripped = Table::from_columns(
        table
            .clone()
            .into_columns()
            .into_iter()
            .filter(|(name, _)| name != "channel" && name != "city_level")
            .collect(),
    )?;
    for spec in [SegmentationSpec::channel(), SegmentationSpec::region()] {
        let key = spec.key.clone();
        let err = SegmentPipeline::new(spec, "purchase", &training)
            .run(&stripped)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { column } if column == key));
    }
    Ok(())
}

#[test]
fn test_runs_are_deterministic() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_csv(dir.path(), "data.csv", &scenario_a_csv());
    let mut config = test_config(&dir.path().join("results"));
    config.report.policy = ReportPolicy::None;
    config.training.threads = 2;

    let first = run_segmentation(
        &load_normalized(&input, &config.schema)?,
        SegmentationSpec::region(),
        &config,
    )?;
    let second = run_segmentation(
        &load_normalized(&input, &config.schema)?,
        SegmentationSpec::region(),
        &config,
    )?;

    assert_eq!(first, second);
    assert!(!first.results.is_empty());
    Ok(())
}

#[test]
fn test_non_binary_label_aborts() -> Result<()> {
    let csv = "user_ID,channel,purchase\nu1,A,1\nu2,A,3\n";
    let table = FeatureNormalizer::default().normalize(Table::from_reader(csv.as_bytes())?);
    let err = SegmentPipeline::new(SegmentationSpec::channel(), "purchase", &TrainingConfig::default())
        .run(&table)
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidLabel { row: 1, .. }));
    Ok(())
}
