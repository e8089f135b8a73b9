//! Fail-fast behavior: invalid configuration and malformed input stop the
//! pipeline with a typed error instead of producing partial output.

use std::path::PathBuf;

use regimelab_runner::{
    parse_csv, run_pipeline, ConfigError, LoadError, PipelineConfig, RunError,
};

#[test]
fn missing_csv_is_a_data_error() {
    let mut config = PipelineConfig::default();
    config.data.csv_path = PathBuf::from("/nonexistent/regimelab/SPY.csv");
    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, RunError::Data(LoadError::Open { .. })));
}

#[test]
fn unsupported_state_count_fails_before_loading() {
    let mut config = PipelineConfig::default();
    config.model.n_states = 5;
    config.data.csv_path = PathBuf::from("/nonexistent/never/read.csv");
    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::Invalid(_))));
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let err = PipelineConfig::from_toml("[model\nn_states = 2").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    let err = PipelineConfig::from_toml("[model]\nn_states = \"two\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn non_positive_price_rejected() {
    let err = parse_csv("Date,Close\n2008-01-02,100\n2008-01-03,0\n".as_bytes()).unwrap_err();
    assert!(matches!(err, LoadError::Series(_)));
}

#[test]
fn test_period_without_data_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.csv");
    let mut csv = String::from("Date,Close\n");
    let mut price = 100.0;
    for day in 1..=28 {
        price *= if day % 3 == 0 { 0.99 } else { 1.012 };
        csv.push_str(&format!("2007-02-{day:02},{price:.4}\n"));
    }
    std::fs::write(&path, csv).unwrap();

    let mut config = PipelineConfig::default();
    config.data.csv_path = path;
    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, RunError::EmptyTestPeriod(_)));
}
