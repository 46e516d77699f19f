use std::{env, fs};

use cohort_config::loader::load_config;
use cohort_config::{DateShiftIncrement, ExecutionStrategy};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("cohort.toml");

    let toml_content = r#"
[compiler]
alias = "_T"
app_db = "CohortDB"
field_person_id = "person_id"

[cohort]
strategy = "sequential"
max_parallelism = 2

[deidentification.cohort]
enabled = true
threshold = 20
shift = 5

[deidentification.patient]
enabled = true
pepper = "6f1c3c4e-54a2-4d1b-9b1e-7a4a1a0f2b11"

[deidentification.patient.date_shifting]
increment = "DAY"
lower_bound = -30
upper_bound = 30

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(Some(&path)).expect("should parse config");
    assert_eq!(cfg.compiler.alias, "_T");
    assert_eq!(cfg.compiler.field_encounter_id, "encounterId");
    assert_eq!(cfg.cohort.strategy, ExecutionStrategy::Sequential);
    assert_eq!(cfg.cohort.max_parallelism, 2);
    assert_eq!(cfg.deidentification.cohort.threshold, 20);
    assert!(cfg.deidentification.patient.pepper.is_some());
    assert_eq!(
        cfg.deidentification.patient.date_shifting.increment,
        DateShiftIncrement::Day
    );

    // 2) Env override should win over file
    unsafe {
        env::set_var("COHORT__COHORT__MAX_PARALLELISM", "9");
    }
    let cfg_env = load_config(Some(&path)).expect("should parse config with env overrides");
    assert_eq!(cfg_env.cohort.max_parallelism, 9);
    unsafe {
        env::remove_var("COHORT__COHORT__MAX_PARALLELISM");
    }

    // 3) Enabled patient de-identification without a pepper should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[deidentification.patient]
enabled = true
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(Some(&invalid_path)).expect_err("expected validation error");
    assert!(err.to_string().contains("requires deidentification.patient.pepper"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(Some(&path)).expect("defaults should validate");
    assert_eq!(cfg.cohort.strategy, ExecutionStrategy::Parallel);
    assert_eq!(cfg.deidentification.cohort.threshold, 10);
}
