use std::sync::Arc;
use ticketflow_core::config::{load_config, DEFAULT_CONFIG_FILE};
use ticketflow_core::providers::{InMemoryScenarios, QueryExecutor, QueryRequest, ScenarioExecutor, ScenarioSource};

#[tokio::test]
async fn test_config_points_at_scenario_fixture() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("fixtures"))?;
    std::fs::write(
        dir.path().join("fixtures/scenarios.json"),
        r#"{"scenarios": [{"ticket_id": "HELIX-7", "queries": [[{"sales": 10}, {"sales": 20}]]}]}"#,
    )?;
    let cfg_path = dir.path().join(DEFAULT_CONFIG_FILE);
    std::fs::write(
        &cfg_path,
        "version: 1\nsettings:\n  auto_fix: true\nscenarios: fixtures/scenarios.json\n",
    )?;

    let cfg = load_config(&cfg_path, true)?;
    assert!(cfg.settings.auto_fix);
    let path = cfg.scenarios.clone().expect("scenarios path");
    let source = InMemoryScenarios::from_path(&path)?;
    assert_eq!(source.ticket_ids(), vec!["HELIX-7".to_string()]);

    let exec = ScenarioExecutor::new(Arc::new(source));
    let rows = exec
        .execute(&QueryRequest {
            ticket_id: "HELIX-7",
            query_index: 1,
            sql: "SELECT sales FROM orders;",
        })
        .await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}
