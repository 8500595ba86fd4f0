use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeZone;
use rusqlite::Connection;
use tempfile::TempDir;

use super::*;
use crate::config::DatabaseConfig;
use crate::harness::{SqliteEngine, table_artifact_path};
use crate::semantic::{EmbeddingBatch, LocalHashEmbedder};

const REFERENCE_QUERY: &str = "SELECT stay_id, activity, timestamp FROM mimicel ORDER BY rowid";

struct Fixture {
    dir: TempDir,
    db_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("benchmark.sqlite");
        let connection = Connection::open(&db_path).expect("open seed db");
        connection
            .execute_batch(
                "
                CREATE TABLE mimicel(stay_id INTEGER, activity TEXT, timestamp TEXT);
                INSERT INTO mimicel VALUES (1, 'Enter the ED', '2180-07-23 05:54:00');
                INSERT INTO mimicel VALUES (1, 'Triage in the ED', '2180-07-23 06:00:00');
                INSERT INTO mimicel VALUES (1, 'Discharge from the ED', '2180-07-23 10:12:00');
                INSERT INTO mimicel VALUES (2, 'Enter the ED', '2180-08-01 11:02:00');
                ",
            )
            .expect("seed mimicel");
        Self { dir, db_path }
    }

    fn config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            results_dir: self.dir.path().join("results"),
            artifacts_dir: self.dir.path().join("tables"),
            ..EvaluatorConfig::default()
        }
    }

    fn engine(&self) -> Box<dyn QueryEngine> {
        Box::new(
            SqliteEngine::new(&DatabaseConfig {
                path: Some(self.db_path.clone()),
                ..DatabaseConfig::default()
            })
            .expect("engine should build"),
        )
    }

    fn evaluator(&self) -> Evaluator {
        self.evaluator_with(Box::new(LocalHashEmbedder::default()), REFERENCE_QUERY)
    }

    fn evaluator_with(&self, provider: Box<dyn EmbeddingProvider>, reference_query: &str) -> Evaluator {
        Evaluator::with_reference_query(self.config(), provider, self.engine(), reference_query)
            .expect("evaluator should build")
    }

    fn results_dir(&self) -> PathBuf {
        self.dir.path().join("results")
    }
}

fn record(id: &str, sql: &str) -> RunRecord {
    let mut telemetry = serde_json::Map::new();
    telemetry.insert("id".to_string(), serde_json::json!(id));
    telemetry.insert("time_in_seconds_total".to_string(), serde_json::json!(14.2));
    telemetry.insert("tokens_total_sql_generation".to_string(), serde_json::json!(1834));
    RunRecord {
        id: id.to_string(),
        query_text: sql.to_string(),
        telemetry,
    }
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 14, 9, 30, 5).unwrap()
}

fn read_result(dir: &Path, run_id: &str) -> serde_json::Value {
    let raw = fs::read_to_string(result_path(dir, run_id)).expect("result file written");
    serde_json::from_str(&raw).expect("result is json")
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn embed(&self, _labels: &[String]) -> Result<EmbeddingBatch, EvalError> {
        Err(EvalError::provider("embedding quota or rate limit exceeded (HTTP 429)"))
    }
}

#[test]
fn coverage_ratio_handles_empty_reference() {
    assert_eq!(coverage_ratio(0, 0), 0.0);
    assert_eq!(coverage_ratio(0, 25), 0.0);
    assert_eq!(coverage_ratio(1000, 1000), 1.0);
    assert_eq!(coverage_ratio(4, 2), 0.5);
    assert_eq!(coverage_ratio(4, 6), 1.5);
}

#[test]
fn matching_query_scores_perfectly_and_persists_result() {
    let fixture = Fixture::new();
    let evaluator = fixture.evaluator();

    let result = evaluator
        .evaluate_at(&record("TestToolAgent_ok", &format!("```sql\n{REFERENCE_QUERY}\n```")), fixed_time())
        .expect("evaluation should succeed");

    assert!(result.execution_ok);
    assert_eq!(result.evaluated_at, "2025-05-14T09:30:05Z");
    assert_eq!(result.coverage, 1.0);
    assert_eq!(result.reference_rows, 4);
    assert_eq!(result.candidate_rows, 4);
    assert_eq!(result.columns.f1, 1.0);
    assert_eq!(result.columns.true_positives, 3);
    assert_eq!(result.events.f1, 1.0);
    assert_eq!(
        result.events.benchmark_labels,
        vec!["Enter the ED", "Triage in the ED", "Discharge from the ED"]
    );
    assert_eq!(result.embedding_model, "label-hash-local-v1");
    assert!(result.embedding_tokens > 0);

    let persisted = read_result(&fixture.results_dir(), "TestToolAgent_ok");
    assert_eq!(persisted["run_id"], "TestToolAgent_ok");
    assert_eq!(persisted["execution_ok"], true);
    assert_eq!(persisted["columns"]["matches"].as_array().map(Vec::len), Some(3));
    assert_eq!(persisted["run_telemetry"]["tokens_total_sql_generation"], 1834);
    assert!(table_artifact_path(&evaluator.config().artifacts_dir, "TestToolAgent_ok").exists());
}

#[test]
fn invalid_sql_produces_zeroed_record() {
    let fixture = Fixture::new();
    let evaluator = fixture.evaluator();

    let result = evaluator
        .evaluate_at(&record("TestToolAgent_bad", "SELEC * FRM mimicel"), fixed_time())
        .expect("failed execution is not an error");

    assert!(!result.execution_ok);
    assert!(result.execution_error.is_some());
    assert_eq!(result.coverage, 0.0);
    assert_eq!(result.embedding_tokens, 0);
    assert_eq!(result.reference_rows, 0);
    assert_eq!(result.candidate_rows, 0);
    for evaluation in [&result.columns, &result.events] {
        assert_eq!(evaluation, &LabelEvaluation::default());
        assert_eq!(evaluation.f1, 0.0);
        assert_eq!(evaluation.true_positives, 0);
        assert!(evaluation.benchmark_labels.is_empty());
        assert!(evaluation.candidate_labels.is_empty());
        assert!(evaluation.matches.is_empty());
    }

    let persisted = read_result(&fixture.results_dir(), "TestToolAgent_bad");
    assert_eq!(persisted["execution_ok"], false);
    assert_eq!(persisted["events"]["false_negatives"], 0);
    assert!(!table_artifact_path(&evaluator.config().artifacts_dir, "TestToolAgent_bad").exists());
}

#[test]
fn missing_query_text_is_a_failed_execution() {
    let fixture = Fixture::new();
    let result = fixture
        .evaluator()
        .evaluate_at(&record("TestToolAgent_empty", ""), fixed_time())
        .expect("empty query is a modeled failure");
    assert!(!result.execution_ok);
    assert_eq!(result.execution_error.as_deref(), Some("query text is empty"));
}

#[test]
fn coverage_is_independent_of_label_metrics() {
    let fixture = Fixture::new();
    let reference_query = "
        WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 1000)
        SELECT x AS stay_id, 'Enter the ED' AS activity FROM n";
    let candidate_query = "
        WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 1000)
        SELECT 'flag' AS extra_flag, 'Medicine reconciliation' AS activity FROM n";
    let evaluator = fixture.evaluator_with(Box::new(LocalHashEmbedder::default()), reference_query);

    let result = evaluator
        .assess(&record("TestToolAgent_rows", candidate_query), fixed_time())
        .expect("evaluation should succeed");
    assert_eq!(result.reference_rows, 1000);
    assert_eq!(result.candidate_rows, 1000);
    assert_eq!(result.coverage, 1.0);
    assert!(result.execution_ok);
    assert_eq!(result.events.benchmark_labels, vec!["Enter the ED"]);
    assert_eq!(result.events.candidate_labels, vec!["Medicine reconciliation"]);
}

#[test]
fn repeated_evaluation_is_byte_identical() {
    let fixture = Fixture::new();
    let evaluator = fixture.evaluator();
    let run = record(
        "TestToolAgent_repeat",
        "SELECT stay_id AS patient_id, activity, timestamp AS event_time FROM mimicel WHERE stay_id = 1",
    );
    let path = result_path(&fixture.results_dir(), "TestToolAgent_repeat");

    evaluator.evaluate_at(&run, fixed_time()).expect("first run");
    let first = fs::read(&path).expect("first result");
    evaluator.evaluate_at(&run, fixed_time()).expect("second run");
    let second = fs::read(&path).expect("second result");

    assert_eq!(first, second);
}

#[test]
fn candidate_without_event_column_keeps_column_metrics() {
    let fixture = Fixture::new();
    let result = fixture
        .evaluator()
        .evaluate_at(&record("TestToolAgent_noevents", "SELECT stay_id FROM mimicel"), fixed_time())
        .expect("missing event column only voids the event comparison");

    assert!(result.execution_ok);
    assert_eq!(result.columns.true_positives, 1);
    assert_eq!(result.columns.false_negatives, 2);
    assert!(result.columns.error.is_none());
    assert_eq!(result.events.error.as_deref(), Some("candidate label list is empty"));
    assert_eq!(result.events.f1, 0.0);
    assert!(result_path(&fixture.results_dir(), "TestToolAgent_noevents").exists());
}

#[test]
fn zero_row_candidate_is_persisted_with_rejected_events() {
    let fixture = Fixture::new();
    let result = fixture
        .evaluator()
        .evaluate_at(
            &record(
                "TestToolAgent_zero",
                "SELECT stay_id, activity, timestamp FROM mimicel WHERE stay_id = 99",
            ),
            fixed_time(),
        )
        .expect("zero rows only voids the event comparison");

    assert!(result.execution_ok);
    assert_eq!(result.candidate_rows, 0);
    assert_eq!(result.coverage, 0.0);
    assert_eq!(result.columns.f1, 1.0);
    assert_eq!(result.columns.true_positives, 3);
    assert_eq!(result.events.true_positives, 0);
    assert_eq!(result.events.false_negatives, 0);
    assert_eq!(result.events.benchmark_labels.len(), 3);
    assert!(result.events.candidate_labels.is_empty());
    assert_eq!(result.events.error.as_deref(), Some("candidate label list is empty"));

    let persisted = read_result(&fixture.results_dir(), "TestToolAgent_zero");
    assert_eq!(persisted["events"]["error"], "candidate label list is empty");
    assert_eq!(persisted["columns"]["error"], serde_json::Value::Null);
}

#[test]
fn null_only_reference_events_reject_each_event_comparison() {
    let fixture = Fixture::new();
    let evaluator = fixture.evaluator_with(
        Box::new(LocalHashEmbedder::default()),
        "SELECT stay_id, NULL AS activity, timestamp FROM mimicel",
    );
    assert!(evaluator.reference().event_labels().is_empty());

    let result = evaluator
        .evaluate_at(&record("TestToolAgent_nullref", REFERENCE_QUERY), fixed_time())
        .expect("degenerate reference events only void the event comparison");

    assert_eq!(result.columns.f1, 1.0);
    assert_eq!(result.events.error.as_deref(), Some("benchmark label list is empty"));
    assert_eq!(result.events.candidate_labels.len(), 3);
    assert!(result_path(&fixture.results_dir(), "TestToolAgent_nullref").exists());
}

#[test]
fn provider_failure_aborts_without_partial_result() {
    let fixture = Fixture::new();
    let evaluator = fixture.evaluator_with(Box::new(FailingEmbedder), REFERENCE_QUERY);

    let error = evaluator
        .evaluate_at(&record("TestToolAgent_quota", REFERENCE_QUERY), fixed_time())
        .expect_err("provider failure must surface");
    assert!(matches!(error, EvalError::Provider { .. }));
    assert!(!result_path(&fixture.results_dir(), "TestToolAgent_quota").exists());
}

#[test]
fn reference_without_event_column_is_a_configuration_error() {
    let fixture = Fixture::new();
    let error = Evaluator::with_reference_query(
        fixture.config(),
        Box::new(LocalHashEmbedder::default()),
        fixture.engine(),
        "SELECT stay_id FROM mimicel",
    )
    .err()
    .expect("reference must expose the event column");
    assert!(matches!(error, EvalError::Configuration { .. }));
}

#[test]
fn failing_reference_query_is_an_execution_error() {
    let fixture = Fixture::new();
    let error = Evaluator::with_reference_query(
        fixture.config(),
        Box::new(LocalHashEmbedder::default()),
        fixture.engine(),
        "SELECT * FROM missing_table",
    )
    .err()
    .expect("reference must load");
    assert!(matches!(error, EvalError::Execution(_)));
}

#[test]
fn runs_with_different_ids_share_a_results_directory() {
    let fixture = Fixture::new();
    let evaluator = fixture.evaluator();

    evaluator
        .evaluate_at(&record("TestToolAgent_a", REFERENCE_QUERY), fixed_time())
        .expect("first run");
    evaluator
        .evaluate_at(&record("TestToolAgent_b", "SELECT nope"), fixed_time())
        .expect("second run");

    let mut names = fs::read_dir(fixture.results_dir())
        .expect("results dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<String>>();
    names.sort();
    assert_eq!(names, vec!["Result_TestToolAgent_a.json", "Result_TestToolAgent_b.json"]);
}

#[test]
fn unsafe_run_id_is_rejected_before_execution() {
    let fixture = Fixture::new();
    let error = fixture
        .evaluator()
        .evaluate_at(&record("../outside", REFERENCE_QUERY), fixed_time())
        .expect_err("path traversal");
    assert!(matches!(error, EvalError::InvalidInput { .. }));
}
