use std::path::{Path, PathBuf};

use crate::error::EvalError;
use crate::model::{EvaluationResult, validate_run_id};
use crate::util::write_json_atomic;

pub const RESULT_FILE_PREFIX: &str = "Result_";

pub fn result_path(results_dir: &Path, run_id: &str) -> PathBuf {
    results_dir.join(format!("{RESULT_FILE_PREFIX}{run_id}.json"))
}

pub fn persist_result(results_dir: &Path, result: &EvaluationResult) -> Result<PathBuf, EvalError> {
    validate_run_id(&result.run_id)?;
    let path = result_path(results_dir, &result.run_id);
    write_json_atomic(&path, result)?;
    Ok(path)
}
