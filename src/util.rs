use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::EvalError;

pub fn utc_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<(), EvalError> {
    fs::create_dir_all(path).map_err(|err| {
        EvalError::persistence(path, format!("failed to create directory: {err}"))
    })
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), EvalError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_directory(parent)?;

    let mut data = serde_json::to_vec_pretty(value)
        .map_err(|err| EvalError::persistence(path, format!("failed to serialize json: {err}")))?;
    data.push(b'\n');

    let mut staged = NamedTempFile::new_in(parent).map_err(|err| {
        EvalError::persistence(path, format!("failed to create staging file: {err}"))
    })?;
    staged
        .write_all(&data)
        .map_err(|err| EvalError::persistence(path, format!("failed to write json: {err}")))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|err| EvalError::persistence(path, format!("failed to flush json: {err}")))?;
    staged
        .persist(path)
        .map_err(|err| EvalError::persistence(path, format!("failed to move json into place: {err}")))?;

    Ok(())
}
