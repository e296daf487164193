use super::{PersistenceError, PersistenceResult};
use crate::calculations::ResolvedWindow;
use crate::job::JobBundle;
use crate::operation::OperationId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn save_bundle_to_json<P: AsRef<Path>>(bundle: &JobBundle, path: P) -> PersistenceResult<()> {
    super::validate_bundle(bundle)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, bundle)?;
    Ok(())
}

pub fn load_bundle_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<JobBundle> {
    let file = File::open(path)?;
    let bundle: JobBundle = serde_json::from_reader(file)?;
    super::validate_bundle(&bundle)?;
    Ok(bundle)
}

#[derive(Serialize, Deserialize)]
struct WindowCsvRecord {
    operation_id: OperationId,
    start: String,
    end: String,
    calendar_unresolved: bool,
    manual: bool,
}

impl WindowCsvRecord {
    fn new(operation_id: OperationId, window: &ResolvedWindow) -> Self {
        Self {
            operation_id,
            start: format_datetime(window.start),
            end: format_datetime(window.end),
            calendar_unresolved: window.calendar_unresolved,
            manual: window.manual,
        }
    }

    fn into_window(self) -> PersistenceResult<(OperationId, ResolvedWindow)> {
        let start = parse_datetime(&self.start)?;
        let end = parse_datetime(&self.end)?;
        if end < start {
            return Err(PersistenceError::InvalidData(format!(
                "operation {} ends before it starts",
                self.operation_id
            )));
        }
        Ok((
            self.operation_id,
            ResolvedWindow {
                start,
                end,
                calendar_unresolved: self.calendar_unresolved,
                manual: self.manual,
            },
        ))
    }
}

/// Export a plan as `operation_id,start,end,calendar_unresolved,manual` rows.
pub fn save_windows_to_csv<P: AsRef<Path>>(
    windows: &BTreeMap<OperationId, ResolvedWindow>,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for (id, window) in windows {
        writer.serialize(WindowCsvRecord::new(*id, window))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_windows_from_csv<P: AsRef<Path>>(
    path: P,
) -> PersistenceResult<BTreeMap<OperationId, ResolvedWindow>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut windows = BTreeMap::new();
    for record in reader.deserialize::<WindowCsvRecord>() {
        let (id, window) = record?.into_window()?;
        if windows.insert(id, window).is_some() {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate operation id {id}"
            )));
        }
    }
    Ok(windows)
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(input: &str) -> PersistenceResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), DATETIME_FORMAT)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid datetime '{input}': {e}")))
}
