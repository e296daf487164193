use super::{ScheduleDiff, ScheduleVersion};
use chrono::NaiveDateTime;
use polars::prelude::*;

fn millis(value: Option<NaiveDateTime>) -> Option<i64> {
    value.map(|dt| dt.and_utc().timestamp_millis())
}

fn series_from_datetimes(name: &str, values: Vec<Option<i64>>) -> PolarsResult<Series> {
    Series::new(name.into(), values).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}

impl ScheduleVersion {
    /// One row per captured operation, ordered by operation id.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let height = self.windows.len();
        let mut ids: Vec<i32> = Vec::with_capacity(height);
        let mut starts: Vec<Option<i64>> = Vec::with_capacity(height);
        let mut ends: Vec<Option<i64>> = Vec::with_capacity(height);
        let mut manual: Vec<bool> = Vec::with_capacity(height);
        let mut resources: Vec<Option<&str>> = Vec::with_capacity(height);
        let mut constraints: Vec<&str> = Vec::with_capacity(height);

        for (id, captured) in &self.windows {
            ids.push(*id);
            starts.push(millis(captured.start));
            ends.push(millis(captured.end));
            manual.push(captured.manually_scheduled);
            resources.push(captured.resource_id.as_deref());
            constraints.push(captured.constraint.kind().as_str());
        }

        let columns: Vec<Column> = vec![
            Series::new(PlSmallStr::from_static("operation_id"), ids).into_column(),
            series_from_datetimes("start", starts)?.into_column(),
            series_from_datetimes("end", ends)?.into_column(),
            Series::new(PlSmallStr::from_static("manually_scheduled"), manual).into_column(),
            Series::new(PlSmallStr::from_static("resource_id"), resources).into_column(),
            Series::new(PlSmallStr::from_static("constraint"), constraints).into_column(),
        ];
        DataFrame::new(columns)
    }
}

impl ScheduleDiff {
    /// One row per moved operation with old and new bounds.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let ids: Vec<i32> = self.changed.iter().map(|c| c.operation_id).collect();
        let old_start = self.changed.iter().map(|c| millis(c.old.map(|w| w.start))).collect();
        let old_end = self.changed.iter().map(|c| millis(c.old.map(|w| w.end))).collect();
        let new_start = self.changed.iter().map(|c| millis(c.new.map(|w| w.start))).collect();
        let new_end = self.changed.iter().map(|c| millis(c.new.map(|w| w.end))).collect();
        let shift_minutes: Vec<Option<i64>> = self
            .changed
            .iter()
            .map(|c| match (c.old, c.new) {
                (Some(old), Some(new)) => Some((new.start - old.start).num_minutes()),
                _ => None,
            })
            .collect();

        DataFrame::new(vec![
            Series::new(PlSmallStr::from_static("operation_id"), ids).into_column(),
            series_from_datetimes("old_start", old_start)?.into_column(),
            series_from_datetimes("old_end", old_end)?.into_column(),
            series_from_datetimes("new_start", new_start)?.into_column(),
            series_from_datetimes("new_end", new_end)?.into_column(),
            Series::new(PlSmallStr::from_static("shift_minutes"), shift_minutes).into_column(),
        ])
    }
}
