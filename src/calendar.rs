use crate::operation::ResourceId;
use crate::window::{TimeWindow, merge_windows, subtract_window};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Default bound on how far a placement search walks the calendar.
pub const DEFAULT_HORIZON_DAYS: u32 = 730;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error(
        "no working time for {} within {horizon_days} days of {from}",
        .resource_id.as_deref().unwrap_or("facility calendar")
    )]
    Exhausted {
        resource_id: Option<ResourceId>,
        from: NaiveDateTime,
        horizon_days: u32,
    },
    #[error("invalid calendar '{calendar_id}': {message}")]
    InvalidConfig { calendar_id: String, message: String },
}

/// Recurring weekly working hours. An `end` at or before `start` finishes on
/// the following day, so 22:00-06:00 is a night shift and 00:00-00:00 a
/// full day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn new(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            weekday,
            start,
            end,
        }
    }

    /// The shift starting on `date`, which may run into the next day.
    fn on(&self, date: NaiveDate) -> TimeWindow {
        let start = date.and_time(self.start);
        let end = if self.end <= self.start {
            (date + Duration::days(1)).and_time(self.end)
        } else {
            date.and_time(self.end)
        };
        TimeWindow::new(start, end)
    }

    fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Unavailable,
}

/// Maintenance window, shutdown or overtime slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarException {
    pub window: TimeWindow,
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Working calendar of a resource or of the whole facility.
///
/// Availability on a date is the weekly hours for its weekday (all day when
/// no weekly hours are defined), cleared on holidays, plus available
/// exceptions, minus unavailable exceptions. Unavailable always wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkCalendarConfig", into = "WorkCalendarConfig")]
pub struct WorkCalendar {
    id: String,
    weekly: Vec<WorkingHours>,
    holidays: BTreeSet<NaiveDate>,
    exceptions: Vec<CalendarException>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendarConfig {
    pub id: String,
    #[serde(default)]
    pub weekly: Vec<WorkingHours>,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    #[serde(default)]
    pub exceptions: Vec<CalendarException>,
}

pub(crate) struct Search {
    pub window: TimeWindow,
    pub days_scanned: u64,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::unrestricted("facility")
    }
}

impl WorkCalendar {
    pub const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Calendar that is available around the clock.
    pub fn unrestricted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            weekly: Vec::new(),
            holidays: BTreeSet::new(),
            exceptions: Vec::new(),
        }
    }

    /// One shift per listed weekday, e.g. Mon-Fri 08:00-17:00.
    pub fn with_shift<I>(id: impl Into<String>, days: I, start: NaiveTime, end: NaiveTime) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut calendar = Self::unrestricted(id);
        calendar.set_working_hours(days, start, end);
        calendar
    }

    pub fn from_config(config: &WorkCalendarConfig) -> Result<Self, CalendarError> {
        for exception in &config.exceptions {
            if exception.window.is_empty() {
                return Err(CalendarError::InvalidConfig {
                    calendar_id: config.id.clone(),
                    message: format!("exception {} is empty", exception.window),
                });
            }
        }
        for hours in &config.weekly {
            if hours.start == hours.end && hours.start != NaiveTime::MIN {
                return Err(CalendarError::InvalidConfig {
                    calendar_id: config.id.clone(),
                    message: format!(
                        "working hours on {} start and end at {}",
                        hours.weekday, hours.start
                    ),
                });
            }
        }
        Ok(Self {
            id: config.id.clone(),
            weekly: config.weekly.clone(),
            holidays: config.holidays.iter().copied().collect(),
            exceptions: config.exceptions.clone(),
        })
    }

    pub fn to_config(&self) -> WorkCalendarConfig {
        WorkCalendarConfig::from(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when every instant is working time.
    pub fn is_unrestricted(&self) -> bool {
        self.weekly.is_empty()
            && self.holidays.is_empty()
            && self
                .exceptions
                .iter()
                .all(|e| e.availability == Availability::Available)
    }

    /// Replace the weekly hours with a single shift on each of `days`.
    pub fn set_working_hours<I>(&mut self, days: I, start: NaiveTime, end: NaiveTime)
    where
        I: IntoIterator<Item = Weekday>,
    {
        self.weekly = days
            .into_iter()
            .map(|day| WorkingHours::new(day, start, end))
            .collect();
    }

    /// Add a further shift, e.g. a second shift on the same weekday.
    pub fn add_working_hours(&mut self, weekday: Weekday, start: NaiveTime, end: NaiveTime) {
        self.weekly.push(WorkingHours::new(weekday, start, end));
    }

    /// Add a single holiday
    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates);
    }

    /// Add the same custom holiday for multiple years
    /// Example: Add Dec 24 (Christmas Eve) for 2025-2030
    pub fn add_recurring_holiday(&mut self, month: u32, day: u32, start_year: i32, end_year: i32) {
        for year in start_year..=end_year {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.holidays.insert(date);
            }
        }
    }

    pub fn add_exception(
        &mut self,
        window: TimeWindow,
        availability: Availability,
        reason: Option<String>,
    ) {
        self.exceptions.push(CalendarException {
            window,
            availability,
            reason,
        });
    }

    /// Block `window`, e.g. for a maintenance stop.
    pub fn add_blackout(&mut self, window: TimeWindow, reason: impl Into<String>) {
        self.add_exception(window, Availability::Unavailable, Some(reason.into()));
    }

    /// Open `window` outside the regular hours.
    pub fn add_overtime(&mut self, window: TimeWindow) {
        self.add_exception(window, Availability::Available, None);
    }

    /// Working intervals of `date`, sorted, merged and clipped to the day.
    pub fn working_intervals_on(&self, date: NaiveDate) -> Vec<TimeWindow> {
        let day = TimeWindow::new(
            date.and_time(NaiveTime::MIN),
            (date + Duration::days(1)).and_time(NaiveTime::MIN),
        );

        let mut intervals: Vec<TimeWindow> = if self.weekly.is_empty() {
            if self.holidays.contains(&date) {
                Vec::new()
            } else {
                vec![day]
            }
        } else {
            // Shifts belong to the day they start on, including the part
            // after midnight.
            let previous = date - Duration::days(1);
            let today = self
                .weekly
                .iter()
                .filter(|hours| hours.weekday == date.weekday())
                .filter(|_| !self.holidays.contains(&date))
                .map(|hours| hours.on(date));
            let overnight = self
                .weekly
                .iter()
                .filter(|hours| hours.crosses_midnight() && hours.weekday == previous.weekday())
                .filter(|_| !self.holidays.contains(&previous))
                .map(|hours| hours.on(previous));
            today
                .chain(overnight)
                .filter_map(|window| window.intersect(&day))
                .collect()
        };

        intervals.extend(
            self.exceptions
                .iter()
                .filter(|e| e.availability == Availability::Available)
                .filter_map(|e| e.window.intersect(&day)),
        );
        merge_windows(&mut intervals);

        for exception in &self.exceptions {
            if exception.availability == Availability::Unavailable {
                subtract_window(&mut intervals, &exception.window);
            }
        }
        intervals
    }

    pub fn is_working_time(&self, instant: NaiveDateTime) -> bool {
        self.working_intervals_on(instant.date())
            .iter()
            .any(|w| w.contains(instant))
    }

    /// Working time inside `[start, end)`.
    pub fn working_time_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Duration {
        let range = TimeWindow::new(start, end);
        let mut total = Duration::zero();
        if range.is_empty() {
            return total;
        }
        let mut date = start.date();
        while date <= end.date() {
            for interval in self.working_intervals_on(date) {
                if let Some(part) = interval.intersect(&range) {
                    total += part.span();
                }
            }
            date = date + Duration::days(1);
        }
        total
    }

    pub(crate) fn search_forward(
        &self,
        from: NaiveDateTime,
        duration: Duration,
        horizon_days: u32,
        contiguous: bool,
    ) -> Option<Search> {
        if duration <= Duration::zero() || self.is_unrestricted() {
            return Some(Search {
                window: TimeWindow::starting_at(from, duration.max(Duration::zero())),
                days_scanned: 0,
            });
        }

        let mut days_scanned = 0;
        let mut remaining = duration;
        let mut begin: Option<NaiveDateTime> = None;
        let mut run: Option<TimeWindow> = None;

        for offset in 0..=i64::from(horizon_days) {
            let date = from.date() + Duration::days(offset);
            days_scanned += 1;
            for interval in self.working_intervals_on(date) {
                if interval.end <= from {
                    continue;
                }
                let piece_start = interval.start.max(from);
                if contiguous {
                    let current = match run {
                        Some(r) if r.end == piece_start => TimeWindow::new(r.start, interval.end),
                        _ => TimeWindow::new(piece_start, interval.end),
                    };
                    if current.span() >= duration {
                        return Some(Search {
                            window: TimeWindow::starting_at(current.start, duration),
                            days_scanned,
                        });
                    }
                    run = Some(current);
                } else {
                    let start = *begin.get_or_insert(piece_start);
                    let available = interval.end - piece_start;
                    if available >= remaining {
                        return Some(Search {
                            window: TimeWindow::new(start, piece_start + remaining),
                            days_scanned,
                        });
                    }
                    remaining -= available;
                }
            }
        }
        None
    }

    pub(crate) fn search_backward(
        &self,
        until: NaiveDateTime,
        duration: Duration,
        horizon_days: u32,
        contiguous: bool,
    ) -> Option<Search> {
        if duration <= Duration::zero() || self.is_unrestricted() {
            return Some(Search {
                window: TimeWindow::ending_at(until, duration.max(Duration::zero())),
                days_scanned: 0,
            });
        }

        let mut days_scanned = 0;
        let mut remaining = duration;
        let mut finish: Option<NaiveDateTime> = None;
        let mut run: Option<TimeWindow> = None;

        for offset in 0..=i64::from(horizon_days) {
            let date = until.date() - Duration::days(offset);
            days_scanned += 1;
            for interval in self.working_intervals_on(date).into_iter().rev() {
                if interval.start >= until {
                    continue;
                }
                let piece_end = interval.end.min(until);
                if contiguous {
                    let current = match run {
                        Some(r) if r.start == piece_end => TimeWindow::new(interval.start, r.end),
                        _ => TimeWindow::new(interval.start, piece_end),
                    };
                    if current.span() >= duration {
                        return Some(Search {
                            window: TimeWindow::ending_at(current.end, duration),
                            days_scanned,
                        });
                    }
                    run = Some(current);
                } else {
                    let end = *finish.get_or_insert(piece_end);
                    let available = piece_end - interval.start;
                    if available >= remaining {
                        return Some(Search {
                            window: TimeWindow::new(piece_end - remaining, end),
                            days_scanned,
                        });
                    }
                    remaining -= available;
                }
            }
        }
        None
    }
}

impl From<&WorkCalendar> for WorkCalendarConfig {
    fn from(calendar: &WorkCalendar) -> Self {
        Self {
            id: calendar.id.clone(),
            weekly: calendar.weekly.clone(),
            holidays: calendar.holidays.iter().copied().collect(),
            exceptions: calendar.exceptions.clone(),
        }
    }
}

impl From<WorkCalendar> for WorkCalendarConfig {
    fn from(calendar: WorkCalendar) -> Self {
        Self::from(&calendar)
    }
}

impl TryFrom<WorkCalendarConfig> for WorkCalendar {
    type Error = CalendarError;

    fn try_from(config: WorkCalendarConfig) -> Result<Self, Self::Error> {
        Self::from_config(&config)
    }
}

/// Placement queries over the facility calendar and per-resource calendars.
///
/// Immutable once built, so concurrent runs can share one instance.
#[derive(Debug, Clone)]
pub struct CalendarService {
    facility: WorkCalendar,
    resources: HashMap<ResourceId, WorkCalendar>,
    horizon_days: u32,
    contiguous: bool,
}

impl CalendarService {
    pub fn new(
        facility: WorkCalendar,
        resources: HashMap<ResourceId, WorkCalendar>,
        horizon_days: u32,
    ) -> Self {
        Self {
            facility,
            resources,
            horizon_days,
            contiguous: false,
        }
    }

    pub fn unrestricted() -> Self {
        Self::new(WorkCalendar::default(), HashMap::new(), DEFAULT_HORIZON_DAYS)
    }

    /// Require placements to be a single uninterrupted working interval.
    pub fn with_contiguous_placement(mut self, contiguous: bool) -> Self {
        self.contiguous = contiguous;
        self
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Calendar governing `resource_id`; the facility calendar when the
    /// operation has no resource or the resource has no calendar of its own.
    pub fn calendar_for(&self, resource_id: Option<&str>) -> &WorkCalendar {
        resource_id
            .and_then(|id| self.resources.get(id))
            .unwrap_or(&self.facility)
    }

    /// Earliest placement of `minimum_duration` working time starting at or
    /// after `earliest_start`.
    pub fn available_window(
        &self,
        resource_id: Option<&str>,
        earliest_start: NaiveDateTime,
        minimum_duration: Duration,
    ) -> Result<TimeWindow, CalendarError> {
        self.search_forward(resource_id, earliest_start, minimum_duration)
            .map(|search| search.window)
    }

    /// Latest placement of `minimum_duration` working time ending at or
    /// before `latest_end`.
    pub fn available_window_backward(
        &self,
        resource_id: Option<&str>,
        latest_end: NaiveDateTime,
        minimum_duration: Duration,
    ) -> Result<TimeWindow, CalendarError> {
        self.search_backward(resource_id, latest_end, minimum_duration)
            .map(|search| search.window)
    }

    pub(crate) fn search_forward(
        &self,
        resource_id: Option<&str>,
        earliest_start: NaiveDateTime,
        minimum_duration: Duration,
    ) -> Result<Search, CalendarError> {
        self.calendar_for(resource_id)
            .search_forward(earliest_start, minimum_duration, self.horizon_days, self.contiguous)
            .ok_or_else(|| self.exhausted(resource_id, earliest_start))
    }

    pub(crate) fn search_backward(
        &self,
        resource_id: Option<&str>,
        latest_end: NaiveDateTime,
        minimum_duration: Duration,
    ) -> Result<Search, CalendarError> {
        self.calendar_for(resource_id)
            .search_backward(latest_end, minimum_duration, self.horizon_days, self.contiguous)
            .ok_or_else(|| self.exhausted(resource_id, latest_end))
    }

    fn exhausted(&self, resource_id: Option<&str>, from: NaiveDateTime) -> CalendarError {
        CalendarError::Exhausted {
            resource_id: resource_id.map(ToOwned::to_owned),
            from,
            horizon_days: self.horizon_days,
        }
    }
}
