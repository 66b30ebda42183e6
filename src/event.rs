//! Completed interval records and their row rendering.

use chrono::{DateTime, Local, TimeDelta};
use std::fmt::Write;

/// Placeholder for an empty window title or an unresolvable application.
pub const UNKNOWN: &str = "Unknown";

/// Timestamp layout used by both sinks.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Column headers, in row order.
pub const COLUMNS: [&str; 9] = [
    "Time Started",
    "Duration",
    "Time Ended",
    "Application Name",
    "Window Name",
    "Project Name",
    "Client",
    "Tags",
    "Current User",
];

/// What a completed interval was attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalKind {
    /// A foreground window.
    Window { title: String, application: String },
    /// No user input for longer than the idle threshold.
    Idle,
}

/// An immutable record of one completed span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalEvent {
    started_at: DateTime<Local>,
    ended_at: DateTime<Local>,
    kind: IntervalKind,
    project: String,
    client: String,
    tags: String,
    user: String,
}

impl IntervalEvent {
    /// A closed window interval. Empty title or application become `"Unknown"`.
    pub fn window(
        title: impl Into<String>,
        application: Option<String>,
        started_at: DateTime<Local>,
        ended_at: DateTime<Local>,
        user: impl Into<String>,
    ) -> Self {
        let title = non_empty_or_unknown(title.into());
        let application = non_empty_or_unknown(application.unwrap_or_default());

        Self::new(
            IntervalKind::Window { title, application },
            started_at,
            ended_at,
            String::new(),
            String::new(),
            user.into(),
        )
    }

    /// A closed idle interval, tagged `idle`.
    pub fn idle(
        started_at: DateTime<Local>,
        ended_at: DateTime<Local>,
        user: impl Into<String>,
    ) -> Self {
        Self::new(
            IntervalKind::Idle,
            started_at,
            ended_at,
            "idle".to_string(),
            "idle".to_string(),
            user.into(),
        )
    }

    fn new(
        kind: IntervalKind,
        started_at: DateTime<Local>,
        ended_at: DateTime<Local>,
        project: String,
        tags: String,
        user: String,
    ) -> Self {
        // A wall clock stepping backwards must not produce a negative span.
        let ended_at = ended_at.max(started_at);
        Self {
            started_at,
            ended_at,
            kind,
            project,
            client: String::new(),
            tags,
            user,
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Local> {
        self.ended_at
    }

    /// Always `ended_at - started_at`.
    pub fn duration(&self) -> TimeDelta {
        self.ended_at - self.started_at
    }

    pub fn kind(&self) -> &IntervalKind {
        &self.kind
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.kind, IntervalKind::Idle)
    }

    /// Window title, for window intervals only.
    pub fn window_title(&self) -> Option<&str> {
        match &self.kind {
            IntervalKind::Window { title, .. } => Some(title),
            IntervalKind::Idle => None,
        }
    }

    /// Application name, for window intervals only.
    pub fn application_name(&self) -> Option<&str> {
        match &self.kind {
            IntervalKind::Window { application, .. } => Some(application),
            IntervalKind::Idle => None,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn tags(&self) -> &str {
        &self.tags
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Render the event as the nine sink columns, in [`COLUMNS`] order.
    pub fn row(&self) -> EventRow {
        let (application_name, window_name) = match &self.kind {
            IntervalKind::Window { title, application } => (application.clone(), title.clone()),
            IntervalKind::Idle => (UNKNOWN.to_string(), "Idle".to_string()),
        };

        EventRow {
            time_started: format_timestamp(&self.started_at),
            duration: format_duration(self.duration()),
            time_ended: format_timestamp(&self.ended_at),
            application_name,
            window_name,
            project_name: self.project.clone(),
            client: self.client.clone(),
            tags: self.tags.clone(),
            current_user: self.user.clone(),
        }
    }
}

/// Display form of an [`IntervalEvent`], shared by every sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub time_started: String,
    pub duration: String,
    pub time_ended: String,
    pub application_name: String,
    pub window_name: String,
    pub project_name: String,
    pub client: String,
    pub tags: String,
    pub current_user: String,
}

impl EventRow {
    pub fn fields(&self) -> [&str; 9] {
        [
            self.time_started.as_str(),
            self.duration.as_str(),
            self.time_ended.as_str(),
            self.application_name.as_str(),
            self.window_name.as_str(),
            self.project_name.as_str(),
            self.client.as_str(),
            self.tags.as_str(),
            self.current_user.as_str(),
        ]
    }
}

/// Format a timestamp as `YYYY/MM/DD HH:MM:SS`.
pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Format a span as `[N day(s), ]H:MM:SS[.ffffff]`.
pub fn format_duration(duration: TimeDelta) -> String {
    let total_us = duration.num_microseconds().unwrap_or(i64::MAX).max(0);

    let micros = total_us % 1_000_000;
    let total_secs = total_us / 1_000_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if days > 0 {
        let unit = if days == 1 { "day" } else { "days" };
        let _ = write!(out, "{days} {unit}, ");
    }
    let _ = write!(out, "{hours}:{minutes:02}:{seconds:02}");
    if micros > 0 {
        let _ = write!(out, ".{micros:06}");
    }
    out
}

fn non_empty_or_unknown(value: String) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::zero()), "0:00:00");
        assert_eq!(format_duration(TimeDelta::seconds(2)), "0:00:02");
        assert_eq!(format_duration(TimeDelta::seconds(3_723)), "1:02:03");
        assert_eq!(
            format_duration(TimeDelta::milliseconds(3_723_500)),
            "1:02:03.500000"
        );
        assert_eq!(format_duration(TimeDelta::days(1)), "1 day, 0:00:00");
        assert_eq!(
            format_duration(TimeDelta::days(2) + TimeDelta::seconds(61)),
            "2 days, 0:01:01"
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(&at(9, 5, 3)), "2024/01/15 09:05:03");
    }

    #[test]
    fn test_window_event_substitutes_unknown() {
        let event = IntervalEvent::window("", None, at(9, 0, 0), at(9, 0, 2), "alice");
        assert_eq!(event.window_title(), Some(UNKNOWN));
        assert_eq!(event.application_name(), Some(UNKNOWN));

        let event = IntervalEvent::window("", Some(String::new()), at(9, 0, 0), at(9, 0, 2), "alice");
        assert_eq!(event.application_name(), Some(UNKNOWN));
    }

    #[test]
    fn test_window_event_row() {
        let event = IntervalEvent::window(
            "main.rs - editor",
            Some("code".to_string()),
            at(9, 0, 0),
            at(9, 1, 30),
            "alice",
        );

        let row = event.row();
        assert_eq!(
            row.fields(),
            [
                "2024/01/15 09:00:00",
                "0:01:30",
                "2024/01/15 09:01:30",
                "code",
                "main.rs - editor",
                "",
                "",
                "",
                "alice",
            ]
        );
    }

    #[test]
    fn test_idle_event_is_tagged() {
        let event = IntervalEvent::idle(at(9, 0, 0), at(9, 0, 20), "alice");
        assert!(event.is_idle());
        assert_eq!(event.project(), "idle");
        assert_eq!(event.tags(), "idle");
        assert_eq!(event.client(), "");
        assert_eq!(event.window_title(), None);
        assert_eq!(event.application_name(), None);

        let row = event.row();
        assert_eq!(row.application_name, UNKNOWN);
        assert_eq!(row.window_name, "Idle");
        assert_eq!(row.duration, "0:00:20");
    }

    #[test]
    fn test_end_before_start_is_clamped() {
        let event = IntervalEvent::idle(at(9, 0, 10), at(9, 0, 5), "alice");
        assert_eq!(event.ended_at(), event.started_at());
        assert_eq!(event.duration(), TimeDelta::zero());
    }
}
