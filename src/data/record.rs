//! Record Module
//! Cleaned incident rows and the logical columns they are read from.

use serde::Serialize;
use std::fmt;

/// Time point labels longer than this collapse to `Unknown`.
pub const MAX_TIME_POINT_LEN: usize = 30;

/// Default clinical impact score when the column is blank or unparsable.
pub const DEFAULT_IMPACT: f64 = 5.0;

/// Specialty used when a row names none.
pub const ALL_SPECIALTIES: &str = "All";

/// Technical domain used when a row names none.
pub const UNKNOWN_DOMAIN: &str = "Unknown";

/// Logical columns of the CIPHER dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Incident,
    Description,
    Domain,
    Specialty,
    TimePoint,
    Impact,
    RefTitle,
    RefLink,
    Quote,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Id,
        Column::Incident,
        Column::Description,
        Column::Domain,
        Column::Specialty,
        Column::TimePoint,
        Column::Impact,
        Column::RefTitle,
        Column::RefLink,
        Column::Quote,
    ];

    /// Header spellings accepted for this column (compared case-insensitively).
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Column::Id => &["id", "incident id"],
            Column::Incident => &["short title", "incident"],
            Column::Description => &["description of patient harm", "description"],
            Column::Domain => &["technical domain", "domain"],
            Column::Specialty => &["speciality", "specialty"],
            Column::TimePoint => &["time point", "time_point"],
            Column::Impact => &["clinical impact score", "impact"],
            Column::RefTitle => &["reference title", "ref_title"],
            Column::RefLink => &["reference link", "ref_link"],
            Column::Quote => &["direct quote", "quote"],
        }
    }

    /// Whether the header row must contain this column.
    pub fn is_required_column(self) -> bool {
        matches!(
            self,
            Column::Incident | Column::Description | Column::Domain | Column::Specialty
        )
    }

    /// Whether a row must carry a non-blank value in this column.
    pub fn is_required_value(self) -> bool {
        matches!(self, Column::Incident | Column::Description)
    }

    /// Match a raw header cell to a logical column.
    pub fn from_header(header: &str) -> Option<Column> {
        let normalized = header.trim().to_lowercase();
        Column::ALL
            .into_iter()
            .find(|col| col.headers().contains(&normalized.as_str()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Incident => "incident",
            Column::Description => "description",
            Column::Domain => "domain",
            Column::Specialty => "specialty",
            Column::TimePoint => "time_point",
            Column::Impact => "impact",
            Column::RefTitle => "ref_title",
            Column::RefLink => "ref_link",
            Column::Quote => "quote",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an incident report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    Academic,
    SocialMedia,
}

impl Source {
    /// Social media reports carry the literal reference title "social media".
    pub fn from_reference_title(title: &str) -> Self {
        if title.trim().eq_ignore_ascii_case("social media") {
            Source::SocialMedia
        } else {
            Source::Academic
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::Academic => "Academic",
            Source::SocialMedia => "Social Media",
        }
    }
}

/// Point after the attack at which the harm was reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TimePoint {
    Time0,
    FirstHour,
    FirstDay,
    FirstWeek,
    Week2,
    FirstMonth,
    Unknown,
    Other(String),
}

impl TimePoint {
    /// Normalize a raw time point label.
    ///
    /// Returns the parsed value and whether a non-empty label was discarded
    /// because it exceeded [`MAX_TIME_POINT_LEN`].
    pub fn parse(raw: &str) -> (TimePoint, bool) {
        let trimmed = raw.trim();
        let lower = trimmed
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let tp = match lower.as_str() {
            "" | "unknown" => TimePoint::Unknown,
            "time 0" | "hour zero" | "hour 0" | "zero" | "t=0" => TimePoint::Time0,
            "first hour" | "hour 1" | "1st hour" => TimePoint::FirstHour,
            "first day" | "day 1" | "1st day" | "firsy day" => TimePoint::FirstDay,
            "first week" | "week 1" | "1st week" => TimePoint::FirstWeek,
            "week 2" | "2nd week" => TimePoint::Week2,
            "first month" | "month 1" | "1st month" => TimePoint::FirstMonth,
            _ if trimmed.chars().count() <= MAX_TIME_POINT_LEN => {
                TimePoint::Other(trimmed.to_string())
            }
            _ => return (TimePoint::Unknown, true),
        };
        (tp, false)
    }

    /// Position on the attack time line. Free-text labels sort after it.
    pub fn rank(&self) -> usize {
        match self {
            TimePoint::Time0 => 0,
            TimePoint::FirstHour => 1,
            TimePoint::FirstDay => 2,
            TimePoint::FirstWeek => 3,
            TimePoint::Week2 => 4,
            TimePoint::FirstMonth => 5,
            TimePoint::Unknown => 6,
            TimePoint::Other(_) => 7,
        }
    }

    /// Short label shown on charts.
    pub fn display(&self) -> &str {
        match self {
            TimePoint::Time0 => "Hour 0",
            TimePoint::FirstHour => "Hour 1",
            TimePoint::FirstDay => "Day 1",
            TimePoint::FirstWeek => "Week 1",
            TimePoint::Week2 => "Week 2",
            TimePoint::FirstMonth => "Month 1",
            TimePoint::Unknown => "Unknown",
            TimePoint::Other(s) => s,
        }
    }
}

/// Citation attached to an incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reference {
    pub title: Option<String>,
    pub link: Option<String>,
    pub quote: Option<String>,
}

/// One cleaned row of the incident dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    /// 1-based position among the data rows of the source file.
    pub row: usize,
    pub incident: String,
    pub description: String,
    pub domain: String,
    pub specialties: Vec<String>,
    pub time_point: TimePoint,
    pub impact: f64,
    pub source: Source,
    pub reference: Reference,
}
