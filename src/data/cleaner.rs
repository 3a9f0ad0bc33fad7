//! Data Cleaner Module
//! Turns raw rows into records, collecting rejected rows and data-quality warnings.
//!
//! Bad rows are data, not faults: cleaning never fails.

use crate::data::loader::{RawRow, RawTable};
use crate::data::record::{
    Column, Record, Reference, Source, TimePoint, ALL_SPECIALTIES, DEFAULT_IMPACT,
    UNKNOWN_DOMAIN,
};
use crate::data::vocabulary::VocabularySet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a row was excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    MissingRequiredField { field: Column },
    UnknownCategory { field: Column, value: String },
    EmptyRecord,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingRequiredField { .. } => "missing_required_field",
            RejectReason::UnknownCategory { .. } => "unknown_category",
            RejectReason::EmptyRecord => "empty_record",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingRequiredField { field } => {
                write!(f, "missing required field '{}'", field)
            }
            RejectReason::UnknownCategory { field, value } => {
                write!(f, "unknown {} '{}'", field, value)
            }
            RejectReason::EmptyRecord => f.write_str("empty record"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub row: usize,
    pub line: u64,
    pub reason: RejectReason,
}

/// Non-fatal problem found in a row that was still accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DataQualityWarning {
    MissingOptionalField { row: usize, field: Column },
    UnparsableImpact { row: usize, value: String },
    TimePointTooLong { row: usize, value: String },
}

impl DataQualityWarning {
    pub fn code(&self) -> &'static str {
        match self {
            DataQualityWarning::MissingOptionalField { .. } => "missing_optional_field",
            DataQualityWarning::UnparsableImpact { .. } => "unparsable_impact",
            DataQualityWarning::TimePointTooLong { .. } => "time_point_too_long",
        }
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::MissingOptionalField { row, field } => {
                write!(f, "row {}: missing {}, using default", row, field)
            }
            DataQualityWarning::UnparsableImpact { row, value } => {
                write!(f, "row {}: impact score '{}' is not a number", row, value)
            }
            DataQualityWarning::TimePointTooLong { row, value } => {
                write!(f, "row {}: time point '{}' too long, using Unknown", row, value)
            }
        }
    }
}

/// Result of cleaning a raw table.
#[derive(Debug, Clone, Default)]
pub struct CleanOutput {
    pub total_rows: usize,
    pub records: Vec<Record>,
    pub rejections: Vec<Rejection>,
    pub warnings: Vec<DataQualityWarning>,
}

impl CleanOutput {
    pub fn rejection_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.rejections {
            *counts.entry(r.reason.code()).or_insert(0) += 1;
        }
        counts
    }

    pub fn warning_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for w in &self.warnings {
            *counts.entry(w.code()).or_insert(0) += 1;
        }
        counts
    }
}

/// Handles data cleaning and normalization.
pub struct Cleaner {
    vocabularies: VocabularySet,
}

impl Cleaner {
    pub fn new(vocabularies: VocabularySet) -> Self {
        Self { vocabularies }
    }

    /// Clean every row of the table, in file order.
    pub fn clean(&mut self, table: &RawTable) -> CleanOutput {
        let mut out = CleanOutput {
            total_rows: table.row_count(),
            ..Default::default()
        };

        debug!(
            "Vocabularies: specialty {}, domain {}",
            if self.vocabularies.specialty.is_closed() { "closed" } else { "open" },
            if self.vocabularies.domain.is_closed() { "closed" } else { "open" }
        );
        if !table.has_column(Column::Impact) {
            info!("No impact column, using default score {}", DEFAULT_IMPACT);
        }

        for row in &table.rows {
            let mut row_warnings = Vec::new();
            match self.clean_row(table, row, &mut row_warnings) {
                Ok(record) => {
                    for w in &row_warnings {
                        warn!("{}", w);
                    }
                    out.warnings.append(&mut row_warnings);
                    out.records.push(record);
                }
                Err(reason) => {
                    debug!("Rejected row {} (line {}): {}", row.position, row.line, reason);
                    out.rejections.push(Rejection {
                        row: row.position,
                        line: row.line,
                        reason,
                    });
                }
            }
        }

        info!(
            "Cleaned {} rows of {}: {} valid, {} rejected, {} warnings",
            out.total_rows,
            table.origin.display(),
            out.records.len(),
            out.rejections.len(),
            out.warnings.len()
        );
        out
    }

    fn clean_row(
        &mut self,
        table: &RawTable,
        row: &RawRow,
        warnings: &mut Vec<DataQualityWarning>,
    ) -> Result<Record, RejectReason> {
        if row.fields.iter().all(|f| f.trim().is_empty()) {
            return Err(RejectReason::EmptyRecord);
        }

        let field = |col: Column| table.value(row, col).map(str::trim).unwrap_or("");

        for col in Column::ALL {
            if col.is_required_value() && field(col).is_empty() {
                return Err(RejectReason::MissingRequiredField { field: col });
            }
        }

        let raw_domain = field(Column::Domain);
        let domain = if raw_domain.is_empty() {
            warnings.push(DataQualityWarning::MissingOptionalField {
                row: row.position,
                field: Column::Domain,
            });
            UNKNOWN_DOMAIN.to_string()
        } else {
            self.vocabularies
                .domain
                .normalize(raw_domain)
                .ok_or_else(|| RejectReason::UnknownCategory {
                    field: Column::Domain,
                    value: raw_domain.to_string(),
                })?
        };

        let specialties = self.split_specialties(field(Column::Specialty))?;

        let (time_point, too_long) = TimePoint::parse(field(Column::TimePoint));
        let time_point = match time_point {
            TimePoint::Other(label) => TimePoint::Other(
                self.vocabularies
                    .time_point
                    .normalize(&label)
                    .ok_or_else(|| RejectReason::UnknownCategory {
                        field: Column::TimePoint,
                        value: label.clone(),
                    })?,
            ),
            known => known,
        };
        if too_long {
            warnings.push(DataQualityWarning::TimePointTooLong {
                row: row.position,
                value: field(Column::TimePoint).to_string(),
            });
        }

        let impact = if table.has_column(Column::Impact) {
            Self::parse_impact(field(Column::Impact), row.position, warnings)
        } else {
            DEFAULT_IMPACT
        };

        let id = match field(Column::Id) {
            "" => format!("row-{}", row.position),
            id => id.to_string(),
        };

        let non_empty = |col: Column| Some(field(col)).filter(|v| !v.is_empty()).map(String::from);
        let reference = Reference {
            title: non_empty(Column::RefTitle),
            link: non_empty(Column::RefLink),
            quote: non_empty(Column::Quote),
        };

        Ok(Record {
            id,
            row: row.position,
            incident: field(Column::Incident).to_string(),
            description: field(Column::Description).to_string(),
            domain,
            specialties,
            time_point,
            impact,
            source: Source::from_reference_title(field(Column::RefTitle)),
            reference,
        })
    }

    /// Split a multi-specialty cell on ';' or ',' and normalize each part.
    fn split_specialties(&mut self, raw: &str) -> Result<Vec<String>, RejectReason> {
        let mut specialties: Vec<String> = Vec::new();
        for part in raw.split([';', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            let canonical = self.vocabularies.specialty.normalize(part).ok_or_else(|| {
                RejectReason::UnknownCategory {
                    field: Column::Specialty,
                    value: part.to_string(),
                }
            })?;
            if !specialties.contains(&canonical) {
                specialties.push(canonical);
            }
        }
        if specialties.is_empty() {
            specialties.push(ALL_SPECIALTIES.to_string());
        }
        Ok(specialties)
    }

    fn parse_impact(raw: &str, row: usize, warnings: &mut Vec<DataQualityWarning>) -> f64 {
        if raw.is_empty() {
            warnings.push(DataQualityWarning::MissingOptionalField {
                row,
                field: Column::Impact,
            });
            return DEFAULT_IMPACT;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v.max(1.0),
            _ => {
                warnings.push(DataQualityWarning::UnparsableImpact {
                    row,
                    value: raw.to_string(),
                });
                DEFAULT_IMPACT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::DataLoader;
    use std::path::Path;

    const HEADER: &str = "Short Title,Description of Patient Harm,Technical Domain,Speciality,Time Point,Clinical Impact Score,Reference Title";

    fn table(rows: &[&str]) -> RawTable {
        let content = format!("{}\n{}\n", HEADER, rows.join("\n"));
        DataLoader::from_reader(content.as_bytes(), Path::new("test.csv")).unwrap()
    }

    fn clean(rows: &[&str]) -> CleanOutput {
        Cleaner::new(VocabularySet::default()).clean(&table(rows))
    }

    #[test]
    fn test_clean_valid_row() {
        let out = clean(&["Delay, Late meds ,Pharmacy,Cardiology,First Day,7,Lancet"]);
        assert_eq!(out.records.len(), 1);
        let rec = &out.records[0];
        assert_eq!(rec.id, "row-1");
        assert_eq!(rec.description, "Late meds");
        assert_eq!(rec.domain, "Pharmacy");
        assert_eq!(rec.specialties, vec!["Cardiology".to_string()]);
        assert_eq!(rec.time_point, TimePoint::FirstDay);
        assert_eq!(rec.impact, 7.0);
        assert_eq!(rec.source, Source::Academic);
        assert_eq!(rec.reference.title.as_deref(), Some("Lancet"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_specialty_case_and_whitespace_collapse() {
        let out = clean(&[
            "A,d,Lab,Cardiology,,5,",
            "B,d,Lab,cardiology ,,5,",
            "C,d,Lab,Oncology,,5,",
        ]);
        let specs: Vec<_> = out.records.iter().map(|r| r.specialties[0].as_str()).collect();
        assert_eq!(specs, vec!["Cardiology", "Cardiology", "Oncology"]);
    }

    #[test]
    fn test_free_text_time_points_collapse_case_and_whitespace() {
        let out = clean(&[
            "A,d,Lab,Cardiology,Day 3,5,",
            "B,d,Lab,Cardiology,day 3 ,5,",
            "C,d,LAB ,Cardiology,DAY 3,5,",
        ]);
        let times: Vec<_> = out.records.iter().map(|r| r.time_point.display()).collect();
        assert_eq!(times, vec!["Day 3", "Day 3", "Day 3"]);
        assert!(out.records.iter().all(|r| r.domain == "Lab"));
    }

    #[test]
    fn test_closed_time_point_vocabulary_rejects_unknown_label() {
        let vocab = VocabularySet::from_json_str(
            r#"{ "time_point": { "closed": true, "terms": { "Day 3": [] } } }"#,
        )
        .unwrap();
        let out = Cleaner::new(vocab).clean(&table(&[
            "A,d,Lab,Cardiology,day 3,5,",
            "B,d,Lab,Cardiology,Day 9,5,",
            "C,d,Lab,Cardiology,First Week,5,",
        ]));
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].time_point, TimePoint::Other("Day 3".to_string()));
        assert_eq!(out.records[1].time_point, TimePoint::FirstWeek);
        assert_eq!(
            out.rejections[0].reason,
            RejectReason::UnknownCategory {
                field: Column::TimePoint,
                value: "Day 9".to_string()
            }
        );
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let out = clean(&["A,d,Lab,Cardiology,,5,", ",no title,Lab,Oncology,,5,"]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.rejections[0].row, 2);
        assert_eq!(
            out.rejections[0].reason,
            RejectReason::MissingRequiredField {
                field: Column::Incident
            }
        );
        assert_eq!(out.rejection_counts().get("missing_required_field"), Some(&1));
    }

    #[test]
    fn test_blank_row_is_empty_record() {
        let out = clean(&[" , , , , , , "]);
        assert!(out.records.is_empty());
        assert_eq!(out.rejections[0].reason, RejectReason::EmptyRecord);
    }

    #[test]
    fn test_closed_vocabulary_rejects_unknown_category() {
        let vocab = VocabularySet::from_json_str(
            r#"{ "domain": { "closed": true, "terms": { "Laboratory": ["lab"] } } }"#,
        )
        .unwrap();
        let out = Cleaner::new(vocab).clean(&table(&[
            "A,d,lab,Cardiology,,5,",
            "B,d,Radiology,Cardiology,,5,",
        ]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].domain, "Laboratory");
        assert_eq!(
            out.rejections[0].reason,
            RejectReason::UnknownCategory {
                field: Column::Domain,
                value: "Radiology".to_string()
            }
        );
    }

    #[test]
    fn test_defaults_and_warnings() {
        let out = clean(&["A,d,,,,abc,Social Media"]);
        let rec = &out.records[0];
        assert_eq!(rec.domain, UNKNOWN_DOMAIN);
        assert_eq!(rec.specialties, vec![ALL_SPECIALTIES.to_string()]);
        assert_eq!(rec.time_point, TimePoint::Unknown);
        assert_eq!(rec.impact, DEFAULT_IMPACT);
        assert_eq!(rec.source, Source::SocialMedia);

        let counts = out.warning_counts();
        assert_eq!(counts.get("missing_optional_field"), Some(&1));
        assert_eq!(counts.get("unparsable_impact"), Some(&1));
    }

    #[test]
    fn test_impact_is_clipped_to_one() {
        let out = clean(&["A,d,Lab,Cardiology,,0.2,", "B,d,Lab,Cardiology,,-4,"]);
        assert!(out.records.iter().all(|r| r.impact == 1.0));
    }

    #[test]
    fn test_multi_specialty_cell_is_split() {
        let out = clean(&["A,d,Lab,\"Cardiology; Oncology, cardiology\",,5,"]);
        assert_eq!(
            out.records[0].specialties,
            vec!["Cardiology".to_string(), "Oncology".to_string()]
        );
    }

    #[test]
    fn test_id_column_is_used_when_present() {
        let content = "ID,Short Title,Description of Patient Harm,Technical Domain,Speciality\n\
                       C-17,A,d,Lab,Cardiology\n,B,d,Lab,Oncology\n";
        let table = DataLoader::from_reader(content.as_bytes(), Path::new("t.csv")).unwrap();
        let out = Cleaner::new(VocabularySet::default()).clean(&table);
        assert_eq!(out.records[0].id, "C-17");
        assert_eq!(out.records[1].id, "row-2");
        assert_eq!(out.records[0].impact, DEFAULT_IMPACT);
        assert!(out.warnings.is_empty());
    }
}
