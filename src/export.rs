// 📤 CSV Export - one row per student/subject plus an Overall row per student

use crate::grading::StudentReport;
use crate::store::Gradebook;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub const OVERALL_SUBJECT: &str = "Overall";

#[derive(Debug, Serialize, PartialEq)]
pub struct ExportRow {
    #[serde(rename = "Student")]
    pub student: String,

    #[serde(rename = "Subject")]
    pub subject: String,

    #[serde(rename = "Grade_Count")]
    pub grade_count: usize,

    /// Space separated, in insertion order
    #[serde(rename = "Grades")]
    pub grades: String,

    /// Two decimals; empty for a student without grades
    #[serde(rename = "Average")]
    pub average: String,

    #[serde(rename = "Letter")]
    pub letter: String,
}

fn rows_for(report: &StudentReport) -> Vec<ExportRow> {
    let mut rows: Vec<ExportRow> = report
        .subjects
        .iter()
        .map(|s| ExportRow {
            student: report.name.clone(),
            subject: s.subject.clone(),
            grade_count: s.grades.len(),
            grades: s
                .grades
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            average: format!("{:.2}", s.average),
            letter: s.letter.to_string(),
        })
        .collect();

    rows.push(ExportRow {
        student: report.name.clone(),
        subject: OVERALL_SUBJECT.to_string(),
        grade_count: report.subjects.iter().map(|s| s.grades.len()).sum(),
        grades: String::new(),
        average: report
            .overall_average
            .map(|avg| format!("{:.2}", avg))
            .unwrap_or_default(),
        letter: report
            .overall_letter
            .map(|l| l.to_string())
            .unwrap_or_default(),
    });

    rows
}

/// All export rows, students in name order
pub fn export_rows(book: &Gradebook) -> Vec<ExportRow> {
    book.all_reports()
        .unwrap_or_default()
        .iter()
        .flat_map(rows_for)
        .collect()
}

pub fn write_csv<W: Write>(book: &Gradebook, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let rows = export_rows(book);

    for row in &rows {
        wtr.serialize(row).context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV output")?;

    Ok(rows.len())
}

pub fn export_csv(book: &Gradebook, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(book, file)
}
