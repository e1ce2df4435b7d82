// 📊 Computation Layer - averages, letter grades, rankings
//
// Pure reads over a Gradebook. Nothing here mutates the store.

use crate::error::GradeError;
use crate::normalize::{normalize_name, normalize_subject};
use crate::store::{student_not_found, Grade, Gradebook, SubjectGrades};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// LETTER GRADES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterGrade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    CPlus,
    C,
    D,
    F,
}

/// Inclusive lower bounds, highest band first
const BANDS: [(f64, LetterGrade); 8] = [
    (90.0, LetterGrade::APlus),
    (85.0, LetterGrade::A),
    (80.0, LetterGrade::AMinus),
    (75.0, LetterGrade::BPlus),
    (70.0, LetterGrade::B),
    (65.0, LetterGrade::CPlus),
    (60.0, LetterGrade::C),
    (50.0, LetterGrade::D),
];

impl LetterGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LetterGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Map an average to its letter. Values above 100 are still "A+"; NaN is "F".
pub fn letter_grade(average: f64) -> LetterGrade {
    BANDS
        .iter()
        .find(|(lower, _)| average >= *lower)
        .map(|(_, letter)| *letter)
        .unwrap_or(LetterGrade::F)
}

fn mean(grades: &[Grade]) -> Option<f64> {
    if grades.is_empty() {
        return None;
    }
    let count = grades.len() as f64;
    let sum: f64 = grades.iter().map(|g| g.value()).sum();
    if sum.is_finite() {
        return Some(sum / count);
    }
    // Sum overflowed; scale each grade first so the mean stays finite
    Some(grades.iter().map(|g| g.value() / count).sum())
}

fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

// ============================================================================
// STUDENT REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectSummary {
    pub subject: String,
    pub grades: Vec<Grade>,
    pub average: f64,
    pub letter: LetterGrade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    pub name: String,
    pub subjects: Vec<SubjectSummary>,
    /// None when the student has no grades at all
    pub overall_average: Option<f64>,
    pub overall_letter: Option<LetterGrade>,
}

impl StudentReport {
    fn build(name: &str, subjects: &SubjectGrades) -> Self {
        let mut summaries = Vec::new();
        let mut all_grades = Vec::new();

        // BTreeMap iteration is already sorted by subject
        for (subject, grades) in subjects {
            let Some(average) = mean(grades) else {
                continue;
            };

            all_grades.extend_from_slice(grades);
            summaries.push(SubjectSummary {
                subject: subject.clone(),
                grades: grades.clone(),
                average,
                letter: letter_grade(average),
            });
        }

        let overall_average = mean(&all_grades);

        StudentReport {
            name: name.to_string(),
            subjects: summaries,
            overall_average,
            overall_letter: overall_average.map(letter_grade),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    /// Rounded to two decimals
    pub average: f64,
    pub letter: LetterGrade,
    pub student_count: usize,
    pub grade_count: usize,
}

// ============================================================================
// RANKINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub rank: usize,
    pub name: String,
    pub average: f64,
    pub letter: LetterGrade,
}

/// Assign ranks to averages already sorted best-first.
///
/// Equal averages share the rank of their first occurrence; the next distinct
/// average takes its own 1-based position, so [90, 90, 80] ranks 1, 1, 3.
fn competition_ranks(sorted: Vec<(String, f64)>) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = Vec::with_capacity(sorted.len());

    for (index, (name, average)) in sorted.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.average == average => prev.rank,
            _ => index + 1,
        };

        entries.push(RankEntry {
            rank,
            name,
            letter: letter_grade(average),
            average,
        });
    }

    entries
}

// ============================================================================
// QUERIES
// ============================================================================

impl Gradebook {
    pub fn student_report(&self, name: &str) -> Result<StudentReport, GradeError> {
        let (key, subjects) = self
            .student(name)
            .ok_or_else(|| student_not_found(&normalize_name(name)))?;

        Ok(StudentReport::build(key, subjects))
    }

    /// Reports for every student, sorted by name
    pub fn all_reports(&self) -> Result<Vec<StudentReport>, GradeError> {
        if self.is_empty() {
            return Err(GradeError::not_found("No students found."));
        }

        Ok(self
            .students()
            .iter()
            .map(|(name, subjects)| StudentReport::build(name, subjects))
            .collect())
    }

    /// Mean of one subject's grades across every student
    pub fn subject_average(&self, subject: &str) -> Result<SubjectAverage, GradeError> {
        let subject = normalize_subject(subject);

        let mut collected: Vec<Grade> = Vec::new();
        let mut student_count = 0;

        for subjects in self.students().values() {
            if let Some(grades) = subjects.get(&subject) {
                if !grades.is_empty() {
                    student_count += 1;
                    collected.extend_from_slice(grades);
                }
            }
        }

        let average = mean(&collected).ok_or_else(|| {
            GradeError::not_found(format!("No grades found for {}.", subject))
        })?;
        let average = round2(average);

        Ok(SubjectAverage {
            subject,
            letter: letter_grade(average),
            average,
            student_count,
            grade_count: collected.len(),
        })
    }

    /// Class-wide average for every subject that has at least one grade
    pub fn subject_averages(&self) -> Vec<SubjectAverage> {
        let subjects: BTreeSet<&String> = self
            .students()
            .values()
            .flat_map(|subjects| subjects.keys())
            .collect();

        subjects
            .into_iter()
            .filter_map(|subject| self.subject_average(subject).ok())
            .collect()
    }

    /// Students ranked by overall average; students without grades are skipped
    pub fn rankings(&self) -> Result<Vec<RankEntry>, GradeError> {
        let mut averages: Vec<(String, f64)> = self
            .students()
            .iter()
            .filter_map(|(name, subjects)| {
                let all: Vec<Grade> = subjects.values().flatten().copied().collect();
                mean(&all).map(|avg| (name.clone(), avg))
            })
            .collect();

        if averages.is_empty() {
            return Err(GradeError::not_found("No students with grades to rank."));
        }

        averages.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        Ok(competition_ranks(averages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Gradebook {
        let mut book = Gradebook::new();
        book.set_grades("Kat", "Math", &[91.0, 99.0, 23.0]).unwrap();
        book.set_grades("Kat", "Science", &[10.0, 10.0, 0.0]).unwrap();
        book.set_grades("Kat", "Computing", &[91.0, 99.0, 23.0]).unwrap();
        book.set_grades("Dagim", "computing", &[91.0, 99.0, 24.0]).unwrap();
        book.set_grades("Dagim", "Math", &[83.0, 79.0, 90.0]).unwrap();
        book.set_grades("Emu", "Computing", &[10.0, 10.0, 0.0]).unwrap();
        book.set_grades("Emu", "Math", &[10.0, 10.0, 0.0]).unwrap();
        book.set_grades("Emu", "Science", &[10.0, 10.0, 0.0]).unwrap();
        book
    }

    #[test]
    fn test_letter_grade_boundaries() {
        assert_eq!(letter_grade(89.99), LetterGrade::A);
        assert_eq!(letter_grade(90.0), LetterGrade::APlus);
        assert_eq!(letter_grade(49.99), LetterGrade::F);
        assert_eq!(letter_grade(50.0), LetterGrade::D);

        assert_eq!(letter_grade(85.0).as_str(), "A");
        assert_eq!(letter_grade(80.0).as_str(), "A-");
        assert_eq!(letter_grade(75.0).as_str(), "B+");
        assert_eq!(letter_grade(70.0).as_str(), "B");
        assert_eq!(letter_grade(65.0).as_str(), "C+");
        assert_eq!(letter_grade(60.0).as_str(), "C");
        assert_eq!(letter_grade(120.0).as_str(), "A+");
        assert_eq!(letter_grade(-5.0).as_str(), "F");
        assert_eq!(letter_grade(f64::NAN).as_str(), "F");
    }

    #[test]
    fn test_report_scenario_accumulates_across_spellings() {
        let mut book = Gradebook::new();
        book.set_grades("kat ", "math", &[91.0, 99.0, 23.0]).unwrap();
        book.set_grades("Kat", "Math", &[50.0]).unwrap();

        let report = book.student_report("KAT").unwrap();
        assert_eq!(report.name, "Kat");
        assert_eq!(report.subjects.len(), 1);

        let math = &report.subjects[0];
        assert_eq!(math.subject, "Math");
        let grades: Vec<f64> = math.grades.iter().map(|g| g.value()).collect();
        assert_eq!(grades, vec![91.0, 99.0, 23.0, 50.0]);
        assert_eq!(math.average, 65.75);
        assert_eq!(math.letter.as_str(), "C+");
    }

    #[test]
    fn test_huge_grades_keep_a_finite_average() {
        let mut book = Gradebook::new();
        book.set_grades("Kat", "Math", &[1e308, 1e308]).unwrap();

        let report = book.student_report("Kat").unwrap();
        assert_eq!(report.subjects[0].average, 1e308);
        assert_eq!(report.overall_average, Some(1e308));

        let json = serde_json::to_value(&report).unwrap();
        assert!(!json["overall_average"].is_null());
        assert_eq!(json["overall_letter"], "A+");

        let math = book.subject_average("math").unwrap();
        assert!(math.average.is_finite());
        assert_eq!(math.average, 1e308);
    }

    #[test]
    fn test_report_overall_average_is_mean_of_all_grades() {
        let book = sample_book();
        let report = book.student_report("kat").unwrap();

        let (_, subjects) = book.student("Kat").unwrap();
        let all: Vec<f64> = subjects.values().flatten().map(|g| g.value()).collect();
        let expected = all.iter().sum::<f64>() / all.len() as f64;

        assert_eq!(report.overall_average, Some(expected));
        assert_eq!(report.overall_letter, Some(letter_grade(expected)));

        let names: Vec<&str> = report.subjects.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(names, vec!["Computing", "Math", "Science"]);
    }

    #[test]
    fn test_report_without_grades_has_null_overall() {
        let mut book = Gradebook::new();
        book.add_student("Emu").unwrap();
        book.set_grades("Emu", "Art", &[40.0]).unwrap();
        book.remove_grade("Emu", "Art", 40.0).unwrap();

        let report = book.student_report("emu").unwrap();
        assert!(report.subjects.is_empty());
        assert_eq!(report.overall_average, None);
        assert_eq!(report.overall_letter, None);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["overall_average"].is_null());
    }

    #[test]
    fn test_report_missing_student_is_not_found() {
        let book = sample_book();
        let err = book.student_report("ghost").unwrap_err();
        assert_eq!(err, GradeError::not_found("Student 'Ghost' not found."));
    }

    #[test]
    fn test_all_reports() {
        assert!(Gradebook::new().all_reports().is_err());

        let reports = sample_book().all_reports().unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Dagim", "Emu", "Kat"]);
    }

    #[test]
    fn test_subject_average_across_students() {
        let book = sample_book();
        let math = book.subject_average("  MATH").unwrap();

        // (91+99+23 + 83+79+90 + 10+10+0) / 9 = 485 / 9
        assert_eq!(math.subject, "Math");
        assert_eq!(math.average, 53.89);
        assert_eq!(math.letter.as_str(), "D");
        assert_eq!(math.student_count, 3);
        assert_eq!(math.grade_count, 9);
    }

    #[test]
    fn test_subject_average_without_takers_is_not_found() {
        let mut book = Gradebook::new();
        book.set_grades("Kat", "Math", &[90.0]).unwrap();

        let err = book.subject_average("science").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_subject_averages_cover_every_graded_subject() {
        let mut book = sample_book();
        book.set_grades("Emu", "Art", &[55.0]).unwrap();
        book.remove_grade("Emu", "Art", 55.0).unwrap();

        let averages = book.subject_averages();
        let subjects: Vec<&str> = averages.iter().map(|a| a.subject.as_str()).collect();

        assert_eq!(subjects, vec!["Computing", "Math", "Science"]);
        assert_eq!(averages[2].student_count, 2);
    }

    #[test]
    fn test_rankings_share_rank_on_ties_and_skip_next() {
        let mut book = Gradebook::new();
        book.set_grades("C", "Math", &[80.0]).unwrap();
        book.set_grades("B", "Math", &[90.0]).unwrap();
        book.set_grades("A", "Math", &[95.0, 85.0]).unwrap();

        let ranks: Vec<(String, usize)> = book
            .rankings()
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.rank))
            .collect();

        assert_eq!(
            ranks,
            vec![
                ("A".to_string(), 1),
                ("B".to_string(), 1),
                ("C".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_rankings_exclude_students_without_grades() {
        let mut book = sample_book();
        book.add_student("Newcomer").unwrap();

        let rankings = book.rankings().unwrap();
        assert_eq!(rankings.len(), 3);
        assert!(rankings.iter().all(|e| e.name != "Newcomer"));
        assert_eq!(rankings[0].name, "Dagim");
        assert_eq!(rankings[0].rank, 1);
    }

    #[test]
    fn test_rankings_without_data_is_not_found() {
        let mut book = Gradebook::new();
        assert!(book.rankings().is_err());

        book.add_student("Kat").unwrap();
        assert_eq!(book.rankings().unwrap_err().kind(), "not_found");
    }
}
