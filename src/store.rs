// 📚 Grade Record Store
//
// Student name → subject name → ordered grades.
//
// Keys are always stored normalized (see normalize.rs) and kept in BTreeMaps so
// every listing, report and saved file comes out in the same order. Grades are
// validated on the way in; the store itself only ever holds finite numbers.

use crate::error::GradeError;
use crate::normalize::{normalize_name, normalize_subject};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Largest magnitude at which every integer is exactly representable in f64
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

// ============================================================================
// GRADE
// ============================================================================

/// A single numeric grade (always finite)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Grade(f64);

impl Grade {
    pub fn new(value: f64) -> Result<Self, GradeError> {
        if value.is_finite() {
            Ok(Grade(value))
        } else {
            Err(GradeError::validation(format!(
                "Grade must be a number, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    fn as_integer(&self) -> Option<i64> {
        if self.0.fract() == 0.0 && self.0.abs() <= MAX_EXACT_INTEGER {
            Some(self.0 as i64)
        } else {
            None
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            Some(i) => write!(f, "{}", i),
            None => write!(f, "{}", self.0),
        }
    }
}

// Integral grades are written as JSON integers: [91, 99, 23] rather than
// [91.0, 99.0, 23.0].
impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(i) => serializer.serialize_i64(i),
            None => serializer.serialize_f64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Grade::new(value).map_err(serde::de::Error::custom)
    }
}

/// Parse the `grades` field of a request: a number or a list of numbers.
///
/// Anything else (strings, booleans, null, nested lists, an empty list) is a
/// validation error.
pub fn parse_grades(value: &Value) -> Result<Vec<f64>, GradeError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    if items.is_empty() {
        return Err(GradeError::validation("At least one grade is required"));
    }

    items
        .into_iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                GradeError::validation(format!("Grade must be a number, got {}", item))
            })
        })
        .collect()
}

// ============================================================================
// OPERATION RESULTS
// ============================================================================

/// Subject name → grades, in insertion order
pub type SubjectGrades = BTreeMap<String, Vec<Grade>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAdded {
    pub name: String,
    /// false when the student was already on record (no-op)
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradesAdded {
    pub name: String,
    pub subject: String,
    pub added: Vec<Grade>,
    /// Full grade list for the subject after the append
    pub grades: Vec<Grade>,
    pub student_created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRemoved {
    pub name: String,
    pub subject: String,
    pub grade: Grade,
    pub remaining: Vec<Grade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRemoval {
    pub name: String,
    pub removed: bool,
}

// ============================================================================
// GRADEBOOK
// ============================================================================

/// The in-memory store. One instance per service; no global state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gradebook {
    students: BTreeMap<String, SubjectGrades>,
}

impl Gradebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-normalized records (used by the loader)
    pub(crate) fn from_records(students: BTreeMap<String, SubjectGrades>) -> Self {
        Gradebook { students }
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.students.contains_key(&normalize_name(name))
    }

    /// All records, sorted by student name
    pub fn students(&self) -> &BTreeMap<String, SubjectGrades> {
        &self.students
    }

    /// One student's record, looked up by any spelling of the name
    pub fn student(&self, name: &str) -> Option<(&str, &SubjectGrades)> {
        self.students
            .get_key_value(&normalize_name(name))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Case-insensitive substring search over student names
    pub fn search_students(&self, query: &str) -> Vec<String> {
        let needle = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

        self.students
            .keys()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn add_student(&mut self, name: &str) -> Result<StudentAdded, GradeError> {
        let name = required_key(normalize_name(name), "Student name")?;

        if self.students.contains_key(&name) {
            return Ok(StudentAdded { name, created: false });
        }

        self.students.insert(name.clone(), SubjectGrades::new());
        Ok(StudentAdded { name, created: true })
    }

    /// Append grades to a subject, creating the student and subject on demand.
    ///
    /// Every value is validated before the store is touched: one bad grade
    /// rejects the whole call.
    pub fn set_grades(
        &mut self,
        name: &str,
        subject: &str,
        grades: &[f64],
    ) -> Result<GradesAdded, GradeError> {
        let name = required_key(normalize_name(name), "Student name")?;
        let subject = required_key(normalize_subject(subject), "Subject")?;

        if grades.is_empty() {
            return Err(GradeError::validation("At least one grade is required"));
        }
        let added = grades
            .iter()
            .map(|g| Grade::new(*g))
            .collect::<Result<Vec<_>, _>>()?;

        let student_created = !self.students.contains_key(&name);
        let subjects = self.students.entry(name.clone()).or_default();
        let list = subjects.entry(subject.clone()).or_default();
        list.extend_from_slice(&added);

        Ok(GradesAdded {
            grades: list.clone(),
            name,
            subject,
            added,
            student_created,
        })
    }

    /// Remove the first grade equal to `grade`. An emptied subject is kept.
    pub fn remove_grade(
        &mut self,
        name: &str,
        subject: &str,
        grade: f64,
    ) -> Result<GradeRemoved, GradeError> {
        let name = normalize_name(name);
        let subject = normalize_subject(subject);

        let subjects = self
            .students
            .get_mut(&name)
            .ok_or_else(|| student_not_found(&name))?;

        let list = subjects.get_mut(&subject).ok_or_else(|| {
            GradeError::not_found(format!("{} is not taking {}.", name, subject))
        })?;

        let position = list
            .iter()
            .position(|g| g.value() == grade)
            .ok_or_else(|| {
                GradeError::not_found(format!(
                    "The grade {} does not exist in {} for {}.",
                    grade, subject, name
                ))
            })?;

        let removed = list.remove(position);

        Ok(GradeRemoved {
            remaining: list.clone(),
            name,
            subject,
            grade: removed,
        })
    }

    pub fn remove_student(&mut self, name: &str) -> Result<String, GradeError> {
        let name = normalize_name(name);

        match self.students.remove(&name) {
            Some(_) => Ok(name),
            None => Err(student_not_found(&name)),
        }
    }

    /// Remove several students; each missing name is reported on its own.
    pub fn remove_students<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<StudentRemoval> {
        names
            .iter()
            .map(|raw| match self.remove_student(raw.as_ref()) {
                Ok(name) => StudentRemoval { name, removed: true },
                Err(_) => StudentRemoval {
                    name: normalize_name(raw.as_ref()),
                    removed: false,
                },
            })
            .collect()
    }
}

pub(crate) fn student_not_found(name: &str) -> GradeError {
    GradeError::not_found(format!("Student '{}' not found.", name))
}

fn required_key(key: String, what: &str) -> Result<String, GradeError> {
    if key.is_empty() {
        Err(GradeError::validation(format!("{} is required", what)))
    } else {
        Ok(key)
    }
}
