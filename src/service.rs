// Service facade: one Gradebook + its JSON file.
//
// Mutations run against the in-memory store and are flushed to disk right
// after; a failed flush keeps the in-memory change and adds a warning to the
// outcome. Reads never touch the disk.

use crate::error::GradeError;
use crate::outcome::Outcome;
use crate::persistence::JsonFileStore;
use crate::store::Gradebook;
use tracing::{info, warn};

pub struct GradebookService {
    book: Gradebook,
    storage: JsonFileStore,
}

impl GradebookService {
    /// Load the gradebook from `storage` (empty when missing or corrupt)
    pub fn open(storage: JsonFileStore) -> Self {
        let book = storage.load();
        Self { book, storage }
    }

    pub fn book(&self) -> &Gradebook {
        &self.book
    }

    pub fn storage(&self) -> &JsonFileStore {
        &self.storage
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    pub fn add_student(&mut self, name: &str) -> Outcome {
        match self.book.add_student(name) {
            Ok(added) if added.created => {
                info!(student = %added.name, "Student added");
                let outcome = Outcome::ok(format!("Student '{}' added successfully.", added.name))
                    .with_field("name", &added.name);
                self.flush(outcome)
            }
            Ok(added) => Outcome::declined(format!("Student '{}' already exists.", added.name))
                .with_field("name", &added.name),
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn set_grades(&mut self, name: &str, subject: &str, grades: &[f64]) -> Outcome {
        match self.book.set_grades(name, subject, grades) {
            Ok(update) => {
                info!(
                    student = %update.name,
                    subject = %update.subject,
                    count = update.added.len(),
                    created = update.student_created,
                    "Grades added"
                );
                let mut message = format!(
                    "Added {} grade(s) to {} for {}.",
                    update.added.len(),
                    update.subject,
                    update.name
                );
                if update.student_created {
                    message.push_str(&format!(" Student '{}' was created.", update.name));
                }
                self.flush(Outcome::ok(message).with_data(&update))
            }
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn remove_grade(&mut self, name: &str, subject: &str, grade: f64) -> Outcome {
        match self.book.remove_grade(name, subject, grade) {
            Ok(removed) => {
                info!(student = %removed.name, subject = %removed.subject, grade = %removed.grade, "Grade removed");
                let mut message = format!(
                    "Grade {} removed from {} for {}.",
                    removed.grade, removed.subject, removed.name
                );
                if removed.remaining.is_empty() {
                    message.push_str(&format!(
                        " {} now has no grades for {}.",
                        removed.name, removed.subject
                    ));
                }
                self.flush(Outcome::ok(message).with_data(&removed))
            }
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn remove_student(&mut self, name: &str) -> Outcome {
        match self.book.remove_student(name) {
            Ok(name) => {
                info!(student = %name, "Student removed");
                let outcome =
                    Outcome::ok(format!("Student '{}' removed.", name)).with_field("name", &name);
                self.flush(outcome)
            }
            Err(e) => Outcome::failure(&e),
        }
    }

    /// Batch removal; missing names are listed, never fatal
    pub fn remove_students<S: AsRef<str>>(&mut self, names: &[S]) -> Outcome {
        let results = self.book.remove_students(names);
        let removed = results.iter().filter(|r| r.removed).count();

        for missing in results.iter().filter(|r| !r.removed) {
            warn!(student = %missing.name, "Student not found for removal");
        }

        let outcome = Outcome::ok(format!(
            "Removed {} of {} student(s).",
            removed,
            results.len()
        ))
        .with_field("results", &results);

        if removed > 0 {
            self.flush(outcome)
        } else {
            outcome
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn student_report(&self, name: &str) -> Outcome {
        match self.book.student_report(name) {
            Ok(report) => Outcome::ok(format!("Report for {}", report.name)).with_data(&report),
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn all_reports(&self) -> Outcome {
        match self.book.all_reports() {
            Ok(reports) => Outcome::ok(format!("Found {} report(s).", reports.len()))
                .with_field("reports", &reports),
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn subject_average(&self, subject: &str) -> Outcome {
        match self.book.subject_average(subject) {
            Ok(avg) => Outcome::ok(format!(
                "The average grade for {} is {:.2}.",
                avg.subject, avg.average
            ))
            .with_data(&avg),
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn rankings(&self) -> Outcome {
        match self.book.rankings() {
            Ok(rankings) => Outcome::ok(format!("Ranked {} student(s).", rankings.len()))
                .with_field("rankings", &rankings),
            Err(e) => Outcome::failure(&e),
        }
    }

    pub fn search(&self, query: &str) -> Outcome {
        let matches = self.book.search_students(query);
        if matches.is_empty() {
            return Outcome::failure(&GradeError::not_found(
                "Student not found/not in the record.",
            ));
        }
        Outcome::ok(format!("Found {} student(s).", matches.len())).with_field("matches", &matches)
    }

    fn flush(&self, outcome: Outcome) -> Outcome {
        match self.storage.save(&self.book) {
            Ok(()) => outcome,
            Err(e) => outcome.with_warning(format!("Change kept in memory but not saved: {}", e)),
        }
    }
}
