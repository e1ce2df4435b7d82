// 💾 Persistence Layer - JSON file + timestamped backups
//
// File shape: { "Student": { "Subject": [number, ...] } }
//
// save(): copy the previous file into the backup directory, then replace the
//         primary file with pretty-printed JSON via a staged rename.
// load(): missing file → empty gradebook, corrupt file → empty gradebook.
//
// Neither operation panics; failures are logged and handed back as values.

use crate::error::PersistenceError;
use crate::normalize::{normalize_name, normalize_subject};
use crate::store::{Grade, Gradebook, SubjectGrades};
use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Sortable timestamp embedded in backup file names
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Raw file layout before normalization and grade filtering
type RawRecords = BTreeMap<String, BTreeMap<String, Vec<Value>>>;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Load the gradebook. Never fails: unreadable or corrupt data yields an
    /// empty gradebook and a warning.
    pub fn load(&self) -> Gradebook {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No data file yet, starting empty");
                return Gradebook::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read data file, starting empty");
                return Gradebook::new();
            }
        };

        let raw: RawRecords = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Data file is corrupt, starting with an empty gradebook"
                );
                return Gradebook::new();
            }
        };

        let book = normalize_records(raw);
        info!(path = %self.path.display(), students = book.len(), "Loaded gradebook");
        book
    }

    /// Back up the current file (best effort), then overwrite it.
    pub fn save(&self, book: &Gradebook) -> Result<(), PersistenceError> {
        if self.path.exists() {
            match self.backup() {
                Ok(backup) => debug!(backup = %backup.display(), "Backed up previous data file"),
                Err(e) => warn!(error = %e, "Backup failed, saving anyway"),
            }
        }

        let json = serde_json::to_string_pretty(book).map_err(|e| {
            error!(error = %e, "Failed to serialize gradebook");
            PersistenceError::from(e)
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }

        // Write beside the target and rename over it, so a crash mid-write
        // never leaves a truncated data file
        let staging = self.staging_path();
        fs::write(&staging, json).map_err(|e| self.io_error(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            self.io_error(&self.path, e)
        })?;

        debug!(path = %self.path.display(), students = book.len(), "Saved gradebook");
        Ok(())
    }

    /// Copy the current primary file byte-for-byte into the backup directory.
    pub fn backup(&self) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| self.io_error(&self.backup_dir, e))?;

        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("gradebook");
        let timestamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();

        let mut source = File::open(&self.path).map_err(|e| self.io_error(&self.path, e))?;
        let (target, mut file) = self.create_backup_file(stem, &timestamp)?;

        if let Err(e) = io::copy(&mut source, &mut file) {
            let _ = fs::remove_file(&target);
            return Err(self.io_error(&target, e));
        }
        Ok(target)
    }

    /// Claim an unused backup name. Later backups within the same second get a
    /// zero-padded suffix so name order stays chronological.
    fn create_backup_file(&self, stem: &str, timestamp: &str) -> Result<(PathBuf, File), PersistenceError> {
        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{}_{}.json", stem, timestamp)
            } else {
                format!("{}_{}_{:03}.json", stem, timestamp, attempt)
            };
            let target = self.backup_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(file) => return Ok((target, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(self.io_error(&target, e)),
            }
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "gradebook.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Backup files, oldest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(&self.backup_dir, e)),
        };

        let mut backups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .collect();

        // Timestamps are zero-padded, so name order is chronological order
        backups.sort();
        Ok(backups)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> PersistenceError {
        error!(path = %path.display(), error = %source, "Persistence I/O failure");
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Re-key a raw file by normalized names, merging collisions and dropping
/// grade entries that are not numbers.
fn normalize_records(raw: RawRecords) -> Gradebook {
    let mut students: BTreeMap<String, SubjectGrades> = BTreeMap::new();

    for (raw_name, raw_subjects) in raw {
        let name = normalize_name(&raw_name);
        if name.is_empty() {
            warn!("Skipping record with a blank student name");
            continue;
        }
        if name != raw_name {
            debug!(from = %raw_name, to = %name, "Normalized student name on load");
        }

        let subjects = students.entry(name.clone()).or_default();

        for (raw_subject, values) in raw_subjects {
            let subject = normalize_subject(&raw_subject);
            if subject.is_empty() {
                warn!(student = %name, "Skipping subject with a blank name");
                continue;
            }

            let grades = subjects.entry(subject.clone()).or_default();
            for value in values {
                match value.as_f64().map(Grade::new) {
                    Some(Ok(grade)) => grades.push(grade),
                    _ => warn!(
                        student = %name,
                        subject = %subject,
                        value = %value,
                        "Dropping non-numeric grade"
                    ),
                }
            }
        }
    }

    Gradebook::from_records(students)
}
