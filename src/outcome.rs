// Structured outcomes: { "success": bool, "message": string, ...data }
//
// Every service operation produces one of these instead of an error, so the
// HTTP routes and the CLI can map them onto status codes / exit codes.

use crate::error::GradeError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,

    /// "validation" or "not_found" when success is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,

    /// Set when the operation succeeded but could not be saved to disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: None,
            warning: None,
            data: Map::new(),
        }
    }

    pub fn failure(err: &GradeError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            kind: Some(err.kind()),
            warning: None,
            data: Map::new(),
        }
    }

    /// A no-op that is reported as unsuccessful without being an error
    /// (e.g. adding a student who already exists)
    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }

    /// Spread the fields of `data` into the outcome. Values that do not
    /// serialize to an object land under a `data` key.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(Value::Object(map)) => self.data.extend(map),
            Ok(other) => {
                self.data.insert("data".to_string(), other);
            }
            Err(e) => warn!(error = %e, "Failed to serialize outcome data"),
        }
        self
    }

    pub fn with_field<T: Serialize>(mut self, key: &str, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.data.insert(key.to_string(), v);
            }
            Err(e) => warn!(error = %e, key, "Failed to serialize outcome field"),
        }
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == Some("not_found")
    }

    pub fn is_validation(&self) -> bool {
        self.kind == Some("validation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        average: f64,
    }

    #[test]
    fn test_data_is_spread_into_the_outcome() {
        let outcome = Outcome::ok("Report for Kat").with_data(&Sample {
            name: "Kat".to_string(),
            average: 65.75,
        });

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": true,
                "message": "Report for Kat",
                "name": "Kat",
                "average": 65.75
            })
        );
    }

    #[test]
    fn test_failure_carries_kind() {
        let outcome = Outcome::failure(&GradeError::not_found("Student 'Kat' not found."));
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], json!(false));
        assert_eq!(value["kind"], json!("not_found"));
        assert!(outcome.is_not_found());
        assert!(!outcome.is_validation());
    }

    #[test]
    fn test_non_object_data_and_warning() {
        let outcome = Outcome::ok("listed")
            .with_data(&vec![1, 2])
            .with_warning("disk full");
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["data"], json!([1, 2]));
        assert_eq!(value["warning"], json!("disk full"));
        assert!(Outcome::declined("already there").kind.is_none());
    }
}
