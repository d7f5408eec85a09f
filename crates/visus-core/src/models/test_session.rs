//! Clinical test session model

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::entity::{boolean, optional_integer, text, Entity};
use super::SyncId;
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnType};

/// Highest score a single eye can receive
pub const MAX_EYE_SCORE: i64 = 100;

/// One clinical test performed for a customer.
///
/// The customer is referenced by sync id so the link survives on every
/// destination, where local ids mean nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSession {
    pub customer_sync_id: SyncId,
    /// Test protocol name, e.g. `visual_acuity`
    pub test_kind: String,
    /// When the test was performed (Unix ms)
    pub performed_at: i64,
    pub left_eye_score: Option<i64>,
    pub right_eye_score: Option<i64>,
    pub completed: bool,
}

impl TestSession {
    /// Start a session performed now
    #[must_use]
    pub fn new(customer_sync_id: SyncId, test_kind: impl Into<String>) -> Self {
        Self {
            customer_sync_id,
            test_kind: test_kind.into(),
            performed_at: chrono::Utc::now().timestamp_millis(),
            left_eye_score: None,
            right_eye_score: None,
            completed: false,
        }
    }

    /// Record both eye scores and mark the session completed
    #[must_use]
    pub const fn complete(mut self, left: Option<i64>, right: Option<i64>) -> Self {
        self.left_eye_score = left;
        self.right_eye_score = right;
        self.completed = true;
        self
    }
}

impl Entity for TestSession {
    const TABLE: &'static str = "test_sessions";

    fn columns() -> Vec<Column> {
        vec![
            Column::new("customer_sync_id", ColumnType::Text).not_null(),
            Column::new("test_kind", ColumnType::Text).not_null(),
            Column::new("performed_at", ColumnType::Timestamp).not_null(),
            Column::new("left_eye_score", ColumnType::Integer),
            Column::new("right_eye_score", ColumnType::Integer),
            Column::new("completed", ColumnType::Boolean)
                .not_null()
                .default_value("0"),
        ]
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.customer_sync_id.as_str()),
            text(&self.test_kind),
            Value::Integer(self.performed_at),
            optional_integer(self.left_eye_score),
            optional_integer(self.right_eye_score),
            boolean(self.completed),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            customer_sync_id: row.get("customer_sync_id")?,
            test_kind: row.get("test_kind")?,
            performed_at: row.get("performed_at")?,
            left_eye_score: row.get("left_eye_score")?,
            right_eye_score: row.get("right_eye_score")?,
            completed: row.get::<_, i64>("completed")? != 0,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.test_kind.trim().is_empty() {
            return Err(Error::InvalidInput("test kind is required".into()));
        }
        for score in [self.left_eye_score, self.right_eye_score].into_iter().flatten() {
            if !(0..=MAX_EYE_SCORE).contains(&score) {
                return Err(Error::InvalidInput(format!(
                    "eye score {score} outside 0..={MAX_EYE_SCORE}"
                )));
            }
        }
        Ok(())
    }
}
