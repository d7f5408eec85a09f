//! Customer model

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::entity::{optional_text, text, Entity};
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnType};
use crate::util::normalize_text_option;

/// A person whose tests are recorded on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
    /// Free-form operator notes
    pub notes: Option<String>,
}

impl Customer {
    /// Create a customer with only the required fields set
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_date: None,
            email: None,
            notes: None,
        }
    }

    #[must_use]
    pub const fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = normalize_text_option(Some(email.into()));
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = normalize_text_option(Some(notes.into()));
        self
    }

    /// "First Last"
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";

    fn columns() -> Vec<Column> {
        vec![
            Column::new("first_name", ColumnType::Text).not_null(),
            Column::new("last_name", ColumnType::Text).not_null(),
            Column::new("birth_date", ColumnType::Date),
            Column::new("email", ColumnType::Text),
            Column::new("notes", ColumnType::Text),
        ]
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.first_name),
            text(&self.last_name),
            self.birth_date.map_or(Value::Null, |date| {
                Value::Text(date.format("%Y-%m-%d").to_string())
            }),
            optional_text(self.email.as_deref()),
            optional_text(self.notes.as_deref()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            birth_date: row.get("birth_date")?,
            email: row.get("email")?,
            notes: row.get("notes")?,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "customer first and last name are required".into(),
            ));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(Error::InvalidInput(format!("invalid email address '{email}'")));
            }
        }
        Ok(())
    }
}
