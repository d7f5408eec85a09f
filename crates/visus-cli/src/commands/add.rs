use std::path::Path;

use chrono::NaiveDate;
use visus_core::{Customer, RecordStore, SyncId, TestSession};

use crate::commands::common::{normalize_required, open_database};
use crate::error::CliError;

pub fn run_add_customer(
    first_name: &str,
    last_name: &str,
    birth_date: Option<NaiveDate>,
    email: Option<&str>,
    notes: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut customer = Customer::new(
        normalize_required(first_name, "First name")?,
        normalize_required(last_name, "Last name")?,
    );
    if let Some(birth_date) = birth_date {
        customer = customer.with_birth_date(birth_date);
    }
    if let Some(email) = email {
        customer = customer.with_email(email);
    }
    if let Some(notes) = notes {
        customer = customer.with_notes(notes);
    }

    let db = open_database(db_path)?;
    let record = RecordStore::<Customer>::open(&db)?.insert(customer)?;

    println!("{}", record.sync_id());
    Ok(())
}

pub fn run_add_session(
    customer: SyncId,
    kind: &str,
    left: Option<i64>,
    right: Option<i64>,
    completed: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let customers = RecordStore::<Customer>::open(&db)?;
    if customers.get_by_sync_id(customer)?.is_none() {
        return Err(CliError::CustomerNotFound(customer.to_string()));
    }

    let mut session = TestSession::new(customer, normalize_required(kind, "Test kind")?);
    session.left_eye_score = left;
    session.right_eye_score = right;
    session.completed = completed;

    let record = RecordStore::<TestSession>::open(&db)?.insert(session)?;

    println!("{}", record.sync_id());
    Ok(())
}
