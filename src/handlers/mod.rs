pub mod access;
pub mod announcements;
pub mod appointments;
pub mod contracts;
pub mod inquiries;
pub mod notifications;
pub mod otp;
pub mod reservations;
pub mod roles;

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::error::ApiError;
use crate::types::Role;

/// One legal step in an approval flow: the status it sets, the statuses it
/// may be applied from, and the roles allowed to perform it.
#[derive(Debug)]
pub struct TransitionRule {
    pub target: &'static str,
    pub expected: &'static [&'static str],
    pub allowed: &'static [Role],
    pub requires_reason: bool,
}

pub(crate) fn find_transition(
    rules: &'static [TransitionRule],
    target: &str,
) -> Option<&'static TransitionRule> {
    rules.iter().find(|rule| rule.target == target)
}

/// Required string field from a loose JSON body; absent becomes empty.
pub(crate) fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Optional string field; empty strings collapse to None.
pub(crate) fn opt_str_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn decimal_field(payload: &Value, key: &str) -> Option<Decimal> {
    payload.get(key).and_then(|v| match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(_) => serde_json::from_value(v.clone()).ok(),
        _ => None,
    })
}

pub(crate) fn date_field(payload: &Value, key: &str) -> Option<NaiveDate> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Reject a request whose required fields are missing or blank, before any
/// remote call is made.
pub(crate) fn require_fields(fields: &[(&str, &str)]) -> Result<(), ApiError> {
    let mut errors = HashMap::new();
    for (name, value) in fields {
        if value.trim().is_empty() {
            errors.insert((*name).to_string(), "This field is required".to_string());
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Missing required fields", Some(errors)))
    }
}

pub(crate) fn valid_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Build a `row_to_json` listing query with optional equality filters.
pub(crate) fn filtered_listing(
    table: &str,
    filters: &[(&str, Option<String>)],
    order_by: &str,
) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    for (column, value) in filters {
        if let Some(value) = value {
            args.push(value.clone());
            clauses.push(format!("{} = ${}", column, args.len()));
        }
    }

    let mut sql = format!("SELECT row_to_json(t) AS row FROM (SELECT * FROM {}", table);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {}) t", order_by));

    (sql, args)
}

pub(crate) async fn fetch_listing(
    pool: &PgPool,
    sql: &str,
    args: &[String],
) -> Result<Vec<Value>, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = query.bind(arg);
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| row.try_get("row").unwrap_or(Value::Null))
        .collect())
}

/// Fetch a single row as JSON by UUID key.
pub(crate) async fn fetch_row(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    id: uuid::Uuid,
) -> Result<Option<Value>, sqlx::Error> {
    let sql = format!(
        "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {} = $1) t",
        table, id_column
    );
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.map(|r| r.try_get("row").unwrap_or(Value::Null)))
}
