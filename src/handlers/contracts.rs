use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::CasOutcome;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::receipts;
use crate::state::AppState;
use crate::types::Role;

use super::{
    date_field, decimal_field, fetch_listing, fetch_row, filtered_listing, opt_str_field,
    require_fields, str_field, valid_email,
};

const CONTRACT_STATUSES: &[&str] = &["active", "completed", "terminated"];

#[derive(Debug, Deserialize)]
pub struct ContractQuery {
    pub client_email: Option<String>,
    pub status: Option<String>,
}

/// GET /api/contracts - list contracts with optional filters
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ContractQuery>,
) -> Result<Json<Value>, ApiError> {
    let (sql, args) = filtered_listing(
        "contracts",
        &[
            ("client_email", query.client_email),
            ("status", query.status),
        ],
        "created_at DESC",
    );
    let data = fetch_listing(&state.db, &sql, &args).await?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /api/contracts/:id
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let row = fetch_row(&state.db, "contracts", "contract_id", id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("contract {} not found", id)))?;

    Ok(Json(json!({ "success": true, "data": row })))
}

/// Equal installments rounded to cents; the final installment absorbs the
/// rounding remainder so the schedule sums exactly to the contract total.
/// Due dates step one calendar month at a time.
pub fn build_schedule(
    total: Decimal,
    count: i32,
    first_due: NaiveDate,
) -> Vec<(i32, Decimal, NaiveDate)> {
    let count = count.max(1);
    let per = (total / Decimal::from(count)).round_dp(2);

    let mut rows = Vec::with_capacity(count as usize);
    let mut scheduled = Decimal::ZERO;
    for n in 1..=count {
        let amount = if n == count { total - scheduled } else { per };
        scheduled += amount;
        let due = first_due
            .checked_add_months(Months::new((n - 1) as u32))
            .unwrap_or(first_due);
        rows.push((n, amount, due));
    }
    rows
}

/// POST /api/contracts - open a contract and generate its payment schedule
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let property_name = str_field(&payload, "property_name");
    let owner_name = str_field(&payload, "owner_name");
    let owner_email = str_field(&payload, "owner_email");
    let client_name = str_field(&payload, "client_name");
    let client_email = str_field(&payload, "client_email");

    require_fields(&[
        ("property_name", &property_name),
        ("owner_name", &owner_name),
        ("owner_email", &owner_email),
        ("client_name", &client_name),
        ("client_email", &client_email),
    ])?;
    if !valid_email(&client_email) || !valid_email(&owner_email) {
        return Err(ApiError::bad_request("owner_email and client_email must be valid email addresses"));
    }

    let total = decimal_field(&payload, "total_amount")
        .filter(|amount| *amount > Decimal::ZERO)
        .ok_or_else(|| ApiError::bad_request("total_amount must be a positive amount"))?;
    let installments = payload
        .get("installments")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if !(1..=360).contains(&installments) {
        return Err(ApiError::bad_request("installments must be between 1 and 360"));
    }
    let first_due = date_field(&payload, "first_due_date")
        .ok_or_else(|| ApiError::bad_request("first_due_date must be a YYYY-MM-DD date"))?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO contracts \
         (contract_id, property_name, owner_name, owner_email, owner_phone, \
          client_name, client_email, total_amount, balance, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, 'active', $9, $9)",
    )
    .bind(id)
    .bind(&property_name)
    .bind(&owner_name)
    .bind(&owner_email)
    .bind(opt_str_field(&payload, "owner_phone"))
    .bind(&client_name)
    .bind(&client_email)
    .bind(total)
    .bind(now)
    .execute(&state.db)
    .await?;

    let schedule = build_schedule(total, installments as i32, first_due);
    for (number, amount, due) in &schedule {
        sqlx::query(
            "INSERT INTO payment_schedules \
             (schedule_id, contract_id, installment_number, amount, due_date, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6)",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(number)
        .bind(amount)
        .bind(due)
        .bind(now)
        .execute(&state.db)
        .await?;
    }

    tracing::info!(contract = %id, installments = schedule.len(), by = %user.email, "contract opened");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "contract_id": id,
                "status": "active",
                "total_amount": total,
                "installments": schedule.len(),
            },
            "message": "contract created",
        })),
    ))
}

/// PUT /api/contracts/:id - update contract details
///
/// Owner fields are deliberately absent here; ownership moves only through
/// the transfer endpoint so the history snapshot is never skipped.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let mut sets = Vec::new();
    let mut args: Vec<String> = Vec::new();

    for column in ["property_name", "client_name", "client_email"] {
        if let Some(value) = opt_str_field(&payload, column) {
            args.push(value);
            sets.push(format!("{} = ${}", column, args.len() + 1));
        }
    }
    if let Some(status) = opt_str_field(&payload, "status") {
        if !CONTRACT_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::bad_request(format!(
                "invalid status '{}'; valid values: {}",
                status,
                CONTRACT_STATUSES.join(", ")
            )));
        }
        args.push(status);
        sets.push(format!("status = ${}", args.len() + 1));
    }

    if sets.is_empty() {
        return Err(ApiError::bad_request("no updatable fields provided"));
    }

    let sql = format!(
        "UPDATE contracts SET {}, updated_at = now() WHERE contract_id = $1",
        sets.join(", ")
    );
    let mut query = sqlx::query(&sql).bind(id);
    for arg in &args {
        query = query.bind(arg);
    }
    let result = query.execute(&state.db).await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("contract {} not found", id)));
    }

    Ok(Json(json!({
        "success": true,
        "data": { "contract_id": id },
        "message": "contract updated",
    })))
}

/// DELETE /api/contracts/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    if user.role != Role::Admin {
        return Err(ApiError::forbidden(format!(
            "role '{}' may not delete contracts",
            user.role
        )));
    }

    let result = sqlx::query("DELETE FROM contracts WHERE contract_id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("contract {} not found", id)));
    }

    Ok(Json(json!({
        "success": true,
        "message": "contract deleted",
    })))
}

/// GET /api/contracts/:id/schedule - installments in order
pub async fn schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let rows = sqlx::query(
        "SELECT row_to_json(t) AS row FROM \
         (SELECT * FROM payment_schedules WHERE contract_id = $1 \
          ORDER BY installment_number ASC) t",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .iter()
        .map(|row| row.try_get("row").unwrap_or(Value::Null))
        .collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

/// PATCH /api/contracts/:id/schedule/:installment - settle an installment
pub async fn pay_installment(
    State(state): State<AppState>,
    Path((id, installment)): Path<(Uuid, i32)>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let row: Option<(Uuid, Decimal)> = sqlx::query_as(
        "SELECT schedule_id, amount FROM payment_schedules \
         WHERE contract_id = $1 AND installment_number = $2",
    )
    .bind(id)
    .bind(installment)
    .fetch_optional(&state.db)
    .await?;
    let (schedule_id, amount) = row.ok_or_else(|| {
        ApiError::not_found(format!("installment {} of contract {} not found", installment, id))
    })?;

    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE payment_schedules SET status = 'paid', paid_at = $2 \
         WHERE schedule_id = $1 AND status IN ('pending', 'overdue')",
    )
    .bind(schedule_id)
    .bind(now)
    .execute(&state.db)
    .await?;

    if !CasOutcome::from_rows_affected(result.rows_affected()).applied() {
        return Err(ApiError::state_conflict(format!(
            "installment {} of contract {} is already paid",
            installment, id
        )));
    }

    let receipt = receipts::receipt_number(id, now);
    sqlx::query(
        "INSERT INTO payment_transactions \
         (payment_id, contract_id, schedule_id, amount, receipt_number, payment_method, paid_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(schedule_id)
    .bind(amount)
    .bind(&receipt)
    .bind(opt_str_field(&payload, "payment_method").unwrap_or_else(|| "cash".to_string()))
    .bind(now)
    .execute(&state.db)
    .await?;

    recompute_balance(&state.db, id).await?;

    tracing::info!(contract = %id, installment, by = %user.email, "installment paid");

    Ok(Json(json!({
        "success": true,
        "data": {
            "contract_id": id,
            "installment_number": installment,
            "amount": amount,
            "receipt_number": receipt,
        },
    })))
}

/// GET /api/contracts/:id/transactions - payment log, newest first
pub async fn transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let rows = sqlx::query(
        "SELECT row_to_json(t) AS row FROM \
         (SELECT * FROM payment_transactions WHERE contract_id = $1 \
          ORDER BY paid_at DESC) t",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .iter()
        .map(|row| row.try_get("row").unwrap_or(Value::Null))
        .collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

/// POST /api/contracts/:id/transactions - record an out-of-schedule payment
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let amount = decimal_field(&payload, "amount")
        .filter(|amount| *amount > Decimal::ZERO)
        .ok_or_else(|| ApiError::bad_request("amount must be a positive amount"))?;

    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT contract_id FROM contracts WHERE contract_id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    if exists.is_none() {
        return Err(ApiError::not_found(format!("contract {} not found", id)));
    }

    let now = Utc::now();
    let receipt = receipts::receipt_number(id, now);
    sqlx::query(
        "INSERT INTO payment_transactions \
         (payment_id, contract_id, schedule_id, amount, receipt_number, payment_method, paid_at) \
         VALUES ($1, $2, NULL, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(amount)
    .bind(&receipt)
    .bind(opt_str_field(&payload, "payment_method").unwrap_or_else(|| "cash".to_string()))
    .bind(now)
    .execute(&state.db)
    .await?;

    recompute_balance(&state.db, id).await?;

    tracing::info!(contract = %id, %amount, by = %user.email, "payment recorded");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": { "contract_id": id, "amount": amount, "receipt_number": receipt },
        })),
    ))
}

/// Recompute the contract balance from its payment log. Runs as its own
/// statement after the payment write; a crash in between leaves the balance
/// stale until the next recompute.
async fn recompute_balance(pool: &PgPool, contract_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE contracts SET balance = total_amount - COALESCE( \
           (SELECT SUM(amount) FROM payment_transactions WHERE contract_id = $1), 0), \
         updated_at = $2 WHERE contract_id = $1",
    )
    .bind(contract_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// POST /api/contracts/:id/transfer - move the contract to a new owner
pub async fn transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let owner_name = str_field(&payload, "owner_name");
    let owner_email = str_field(&payload, "owner_email");
    require_fields(&[("owner_name", &owner_name), ("owner_email", &owner_email)])?;
    if !valid_email(&owner_email) {
        return Err(ApiError::bad_request("owner_email is not a valid email address"));
    }

    let current: Option<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT owner_name, owner_email, owner_phone FROM contracts WHERE contract_id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let (prev_name, prev_email, prev_phone) =
        current.ok_or_else(|| ApiError::not_found(format!("contract {} not found", id)))?;

    let now = Utc::now();
    // Snapshot before the update so the change is always revertible.
    sqlx::query(
        "INSERT INTO transfer_history \
         (transfer_id, contract_id, previous_owner_name, previous_owner_email, \
          previous_owner_phone, transferred_by, transferred_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(&prev_name)
    .bind(&prev_email)
    .bind(&prev_phone)
    .bind(user.user_id)
    .bind(now)
    .execute(&state.db)
    .await?;

    sqlx::query(
        "UPDATE contracts SET owner_name = $2, owner_email = $3, owner_phone = $4, \
         updated_at = $5 WHERE contract_id = $1",
    )
    .bind(id)
    .bind(&owner_name)
    .bind(&owner_email)
    .bind(opt_str_field(&payload, "owner_phone"))
    .bind(now)
    .execute(&state.db)
    .await?;

    tracing::info!(contract = %id, from = %prev_email, to = %owner_email, "ownership transferred");

    Ok(Json(json!({
        "success": true,
        "data": { "contract_id": id, "owner_name": owner_name, "owner_email": owner_email },
        "message": "ownership transferred",
    })))
}

/// POST /api/contracts/:id/transfer/revert - restore the previous owner
pub async fn revert_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let snapshot: Option<(Uuid, String, String, Option<String>)> = sqlx::query_as(
        "SELECT transfer_id, previous_owner_name, previous_owner_email, previous_owner_phone \
         FROM transfer_history WHERE contract_id = $1 ORDER BY transferred_at DESC LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let (transfer_id, prev_name, prev_email, prev_phone) = snapshot
        .ok_or_else(|| ApiError::not_found(format!("no ownership transfer to revert for contract {}", id)))?;

    let result = sqlx::query(
        "UPDATE contracts SET owner_name = $2, owner_email = $3, owner_phone = $4, \
         updated_at = $5 WHERE contract_id = $1",
    )
    .bind(id)
    .bind(&prev_name)
    .bind(&prev_email)
    .bind(&prev_phone)
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("contract {} not found", id)));
    }

    // The revert has applied; consuming the snapshot is best-effort.
    if let Err(e) = sqlx::query("DELETE FROM transfer_history WHERE transfer_id = $1")
        .bind(transfer_id)
        .execute(&state.db)
        .await
    {
        tracing::warn!("contract {} transfer-history cleanup failed (non-critical): {}", id, e);
    }

    Ok(Json(json!({
        "success": true,
        "data": { "contract_id": id, "owner_name": prev_name, "owner_email": prev_email },
        "message": "ownership change reverted",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn schedule_sums_exactly_to_total() {
        let total = Decimal::from_str("1000.00").unwrap();
        let rows = build_schedule(total, 3, date("2025-01-31"));
        assert_eq!(rows.len(), 3);
        let sum: Decimal = rows.iter().map(|(_, amount, _)| *amount).sum();
        assert_eq!(sum, total);
        // 1000 / 3 rounds to 333.33; the last installment absorbs the difference.
        assert_eq!(rows[0].1, Decimal::from_str("333.33").unwrap());
        assert_eq!(rows[2].1, Decimal::from_str("333.34").unwrap());
    }

    #[test]
    fn schedule_numbers_ascend_from_one() {
        let rows = build_schedule(Decimal::from(1200), 4, date("2025-06-01"));
        let numbers: Vec<i32> = rows.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn due_dates_step_by_calendar_month() {
        let rows = build_schedule(Decimal::from(300), 3, date("2025-01-15"));
        assert_eq!(rows[0].2, date("2025-01-15"));
        assert_eq!(rows[1].2, date("2025-02-15"));
        assert_eq!(rows[2].2, date("2025-03-15"));
    }

    #[test]
    fn month_end_due_dates_clamp() {
        let rows = build_schedule(Decimal::from(200), 2, date("2025-01-31"));
        // February has no 31st; chrono clamps to the 28th.
        assert_eq!(rows[1].2, date("2025-02-28"));
    }

    #[test]
    fn single_installment_carries_the_whole_total() {
        let total = Decimal::from_str("999.99").unwrap();
        let rows = build_schedule(total, 1, date("2025-05-01"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, total);
    }
}
