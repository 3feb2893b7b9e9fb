//! Borrowing reports endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{LastMonthQuery, LoanActivity, OverdueLoan},
    AppState,
};

use super::extract::QueryParams;

#[derive(Serialize, ToSchema)]
pub struct OverdueReport {
    pub message: String,
    pub count: usize,
    pub data: Vec<OverdueLoan>,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityReport {
    pub message: String,
    pub count: usize,
    pub data: Vec<LoanActivity>,
}

/// Open loans past their due date
#[utoipa::path(
    get,
    path = "/borrowing-processes/overdue",
    tag = "reports",
    responses(
        (status = 200, description = "Overdue loans, most overdue first", body = OverdueReport)
    )
)]
pub async fn list_overdue(
    State(state): State<AppState>,
) -> AppResult<Json<OverdueReport>> {
    let data = state.services.reports.list_overdue().await?;
    Ok(Json(OverdueReport {
        message: "success".to_string(),
        count: data.len(),
        data,
    }))
}

/// Loans created during the previous calendar month
#[utoipa::path(
    get,
    path = "/borrowing-processes/last-month-borrows",
    tag = "reports",
    params(LastMonthQuery),
    responses(
        (status = 200, description = "Last month's loans, oldest first", body = ActivityReport)
    )
)]
pub async fn list_last_month_borrows(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<LastMonthQuery>,
) -> AppResult<Json<ActivityReport>> {
    let data = state
        .services
        .reports
        .list_last_month_borrows(query.only_overdue.unwrap_or(false))
        .await?;
    Ok(Json(ActivityReport {
        message: "success".to_string(),
        count: data.len(),
        data,
    }))
}
