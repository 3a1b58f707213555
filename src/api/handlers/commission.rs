//! Commission API Handlers
//!
//! Internal entry points for the batch recorder and the single-record path.
//! Both share the one-commission-per-referred-user-per-month rule.

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::models::{RecordCommissionRequest, TransactionResponse};
use crate::services::commission::{BatchReport, CommissionError};
use crate::utils::response::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BatchRunResponse {
    pub success: bool,
    pub message: String,
    pub data: BatchReport,
}

#[derive(Debug, Serialize)]
pub struct RecordCommissionResponse {
    pub success: bool,
    pub message: String,
    pub data: TransactionResponse,
}

fn map_commission_error(e: CommissionError) -> AppError {
    match e {
        CommissionError::ReferralNotFound(_) => AppError::not_found("Indicação não encontrada"),
        CommissionError::PlanNotFound(_) => AppError::not_found("Plano não encontrado"),
        CommissionError::AffiliateNotFound(_) => AppError::not_found("Afiliado não encontrado"),
        CommissionError::AlreadyRecorded(_) => AppError::conflict(
            "ALREADY_RECORDED",
            "Comissão já registrada para este usuário neste mês",
        ),
        CommissionError::NonPositivePrice(_) => {
            AppError::invalid_request("Plano sem preço comissionável")
        }
        CommissionError::DatabaseError(err) => {
            tracing::error!("Commission store failure: {}", err);
            AppError::store_failure("Falha ao acessar o banco de dados")
        }
        CommissionError::Inconsistency { .. } => AppError::inconsistency(
            "Comissão registrada, mas a atualização do saldo falhou; a equipe foi notificada",
        ),
    }
}

/// Run the monthly commission batch
/// POST /internal/commissions/run
pub async fn run_batch(
    State(state): State<Arc<AppState>>,
    Extension(_auth_user): Extension<AuthUser>,
) -> Result<Json<BatchRunResponse>, AppError> {
    let report = state
        .commission_service
        .process_monthly_commissions()
        .await
        .map_err(map_commission_error)?;

    Ok(Json(BatchRunResponse {
        success: true,
        message: format!(
            "{} comissões processadas, {} ignoradas, {} falhas",
            report.processed, report.skipped, report.failed
        ),
        data: report,
    }))
}

/// Record a single commission for one referral and plan
/// POST /internal/commissions/record
pub async fn record_commission(
    State(state): State<Arc<AppState>>,
    Extension(_auth_user): Extension<AuthUser>,
    Json(req): Json<RecordCommissionRequest>,
) -> Result<Json<RecordCommissionResponse>, AppError> {
    let tx = state
        .commission_service
        .record_for_referral(req.referral_id, req.plan_id)
        .await
        .map_err(map_commission_error)?;

    Ok(Json(RecordCommissionResponse {
        success: true,
        message: format!("Comissão de R$ {} registrada", tx.amount),
        data: TransactionResponse::from(tx),
    }))
}
