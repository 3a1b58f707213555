//! Withdrawal API Handlers
//!
//! Requests reserve balance against an uploaded invoice; confirmation is an
//! operator action after the payout settles.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::models::{TransactionResponse, WithdrawalRequest};
use crate::services::withdrawal::WithdrawalError;
use crate::utils::response::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub success: bool,
    pub message: String,
    pub data: TransactionResponse,
}

#[derive(Debug, Serialize)]
pub struct WithdrawHistoryResponse {
    pub withdrawals: Vec<TransactionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

fn map_withdrawal_error(e: WithdrawalError) -> AppError {
    match e {
        WithdrawalError::Unauthorized => {
            AppError::unauthorized("Cadastro de afiliado não encontrado")
        }
        WithdrawalError::InvalidAmount => {
            AppError::invalid_request("O valor do saque deve ser maior que zero")
        }
        WithdrawalError::InsufficientBalance { available, .. } => AppError::insufficient_balance(
            &format!("Saldo insuficiente: disponível R$ {}", available),
        ),
        WithdrawalError::WithdrawalNotFound(_) => AppError::not_found("Saque não encontrado"),
        WithdrawalError::NotPending(_) => {
            AppError::conflict("NOT_PENDING", "Saque não está pendente")
        }
        WithdrawalError::DatabaseError(err) => {
            tracing::error!("Withdrawal store failure: {}", err);
            AppError::store_failure("Falha ao acessar o banco de dados")
        }
        WithdrawalError::Inconsistency { .. } => AppError::inconsistency(
            "Saque registrado, mas a atualização do saldo falhou; a equipe foi notificada",
        ),
    }
}

/// Request a withdrawal against an uploaded invoice
/// POST /affiliate/withdrawals
pub async fn request_withdraw(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<WithdrawalRequest>,
) -> Result<Json<WithdrawResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::invalid_request(&e.to_string()))?;

    let tx = state
        .withdrawal_service
        .request_withdrawal(
            auth_user.user_id,
            req.amount,
            &req.invoice_url,
            &req.invoice_number,
        )
        .await
        .map_err(map_withdrawal_error)?;

    Ok(Json(WithdrawResponse {
        success: true,
        message: format!(
            "Saque de R$ {} solicitado; o valor foi reservado do seu saldo",
            tx.amount
        ),
        data: TransactionResponse::from(tx),
    }))
}

/// Withdrawal history for the caller
/// GET /affiliate/withdrawals
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<WithdrawHistoryResponse>, AppError> {
    let limit = query.limit.unwrap_or(50).min(200);

    let withdrawals = state
        .withdrawal_service
        .history(auth_user.user_id, limit)
        .await
        .map_err(map_withdrawal_error)?;

    Ok(Json(WithdrawHistoryResponse {
        withdrawals: withdrawals
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    }))
}

/// Mark a pending withdrawal as paid out
/// POST /internal/withdrawals/:id/confirm
pub async fn confirm_withdraw(
    State(state): State<Arc<AppState>>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(withdrawal_id): Path<Uuid>,
) -> Result<Json<WithdrawResponse>, AppError> {
    let tx = state
        .withdrawal_service
        .confirm_withdrawal(withdrawal_id)
        .await
        .map_err(map_withdrawal_error)?;

    Ok(Json(WithdrawResponse {
        success: true,
        message: "Saque confirmado como pago".to_string(),
        data: TransactionResponse::from(tx),
    }))
}
