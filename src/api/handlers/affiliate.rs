//! Affiliate API Handlers
//!
//! Registration, referral tracking, and the read-only dashboard views.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::models::{
    AffiliateProfile, RegisterAffiliateRequest, ReferralResponse, TrackReferralRequest,
    TransactionResponse,
};
use crate::services::affiliate::AffiliateError;
use crate::utils::response::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub data: AffiliateProfile,
}

#[derive(Debug, Serialize)]
pub struct ReferralCreatedResponse {
    pub success: bool,
    pub message: String,
    pub data: ReferralResponse,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub affiliate: AffiliateProfile,
    pub total_referrals: i64,
    pub active_referrals: i64,
    pub recent_transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<i64>,
}

fn map_affiliate_error(e: AffiliateError) -> AppError {
    match e {
        AffiliateError::AlreadyRegistered => AppError::conflict(
            "ALREADY_REGISTERED",
            "Usuário já participa do programa de afiliados",
        ),
        AffiliateError::CodeNotFound(_) => {
            AppError::not_found("Código de indicação não encontrado")
        }
        AffiliateError::SelfReferral => {
            AppError::invalid_request("Não é possível usar o próprio código de indicação")
        }
        AffiliateError::AlreadyReferred(_) => AppError::conflict(
            "ALREADY_REFERRED",
            "Usuário já possui uma indicação registrada",
        ),
        AffiliateError::CodeGenerationExhausted => {
            tracing::error!("Referral code generation exhausted");
            AppError::new(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "CODE_GENERATION_EXHAUSTED",
                "Não foi possível gerar um código de indicação único",
            )
        }
        AffiliateError::DatabaseError(err) => {
            tracing::error!("Affiliate store failure: {}", err);
            AppError::store_failure("Falha ao acessar o banco de dados")
        }
    }
}

/// Enroll the caller in the affiliate program
/// POST /affiliate/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<RegisterAffiliateRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::invalid_request(&e.to_string()))?;

    let affiliate = state
        .affiliate_service
        .register(auth_user.user_id, req.pix_key.as_deref())
        .await
        .map_err(map_affiliate_error)?;

    Ok(Json(RegisterResponse {
        success: true,
        message: format!(
            "Cadastro realizado! Seu código de indicação é {}",
            affiliate.referral_code
        ),
        data: AffiliateProfile::from(affiliate),
    }))
}

/// Bind a referred user to an affiliate by referral code
/// POST /affiliate/referrals
pub async fn track_referral(
    State(state): State<Arc<AppState>>,
    Extension(_auth_user): Extension<AuthUser>,
    Json(req): Json<TrackReferralRequest>,
) -> Result<Json<ReferralCreatedResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::invalid_request(&e.to_string()))?;

    let referral = state
        .affiliate_service
        .track_referral(&req.code, req.referred_user_id, req.plan_id)
        .await
        .map_err(map_affiliate_error)?;

    Ok(Json(ReferralCreatedResponse {
        success: true,
        message: "Indicação registrada com sucesso".to_string(),
        data: ReferralResponse::from(referral),
    }))
}

/// Affiliate dashboard: profile, referral counts, recent ledger activity
/// GET /affiliate/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>, AppError> {
    let affiliate = state
        .affiliate_service
        .profile(auth_user.user_id)
        .await
        .map_err(map_affiliate_error)?
        .ok_or_else(|| AppError::unauthorized("Cadastro de afiliado não encontrado"))?;

    let total_referrals = state
        .ledger
        .count_referrals(affiliate.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count referrals: {}", e);
            AppError::store_failure("Falha ao consultar indicações")
        })?;

    let active_referrals = state
        .ledger
        .count_active_referrals(affiliate.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count active referrals: {}", e);
            AppError::store_failure("Falha ao consultar indicações")
        })?;

    let recent = state
        .ledger
        .recent_transactions(affiliate.id, 20)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch recent transactions: {}", e);
            AppError::store_failure("Falha ao consultar o extrato")
        })?;

    Ok(Json(DashboardResponse {
        affiliate: AffiliateProfile::from(affiliate),
        total_referrals,
        active_referrals,
        recent_transactions: recent.into_iter().map(TransactionResponse::from).collect(),
    }))
}

/// Transaction history for the caller, newest first
/// GET /affiliate/transactions
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let limit = query.limit.unwrap_or(50).min(200);

    let affiliate = state
        .affiliate_service
        .profile(auth_user.user_id)
        .await
        .map_err(map_affiliate_error)?
        .ok_or_else(|| AppError::unauthorized("Cadastro de afiliado não encontrado"))?;

    let transactions = state
        .ledger
        .recent_transactions(affiliate.id, limit)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch transactions: {}", e);
            AppError::store_failure("Falha ao consultar o extrato")
        })?;

    Ok(Json(TransactionsResponse {
        transactions: transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    }))
}
