use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::auth::middleware::auth_middleware;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // All program routes require a resolved caller identity
    let protected_routes = Router::new()
        // Affiliate
        .route("/affiliate/register", post(handlers::affiliate::register))
        .route("/affiliate/referrals", post(handlers::affiliate::track_referral))
        .route("/affiliate/dashboard", get(handlers::affiliate::get_dashboard))
        .route("/affiliate/transactions", get(handlers::affiliate::get_transactions))
        // Withdrawals
        .route("/affiliate/withdrawals", post(handlers::withdraw::request_withdraw))
        .route("/affiliate/withdrawals", get(handlers::withdraw::get_history))
        // Internal operations (schedulers / operators)
        .route("/internal/commissions/run", post(handlers::commission::run_batch))
        .route("/internal/commissions/record", post(handlers::commission::record_commission))
        .route("/internal/withdrawals/:id/confirm", post(handlers::withdraw::confirm_withdraw))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes)
}
