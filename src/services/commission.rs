//! Commission recording.
//!
//! The calculator is a pure mapping from a plan to a commission amount;
//! the recorder guarantees at most one commission transaction per
//! (referred user, calendar month). The batch entry point processes every
//! eligible referred user and keeps going past per-user failures; the
//! single-record entry point surfaces every failure as a terminal error.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::LedgerStore;
use crate::metrics;
use crate::models::{AffiliateTransaction, CommissionCandidate, NewTransaction, Plan};

/// Commission rate for a plan, selected by the first matching tier.
/// Matching is a case-insensitive substring check; the enterprise tier is
/// checked before the professional tier so a name matching both resolves
/// to the higher rate.
pub fn commission_rate(plan_name: &str) -> Decimal {
    let name = plan_name.to_lowercase();
    if name.contains("empresarial") {
        Decimal::new(30, 2) // 30%
    } else if name.contains("profissional") {
        Decimal::new(25, 2) // 25%
    } else {
        Decimal::new(20, 2) // 20%
    }
}

/// Commission amount for a plan. Zero-or-negative prices have no rate;
/// callers skip the commission entirely.
pub fn commission_amount(plan_name: &str, price: Decimal) -> Option<Decimal> {
    if price <= Decimal::ZERO {
        return None;
    }
    Some((price * commission_rate(plan_name)).round_dp(2))
}

/// Half-open UTC window [start of this month, start of next month) used by
/// the idempotency probe.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = month_start(now.year(), now.month());
    let end = if now.month() == 12 {
        month_start(now.year() + 1, 1)
    } else {
        month_start(now.year(), now.month() + 1)
    };
    (start, end)
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("first day of month is a valid instant")
}

/// Commission recording errors
#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    #[error("Referral not found: {0}")]
    ReferralNotFound(Uuid),

    #[error("Plan not found: {0}")]
    PlanNotFound(Uuid),

    #[error("Affiliate not found: {0}")]
    AffiliateNotFound(Uuid),

    #[error("Commission already recorded this month for user: {0}")]
    AlreadyRecorded(Uuid),

    #[error("Plan has no commissionable price: {0}")]
    NonPositivePrice(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error(
        "Ledger inconsistency: transaction {transaction_id} recorded but balance update \
         failed for affiliate {affiliate_id} (delta {delta})"
    )]
    Inconsistency {
        affiliate_id: Uuid,
        transaction_id: Uuid,
        delta: Decimal,
    },
}

/// Summary of one batch run. Per-user failures are accumulated here instead
/// of aborting the batch.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub processed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub total_amount: Decimal,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub referred_user_id: Uuid,
    pub message: String,
}

pub struct CommissionService {
    ledger: LedgerStore,
}

impl CommissionService {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    /// Batch mode: record this month's commission for every eligible
    /// referred user that does not have one yet.
    pub async fn process_monthly_commissions(&self) -> Result<BatchReport, CommissionError> {
        let candidates = self.ledger.commission_candidates().await?;
        let (window_start, window_end) = month_window(Utc::now());

        let mut report = BatchReport::default();

        for candidate in candidates {
            match self
                .process_candidate(&candidate, window_start, window_end)
                .await
            {
                Ok(Some(amount)) => {
                    report.processed += 1;
                    report.total_amount += amount;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        "Commission skipped for referred user {}: {}",
                        candidate.referred_user_id,
                        e
                    );
                    report.failed += 1;
                    report.failures.push(BatchFailure {
                        referred_user_id: candidate.referred_user_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Commission batch: {} processed ({} total), {} skipped, {} failed",
            report.processed,
            report.total_amount,
            report.skipped,
            report.failed
        );
        metrics::record_commission_batch(report.failed as u64);

        Ok(report)
    }

    /// Single-record mode: record one commission for one referral and plan.
    /// Any missing collaborator or an already-recorded month is a terminal
    /// error here, never a silent skip.
    pub async fn record_for_referral(
        &self,
        referral_id: Uuid,
        plan_id: Uuid,
    ) -> Result<AffiliateTransaction, CommissionError> {
        let referral = self
            .ledger
            .referral_by_id(referral_id)
            .await?
            .ok_or(CommissionError::ReferralNotFound(referral_id))?;

        let plan = self
            .ledger
            .plan_by_id(plan_id)
            .await?
            .ok_or(CommissionError::PlanNotFound(plan_id))?;

        let amount = commission_amount(&plan.name, plan.price)
            .ok_or(CommissionError::NonPositivePrice(plan.id))?;

        let affiliate = self
            .ledger
            .affiliate_by_id(referral.affiliate_id)
            .await?
            .ok_or(CommissionError::AffiliateNotFound(referral.affiliate_id))?;

        let (window_start, window_end) = month_window(Utc::now());
        if self
            .ledger
            .commission_exists_in_window(referral.referred_user_id, window_start, window_end)
            .await?
        {
            return Err(CommissionError::AlreadyRecorded(referral.referred_user_id));
        }

        let tx = self
            .insert_and_credit(affiliate.id, referral.referred_user_id, &plan, amount)
            .await?;

        metrics::record_commission("single", amount_to_f64(amount));
        tracing::info!(
            "Commission recorded: {} for affiliate {} (referred user {})",
            amount,
            affiliate.id,
            referral.referred_user_id
        );

        Ok(tx)
    }

    async fn process_candidate(
        &self,
        candidate: &CommissionCandidate,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Option<Decimal>, CommissionError> {
        // Idempotency: one commission per referred user per calendar month
        if self
            .ledger
            .commission_exists_in_window(candidate.referred_user_id, window_start, window_end)
            .await?
        {
            return Ok(None);
        }

        let plan = self
            .ledger
            .plan_by_id(candidate.plan_id)
            .await?
            .ok_or(CommissionError::PlanNotFound(candidate.plan_id))?;

        // Free or malformed plans earn nothing
        let Some(amount) = commission_amount(&plan.name, plan.price) else {
            return Ok(None);
        };

        self.insert_and_credit(
            candidate.affiliate_id,
            candidate.referred_user_id,
            &plan,
            amount,
        )
        .await?;

        metrics::record_commission("batch", amount_to_f64(amount));

        Ok(Some(amount))
    }

    /// The two dependent writes: ledger entry first, then the balance
    /// credit. A failed credit after a persisted entry is reported as an
    /// inconsistency with enough context for manual reconciliation.
    async fn insert_and_credit(
        &self,
        affiliate_id: Uuid,
        referred_user_id: Uuid,
        plan: &Plan,
        amount: Decimal,
    ) -> Result<AffiliateTransaction, CommissionError> {
        let description = format!("Comissão mensal - {}", plan.name);
        let tx = self
            .ledger
            .insert_transaction(&NewTransaction::commission(
                affiliate_id,
                referred_user_id,
                amount,
                description,
            ))
            .await?;

        let credited = match self.ledger.credit_commission(affiliate_id, amount).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(
                    "Balance credit failed after ledger insert: affiliate={} transaction={} delta={} error={}",
                    affiliate_id,
                    tx.id,
                    amount,
                    e
                );
                metrics::record_ledger_inconsistency("commission");
                return Err(CommissionError::Inconsistency {
                    affiliate_id,
                    transaction_id: tx.id,
                    delta: amount,
                });
            }
        };

        if !credited {
            tracing::error!(
                "Balance credit matched no affiliate row: affiliate={} transaction={} delta={}",
                affiliate_id,
                tx.id,
                amount
            );
            metrics::record_ledger_inconsistency("commission");
            return Err(CommissionError::Inconsistency {
                affiliate_id,
                transaction_id: tx.id,
                delta: amount,
            });
        }

        Ok(tx)
    }

    /// Periodic batch loop. Re-running inside the same month is safe because
    /// the recorder is idempotent per (referred user, month).
    pub async fn start_batch_loop(self: Arc<Self>, interval_secs: u64) {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                match self.process_monthly_commissions().await {
                    Ok(report) => tracing::info!(
                        "Scheduled commission batch done: {} processed, {} skipped, {} failed",
                        report.processed,
                        report.skipped,
                        report.failed
                    ),
                    Err(e) => tracing::error!("Scheduled commission batch failed: {}", e),
                }
            }
        });
    }
}

fn amount_to_f64(amount: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    amount.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_enterprise_rate() {
        assert_eq!(commission_rate("Plano Empresarial"), dec!(0.30));
        assert_eq!(commission_rate("EMPRESARIAL PLUS"), dec!(0.30));
    }

    #[test]
    fn test_professional_rate() {
        assert_eq!(commission_rate("Plano Profissional"), dec!(0.25));
        assert_eq!(commission_rate("profissional anual"), dec!(0.25));
    }

    #[test]
    fn test_default_rate() {
        assert_eq!(commission_rate("Plano Básico"), dec!(0.20));
        assert_eq!(commission_rate(""), dec!(0.20));
    }

    #[test]
    fn test_enterprise_wins_over_professional() {
        // Both keywords present: the higher tier is checked first
        assert_eq!(
            commission_rate("Plano Empresarial Profissional"),
            dec!(0.30)
        );
    }

    #[test]
    fn test_professional_plan_at_200() {
        let amount = commission_amount("Plano Profissional", dec!(200.00));
        assert_eq!(amount, Some(dec!(50.00)));
    }

    #[test]
    fn test_enterprise_plan_amount() {
        let amount = commission_amount("Plano Empresarial", dec!(100.00));
        assert_eq!(amount, Some(dec!(30.00)));
    }

    #[test]
    fn test_non_positive_price_has_no_commission() {
        assert_eq!(commission_amount("Plano Profissional", dec!(0)), None);
        assert_eq!(commission_amount("Plano Básico", dec!(-10.00)), None);
    }

    #[test]
    fn test_amount_rounds_to_cents() {
        // 0.20 * 33.33 = 6.666 -> 6.67
        let amount = commission_amount("Plano Básico", dec!(33.33));
        assert_eq!(amount, Some(dec!(6.67)));
    }

    #[test]
    fn test_month_window_mid_year() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 15, 30, 0).unwrap();
        let (start, end) = month_window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_window_december_rolls_over() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = month_window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_window_bounds_are_half_open() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let (start, end) = month_window(now);
        assert_eq!(start, now);
        assert!(end > start);
    }
}
