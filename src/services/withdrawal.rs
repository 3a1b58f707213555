//! Withdrawal requests.
//!
//! A request reserves funds: it appends a pending withdrawal transaction
//! and decrements the affiliate's balance in the same logical operation.
//! The sufficiency check and the decrement are one guarded UPDATE at the
//! store, so concurrent requests can never jointly overdraw a balance.
//! Repeated identical requests are not de-duplicated; the caller prevents
//! double submission.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::LedgerStore;
use crate::metrics;
use crate::models::{Affiliate, AffiliateTransaction, NewTransaction, TransactionType};

/// Withdrawal errors
#[derive(Debug, thiserror::Error)]
pub enum WithdrawalError {
    #[error("No affiliate record for caller")]
    Unauthorized,

    #[error("Withdrawal amount must be positive")]
    InvalidAmount,

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(Uuid),

    #[error("Transaction is not a pending withdrawal: {0}")]
    NotPending(Uuid),

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

/// Preconditions, in order; the first failure wins. Runs before any
/// mutation so a rejected request leaves no trace.
fn check_request(affiliate: &Affiliate, amount: Decimal) -> Result<(), WithdrawalError> {
    if amount <= Decimal::ZERO {
        return Err(WithdrawalError::InvalidAmount);
    }
    if affiliate.balance < amount {
        return Err(WithdrawalError::InsufficientBalance {
            available: affiliate.balance,
            requested: amount,
        });
    }
    Ok(())
}

pub struct WithdrawalService {
    ledger: LedgerStore,
}

impl WithdrawalService {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    /// Create a pending withdrawal and reserve the funds.
    ///
    /// The invoice artifact is already uploaded; `invoice_url` and
    /// `invoice_number` are opaque references to it.
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
        invoice_url: &str,
        invoice_number: &str,
    ) -> Result<AffiliateTransaction, WithdrawalError> {
        // 1. Caller must resolve to an affiliate
        let affiliate = self
            .ledger
            .affiliate_by_user(user_id)
            .await?
            .ok_or(WithdrawalError::Unauthorized)?;

        // 2./3. Amount and balance checks, no side effects yet
        check_request(&affiliate, amount)?;

        // 4. Append the pending ledger entry
        let description = format!("Saque - NF {}", invoice_number);
        let tx = self
            .ledger
            .insert_transaction(&NewTransaction::withdrawal(
                affiliate.id,
                amount,
                description,
                invoice_url.to_string(),
                invoice_number.to_string(),
            ))
            .await?;

        // 5. Reserve: guarded decrement, re-checked atomically at the store
        let reserved = match self.ledger.reserve_withdrawal(affiliate.id, amount).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(
                    "Balance reservation failed after ledger insert: affiliate={} transaction={} delta=-{} error={}",
                    affiliate.id,
                    tx.id,
                    amount,
                    e
                );
                metrics::record_ledger_inconsistency("withdrawal");
                return Err(WithdrawalError::Inconsistency {
                    affiliate_id: affiliate.id,
                    transaction_id: tx.id,
                    delta: -amount,
                });
            }
        };

        if !reserved {
            // The balance moved between the pre-check and the reservation;
            // the pending entry now exists without its reservation.
            tracing::error!(
                "Balance reservation rejected after ledger insert: affiliate={} transaction={} delta=-{}",
                affiliate.id,
                tx.id,
                amount
            );
            metrics::record_ledger_inconsistency("withdrawal");
            return Err(WithdrawalError::Inconsistency {
                affiliate_id: affiliate.id,
                transaction_id: tx.id,
                delta: -amount,
            });
        }

        metrics::record_withdrawal_requested(amount_to_f64(amount));
        tracing::info!(
            "Withdrawal requested: {} by affiliate {} (invoice {})",
            amount,
            affiliate.id,
            invoice_number
        );

        Ok(tx)
    }

    /// Payout settled externally: transition the pending withdrawal to
    /// completed and move the amount into lifetime totals.
    pub async fn confirm_withdrawal(
        &self,
        transaction_id: Uuid,
    ) -> Result<AffiliateTransaction, WithdrawalError> {
        let tx = self
            .ledger
            .transaction_by_id(transaction_id)
            .await?
            .ok_or(WithdrawalError::WithdrawalNotFound(transaction_id))?;

        let completed = self.ledger.mark_withdrawal_completed(transaction_id).await?;
        if !completed {
            return Err(WithdrawalError::NotPending(transaction_id));
        }

        match self.ledger.settle_withdrawal(tx.affiliate_id, tx.amount).await {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                tracing::error!(
                    "total_paid update failed after withdrawal completion: affiliate={} transaction={} delta={}",
                    tx.affiliate_id,
                    tx.id,
                    tx.amount
                );
                metrics::record_ledger_inconsistency("withdrawal_confirm");
                return Err(WithdrawalError::Inconsistency {
                    affiliate_id: tx.affiliate_id,
                    transaction_id: tx.id,
                    delta: tx.amount,
                });
            }
        }

        metrics::record_withdrawal_completed();
        tracing::info!(
            "Withdrawal completed: {} for affiliate {}",
            tx.amount,
            tx.affiliate_id
        );

        self.ledger
            .transaction_by_id(transaction_id)
            .await?
            .ok_or(WithdrawalError::WithdrawalNotFound(transaction_id))
    }

    /// Withdrawal history for the caller, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AffiliateTransaction>, WithdrawalError> {
        let affiliate = self
            .ledger
            .affiliate_by_user(user_id)
            .await?
            .ok_or(WithdrawalError::Unauthorized)?;

        Ok(self
            .ledger
            .transactions_of_type(affiliate.id, TransactionType::Withdrawal, limit)
            .await?)
    }
}

fn amount_to_f64(amount: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    amount.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn affiliate_with_balance(balance: Decimal) -> Affiliate {
        Affiliate {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            referral_code: "A1B2C3D4".to_string(),
            status: "active".to_string(),
            balance,
            total_earned: balance,
            total_paid: Decimal::ZERO,
            pix_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let affiliate = affiliate_with_balance(dec!(100.00));
        assert!(matches!(
            check_request(&affiliate, dec!(0)),
            Err(WithdrawalError::InvalidAmount)
        ));
        assert!(matches!(
            check_request(&affiliate, dec!(-5.00)),
            Err(WithdrawalError::InvalidAmount)
        ));
    }

    #[test]
    fn test_rejects_amount_over_balance() {
        // balance 100.00, requested 250.00
        let affiliate = affiliate_with_balance(dec!(100.00));
        match check_request(&affiliate, dec!(250.00)) {
            Err(WithdrawalError::InsufficientBalance {
                available,
                requested,
            }) => {
                assert_eq!(available, dec!(100.00));
                assert_eq!(requested, dec!(250.00));
            }
            other => panic!("expected InsufficientBalance, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_amount_within_balance() {
        // balance 300.00, requested 250.00
        let affiliate = affiliate_with_balance(dec!(300.00));
        assert!(check_request(&affiliate, dec!(250.00)).is_ok());
    }

    #[test]
    fn test_accepts_exact_balance() {
        let affiliate = affiliate_with_balance(dec!(250.00));
        assert!(check_request(&affiliate, dec!(250.00)).is_ok());
    }

    #[test]
    fn test_amount_check_runs_before_balance_check() {
        // A non-positive amount fails as InvalidAmount even with zero balance
        let affiliate = affiliate_with_balance(dec!(0));
        assert!(matches!(
            check_request(&affiliate, dec!(-1)),
            Err(WithdrawalError::InvalidAmount)
        ));
    }
}
