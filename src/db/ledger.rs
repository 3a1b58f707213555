//! Ledger store operations.
//!
//! Every read returns `Result<Option<T>, sqlx::Error>` so callers can tell
//! "no matching row" apart from a failed query. Every balance mutation is a
//! single guarded UPDATE executed at the store, so concurrent commission
//! and withdrawal operations against the same affiliate serialize on the
//! row instead of racing through read-then-write sequences.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Affiliate, AffiliateTransaction, CommissionCandidate, NewTransaction, Plan, Referral,
    TransactionType,
};

/// Operations over the affiliate ledger tables.
#[derive(Clone)]
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Affiliates
    // ------------------------------------------------------------------

    pub async fn affiliate_by_id(&self, id: Uuid) -> Result<Option<Affiliate>, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(
            r#"
            SELECT id, user_id, referral_code, status, balance, total_earned,
                   total_paid, pix_key, created_at, updated_at
            FROM affiliates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn affiliate_by_user(&self, user_id: Uuid) -> Result<Option<Affiliate>, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(
            r#"
            SELECT id, user_id, referral_code, status, balance, total_earned,
                   total_paid, pix_key, created_at, updated_at
            FROM affiliates
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn affiliate_by_code(&self, code: &str) -> Result<Option<Affiliate>, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(
            r#"
            SELECT id, user_id, referral_code, status, balance, total_earned,
                   total_paid, pix_key, created_at, updated_at
            FROM affiliates
            WHERE UPPER(referral_code) = UPPER($1)
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_affiliate(
        &self,
        user_id: Uuid,
        referral_code: &str,
        pix_key: Option<&str>,
    ) -> Result<Affiliate, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(
            r#"
            INSERT INTO affiliates (id, user_id, referral_code, status, pix_key)
            VALUES ($1, $2, $3, 'active', $4)
            RETURNING id, user_id, referral_code, status, balance, total_earned,
                      total_paid, pix_key, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(referral_code)
        .bind(pix_key)
        .fetch_one(&self.pool)
        .await
    }

    // ------------------------------------------------------------------
    // Referrals and plans
    // ------------------------------------------------------------------

    pub async fn referral_by_id(&self, id: Uuid) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(
            r#"
            SELECT id, affiliate_id, referred_user_id, plan_id, status, created_at
            FROM referrals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn referral_by_referred_user(
        &self,
        referred_user_id: Uuid,
    ) -> Result<Option<Referral>, sqlx::Error> {
        sqlx::query_as::<_, Referral>(
            r#"
            SELECT id, affiliate_id, referred_user_id, plan_id, status, created_at
            FROM referrals
            WHERE referred_user_id = $1
            "#,
        )
        .bind(referred_user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_referral(
        &self,
        affiliate_id: Uuid,
        referred_user_id: Uuid,
        plan_id: Option<Uuid>,
    ) -> Result<Referral, sqlx::Error> {
        sqlx::query_as::<_, Referral>(
            r#"
            INSERT INTO referrals (id, affiliate_id, referred_user_id, plan_id, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, affiliate_id, referred_user_id, plan_id, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(affiliate_id)
        .bind(referred_user_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn plan_by_id(&self, id: Uuid) -> Result<Option<Plan>, sqlx::Error> {
        sqlx::query_as::<_, Plan>(
            "SELECT id, name, price, created_at FROM plans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Referred users currently eligible for a monthly commission: active
    /// subscription, a known plan, and an active referring affiliate.
    pub async fn commission_candidates(&self) -> Result<Vec<CommissionCandidate>, sqlx::Error> {
        sqlx::query_as::<_, CommissionCandidate>(
            r#"
            SELECT r.id AS referral_id,
                   r.affiliate_id,
                   r.referred_user_id,
                   u.plan_id
            FROM referrals r
            JOIN users u ON u.id = r.referred_user_id
            JOIN affiliates a ON a.id = r.affiliate_id
            WHERE u.subscription_active = TRUE
              AND u.plan_id IS NOT NULL
              AND a.status = 'active'
            ORDER BY r.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    pub async fn insert_transaction(
        &self,
        tx: &NewTransaction,
    ) -> Result<AffiliateTransaction, sqlx::Error> {
        sqlx::query_as::<_, AffiliateTransaction>(
            r#"
            INSERT INTO affiliate_transactions
                (id, affiliate_id, referred_user_id, amount, tx_type, status,
                 description, invoice_url, invoice_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, affiliate_id, referred_user_id, amount, tx_type, status,
                      description, invoice_url, invoice_number, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tx.affiliate_id)
        .bind(tx.referred_user_id)
        .bind(tx.amount)
        .bind(tx.tx_type.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.description)
        .bind(&tx.invoice_url)
        .bind(&tx.invoice_number)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn transaction_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<AffiliateTransaction>, sqlx::Error> {
        sqlx::query_as::<_, AffiliateTransaction>(
            r#"
            SELECT id, affiliate_id, referred_user_id, amount, tx_type, status,
                   description, invoice_url, invoice_number, created_at
            FROM affiliate_transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Idempotency probe: does a commission entry already exist for this
    /// referred user inside the given window?
    pub async fn commission_exists_in_window(
        &self,
        referred_user_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM affiliate_transactions
            WHERE referred_user_id = $1
              AND tx_type = 'commission'
              AND created_at >= $2
              AND created_at < $3
            "#,
        )
        .bind(referred_user_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn recent_transactions(
        &self,
        affiliate_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AffiliateTransaction>, sqlx::Error> {
        sqlx::query_as::<_, AffiliateTransaction>(
            r#"
            SELECT id, affiliate_id, referred_user_id, amount, tx_type, status,
                   description, invoice_url, invoice_number, created_at
            FROM affiliate_transactions
            WHERE affiliate_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(affiliate_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn transactions_of_type(
        &self,
        affiliate_id: Uuid,
        tx_type: TransactionType,
        limit: i64,
    ) -> Result<Vec<AffiliateTransaction>, sqlx::Error> {
        sqlx::query_as::<_, AffiliateTransaction>(
            r#"
            SELECT id, affiliate_id, referred_user_id, amount, tx_type, status,
                   description, invoice_url, invoice_number, created_at
            FROM affiliate_transactions
            WHERE affiliate_id = $1 AND tx_type = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(affiliate_id)
        .bind(tx_type.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// The withdrawal status transition pending -> completed. Returns false
    /// when the row is missing or is not a pending withdrawal.
    pub async fn mark_withdrawal_completed(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE affiliate_transactions
            SET status = 'completed'
            WHERE id = $1 AND tx_type = 'withdrawal' AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Balance update primitive
    // ------------------------------------------------------------------

    /// Credit a commission: balance and total_earned move together in one
    /// statement. Returns false when the affiliate row does not exist.
    pub async fn credit_commission(
        &self,
        affiliate_id: Uuid,
        amount: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE affiliates
            SET balance = balance + $2,
                total_earned = total_earned + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(affiliate_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reserve funds for a withdrawal. The sufficiency check and the
    /// decrement are one atomic statement; two concurrent reservations can
    /// never jointly overdraw the balance. Returns false when the guard
    /// rejects the decrement.
    pub async fn reserve_withdrawal(
        &self,
        affiliate_id: Uuid,
        amount: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE affiliates
            SET balance = balance - $2,
                updated_at = NOW()
            WHERE id = $1 AND balance >= $2
            "#,
        )
        .bind(affiliate_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a completed payout against lifetime totals.
    pub async fn settle_withdrawal(
        &self,
        affiliate_id: Uuid,
        amount: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE affiliates
            SET total_paid = total_paid + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(affiliate_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Dashboard reads
    // ------------------------------------------------------------------

    pub async fn count_referrals(&self, affiliate_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM referrals WHERE affiliate_id = $1")
            .bind(affiliate_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn count_active_referrals(&self, affiliate_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM referrals WHERE affiliate_id = $1 AND status = 'active'",
        )
        .bind(affiliate_id)
        .fetch_one(&self.pool)
        .await
    }
}
