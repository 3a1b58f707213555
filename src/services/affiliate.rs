//! Affiliate registration and referral tracking.

use uuid::Uuid;

use crate::db::LedgerStore;
use crate::models::{Affiliate, Referral};
use crate::utils::referral_code::generate_referral_code;

/// Collision retries before giving up on code generation.
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Affiliate errors
#[derive(Debug, thiserror::Error)]
pub enum AffiliateError {
    #[error("User is already an affiliate")]
    AlreadyRegistered,

    #[error("Referral code not found: {0}")]
    CodeNotFound(String),

    #[error("A referral code cannot refer its own owner")]
    SelfReferral,

    #[error("User is already referred: {0}")]
    AlreadyReferred(Uuid),

    #[error("Could not generate a unique referral code after {MAX_CODE_ATTEMPTS} attempts")]
    CodeGenerationExhausted,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

pub struct AffiliateService {
    ledger: LedgerStore,
}

impl AffiliateService {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    /// Enroll a user in the affiliate program. Code generation retries on
    /// collision a bounded number of times; the unique constraint on the
    /// code column is the arbiter.
    pub async fn register(
        &self,
        user_id: Uuid,
        pix_key: Option<&str>,
    ) -> Result<Affiliate, AffiliateError> {
        if self.ledger.affiliate_by_user(user_id).await?.is_some() {
            return Err(AffiliateError::AlreadyRegistered);
        }

        for attempt in 0..MAX_CODE_ATTEMPTS {
            let code = generate_referral_code(user_id, attempt);
            match self.ledger.insert_affiliate(user_id, &code, pix_key).await {
                Ok(affiliate) => {
                    tracing::info!(
                        "Affiliate registered: {} with code {}",
                        affiliate.id,
                        affiliate.referral_code
                    );
                    return Ok(affiliate);
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::warn!(
                        "Referral code collision for user {} (attempt {})",
                        user_id,
                        attempt + 1
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AffiliateError::CodeGenerationExhausted)
    }

    /// Bind a referred user to the affiliate owning `code`. The referral is
    /// created as pending; its activation is driven by the subscription
    /// lifecycle, not by this service.
    pub async fn track_referral(
        &self,
        code: &str,
        referred_user_id: Uuid,
        plan_id: Option<Uuid>,
    ) -> Result<Referral, AffiliateError> {
        let affiliate = self
            .ledger
            .affiliate_by_code(code)
            .await?
            .ok_or_else(|| AffiliateError::CodeNotFound(code.to_string()))?;

        if affiliate.user_id == referred_user_id {
            return Err(AffiliateError::SelfReferral);
        }

        if self
            .ledger
            .referral_by_referred_user(referred_user_id)
            .await?
            .is_some()
        {
            return Err(AffiliateError::AlreadyReferred(referred_user_id));
        }

        let referral = self
            .ledger
            .insert_referral(affiliate.id, referred_user_id, plan_id)
            .await?;

        tracing::info!(
            "Referral tracked: user {} referred by affiliate {} via code {}",
            referred_user_id,
            affiliate.id,
            affiliate.referral_code
        );

        Ok(referral)
    }

    /// The caller's affiliate record, if enrolled.
    pub async fn profile(&self, user_id: Uuid) -> Result<Option<Affiliate>, AffiliateError> {
        Ok(self.ledger.affiliate_by_user(user_id).await?)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
