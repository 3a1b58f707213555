#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Affiliate ledger row. Balance figures are only ever mutated through the
/// guarded balance updates in `db::ledger`; the row is never hard-deleted
/// (status flips to inactive instead).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Affiliate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub referral_code: String,
    pub status: String,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_paid: Decimal,
    pub pix_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffiliateStatus {
    Active,
    Inactive,
}

impl AffiliateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffiliateStatus::Active => "active",
            AffiliateStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for AffiliateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AffiliateStatus::Active),
            "inactive" => Ok(AffiliateStatus::Inactive),
            other => Err(format!("unknown affiliate status: {}", other)),
        }
    }
}

impl Affiliate {
    pub fn is_active(&self) -> bool {
        self.status == AffiliateStatus::Active.as_str()
    }
}

#[derive(Debug, Serialize)]
pub struct AffiliateProfile {
    pub id: Uuid,
    pub referral_code: String,
    pub status: String,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_paid: Decimal,
    pub pix_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Affiliate> for AffiliateProfile {
    fn from(affiliate: Affiliate) -> Self {
        Self {
            id: affiliate.id,
            referral_code: affiliate.referral_code,
            status: affiliate.status,
            balance: affiliate.balance,
            total_earned: affiliate.total_earned,
            total_paid: affiliate.total_paid,
            pix_key: affiliate.pix_key,
            created_at: affiliate.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAffiliateRequest {
    /// PIX key used for payouts; optional at registration.
    #[validate(length(min = 1, max = 140))]
    pub pix_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(AffiliateStatus::Active.as_str(), "active");
        assert_eq!(
            "inactive".parse::<AffiliateStatus>().unwrap(),
            AffiliateStatus::Inactive
        );
        assert!("deleted".parse::<AffiliateStatus>().is_err());
    }
}
