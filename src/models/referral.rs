#![allow(dead_code)]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Link between a referring affiliate and a referred user. Read-only after
/// creation except for the externally driven status transition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Referral {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub referred_user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralStatus {
    Pending,
    Active,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Active => "active",
        }
    }
}

impl std::str::FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReferralStatus::Pending),
            "active" => Ok(ReferralStatus::Active),
            other => Err(format!("unknown referral status: {}", other)),
        }
    }
}

/// One referred user eligible for a monthly commission, as selected by the
/// batch recorder query (active subscription, known referrer, known plan).
#[derive(Debug, Clone, FromRow)]
pub struct CommissionCandidate {
    pub referral_id: Uuid,
    pub affiliate_id: Uuid,
    pub referred_user_id: Uuid,
    pub plan_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrackReferralRequest {
    /// Referral code the referred user signed up with.
    #[validate(length(min = 4, max = 16))]
    pub code: String,
    pub referred_user_id: Uuid,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReferralResponse {
    pub id: Uuid,
    pub referred_user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Referral> for ReferralResponse {
    fn from(referral: Referral) -> Self {
        Self {
            id: referral.id,
            referred_user_id: referral.referred_user_id,
            status: referral.status,
            created_at: referral.created_at,
        }
    }
}
