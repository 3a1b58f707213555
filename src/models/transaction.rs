#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Append-only ledger entry. Corrections are made via new offsetting
/// entries, never edits; the one permitted mutation is the withdrawal
/// status transition pending -> completed on payout confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AffiliateTransaction {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub referred_user_id: Option<Uuid>,
    pub amount: Decimal,
    pub tx_type: String,
    pub status: String,
    pub description: String,
    pub invoice_url: Option<String>,
    pub invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Commission,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Commission => "commission",
            TransactionType::Withdrawal => "withdrawal",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commission" => Ok(TransactionType::Commission),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Completed,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TransactionStatus::Completed),
            "pending" => Ok(TransactionStatus::Pending),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Insert payload for a new ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub affiliate_id: Uuid,
    pub referred_user_id: Option<Uuid>,
    pub amount: Decimal,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub description: String,
    pub invoice_url: Option<String>,
    pub invoice_number: Option<String>,
}

impl NewTransaction {
    pub fn commission(
        affiliate_id: Uuid,
        referred_user_id: Uuid,
        amount: Decimal,
        description: String,
    ) -> Self {
        Self {
            affiliate_id,
            referred_user_id: Some(referred_user_id),
            amount,
            tx_type: TransactionType::Commission,
            status: TransactionStatus::Completed,
            description,
            invoice_url: None,
            invoice_number: None,
        }
    }

    pub fn withdrawal(
        affiliate_id: Uuid,
        amount: Decimal,
        description: String,
        invoice_url: String,
        invoice_number: String,
    ) -> Self {
        Self {
            affiliate_id,
            referred_user_id: None,
            amount,
            tx_type: TransactionType::Withdrawal,
            status: TransactionStatus::Pending,
            description,
            invoice_url: Some(invoice_url),
            invoice_number: Some(invoice_number),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub tx_type: String,
    pub status: String,
    pub description: String,
    pub invoice_url: Option<String>,
    pub invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AffiliateTransaction> for TransactionResponse {
    fn from(tx: AffiliateTransaction) -> Self {
        Self {
            id: tx.id,
            amount: tx.amount,
            tx_type: tx.tx_type,
            status: tx.status,
            description: tx.description,
            invoice_url: tx.invoice_url,
            invoice_number: tx.invoice_number,
            created_at: tx.created_at,
        }
    }
}

/// Withdrawal request body. The invoice artifact is already uploaded by the
/// time this arrives; we only receive its opaque storage URL and number.
#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    #[validate(url)]
    pub invoice_url: String,
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
}

/// Single-record commission entry point payload.
#[derive(Debug, Deserialize)]
pub struct RecordCommissionRequest {
    pub referral_id: Uuid,
    pub plan_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tx_type_roundtrip() {
        assert_eq!(TransactionType::Commission.as_str(), "commission");
        assert_eq!(
            "withdrawal".parse::<TransactionType>().unwrap(),
            TransactionType::Withdrawal
        );
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_commission_payload_is_completed() {
        let tx = NewTransaction::commission(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(50.00),
            "Comissão mensal".to_string(),
        );
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.tx_type, TransactionType::Commission);
        assert!(tx.invoice_url.is_none());
    }

    #[test]
    fn test_withdrawal_payload_is_pending() {
        let tx = NewTransaction::withdrawal(
            Uuid::new_v4(),
            dec!(250.00),
            "Saque - NF 1042".to_string(),
            "https://storage.docsafe.com.br/invoices/nf-1042.pdf".to_string(),
            "1042".to_string(),
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.tx_type, TransactionType::Withdrawal);
        assert_eq!(tx.invoice_number.as_deref(), Some("1042"));
    }
}
