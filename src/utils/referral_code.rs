use sha3::{Digest, Keccak256};
use uuid::Uuid;

/// Referral codes are 8 uppercase hex characters.
pub const CODE_LENGTH: usize = 8;

/// Derive a referral code candidate for a user. The attempt counter salts
/// the hash so a collision retry produces a different candidate; the
/// uniqueness guarantee itself lives in the database constraint.
pub fn generate_referral_code(user_id: Uuid, attempt: u32) -> String {
    let input = format!(
        "{}:{}:{}",
        user_id,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
        attempt
    );
    let hash = Keccak256::digest(input.as_bytes());
    format!("{:x}", hash)[..CODE_LENGTH].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        let code = generate_referral_code(Uuid::new_v4(), 0);
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_attempts_produce_distinct_candidates() {
        let user_id = Uuid::new_v4();
        let first = generate_referral_code(user_id, 0);
        let second = generate_referral_code(user_id, 1);
        assert_ne!(first, second);
    }
}
