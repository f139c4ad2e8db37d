use crate::error::AppError;

/// bcrypt work factor used for stored user passwords.
pub const DEFAULT_COST: u32 = 14;

pub fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(plain, cost).map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Constant-time comparison of `plain` against a stored bcrypt hash. A hash
/// that cannot be parsed never matches.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn original_password_matches_its_hash() {
        let hash = hash_password("correct horse", TEST_COST).unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash));
    }

    #[test]
    fn other_strings_do_not_match() {
        let hash = hash_password("correct horse", TEST_COST).unwrap();
        assert!(!verify_password("correct horse ", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("password", TEST_COST).unwrap();
        let b = hash_password("password", TEST_COST).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("password", "not-a-bcrypt-hash"));
    }

    #[test]
    fn invalid_cost_is_an_internal_error() {
        assert!(matches!(hash_password("password", 2), Err(AppError::Internal(_))));
    }
}
