use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::OnceLock;

pub(crate) static DUMMY_HASH: OnceLock<String> = OnceLock::new();

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(
    password: &str,
    password_hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed_hash = PasswordHash::new(password_hash)?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Runs a full verification against a throwaway hash so a login for an
/// unknown account costs as much as one with a wrong password. Never matches.
pub fn verify_dummy_password(password: &str) -> bool {
    let hash = DUMMY_HASH.get_or_init(|| hash_password(&generate_secret(32)).unwrap_or_default());
    let _ = verify_password(password, hash);
    false
}

/// Random alphanumeric string, used for throwaway signing secrets.
pub fn generate_secret(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("hunter22", "not-a-hash").is_err());
    }

    #[test]
    fn dummy_check_hashes_once_and_never_matches() {
        assert!(!verify_dummy_password("hunter22"));
        assert!(!verify_dummy_password(""));

        let hash = DUMMY_HASH.get().unwrap();
        assert!(PasswordHash::new(hash).is_ok());
    }

    #[test]
    fn secrets_have_requested_length() {
        let secret = generate_secret(48);
        assert_eq!(secret.len(), 48);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
