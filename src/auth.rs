use bcrypt::{BcryptError, HashParts};
use tracing::{info, warn};

/// Shared-password check against a bcrypt hash from configuration.
pub struct PasswordGate {
    hash: String,
}

impl PasswordGate {
    /// Fails if `hash` is not a well-formed bcrypt hash.
    pub fn new(hash: &str) -> Result<Self, BcryptError> {
        let hash = hash.trim();
        hash.parse::<HashParts>()?;
        Ok(Self {
            hash: hash.to_string(),
        })
    }

    pub fn verify(&self, password: &str) -> bool {
        match bcrypt::verify(password, &self.hash) {
            Ok(true) => {
                info!("Login succeeded");
                true
            }
            Ok(false) => {
                warn!("Login rejected: incorrect password");
                false
            }
            Err(e) => {
                warn!("Login rejected: bcrypt verification error: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_for(password: &str) -> PasswordGate {
        let hash = bcrypt::hash(password, 4).unwrap();
        PasswordGate::new(&hash).unwrap()
    }

    #[test]
    fn correct_password_is_accepted() {
        assert!(gate_for("secret123").verify("secret123"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let gate = gate_for("secret123");
        assert!(!gate.verify("wrong"));
        assert!(!gate.verify(""));
        assert!(!gate.verify("secret123 "));
    }

    #[test]
    fn surrounding_whitespace_in_hash_is_ignored() {
        let hash = bcrypt::hash("secret123", 4).unwrap();
        let gate = PasswordGate::new(&format!("  {}\n", hash)).unwrap();
        assert!(gate.verify("secret123"));
    }

    #[test]
    fn malformed_hash_is_rejected_up_front() {
        assert!(PasswordGate::new("not-a-bcrypt-hash").is_err());
    }
}
