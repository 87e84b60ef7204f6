use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters used for generated codes. 0/O and 1/I are excluded so codes
/// survive being read aloud or copied from a screen.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const GENERATED_LEN: usize = 6;

/// Share code identifying a family, 6-8 ASCII alphanumerics, stored
/// uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    pub fn new(value: String) -> Result<Self, String> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::validate(&normalized)?;
        Ok(Self(normalized))
    }

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..GENERATED_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        let len = value.chars().count();
        if !(6..=8).contains(&len) {
            return Err("Invite code must be 6-8 characters".to_string());
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("Invite code must be alphanumeric".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<InviteCode> for String {
    fn from(value: InviteCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_valid_codes() {
        for _ in 0..50 {
            let code = InviteCode::generate();
            assert_eq!(code.as_str().len(), GENERATED_LEN);
            assert!(InviteCode::new(code.as_str().to_string()).is_ok());
        }
    }

    #[test]
    fn test_new_normalizes_case() {
        let code = InviteCode::new("ab12cd".to_string()).unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        assert!(InviteCode::new("ab1".to_string()).is_err());
        assert!(InviteCode::new("abcdefghi".to_string()).is_err());
        assert!(InviteCode::new("ab12c!".to_string()).is_err());
    }
}
