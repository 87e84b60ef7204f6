/// Field-format validation consumed by the local store as a pure pass/fail
/// contract. The sync engine itself never interprets field contents beyond
/// this check.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, field: &str, value: &str) -> Result<(), String>;
}

/// Default rules for the entity fields the store writes.
///
/// Unknown field names pass; the store only asks about fields it owns.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicValidator;

impl FieldValidator for BasicValidator {
    fn validate(&self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "family_name" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err("Family name must not be empty".to_string());
                }
                if trimmed.chars().count() > 50 {
                    return Err("Family name must be 50 characters or fewer".to_string());
                }
                Ok(())
            }
            "display_name" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err("Display name must not be empty".to_string());
                }
                if trimmed.chars().count() > 30 {
                    return Err("Display name must be 30 characters or fewer".to_string());
                }
                Ok(())
            }
            "invite_code" => {
                let len = value.chars().count();
                if !(6..=8).contains(&len) {
                    return Err("Invite code must be 6-8 characters".to_string());
                }
                if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err("Invite code must be alphanumeric".to_string());
                }
                Ok(())
            }
            "external_id_hash" => {
                if value.trim().is_empty() {
                    return Err("External id hash must not be empty".to_string());
                }
                Ok(())
            }
            "avatar_url" => {
                if value.is_empty() {
                    return Ok(());
                }
                if value.starts_with("http://") || value.starts_with("https://") {
                    Ok(())
                } else {
                    Err("Avatar URL must be an http(s) URL".to_string())
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_name_rules() {
        let v = BasicValidator;
        assert!(v.validate("family_name", "Lopez").is_ok());
        assert!(v.validate("family_name", "  ").is_err());
        assert!(v.validate("family_name", &"x".repeat(51)).is_err());
    }

    #[test]
    fn test_invite_code_rules() {
        let v = BasicValidator;
        assert!(v.validate("invite_code", "AB12CD").is_ok());
        assert!(v.validate("invite_code", "AB12CD34").is_ok());
        assert!(v.validate("invite_code", "AB12").is_err());
        assert!(v.validate("invite_code", "AB12CD345").is_err());
        assert!(v.validate("invite_code", "AB12C!").is_err());
    }

    #[test]
    fn test_avatar_url_rules() {
        let v = BasicValidator;
        assert!(v.validate("avatar_url", "").is_ok());
        assert!(v.validate("avatar_url", "https://cdn.example/a.png").is_ok());
        assert!(v.validate("avatar_url", "ftp://x").is_err());
    }
}
