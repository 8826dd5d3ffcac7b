//! User-id charset validation (invariant 1 / §8.1).
//!
//! Every public operation must reject a malformed user-id before touching
//! the runtime or database, so this lives ahead of everything else in the
//! dependency order.

use crate::error::CoreError;

pub fn validate_user_id(user_id: &str) -> Result<(), CoreError> {
    if user_id.is_empty() {
        return Err(CoreError::invalid_argument("user_id must not be empty"));
    }
    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::invalid_argument(format!(
            "user_id '{user_id}' contains characters outside [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

pub fn container_id_for(user_id: &str) -> String {
    format!("memoh-user-{user_id}")
}

pub fn version_snapshot_name(container_id: &str, version: i32) -> String {
    format!("{container_id}:v{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_ids() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id("alice_02-bravo").is_ok());
        assert!(validate_user_id("A1-B2_c3").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_user_id("").is_err());
    }

    #[test]
    fn rejects_bad_chars() {
        for bad in ["alice bob", "alice/bob", "alice.bob", "alice;rm -rf", "héllo"] {
            assert!(validate_user_id(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }

    #[test]
    fn container_id_matches_convention() {
        assert_eq!(container_id_for("alice"), "memoh-user-alice");
    }

    #[test]
    fn version_snapshot_name_matches_convention() {
        assert_eq!(
            version_snapshot_name("memoh-user-alice", 3),
            "memoh-user-alice:v3"
        );
    }
}
