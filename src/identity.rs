//! Identity resolution: bearer token to neighbor.
//!
//! Every ledger operation takes a token first and resolves it here. Tokens
//! have a fixed format (36 characters of `[A-Za-z0-9-]`, the shape of the
//! UUIDs issued at registration); malformed tokens fail before any store
//! access, unknown tokens fail with `Unauthorized` and are not retried.

use tracing::{debug, info};
use uuid::Uuid;

use crate::ledger::{Ledger, require};
use crate::models::Neighbor;
use crate::store::{Formula, RecordStore, RecordStoreExt};
use crate::{Error, Result};

/// Exact length of a bearer token.
pub const TOKEN_LEN: usize = 36;

/// Check that a token has the fixed credential format.
pub fn validate_token(token: &str) -> Result<()> {
    if token.len() != TOKEN_LEN
        || !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(Error::InvalidToken);
    }
    Ok(())
}

/// Issue a new bearer token.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

impl<S: RecordStore> Ledger<S> {
    /// Resolve a bearer token to exactly one neighbor.
    pub fn resolve(&self, token: &str) -> Result<Neighbor> {
        validate_token(token)?;

        let neighbor = self
            .store
            .find_first::<Neighbor>(&Formula::eq("token", token))?
            .ok_or(Error::Unauthorized)?;

        debug!(neighbor = %neighbor.id, "resolved principal");
        Ok(neighbor)
    }

    /// Register a neighbor and issue their token.
    pub fn register_neighbor(
        &mut self,
        email: &str,
        full_name: Option<String>,
        slack_id: Option<String>,
    ) -> Result<Neighbor> {
        require("email", email)?;
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(Error::InvalidInput(format!("Invalid email: {}", email)));
        }

        if self
            .store
            .find_first::<Neighbor>(&Formula::normalized_eq("email", &email))?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "A neighbor with email {} already exists",
                email
            )));
        }

        let mut neighbor = Neighbor::new(email, generate_token());
        neighbor.full_name = full_name.filter(|s| !s.trim().is_empty());
        neighbor.slack_id = slack_id.filter(|s| !s.trim().is_empty());

        let neighbor = self.store.insert(&neighbor)?;
        info!(neighbor = %neighbor.id, "registered neighbor");
        Ok(neighbor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn test_validate_token_format() {
        assert!(validate_token(&generate_token()).is_ok());
        assert!(validate_token("abcdefghij-abcdefghij-abcdefghij-abc").is_ok());
        assert!(matches!(validate_token(""), Err(Error::InvalidToken)));
        assert!(matches!(validate_token("short"), Err(Error::InvalidToken)));
        assert!(matches!(
            validate_token("abcdefghij abcdefghij abcdefghij abc"),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            validate_token("abcdefghij-abcdefghij-abcdefghij-abcd"),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut ledger = test_utils::ledger();
        let neighbor = test_utils::neighbor(&mut ledger, "ada@example.com");

        let first = ledger.resolve(&neighbor.token).unwrap();
        let second = ledger.resolve(&neighbor.token).unwrap();
        assert_eq!(first.id, neighbor.id);
        assert_eq!(second.id, neighbor.id);
    }

    #[test]
    fn test_resolve_unknown_token_is_unauthorized() {
        let ledger = test_utils::ledger();
        let err = ledger.resolve(&generate_token()).unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn test_resolve_malformed_token_never_reaches_store() {
        let ledger = test_utils::ledger_over(test_utils::FaultyStore::failing_reads());
        assert!(matches!(ledger.resolve("nope"), Err(Error::InvalidToken)));
        // A well-formed token does reach the store, which fails
        assert!(matches!(
            ledger.resolve(&generate_token()),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_register_neighbor_rejects_duplicate_email() {
        let mut ledger = test_utils::ledger();
        ledger
            .register_neighbor("Ada@Example.com", Some("Ada".to_string()), None)
            .unwrap();
        let err = ledger
            .register_neighbor(" ada@example.com ", None, None)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_register_neighbor_issues_valid_token() {
        let mut ledger = test_utils::ledger();
        let neighbor = ledger
            .register_neighbor("grace@example.com", None, Some("U123".to_string()))
            .unwrap();
        assert!(validate_token(&neighbor.token).is_ok());
        assert_eq!(neighbor.slack_id.as_deref(), Some("U123"));
        assert!(!neighbor.id.is_empty());
    }

    #[test]
    fn test_register_neighbor_requires_email() {
        let mut ledger = test_utils::ledger();
        assert!(matches!(
            ledger.register_neighbor("", None, None),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.register_neighbor("not-an-email", None, None),
            Err(Error::InvalidInput(_))
        ));
    }
}
