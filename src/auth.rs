//! E-mail/password accounts and bearer-token sessions.
//!
//! Credentials are stored at `credentials/{sha256(lowercased email)}` as
//! `{uid, salt, hash}` where `hash = sha256(salt || password)`, hex encoded.
//! Identities asserted by an external OAuth front bypass this table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};
use crate::ids;
use crate::model::Identity;
use crate::paths;
use crate::profiles;
use crate::store::TreeStore;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
    uid: String,
    salt: String,
    hash: String,
}

fn email_key(email: &str) -> String {
    hex::encode(Sha256::digest(email.trim().to_lowercase().as_bytes()))
}

fn password_hash(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn check_email(email: &str) -> AppResult<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_string())
        }
        _ => Err(AppError::Invalid(format!("'{email}' is not an e-mail address"))),
    }
}

/// Create an account and its profile.  Fails with `Conflict` when the e-mail
/// is taken.
pub fn sign_up(
    store: &TreeStore,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> AppResult<Identity> {
    let email = check_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let uid = ids::new_uid();
    let salt = ids::new_salt();
    let record = CredentialRecord {
        uid: uid.clone(),
        hash: password_hash(&salt, password),
        salt,
    };
    let path = paths::credentials(&email_key(&email));
    store.atomic(|txn| {
        if txn.exists(&path)? {
            return Err(AppError::Conflict("e-mail already registered".to_string()));
        }
        txn.set(&path, serde_json::to_value(&record)?)?;
        Ok(())
    })?;

    let identity = Identity {
        uid,
        display_name: display_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        photo_url: None,
        email: Some(email),
    };
    profiles::sync_profile(store, &identity)?;
    crate::tlog!("auth: signed up {}", crate::logging::user_id(&identity.uid));
    Ok(identity)
}

/// Verify a password and return the account's identity.
pub fn sign_in(store: &TreeStore, email: &str, password: &str) -> AppResult<Identity> {
    let rejected = || AppError::Unauthorized("wrong e-mail or password".to_string());
    let record: CredentialRecord = match store.get(&paths::credentials(&email_key(email)))? {
        Some(v) => serde_json::from_value(v)?,
        None => return Err(rejected()),
    };
    if password_hash(&record.salt, password) != record.hash {
        return Err(rejected());
    }
    let profile = profiles::get_profile(store, &record.uid)?;
    Ok(Identity {
        uid: record.uid,
        display_name: profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .filter(|s| !s.is_empty()),
        photo_url: profile
            .as_ref()
            .map(|p| p.photo_url.clone())
            .filter(|s| !s.is_empty()),
        email: profile
            .map(|p| p.email)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(email.trim().to_string())),
    })
}

/// Check an identity asserted by the OAuth front before trusting it.
pub fn accept_oauth(identity: Identity) -> AppResult<Identity> {
    if identity.uid.trim().is_empty() {
        return Err(AppError::Invalid("uid is required".to_string()));
    }
    crate::store::validate_key(&identity.uid)?;
    if identity.uid.contains('_') {
        return Err(AppError::Invalid("uid cannot contain '_'".to_string()));
    }
    Ok(identity)
}

/// Live sessions: bearer token to identity.
#[derive(Debug, Default)]
pub struct Sessions {
    by_token: HashMap<String, Identity>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its token.
    pub fn open(&mut self, identity: Identity) -> String {
        let token = ids::new_token();
        self.by_token.insert(token.clone(), identity);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<&Identity> {
        self.by_token.get(token)
    }

    /// Refresh the cached identity for every session of `identity.uid`.
    pub fn refresh(&mut self, identity: &Identity) {
        for existing in self.by_token.values_mut() {
            if existing.uid == identity.uid {
                *existing = identity.clone();
            }
        }
    }

    pub fn close(&mut self, token: &str) -> bool {
        self.by_token.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

/// Whether an account is registered for `email`.
pub fn credential_exists(store: &TreeStore, email: &str) -> AppResult<bool> {
    Ok(store.exists(&paths::credentials(&email_key(email)))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::store;
    use serde_json::json;

    #[test]
    fn sign_up_then_sign_in() {
        let store = store();
        let id = sign_up(&store, "Ann@Example.com", "hunter22", Some("Ann")).unwrap();
        assert_eq!(id.uid.len(), ids::UID_LEN);
        assert!(credential_exists(&store, "ann@example.com").unwrap());

        let back = sign_in(&store, "ann@example.com", "hunter22").unwrap();
        assert_eq!(back.uid, id.uid);
        assert_eq!(back.display_name.as_deref(), Some("Ann"));
        assert_eq!(
            profiles::get_profile(&store, &id.uid).unwrap().unwrap().email,
            "Ann@Example.com"
        );
    }

    #[test]
    fn duplicate_email_conflicts() {
        let store = store();
        sign_up(&store, "a@x.test", "secret1", None).unwrap();
        assert!(matches!(
            sign_up(&store, "A@X.test", "secret2", None),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn wrong_password_and_unknown_email_are_unauthorized() {
        let store = store();
        sign_up(&store, "a@x.test", "secret1", None).unwrap();
        assert!(matches!(
            sign_in(&store, "a@x.test", "nope"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            sign_in(&store, "b@x.test", "secret1"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_weak_input() {
        let store = store();
        assert!(sign_up(&store, "not-an-email", "secret1", None).is_err());
        assert!(sign_up(&store, "a@x.test", "123", None).is_err());
    }

    #[test]
    fn stored_hash_is_salted() {
        let store = store();
        sign_up(&store, "a@x.test", "secret1", None).unwrap();
        let rec = store.get(&paths::credentials(&email_key("a@x.test"))).unwrap().unwrap();
        assert_ne!(rec["hash"], json!(hex::encode(Sha256::digest(b"secret1"))));
        assert_eq!(rec["salt"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn oauth_uid_must_be_a_valid_key() {
        let ok = Identity {
            uid: "google-123".into(),
            display_name: Some("G".into()),
            photo_url: None,
            email: None,
        };
        assert!(accept_oauth(ok.clone()).is_ok());
        let bad = Identity { uid: "a/b".into(), ..ok.clone() };
        assert!(accept_oauth(bad).is_err());
        let bad = Identity { uid: "a_b".into(), ..ok };
        assert!(accept_oauth(bad).is_err());
    }

    #[test]
    fn sessions_open_resolve_close() {
        let mut sessions = Sessions::new();
        let alice = Identity {
            uid: "alice".into(),
            display_name: None,
            photo_url: None,
            email: None,
        };
        let token = sessions.open(alice.clone());
        assert_eq!(sessions.resolve(&token), Some(&alice));
        assert!(sessions.close(&token));
        assert!(sessions.resolve(&token).is_none());
        assert!(sessions.is_empty());
    }
}
