//! Acting-user identity for expression evaluation.
//!
//! Domain expressions may reference the current user (`user.role.name`,
//! `user.id`). The user's attributes come from the session collaborator
//! through the [`IdentitySource`] trait and are derived from already-verified
//! token claims, never from client-editable state.
//!
//! Expected claim layout:
//!
//! ```json
//! {
//!   "user_id": 42,
//!   "email": "ada@example.com",
//!   "full_name": "Ada Lovelace",
//!   "role": "admin",
//!   "permissions": ["fleet.read"],
//!   "preferences": {"lang": "en"},
//!   "is_active": true
//! }
//! ```

use crate::error::IdentityError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Claims consumed by [`UserContext::from_claims`]; registered token claims
/// are dropped. Any other claim is kept as an extra user attribute.
const CLAIM_KEYS: [&str; 14] = [
    "user_id",
    "email",
    "full_name",
    "role",
    "permissions",
    "preferences",
    "is_active",
    "sub",
    "iss",
    "aud",
    "exp",
    "iat",
    "nbf",
    "jti",
];

/// Where a [`UserContext`] came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSource {
    /// Built from verified token claims.
    Claims,
    /// Assembled by hand (tests, tooling). Rejected in strict mode.
    #[default]
    Unverified,
}

/// The acting user's role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Attributes of the acting user, bound to `user` during evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub id: Value,
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// `None` when the user has no role at all; `user.role` is then `null`.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub source: UserSource,
    /// Any further attributes exposed to expressions.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl UserContext {
    /// Build a user context from verified token claims.
    pub fn from_claims(claims: &serde_json::Value) -> Result<Self, IdentityError> {
        let obj = claims.as_object().ok_or(IdentityError::InvalidClaims)?;
        let text = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(String::from);

        let permissions: Vec<String> = obj
            .get("permissions")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|p| p.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let preferences = match obj.get("preferences") {
            Some(serde_json::Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
            _ => BTreeMap::new(),
        };

        let extra = obj
            .iter()
            .filter(|(k, _)| !CLAIM_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();

        let role = match obj.get("role") {
            None | Some(serde_json::Value::Null) if permissions.is_empty() => None,
            _ => Some(Role {
                name: text("role"),
                permissions,
            }),
        };

        Ok(Self {
            id: obj.get("user_id").cloned().map(Value::from).unwrap_or_default(),
            email: text("email"),
            full_name: text("full_name"),
            role,
            preferences,
            is_active: obj
                .get("is_active")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            source: UserSource::Claims,
            extra,
        })
    }

    /// Check that this context is trustworthy enough for strict evaluation.
    pub fn verify(&self) -> Result<(), IdentityError> {
        if self.source != UserSource::Claims {
            warn!("User context missing claims source marker");
            return Err(IdentityError::Unverified);
        }
        if self.id.is_null() {
            return Err(IdentityError::MissingField("id".into()));
        }
        if self.email.is_none() {
            return Err(IdentityError::MissingField("email".into()));
        }
        if self.role_name().is_none() {
            return Err(IdentityError::InvalidRole);
        }
        debug!(email = ?self.email, "Verified user context");
        Ok(())
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref()?.name.as_deref()
    }

    /// The object bound to `user` in expressions.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        map.insert("id".into(), self.id.clone());
        map.insert("email".into(), Value::from(self.email.clone()));
        map.insert("full_name".into(), Value::from(self.full_name.clone()));

        let role = match &self.role {
            Some(role) => {
                let mut fields = BTreeMap::new();
                fields.insert("name".into(), Value::from(role.name.clone()));
                fields.insert("permissions".into(), Value::from(role.permissions.clone()));
                Value::Object(fields)
            }
            None => Value::Null,
        };
        map.insert("role".into(), role);

        map.insert("preferences".into(), Value::Object(self.preferences.clone()));
        map.insert("is_active".into(), Value::Bool(self.is_active));
        Value::Object(map)
    }
}

/// The session collaborator that knows who is acting.
pub trait IdentitySource: Send + Sync {
    /// The current authenticated user, or `None` when unauthenticated.
    fn current_user(&self) -> Option<UserContext>;
}

/// No authenticated user; `user` resolves to an empty object.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentitySource for Anonymous {
    fn current_user(&self) -> Option<UserContext> {
        None
    }
}

/// A fixed user, for tooling and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub UserContext);

impl IdentitySource for StaticIdentity {
    fn current_user(&self) -> Option<UserContext> {
        Some(self.0.clone())
    }
}

/// A user slot the session layer updates on login and logout.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user: RwLock<Option<UserContext>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: UserContext) {
        match self.user.write() {
            Ok(mut slot) => *slot = Some(user),
            Err(poisoned) => *poisoned.into_inner() = Some(user),
        }
    }

    pub fn sign_out(&self) {
        match self.user.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl IdentitySource for SessionIdentity {
    fn current_user(&self) -> Option<UserContext> {
        match self.user.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
