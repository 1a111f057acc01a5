use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use super::session_store::KeyValueStore;

const STORAGE_KEY: &str = "olxcat_auth_state";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub graph_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

// Tokens are never printed, only whether they are present
impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("has_jwt", &self.jwt.is_some())
            .field("has_graph_token", &self.graph_token.is_some())
            .field("user", &self.user)
            .finish()
    }
}

/// Partial update for [`AuthStore::set_all`]; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct AuthUpdate {
    pub jwt: Option<Option<String>>,
    pub graph_token: Option<Option<String>>,
    pub user: Option<Option<AuthUser>>,
}

/// Holds the backend JWT and the Outlook (Graph) token for the session.
///
/// State is persisted to the session store on every change and broadcast on
/// a watch channel, so background tasks can wait for a login.
#[derive(Clone)]
pub struct AuthStore {
    store: Arc<dyn KeyValueStore>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let initial = read_state(store.as_ref());
        let (state, _) = watch::channel(initial);

        Self {
            store,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn jwt(&self) -> Option<String> {
        self.state.borrow().jwt.clone()
    }

    pub fn graph_token(&self) -> Option<String> {
        self.state.borrow().graph_token.clone()
    }

    pub fn set_jwt(&self, jwt: Option<String>) {
        self.set_all(AuthUpdate {
            jwt: Some(jwt),
            ..Default::default()
        });
    }

    pub fn set_graph_token(&self, graph_token: Option<String>) {
        self.set_all(AuthUpdate {
            graph_token: Some(graph_token),
            ..Default::default()
        });
    }

    pub fn set_user(&self, user: Option<AuthUser>) {
        self.set_all(AuthUpdate {
            user: Some(user),
            ..Default::default()
        });
    }

    pub fn set_all(&self, update: AuthUpdate) {
        self.state.send_modify(|state| {
            if let Some(jwt) = update.jwt {
                state.jwt = jwt;
            }
            if let Some(graph_token) = update.graph_token {
                state.graph_token = graph_token;
            }
            if let Some(user) = update.user {
                state.user = user;
            }
        });

        let state = self.state();
        tracing::debug!(
            jwt_len = state.jwt.as_deref().map_or(0, str::len),
            graph_token_len = state.graph_token.as_deref().map_or(0, str::len),
            has_user = state.user.is_some(),
            "Auth state updated"
        );
        self.persist(&state);
    }

    pub fn clear(&self) {
        self.state.send_replace(AuthState::default());
        tracing::debug!("Auth state cleared");
        self.persist(&AuthState::default());
    }

    /// Both the backend JWT and the Graph token are held
    pub fn has_tokens(&self) -> bool {
        let state = self.state.borrow();
        state.jwt.is_some() && state.graph_token.is_some()
    }

    /// A backend JWT is held; enough for endpoints that skip the Graph token
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().jwt.is_some()
    }

    /// Receiver that wakes on every auth change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn persist(&self, state: &AuthState) {
        match serde_json::to_string(state) {
            Ok(raw) => self.store.set(STORAGE_KEY, &raw),
            Err(e) => tracing::warn!("Failed to serialize auth state: {}", e),
        }
    }
}

fn read_state(store: &dyn KeyValueStore) -> AuthState {
    store
        .get(STORAGE_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::session_store::MemoryStore;

    #[test]
    fn test_state_is_persisted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let auth = AuthStore::new(store.clone());
        auth.set_jwt(Some("jwt-1".to_string()));
        auth.set_graph_token(Some("graph-1".to_string()));

        let restored = AuthStore::new(store);
        assert_eq!(restored.jwt(), Some("jwt-1".to_string()));
        assert!(restored.has_tokens());
    }

    #[test]
    fn test_unreadable_state_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(STORAGE_KEY, "{{{");

        let auth = AuthStore::new(store);
        assert_eq!(auth.state(), AuthState::default());
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_clear_drops_everything() {
        let auth = AuthStore::new(Arc::new(MemoryStore::new()));
        auth.set_all(AuthUpdate {
            jwt: Some(Some("jwt".to_string())),
            graph_token: Some(Some("graph".to_string())),
            user: Some(Some(AuthUser {
                id: "u1".to_string(),
                email: "u1@example.com".to_string(),
                name: "User".to_string(),
            })),
        });
        assert!(auth.has_tokens());

        auth.clear();
        assert_eq!(auth.state(), AuthState::default());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let state = AuthState {
            jwt: Some("secret-jwt".to_string()),
            graph_token: None,
            user: None,
        };
        let printed = format!("{state:?}");
        assert!(!printed.contains("secret-jwt"));
        assert!(printed.contains("has_jwt: true"));
    }

    #[tokio::test]
    async fn test_subscribers_see_login() {
        let auth = AuthStore::new(Arc::new(MemoryStore::new()));
        let mut changes = auth.subscribe();

        auth.set_jwt(Some("jwt".to_string()));
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().jwt.as_deref(), Some("jwt"));
    }
}
