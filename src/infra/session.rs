use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::{SessionPort, SessionState};

/// Sessions backed by a fixed set of admin bearer tokens, each mapped to a subject.
///
/// Reports `Loading` until `mark_ready` is called when built with `starting`,
/// mirroring an identity provider that is still fetching its keys.
pub struct StaticTokenSessions {
    tokens: HashMap<String, String>,
    ready: AtomicBool,
}

impl StaticTokenSessions {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            ready: AtomicBool::new(true),
        }
    }

    pub fn starting(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        let sessions = Self::new(tokens);
        sessions.ready.store(false, Ordering::SeqCst);
        sessions
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionPort for StaticTokenSessions {
    async fn session(&self, bearer_token: Option<&str>) -> SessionState {
        if !self.ready.load(Ordering::SeqCst) {
            return SessionState::Loading;
        }
        match bearer_token.and_then(|token| self.tokens.get(token)) {
            Some(subject) => SessionState::Authenticated {
                subject: subject.clone(),
            },
            None => SessionState::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions() -> StaticTokenSessions {
        StaticTokenSessions::new([("s3cret".to_string(), "admin".to_string())])
    }

    #[tokio::test]
    async fn known_tokens_authenticate() {
        assert_eq!(
            sessions().session(Some("s3cret")).await,
            SessionState::Authenticated {
                subject: "admin".to_string()
            }
        );
        assert_eq!(sessions().session(Some("guess")).await, SessionState::Unauthenticated);
        assert_eq!(sessions().session(None).await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn starting_sessions_report_loading() {
        let sessions = StaticTokenSessions::starting([("t".to_string(), "admin".to_string())]);
        assert_eq!(sessions.session(Some("t")).await, SessionState::Loading);
        sessions.mark_ready();
        assert!(matches!(
            sessions.session(Some("t")).await,
            SessionState::Authenticated { .. }
        ));
    }
}
