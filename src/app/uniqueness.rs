//! Name uniqueness checks for the admin forms.
//!
//! `UniquenessValidator` answers one question per call and fails closed.
//! `DebouncedNameField` wraps it for keystroke input: checks fire only after a
//! quiet period, and a response is applied only if the field still holds the
//! name it was issued for.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::ports::NameCheckPort;
use crate::domain::{names_match, EntityId, EntityKind};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameStatus {
    /// Nothing entered yet.
    Missing,
    /// Input changed; a check is scheduled or in flight.
    Pending,
    Unique,
    Duplicate,
    /// The check itself failed. Treated as taken until a retry succeeds.
    Unverified(String),
}

impl NameStatus {
    pub fn allows_submit(&self) -> bool {
        matches!(self, NameStatus::Unique)
    }

    pub fn describe(&self) -> String {
        match self {
            NameStatus::Missing => "name is required".to_string(),
            NameStatus::Pending => "name check still in progress".to_string(),
            NameStatus::Unique => "name is available".to_string(),
            NameStatus::Duplicate => "name is already taken".to_string(),
            NameStatus::Unverified(reason) => {
                format!("could not verify name, please retry ({reason})")
            }
        }
    }
}

/// Receiver side of a name field's status, read by the controllers before submitting.
pub type NameGate = watch::Receiver<NameStatus>;

/// A gate fixed to one status.
#[cfg(test)]
pub fn fixed_gate(status: NameStatus) -> NameGate {
    let (_tx, rx) = watch::channel(status);
    rx
}

#[derive(Clone)]
pub struct UniquenessValidator {
    port: Arc<dyn NameCheckPort>,
    kind: EntityKind,
    original: Option<(EntityId, String)>,
}

impl UniquenessValidator {
    /// Validator for a new entity: every non-empty name is checked.
    pub fn for_new(port: Arc<dyn NameCheckPort>, kind: EntityKind) -> Self {
        Self {
            port,
            kind,
            original: None,
        }
    }

    /// Validator for an existing entity: its own persisted name never conflicts.
    pub fn for_existing(
        port: Arc<dyn NameCheckPort>,
        kind: EntityKind,
        id: EntityId,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            port,
            kind,
            original: Some((id, original_name.into())),
        }
    }

    pub async fn check(&self, candidate: &str) -> NameStatus {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return NameStatus::Missing;
        }
        if let Some((_, original)) = &self.original {
            if names_match(original, candidate) {
                return NameStatus::Unique;
            }
        }

        metrics::names::checked();
        let exclude = self.original.as_ref().map(|(id, _)| id);
        match self.port.name_exists(self.kind, candidate, exclude).await {
            Ok(false) => NameStatus::Unique,
            Ok(true) => NameStatus::Duplicate,
            Err(e) => {
                warn!(kind = %self.kind, name = candidate, "Name check failed, treating as taken: {}", e);
                metrics::names::check_failed();
                NameStatus::Unverified(e.to_string())
            }
        }
    }
}

/// Cancellable one-shot timer. Scheduling replaces whatever was pending; a task
/// that has already fired runs to completion on its own.
#[derive(Default)]
pub struct DebounceTimer {
    pending: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct FieldState {
    current: String,
    timer: DebounceTimer,
}

/// A name input whose uniqueness is re-checked after each settled edit.
#[derive(Clone)]
pub struct DebouncedNameField {
    validator: UniquenessValidator,
    quiet: Duration,
    state: Arc<Mutex<FieldState>>,
    status: Arc<watch::Sender<NameStatus>>,
}

impl DebouncedNameField {
    pub fn new(validator: UniquenessValidator, quiet: Duration) -> Self {
        let (status, _) = watch::channel(NameStatus::Missing);
        Self {
            validator,
            quiet,
            state: Arc::new(Mutex::new(FieldState {
                current: String::new(),
                timer: DebounceTimer::default(),
            })),
            status: Arc::new(status),
        }
    }

    /// Field for an existing entity, starting from its persisted name (which is unique).
    pub fn with_initial(validator: UniquenessValidator, quiet: Duration, name: &str) -> Self {
        let field = Self::new(validator, quiet);
        field.lock().current = name.to_string();
        field.status.send_replace(NameStatus::Unique);
        field
    }

    pub fn subscribe(&self) -> NameGate {
        self.status.subscribe()
    }

    pub fn status(&self) -> NameStatus {
        self.status.borrow().clone()
    }

    pub fn current(&self) -> String {
        self.lock().current.clone()
    }

    /// Record a keystroke. Must be called from within a Tokio runtime.
    pub fn input(&self, name: &str) {
        let mut state = self.lock();
        state.current = name.to_string();

        if name.trim().is_empty() {
            state.timer.cancel();
            self.status.send_replace(NameStatus::Missing);
            return;
        }

        self.status.send_replace(NameStatus::Pending);

        let captured = name.to_string();
        let validator = self.validator.clone();
        let field_state = Arc::clone(&self.state);
        let status_tx = Arc::clone(&self.status);
        state.timer.schedule(self.quiet, async move {
            let result = validator.check(&captured).await;
            let still_current = field_state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .current
                == captured;
            if still_current {
                debug!(name = %captured, ?result, "Name check applied");
                status_tx.send_replace(result);
            } else {
                debug!(name = %captured, "Discarding stale name check");
                metrics::names::stale_discarded();
            }
        });
    }

    /// Wait until the latest input has been checked or cleared.
    pub async fn settled(&self) -> NameStatus {
        let mut gate = self.status.subscribe();
        let settled = match gate.wait_for(|status| *status != NameStatus::Pending).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        settled
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FieldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
