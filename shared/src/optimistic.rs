//! Snapshot, speculate, then confirm or revert.
//!
//! Every list screen funnels its edits and deletes through
//! [`OptimisticList::mutate`]. The list is updated before the request goes
//! out, the request runs without any lock held, and the result either keeps
//! (and refines) the speculation or restores the snapshot. Each call ends in
//! at most one user facing notice.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::capabilities::Capabilities;
use crate::collection::{CollectionState, Rollback};
use crate::config::{ClientConfig, RollbackPolicy};
use crate::error::{AppError, AppResult, ErrorKind};
use crate::event::{ConfirmPrompt, Notice};
use crate::model::{ItemId, ListItem};

/// Local change applied before the server answers.
pub enum Speculation<T> {
    Patch(Box<dyn FnOnce(&mut T) + Send>),
    Remove,
}

impl<T> Speculation<T> {
    pub fn patch<F>(patch: F) -> Self
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        Self::Patch(Box::new(patch))
    }
}

impl<T> std::fmt::Debug for Speculation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patch(_) => f.write_str("Patch"),
            Self::Remove => f.write_str("Remove"),
        }
    }
}

#[derive(Debug)]
pub struct MutationRequest<T> {
    pub id: ItemId,
    pub speculation: Speculation<T>,
    pub confirm: Option<ConfirmPrompt>,
    pub success_message: String,
}

impl<T> MutationRequest<T> {
    pub fn patch<F>(id: ItemId, patch: F) -> Self
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        Self {
            id,
            speculation: Speculation::patch(patch),
            confirm: None,
            success_message: "Saved".into(),
        }
    }

    pub fn remove(id: ItemId) -> Self {
        Self {
            id,
            speculation: Speculation::Remove,
            confirm: None,
            success_message: "Deleted".into(),
        }
    }

    #[must_use]
    pub fn with_confirmation(mut self, prompt: ConfirmPrompt) -> Self {
        self.confirm = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }
}

/// How a mutation ended. None of these are errors from the caller's point
/// of view; the user has already been told.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Committed,
    /// The user answered "no" to the confirmation dialog.
    Declined,
    AuthenticationRequired,
    Failed(AppError),
    Cancelled,
}

impl MutationOutcome {
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// The mutation was rejected before anything happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("item {0} is not in the list")]
    NotFound(ItemId),

    #[error("item {0} already has a change in progress")]
    AlreadyInProgress(ItemId),
}

impl From<MutationError> for AppError {
    fn from(e: MutationError) -> Self {
        let kind = match e {
            MutationError::NotFound(_) => ErrorKind::NotFound,
            MutationError::AlreadyInProgress(_) => ErrorKind::Conflict,
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Debug, Default)]
pub struct MutationMetrics {
    pub started: AtomicU64,
    pub committed: AtomicU64,
    pub rolled_back: AtomicU64,
    pub rejected_in_progress: AtomicU64,
    pub declined: AtomicU64,
    pub cancelled: AtomicU64,
    pub auth_failures: AtomicU64,
}

impl MutationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MutationMetricsSnapshot {
        MutationMetricsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            rejected_in_progress: self.rejected_in_progress.load(Ordering::Relaxed),
            declined: self.declined.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationMetricsSnapshot {
    pub started: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub rejected_in_progress: u64,
    pub declined: u64,
    pub cancelled: u64,
    pub auth_failures: u64,
}

/// Tells the user about a failed operation: a redirect for auth problems,
/// nothing for cancellations, one error notice otherwise.
pub(crate) fn surface_failure(
    caps: &Capabilities,
    login_url: &str,
    error: AppError,
) -> MutationOutcome {
    if error.is_cancelled() {
        return MutationOutcome::Cancelled;
    }
    if error.requires_login() {
        warn!(code = error.code(), "session rejected, redirecting to login");
        caps.navigate.redirect(login_url);
        caps.notify.notify(Notice::AuthenticationRequired {
            login_url: login_url.to_string(),
        });
        return MutationOutcome::AuthenticationRequired;
    }
    caps.notify.notify(Notice::failed(error.user_facing_message()));
    MutationOutcome::Failed(error)
}

/// Overlays the top level fields of a server response onto `item`.
/// The id is never taken from the body. When the body as a whole does not
/// decode, fields are applied one at a time and the ones that do not fit the
/// local type are skipped.
pub fn merge_server_fields<T>(item: &T, body: &Value) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let base = serde_json::to_value(item)?;
    let (Value::Object(target), Value::Object(fields)) = (&base, body) else {
        return T::deserialize(&base);
    };
    let fields: Vec<(&String, &Value)> = fields.iter().filter(|(key, _)| *key != "id").collect();

    let mut whole = target.clone();
    for (key, value) in &fields {
        whole.insert((*key).clone(), (*value).clone());
    }
    if let Ok(merged) = serde_json::from_value(Value::Object(whole)) {
        return Ok(merged);
    }

    let mut accepted = target.clone();
    for (key, value) in fields {
        let mut candidate = accepted.clone();
        candidate.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(candidate.clone())).is_ok() {
            accepted = candidate;
        } else {
            warn!(field = %key, "server field does not fit the local record, skipped");
        }
    }
    serde_json::from_value(Value::Object(accepted))
}

/// A screen's list, shared between the view and in-flight mutations.
pub struct OptimisticList<T> {
    state: Arc<RwLock<CollectionState<T>>>,
    caps: Capabilities,
    policy: RollbackPolicy,
    login_url: String,
    metrics: Arc<MutationMetrics>,
}

impl<T> Clone for OptimisticList<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            caps: self.caps.clone(),
            policy: self.policy,
            login_url: self.login_url.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T> OptimisticList<T>
where
    T: ListItem + Serialize + DeserializeOwned,
{
    /// `route` is the screen's own path, used as the post-login return target.
    pub fn new(caps: Capabilities, config: &ClientConfig, route: &str) -> Self {
        Self {
            state: Arc::new(RwLock::new(CollectionState::new())),
            caps,
            policy: config.rollback_policy,
            login_url: config.login_url(route),
            metrics: Arc::new(MutationMetrics::new()),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    pub fn metrics(&self) -> MutationMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn items(&self) -> Vec<T> {
        self.state.read().await.snapshot_all()
    }

    pub async fn get(&self, id: ItemId) -> Option<T> {
        self.state.read().await.get(id).cloned()
    }

    pub async fn is_pending(&self, id: ItemId) -> bool {
        self.state.read().await.pending().contains(id)
    }

    pub async fn pending_ids(&self) -> Vec<ItemId> {
        self.state.read().await.pending().sorted()
    }

    /// Runs `f` against the current state under a read lock.
    pub async fn with_state<R>(&self, f: impl FnOnce(&CollectionState<T>) -> R) -> R {
        f(&*self.state.read().await)
    }

    pub async fn replace_all(&self, items: Vec<T>) {
        self.state.write().await.replace_all(items);
    }

    /// Adds a record the server has already created.
    pub async fn insert_confirmed(&self, item: T) {
        self.state.write().await.upsert(item);
    }

    /// Reports a failure that did not go through [`Self::mutate`].
    pub fn report_failure(&self, error: AppError) -> MutationOutcome {
        let outcome = surface_failure(&self.caps, &self.login_url, error);
        if outcome == MutationOutcome::AuthenticationRequired {
            self.metrics.auth_failures.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    fn check_ready(&self, state: &CollectionState<T>, id: ItemId) -> Result<(), MutationError> {
        if !state.contains(id) {
            return Err(MutationError::NotFound(id));
        }
        if state.pending().contains(id) {
            self.metrics.rejected_in_progress.fetch_add(1, Ordering::Relaxed);
            return Err(MutationError::AlreadyInProgress(id));
        }
        Ok(())
    }

    #[instrument(skip(self, request, action), fields(item_id = %request.id, speculation = ?request.speculation))]
    pub async fn mutate<F, Fut>(
        &self,
        request: MutationRequest<T>,
        action: F,
    ) -> Result<MutationOutcome, MutationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Option<Value>>>,
    {
        let MutationRequest {
            id,
            speculation,
            confirm,
            success_message,
        } = request;

        self.check_ready(&*self.state.read().await, id)?;

        if let Some(prompt) = confirm {
            if !self.caps.confirm.confirm(&prompt).await {
                self.metrics.declined.fetch_add(1, Ordering::Relaxed);
                info!("change declined by user");
                return Ok(MutationOutcome::Declined);
            }
        }

        let (rollback, is_removal) = {
            let mut state = self.state.write().await;
            // The dialog may have been open while another change started or
            // a reload dropped the item.
            self.check_ready(&state, id)?;

            let rollback = match self.policy {
                RollbackPolicy::FullSnapshot => Rollback::Full(state.snapshot_all()),
                RollbackPolicy::PerItem => match state.snapshot_item(id) {
                    Some(snapshot) => Rollback::Item(snapshot),
                    None => return Err(MutationError::NotFound(id)),
                },
            };
            state.pending_mut().insert(id);

            let is_removal = match speculation {
                Speculation::Patch(patch) => {
                    state.update(id, patch);
                    false
                }
                Speculation::Remove => {
                    state.remove(id);
                    true
                }
            };
            (rollback, is_removal)
        };
        self.metrics.started.fetch_add(1, Ordering::Relaxed);

        let result = action().await;

        let mut state = self.state.write().await;
        state.pending_mut().remove(id);

        match result {
            Ok(body) => {
                if let (false, Some(body)) = (is_removal, body) {
                    if let Some(item) = state.get_mut(id) {
                        match merge_server_fields(&*item, &body) {
                            Ok(merged) => *item = merged,
                            Err(e) => warn!(error = %e, "server body not merged, keeping local change"),
                        }
                    }
                }
                drop(state);

                self.metrics.committed.fetch_add(1, Ordering::Relaxed);
                info!("change committed");
                self.caps.notify.notify(Notice::success(success_message));
                Ok(MutationOutcome::Committed)
            }
            Err(error) => {
                // A reload may have dropped the patched row in the meantime.
                let row_gone = matches!(rollback, Rollback::Item(_))
                    && !is_removal
                    && !state.contains(id);
                if !row_gone {
                    state.rollback(rollback);
                }
                drop(state);

                self.metrics.rolled_back.fetch_add(1, Ordering::Relaxed);
                if error.is_cancelled() {
                    self.metrics.cancelled.fetch_add(1, Ordering::Relaxed);
                    info!("change cancelled, local state restored");
                } else {
                    warn!(code = error.code(), status = ?error.status, "change failed, local state restored");
                }
                Ok(self.report_failure(error))
            }
        }
    }
}
