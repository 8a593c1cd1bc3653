//! Admin and agent list screens.
//!
//! Each screen is a [`ListScreen`] over one record type. Loading, the view
//! model and delete are shared; per-screen operations live in the submodules.

pub mod agents;
pub mod analytics;
pub mod bookings;
pub mod faqs;
pub mod properties;
pub mod reviews;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::api::{endpoints, BackendApi};
use crate::capabilities::{AbortSignal, Capabilities};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::event::{ConfirmPrompt, Notice};
use crate::model::{HasStatus, ItemId, ListItem};
use crate::optimistic::{MutationError, MutationOutcome, MutationRequest, OptimisticList};

pub use self::agents::{AgentUpdate, NewAgent};
pub use self::analytics::{AnalyticsScreen, AnalyticsSummary, DateRange};
pub use self::faqs::NewFaq;

/// A record type with its own list screen and REST collection.
pub trait Resource: ListItem + Serialize + DeserializeOwned {
    /// Where the list is fetched from.
    const LIST_PATH: &'static str;
    /// Base of the per-item endpoints. Usually the same as `LIST_PATH`.
    const ITEM_COLLECTION: &'static str;
    /// The screen's own route, used as the return path after login.
    const ROUTE: &'static str;
    /// Key of the named list envelope, e.g. `{"bookings": [..]}`.
    const ENVELOPE_KEY: &'static str;
    /// Lower case singular used in dialogs and notices.
    const NOUN: &'static str;

    fn item_path(id: ItemId) -> String {
        endpoints::item(Self::ITEM_COLLECTION, id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl LoadStatus {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Row<T> {
    pub item: T,
    /// Set while a change to this row is in flight.
    pub controls_disabled: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ListView<T> {
    pub status: LoadStatus,
    pub rows: Vec<Row<T>>,
}

impl<T> ListView<T> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub(crate) fn capitalized(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct ListScreen<R> {
    api: BackendApi,
    list: OptimisticList<R>,
    status: Arc<RwLock<LoadStatus>>,
}

impl<R> Clone for ListScreen<R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            list: self.list.clone(),
            status: Arc::clone(&self.status),
        }
    }
}

impl<R: Resource> ListScreen<R> {
    pub fn new(config: ClientConfig, caps: Capabilities) -> Self {
        let list = OptimisticList::new(caps.clone(), &config, R::ROUTE);
        Self {
            api: BackendApi::new(config, &caps),
            list,
            status: Arc::new(RwLock::new(LoadStatus::Idle)),
        }
    }

    /// Cancels outstanding requests when the screen goes away.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.api = self.api.with_signal(signal);
        self
    }

    pub fn api(&self) -> &BackendApi {
        &self.api
    }

    pub fn list(&self) -> &OptimisticList<R> {
        &self.list
    }

    pub async fn status(&self) -> LoadStatus {
        self.status.read().await.clone()
    }

    pub async fn items(&self) -> Vec<R> {
        self.list.items().await
    }

    pub async fn get(&self, id: ItemId) -> Option<R> {
        self.list.get(id).await
    }

    /// Fetches the whole collection, replacing what is shown.
    #[instrument(skip(self), fields(resource = R::NOUN))]
    pub async fn load(&self) -> LoadStatus {
        *self.status.write().await = LoadStatus::Loading;

        let status = match self.fetch_into_list().await {
            Ok(count) => {
                info!(count, "list loaded");
                LoadStatus::Ready
            }
            Err(e) if e.is_cancelled() => LoadStatus::Idle,
            Err(e) => {
                if e.kind == ErrorKind::UnexpectedShape {
                    error!(code = e.code(), "list could not be read");
                } else {
                    warn!(code = e.code(), status = ?e.status, "list load failed");
                }
                let message = e.user_facing_message();
                self.list.replace_all(Vec::new()).await;
                self.list.report_failure(e);
                LoadStatus::Failed(message)
            }
        };

        *self.status.write().await = status.clone();
        status
    }

    async fn fetch_into_list(&self) -> AppResult<usize> {
        let page = self.api.get_list::<R>(R::LIST_PATH, R::ENVELOPE_KEY).await?;
        let count = page.items.len();
        self.list.replace_all(page.items).await;
        Ok(count)
    }

    pub async fn view(&self) -> ListView<R> {
        let status = self.status().await;
        let rows = self
            .list
            .with_state(|state| {
                state
                    .items()
                    .iter()
                    .map(|item| Row {
                        controls_disabled: state.pending().contains(item.id()),
                        item: item.clone(),
                    })
                    .collect()
            })
            .await;
        ListView { status, rows }
    }

    async fn label_of(&self, id: ItemId) -> Result<String, MutationError> {
        self.list
            .get(id)
            .await
            .map(|item| item.label())
            .ok_or(MutationError::NotFound(id))
    }

    /// Removes the row after confirmation and sends the DELETE.
    #[instrument(skip(self), fields(resource = R::NOUN, item_id = %id))]
    pub async fn delete(&self, id: ItemId) -> Result<MutationOutcome, MutationError> {
        let label = self.label_of(id).await?;
        let request = MutationRequest::remove(id)
            .with_confirmation(ConfirmPrompt::delete(R::NOUN, &label))
            .with_success_message(format!("{} deleted", capitalized(R::NOUN)));
        let path = R::item_path(id);

        self.list
            .mutate(request, || async { self.api.delete(&path).await.map(|()| None) })
            .await
    }

    /// Applies `request` locally and PATCHes `fields` to the item endpoint.
    pub(crate) async fn patch_item(
        &self,
        request: MutationRequest<R>,
        fields: Map<String, Value>,
    ) -> Result<MutationOutcome, MutationError> {
        let path = R::item_path(request.id);
        self.list
            .mutate(request, || async { self.api.patch(&path, &fields).await })
            .await
    }

    /// Shows a record the server just created, reloading the list when the
    /// response carries no usable record. Returns whether the record is now
    /// listed. A failed reload is only logged; the caller owns the notice.
    pub(crate) async fn accept_created(&self, body: Option<Value>) -> bool {
        if let Some(body) = body {
            match serde_json::from_value::<R>(body) {
                Ok(item) => {
                    self.list.insert_confirmed(item).await;
                    return true;
                }
                Err(e) => warn!(error = %e, "created record not decodable, reloading"),
            }
        }
        match self.fetch_into_list().await {
            Ok(_) => {
                *self.status.write().await = LoadStatus::Ready;
                true
            }
            Err(e) => {
                warn!(code = e.code(), status = ?e.status, "reload after create failed");
                false
            }
        }
    }

    pub(crate) fn notify_success(&self, message: impl Into<String>) {
        self.list.capabilities().notify.notify(Notice::success(message));
    }

    /// Rejects input before any request is made.
    pub(crate) fn reject_input(&self, message: &str) -> MutationOutcome {
        self.list
            .report_failure(AppError::new(ErrorKind::Validation, "invalid input").with_detail(message))
    }
}

impl<R> ListScreen<R>
where
    R: Resource + HasStatus,
{
    /// Moves an item to `status` after confirmation. The server's answer
    /// decides the final status shown.
    #[instrument(skip(self, status), fields(resource = R::NOUN, item_id = %id, status = %status))]
    pub async fn change_status(
        &self,
        id: ItemId,
        status: R::Status,
    ) -> Result<MutationOutcome, MutationError> {
        let label = self.label_of(id).await?;
        let wire = match serde_json::to_value(status) {
            Ok(wire) => wire,
            Err(e) => {
                return Ok(self
                    .list
                    .report_failure(AppError::new(ErrorKind::Internal, e.to_string())))
            }
        };

        let prompt = ConfirmPrompt::new(
            format!("Change {} status?", R::NOUN),
            format!("{label} will be marked as {status}."),
        )
        .with_confirm_label(status.to_string());
        let request = MutationRequest::patch(id, move |item: &mut R| item.set_status(status))
            .with_confirmation(prompt)
            .with_success_message(format!("{} marked as {status}", capitalized(R::NOUN)));

        let mut fields = Map::new();
        fields.insert("status".into(), wire);
        self.patch_item(request, fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalized() {
        assert_eq!(capitalized("booking"), "Booking");
        assert_eq!(capitalized("FAQ"), "FAQ");
        assert_eq!(capitalized(""), "");
    }

    #[test]
    fn test_load_status_serialization() {
        assert_eq!(
            serde_json::to_value(LoadStatus::Failed("down".into())).unwrap(),
            serde_json::json!({"state": "failed", "message": "down"})
        );
        assert_eq!(
            serde_json::to_value(LoadStatus::Ready).unwrap(),
            serde_json::json!({"state": "ready"})
        );
    }
}
