use std::collections::BTreeSet;
use tracing::{info, instrument};

use super::{ListScreen, Resource};
use crate::api::endpoints;
use crate::bulk::{self, AssignmentPlan, BulkReport};
use crate::error::{AppError, ErrorKind};
use crate::event::Notice;
use crate::model::{ItemId, Property};

impl Resource for Property {
    const LIST_PATH: &'static str = endpoints::PROPERTIES;
    const ITEM_COLLECTION: &'static str = endpoints::PROPERTIES;
    const ROUTE: &'static str = "/admin/properties";
    const ENVELOPE_KEY: &'static str = "properties";
    const NOUN: &'static str = "property";
}

pub type PropertiesScreen = ListScreen<Property>;

impl ListScreen<Property> {
    /// Properties currently confirmed as assigned to `agent`.
    pub async fn assigned_to(&self, agent: ItemId) -> BTreeSet<ItemId> {
        self.list()
            .with_state(|state| {
                state
                    .items()
                    .iter()
                    .filter(|p| p.agent == Some(agent))
                    .map(|p| p.id)
                    .collect()
            })
            .await
    }

    pub async fn unassigned(&self) -> Vec<Property> {
        self.items()
            .await
            .into_iter()
            .filter(|p| p.agent.is_none())
            .collect()
    }

    /// Makes `selection` the set of properties assigned to `agent`.
    ///
    /// Only the difference is sent. When every request has settled the list
    /// is fetched again and the counts are reported in one notice. A rejected
    /// session redirects once for the whole batch and skips the refetch.
    #[instrument(skip(self, selection), fields(agent = %agent))]
    pub async fn save_assignments<I>(&self, agent: ItemId, selection: I) -> BulkReport
    where
        I: IntoIterator<Item = ItemId>,
    {
        let before = self.assigned_to(agent).await;
        let plan = AssignmentPlan::diff(agent, before, selection);
        if plan.is_empty() {
            info!("selection unchanged, nothing to send");
            self.notify_success("No changes");
            return BulkReport::default();
        }

        let report = bulk::execute(self.api(), &plan).await;

        if report.requires_login() {
            self.list().report_failure(AppError::new(
                ErrorKind::Authentication,
                "session rejected during bulk assignment",
            ));
            return report;
        }

        // The screen is going away.
        if report.failures.iter().any(|f| f.error.is_cancelled()) {
            return report;
        }

        self.load().await;

        let summary = report.summary();
        let notice = match report.first_error() {
            None => Notice::success(summary),
            Some(error) => Notice::failed(format!("{summary}. {}", error.user_facing_message())),
        };
        self.list().capabilities().notify.notify(notice);
        report
    }
}
