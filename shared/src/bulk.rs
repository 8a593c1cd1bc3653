//! Property to agent assignment from a multi-select.
//!
//! The selection is reconciled against the confirmed assignments with a set
//! difference, then one PATCH per changed property is sent. All requests run
//! at once and every one of them settles; a failure never cancels the rest.

use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use crate::api::{endpoints, BackendApi};
use crate::error::AppError;
use crate::model::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Assign,
    Unassign,
}

/// Which properties have to change for `agent`'s assignments to match the
/// selection. Both lists are in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub agent: ItemId,
    pub to_assign: Vec<ItemId>,
    pub to_unassign: Vec<ItemId>,
}

impl AssignmentPlan {
    pub fn diff<B, A>(agent: ItemId, before: B, after: A) -> Self
    where
        B: IntoIterator<Item = ItemId>,
        A: IntoIterator<Item = ItemId>,
    {
        let before: BTreeSet<ItemId> = before.into_iter().collect();
        let after: BTreeSet<ItemId> = after.into_iter().collect();
        Self {
            agent,
            to_assign: after.difference(&before).copied().collect(),
            to_unassign: before.difference(&after).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_assign.is_empty() && self.to_unassign.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_assign.len() + self.to_unassign.len()
    }

    /// Body of the PATCH for one property.
    pub fn payload(&self, direction: Direction) -> Map<String, Value> {
        let agent = match direction {
            Direction::Assign => Value::from(self.agent.0),
            Direction::Unassign => Value::Null,
        };
        let mut fields = Map::new();
        fields.insert("agent".into(), agent);
        fields
    }

    fn requests(&self) -> impl Iterator<Item = (ItemId, Direction)> + '_ {
        self.to_assign
            .iter()
            .map(|id| (*id, Direction::Assign))
            .chain(self.to_unassign.iter().map(|id| (*id, Direction::Unassign)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchFailure {
    pub property: ItemId,
    pub direction: Direction,
    pub error: AppError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub assigned: Vec<ItemId>,
    pub unassigned: Vec<ItemId>,
    pub failures: Vec<PatchFailure>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn requires_login(&self) -> bool {
        self.failures.iter().any(|f| f.error.requires_login())
    }

    /// First failure that is not an auth problem, for the error notice.
    pub fn first_error(&self) -> Option<&AppError> {
        self.failures
            .iter()
            .map(|f| &f.error)
            .find(|e| !e.requires_login())
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.assigned.is_empty() {
            parts.push(format!("{} assigned", self.assigned.len()));
        }
        if !self.unassigned.is_empty() {
            parts.push(format!("{} unassigned", self.unassigned.len()));
        }
        if !self.failures.is_empty() {
            parts.push(format!("{} failed", self.failures.len()));
        }
        if parts.is_empty() {
            return "No changes".into();
        }
        format!("Properties: {}", parts.join(", "))
    }
}

/// Sends every PATCH in `plan` concurrently and waits for all of them.
#[instrument(skip(api, plan), fields(agent = %plan.agent, changes = plan.len()))]
pub async fn execute(api: &BackendApi, plan: &AssignmentPlan) -> BulkReport {
    let requests = plan.requests().map(|(property, direction)| async move {
        let path = endpoints::item(endpoints::PROPERTIES, property);
        let result = api.patch(&path, &plan.payload(direction)).await;
        (property, direction, result)
    });

    let mut report = BulkReport::default();
    for (property, direction, result) in join_all(requests).await {
        match (result, direction) {
            (Ok(_), Direction::Assign) => report.assigned.push(property),
            (Ok(_), Direction::Unassign) => report.unassigned.push(property),
            (Err(error), direction) => {
                warn!(%property, ?direction, code = error.code(), "assignment change failed");
                report.failures.push(PatchFailure {
                    property,
                    direction,
                    error,
                });
            }
        }
    }

    info!(
        assigned = report.assigned.len(),
        unassigned = report.unassigned.len(),
        failed = report.failures.len(),
        "bulk assignment settled"
    );
    report
}
