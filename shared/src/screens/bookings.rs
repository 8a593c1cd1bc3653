use std::collections::BTreeMap;

use super::{ListScreen, Resource};
use crate::api::endpoints;
use crate::model::{Booking, BookingStatus, ItemId};
use crate::optimistic::{MutationError, MutationOutcome};

impl Resource for Booking {
    const LIST_PATH: &'static str = endpoints::BOOKINGS;
    const ITEM_COLLECTION: &'static str = endpoints::BOOKINGS;
    const ROUTE: &'static str = "/admin/bookings";
    const ENVELOPE_KEY: &'static str = "bookings";
    const NOUN: &'static str = "booking";
}

pub type BookingsScreen = ListScreen<Booking>;

impl ListScreen<Booking> {
    pub async fn approve(&self, id: ItemId) -> Result<MutationOutcome, MutationError> {
        self.change_status(id, BookingStatus::Approved).await
    }

    pub async fn reject(&self, id: ItemId) -> Result<MutationOutcome, MutationError> {
        self.change_status(id, BookingStatus::Rejected).await
    }

    /// Bookings in `status`, in list order.
    pub async fn with_status(&self, status: BookingStatus) -> Vec<Booking> {
        self.list()
            .with_state(|state| {
                state
                    .items()
                    .iter()
                    .filter(|b| b.status == status)
                    .cloned()
                    .collect()
            })
            .await
    }

    /// Count per status for the filter tabs. Every status is present.
    pub async fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> =
            BookingStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        self.list()
            .with_state(|state| {
                for booking in state.items() {
                    *counts.entry(booking.status.as_str()).or_default() += 1;
                }
            })
            .await;
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use serde_json::json;

    fn booking(id: u64, status: &str) -> Booking {
        serde_json::from_value(json!({"id": id, "status": status})).unwrap()
    }

    #[tokio::test]
    async fn test_status_counts_cover_every_status() {
        let harness = TestHarness::new();
        let screen: BookingsScreen = harness.screen();
        screen
            .list()
            .replace_all(vec![
                booking(1, "pending"),
                booking(2, "approved"),
                booking(3, "pending"),
            ])
            .await;

        let counts = screen.status_counts().await;

        assert_eq!(counts.len(), BookingStatus::ALL.len());
        assert_eq!(counts["pending"], 2);
        assert_eq!(counts["approved"], 1);
        assert_eq!(counts["cancelled"], 0);
        assert_eq!(
            screen
                .with_status(BookingStatus::Pending)
                .await
                .iter()
                .map(|b| b.id)
                .collect::<Vec<_>>(),
            vec![ItemId(1), ItemId(3)]
        );
    }
}
