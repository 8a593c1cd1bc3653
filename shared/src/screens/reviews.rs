use super::{ListScreen, Resource};
use crate::api::endpoints;
use crate::model::{ItemId, Review, ReviewStatus};
use crate::optimistic::{MutationError, MutationOutcome};

impl Resource for Review {
    const LIST_PATH: &'static str = endpoints::REVIEWS;
    const ITEM_COLLECTION: &'static str = endpoints::REVIEWS;
    const ROUTE: &'static str = "/admin/reviews";
    const ENVELOPE_KEY: &'static str = "reviews";
    const NOUN: &'static str = "review";
}

pub type ReviewsScreen = ListScreen<Review>;

impl ListScreen<Review> {
    pub async fn approve(&self, id: ItemId) -> Result<MutationOutcome, MutationError> {
        self.change_status(id, ReviewStatus::Approved).await
    }

    pub async fn reject(&self, id: ItemId) -> Result<MutationOutcome, MutationError> {
        self.change_status(id, ReviewStatus::Rejected).await
    }

    /// Mean rating of approved reviews, `None` when there are none.
    pub async fn average_approved_rating(&self) -> Option<f64> {
        self.list()
            .with_state(|state| {
                let ratings: Vec<f64> = state
                    .items()
                    .iter()
                    .filter(|r| r.status == ReviewStatus::Approved)
                    .map(|r| f64::from(r.rating))
                    .collect();
                if ratings.is_empty() {
                    None
                } else {
                    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
                }
            })
            .await
    }
}
