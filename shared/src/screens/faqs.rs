use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ListScreen, Resource};
use crate::api::endpoints;
use crate::model::Faq;
use crate::optimistic::MutationOutcome;

impl Resource for Faq {
    const LIST_PATH: &'static str = endpoints::FAQS;
    const ITEM_COLLECTION: &'static str = endpoints::FAQS;
    const ROUTE: &'static str = "/admin/faqs";
    const ENVELOPE_KEY: &'static str = "faqs";
    const NOUN: &'static str = "FAQ";
}

pub type FaqsScreen = ListScreen<Faq>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
}

impl NewFaq {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.question.trim().is_empty() {
            return Err("Question is required.");
        }
        if self.answer.trim().is_empty() {
            return Err("Answer is required.");
        }
        Ok(())
    }
}

impl ListScreen<Faq> {
    /// POSTs a new FAQ and appends the record the server returns.
    #[instrument(skip(self, faq))]
    pub async fn create(&self, faq: NewFaq) -> MutationOutcome {
        if let Err(message) = faq.validate() {
            return self.reject_input(message);
        }

        let body = NewFaq::new(faq.question.trim(), faq.answer.trim());
        match self.api().post(endpoints::FAQS, &body).await {
            Ok(created) => {
                if self.accept_created(created).await {
                    self.notify_success("FAQ added");
                } else {
                    self.notify_success("FAQ added. Reload the list to see it.");
                }
                MutationOutcome::Committed
            }
            Err(e) => self.list().report_failure(e),
        }
    }
}
