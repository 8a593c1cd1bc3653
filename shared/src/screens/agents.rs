use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::instrument;

use super::{ListScreen, Resource};
use crate::api::endpoints;
use crate::event::ConfirmPrompt;
use crate::model::{Agent, ItemId};
use crate::optimistic::{MutationError, MutationOutcome, MutationRequest};

pub const MIN_PASSWORD_LENGTH: usize = 8;

impl Resource for Agent {
    const LIST_PATH: &'static str = endpoints::AGENTS;
    const ITEM_COLLECTION: &'static str = endpoints::ADMIN_USERS;
    const ROUTE: &'static str = "/admin/agents";
    const ENVELOPE_KEY: &'static str = "agents";
    const NOUN: &'static str = "agent";
}

pub type AgentsScreen = ListScreen<Agent>;

/// Account details for a new agent user.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub password: SecretString,
}

impl NewAgent {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("Username is required.");
        }
        validate_email(&self.email)?;
        if self.password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err("Password must be at least 8 characters.");
        }
        Ok(())
    }

    fn body(&self) -> Value {
        json!({
            "username": self.username.trim(),
            "email": self.email.trim(),
            "first_name": self.first_name.trim(),
            "last_name": self.last_name.trim(),
            "phone": self.phone.trim(),
            "password": self.password.expose_secret(),
            "role": "agent",
        })
    }
}

/// Editable profile fields, sent as a full PUT.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentUpdate {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl AgentUpdate {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            username: agent.username.clone(),
            email: agent.email.clone(),
            first_name: agent.first_name.clone(),
            last_name: agent.last_name.clone(),
            phone: agent.phone.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("Username is required.");
        }
        validate_email(&self.email)
    }

    fn apply(self, agent: &mut Agent) {
        agent.username = self.username;
        agent.email = self.email;
        agent.first_name = self.first_name;
        agent.last_name = self.last_name;
        agent.phone = self.phone;
    }
}

fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("Enter a valid email address."),
    }
}

impl ListScreen<Agent> {
    #[instrument(skip(self, agent), fields(username = %agent.username))]
    pub async fn create(&self, agent: NewAgent) -> MutationOutcome {
        if let Err(message) = agent.validate() {
            return self.reject_input(message);
        }
        match self.api().post(endpoints::ADMIN_USERS, &agent.body()).await {
            Ok(created) => {
                if self.accept_created(created).await {
                    self.notify_success("Agent created");
                } else {
                    self.notify_success("Agent created. Reload the list to see it.");
                }
                MutationOutcome::Committed
            }
            Err(e) => self.list().report_failure(e),
        }
    }

    /// Replaces the agent's profile. The row shows the new values while the
    /// PUT is in flight.
    #[instrument(skip(self, update), fields(item_id = %id))]
    pub async fn update(
        &self,
        id: ItemId,
        update: AgentUpdate,
    ) -> Result<MutationOutcome, MutationError> {
        if let Err(message) = update.validate() {
            return Ok(self.reject_input(message));
        }
        let body = update.clone();
        let request = MutationRequest::patch(id, move |agent: &mut Agent| update.apply(agent))
            .with_success_message("Agent updated");
        let path = Agent::item_path(id);

        self.list()
            .mutate(request, || async { self.api().put(&path, &body).await })
            .await
    }

    /// Activates or deactivates the account. Deactivation asks first.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn set_active(
        &self,
        id: ItemId,
        active: bool,
    ) -> Result<MutationOutcome, MutationError> {
        let mut request =
            MutationRequest::patch(id, move |agent: &mut Agent| agent.is_active = active)
                .with_success_message(if active {
                    "Agent activated"
                } else {
                    "Agent deactivated"
                });
        if !active {
            let name = self
                .get(id)
                .await
                .map(|agent| agent.full_name())
                .ok_or(MutationError::NotFound(id))?;
            request = request.with_confirmation(
                ConfirmPrompt::new(
                    "Deactivate agent?",
                    format!("{name} will no longer be able to sign in."),
                )
                .with_confirm_label("Deactivate"),
            );
        }

        let mut fields = Map::new();
        fields.insert("is_active".into(), Value::Bool(active));
        self.patch_item(request, fields).await
    }

    pub async fn active_agents(&self) -> Vec<Agent> {
        self.items()
            .await
            .into_iter()
            .filter(|agent| agent.is_active)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_agent(email: &str, password: &str) -> NewAgent {
        NewAgent {
            username: "mkeller".into(),
            email: email.into(),
            first_name: "Maya".into(),
            last_name: "Keller".into(),
            phone: String::new(),
            password: SecretString::new(password.into()),
        }
    }

    #[test]
    fn test_new_agent_validation() {
        assert!(new_agent("maya@villas.example", "longenough").validate().is_ok());
        assert_eq!(
            new_agent("maya", "longenough").validate(),
            Err("Enter a valid email address.")
        );
        assert_eq!(
            new_agent("maya@villas.example", "short").validate(),
            Err("Password must be at least 8 characters.")
        );
    }

    #[test]
    fn test_new_agent_body_has_agent_role() {
        let body = new_agent("maya@villas.example", "longenough").body();
        assert_eq!(body["role"], "agent");
        assert_eq!(body["password"], "longenough");
    }

    #[test]
    fn test_update_round_trips_agent_fields() {
        let mut agent: Agent = serde_json::from_value(json!({"id": 1, "username": "a"})).unwrap();
        let mut update = AgentUpdate::from_agent(&agent);
        update.email = "a@b.co".into();
        update.first_name = "Ana".into();
        update.apply(&mut agent);
        assert_eq!(agent.email, "a@b.co");
        assert_eq!(agent.full_name(), "Ana");
    }
}
