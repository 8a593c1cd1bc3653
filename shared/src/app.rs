use tracing::info;

use crate::capabilities::{AbortController, AbortSignal, Capabilities};
use crate::config::{ClientConfig, ConfigError};
use crate::model::{Agent, Booking, Faq, Property, Review};
use crate::screens::{AnalyticsScreen, ListScreen, LoadStatus};

/// Every admin screen, built from one config and one set of capabilities.
///
/// All screens share the dashboard's abort signal; [`Dashboard::shutdown`]
/// cancels whatever is still in flight.
pub struct Dashboard {
    pub bookings: ListScreen<Booking>,
    pub agents: ListScreen<Agent>,
    pub faqs: ListScreen<Faq>,
    pub reviews: ListScreen<Review>,
    pub properties: ListScreen<Property>,
    pub analytics: AnalyticsScreen,
    config: ClientConfig,
    abort: AbortController,
}

impl Dashboard {
    pub fn new(config: ClientConfig, caps: Capabilities) -> Result<Self, ConfigError> {
        config.validate()?;
        let abort = AbortController::new();
        let signal = abort.signal();

        info!(api_base_url = %config.api_base_url, policy = ?config.rollback_policy, "dashboard ready");

        Ok(Self {
            bookings: screen(&config, &caps, &signal),
            agents: screen(&config, &caps, &signal),
            faqs: screen(&config, &caps, &signal),
            reviews: screen(&config, &caps, &signal),
            properties: screen(&config, &caps, &signal),
            analytics: AnalyticsScreen::new(config.clone(), caps).with_signal(signal),
            config,
            abort,
        })
    }

    pub fn from_env(caps: Capabilities) -> Result<Self, ConfigError> {
        Self::new(ClientConfig::from_env()?, caps)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Loads every list screen concurrently.
    pub async fn load_lists(&self) -> [LoadStatus; 5] {
        let (bookings, agents, faqs, reviews, properties) = tokio::join!(
            self.bookings.load(),
            self.agents.load(),
            self.faqs.load(),
            self.reviews.load(),
            self.properties.load(),
        );
        [bookings, agents, faqs, reviews, properties]
    }

    pub fn shutdown(&self) {
        info!("dashboard shutting down, aborting requests");
        self.abort.abort();
    }

    pub fn is_shut_down(&self) -> bool {
        self.abort.is_aborted()
    }
}

fn screen<R: crate::screens::Resource>(
    config: &ClientConfig,
    caps: &Capabilities,
    signal: &AbortSignal,
) -> ListScreen<R> {
    ListScreen::new(config.clone(), caps.clone()).with_signal(signal.clone())
}
