mod abort;
mod http;
mod token;

#[cfg(feature = "reqwest-transport")]
mod transport;

pub use self::abort::{AbortController, AbortSignal};
pub use self::http::{
    check_response_size, ContentType, FormField, HostPolicy, HttpError, HttpHeaders, HttpMethod,
    HttpRequest, HttpResponse, HttpResult, HttpTransport, RequestBody, ValidatedUrl,
    DEFAULT_TIMEOUT_MS, MAX_RESPONSE_BODY_SIZE, MAX_TIMEOUT_MS,
};
pub use self::token::{StaticTokenProvider, TokenError, TokenProvider, ACCESS_TOKEN_KEY};

#[cfg(not(target_arch = "wasm32"))]
pub use self::token::SqliteTokenStore;

#[cfg(feature = "reqwest-transport")]
pub use self::transport::ReqwestTransport;

use async_trait::async_trait;
use std::sync::Arc;

use crate::event::{ConfirmPrompt, Notice};

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Shows toasts and error dialogs.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Performs route changes, e.g. the redirect to the login screen.
pub trait Navigator: Send + Sync {
    fn redirect(&self, location: &str);
}

/// Everything the core needs from its host, injected once at construction.
#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpTransport>,
    pub tokens: Arc<dyn TokenProvider>,
    pub confirm: Arc<dyn Confirmer>,
    pub notify: Arc<dyn Notifier>,
    pub navigate: Arc<dyn Navigator>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
