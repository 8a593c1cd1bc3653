use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::capabilities::{
    AbortSignal, Capabilities, FormField, HttpError, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, TokenProvider, ValidatedUrl,
};
use crate::config::ClientConfig;
use crate::envelope::{parse_list, EnvelopeError, ListPage};
use crate::error::{AppError, AppResult, ErrorKind};
use crate::model::ItemId;

pub mod endpoints {
    use crate::model::ItemId;

    pub const BOOKINGS: &str = "/villas/bookings/";
    pub const AGENTS: &str = "/agents/";
    pub const ADMIN_USERS: &str = "/admin/users/";
    pub const PROPERTIES: &str = "/villas/properties/";
    pub const FAQS: &str = "/api/faqs/";
    pub const REVIEWS: &str = "/villas/reviews/";
    pub const ANALYTICS: &str = "/villas/analytics/";

    /// `/villas/bookings/` + 42 -> `/villas/bookings/42/`
    pub fn item(collection: &str, id: ItemId) -> String {
        format!("{}/{id}/", collection.trim_end_matches('/'))
    }
}

/// REST client for the villa backend. Attaches the bearer token, applies the
/// configured timeout and turns non-2xx responses into [`AppError`]s.
#[derive(Clone)]
pub struct BackendApi {
    config: Arc<ClientConfig>,
    http: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    signal: AbortSignal,
}

impl std::fmt::Debug for BackendApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendApi")
            .field("api_base_url", &self.config.api_base_url)
            .finish_non_exhaustive()
    }
}

impl BackendApi {
    pub fn new(config: ClientConfig, caps: &Capabilities) -> Self {
        Self {
            config: Arc::new(config),
            http: Arc::clone(&caps.http),
            tokens: Arc::clone(&caps.tokens),
            signal: AbortSignal::never(),
        }
    }

    /// Ties every request made through this client to `signal`.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn authorized(&self, method: HttpMethod, url: ValidatedUrl) -> AppResult<HttpRequest> {
        let token = self
            .tokens
            .bearer_token()
            .await?
            .ok_or_else(|| AppError::new(ErrorKind::Authentication, "no access token stored"))?;

        let request = HttpRequest::new(method, url)
            .with_timeout_ms(self.config.request_timeout_ms)?
            .with_header("Accept", "application/json")?
            .with_bearer(token.expose_secret())?;
        Ok(request)
    }

    /// Sends `request`, racing it against the abort signal.
    async fn send(&self, request: HttpRequest) -> AppResult<HttpResponse> {
        let request_id = request.request_id().to_string();
        if self.signal.is_aborted() {
            return Err(HttpError::Cancelled { request_id }.into());
        }

        let method = request.method();
        let path = request.url().path().to_string();
        let response = tokio::select! {
            biased;
            () = self.signal.aborted() => {
                info!(%method, %path, "request aborted");
                return Err(HttpError::Cancelled { request_id }.into());
            }
            result = self.http.execute(request) => result?,
        };

        debug!(
            %method,
            %path,
            status = response.status(),
            duration_ms = response.duration_ms(),
            "response received"
        );

        if response.is_success() {
            Ok(response)
        } else {
            Err(AppError::from_http_status(response.status(), Some(response.body()))
                .with_context("request_id", request_id)
                .with_context("path", path))
        }
    }

    fn json_body(response: &HttpResponse) -> AppResult<Option<Value>> {
        if !response.has_body() {
            return Ok(None);
        }
        match serde_json::from_slice(response.body()) {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(AppError::new(
                ErrorKind::Deserialization,
                format!("response is not JSON: {e}"),
            )
            .with_context("request_id", response.request_id())),
        }
    }

    /// Fetches a collection in any of the known list envelopes.
    #[instrument(skip(self))]
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        envelope_key: &'static str,
    ) -> AppResult<ListPage<T>> {
        let url = self.config.endpoint_url(path)?;
        let request = self.authorized(HttpMethod::Get, url).await?;
        let response = self.send(request).await?;
        let body = Self::json_body(&response)?.unwrap_or(Value::Null);

        parse_list(body, envelope_key).map_err(|e| {
            if let EnvelopeError::UnrecognizedShape { found } = &e {
                error!(%path, %found, "list response in unknown envelope");
            }
            AppError::from(e).with_context("path", path)
        })
    }

    #[instrument(skip(self, query))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = self.config.endpoint_url_with_query(path, query)?;
        let request = self.authorized(HttpMethod::Get, url).await?;
        let response = self.send(request).await?;
        let body = Self::json_body(&response)?.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| {
            AppError::new(ErrorKind::Deserialization, e.to_string()).with_context("path", path)
        })
    }

    /// Sends a JSON body and returns the response body, if any.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> AppResult<Option<Value>> {
        let url = self.config.endpoint_url(path)?;
        let request = self.authorized(method, url).await?.with_json(body)?;
        let response = self.send(request).await?;
        Self::json_body(&response)
    }

    #[instrument(skip(self, body))]
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Option<Value>> {
        self.send_json(HttpMethod::Post, path, body).await
    }

    #[instrument(skip(self, body))]
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Option<Value>> {
        self.send_json(HttpMethod::Put, path, body).await
    }

    /// PATCHes `fields` as JSON. A 415 answer is retried once with the same
    /// fields as multipart form data.
    #[instrument(skip(self, fields))]
    pub async fn patch(&self, path: &str, fields: &Map<String, Value>) -> AppResult<Option<Value>> {
        match self.send_json(HttpMethod::Patch, path, fields).await {
            Err(e) if e.kind == ErrorKind::UnsupportedMediaType => {
                info!(%path, "JSON rejected with 415, retrying as form data");
                let url = self.config.endpoint_url(path)?;
                let request = self
                    .authorized(HttpMethod::Patch, url)
                    .await?
                    .with_multipart(form_fields(fields))?;
                let response = self.send(request).await?;
                Self::json_body(&response)
            }
            other => other,
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> AppResult<()> {
        let url = self.config.endpoint_url(path)?;
        let request = self.authorized(HttpMethod::Delete, url).await?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn delete_item(&self, collection: &str, id: ItemId) -> AppResult<()> {
        self.delete(&endpoints::item(collection, id)).await
    }
}

/// Form encoding of a flat JSON object. `null` becomes an empty field.
pub fn form_fields(fields: &Map<String, Value>) -> Vec<FormField> {
    fields
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            FormField::new(name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_path() {
        assert_eq!(endpoints::item(endpoints::BOOKINGS, ItemId(42)), "/villas/bookings/42/");
        assert_eq!(endpoints::item("/admin/users", ItemId(3)), "/admin/users/3/");
    }

    #[test]
    fn test_form_fields_encoding() {
        let Value::Object(fields) = json!({"agent": null, "status": "approved", "guests": 2}) else {
            unreachable!()
        };
        let encoded = form_fields(&fields);
        let lookup = |name: &str| {
            encoded
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.value.clone())
        };
        assert_eq!(lookup("agent").as_deref(), Some(""));
        assert_eq!(lookup("status").as_deref(), Some("approved"));
        assert_eq!(lookup("guests").as_deref(), Some("2"));
    }
}
