use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::http::{
    check_response_size, HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse,
    HttpResult, HttpTransport, RequestBody,
};

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn map_error(request: &HttpRequest, e: &reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout {
                timeout_ms: request.timeout_ms(),
                request_id: request.request_id().to_string(),
            }
        } else {
            HttpError::ConnectionError {
                host: request.url().host().to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.url().path(), request_id = %request.request_id())
    )]
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let started = Instant::now();

        let mut builder = self
            .client
            .request(Self::method(request.method()), request.url().as_str())
            .timeout(Duration::from_millis(request.timeout_ms()));

        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }

        builder = match request.body() {
            Some(RequestBody::Json(bytes)) => builder.body(bytes.clone()),
            Some(RequestBody::Multipart(fields)) => {
                let form = fields.iter().fold(reqwest::multipart::Form::new(), |form, field| {
                    form.text(field.name.clone(), field.value.clone())
                });
                builder.multipart(form)
            }
            None => builder,
        };

        let mut response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&request, &e))?;

        let status = response.status().as_u16();
        let mut headers = HttpHeaders::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                // Hop-by-hop headers are rejected by HttpHeaders and are of no use here.
                let _ = headers.insert(name.as_str(), value);
            }
        }

        if let Some(declared) = response.content_length() {
            check_response_size(usize::try_from(declared).unwrap_or(usize::MAX))?;
        }
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::map_error(&request, &e))?
        {
            check_response_size(body.len() + chunk.len())?;
            body.extend_from_slice(&chunk);
        }

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(status, duration_ms, "Response received");

        Ok(HttpResponse::new(
            status,
            headers,
            body,
            request.request_id().to_string(),
            duration_ms,
        ))
    }
}
