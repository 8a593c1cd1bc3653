//! In-memory capabilities for tests and host prototyping.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, Semaphore};

use crate::api::BackendApi;
use crate::capabilities::{
    Capabilities, Confirmer, HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse,
    HttpResult, HttpTransport, Navigator, Notifier, RequestBody, StaticTokenProvider,
};
use crate::config::ClientConfig;
use crate::event::{ConfirmPrompt, Notice};
use crate::model::ListItem;
use crate::optimistic::OptimisticList;
use crate::screens::{ListScreen, Resource};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a scripted reply back until [`ReplyGate::open`] is called.
#[derive(Debug, Clone)]
pub struct ReplyGate {
    permits: Arc<Semaphore>,
}

impl ReplyGate {
    fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets one waiting request through.
    pub fn open(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        // The semaphore is never closed, so acquire only fails if it were.
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply { status: u16, body: Vec<u8> },
    Fail(HttpError),
    Gated { status: u16, body: Vec<u8>, gate: ReplyGate },
}

/// Answers requests from a per-route script and records everything sent.
///
/// Replies for a route are used in order; the last one keeps answering.
/// Unscripted routes fail with a connection error.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Scripted>>>,
    recorded: Mutex<Vec<HttpRequest>>,
    arrivals: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: HttpMethod, path: &str, reply: Scripted) {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn reply_json<B: Serialize>(&self, method: HttpMethod, path: &str, status: u16, body: &B) {
        let body = serde_json::to_vec(body).unwrap_or_default();
        self.push(method, path, Scripted::Reply { status, body });
    }

    pub fn reply_raw(&self, method: HttpMethod, path: &str, status: u16, body: &[u8]) {
        self.push(
            method,
            path,
            Scripted::Reply {
                status,
                body: body.to_vec(),
            },
        );
    }

    pub fn fail(&self, method: HttpMethod, path: &str, error: HttpError) {
        self.push(method, path, Scripted::Fail(error));
    }

    /// Scripts a JSON reply that is only delivered once the gate opens.
    pub fn gated_json<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        status: u16,
        body: &B,
    ) -> ReplyGate {
        let gate = ReplyGate::new();
        let body = serde_json::to_vec(body).unwrap_or_default();
        self.push(
            method,
            path,
            Scripted::Gated {
                status,
                body,
                gate: gate.clone(),
            },
        );
        gate
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.recorded).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.recorded).len()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<HttpRequest> {
        lock(&self.recorded)
            .iter()
            .filter(|r| r.method() == method && r.url().path() == path)
            .cloned()
            .collect()
    }

    /// Decoded JSON bodies of the requests sent to a route.
    pub fn json_bodies<T: DeserializeOwned>(&self, method: HttpMethod, path: &str) -> Vec<T> {
        self.requests_to(method, path)
            .iter()
            .filter_map(|r| match r.body() {
                Some(RequestBody::Json(bytes)) => serde_json::from_slice(bytes).ok(),
                _ => None,
            })
            .collect()
    }

    /// Resolves once at least `count` requests have been recorded.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let arrived = self.arrivals.notified();
            if self.request_count() >= count {
                return;
            }
            arrived.await;
        }
    }

    fn next_reply(&self, method: HttpMethod, path: &str) -> Option<Scripted> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let method = request.method();
        let path = request.url().path().to_string();
        let host = request.url().host().to_string();
        let request_id = request.request_id().to_string();
        lock(&self.recorded).push(request);
        self.arrivals.notify_waiters();

        let (status, body) = match self.next_reply(method, &path) {
            Some(Scripted::Reply { status, body }) => (status, body),
            Some(Scripted::Fail(error)) => return Err(error),
            Some(Scripted::Gated { status, body, gate }) => {
                gate.pass().await;
                (status, body)
            }
            None => {
                return Err(HttpError::ConnectionError {
                    host,
                    message: format!("no scripted reply for {method} {path}"),
                })
            }
        };

        let mut headers = HttpHeaders::new();
        headers.insert("Content-Type", "application/json")?;
        Ok(HttpResponse::new(status, headers, body, request_id, 1))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Success { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.notices).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

/// Answers confirmation prompts from a queue, then with a default.
#[derive(Debug)]
pub struct ScriptedConfirmer {
    queued: Mutex<VecDeque<bool>>,
    default_answer: Mutex<bool>,
    prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl Default for ScriptedConfirmer {
    fn default() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default_answer: Mutex::new(true),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedConfirmer {
    /// Sets the answer given once the queue is empty.
    pub fn answer(&self, answer: bool) {
        *lock(&self.default_answer) = answer;
    }

    pub fn queue(&self, answer: bool) {
        lock(&self.queued).push_back(answer);
    }

    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        lock(&self.prompts).push(prompt.clone());
        let queued = lock(&self.queued).pop_front();
        queued.unwrap_or_else(|| *lock(&self.default_answer))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        lock(&self.redirects).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, location: &str) {
        lock(&self.redirects).push(location.to_string());
    }
}

/// A full set of test doubles with a signed-in session.
pub struct TestHarness {
    pub config: ClientConfig,
    pub transport: Arc<MockTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub confirmer: Arc<ScriptedConfirmer>,
    pub navigator: Arc<RecordingNavigator>,
    tokens: Arc<StaticTokenProvider>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub const TOKEN: &'static str = "test-token";

    pub fn new() -> Self {
        Self::with_tokens(StaticTokenProvider::new(Self::TOKEN))
    }

    pub fn signed_out() -> Self {
        Self::with_tokens(StaticTokenProvider::signed_out())
    }

    fn with_tokens(tokens: StaticTokenProvider) -> Self {
        Self {
            config: ClientConfig::default(),
            transport: Arc::new(MockTransport::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            confirmer: Arc::new(ScriptedConfirmer::default()),
            navigator: Arc::new(RecordingNavigator::default()),
            tokens: Arc::new(tokens),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            http: self.transport.clone(),
            tokens: self.tokens.clone(),
            confirm: self.confirmer.clone(),
            notify: self.notifier.clone(),
            navigate: self.navigator.clone(),
        }
    }

    pub fn api(&self) -> BackendApi {
        BackendApi::new(self.config.clone(), &self.capabilities())
    }

    pub fn list<T>(&self, route: &str) -> OptimisticList<T>
    where
        T: ListItem + Serialize + DeserializeOwned,
    {
        OptimisticList::new(self.capabilities(), &self.config, route)
    }

    pub fn screen<R: Resource>(&self) -> ListScreen<R> {
        ListScreen::new(self.config.clone(), self.capabilities())
    }
}
