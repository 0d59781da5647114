use crate::{
    client_utils::{decode_body, join_url, with_query},
    opentelemetry::trace_request,
    payloads::{ArtworkUpload, LoginRequest, Payload},
    transport::{HttpRequest, HttpTransport, RequestBody, ReqwestTransport},
    ClientError, ClientResult, CollectionPage, ListResponse, Session, SessionStore,
    MY_REGISTRATIONS_PATH,
};
use futures::Stream;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    env,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_AUTH_SCHEME: &str = "Token";

/// Invoked when the server rejects the stored credentials. The host
/// application decides what "go to login" means.
pub type UnauthenticatedHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiClientOptions {
    pub base_url: String,
    pub default_headers: Vec<(String, String)>,
    /// Prefix of the `Authorization` header value, e.g. `Token` or `Bearer`.
    pub auth_scheme: String,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
        }
    }
}

impl ApiClientOptions {
    /// Read `ARTSCLUB_API_URL` and `ARTSCLUB_AUTH_SCHEME`, falling back to the
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("ARTSCLUB_API_URL").unwrap_or(defaults.base_url),
            auth_scheme: env::var("ARTSCLUB_AUTH_SCHEME").unwrap_or(defaults.auth_scheme),
            default_headers: defaults.default_headers,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    #[must_use]
    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Shape of the login endpoint's answer.
#[derive(Debug, serde::Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    role: crate::Role,
    #[serde(default)]
    username: String,
}

/// Single point of contact with the REST API. Attaches the stored token to
/// every request and turns a 401 into a one-shot sign-out.
pub struct ApiClient {
    base_url: String,
    default_headers: HeaderMap,
    auth_scheme: String,
    transport: Arc<dyn HttpTransport>,
    sessions: Arc<dyn SessionStore>,
    on_unauthenticated: Option<UnauthenticatedHandler>,
    /// Bumped whenever the session changes hands: sign-in, sign-out and
    /// each handled 401. A 401 only counts for requests sent under the
    /// current generation.
    generation: Mutex<u64>,
}

impl ApiClient {
    pub fn new(
        options: ApiClientOptions,
        transport: Arc<dyn HttpTransport>,
        sessions: Arc<dyn SessionStore>,
    ) -> ClientResult<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &options.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Invariant(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClientError::Invariant(format!("Invalid header value for {name}: {e}"))
            })?;
            default_headers.insert(name, value);
        }

        if !options.base_url.starts_with("http://") && !options.base_url.starts_with("https://") {
            return Err(ClientError::Invariant(format!(
                "Base URL must be absolute: {}",
                options.base_url
            )));
        }

        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            default_headers,
            auth_scheme: options.auth_scheme,
            transport,
            sessions,
            on_unauthenticated: None,
            generation: Mutex::new(0),
        })
    }

    /// A client talking to the real API over reqwest.
    pub fn with_reqwest(
        options: ApiClientOptions,
        sessions: Arc<dyn SessionStore>,
    ) -> ClientResult<Self> {
        Self::new(options, Arc::new(ReqwestTransport::new()), sessions)
    }

    #[must_use]
    pub fn on_unauthenticated<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_unauthenticated = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.sessions.get()
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a request against the current session. Also returns the
    /// session generation the credentials belong to.
    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: &RequestOptions,
    ) -> ClientResult<(HttpRequest, u64)> {
        let url = with_query(&join_url(&self.base_url, path), &options.query);

        let mut headers = self.default_headers.clone();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Invariant(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClientError::Invariant(format!("Invalid header value for {name}: {e}"))
            })?;
            headers.insert(name, value);
        }
        let (generation, token) = {
            let generation = self.generation();
            (*generation, self.sessions.token())
        };
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("{} {token}", self.auth_scheme))
                .map_err(|e| ClientError::Invariant(format!("Invalid session token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        // the multipart boundary is chosen by the transport
        if matches!(body, RequestBody::Multipart(_)) {
            headers.remove(CONTENT_TYPE);
        }

        Ok((
            HttpRequest {
                method,
                url,
                headers,
                body,
            },
            generation,
        ))
    }

    /// Sign out after a 401 on a request sent under `sent_generation`.
    /// Answers to requests made with an older session are ignored, so a
    /// fresh sign-in is never undone and the handler fires once per session.
    fn handle_unauthenticated(&self, sent_generation: u64) {
        {
            let mut generation = self.generation();
            if *generation != sent_generation {
                tracing::debug!("ignoring 401 for a session that is already gone");
                return;
            }
            *generation += 1;
            tracing::warn!("session rejected by the server, signing out");
            if let Err(e) = self.sessions.clear() {
                tracing::error!("failed to clear session: {e}");
            }
        }
        if let Some(handler) = &self.on_unauthenticated {
            handler();
        }
    }

    /// Perform one call and return the decoded JSON body.
    ///
    /// Non-2xx answers fail with [`ClientError::Http`]; a 401 additionally
    /// clears the session and notifies the unauthenticated handler. There is
    /// no retry.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> ClientResult<Value> {
        self.request_as(method, path, body, options).await
    }

    pub async fn request_as<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> ClientResult<R> {
        let (request, generation) = self.build_request(method.clone(), path, body, &options)?;
        let transport = self.transport.clone();
        let response =
            trace_request(method.as_str(), path, || async move { transport.send(request).await })
                .await?;

        if response.status == 401 {
            self.handle_unauthenticated(generation);
        }
        if !response.is_success() {
            return Err(ClientError::Http {
                status: response.status,
                body: response.text(),
            });
        }

        decode_body(&response)
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ClientResult<R> {
        self.request_as(Method::GET, path, RequestBody::Empty, options)
            .await
    }

    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        data: &T,
    ) -> ClientResult<R> {
        self.request_as(Method::POST, path, json_body(data)?, RequestOptions::default())
            .await
    }

    pub async fn patch<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        data: &T,
    ) -> ClientResult<R> {
        self.request_as(Method::PATCH, path, json_body(data)?, RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.request(Method::DELETE, path, RequestBody::Empty, RequestOptions::default())
            .await
            .map(|_| ())
    }

    /// Validate and post a payload. Violations fail before the network is
    /// touched.
    pub async fn submit<T: Payload + Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> ClientResult<R> {
        payload.check()?;
        self.request_as(method, path, json_body(payload)?, RequestOptions::default())
            .await
    }

    pub async fn upload_artwork<R: DeserializeOwned>(
        &self,
        path: &str,
        upload: ArtworkUpload,
    ) -> ClientResult<R> {
        upload.check()?;
        self.request_as(
            Method::POST,
            path,
            RequestBody::Multipart(upload.into_fields()),
            RequestOptions::default(),
        )
        .await
    }

    /// Fetch one page of a list endpoint, accepting both the paginated
    /// envelope and a bare array.
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ClientResult<CollectionPage<T>> {
        let response: ListResponse<T> = self.get(path, options).await?;
        Ok(response.into())
    }

    /// Ids of the events the signed-in member is registered for.
    pub async fn my_registrations(&self) -> ClientResult<Vec<i64>> {
        self.get(MY_REGISTRATIONS_PATH, RequestOptions::default())
            .await
    }

    /// Stream every page of a list endpoint by following `next` links.
    pub fn paginate<'a, T>(&'a self, path: &'a str, options: RequestOptions) -> PageStream<'a, T>
    where
        T: DeserializeOwned + Send + 'a,
    {
        let stream = async_stream::try_stream! {
            let mut page: CollectionPage<T> = self.list(path, options).await?;
            loop {
                let next = page.next.take();
                yield page;
                match next {
                    Some(next) => {
                        page = self.list(&next, RequestOptions::default()).await?;
                    }
                    None => break,
                }
            }
        };
        PageStream(Box::pin(stream))
    }

    /// Exchange credentials for a session and store it.
    pub async fn sign_in(&self, credentials: &LoginRequest) -> ClientResult<Session> {
        credentials.check()?;
        let response: LoginResponse = self.post("/auth/login/", credentials).await?;
        let session = Session {
            token: response.token,
            role: response.role,
            username: response.username,
        };
        self.replace_session(Some(session.clone()))?;
        tracing::info!(username = %session.username, role = %session.role, "signed in");
        Ok(session)
    }

    /// Store a session obtained elsewhere (e.g. after registration) and re-arm
    /// 401 handling. Go through this rather than the store so that answers to
    /// requests made with the previous token are recognised as stale.
    pub fn set_session(&self, session: Session) -> ClientResult<()> {
        self.replace_session(Some(session))
    }

    fn replace_session(&self, session: Option<Session>) -> ClientResult<()> {
        let mut generation = self.generation();
        match session {
            Some(session) => self.sessions.set(session)?,
            None => {
                self.sessions.clear()?;
            }
        }
        *generation += 1;
        Ok(())
    }

    /// Tell the server to drop the token, then forget it locally whatever
    /// the server said.
    pub async fn sign_out(&self) -> ClientResult<()> {
        if self.sessions.get().is_some() {
            if let Err(e) = self
                .request(
                    Method::POST,
                    "/auth/logout/",
                    RequestBody::Empty,
                    RequestOptions::default(),
                )
                .await
            {
                tracing::debug!("logout request failed: {e}");
            }
        }
        self.replace_session(None)
    }
}

fn json_body<T: Serialize>(data: &T) -> ClientResult<RequestBody> {
    serde_json::to_value(data)
        .map(RequestBody::Json)
        .map_err(|e| ClientError::Invariant(format!("Failed to encode request body: {e}")))
}

pub struct PageStream<'a, T>(Pin<Box<dyn Stream<Item = ClientResult<CollectionPage<T>>> + Send + 'a>>);

impl<T> Stream for PageStream<'_, T> {
    type Item = ClientResult<CollectionPage<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}
