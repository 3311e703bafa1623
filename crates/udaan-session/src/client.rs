//! Session client
//!
//! Wraps every outbound call with bearer-token injection and recovers from an
//! expired access token by refreshing it once and replaying the request.

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use udaan_storage::Database;

use crate::config::ClientConfig;
use crate::envelope::{envelope_message, ApiResponse};
use crate::error::{ApiError, RefreshFailure};
use crate::notice::{Notice, SessionEvent};
use crate::refresh::{self, RefreshCoordinator, RefreshGuard, RefreshOutcome, Ticket};
use crate::request::{ApiRequest, FormPart, RequestBody};
use crate::tokens::{CredentialPair, TokenStore};
use crate::Result;

const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";
const EVENT_CAPACITY: usize = 64;

pub struct SessionClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    tokens: TokenStore,
    /// Shared by every clone so refreshes stay single-flight
    refresh: Arc<RefreshCoordinator>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    pub fn new(config: ClientConfig, db: Database) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            http,
            config: Arc::new(config),
            tokens: TokenStore::new(db),
            refresh: Arc::new(RefreshCoordinator::new()),
            events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Notices and redirect requests for the UI layer.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(SessionEvent::Notice(notice));
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Send an authenticated request.
    ///
    /// A 401 on the first attempt parks the request behind a token refresh
    /// (starting one if none is running) and replays it once with the new
    /// token. Every other failure is reported and returned as is.
    pub async fn request(&self, req: ApiRequest) -> Result<ApiResponse> {
        let token = self.tokens.access_token()?;

        let result = self.dispatch(&req, token.as_deref()).await;

        match result {
            Ok(response) => Ok(response),
            Err(err) if err.is_unauthorized() && !req.retried => {
                self.after_unauthorized(req, token).await
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Send without a bearer token and without 401 recovery.
    pub async fn send_public(&self, req: ApiRequest) -> Result<ApiResponse> {
        self.dispatch(&req, None)
            .await
            .map_err(|err| self.report(err))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(ApiRequest::get(path)).await?.into_data()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::post(path).json(body)?)
            .await?
            .into_data()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::put(path).json(body)?)
            .await?
            .into_data()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::delete(path)).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(ApiRequest::delete(path)).await?.into_data()
    }

    /// A 401 for a token that storage has since replaced (or dropped) belongs
    /// to a refresh that already settled, so it must not start another one.
    async fn after_unauthorized(
        &self,
        req: ApiRequest,
        sent: Option<String>,
    ) -> Result<ApiResponse> {
        match (self.tokens.access_token()?, sent) {
            (Some(current), sent) if sent.as_deref() != Some(current.as_str()) => {
                tracing::debug!(path = %req.path, "Access token already rotated, replaying");
                self.replay(req, &current).await
            }
            (None, Some(_)) => {
                tracing::debug!(path = %req.path, "Session already ended, not refreshing");
                Err(ApiError::RefreshFailed(RefreshFailure::MissingRefreshToken))
            }
            _ => self.recover(req).await,
        }
    }

    async fn recover(&self, req: ApiRequest) -> Result<ApiResponse> {
        let outcome = match self.refresh.join() {
            Ticket::Leader { guard, outcome } => {
                self.spawn_refresh(guard);
                refresh::wait(outcome).await
            }
            Ticket::Follower(outcome) => {
                tracing::debug!(
                    path = %req.path,
                    waiting = self.refresh.pending(),
                    "Waiting for in-flight token refresh"
                );
                refresh::wait(outcome).await
            }
        };

        let token = outcome.map_err(ApiError::RefreshFailed)?;
        self.replay(req, &token).await
    }

    /// Send once more with `token`. A replay is never recovered again.
    async fn replay(&self, mut req: ApiRequest, token: &str) -> Result<ApiResponse> {
        req.retried = true;
        self.dispatch(&req, Some(token))
            .await
            .map_err(|err| self.report(err))
    }

    /// Run the refresh on its own task so a caller giving up cannot cancel it.
    fn spawn_refresh(&self, guard: RefreshGuard) {
        let client = self.clone();
        tokio::spawn(async move {
            let outcome = client.refresh_tokens().await;
            let released = guard.settle(outcome);
            tracing::debug!(released, "Released requests waiting on token refresh");
        });
    }

    async fn refresh_tokens(&self) -> RefreshOutcome {
        match self.request_new_tokens().await {
            Ok(pair) => {
                tracing::info!("Refreshed access token");
                Ok(pair.access_token)
            }
            Err(failure) => {
                self.end_session(&failure);
                Err(failure)
            }
        }
    }

    async fn request_new_tokens(&self) -> std::result::Result<CredentialPair, RefreshFailure> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?
            .ok_or(RefreshFailure::MissingRefreshToken)?;

        let url = self
            .config
            .endpoint(&self.config.refresh_path)
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        tracing::debug!(url = %url, "Requesting token refresh");

        let response = self
            .http
            .post(url)
            .header(REFRESH_TOKEN_HEADER, refresh_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?
            .to_vec();

        if !status.is_success() {
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
                message: envelope_message(&body),
            });
        }

        let pair: CredentialPair = ApiResponse::new(status, body)
            .into_data()
            .map_err(|e| RefreshFailure::InvalidResponse(e.to_string()))?;

        self.tokens
            .set_tokens(&pair)
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?;

        Ok(pair)
    }

    fn end_session(&self, failure: &RefreshFailure) {
        tracing::warn!(error = %failure, "Token refresh failed, ending session");

        if let Err(e) = self.tokens.clear() {
            tracing::error!("Failed to clear stored credentials: {}", e);
        }

        self.notify(Notice::session_expired());
        self.emit(SessionEvent::RedirectToLogin);
    }

    async fn dispatch(&self, req: &ApiRequest, token: Option<&str>) -> Result<ApiResponse> {
        let request_id = Uuid::new_v4();
        let url = self.config.endpoint(&req.path)?;

        let mut builder = self.http.request(req.method.clone(), url);
        if !req.options.query.is_empty() {
            builder = builder.query(&req.options.query);
        }
        if let (Some(name), Some(token)) = (&req.token_query, token) {
            builder = builder.query(&[(name.as_str(), token)]);
        }
        for (name, value) in &req.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = req.options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        tracing::debug!(
            request_id = %request_id,
            method = %req.method,
            path = %req.path,
            retried = req.retried,
            "Sending request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            request_id = %request_id,
            status = status.as_u16(),
            bytes = body.len(),
            "Received response"
        );

        if status.is_success() {
            Ok(ApiResponse::new(status, body))
        } else {
            Err(ApiError::from_status(status, envelope_message(&body)))
        }
    }

    /// Log a failure and show its notice, if its class has one.
    fn report(&self, err: ApiError) -> ApiError {
        match err.status() {
            Some(status) => tracing::warn!(status = status.as_u16(), error = %err, "Request failed"),
            None => tracing::warn!(error = %err, "Request failed"),
        }

        if let Some(notice) = Notice::for_error(&err) {
            self.notify(notice);
        }
        err
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Clone for SessionClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: Arc::clone(&self.config),
            tokens: self.tokens.clone(),
            refresh: Arc::clone(&self.refresh),
            events: self.events.clone(),
        }
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        let mut body = Part::bytes(part.value.clone());
        if let Some(file_name) = &part.file_name {
            body = body.file_name(file_name.clone());
        }
        if let Some(mime) = &part.mime_type {
            body = body
                .mime_str(mime)
                .map_err(|e| ApiError::InvalidRequest(format!("{}: {e}", part.name)))?;
        }
        form = form.part(part.name.clone(), body);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SessionClient {
        let config = ClientConfig::new("http://127.0.0.1:9/api/v1").unwrap();
        SessionClient::new(config, Database::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_clones_share_refresh_state() {
        let a = client();
        let b = a.clone();

        let _ticket = a.refresh.join();
        assert!(b.is_refreshing());
    }

    #[test]
    fn test_build_form_rejects_bad_mime() {
        let parts = vec![FormPart::file("file", "x.bin", vec![1], "not a mime")];
        assert!(matches!(
            build_form(&parts),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let client = client();
        let mut events = client.subscribe();

        client.notify(Notice::info("Logged Out", "You have been logged out successfully."));

        match events.recv().await.unwrap() {
            SessionEvent::Notice(notice) => assert_eq!(notice.title, "Logged Out"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
