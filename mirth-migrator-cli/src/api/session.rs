//! Session guard
//!
//! Every call to the migrator goes through [`SessionGuard::call`]. Calls made
//! without a session, or rejected because the session is not (or no longer)
//! valid, are parked in a pending queue and replayed in submission order
//! once the operator has logged in again. The outcome of a call carries a caller
//! supplied routing tag (`reply`) so the caller knows what to do with the
//! response, whenever it arrives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use serde_json::Value;

use super::client::{HttpReply, SessionToken, Transport};
use super::endpoints::Endpoint;

const SERVER_EXCEPTION: &str =
    "There seems to be a server-side exception. Please check the MIRTH_MIGRATOR channel in the Mirth Administrator.";

/// A call to the migrator together with the routing tag of its response
#[derive(Debug, Clone)]
pub struct ApiCall<R> {
    pub endpoint: Endpoint,
    pub payload: Value,
    pub reply: R,
    /// Submission order, stamped by the guard on the first attempt
    sequence: Option<u64>,
}

impl<R> ApiCall<R> {
    pub fn new(endpoint: Endpoint, payload: Value, reply: R) -> Self {
        Self {
            endpoint,
            payload,
            reply,
            sequence: None,
        }
    }
}

/// Request to show the login prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPrompt {
    /// Why the operator has to log in (again)
    pub reason: Option<String>,
}

/// Expected non-success outcomes of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFailure {
    /// The server configuration changed since the client loaded it (409)
    ReloadRequired,
    /// The server has no configuration yet (500 before any configuration was loaded)
    ConfigurationMissing,
    /// The server is not available (503)
    Unavailable { message: String },
    /// The error body was not JSON
    Unparseable { status: u16, text: String },
    Server { status: u16, message: String },
    /// The server could not be reached
    Transport { message: String },
}

impl ServerFailure {
    pub fn status(&self) -> u16 {
        match self {
            Self::ReloadRequired => 409,
            Self::ConfigurationMissing => 500,
            Self::Unavailable { .. } => 503,
            Self::Unparseable { status, .. } | Self::Server { status, .. } => *status,
            Self::Transport { .. } => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::ReloadRequired => {
                "The server configuration has changed. Please reload.".to_string()
            }
            Self::ConfigurationMissing => "The migrator has not been configured yet.".to_string(),
            Self::Unavailable { message } => format!("Server unavailable: {}", message),
            Self::Unparseable { text, .. } => text.clone(),
            Self::Server { message, .. } => message.clone(),
            Self::Transport { message } => message.clone(),
        }
    }
}

/// Result of routing a call through the guard
#[derive(Debug)]
pub enum CallOutcome<R> {
    Completed { reply: R, status: u16, body: Value },
    /// The call was parked until the operator logs in
    Deferred(LoginPrompt),
    Failed { reply: R, failure: ServerFailure },
}

/// Reentrant activity counter, shared between concurrent calls
#[derive(Debug, Clone, Default)]
pub struct BusyIndicator {
    active: Arc<AtomicUsize>,
}

impl BusyIndicator {
    /// Mark the start of an activity; it ends when the returned guard is dropped
    pub fn start(&self) -> BusyGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        BusyGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.active() > 0
    }
}

/// Ends one activity of a [`BusyIndicator`] on drop
pub struct BusyGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        // Never below zero
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SessionGuard<T: Transport, R> {
    transport: T,
    token: Mutex<Option<SessionToken>>,
    pending: Mutex<VecDeque<ApiCall<R>>>,
    next_sequence: AtomicU64,
    busy: BusyIndicator,
    configuration_loaded: AtomicBool,
}

impl<T: Transport, R> SessionGuard<T, R> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            token: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
            next_sequence: AtomicU64::new(0),
            busy: BusyIndicator::default(),
            configuration_loaded: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    pub fn has_token(&self) -> bool {
        lock(&self.token).is_some()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Whether a server configuration has been loaded by this client
    pub fn set_configuration_loaded(&self, loaded: bool) {
        self.configuration_loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn configuration_loaded(&self) -> bool {
        self.configuration_loaded.load(Ordering::SeqCst)
    }

    /// Use the given credentials for the following calls
    pub fn set_credentials(&self, username: &str, password: &str) {
        *lock(&self.token) = Some(SessionToken::Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    /// Drop every parked call without replaying it
    pub fn discard_pending(&self) {
        let discarded = std::mem::take(&mut *lock(&self.pending));
        if !discarded.is_empty() {
            info!("Discarded {} pending call(s)", discarded.len());
        }
    }

    /// Park a call behind every pending call submitted before it
    ///
    /// Concurrent calls can be rejected in any order, the queue stays sorted
    /// by submission.
    fn defer(&self, call: ApiCall<R>) {
        let mut pending = lock(&self.pending);
        let position = pending
            .iter()
            .position(|parked| parked.sequence > call.sequence)
            .unwrap_or(pending.len());
        pending.insert(position, call);
    }

    /// Send a call, or park it if there is no session
    pub async fn call(&self, mut call: ApiCall<R>) -> CallOutcome<R> {
        if call.sequence.is_none() {
            call.sequence = Some(self.next_sequence.fetch_add(1, Ordering::SeqCst));
        }

        let token = lock(&self.token).clone();
        let Some(token) = token else {
            debug!("No session, deferring {}", call.endpoint);
            self.defer(call);
            return CallOutcome::Deferred(LoginPrompt { reason: None });
        };

        let _busy = self.busy.start();
        let result = self.transport.post(call.endpoint, &call.payload, &token).await;

        match result {
            Ok(reply) if reply.is_success() => self.complete(call, reply),
            Ok(reply) => self.reject(call, token, reply),
            Err(err) => {
                warn!("{} failed: {:#}", call.endpoint, err);
                CallOutcome::Failed {
                    reply: call.reply,
                    failure: ServerFailure::Transport {
                        message: format!("{:#}", err),
                    },
                }
            }
        }
    }

    fn complete(&self, call: ApiCall<R>, reply: HttpReply) -> CallOutcome<R> {
        if let Some(session_id) = reply.session_id {
            debug!("Session token rotated by {}", call.endpoint);
            *lock(&self.token) = Some(SessionToken::Issued(session_id));
        }

        let body = if reply.body.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&reply.body) {
                Ok(body) => body,
                Err(err) => {
                    warn!("{} answered with invalid JSON: {}", call.endpoint, err);
                    return CallOutcome::Failed {
                        reply: call.reply,
                        failure: ServerFailure::Unparseable {
                            status: reply.status,
                            text: reply.body,
                        },
                    };
                }
            }
        };

        CallOutcome::Completed {
            reply: call.reply,
            status: reply.status,
            body,
        }
    }

    fn reject(&self, call: ApiCall<R>, token: SessionToken, reply: HttpReply) -> CallOutcome<R> {
        let status = reply.status;

        match status {
            400 | 401 | 440 => {
                let reason = if status == 401 {
                    "Invalid username or password"
                } else {
                    "Session expired"
                };
                info!("{} rejected with {}: {}", call.endpoint, status, reason);

                // Only discard the token that was actually rejected
                {
                    let mut current = lock(&self.token);
                    if current.as_ref() == Some(&token) {
                        *current = None;
                    }
                }
                self.defer(call);
                return CallOutcome::Deferred(LoginPrompt {
                    reason: Some(reason.to_string()),
                });
            }
            409 => {
                warn!("{} rejected: server configuration changed", call.endpoint);
                return CallOutcome::Failed {
                    reply: call.reply,
                    failure: ServerFailure::ReloadRequired,
                };
            }
            500 if !self.configuration_loaded() => {
                info!("{} failed before any configuration was loaded", call.endpoint);
                return CallOutcome::Failed {
                    reply: call.reply,
                    failure: ServerFailure::ConfigurationMissing,
                };
            }
            _ => {}
        }

        let failure = match serde_json::from_str::<Value>(&reply.body) {
            Err(_) => ServerFailure::Unparseable {
                status,
                text: if reply.body.trim().is_empty() {
                    SERVER_EXCEPTION.to_string()
                } else {
                    reply.body
                },
            },
            Ok(body) => {
                let message = match body {
                    Value::String(text) => text,
                    Value::Null => SERVER_EXCEPTION.to_string(),
                    other => other.to_string(),
                };
                if status == 503 {
                    ServerFailure::Unavailable { message }
                } else {
                    ServerFailure::Server { status, message }
                }
            }
        };

        warn!("{} failed with {}: {}", call.endpoint, status, failure.message());
        CallOutcome::Failed {
            reply: call.reply,
            failure,
        }
    }

    /// Log in with new credentials and replay every parked call in order
    ///
    /// A replayed call that is rejected again is parked again, so the
    /// outcomes may contain further login prompts.
    pub async fn login(&self, username: &str, password: &str) -> Vec<CallOutcome<R>> {
        self.set_credentials(username, password);

        let calls: Vec<ApiCall<R>> = lock(&self.pending).drain(..).collect();
        info!("Logged in as {}, replaying {} pending call(s)", username, calls.len());

        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.call(call).await);
        }
        outcomes
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::api::client::{HttpReply, SessionToken, Transport};
    use crate::api::endpoints::Endpoint;

    /// Scripted in-memory transport recording every request
    #[derive(Default)]
    pub struct FakeTransport {
        replies: Mutex<VecDeque<(Endpoint, usize, Result<HttpReply>)>>,
        pub requests: Mutex<Vec<(Endpoint, Value, SessionToken)>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a reply for the next request to `endpoint`
        pub fn reply(&self, endpoint: Endpoint, status: u16, body: Value) -> &Self {
            self.reply_raw(endpoint, status, body.to_string(), None)
        }

        pub fn reply_with_session(&self, endpoint: Endpoint, status: u16, body: Value, session_id: &str) -> &Self {
            self.reply_raw(endpoint, status, body.to_string(), Some(session_id))
        }

        pub fn reply_raw(&self, endpoint: Endpoint, status: u16, body: String, session_id: Option<&str>) -> &Self {
            self.reply_delayed(endpoint, status, body, session_id, 0)
        }

        /// Like `reply_raw`, answered only after `delay` extra scheduler turns
        pub fn reply_delayed(
            &self,
            endpoint: Endpoint,
            status: u16,
            body: String,
            session_id: Option<&str>,
            delay: usize,
        ) -> &Self {
            self.replies.lock().unwrap().push_back((
                endpoint,
                delay,
                Ok(HttpReply {
                    status,
                    session_id: session_id.map(str::to_string),
                    body,
                }),
            ));
            self
        }

        pub fn fail(&self, endpoint: Endpoint, message: &str) -> &Self {
            self.replies
                .lock()
                .unwrap()
                .push_back((endpoint, 0, Err(anyhow::anyhow!(message.to_string()))));
            self
        }

        pub fn endpoints(&self) -> Vec<Endpoint> {
            self.requests.lock().unwrap().iter().map(|(e, _, _)| *e).collect()
        }

        pub fn payloads(&self, endpoint: Endpoint) -> Vec<Value> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(e, _, _)| *e == endpoint)
                .map(|(_, p, _)| p.clone())
                .collect()
        }

        pub fn tokens(&self) -> Vec<SessionToken> {
            self.requests.lock().unwrap().iter().map(|(_, _, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(&self, endpoint: Endpoint, payload: &Value, token: &SessionToken) -> Result<HttpReply> {
            self.requests
                .lock()
                .unwrap()
                .push((endpoint, payload.clone(), token.clone()));

            let (delay, reply) = {
                let mut replies = self.replies.lock().unwrap();
                let position = replies
                    .iter()
                    .position(|(e, _, _)| *e == endpoint)
                    .unwrap_or_else(|| panic!("no scripted reply for {}", endpoint));
                let (_, delay, reply) = replies.remove(position).unwrap();
                (delay, reply)
            };
            for _ in 0..=delay {
                tokio::task::yield_now().await;
            }
            reply
        }
    }
}
