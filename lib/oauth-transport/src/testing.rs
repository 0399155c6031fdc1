//! In-memory sender used by the unit tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, HeaderName};
use http::{HeaderMap, Method, Request, Response, StatusCode};

use crate::OAuthError;
use crate::sender::{HttpSender, SendFuture};

type Outcome = Result<Response<Bytes>, OAuthError>;
type Handler = Box<dyn Fn(&RecordedRequest) -> Outcome + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: Method,
    pub(crate) uri: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub(crate) fn authorization(&self) -> Option<&str> {
        self.header(AUTHORIZATION)
    }

    pub(crate) fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub(crate) fn response(status: StatusCode, body: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(body.to_owned()));
    *response.status_mut() = status;
    response
}

/// Answers from a FIFO script, or from a handler when one is set.
pub(crate) struct ScriptedSender {
    script: Mutex<VecDeque<Outcome>>,
    handler: Option<Handler>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedSender {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::blank())
    }

    pub(crate) fn with_handler(
        delay: Duration,
        handler: impl Fn(&RecordedRequest) -> Outcome + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Some(Box::new(handler)),
            delay: Some(delay),
            ..Self::blank()
        })
    }

    fn blank() -> Self {
        Self {
            script: Mutex::default(),
            handler: None,
            delay: None,
            requests: Mutex::default(),
        }
    }

    pub(crate) fn push_json(&self, status: StatusCode, body: &str) {
        self.push(Ok(response(status, body)));
    }

    pub(crate) fn push_status(&self, status: StatusCode) {
        self.push(Ok(response(status, "")));
    }

    pub(crate) fn push_response(&self, response: Response<Bytes>) {
        self.push(Ok(response));
    }

    pub(crate) fn push_error(&self, reason: &str) {
        self.push(Err(OAuthError::TransportError {
            reason: reason.to_string(),
        }));
    }

    fn push(&self, outcome: Outcome) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn answer(&self, recorded: &RecordedRequest) -> Outcome {
        if let Some(handler) = &self.handler {
            return handler(recorded);
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                panic!(
                    "unexpected request {} {}",
                    recorded.method, recorded.uri
                )
            })
    }
}

impl fmt::Debug for ScriptedSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedSender")
            .field("handler", &self.handler.is_some())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl HttpSender for ScriptedSender {
    fn send(&self, request: Request<Bytes>) -> SendFuture<'_> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let recorded = RecordedRequest {
                method: parts.method,
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            };
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(recorded.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer(&recorded)
        })
    }
}
