//! Scripted transport for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::transport::{Transport, TransportError, TransportRequest, TransportResponse};

pub enum Step {
    Reply(TransportResponse),
    Fail(TransportError),
}

impl Step {
    pub fn with_header(self, name: &str, value: &str) -> Self {
        match self {
            Step::Reply(mut response) => {
                response
                    .headers
                    .insert(name.to_ascii_lowercase(), value.to_string());
                Step::Reply(response)
            }
            fail => fail,
        }
    }
}

pub fn reply(status: u16, body: &str) -> Step {
    Step::Reply(TransportResponse {
        status,
        headers: Default::default(),
        body: body.as_bytes().to_vec(),
    })
}

pub fn network_failure() -> Step {
    Step::Fail(TransportError::Network("connection refused".to_string()))
}

pub fn timed_out() -> Step {
    Step::Fail(TransportError::Timeout)
}

pub fn interrupted() -> Step {
    Step::Fail(TransportError::Interrupted("connection reset mid-body".to_string()))
}

/// Answers requests from a fixed script, then hangs like a long-poll that
/// never completes.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    sent: Mutex<Vec<(Instant, TransportRequest)>>,
    notify: Notify,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            sent: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.sent.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn request_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Waits until at least `count` requests were sent; panics after a
    /// generous (virtual) deadline
    pub async fn wait_for_requests(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(600);
        loop {
            let notified = self.notify.notified();
            if self.request_count() >= count {
                return;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                panic!(
                    "expected {} requests, saw {}",
                    count,
                    self.request_count()
                );
            }
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push((Instant::now(), request));
        self.notify.notify_waiters();

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(e)) => Err(e),
            None => std::future::pending().await,
        }
    }
}

/// Log event seen by [`EventCapture`], fields rendered as `name=value`
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub text: String,
}

/// Layer recording every event, for asserting on what got logged
#[derive(Clone, Default)]
pub struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    /// Installs the capture for the current thread until the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        use tracing_subscriber::prelude::*;

        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == level)
            .cloned()
            .collect()
    }
}

struct FieldText(String);

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(&format!("{}={:?}", field.name(), value));
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut text = FieldText(String::new());
        event.record(&mut text);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            text: text.0,
        });
    }
}
