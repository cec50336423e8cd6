//! reqwest client that emits outbound lifecycle events.

use std::sync::Arc;

use reqwest::{Client, Request, RequestBuilder, Response};

use crate::events::{EventSource, Fault, LifecycleEvent, TaskOutcome};
use crate::observer::OutboundScope;

/// Emits a cancelled completion if the call future is dropped mid-flight.
struct PendingCall {
    source: Arc<EventSource>,
    scope: Option<Arc<OutboundScope>>,
}

impl PendingCall {
    fn complete(mut self, event: impl FnOnce(Arc<OutboundScope>) -> LifecycleEvent) {
        if let Some(scope) = self.scope.take() {
            self.source.emit(&event(scope));
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            self.source.emit(&LifecycleEvent::OutboundCompleted {
                scope: Some(scope),
                status: None,
                response_headers: None,
                outcome: TaskOutcome::Canceled,
            });
        }
    }
}

/// HTTP client whose calls are traced and carry trace context.
#[derive(Clone)]
pub struct InstrumentedClient {
    client: Client,
    source: Arc<EventSource>,
}

impl InstrumentedClient {
    pub fn new(client: Client, source: Arc<EventSource>) -> Self {
        Self { client, source }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Build and execute a request created from this client.
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let request = builder.build()?;
        self.execute(request).await
    }

    pub async fn execute(&self, mut request: Request) -> reqwest::Result<Response> {
        if !self.source.is_enabled() {
            return self.client.execute(request).await;
        }

        let scope = Arc::new(OutboundScope::new(
            request.method().as_str(),
            request.url().as_str(),
            request.headers().clone(),
        ));
        self.source.emit(&LifecycleEvent::OutboundStarted {
            scope: Some(scope.clone()),
        });
        *request.headers_mut() = scope.headers();

        let pending = PendingCall {
            source: self.source.clone(),
            scope: Some(scope.clone()),
        };

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                pending.complete(|scope| LifecycleEvent::OutboundCompleted {
                    scope: Some(scope),
                    status: Some(status),
                    response_headers: Some(headers),
                    outcome: TaskOutcome::Completed,
                });
                Ok(response)
            }
            Err(e) => {
                let (kind, outcome) = if e.is_timeout() {
                    ("timeout", TaskOutcome::Canceled)
                } else if e.is_connect() {
                    ("connect", TaskOutcome::Faulted)
                } else {
                    ("request", TaskOutcome::Faulted)
                };
                tracing::debug!(url = %scope.url(), error = %e, "Outbound request failed");
                self.source.emit(&LifecycleEvent::OutboundFailed {
                    scope: Some(scope),
                    fault: Some(Fault::new(kind, e.to_string())),
                });
                let status = e.status().map(|s| s.as_u16());
                pending.complete(|scope| LifecycleEvent::OutboundCompleted {
                    scope: Some(scope),
                    status,
                    response_headers: None,
                    outcome,
                });
                Err(e)
            }
        }
    }
}
