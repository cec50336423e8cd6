//! Typed lifecycle event payloads.
//!
//! Every payload field is optional: hosts may emit partially populated
//! events, and an observer skips an event whose required fields are absent
//! instead of failing.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::observer::context::{OutboundScope, RequestScope};

pub const REQUEST_STARTED: &str = "http.server.request.start";
pub const ACTION_SELECTED: &str = "http.server.action.selected";
pub const UNHANDLED_EXCEPTION: &str = "http.server.exception.unhandled";
pub const REQUEST_COMPLETED: &str = "http.server.request.stop";
pub const OUTBOUND_STARTED: &str = "http.client.request.start";
pub const OUTBOUND_FAILED: &str = "http.client.request.error";
pub const OUTBOUND_COMPLETED: &str = "http.client.request.stop";

/// Route resolved by the host's router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub template: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
}

impl RouteDescriptor {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Self::default()
        }
    }

    pub fn with_handler(mut self, controller: impl Into<String>, action: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self.action = Some(action.into());
        self
    }
}

/// An error raised while serving a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// How an outbound call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Canceled,
    Faulted,
}

/// A host lifecycle notification.
#[derive(Clone)]
pub enum LifecycleEvent {
    RequestStarted {
        scope: Option<Arc<RequestScope>>,
    },
    ActionSelected {
        scope: Option<Arc<RequestScope>>,
        route: Option<RouteDescriptor>,
    },
    UnhandledException {
        scope: Option<Arc<RequestScope>>,
        fault: Option<Fault>,
    },
    RequestCompleted {
        scope: Option<Arc<RequestScope>>,
        status: Option<u16>,
    },
    OutboundStarted {
        scope: Option<Arc<OutboundScope>>,
    },
    OutboundFailed {
        scope: Option<Arc<OutboundScope>>,
        fault: Option<Fault>,
    },
    OutboundCompleted {
        scope: Option<Arc<OutboundScope>>,
        status: Option<u16>,
        response_headers: Option<HeaderMap>,
        outcome: TaskOutcome,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::RequestStarted { .. } => REQUEST_STARTED,
            LifecycleEvent::ActionSelected { .. } => ACTION_SELECTED,
            LifecycleEvent::UnhandledException { .. } => UNHANDLED_EXCEPTION,
            LifecycleEvent::RequestCompleted { .. } => REQUEST_COMPLETED,
            LifecycleEvent::OutboundStarted { .. } => OUTBOUND_STARTED,
            LifecycleEvent::OutboundFailed { .. } => OUTBOUND_FAILED,
            LifecycleEvent::OutboundCompleted { .. } => OUTBOUND_COMPLETED,
        }
    }

    pub fn started(scope: &Arc<RequestScope>) -> Self {
        LifecycleEvent::RequestStarted {
            scope: Some(scope.clone()),
        }
    }

    pub fn action_selected(scope: &Arc<RequestScope>, route: RouteDescriptor) -> Self {
        LifecycleEvent::ActionSelected {
            scope: Some(scope.clone()),
            route: Some(route),
        }
    }

    pub fn exception(scope: &Arc<RequestScope>, fault: Fault) -> Self {
        LifecycleEvent::UnhandledException {
            scope: Some(scope.clone()),
            fault: Some(fault),
        }
    }

    pub fn completed(scope: &Arc<RequestScope>, status: u16) -> Self {
        LifecycleEvent::RequestCompleted {
            scope: Some(scope.clone()),
            status: Some(status),
        }
    }
}

impl std::fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEvent")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
