//! Route template → handler name lookup.

use std::collections::HashMap;

use axum::http::Method;

use crate::events::RouteDescriptor;

/// Handler names (controller/action) for the routes of a router.
///
/// axum does not expose which handler matched, so the application declares
/// the names alongside its routes. Unlisted routes resolve to a descriptor
/// carrying only the template.
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    handlers: HashMap<(Method, String), (String, String)>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(
        mut self,
        method: Method,
        template: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.handlers
            .insert((method, template.into()), (controller.into(), action.into()));
        self
    }

    pub fn resolve(&self, method: &Method, template: &str) -> RouteDescriptor {
        let route = RouteDescriptor::new(template);
        match self.handlers.get(&(method.clone(), template.to_string())) {
            Some((controller, action)) => route.with_handler(controller.as_str(), action.as_str()),
            None => route,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
