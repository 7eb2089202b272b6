//! Routes and the handler registry.
//!
//! A [`Route`] pairs a predicate over [`Event`] with exactly one handler and an
//! optional time limit. The [`HandlerRegistry`] keeps routes in registration
//! order and resolves each event to the first route whose predicate matches.
//!
//! ```rust,ignore
//! use courier_framework::{HandlerRegistry, Route, on_command, on_button};
//!
//! let registry = HandlerRegistry::new()
//!     .with(on_command("start").handler(start))
//!     .with(on_button().handler(menu_choice))
//!     .with(Route::new().name("fallback").handler(log_unmatched));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use courier_core::Event;

use crate::handler::{BoxedHandler, Handler, into_handler};

/// A type-erased predicate over events.
pub type CheckFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

#[derive(Clone, Default)]
struct RouteInner {
    checks: Vec<CheckFn>,
    handler: Option<BoxedHandler>,
    timeout: Option<Duration>,
    name: Option<String>,
}

/// A predicate, a handler and an optional timeout.
///
/// All checks added with [`check`](Self::check) must pass. A route with no
/// checks matches every event. A route without a handler never matches.
///
/// `Route` uses an internal `Arc`, so cloning is cheap.
#[derive(Clone, Default)]
pub struct Route {
    inner: Arc<RouteInner>,
}

impl Route {
    /// Creates an empty route.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut RouteInner {
        Arc::make_mut(&mut self.inner)
    }

    /// Sets a name for this route (used in logs and dispatch results).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner_mut().name = Some(name.into());
        self
    }

    /// Adds a check. Checks are evaluated in order and short-circuit.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.inner_mut().checks.push(Arc::new(f));
        self
    }

    /// Overrides the dispatcher's default handler timeout for this route.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner_mut().timeout = Some(timeout);
        self
    }

    /// Sets the handler, replacing any previous one.
    pub fn handler<F, T>(mut self, f: F) -> Self
    where
        F: Handler<T>,
        T: 'static,
    {
        self.inner_mut().handler = Some(into_handler(f));
        self
    }

    /// Sets a pre-built boxed handler.
    pub fn handler_boxed(mut self, handler: BoxedHandler) -> Self {
        self.inner_mut().handler = Some(handler);
        self
    }

    /// Returns `true` if this route has a handler and every check passes.
    pub fn matches(&self, event: &Event) -> bool {
        self.inner.handler.is_some() && self.inner.checks.iter().all(|check| check(event))
    }

    /// Returns the route's handler, if set.
    pub fn get_handler(&self) -> Option<&BoxedHandler> {
        self.inner.handler.as_ref()
    }

    /// Returns the route's own timeout, if set.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Returns the name of this route, if set.
    pub fn get_name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the name of this route, or `"unnamed"`.
    pub fn display_name(&self) -> &str {
        self.get_name().unwrap_or("unnamed")
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.inner.name)
            .field("checks", &self.inner.checks.len())
            .field("has_handler", &self.inner.handler.is_some())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Ordered list of routes. First match wins.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    routes: Vec<Route>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route built from a predicate, a handler and an optional timeout.
    pub fn register<P, F, T>(&mut self, predicate: P, handler: F, timeout: Option<Duration>)
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
        F: Handler<T>,
        T: 'static,
    {
        let mut route = Route::new().check(predicate).handler(handler);
        if let Some(timeout) = timeout {
            route = route.timeout(timeout);
        }
        self.add(route);
    }

    /// Appends a pre-built route.
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Appends a pre-built route (builder pattern).
    pub fn with(mut self, route: Route) -> Self {
        self.add(route);
        self
    }

    /// Returns the first route whose predicate matches `event`.
    pub fn resolve(&self, event: &Event) -> Option<&Route> {
        let route = self.routes.iter().find(|route| route.matches(event));
        if route.is_none() {
            trace!(update_id = event.update_id(), kind = %event.kind(), "No route matched");
        }
        route
    }

    /// Returns the number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the routes in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::text_event;

    async fn noop() {}

    #[test]
    fn test_first_match_wins() {
        let registry = HandlerRegistry::new()
            .with(Route::new().name("h1").check(|_| true).handler(noop))
            .with(Route::new().name("h2").check(|_| true).handler(noop));

        let route = registry.resolve(&text_event(1, "x")).unwrap();
        assert_eq!(route.get_name(), Some("h1"));
    }

    #[test]
    fn test_skips_non_matching_routes() {
        let mut registry = HandlerRegistry::new();
        registry.add(Route::new().name("never").check(|_| false).handler(noop));
        registry.register(|e: &Event| e.text() == Some("x"), noop, None);

        let route = registry.resolve(&text_event(1, "x")).unwrap();
        assert_eq!(route.display_name(), "unnamed");
        assert!(registry.resolve(&text_event(2, "y")).is_none());
    }

    #[test]
    fn test_all_checks_must_pass() {
        let route = Route::new()
            .check(|e| e.text().is_some())
            .check(|e| e.update_id() > 10)
            .handler(noop);

        assert!(!route.matches(&text_event(5, "a")));
        assert!(route.matches(&text_event(11, "a")));
    }

    #[test]
    fn test_route_without_handler_never_matches() {
        let registry = HandlerRegistry::new().with(Route::new().name("empty"));
        assert!(registry.resolve(&text_event(1, "x")).is_none());
    }

    #[test]
    fn test_register_keeps_timeout() {
        let mut registry = HandlerRegistry::new();
        registry.register(|_: &Event| true, noop, Some(Duration::from_secs(2)));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.routes()[0].get_timeout(),
            Some(Duration::from_secs(2))
        );
    }
}
