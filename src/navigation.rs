//! Redirect side effects.
//!
//! The portal has no route guard independent of credential presence, so the
//! gateway itself sends the user away: to the login route when the session ends
//! and to the unauthorized route when a role check fails. A [`Navigator`] is the
//! seam through which those redirects leave the library.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

/// Destinations the gateway can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Landing/login entry point.
    Login,
    /// Page shown when the session lacks a required role.
    Unauthorized,
}

/// Concrete paths for each [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteTable {
    pub login: String,
    pub unauthorized: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            login: "/".to_string(),
            unauthorized: "/Unauthorized".to_string(),
        }
    }
}

impl RouteTable {
    #[must_use]
    pub fn path(&self, route: Route) -> &str {
        match route {
            Route::Login => &self.login,
            Route::Unauthorized => &self.unauthorized,
        }
    }
}

/// Receives redirect requests from the gateway.
pub trait Navigator: Send + Sync + std::fmt::Debug {
    fn navigate(&self, route: Route);
}

/// Navigator that only reports redirects through `tracing`.
///
/// Used by headless callers (the CLI) where there is no location to replace.
#[derive(Debug, Clone, Default)]
pub struct TracingNavigator {
    routes: RouteTable,
}

impl TracingNavigator {
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }
}

impl Navigator for TracingNavigator {
    fn navigate(&self, route: Route) {
        tracing::info!(
            name: "navigation.redirect",
            route = ?route,
            path = %self.routes.path(route),
            "Redirecting"
        );
    }
}

/// Navigator that remembers every redirect, in order.
///
/// Clones share the same history, so a test can keep one handle and give the
/// other to the gateway.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    history: Arc<Mutex<Vec<Route>>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All redirects so far.
    #[must_use]
    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of redirects to `route`.
    #[must_use]
    pub fn count(&self, route: Route) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| **r == route)
            .count()
    }

    /// Most recent redirect.
    #[must_use]
    pub fn last(&self) -> Option<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_defaults() {
        let routes = RouteTable::default();
        assert_eq!(routes.path(Route::Login), "/");
        assert_eq!(routes.path(Route::Unauthorized), "/Unauthorized");
    }

    #[test]
    fn test_recording_navigator_shares_history() {
        let navigator = RecordingNavigator::new();
        let handle = navigator.clone();

        navigator.navigate(Route::Unauthorized);
        navigator.navigate(Route::Login);

        assert_eq!(handle.history(), vec![Route::Unauthorized, Route::Login]);
        assert_eq!(handle.count(Route::Login), 1);
        assert_eq!(handle.last(), Some(Route::Login));
    }
}
