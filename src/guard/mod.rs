//! Route access decisions driven by the session state.
//!
//! Nothing renders while the session is loading. Once it has resolved, guest-only
//! pages bounce signed-in users to the dashboard and protected pages bounce
//! everyone else to the login page.

use std::fmt;

use crate::session::SessionState;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    Pricing,
    Contact,
    ForTeachers,
    Test,
    Login,
    Signup,
    Dashboard,
    Student,
    Parent,
    Quiz { id: String },
    NotFound,
}

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    /// Only without a session.
    GuestOnly,
    /// Only with a session.
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The session is not known yet; show a spinner.
    Loading,
    Render(Route),
    Redirect(&'static str),
}

impl Route {
    /// Matches a path against the route table. Query strings, fragments and a
    /// trailing slash are ignored.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();
        match segments.as_slice() {
            [] => Route::Index,
            ["pricing"] => Route::Pricing,
            ["contact"] => Route::Contact,
            ["for-teachers"] => Route::ForTeachers,
            ["test"] => Route::Test,
            ["login"] => Route::Login,
            ["signup"] => Route::Signup,
            ["dashboard"] => Route::Dashboard,
            ["student"] => Route::Student,
            ["parent"] => Route::Parent,
            ["quiz", id] if !id.is_empty() => Route::Quiz { id: id.to_string() },
            _ => Route::NotFound,
        }
    }

    pub fn access(&self) -> RouteAccess {
        match self {
            Route::Login | Route::Signup => RouteAccess::GuestOnly,
            Route::Dashboard | Route::Student | Route::Parent | Route::Quiz { .. } => {
                RouteAccess::Protected
            }
            _ => RouteAccess::Public,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Index => write!(f, "/"),
            Route::Pricing => write!(f, "/pricing"),
            Route::Contact => write!(f, "/contact"),
            Route::ForTeachers => write!(f, "/for-teachers"),
            Route::Test => write!(f, "/test"),
            Route::Login => write!(f, "{}", LOGIN_PATH),
            Route::Signup => write!(f, "/signup"),
            Route::Dashboard => write!(f, "{}", DASHBOARD_PATH),
            Route::Student => write!(f, "/student"),
            Route::Parent => write!(f, "/parent"),
            Route::Quiz { id } => write!(f, "/quiz/{}", id),
            Route::NotFound => write!(f, "*"),
        }
    }
}

pub fn resolve(path: &str, state: &SessionState) -> RouteDecision {
    if state.loading {
        return RouteDecision::Loading;
    }
    let route = Route::parse(path);
    match (route.access(), state.is_authenticated()) {
        (RouteAccess::GuestOnly, true) => RouteDecision::Redirect(DASHBOARD_PATH),
        (RouteAccess::Protected, false) => RouteDecision::Redirect(LOGIN_PATH),
        _ => RouteDecision::Render(route),
    }
}
