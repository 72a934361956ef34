//! Route table, location history, and the guard in front of the protected views.

use crate::session::Session;
use log::debug;
use std::fmt;

pub const ENTRY_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The login screen
    Entry,
    Dashboard,
    Users,
    Types,
    Contacts,
    NotFound(String),
}

impl Route {
    /// Query strings and fragments are ignored, as is a trailing slash.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Entry,
            "/dashboard" => Route::Dashboard,
            "/users" => Route::Users,
            "/types" => Route::Types,
            "/contacts" => Route::Contacts,
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Entry => ENTRY_PATH,
            Route::Dashboard => "/dashboard",
            Route::Users => "/users",
            Route::Types => "/types",
            Route::Contacts => "/contacts",
            Route::NotFound(path) => path,
        }
    }

    /// Everything behind the login screen.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Entry | Route::NotFound(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Current location plus everything visited before it. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    history: Vec<String>,
}

impl Navigator {
    pub fn new(initial: &str) -> Self {
        Navigator {
            history: vec![initial.to_string()],
        }
    }

    pub fn current(&self) -> &str {
        self.history.last().map(String::as_str).unwrap_or(ENTRY_PATH)
    }

    pub fn current_route(&self) -> Route {
        Route::from_path(self.current())
    }

    pub fn push(&mut self, path: &str) {
        debug!("navigate {} -> {}", self.current(), path);
        self.history.push(path.to_string());
    }

    /// Swap the current location without adding a history entry.
    pub fn replace(&mut self, path: &str) {
        debug!("redirect {} -> {}", self.current(), path);
        self.history.pop();
        self.history.push(path.to_string());
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Navigator::new(ENTRY_PATH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Startup check still running; show a placeholder.
    Pending,
    Redirect(Route),
    Render(Route),
}

/// Decides what a visit to `route` shows. Redirects replace the current location; the session
/// state itself is never touched.
pub fn guard(session: &Session, route: Route) -> GuardOutcome {
    if session.is_loading() {
        return GuardOutcome::Pending;
    }
    if route.is_protected() && !session.is_authenticated() {
        session.replace(ENTRY_PATH);
        return GuardOutcome::Redirect(Route::Entry);
    }
    GuardOutcome::Render(route)
}

#[test]
fn test_route_paths() {
    assert_eq!(Route::from_path("/"), Route::Entry);
    assert_eq!(Route::from_path(""), Route::Entry);
    assert_eq!(Route::from_path("/users"), Route::Users);
    assert_eq!(Route::from_path("/users/"), Route::Users);
    assert_eq!(Route::from_path("/types?tab=inactive"), Route::Types);
    assert_eq!(Route::from_path("/contacts#top"), Route::Contacts);
    assert_eq!(
        Route::from_path("/players"),
        Route::NotFound("/players".to_string())
    );

    for route in [
        Route::Entry,
        Route::Dashboard,
        Route::Users,
        Route::Types,
        Route::Contacts,
    ] {
        assert_eq!(Route::from_path(route.path()), route);
    }

    assert!(Route::Users.is_protected());
    assert!(Route::Dashboard.is_protected());
    assert!(!Route::Entry.is_protected());
    assert!(!Route::NotFound("/x".to_string()).is_protected());
}

#[test]
fn test_navigator() {
    let mut nav = Navigator::default();
    assert_eq!(nav.current(), "/");
    nav.push("/dashboard");
    nav.push("/users");
    assert_eq!(nav.current_route(), Route::Users);
    nav.replace("/");
    assert_eq!(nav.current(), "/");
    assert_eq!(nav.history(), &["/", "/dashboard", "/"]);
}
