//! The session guard: one credential, two states.
//!
//! `Unauthenticated -> Authenticated` only through a successful [`Session::login`].
//! `Authenticated -> Unauthenticated` through [`Session::logout`], or through [`Session::expire`]
//! when the API client sees a 401. Until [`Session::check_storage`] has run the session is
//! "loading" and the route guard shows a placeholder.

use crate::client::ApiClient;
use crate::notice::{Notice, Notifier};
use crate::routes::{Navigator, Route, ENTRY_PATH};
use crate::storage::CredentialStore;
use crate::{lock, Error, Result};
use log::{debug, info, warn};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

pub struct Session {
    store: Box<dyn CredentialStore>,
    // None until the startup check has read the store
    state: Mutex<Option<AuthState>>,
    navigator: Mutex<Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &*lock(&self.state))
            .field("location", &lock(&self.navigator).current())
            .finish()
    }
}

impl Session {
    /// A session whose startup check has not run yet.
    pub fn new(store: Box<dyn CredentialStore>, notifier: Arc<dyn Notifier>) -> Self {
        Session {
            store,
            state: Mutex::new(None),
            navigator: Mutex::new(Navigator::default()),
            notifier,
        }
    }

    /// Builds the session and runs the startup check in one go.
    pub fn startup(
        store: Box<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Session>> {
        let session = Session::new(store, notifier);
        session.check_storage()?;
        Ok(Arc::new(session))
    }

    /// Authenticated iff a credential is present. Its validity is the server's business.
    pub fn check_storage(&self) -> Result<AuthState> {
        let state = match self.store.load()? {
            Some(_) => AuthState::Authenticated,
            None => AuthState::Unauthenticated,
        };
        debug!("startup check: {:?}", state);
        *lock(&self.state) = Some(state);
        Ok(state)
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_none()
    }

    pub fn state(&self) -> AuthState {
        lock(&self.state).unwrap_or(AuthState::Unauthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    /// Read on every outgoing request.
    pub fn credential(&self) -> Result<Option<String>> {
        self.store.load()
    }

    pub fn location(&self) -> String {
        lock(&self.navigator).current().to_string()
    }

    pub fn history(&self) -> Vec<String> {
        lock(&self.navigator).history().to_vec()
    }

    pub fn navigate(&self, path: &str) {
        lock(&self.navigator).push(path);
    }

    pub fn replace(&self, path: &str) {
        lock(&self.navigator).replace(path);
    }

    pub fn notify(&self, notice: Notice) {
        self.notifier.notify(&notice);
    }

    pub fn login(&self, client: &ApiClient, identifier: &str, secret: &str) -> Result<()> {
        let mut missing = vec![];
        if identifier.trim().is_empty() {
            missing.push("username");
        }
        if secret.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            self.notify(Notice::error("Username and password are required."));
            return Err(Error::validation(missing));
        }

        let credential = match client.request_token(identifier, secret) {
            Ok(credential) => credential,
            Err(err) => {
                warn!("login failed for {}: {}", identifier, err);
                self.notify(Notice::error("Login failed. Check your credentials."));
                return Err(err);
            }
        };
        self.store.save(&credential)?;
        *lock(&self.state) = Some(AuthState::Authenticated);
        info!("logged in as {}", identifier);
        self.navigate(Route::Dashboard.path());
        self.notify(Notice::success("Logged in"));
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        *lock(&self.state) = Some(AuthState::Unauthenticated);
        info!("logged out");
        self.navigate(ENTRY_PATH);
        self.notify(Notice::info("You have been logged out"));
        Ok(())
    }

    /// Called by the API client on any 401. Outside the entry screen this drops the credential
    /// and sends the operator back to it; on the entry screen it does nothing.
    ///
    /// Returns whether the session acted.
    pub fn expire(&self) -> bool {
        let mut nav = lock(&self.navigator);
        if nav.current() == ENTRY_PATH {
            debug!("401 on the entry screen, leaving session alone");
            return false;
        }
        let from = nav.current().to_string();
        nav.push(ENTRY_PATH);
        drop(nav);

        if let Err(err) = self.store.clear() {
            warn!("failed to clear expired credential: {}", err);
        }
        *lock(&self.state) = Some(AuthState::Unauthenticated);
        warn!("authorization expired at {}, returning to login", from);
        self.notify(Notice::error("Your session has expired. Log in again."));
        true
    }
}

#[cfg(test)]
fn memory_session(credential: Option<&str>) -> (Session, Arc<crate::storage::MemoryStore>) {
    use crate::notice::SilentNotifier;
    use crate::storage::MemoryStore;

    let store = Arc::new(match credential {
        Some(c) => MemoryStore::with_credential(c),
        None => MemoryStore::new(),
    });
    (
        Session::new(Box::new(store.clone()), Arc::new(SilentNotifier)),
        store,
    )
}

#[test]
fn test_startup_check() {
    use crate::routes::{guard, GuardOutcome};

    let (session, _store) = memory_session(Some("tok123"));
    assert!(session.is_loading());
    assert_eq!(guard(&session, Route::Users), GuardOutcome::Pending);
    assert!(!session.is_authenticated());

    assert_eq!(session.check_storage().unwrap(), AuthState::Authenticated);
    assert!(!session.is_loading());
    assert_eq!(
        guard(&session, Route::Users),
        GuardOutcome::Render(Route::Users)
    );

    let (session, _store) = memory_session(None);
    assert_eq!(session.check_storage().unwrap(), AuthState::Unauthenticated);
    session.navigate("/contacts");
    assert_eq!(
        guard(&session, Route::Contacts),
        GuardOutcome::Redirect(Route::Entry)
    );
    assert_eq!(session.location(), ENTRY_PATH);
    assert_eq!(session.state(), AuthState::Unauthenticated);
}

#[test]
fn test_logout() {
    let (session, store) = memory_session(Some("tok123"));
    session.check_storage().unwrap();
    session.navigate("/types");
    session.logout().unwrap();
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(session.location(), ENTRY_PATH);
}

#[test]
fn test_expire() {
    let (session, store) = memory_session(Some("tok123"));
    session.check_storage().unwrap();

    // on the entry screen a 401 is just a failed login
    assert!(!session.expire());
    assert_eq!(store.load().unwrap(), Some("tok123".to_string()));
    assert!(session.is_authenticated());

    session.navigate("/users");
    assert!(session.expire());
    assert!(!session.expire());
    assert_eq!(store.clear_count(), 1);
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert_eq!(session.history(), vec!["/", "/users", "/"]);
}
