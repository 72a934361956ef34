//! The console itself: maps each route to its view, behind the route guard.

use crate::client::{ApiClient, ClientConfig};
use crate::notice::Notifier;
use crate::query::QueryCache;
use crate::resources::{
    Category, Contact, Contacts, Partition, RecordId, Resource, Types, User, Users,
};
use crate::routes::{guard, GuardOutcome, Route};
use crate::session::Session;
use crate::storage::CredentialStore;
use crate::views::{DashboardCounts, DashboardView, ResourceView};
use crate::{Error, Result};
use log::{debug, warn};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage<T> {
    pub active: Vec<T>,
    pub inactive: Vec<T>,
}

impl<T> ListPage<T> {
    pub fn partition(&self, partition: Partition) -> &[T] {
        match partition {
            Partition::Active => &self.active,
            Partition::Inactive => &self.inactive,
        }
    }
}

/// What a visit ends up showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Session startup check not finished
    Loading,
    Login,
    Dashboard(DashboardCounts),
    Users(ListPage<User>),
    Types(ListPage<Category>),
    Contacts(ListPage<Contact>),
    NotFound(String),
}

pub struct Console {
    client: ApiClient,
    cache: QueryCache,
}

impl Console {
    /// Reads the credential store, then wires the client to the resulting session.
    pub fn new(
        config: ClientConfig,
        store: Box<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let session = Session::startup(store, notifier)?;
        Ok(Console::from_client(ApiClient::new(config, session)?))
    }

    pub fn from_client(client: ApiClient) -> Self {
        Console {
            client,
            cache: QueryCache::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn view<R: Resource>(&mut self) -> ResourceView<'_, R> {
        ResourceView::new(&self.client, &mut self.cache)
    }

    pub fn dashboard(&mut self) -> DashboardView<'_> {
        DashboardView::new(&self.client, &mut self.cache)
    }

    /// Submits the login form, then shows wherever the session ended up.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Page> {
        self.client.session().login(&self.client, username, password)?;
        self.render_current()
    }

    pub fn logout(&mut self) -> Result<Page> {
        self.session().logout()?;
        self.render_current()
    }

    pub fn visit(&mut self, path: &str) -> Result<Page> {
        self.session().navigate(path);
        self.render_current()
    }

    /// Opens the resource's screen and submits its creation form there. An incomplete form is
    /// refused before anything is sent.
    pub fn create<R: Resource>(&mut self, draft: &R::Draft) -> Result<Page> {
        self.view::<R>().check(draft)?;
        if let Some(page) = self.open_for_mutation::<R>()? {
            return Ok(page);
        }
        self.view::<R>().create(draft)?;
        self.render_current()
    }

    pub fn toggle<R: Resource>(&mut self, id: &RecordId) -> Result<Page> {
        if let Some(page) = self.open_for_mutation::<R>()? {
            return Ok(page);
        }
        self.view::<R>().toggle(id)?;
        self.render_current()
    }

    /// Visits the resource's screen before a mutation. Returns the login page if the mutation
    /// can't go ahead; a screen that failed to render otherwise doesn't hold the mutation up.
    fn open_for_mutation<R: Resource>(&mut self) -> Result<Option<Page>> {
        match self.visit(R::KIND.route().path()) {
            Ok(Page::Login) => Ok(Some(Page::Login)),
            Ok(_) => Ok(None),
            Err(Error::AuthorizationExpired) => Err(Error::AuthorizationExpired),
            Err(err) => {
                warn!("{} screen did not render: {}", R::KIND.label(), err);
                Ok(None)
            }
        }
    }

    pub fn render_current(&mut self) -> Result<Page> {
        let route = Route::from_path(&self.session().location());
        match guard(self.session(), route) {
            GuardOutcome::Pending => Ok(Page::Loading),
            GuardOutcome::Redirect(_) => Ok(Page::Login),
            GuardOutcome::Render(Route::Entry) => {
                if self.session().is_authenticated() {
                    self.visit(Route::Dashboard.path())
                } else {
                    Ok(Page::Login)
                }
            }
            GuardOutcome::Render(Route::Dashboard) => Ok(Page::Dashboard(self.dashboard().load()?)),
            GuardOutcome::Render(Route::Users) => Ok(Page::Users(self.list_page::<Users>()?)),
            GuardOutcome::Render(Route::Types) => Ok(Page::Types(self.list_page::<Types>()?)),
            GuardOutcome::Render(Route::Contacts) => {
                Ok(Page::Contacts(self.list_page::<Contacts>()?))
            }
            GuardOutcome::Render(Route::NotFound(path)) => Ok(Page::NotFound(path)),
        }
    }

    fn list_page<R: Resource>(&mut self) -> Result<ListPage<R::Record>> {
        let mut view = self.view::<R>();
        match view.load() {
            Ok(()) => {}
            Err(Error::AuthorizationExpired) => return Err(Error::AuthorizationExpired),
            // already shown as a notice; render whatever rows are cached
            Err(err) => debug!("{} list incomplete: {}", R::KIND.label(), err),
        }
        Ok(ListPage {
            active: view.rows(Partition::Active)?,
            inactive: view.rows(Partition::Inactive)?,
        })
    }
}
