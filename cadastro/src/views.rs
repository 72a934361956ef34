use crate::client::ApiClient;
use crate::notice::Notice;
use crate::query::{QueryCache, QueryKey};
use crate::resources::{list_items, Draft, Partition, RecordId, Resource, ResourceKind};
use crate::{Error, Result};
use log::{info, warn};
use serde_json::Value;
use std::marker::PhantomData;

fn fetch_list(client: &ApiClient, kind: ResourceKind, partition: Partition) -> Result<Vec<Value>> {
    list_items(client.get(&kind.list_path(partition))?)
}

/// Shows the failure to the operator. Expired sessions were already announced by the session.
fn report(client: &ApiClient, err: &Error) {
    if !matches!(err, Error::AuthorizationExpired) {
        client.session().notify(Notice::error(err.notice_message()));
    }
}

/// Active and inactive lists of one resource, plus its create and toggle actions.
pub struct ResourceView<'a, R: Resource> {
    client: &'a ApiClient,
    cache: &'a mut QueryCache,
    resource: PhantomData<R>,
}

impl<'a, R: Resource> ResourceView<'a, R> {
    pub fn new(client: &'a ApiClient, cache: &'a mut QueryCache) -> Self {
        ResourceView {
            client,
            cache,
            resource: PhantomData,
        }
    }

    pub fn key(partition: Partition) -> QueryKey {
        QueryKey::new(R::KIND, partition)
    }

    /// Loads both lists if they aren't fresh. A failure on one list doesn't stop the other,
    /// except an expired session, which ends the visit.
    pub fn load(&mut self) -> Result<()> {
        let client = self.client;
        let mut first_err = None;
        for partition in Partition::BOTH {
            let res = self
                .cache
                .ensure(Self::key(partition), || fetch_list(client, R::KIND, partition));
            match res {
                Ok(()) => {}
                Err(Error::AuthorizationExpired) => return Err(Error::AuthorizationExpired),
                Err(err) => {
                    report(client, &err);
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn rows(&self, partition: Partition) -> Result<Vec<R::Record>> {
        self.cache.rows(Self::key(partition))
    }

    /// Required-field check. On failure the operator is told which fields are blank and nothing
    /// is sent.
    pub fn check(&self, draft: &R::Draft) -> Result<()> {
        if let Err(err) = draft.validate() {
            if let Error::Validation { fields } = &err {
                self.client.session().notify(Notice::error(format!(
                    "Fill in all required fields ({})",
                    fields.join(", ")
                )));
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn create(&mut self, draft: &R::Draft) -> Result<Value> {
        self.check(draft)?;
        let created = match self.client.post(&R::KIND.create_path(), draft) {
            Ok(created) => created,
            Err(err) => {
                report(self.client, &err);
                return Err(err);
            }
        };
        info!("created {}: {:?}", R::KIND.noun(), draft);
        self.client
            .session()
            .notify(Notice::success(format!("{} created", R::KIND.title())));
        self.refresh();
        Ok(created)
    }

    pub fn toggle(&mut self, id: &RecordId) -> Result<Value> {
        let updated = match self.client.put(&R::KIND.toggle_path(id)) {
            Ok(updated) => updated,
            Err(err) => {
                report(self.client, &err);
                return Err(err);
            }
        };
        info!("toggled status of {} {}", R::KIND.noun(), id);
        self.client.session().notify(Notice::success(format!(
            "{} status changed",
            R::KIND.title()
        )));
        self.refresh();
        Ok(updated)
    }

    /// After a successful mutation: both lists are stale, fetch them again. The mutation already
    /// succeeded, so a failed re-fetch is only reported.
    fn refresh(&mut self) {
        for partition in Partition::BOTH {
            self.cache.invalidate(Self::key(partition));
        }
        if let Err(err) = self.load() {
            warn!("re-fetch after {} mutation failed: {}", R::KIND.noun(), err);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardCounts {
    pub users: usize,
    pub types: usize,
    pub contacts: usize,
}

impl DashboardCounts {
    pub fn get(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Users => self.users,
            ResourceKind::Types => self.types,
            ResourceKind::Contacts => self.contacts,
        }
    }
}

/// Counts of active records. Shares its queries with the resource views.
pub struct DashboardView<'a> {
    client: &'a ApiClient,
    cache: &'a mut QueryCache,
}

impl<'a> DashboardView<'a> {
    pub fn new(client: &'a ApiClient, cache: &'a mut QueryCache) -> Self {
        DashboardView { client, cache }
    }

    /// A list that fails to load counts as whatever was last seen, or zero.
    pub fn load(&mut self) -> Result<DashboardCounts> {
        let client = self.client;
        for kind in ResourceKind::ALL {
            let res = self.cache.ensure(QueryKey::new(kind, Partition::Active), || {
                fetch_list(client, kind, Partition::Active)
            });
            match res {
                Ok(()) => {}
                Err(Error::AuthorizationExpired) => return Err(Error::AuthorizationExpired),
                Err(err) => report(client, &err),
            }
        }
        Ok(self.counts())
    }

    pub fn counts(&self) -> DashboardCounts {
        let count = |kind| {
            self.cache
                .data(QueryKey::new(kind, Partition::Active))
                .map(|rows| rows.len())
                .unwrap_or(0)
        };
        DashboardCounts {
            users: count(ResourceKind::Users),
            types: count(ResourceKind::Types),
            contacts: count(ResourceKind::Contacts),
        }
    }
}
