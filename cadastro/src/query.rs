//! Per-list query state shared by every view.
//!
//! Each (resource, partition) pair is one query. Views read through the cache, mutations mark
//! queries stale, and the next `ensure` re-issues them. A failed fetch is tried once more unless
//! the failure was an expired session.

use crate::resources::{Partition, ResourceKind};
use crate::{Error, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub resource: ResourceKind,
    pub partition: Partition,
}

impl QueryKey {
    pub fn new(resource: ResourceKind, partition: Partition) -> Self {
        QueryKey {
            resource,
            partition,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    Idle,
    Ready(Vec<Value>),
    /// Carries the last good rows, if there ever were any
    Failed {
        message: String,
        previous: Option<Vec<Value>>,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    state: QueryState,
    stale: bool,
    issued: u32,
}

impl Default for Entry {
    fn default() -> Self {
        Entry {
            state: QueryState::Idle,
            stale: true,
            issued: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: QueryKey) -> QueryState {
        self.entries
            .get(&key)
            .map(|e| e.state.clone())
            .unwrap_or(QueryState::Idle)
    }

    /// Rows to show for a query: the current ones, or the last good ones after a failure.
    pub fn data(&self, key: QueryKey) -> Option<&[Value]> {
        match &self.entries.get(&key)?.state {
            QueryState::Ready(rows) => Some(rows.as_slice()),
            QueryState::Failed {
                previous: Some(rows),
                ..
            } => Some(rows.as_slice()),
            _ => None,
        }
    }

    pub fn rows<T: DeserializeOwned>(&self, key: QueryKey) -> Result<Vec<T>> {
        match self.data(key) {
            Some(rows) => rows
                .iter()
                .map(|v| serde_json::from_value(v.clone()).map_err(Error::from))
                .collect(),
            None => Ok(vec![]),
        }
    }

    pub fn is_stale(&self, key: QueryKey) -> bool {
        self.entries.get(&key).map(|e| e.stale).unwrap_or(true)
    }

    /// How many requests have gone out for this query, retries included.
    pub fn issued(&self, key: QueryKey) -> u32 {
        self.entries.get(&key).map(|e| e.issued).unwrap_or(0)
    }

    pub fn invalidate(&mut self, key: QueryKey) {
        debug!("invalidating {:?}", key);
        self.entries.entry(key).or_default().stale = true;
    }

    /// Fetch only if never fetched, or invalidated since.
    pub fn ensure<F>(&mut self, key: QueryKey, fetch: F) -> Result<()>
    where
        F: FnMut() -> Result<Vec<Value>>,
    {
        if self.is_stale(key) {
            self.fetch(key, fetch)
        } else {
            Ok(())
        }
    }

    /// Issue the query now. The outcome replaces whatever was there before.
    pub fn fetch<F>(&mut self, key: QueryKey, mut fetch: F) -> Result<()>
    where
        F: FnMut() -> Result<Vec<Value>>,
    {
        let entry = self.entries.entry(key).or_default();
        let previous = match std::mem::replace(&mut entry.state, QueryState::Idle) {
            QueryState::Ready(rows) => Some(rows),
            QueryState::Failed { previous, .. } => previous,
            _ => None,
        };

        entry.issued += 1;
        let mut result = fetch();
        if let Err(err) = &result {
            if err.is_retryable() {
                debug!("query {:?} failed ({}), retrying once", key, err);
                entry.issued += 1;
                result = fetch();
            }
        }

        match result {
            Ok(rows) => {
                entry.state = QueryState::Ready(rows);
                entry.stale = false;
                Ok(())
            }
            Err(err) => {
                entry.state = QueryState::Failed {
                    message: err.notice_message(),
                    previous,
                };
                entry.stale = true;
                Err(err)
            }
        }
    }
}

#[test]
fn test_fetch_and_invalidate() {
    use serde_json::json;
    let key = QueryKey::new(ResourceKind::Users, Partition::Active);
    let mut cache = QueryCache::new();
    assert_eq!(cache.state(key), QueryState::Idle);
    assert!(cache.is_stale(key));

    cache.ensure(key, || Ok(vec![json!({"id": 1})])).unwrap();
    assert_eq!(cache.issued(key), 1);
    // the fetch blocks, so callers only ever see the state before or after it
    assert_eq!(cache.state(key), QueryState::Ready(vec![json!({"id": 1})]));
    // fresh, so no request
    cache.ensure(key, || panic!("should not fetch")).unwrap();
    assert_eq!(cache.issued(key), 1);

    cache.invalidate(key);
    cache
        .ensure(key, || Ok(vec![json!({"id": 1}), json!({"id": 2})]))
        .unwrap();
    assert_eq!(cache.issued(key), 2);
    assert_eq!(cache.data(key).map(|rows| rows.len()), Some(2));
}

#[test]
fn test_retry_once() {
    use serde_json::json;
    let key = QueryKey::new(ResourceKind::Types, Partition::Inactive);
    let mut cache = QueryCache::new();

    let mut calls = 0;
    cache
        .fetch(key, || {
            calls += 1;
            if calls == 1 {
                Err(Error::Remote {
                    status: 503,
                    message: "busy".to_string(),
                })
            } else {
                Ok(vec![json!({"id": 5})])
            }
        })
        .unwrap();
    assert_eq!(calls, 2);
    assert_eq!(cache.issued(key), 2);

    // keeps the last good rows when both attempts fail
    let mut calls = 0;
    let res = cache.fetch(key, || {
        calls += 1;
        Err(Error::Remote {
            status: 500,
            message: "down".to_string(),
        })
    });
    assert!(res.is_err());
    assert_eq!(calls, 2);
    assert_eq!(cache.data(key).map(|rows| rows.len()), Some(1));
    assert!(matches!(cache.state(key), QueryState::Failed { .. }));
}

#[test]
fn test_no_retry_when_expired() {
    let key = QueryKey::new(ResourceKind::Contacts, Partition::Active);
    let mut cache = QueryCache::new();
    let mut calls = 0;
    let res = cache.fetch(key, || {
        calls += 1;
        Err(Error::AuthorizationExpired)
    });
    assert!(matches!(res, Err(Error::AuthorizationExpired)));
    assert_eq!(calls, 1);
    assert_eq!(cache.data(key), None);
}
