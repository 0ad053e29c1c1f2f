//! Turns a raw watch stream into add/update/delete callbacks.
//!
//! `kube::runtime::watcher` only reports "applied" and "deleted". Handlers
//! need to know whether an object is new, so the loop keeps the last seen
//! version of every object. A re-list after a dropped watch also reports
//! deletions that happened while disconnected.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use kube::{
    Api, Resource, ResourceExt,
    runtime::{WatchStreamExt, watcher},
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Callbacks invoked by [`start_watch`]. Each runs to completion before the
/// next event is handled.
#[async_trait]
pub trait ResourceEventHandler<K>: Send + Sync {
    async fn on_add(&self, obj: &K);
    async fn on_update(&self, old: &K, new: &K);
    async fn on_delete(&self, obj: &K);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification<K> {
    Add(K),
    Update { old: K, new: K },
    Delete(K),
}

type Key = (Option<String>, String);

fn key_of<K: Resource>(obj: &K) -> Key {
    (obj.namespace(), obj.name_any())
}

/// Cache of last-seen objects used to classify watch events.
pub struct EventClassifier<K> {
    known: HashMap<Key, K>,
    relisted: Option<HashSet<Key>>,
}

impl<K> Default for EventClassifier<K> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relisted: None,
        }
    }
}

impl<K: Resource + Clone> EventClassifier<K> {
    pub fn classify(&mut self, event: watcher::Event<K>) -> Vec<Notification<K>> {
        match event {
            watcher::Event::Apply(obj) => self.apply(obj).into_iter().collect(),
            watcher::Event::Delete(obj) => {
                self.known.remove(&key_of(&obj));
                vec![Notification::Delete(obj)]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(key_of(&obj));
                }
                self.apply(obj).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relisted.take() else {
                    return Vec::new();
                };
                let gone: Vec<Key> = self
                    .known
                    .keys()
                    .filter(|k| !seen.contains(*k))
                    .cloned()
                    .collect();
                gone.into_iter()
                    .filter_map(|k| self.known.remove(&k))
                    .map(Notification::Delete)
                    .collect()
            }
        }
    }

    fn apply(&mut self, obj: K) -> Option<Notification<K>> {
        match self.known.insert(key_of(&obj), obj.clone()) {
            None => Some(Notification::Add(obj)),
            Some(old) => {
                let unchanged = old.resource_version().is_some()
                    && old.resource_version() == obj.resource_version();
                if unchanged {
                    None
                } else {
                    Some(Notification::Update { old, new: obj })
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

pub async fn dispatch<K, H>(handler: &H, notification: Notification<K>)
where
    K: Send + Sync,
    H: ResourceEventHandler<K> + ?Sized,
{
    match notification {
        Notification::Add(obj) => handler.on_add(&obj).await,
        Notification::Update { old, new } => handler.on_update(&old, &new).await,
        Notification::Delete(obj) => handler.on_delete(&obj).await,
    }
}

/// Watches `api` and feeds its events to `handler` until `stop` resolves or
/// the stream ends.
pub async fn start_watch<K, H>(
    api: Api<K>,
    config: watcher::Config,
    handler: &H,
    stop: impl Future<Output = ()>,
) where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    H: ResourceEventHandler<K> + ?Sized,
{
    info!(kind = %K::kind(&()), "Starting watch");
    let events = watcher(api, config).default_backoff();
    run_event_loop(events, handler, stop).await;
}

/// Classifies each event from `events` and hands the result to `handler`.
///
/// `stop` is polled first, so once it resolves no further event is handled.
/// Stream errors are logged; the loop only ends on `stop` or end of stream.
pub async fn run_event_loop<K, H, S>(events: S, handler: &H, stop: impl Future<Output = ()>)
where
    K: Resource + Clone + Send + Sync,
    H: ResourceEventHandler<K> + ?Sized,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    let mut classifier = EventClassifier::<K>::default();
    tokio::pin!(events);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => {
                info!("stop signal received, ending watch");
                break;
            }
            event = events.next() => match event {
                Some(Ok(event)) => {
                    for notification in classifier.classify(event) {
                        dispatch(handler, notification).await;
                    }
                    debug!(cached = classifier.len(), "watch event handled");
                }
                Some(Err(error)) => warn!(%error, "watch error"),
                None => {
                    warn!("watch stream ended");
                    break;
                }
            }
        }
    }
}
