use log::debug;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::connections::errors::ConnectionError;
use crate::core::params::Params;

/// A manager shared by everyone who asked for the same parameters.
pub type Shared<M> = Arc<Mutex<M>>;

/// A type that can be memoized by the [`Registry`].
///
/// Construction must be cheap and must not touch the network; connecting
/// happens lazily on first use.
pub trait Managed: Send + 'static {
    fn new(params: Params) -> Self;
}

type RegistryKey = (TypeId, Params);

/// Keyed-singleton registry: one manager per (manager type, parameters).
///
/// The registry is owned by the test session and cloned wherever it is
/// needed. Cloning merely increases the reference count, so every clone sees
/// the same entries. Entries are never evicted.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<RegistryKey, Arc<dyn Any + Send + Sync>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the manager registered for `params`, constructing and
    /// registering it on first request.
    pub fn get_or_create<M: Managed>(&self, params: Params) -> Result<Shared<M>, ConnectionError> {
        let key = (TypeId::of::<M>(), params);
        let mut map = self
            .inner
            .lock()
            .map_err(|_| ConnectionError::Other("registry lock poisoned".into()))?;

        if let Some(existing) = map.get(&key) {
            return Arc::clone(existing)
                .downcast::<Mutex<M>>()
                .map_err(|_| ConnectionError::Other("registry entry has an unexpected type".into()));
        }

        debug!("Registering new {} for {}", std::any::type_name::<M>(), key.1);
        let manager: Shared<M> = Arc::new(Mutex::new(M::new(key.1.clone())));
        map.insert(key, manager.clone());
        Ok(manager)
    }

    /// Like [`Registry::get_or_create`], taking parameters as a JSON object.
    /// Non-primitive values fail construction.
    pub fn get_or_create_from_json<M: Managed>(
        &self,
        params: &serde_json::Value,
    ) -> Result<Shared<M>, ConnectionError> {
        let params = Params::from_json(params)?;
        self.get_or_create(params)
    }

    /// Whether a manager of type `M` is registered for `params`.
    pub fn contains<M: Managed>(&self, params: &Params) -> bool {
        let key = (TypeId::of::<M>(), params.clone());
        self.inner
            .lock()
            .map(|map| map.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
