//! Shared services handed to resources at registration time.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;

/// Type-keyed container of shared services.
///
/// The router passes it to [`ResourceSpec::inject`](crate::ResourceSpec::inject)
/// before composing a resource, so a resource can pull the database pool,
/// cache client, etc. it needs.
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service`, replacing any previous service of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        self.entries.insert(TypeId::of::<T>(), Arc::new(service));
        self
    }

    /// Registers an already shared `service`; [`get`](Self::get) hands back
    /// clones of this same `Arc`.
    pub fn insert_shared<T: Any + Send + Sync>(&mut self, service: Arc<T>) -> &mut Self {
        self.entries.insert(TypeId::of::<T>(), service);
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Like [`get`](Self::get), but a missing service is an error.
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Error> {
        self.get::<T>().ok_or(Error::MissingService(type_name::<T>()))
    }
}
