use std::collections::HashMap;

use crate::errors::RepositoryError;
use crate::line_item::LineItemId;

/// Resolves the external entity a line item refers to through its
/// `associated_model` attribute.
pub trait ModelRepository {
    type Entity;
    type Error;

    fn find_by_id(&self, model: &str, id: &LineItemId)
        -> Result<Option<Self::Entity>, Self::Error>;
}

impl<R: ModelRepository + ?Sized> ModelRepository for &R {
    type Entity = R::Entity;
    type Error = R::Error;

    fn find_by_id(
        &self,
        model: &str,
        id: &LineItemId,
    ) -> Result<Option<Self::Entity>, Self::Error> {
        (**self).find_by_id(model, id)
    }
}

/// Registry of entities grouped by model name. Looking up a model that was
/// never registered is an error; a registered model without the id is `None`.
#[derive(Clone, Debug)]
pub struct InMemoryModelRepository<E> {
    models: HashMap<String, HashMap<String, E>>,
}

impl<E> Default for InMemoryModelRepository<E> {
    fn default() -> Self {
        Self { models: HashMap::new() }
    }
}

impl<E> InMemoryModelRepository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_model(&mut self, model: impl Into<String>) {
        self.models.entry(model.into()).or_default();
    }

    pub fn insert(&mut self, model: impl Into<String>, id: &LineItemId, entity: E) {
        self.models.entry(model.into()).or_default().insert(id.0.clone(), entity);
    }
}

impl<E: Clone> ModelRepository for InMemoryModelRepository<E> {
    type Entity = E;
    type Error = RepositoryError;

    fn find_by_id(&self, model: &str, id: &LineItemId) -> Result<Option<E>, RepositoryError> {
        let entities =
            self.models.get(model).ok_or_else(|| RepositoryError::UnknownModel(model.to_string()))?;
        Ok(entities.get(&id.0).cloned())
    }
}
