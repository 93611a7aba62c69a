//! Single-entity edit sessions.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::{ApiError, Committed, Mutable, MutateEndpoint};
use crate::cache::{EntityCache, QueryFilter};
use crate::clock::Clock;
use crate::refresh::{reload_after_mutation, RefreshTarget};

/// Entities with a user-editable form.
pub trait Editable: Mutable {
  type Form: Clone + fmt::Debug + Send + Sync;

  fn to_form(&self) -> Self::Form;

  /// Convert a submitted form into the collection's update payload.
  fn build_update(form: &Self::Form, today: NaiveDate) -> Result<Self::Update, ApiError>;
}

#[derive(Debug, Clone)]
pub enum EditState<T: Editable> {
  Closed,
  Viewing(T),
  Editing { entity: T, form: T::Form },
}

impl<T: Editable> EditState<T> {
  pub fn entity(&self) -> Option<&T> {
    match self {
      EditState::Closed => None,
      EditState::Viewing(entity) | EditState::Editing { entity, .. } => Some(entity),
    }
  }
}

/// Holds at most one entity open for viewing or editing.
///
/// Opening or editing another entity discards the current session without
/// a refresh. A successful submit closes the session and reloads the
/// affected caches; a failed submit leaves the session as it was.
pub struct EditSessionController<T: Editable, F: QueryFilter> {
  state: EditState<T>,
  cache: Arc<EntityCache<T, F>>,
  endpoint: Arc<dyn MutateEndpoint<T>>,
  /// Reloaded after a successful submit; the edited collection comes first
  targets: Vec<RefreshTarget>,
  clock: Arc<dyn Clock>,
}

impl<T: Editable, F: QueryFilter> EditSessionController<T, F> {
  pub fn new(
    cache: Arc<EntityCache<T, F>>,
    endpoint: Arc<dyn MutateEndpoint<T>>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let targets = vec![RefreshTarget::always(cache.clone())];
    Self {
      state: EditState::Closed,
      cache,
      endpoint,
      targets,
      clock,
    }
  }

  /// Caches to refresh alongside the edited collection.
  pub fn with_dependents(mut self, dependents: impl IntoIterator<Item = RefreshTarget>) -> Self {
    self.targets.extend(dependents);
    self
  }

  pub fn state(&self) -> &EditState<T> {
    &self.state
  }

  pub fn current(&self) -> Option<&T> {
    self.state.entity()
  }

  pub fn is_open(&self) -> bool {
    !matches!(self.state, EditState::Closed)
  }

  pub fn is_editing(&self) -> bool {
    matches!(self.state, EditState::Editing { .. })
  }

  pub fn open_details(&mut self, entity: T) {
    self.state = EditState::Viewing(entity);
  }

  /// Open the cached entity with this id. Returns false if it is not in
  /// the cache.
  pub fn open_details_by_id(&mut self, id: &str) -> bool {
    match self.cache.get(id) {
      Some(entity) => {
        self.open_details(entity);
        true
      }
      None => false,
    }
  }

  /// Start editing `entity`, discarding any previous session.
  pub fn begin_edit(&mut self, entity: T) {
    let form = entity.to_form();
    self.state = EditState::Editing { entity, form };
  }

  /// Switch from the details view to the edit form of the same entity.
  pub fn edit_current(&mut self) -> bool {
    match std::mem::replace(&mut self.state, EditState::Closed) {
      EditState::Viewing(entity) => {
        self.begin_edit(entity);
        true
      }
      other => {
        self.state = other;
        false
      }
    }
  }

  pub fn form(&self) -> Option<&T::Form> {
    match &self.state {
      EditState::Editing { form, .. } => Some(form),
      _ => None,
    }
  }

  pub fn form_mut(&mut self) -> Option<&mut T::Form> {
    match &mut self.state {
      EditState::Editing { form, .. } => Some(form),
      _ => None,
    }
  }

  /// Close without saving. Nothing is refreshed.
  pub fn cancel(&mut self) {
    self.state = EditState::Closed;
  }

  pub async fn submit(&mut self) -> Result<Committed<T>, ApiError> {
    let (id, update) = match &self.state {
      EditState::Editing { entity, form } => (
        entity.cache_key().to_string(),
        T::build_update(form, self.clock.today())?,
      ),
      _ => return Err(ApiError::Validation("nothing is being edited".into())),
    };

    let updated = self.endpoint.update(&id, &update).await.map_err(|e| {
      error!(entity = T::entity_type(), id = %id, error = %e, "Update failed");
      e
    })?;
    info!(entity = T::entity_type(), id = %id, "Updated");

    self.state = EditState::Closed;
    let refresh_error = reload_after_mutation(&self.targets).await;
    Ok(Committed {
      value: updated,
      refresh_error,
    })
  }
}
