use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, trace, warn};

use super::registry::{FieldDescriptor, collect_unregistered};
use super::submission::{FormActions, SubmitHandler, SubmitStatus};
use super::validation::{
    FieldValidation, ValidationHints, ValidationOrdering, ValidationTicket, ValidatorMap,
};
use super::value::{FieldKey, FieldValue, FieldValues, FormModel, value_of};
use crate::runtime::{InlineSpawner, TaskSpawner};

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("field `{0}` is missing from the form data")]
    MissingField(String),
    #[error("field `{field}` does not hold a {expected} value")]
    FieldType {
        field: String,
        expected: &'static str,
    },
}

pub type FormResult<T> = Result<T, FormError>;

/// Options recognized by a form. Two configs with the same identity (see
/// [`FormConfig::same_identity`]) never trigger a reset.
pub struct FormConfig<H> {
    pub initial_values: FieldValues,
    pub validations: ValidatorMap<H>,
    pub validate_on_submit: bool,
    pub reset_on_prop_changes: bool,
    pub validation_ordering: ValidationOrdering,
}

impl<H> Default for FormConfig<H> {
    fn default() -> Self {
        Self {
            initial_values: FieldValues::new(),
            validations: ValidatorMap::new(),
            validate_on_submit: true,
            reset_on_prop_changes: false,
            validation_ordering: ValidationOrdering::LastResolved,
        }
    }
}

impl<H> Clone for FormConfig<H> {
    fn clone(&self) -> Self {
        Self {
            initial_values: self.initial_values.clone(),
            validations: self.validations.clone(),
            validate_on_submit: self.validate_on_submit,
            reset_on_prop_changes: self.reset_on_prop_changes,
            validation_ordering: self.validation_ordering,
        }
    }
}

impl<H> Debug for FormConfig<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormConfig")
            .field("initial_values", &self.initial_values)
            .field("validations", &self.validations)
            .field("validate_on_submit", &self.validate_on_submit)
            .field("reset_on_prop_changes", &self.reset_on_prop_changes)
            .field("validation_ordering", &self.validation_ordering)
            .finish()
    }
}

impl<H> FormConfig<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_values(mut self, values: FieldValues) -> Self {
        self.initial_values = values;
        self
    }

    pub fn initial_model<M: FormModel>(self, model: &M) -> Self {
        self.initial_values(model.to_values())
    }

    pub fn validations(mut self, validations: ValidatorMap<H>) -> Self {
        self.validations = validations;
        self
    }

    pub fn validate_on_submit(mut self, enabled: bool) -> Self {
        self.validate_on_submit = enabled;
        self
    }

    pub fn reset_on_prop_changes(mut self, enabled: bool) -> Self {
        self.reset_on_prop_changes = enabled;
        self
    }

    pub fn validation_ordering(mut self, ordering: ValidationOrdering) -> Self {
        self.validation_ordering = ordering;
        self
    }

    /// Compares the options that define which form this is: initial values,
    /// the validator set and `validate_on_submit`.
    pub fn same_identity(&self, other: &Self) -> bool {
        self.initial_values == other.initial_values
            && self.validate_on_submit == other.validate_on_submit
            && self.validations.same_as(&other.validations)
    }
}

/// The authoritative form record. Replaced as a whole on every transition.
#[derive(Clone, Debug, PartialEq)]
pub struct FormState<H> {
    pub status: SubmitStatus,
    pub status_message: String,
    pub field_errors: usize,
    pub data: FieldValues,
    pub validations: BTreeMap<FieldKey, FieldValidation<H>>,
}

impl<H> FormState<H> {
    fn initial(data: FieldValues) -> Self {
        Self {
            status: SubmitStatus::Idle,
            status_message: String::new(),
            field_errors: 0,
            data,
            validations: BTreeMap::new(),
        }
    }

    pub fn validation(&self, name: &str) -> Option<&FieldValidation<H>> {
        self.validations.get(name)
    }
}

pub type FormSnapshot<H> = Arc<FormState<H>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

pub(super) type Listener<H> = Arc<dyn Fn(&FormSnapshot<H>) + Send + Sync>;

pub(super) struct ControllerState<H> {
    pub(super) form: FormSnapshot<H>,
    /// Defaults for fields seen in the latest visit but absent from `data`.
    pub(super) unregistered: FieldValues,
    /// Field nodes found by the latest visit.
    pub(super) descriptors: Vec<FieldDescriptor>,
    pub(super) tickets: BTreeMap<FieldKey, ValidationTicket>,
    pub(super) registration_pending: bool,
}

impl<H> ControllerState<H> {
    pub(super) fn next_ticket(&mut self, key: &FieldKey) -> ValidationTicket {
        let next = ValidationTicket(
            self.tickets
                .get(key)
                .copied()
                .unwrap_or(ValidationTicket(0))
                .0
                + 1,
        );
        self.tickets.insert(key.clone(), next);
        next
    }

    pub(super) fn invalidate_tickets(&mut self) {
        for ticket in self.tickets.values_mut() {
            ticket.0 += 1;
        }
    }
}

/// Owns one form: its state, its configuration and the submit handler.
///
/// Cloning yields another handle to the same form.
pub struct FormController<H>
where
    H: ValidationHints,
{
    pub(super) config: Arc<RwLock<FormConfig<H>>>,
    pub(super) state: Arc<RwLock<ControllerState<H>>>,
    pub(super) on_submit: SubmitHandler<H>,
    pub(super) spawner: Arc<dyn TaskSpawner>,
    listeners: Arc<RwLock<BTreeMap<SubscriptionId, Listener<H>>>>,
    next_subscription: Arc<AtomicU64>,
}

impl<H> Clone for FormController<H>
where
    H: ValidationHints,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: self.state.clone(),
            on_submit: self.on_submit.clone(),
            spawner: self.spawner.clone(),
            listeners: self.listeners.clone(),
            next_subscription: self.next_subscription.clone(),
        }
    }
}

impl<H> FormController<H>
where
    H: ValidationHints,
{
    pub fn new(
        config: FormConfig<H>,
        on_submit: impl Fn(FormSnapshot<H>, FormActions<H>) + Send + Sync + 'static,
    ) -> Self {
        let form = Arc::new(FormState::initial(config.initial_values.clone()));
        Self {
            config: Arc::new(RwLock::new(config)),
            state: Arc::new(RwLock::new(ControllerState {
                form,
                unregistered: FieldValues::new(),
                descriptors: Vec::new(),
                tickets: BTreeMap::new(),
                registration_pending: false,
            })),
            on_submit: Arc::new(on_submit),
            spawner: Arc::new(InlineSpawner),
            listeners: Arc::new(RwLock::new(BTreeMap::new())),
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replaces the scheduler used for fire-and-forget validation and submits.
    pub fn with_spawner(mut self, spawner: impl TaskSpawner) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<H>> {
        Ok(read_lock(&self.state, "creating form snapshot")?.form.clone())
    }

    pub fn config(&self) -> FormResult<FormConfig<H>> {
        Ok(read_lock(&self.config, "reading form config")?.clone())
    }

    pub fn unregistered_fields(&self) -> FormResult<FieldValues> {
        Ok(read_lock(&self.state, "reading unregistered fields")?
            .unregistered
            .clone())
    }

    /// Value shown for `name`; [`FieldValue::Null`] when the field is unknown.
    pub fn get(&self, name: &str) -> FormResult<FieldValue> {
        let state = read_lock(&self.state, "reading field value")?;
        Ok(value_of(&state.form.data, &state.unregistered, name))
    }

    /// Decodes the current `data` record into a typed model.
    pub fn model<M: FormModel>(&self) -> FormResult<M> {
        M::from_values(&self.snapshot()?.data)
    }

    pub fn actions(&self) -> FormActions<H> {
        FormActions::new(self.clone())
    }

    /// Applies a field edit and schedules that field's validation.
    ///
    /// The write is visible as soon as this returns; the validation result
    /// lands later through the configured spawner.
    pub fn change(
        &self,
        name: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        let key = name.into();
        let value = value.into();
        self.write_value(&key, value.clone())?;

        let Some((validator, ticket)) = self.begin_validation(&key)? else {
            trace!(field = %key, "no validator registered");
            return Ok(());
        };
        let controller = self.clone();
        self.spawner.spawn(Box::pin(async move {
            let result = validator.run(value).await;
            if let Err(error) = controller.finish_validation(key.clone(), ticket, result) {
                warn!(field = %key, %error, "field validation could not be applied");
            }
        }));
        Ok(())
    }

    /// Like [`FormController::change`], but resolves once the validation settled.
    pub async fn change_async(
        &self,
        name: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        let key = name.into();
        let value = value.into();
        self.write_value(&key, value.clone())?;
        self.run_field_validation(key, value).await
    }

    /// Commits the fields discovered by the latest visit into `data`.
    pub fn mount(&self) -> FormResult<()> {
        self.commit_unregistered()?;
        Ok(())
    }

    /// Installs a new configuration. Returns `true` when the form was reset.
    ///
    /// The form resets to the new `initial_values` only if the identity of the
    /// config changed and the new config enables `reset_on_prop_changes`.
    pub fn update_config(&self, next: FormConfig<H>) -> FormResult<bool> {
        let reset_to = {
            let mut config = write_lock(&self.config, "updating form config")?;
            let changed = !config.same_identity(&next);
            let reset = changed && next.reset_on_prop_changes;
            debug!(changed, reset, "form config updated");
            let initial = reset.then(|| next.initial_values.clone());
            *config = next;
            initial
        };

        match reset_to {
            Some(initial) => {
                self.reset_form(initial)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&FormSnapshot<H>) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        write_lock(&self.listeners, "registering listener")?.insert(id, Arc::new(listener));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        Ok(write_lock(&self.listeners, "removing listener")?
            .remove(&id)
            .is_some())
    }

    /// Resets status, validations and `data`. The new data is `values` with the
    /// defaults of every field from the latest visit merged back in. Before the
    /// first visit, the fields are committed by the next `render` instead.
    pub(super) fn reset_form(&self, values: FieldValues) -> FormResult<FormSnapshot<H>> {
        debug!(fields = values.len(), "resetting form");
        self.transition("resetting form", |state| {
            state.invalidate_tickets();
            state.registration_pending = state.descriptors.is_empty();
            state.unregistered = FieldValues::new();
            let defaults = collect_unregistered(&state.descriptors, &values);
            FormState::initial(values.merged_over(&defaults))
        })
    }

    pub(super) fn commit_unregistered(&self) -> FormResult<FormSnapshot<H>> {
        self.transition("registering unregistered fields", |state| {
            if state.unregistered.is_empty() {
                return state.form.as_ref().clone();
            }
            debug!(fields = state.unregistered.len(), "registering discovered fields");
            let unregistered = std::mem::take(&mut state.unregistered);
            FormState {
                data: state.form.data.merged_over(&unregistered),
                ..state.form.as_ref().clone()
            }
        })
    }

    pub(super) fn rebuild_unregistered(
        &self,
        descriptors: Vec<FieldDescriptor>,
    ) -> FormResult<(FormSnapshot<H>, FieldValues, bool)> {
        let mut state = write_lock(&self.state, "rebuilding unregistered fields")?;
        state.unregistered = collect_unregistered(&descriptors, &state.form.data);
        state.descriptors = descriptors;
        let commit = std::mem::take(&mut state.registration_pending);
        Ok((state.form.clone(), state.unregistered.clone(), commit))
    }

    fn write_value(&self, key: &FieldKey, value: FieldValue) -> FormResult<()> {
        trace!(field = %key, ?value, "writing field value");
        self.transition("writing field value", |state| FormState {
            data: state.form.data.with_value(key.clone(), value),
            ..state.form.as_ref().clone()
        })?;
        Ok(())
    }

    pub(super) fn ordering(&self) -> FormResult<ValidationOrdering> {
        Ok(read_lock(&self.config, "reading validation ordering")?.validation_ordering)
    }

    /// Replaces the form record with the one computed by `update`. Listeners
    /// are told about the new record only if it differs from the old one.
    pub(super) fn transition<F>(
        &self,
        context: &'static str,
        update: F,
    ) -> FormResult<FormSnapshot<H>>
    where
        F: FnOnce(&mut ControllerState<H>) -> FormState<H>,
    {
        let (snapshot, changed) = {
            let mut state = write_lock(&self.state, context)?;
            let next = update(&mut *state);
            if next == *state.form {
                (state.form.clone(), false)
            } else {
                state.form = Arc::new(next);
                (state.form.clone(), true)
            }
        };

        if changed {
            self.notify(&snapshot)?;
        }
        Ok(snapshot)
    }

    fn notify(&self, snapshot: &FormSnapshot<H>) -> FormResult<()> {
        let listeners = read_lock(&self.listeners, "reading listeners")?
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(snapshot);
        }
        Ok(())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
