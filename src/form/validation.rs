use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tracing::{debug, trace};

use super::controller::{FormController, FormResult, FormState, read_lock, write_lock};
use super::value::{FieldKey, FieldValue};

/// Payload a validator attaches to its verdict, e.g. an error message.
pub trait ValidationHints: Clone + Debug + PartialEq + Send + Sync + 'static {}

impl<T> ValidationHints for T where T: Clone + Debug + PartialEq + Send + Sync + 'static {}

/// The `(valid, hints)` pair every validator produces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationResult<H> {
    pub valid: bool,
    pub hints: H,
}

impl<H> ValidationResult<H> {
    pub fn valid(hints: H) -> Self {
        Self { valid: true, hints }
    }

    pub fn invalid(hints: H) -> Self {
        Self {
            valid: false,
            hints,
        }
    }
}

impl<H> From<(bool, H)> for ValidationResult<H> {
    fn from((valid, hints): (bool, H)) -> Self {
        Self { valid, hints }
    }
}

/// Settled validator output. `Err` is the rejected path and carries a result
/// that is recorded exactly like an `Ok` one.
pub type ValidationOutcome<H> = Result<ValidationResult<H>, ValidationResult<H>>;

pub type BoxedValidationFuture<H> = BoxFuture<'static, ValidationOutcome<H>>;

type ValidatorFn<H> = Arc<dyn Fn(FieldValue) -> BoxedValidationFuture<H> + Send + Sync>;

/// A per-field validation function, sync or async.
pub struct Validator<H> {
    inner: ValidatorFn<H>,
}

impl<H> Clone for Validator<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H> Debug for Validator<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validator({:p})", Arc::as_ptr(&self.inner))
    }
}

impl<H> Validator<H>
where
    H: Send + 'static,
{
    pub fn sync<F, R>(validate: F) -> Self
    where
        F: Fn(&FieldValue) -> R + Send + Sync + 'static,
        R: Into<ValidationResult<H>>,
    {
        Self {
            inner: Arc::new(move |value: FieldValue| -> BoxedValidationFuture<H> {
                future::ready(Ok(validate(&value).into())).boxed()
            }),
        }
    }

    pub fn future<F, Fut>(validate: F) -> Self
    where
        F: Fn(FieldValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ValidationOutcome<H>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |value: FieldValue| -> BoxedValidationFuture<H> {
                validate(value).boxed()
            }),
        }
    }

    /// Runs the validator and folds both settlement paths into one result.
    pub fn run(&self, value: FieldValue) -> BoxFuture<'static, ValidationResult<H>> {
        (self.inner)(value)
            .map(|outcome| match outcome {
                Ok(result) | Err(result) => result,
            })
            .boxed()
    }
}

impl<H> Validator<H> {
    /// Whether both handles point at the same validator instance.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Validators keyed by field name.
pub struct ValidatorMap<H>(BTreeMap<FieldKey, Validator<H>>);

impl<H> Clone for ValidatorMap<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<H> Default for ValidatorMap<H> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<H> Debug for ValidatorMap<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<H> ValidatorMap<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<FieldKey>, validator: Validator<H>) {
        self.0.insert(name.into(), validator);
    }

    pub fn with(mut self, name: impl Into<FieldKey>, validator: Validator<H>) -> Self {
        self.insert(name, validator);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Validator<H>> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same field names, each bound to the same validator instance.
    pub fn same_as(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().all(|(key, validator)| {
                other
                    .0
                    .get(key)
                    .is_some_and(|candidate| candidate.same_as(validator))
            })
    }
}

/// How overlapping validations of one field are reconciled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ValidationOrdering {
    /// Every result is written; the one that settles last wins.
    #[default]
    LastResolved,
    /// Only the most recently issued validation of a field may write.
    LatestIssued,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

/// Display state derived from a field's `valid` flag.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ValidationStatus {
    #[default]
    Unvalidated,
    Success,
    Error,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Unvalidated => "",
            ValidationStatus::Success => "success",
            ValidationStatus::Error => "error",
        }
    }
}

impl From<Option<bool>> for ValidationStatus {
    fn from(valid: Option<bool>) -> Self {
        match valid {
            None => ValidationStatus::Unvalidated,
            Some(true) => ValidationStatus::Success,
            Some(false) => ValidationStatus::Error,
        }
    }
}

/// Validation record kept per field. `valid == None` means not validated yet.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValidation<H> {
    pub valid: Option<bool>,
    pub hints: Option<H>,
}

impl<H> Default for FieldValidation<H> {
    fn default() -> Self {
        Self {
            valid: None,
            hints: None,
        }
    }
}

impl<H> FieldValidation<H> {
    pub fn status(&self) -> ValidationStatus {
        self.valid.into()
    }
}

impl<H> From<ValidationResult<H>> for FieldValidation<H> {
    fn from(result: ValidationResult<H>) -> Self {
        Self {
            valid: Some(result.valid),
            hints: Some(result.hints),
        }
    }
}

impl<H> FormController<H>
where
    H: ValidationHints,
{
    /// Validates the committed value of `name` and waits for the result.
    pub async fn validate_field(&self, name: impl Into<FieldKey>) -> FormResult<()> {
        let key = name.into();
        let value = self
            .snapshot()?
            .data
            .get(key.as_str())
            .cloned()
            .unwrap_or_default();
        self.run_field_validation(key, value).await
    }

    pub fn requires_validation(&self, name: &str) -> FormResult<bool> {
        Ok(read_lock(&self.config, "checking validator registration")?
            .validations
            .contains(name))
    }

    pub(super) async fn run_field_validation(
        &self,
        key: FieldKey,
        value: FieldValue,
    ) -> FormResult<()> {
        let Some((validator, ticket)) = self.begin_validation(&key)? else {
            trace!(field = %key, "no validator registered");
            return Ok(());
        };

        let result = validator.run(value).await;
        self.finish_validation(key, ticket, result)
    }

    pub(super) fn begin_validation(
        &self,
        key: &FieldKey,
    ) -> FormResult<Option<(Validator<H>, ValidationTicket)>> {
        let validator = read_lock(&self.config, "looking up field validator")?
            .validations
            .get(key.as_str())
            .cloned();
        let Some(validator) = validator else {
            return Ok(None);
        };
        let ticket = write_lock(&self.state, "issuing validation ticket")?.next_ticket(key);
        Ok(Some((validator, ticket)))
    }

    pub(super) fn finish_validation(
        &self,
        key: FieldKey,
        ticket: ValidationTicket,
        result: ValidationResult<H>,
    ) -> FormResult<()> {
        let ordering = self.ordering()?;
        trace!(field = %key, valid = result.valid, ticket = ticket.0, "field validation settled");
        self.transition("finishing field validation", |state| {
            let latest = state.tickets.get(&key).copied();
            if ordering == ValidationOrdering::LatestIssued && latest != Some(ticket) {
                debug!(field = %key, ticket = ticket.0, "dropping stale validation result");
                return state.form.as_ref().clone();
            }
            let mut validations = state.form.validations.clone();
            validations.insert(key, result.into());
            FormState {
                validations,
                ..state.form.as_ref().clone()
            }
        })?;
        Ok(())
    }
}
