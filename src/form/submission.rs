use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::controller::{
    FormController, FormResult, FormSnapshot, FormState, read_lock, write_lock,
};
use super::validation::{FieldValidation, ValidationHints, ValidationOrdering};
use super::value::{FieldKey, FieldValues, FormModel};

/// Where the form stands in its submission lifecycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting,
    Success,
    Failed,
}

impl SubmitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitStatus::Idle => "",
            SubmitStatus::Submitting => "submitting",
            SubmitStatus::Success => "success",
            SubmitStatus::Failed => "failed",
        }
    }
}

pub(super) type SubmitHandler<H> = Arc<dyn Fn(FormSnapshot<H>, FormActions<H>) + Send + Sync>;

/// Status transitions handed to the submit handler and to data receivers.
///
/// The terminal actions reset the form: `data` becomes `reset_values` laid
/// over the current unregistered defaults, and validations are cleared.
pub struct FormActions<H>
where
    H: ValidationHints,
{
    controller: FormController<H>,
}

impl<H> Clone for FormActions<H>
where
    H: ValidationHints,
{
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

impl<H> FormActions<H>
where
    H: ValidationHints,
{
    pub(super) fn new(controller: FormController<H>) -> Self {
        Self { controller }
    }

    pub fn set_submitting(&self, message: impl Into<String>) -> FormResult<()> {
        let message = message.into();
        debug!(status = "submitting", %message, "submit status changed");
        self.controller
            .transition("setting submitting status", |state| FormState {
                status: SubmitStatus::Submitting,
                status_message: message,
                ..state.form.as_ref().clone()
            })?;
        Ok(())
    }

    pub fn set_done(
        &self,
        message: impl Into<String>,
        reset_values: Option<FieldValues>,
    ) -> FormResult<()> {
        self.finish(SubmitStatus::Idle, message.into(), reset_values)
    }

    pub fn set_success(
        &self,
        message: impl Into<String>,
        reset_values: Option<FieldValues>,
    ) -> FormResult<()> {
        self.finish(SubmitStatus::Success, message.into(), reset_values)
    }

    pub fn set_failed(
        &self,
        message: impl Into<String>,
        reset_values: Option<FieldValues>,
    ) -> FormResult<()> {
        self.finish(SubmitStatus::Failed, message.into(), reset_values)
    }

    /// [`FormActions::set_success`] that keeps a typed model as the new data.
    pub fn set_success_with<M: FormModel>(
        &self,
        message: impl Into<String>,
        model: &M,
    ) -> FormResult<()> {
        self.set_success(message, Some(model.to_values()))
    }

    fn finish(
        &self,
        status: SubmitStatus,
        message: String,
        reset_values: Option<FieldValues>,
    ) -> FormResult<()> {
        debug!(status = status.as_str(), %message, "submit status changed");
        let values = reset_values.unwrap_or_default();
        self.controller
            .transition("finishing submission", |state| {
                state.invalidate_tickets();
                FormState {
                    status,
                    status_message: message,
                    field_errors: 0,
                    data: values.merged_over(&state.unregistered),
                    validations: Default::default(),
                }
            })?;
        Ok(())
    }
}

impl<H> FormController<H>
where
    H: ValidationHints,
{
    /// Starts a submit cycle through the configured spawner.
    pub fn submit(&self) {
        let controller = self.clone();
        self.spawner.spawn(Box::pin(async move {
            if let Err(error) = controller.submit_async().await {
                warn!(%error, "submit cycle aborted");
            }
        }));
    }

    /// Runs submit-time validation (when enabled), then hands the resulting
    /// state to the submit handler. The handler is called whether or not
    /// any field came back invalid.
    pub async fn submit_async(&self) -> FormResult<()> {
        let validate_on_submit =
            read_lock(&self.config, "reading submit options")?.validate_on_submit;
        if validate_on_submit {
            let field_errors = self.validate_all().await?;
            debug!(field_errors, "submit validation settled");
        }

        let snapshot = self.snapshot()?;
        debug!(fields = snapshot.data.len(), "invoking submit handler");
        (self.on_submit)(snapshot, self.actions());
        Ok(())
    }

    /// Validates every field in `data` that has a validator, waits for all of
    /// them, and records each result. Returns the number of invalid fields.
    ///
    /// Each field takes its validation ticket when the cycle starts, so under
    /// [`ValidationOrdering::LatestIssued`] an edit made while the cycle runs
    /// outranks the submit-time result, which is then neither recorded nor
    /// counted.
    pub async fn validate_all(&self) -> FormResult<usize> {
        let pending = {
            let config = read_lock(&self.config, "collecting submit validators")?;
            let mut state = write_lock(&self.state, "issuing submit validation tickets")?;
            let fields = state
                .form
                .data
                .iter()
                .filter_map(|(key, value)| {
                    config
                        .validations
                        .get(key.as_str())
                        .map(|validator| (key.clone(), value.clone(), validator.clone()))
                })
                .collect::<Vec<_>>();
            fields
                .into_iter()
                .map(|(key, value, validator)| {
                    let ticket = state.next_ticket(&key);
                    (key, ticket, value, validator)
                })
                .collect::<Vec<_>>()
        };
        debug!(validators = pending.len(), "running submit validation");

        let results = join_all(pending.into_iter().map(|(key, ticket, value, validator)| {
            let validation = validator.run(value);
            async move { (key, ticket, validation.await) }
        }))
        .await;
        let ordering = self.ordering()?;

        let mut field_errors = 0;
        self.transition("applying submit validation", |state| {
            let mut validations = state.form.validations.clone();
            for (key, ticket, result) in results {
                let latest = state.tickets.get(&key).copied();
                if ordering == ValidationOrdering::LatestIssued && latest != Some(ticket) {
                    debug!(field = %key, ticket = ticket.0, "dropping stale submit validation");
                    continue;
                }
                if !result.valid {
                    field_errors += 1;
                }
                validations.insert(key, FieldValidation::from(result));
            }
            FormState {
                field_errors,
                validations,
                ..state.form.as_ref().clone()
            }
        })?;
        Ok(field_errors)
    }

    pub fn field_errors(&self) -> FormResult<usize> {
        Ok(self.snapshot()?.field_errors)
    }

    pub fn invalid_fields(&self) -> FormResult<Vec<FieldKey>> {
        Ok(self
            .snapshot()?
            .validations
            .iter()
            .filter(|(_, validation)| validation.valid == Some(false))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
