mod binding;
mod controller;
mod registry;
mod submission;
mod validation;
mod value;


pub use binding::{
    ChangeEvent, ChangeHandler, ChangeMapper, FieldProps, FieldStatus, FormElement, FormNode,
    Injected, ReceiverProps, RenderedNode,
};
pub use calmform_derive::FormModel;
pub use controller::{
    FormConfig, FormController, FormError, FormResult, FormSnapshot, FormState, SubscriptionId,
};
pub use registry::{FieldDescriptor, FieldKind, collect_unregistered};
pub use submission::{FormActions, SubmitStatus};
pub use validation::{
    BoxedValidationFuture, FieldValidation, ValidationHints, ValidationOrdering,
    ValidationOutcome, ValidationResult, ValidationStatus, ValidationTicket, Validator,
    ValidatorMap,
};
pub use value::{FieldKey, FieldValue, FieldValues, FormModel, FromFieldValue, value_of};
