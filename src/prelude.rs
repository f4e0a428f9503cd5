pub use crate::form::{
    ChangeEvent, FieldDescriptor, FieldKey, FieldKind, FieldValue, FieldValues, FormActions,
    FormConfig, FormController, FormElement, FormModel, FormNode, FormResult, FormSnapshot,
    SubmitStatus, ValidationOrdering, ValidationResult, Validator, ValidatorMap,
};
pub use crate::runtime::{InlineSpawner, TaskQueue, TaskSpawner};
