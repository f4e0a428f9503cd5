pub mod form;
pub mod prelude;
pub mod runtime;

pub use form::{FormConfig, FormController};
