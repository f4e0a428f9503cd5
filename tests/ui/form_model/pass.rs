use calmform::form::{FieldValue, FieldValues, FormModel};

#[derive(Clone, Debug, PartialEq, calmform::form::FormModel)]
struct DemoForm {
    email: String,
    agree: bool,
    nickname: Option<String>,
}

fn main() {
    let model = DemoForm {
        email: "a@calm.ui".to_string(),
        agree: true,
        nickname: None,
    };
    let values = model.to_values();
    assert_eq!(values.get("email"), Some(&FieldValue::from("a@calm.ui")));
    assert_eq!(values.get("agree"), Some(&FieldValue::Bool(true)));
    assert_eq!(values.get("nickname"), Some(&FieldValue::Null));

    let edited = values.with("email", "b@calm.ui");
    let decoded = DemoForm::from_values(&edited).expect("decodes");
    assert_eq!(decoded.email, "b@calm.ui");
    assert!(DemoForm::from_values(&FieldValues::new()).is_err());
}
