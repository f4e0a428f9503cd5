use super::binding::ChangeMapper;
use super::value::{FieldKey, FieldValue, FieldValues};

/// Input type of a field node, as far as the form cares about it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FieldKind {
    #[default]
    Input,
    Checkbox,
}

impl FieldKind {
    /// Maps a host `type` attribute onto a kind; anything but exactly
    /// `checkbox` is an input.
    pub fn from_type_attr(value: &str) -> Self {
        if value == "checkbox" {
            FieldKind::Checkbox
        } else {
            FieldKind::Input
        }
    }

    pub fn default_value(self) -> FieldValue {
        match self {
            FieldKind::Checkbox => FieldValue::Bool(false),
            FieldKind::Input => FieldValue::Text(String::new()),
        }
    }
}

/// What a field-bearing node declares about itself during a visit.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: FieldKey,
    pub kind: FieldKind,
    pub on_change: Option<ChangeMapper>,
    /// Whether the node can consume the `field` status props.
    pub composite: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<FieldKey>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Input,
            on_change: None,
            composite: false,
        }
    }

    pub fn checkbox(name: impl Into<FieldKey>) -> Self {
        Self::new(name).kind(FieldKind::Checkbox)
    }

    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn on_change(mut self, mapper: ChangeMapper) -> Self {
        self.on_change = Some(mapper);
        self
    }

    pub fn composite(mut self, composite: bool) -> Self {
        self.composite = composite;
        self
    }
}

/// Computes the defaults for every visited field that `data` does not know yet.
///
/// Keys already present in `data` are never reported. The first descriptor
/// wins when a name is declared twice in one visit.
pub fn collect_unregistered<'a>(
    descriptors: impl IntoIterator<Item = &'a FieldDescriptor>,
    data: &FieldValues,
) -> FieldValues {
    let mut unregistered = FieldValues::new();
    for descriptor in descriptors {
        let name = descriptor.name.as_str();
        if data.contains(name) || unregistered.contains(name) {
            continue;
        }
        unregistered.insert(descriptor.name.clone(), descriptor.kind.default_value());
    }
    unregistered
}
