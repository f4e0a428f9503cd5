use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::controller::{FormController, FormResult, FormSnapshot, read_lock};
use super::registry::{FieldDescriptor, FieldKind};
use super::submission::FormActions;
use super::validation::{ValidationHints, ValidationStatus};
use super::value::{FieldKey, FieldValue, FieldValues, value_of};

/// Raw change signal emitted by an input.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    Input(FieldValue),
    Toggle(bool),
}

impl ChangeEvent {
    pub fn into_value(self) -> FieldValue {
        match self {
            ChangeEvent::Input(value) => value,
            ChangeEvent::Toggle(checked) => FieldValue::Bool(checked),
        }
    }
}

/// A field's own change callback; its return value is what gets stored.
#[derive(Clone)]
pub struct ChangeMapper(Arc<dyn Fn(ChangeEvent) -> FieldValue + Send + Sync>);

impl ChangeMapper {
    pub fn new(map: impl Fn(ChangeEvent) -> FieldValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(map))
    }

    pub fn map(&self, event: ChangeEvent) -> FieldValue {
        (self.0)(event)
    }
}

impl Debug for ChangeMapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChangeMapper")
    }
}

/// A host tree node as seen by the form.
pub trait FormElement {
    /// The field this node binds to, if it is a field node.
    fn field_binding(&self) -> Option<FieldDescriptor>;

    /// Whether the node receives the whole form state and its actions.
    fn wants_form_data(&self) -> bool {
        false
    }

    /// Nested nodes; only visited for nodes that are neither fields nor receivers.
    fn children(&self) -> &[Self]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Ready-made element tree for hosts without their own node type.
#[derive(Clone, Debug)]
pub enum FormNode {
    Field(FieldDescriptor),
    Receiver(String),
    Plain(String),
    Group(Vec<FormNode>),
}

impl FormElement for FormNode {
    fn field_binding(&self) -> Option<FieldDescriptor> {
        match self {
            FormNode::Field(descriptor) => Some(descriptor.clone()),
            _ => None,
        }
    }

    fn wants_form_data(&self) -> bool {
        matches!(self, FormNode::Receiver(_))
    }

    fn children(&self) -> &[Self] {
        match self {
            FormNode::Group(children) => children,
            _ => &[],
        }
    }
}

/// Emits edits for one field into its form.
pub struct ChangeHandler<H>
where
    H: ValidationHints,
{
    controller: FormController<H>,
    name: FieldKey,
    mapper: Option<ChangeMapper>,
}

impl<H> Clone for ChangeHandler<H>
where
    H: ValidationHints,
{
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            name: self.name.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

impl<H> ChangeHandler<H>
where
    H: ValidationHints,
{
    pub fn name(&self) -> &FieldKey {
        &self.name
    }

    pub fn emit(&self, event: ChangeEvent) -> FormResult<()> {
        self.controller.change(self.name.clone(), self.value_for(event))
    }

    pub async fn emit_async(&self, event: ChangeEvent) -> FormResult<()> {
        self.controller
            .change_async(self.name.clone(), self.value_for(event))
            .await
    }

    fn value_for(&self, event: ChangeEvent) -> FieldValue {
        match &self.mapper {
            Some(mapper) => mapper.map(event),
            None => event.into_value(),
        }
    }
}

/// Validation state exposed to composite field nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldStatus<H> {
    pub requires_validation: bool,
    pub valid: Option<bool>,
    pub hints: Option<H>,
    pub status: ValidationStatus,
}

pub struct FieldProps<H>
where
    H: ValidationHints,
{
    pub value: FieldValue,
    /// Set for checkbox fields only.
    pub checked: Option<bool>,
    pub on_change: ChangeHandler<H>,
    pub field: Option<FieldStatus<H>>,
}

pub struct ReceiverProps<H>
where
    H: ValidationHints,
{
    pub form: FormSnapshot<H>,
    pub actions: FormActions<H>,
}

pub enum Injected<H>
where
    H: ValidationHints,
{
    None,
    Field(FieldProps<H>),
    Receiver(ReceiverProps<H>),
}

/// A host node paired with the props the form injects into it.
pub struct RenderedNode<'a, E, H>
where
    H: ValidationHints,
{
    pub element: &'a E,
    pub injected: Injected<H>,
    pub children: Vec<RenderedNode<'a, E, H>>,
}

impl<E, H> RenderedNode<'_, E, H>
where
    H: ValidationHints,
{
    pub fn field_props(&self) -> Option<&FieldProps<H>> {
        match &self.injected {
            Injected::Field(props) => Some(props),
            _ => None,
        }
    }

    pub fn receiver_props(&self) -> Option<&ReceiverProps<H>> {
        match &self.injected {
            Injected::Receiver(props) => Some(props),
            _ => None,
        }
    }
}

struct RenderContext<'s, H>
where
    H: ValidationHints,
{
    snapshot: &'s FormSnapshot<H>,
    unregistered: &'s FieldValues,
    validated: &'s [FieldKey],
}

impl<H> FormController<H>
where
    H: ValidationHints,
{
    /// Visits `elements`, rebuilding the unregistered-field buffer, and
    /// returns the tree with props injected into every field and receiver.
    /// A commit left pending by a reset happens before any props are built.
    pub fn render<'a, E>(&self, elements: &'a [E]) -> FormResult<Vec<RenderedNode<'a, E, H>>>
    where
        E: FormElement,
    {
        let mut descriptors = Vec::new();
        collect_descriptors(elements, &mut descriptors);

        let (mut snapshot, mut unregistered, commit) = self.rebuild_unregistered(descriptors)?;
        if commit {
            snapshot = self.commit_unregistered()?;
            unregistered = FieldValues::new();
        }
        let validated = read_lock(&self.config, "reading validators for render")?
            .validations
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        let context = RenderContext {
            snapshot: &snapshot,
            unregistered: &unregistered,
            validated: &validated,
        };
        Ok(elements
            .iter()
            .map(|element| self.render_element(element, &context))
            .collect())
    }

    fn render_element<'a, E>(
        &self,
        element: &'a E,
        context: &RenderContext<'_, H>,
    ) -> RenderedNode<'a, E, H>
    where
        E: FormElement,
    {
        if let Some(descriptor) = element.field_binding() {
            return RenderedNode {
                element,
                injected: Injected::Field(self.field_props(descriptor, context)),
                children: Vec::new(),
            };
        }

        if element.wants_form_data() {
            return RenderedNode {
                element,
                injected: Injected::Receiver(ReceiverProps {
                    form: context.snapshot.clone(),
                    actions: self.actions(),
                }),
                children: Vec::new(),
            };
        }

        RenderedNode {
            element,
            injected: Injected::None,
            children: element
                .children()
                .iter()
                .map(|child| self.render_element(child, context))
                .collect(),
        }
    }

    fn field_props(
        &self,
        descriptor: FieldDescriptor,
        context: &RenderContext<'_, H>,
    ) -> FieldProps<H> {
        let name = descriptor.name.as_str();
        let value = value_of(&context.snapshot.data, context.unregistered, name);
        let checked = match descriptor.kind {
            FieldKind::Checkbox => value.as_bool(),
            FieldKind::Input => None,
        };

        let field = descriptor.composite.then(|| {
            let record = context.snapshot.validation(name).cloned().unwrap_or_default();
            FieldStatus {
                requires_validation: context.validated.iter().any(|key| key.as_str() == name),
                status: record.status(),
                valid: record.valid,
                hints: record.hints,
            }
        });

        FieldProps {
            value,
            checked,
            on_change: ChangeHandler {
                controller: self.clone(),
                name: descriptor.name,
                mapper: descriptor.on_change,
            },
            field,
        }
    }
}

fn collect_descriptors<E>(elements: &[E], descriptors: &mut Vec<FieldDescriptor>)
where
    E: FormElement,
{
    for element in elements {
        if let Some(descriptor) = element.field_binding() {
            descriptors.push(descriptor);
        } else if !element.wants_form_data() {
            collect_descriptors(element.children(), descriptors);
        }
    }
}
