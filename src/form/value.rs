use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::controller::{FormError, FormResult};

/// Name of a form field as declared by a field-bearing node.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(Arc<str>);

impl FieldKey {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&FieldKey> for FieldKey {
    fn from(value: &FieldKey) -> Self {
        value.clone()
    }
}

/// Current value of a single field.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    /// No such field yet.
    #[default]
    Null,
    Text(String),
    Bool(bool),
    Number(Decimal),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(text) => Decimal::from_str(text.trim()).ok(),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Conversion from a stored [`FieldValue`] back into a typed value.
pub trait FromFieldValue: Sized {
    const EXPECTED: &'static str;

    fn from_field_value(value: &FieldValue) -> Option<Self>;

    /// Value used when the field is absent from the record.
    fn missing() -> Option<Self> {
        None
    }
}

impl FromFieldValue for FieldValue {
    const EXPECTED: &'static str = "any value";

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        Some(value.clone())
    }

    fn missing() -> Option<Self> {
        Some(FieldValue::Null)
    }
}

impl FromFieldValue for String {
    const EXPECTED: &'static str = "text";

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromFieldValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromFieldValue for Decimal {
    const EXPECTED: &'static str = "number";

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_decimal()
    }
}

impl FromFieldValue for Vec<String> {
    const EXPECTED: &'static str = "list";

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl<T> FromFieldValue for Option<T>
where
    T: FromFieldValue,
{
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => T::from_field_value(other).map(Some),
        }
    }

    fn missing() -> Option<Self> {
        Some(None)
    }
}

/// The `data` record: field name to current value.
///
/// Writes through [`FieldValues::with_value`] and [`FieldValues::merged_over`]
/// build a new record and leave the receiver untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldValues(BTreeMap<FieldKey, FieldValue>);

impl FieldValues {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, FieldKey, FieldValue> {
        self.0.iter()
    }

    pub fn insert(&mut self, name: impl Into<FieldKey>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<FieldKey>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns a copy of this record with `name` set to `value`.
    pub fn with_value(&self, name: impl Into<FieldKey>, value: FieldValue) -> Self {
        let mut next = self.clone();
        next.0.insert(name.into(), value);
        next
    }

    /// Returns `base` overlaid with every entry of `self`; `self` wins on
    /// conflicting keys.
    pub fn merged_over(&self, base: &FieldValues) -> Self {
        let mut merged = base.clone();
        merged
            .0
            .extend(self.0.iter().map(|(key, value)| (key.clone(), value.clone())));
        merged
    }

    pub fn decode<T>(&self, name: &str) -> FormResult<T>
    where
        T: FromFieldValue,
    {
        match self.0.get(name) {
            Some(value) => T::from_field_value(value).ok_or_else(|| FormError::FieldType {
                field: name.to_string(),
                expected: T::EXPECTED,
            }),
            None => T::missing().ok_or_else(|| FormError::MissingField(name.to_string())),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for FieldValues
where
    K: Into<FieldKey>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a FieldValues {
    type Item = (&'a FieldKey, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, FieldKey, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Resolves the value a field node should display: the committed value, else
/// the default from the current unregistered snapshot, else [`FieldValue::Null`].
pub fn value_of(data: &FieldValues, unregistered: &FieldValues, name: &str) -> FieldValue {
    data.get(name)
        .or_else(|| unregistered.get(name))
        .cloned()
        .unwrap_or_default()
}

/// Typed view of a form's `data` record.
pub trait FormModel: Sized {
    fn to_values(&self) -> FieldValues;
    fn from_values(values: &FieldValues) -> FormResult<Self>;
}
