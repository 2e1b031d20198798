/*
 * view.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The data model templates are rendered against.
//!
//! A [`View`] is a closed, dynamically typed value: scalars, ordered lists,
//! string-keyed maps, objects exposing named accessors and properties, and
//! callables. Lists and maps are distinct variants, so the renderer never has
//! to guess whether a container should be iterated or entered.
//!
//! The renderer only ever reads views.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::MustacheResult;

/// Callback handed to higher-order sections: renders a template fragment
/// against the section's view.
pub type RenderFn<'a> = dyn Fn(&str) -> MustacheResult<String> + 'a;

type ValueFn = dyn Fn() -> View + Send + Sync;
type SectionFn = dyn Fn(&str, &RenderFn<'_>) -> MustacheResult<String> + Send + Sync;

/// A value that can be used in template rendering.
#[derive(Clone, Default)]
pub enum View {
    /// Absent value.
    #[default]
    Null,

    /// A boolean value.
    Bool(bool),

    /// An integer value.
    Int(i64),

    /// A floating point value.
    Float(f64),

    /// A string value.
    String(String),

    /// An ordered list; sections iterate over it.
    List(Vec<View>),

    /// A map of string keys to values; sections enter it as a nested view.
    Map(HashMap<String, View>),

    /// An object with named accessors and properties.
    Object(Arc<dyn ViewObject>),

    /// A callable value.
    Lambda(Lambda),
}

/// An object-like view exposing zero-argument accessors and properties.
///
/// Lookup prefers [`ViewObject::call`] over [`ViewObject::property`].
/// Property values are returned as-is, so a callable stored in a property is
/// not invoked by lookup (a section can still use it as a higher-order
/// section).
pub trait ViewObject: fmt::Debug + Send + Sync {
    /// Invoke the zero-argument accessor `name`, if the object has one.
    fn call(&self, name: &str) -> Option<View> {
        let _ = name;
        None
    }

    /// Read the property `name`, if the object has one.
    fn property(&self, name: &str) -> Option<View>;

    /// Text to output when the object itself is rendered as a variable.
    fn to_text(&self) -> Option<String> {
        None
    }

    /// Support downcasting to the concrete object type.
    fn as_any(&self) -> &dyn Any;
}

/// A callable view value.
#[derive(Clone)]
pub enum Lambda {
    /// A zero-argument callable. Invoked when looked up from a map; the
    /// result is used in its place.
    Value(Arc<ValueFn>),

    /// A higher-order section. Receives the raw section source and a render
    /// callback; its return value replaces the section.
    Section(Arc<SectionFn>),
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lambda::Value(_) => f.write_str("Lambda::Value(..)"),
            Lambda::Section(_) => f.write_str("Lambda::Section(..)"),
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Null => f.write_str("Null"),
            View::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            View::Int(i) => f.debug_tuple("Int").field(i).finish(),
            View::Float(x) => f.debug_tuple("Float").field(x).finish(),
            View::String(s) => f.debug_tuple("String").field(s).finish(),
            View::List(items) => f.debug_tuple("List").field(items).finish(),
            View::Map(map) => f.debug_tuple("Map").field(map).finish(),
            View::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
            View::Lambda(lambda) => lambda.fmt(f),
        }
    }
}

impl View {
    /// Build a map view from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> View
    where
        K: Into<String>,
        V: Into<View>,
    {
        View::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list view.
    pub fn list<V: Into<View>>(items: impl IntoIterator<Item = V>) -> View {
        View::List(items.into_iter().map(Into::into).collect())
    }

    /// Wrap an object.
    pub fn object(object: impl ViewObject + 'static) -> View {
        View::Object(Arc::new(object))
    }

    /// Wrap a zero-argument callable.
    pub fn value_fn(f: impl Fn() -> View + Send + Sync + 'static) -> View {
        View::Lambda(Lambda::Value(Arc::new(f)))
    }

    /// Wrap a higher-order section callable.
    pub fn section_fn(
        f: impl Fn(&str, &RenderFn<'_>) -> MustacheResult<String> + Send + Sync + 'static,
    ) -> View {
        View::Lambda(Lambda::Section(Arc::new(f)))
    }

    /// Whether this is a scalar (bool, number, or string).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            View::Bool(_) | View::Int(_) | View::Float(_) | View::String(_)
        )
    }

    /// Whether a section over this value renders.
    ///
    /// Falsy: null, `false`, zero, the empty string, the empty list and the
    /// empty map. Objects and callables are always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            View::Null => false,
            View::Bool(b) => *b,
            View::Int(i) => *i != 0,
            View::Float(x) => *x != 0.0,
            View::String(s) => !s.is_empty(),
            View::List(items) => !items.is_empty(),
            View::Map(map) => !map.is_empty(),
            View::Object(_) | View::Lambda(_) => true,
        }
    }

    /// Render this value as text.
    ///
    /// - String: as-is
    /// - Int/Float: decimal representation
    /// - Bool: "true", or "" for false
    /// - Object: its [`ViewObject::to_text`], or ""
    /// - everything else: ""
    pub fn to_text(&self) -> String {
        match self {
            View::String(s) => s.clone(),
            View::Int(i) => i.to_string(),
            View::Float(x) => x.to_string(),
            View::Bool(true) => "true".to_string(),
            View::Object(obj) => obj.to_text().unwrap_or_default(),
            View::Bool(false) | View::Null | View::List(_) | View::Map(_) | View::Lambda(_) => {
                String::new()
            }
        }
    }

    /// Look up `key` in this view.
    ///
    /// - A scalar view yields null, except for the key `.`, which yields the
    ///   scalar itself (iteration over lists of scalars).
    /// - A key with a dot after its first character is a path: the head is
    ///   resolved here and the tail against the result; a scalar head ends
    ///   the path.
    /// - Objects try the accessor, then the property.
    /// - Maps return the entry, invoking a [`Lambda::Value`] entry and using
    ///   its result. Other callables are returned uninvoked.
    /// - Lists accept numeric keys.
    /// - Anything missing is null.
    pub fn lookup(&self, key: &str) -> Cow<'_, View> {
        if self.is_scalar() {
            return if key == "." {
                Cow::Borrowed(self)
            } else {
                Cow::Owned(View::Null)
            };
        }

        if let Some((head, tail)) = split_path(key) {
            return match self.lookup(head) {
                Cow::Borrowed(value) => {
                    if value.is_scalar() {
                        Cow::Owned(View::Null)
                    } else {
                        value.lookup(tail)
                    }
                }
                Cow::Owned(value) => {
                    if value.is_scalar() {
                        Cow::Owned(View::Null)
                    } else {
                        Cow::Owned(value.lookup(tail).into_owned())
                    }
                }
            };
        }

        match self {
            View::Object(obj) => Cow::Owned(
                obj.call(key)
                    .or_else(|| obj.property(key))
                    .unwrap_or_default(),
            ),
            View::Map(map) => match map.get(key) {
                Some(View::Lambda(Lambda::Value(f))) => Cow::Owned(f()),
                Some(value) => Cow::Borrowed(value),
                None => Cow::Owned(View::Null),
            },
            View::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .map_or(Cow::Owned(View::Null), Cow::Borrowed),
            _ => Cow::Owned(View::Null),
        }
    }

    /// Look up `key` directly: map entry or object property only, with no
    /// path splitting and no callable invocation.
    pub fn get_raw(&self, key: &str) -> Option<Cow<'_, View>> {
        match self {
            View::Map(map) => map.get(key).map(Cow::Borrowed),
            View::Object(obj) => obj.property(key).map(Cow::Owned),
            _ => None,
        }
    }
}

/// Split `a.b.c` into `("a", "b.c")`. A leading dot does not split.
fn split_path(key: &str) -> Option<(&str, &str)> {
    match key.find('.') {
        Some(pos) if pos > 0 => Some((&key[..pos], &key[pos + 1..])),
        _ => None,
    }
}

impl From<&str> for View {
    fn from(s: &str) -> Self {
        View::String(s.to_string())
    }
}

impl From<String> for View {
    fn from(s: String) -> Self {
        View::String(s)
    }
}

impl From<bool> for View {
    fn from(b: bool) -> Self {
        View::Bool(b)
    }
}

impl From<i64> for View {
    fn from(i: i64) -> Self {
        View::Int(i)
    }
}

impl From<i32> for View {
    fn from(i: i32) -> Self {
        View::Int(i64::from(i))
    }
}

impl From<f64> for View {
    fn from(x: f64) -> Self {
        View::Float(x)
    }
}

impl<T: Into<View>> From<Vec<T>> for View {
    fn from(items: Vec<T>) -> Self {
        View::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<View>> From<Option<T>> for View {
    fn from(value: Option<T>) -> Self {
        value.map_or(View::Null, Into::into)
    }
}

impl From<HashMap<String, View>> for View {
    fn from(map: HashMap<String, View>) -> Self {
        View::Map(map)
    }
}

impl From<serde_json::Value> for View {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => View::Null,
            serde_json::Value::Bool(b) => View::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => View::Int(i),
                None => View::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => View::String(s),
            serde_json::Value::Array(items) => {
                View::List(items.into_iter().map(View::from).collect())
            }
            serde_json::Value::Object(map) => {
                View::Map(map.into_iter().map(|(k, v)| (k, View::from(v))).collect())
            }
        }
    }
}

/// A general-purpose [`ViewObject`] built from named properties and
/// accessors.
#[derive(Default)]
pub struct Record {
    properties: HashMap<String, View>,
    methods: HashMap<String, Arc<ValueFn>>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<View>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Add a zero-argument accessor.
    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn() -> View + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Record")
            .field("properties", &self.properties)
            .field("methods", &methods)
            .finish()
    }
}

impl ViewObject for Record {
    fn call(&self, name: &str) -> Option<View> {
        self.methods.get(name).map(|f| f())
    }

    fn property(&self, name: &str) -> Option<View> {
        self.properties.get(name).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Record> for View {
    fn from(record: Record) -> Self {
        View::object(record)
    }
}
