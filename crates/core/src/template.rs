//! Prompt templates with typed variable bindings.
//!
//! A [`Template`] is a named pattern string whose `{placeholder}` (or
//! `{{placeholder}}`) slots are filled from a set of typed bindings. Templates
//! support single-parent inheritance via [`Template::extend`], merging via
//! [`Template::compose`], and sequential chaining via [`Template::chain`].
//! The ancestor chain is acyclic by construction: every `extend` mints a
//! fresh id, and resolution walks the chain iteratively rather than
//! recursively.

use crate::error::{Result, TutorError};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

/// Separator inserted between a parent's resolved text and the child's.
const INHERIT_SEPARATOR: &str = "\n\n";
/// Marker inserted between chained templates.
const SECTION_MARKER: &str = "\n\n---\n\n";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_.]+)\}\}|\{([A-Za-z0-9_.]+)\}").unwrap());

static NEXT_TEMPLATE_ID: AtomicU64 = AtomicU64::new(1);

fn fresh_id(base: &str) -> String {
    let n = NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed);
    format!("{base}#{n}")
}

/// A typed variable value. Every tag carries its own textual formatter so
/// substitution can never fall back to an opaque debug rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<TemplateValue>),
    Map(BTreeMap<String, TemplateValue>),
    Null,
}

impl TemplateValue {
    /// Renders the value to the text that gets substituted into a pattern.
    /// Lists join with newlines, maps render as `key: value` lines, and
    /// `Null` renders empty.
    pub fn render(&self) -> String {
        match self {
            TemplateValue::Text(s) => s.clone(),
            TemplateValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::List(items) => items
                .iter()
                .map(TemplateValue::render)
                .collect::<Vec<_>>()
                .join("\n"),
            TemplateValue::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.render()))
                .collect::<Vec<_>>()
                .join("\n"),
            TemplateValue::Null => String::new(),
        }
    }

    /// Converts a JSON value into a typed binding value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => TemplateValue::Null,
            Value::Bool(b) => TemplateValue::Bool(*b),
            Value::Number(n) => TemplateValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => TemplateValue::Text(s.clone()),
            Value::Array(items) => {
                TemplateValue::List(items.iter().map(TemplateValue::from_json).collect())
            }
            Value::Object(map) => TemplateValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), TemplateValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Text(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Text(s)
    }
}

impl From<f64> for TemplateValue {
    fn from(n: f64) -> Self {
        TemplateValue::Number(n)
    }
}

impl From<i64> for TemplateValue {
    fn from(n: i64) -> Self {
        TemplateValue::Number(n as f64)
    }
}

impl From<u32> for TemplateValue {
    fn from(n: u32) -> Self {
        TemplateValue::Number(n as f64)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<Vec<String>> for TemplateValue {
    fn from(items: Vec<String>) -> Self {
        TemplateValue::List(items.into_iter().map(TemplateValue::Text).collect())
    }
}

impl From<Vec<&str>> for TemplateValue {
    fn from(items: Vec<&str>) -> Self {
        TemplateValue::List(
            items
                .into_iter()
                .map(|s| TemplateValue::Text(s.to_string()))
                .collect(),
        )
    }
}

impl From<&Value> for TemplateValue {
    fn from(value: &Value) -> Self {
        TemplateValue::from_json(value)
    }
}

/// The full binding set a template resolves against.
pub type Bindings = BTreeMap<String, TemplateValue>;

/// A named check over the binding set, run before substitution.
#[derive(Clone)]
pub struct TemplateValidator {
    name: String,
    check: Arc<dyn Fn(&Bindings) -> std::result::Result<(), String> + Send + Sync>,
}

impl TemplateValidator {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&Bindings) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// A validator requiring that a binding exists and renders non-empty.
    pub fn require(key: impl Into<String>) -> Self {
        let key = key.into();
        let name = format!("require:{key}");
        Self::new(name, move |bindings| match bindings.get(&key) {
            Some(value) if !value.render().trim().is_empty() => Ok(()),
            Some(_) => Err(format!("binding '{key}' is empty")),
            None => Err(format!("binding '{key}' is missing")),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, bindings: &Bindings) -> std::result::Result<(), String> {
        (self.check)(bindings)
    }
}

impl fmt::Debug for TemplateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateValidator")
            .field("name", &self.name)
            .finish()
    }
}

/// The outcome of a successful resolution: the final text plus non-fatal
/// diagnostics for any placeholder that survived substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub text: String,
    pub diagnostics: Vec<String>,
}

/// An immutable pattern with a mutable binding set.
#[derive(Debug, Clone)]
pub struct Template {
    id: String,
    pattern: String,
    bindings: Bindings,
    parent: Option<Box<Template>>,
    validators: Vec<TemplateValidator>,
}

impl Template {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            bindings: Bindings::new(),
            parent: None,
            validators: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Binds one variable. Overwriting an existing key is allowed and silent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> &mut Self {
        self.bindings.insert(key.into(), value.into());
        self
    }

    /// Binds every entry of the map.
    pub fn set_many(&mut self, values: impl IntoIterator<Item = (String, TemplateValue)>) -> &mut Self {
        for (key, value) in values {
            self.bindings.insert(key, value);
        }
        self
    }

    /// Flattens a nested JSON structure into dotted keys before binding,
    /// e.g. `{"a": {"b": 1}}` binds `a.b = 1`.
    pub fn set_context(&mut self, context: &Value) -> &mut Self {
        let mut flat = Vec::new();
        flatten_value("", context, &mut flat);
        for (key, value) in flat {
            self.bindings.insert(key, value);
        }
        self
    }

    /// Attaches a validator that must pass before resolution substitutes
    /// anything.
    pub fn add_validator(&mut self, validator: TemplateValidator) -> &mut Self {
        self.validators.push(validator);
        self
    }

    /// Deep-independent copy of bindings and validators under a fresh id.
    pub fn duplicate(&self) -> Template {
        let mut copy = self.clone();
        copy.id = fresh_id(&self.id);
        copy
    }

    /// Returns a new template whose parent is `self`, inheriting the current
    /// bindings and validators. The child always receives a fresh id, which
    /// keeps the ancestor chain acyclic by construction.
    pub fn extend(&self, pattern: impl Into<String>) -> Template {
        Template {
            id: fresh_id(&self.id),
            pattern: pattern.into(),
            bindings: self.bindings.clone(),
            parent: Some(Box::new(self.clone())),
            validators: self.validators.clone(),
        }
    }

    /// Concatenates the given templates into one: patterns joined with a
    /// separator, bindings unioned (first writer wins on collision), and all
    /// validators carried over.
    pub fn compose(templates: &[Template]) -> Template {
        let id = templates
            .iter()
            .map(Template::id)
            .collect::<Vec<_>>()
            .join("+");
        let pattern = templates
            .iter()
            .map(Template::pattern)
            .collect::<Vec<_>>()
            .join(INHERIT_SEPARATOR);
        let mut bindings = Bindings::new();
        let mut validators = Vec::new();
        for template in templates {
            for (key, value) in &template.bindings {
                bindings.entry(key.clone()).or_insert_with(|| value.clone());
            }
            validators.extend(template.validators.iter().cloned());
        }
        Template {
            id,
            pattern,
            bindings,
            parent: None,
            validators,
        }
    }

    /// Sequential concatenation with a section marker between the two
    /// patterns. The receiver's bindings take precedence on collision.
    pub fn chain(&self, next: &Template) -> Template {
        let mut bindings = next.bindings.clone();
        for (key, value) in &self.bindings {
            bindings.insert(key.clone(), value.clone());
        }
        let mut validators = self.validators.clone();
        validators.extend(next.validators.iter().cloned());
        Template {
            id: format!("{}>{}", self.id, next.id),
            pattern: format!("{}{}{}", self.pattern, SECTION_MARKER, next.pattern),
            bindings,
            parent: None,
            validators,
        }
    }

    /// Resolves the template to final text.
    ///
    /// Validators run first; a failing validator aborts resolution with a
    /// [`TutorError::Validation`] naming this template and the validator's
    /// message. The ancestor chain is then resolved root-first with the same
    /// bindings and prepended. Any placeholder left after substitution is
    /// reported as a non-fatal diagnostic.
    pub fn resolve(&self) -> Result<ResolvedTemplate> {
        for validator in &self.validators {
            if let Err(message) = validator.run(&self.bindings) {
                return Err(TutorError::validation(
                    &self.id,
                    format!("{}: {}", validator.name(), message),
                ));
            }
        }

        // Walk the parent chain iteratively, collecting patterns root-first.
        let mut chain = Vec::new();
        let mut cursor = self.parent.as_deref();
        while let Some(ancestor) = cursor {
            chain.push(ancestor.pattern.as_str());
            cursor = ancestor.parent.as_deref();
        }
        chain.reverse();
        chain.push(self.pattern.as_str());

        let text = chain
            .iter()
            .map(|pattern| substitute(pattern, &self.bindings))
            .collect::<Vec<_>>()
            .join(INHERIT_SEPARATOR);

        let diagnostics: Vec<String> = PLACEHOLDER_RE
            .captures_iter(&text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| format!("unresolved placeholder '{}' in template '{}'", m.as_str(), self.id))
            .collect();
        for diagnostic in &diagnostics {
            tracing::warn!(template = %self.id, "{diagnostic}");
        }

        Ok(ResolvedTemplate { text, diagnostics })
    }
}

fn substitute(pattern: &str, bindings: &Bindings) -> String {
    PLACEHOLDER_RE
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            let key = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match bindings.get(key) {
                Some(value) => value.render(),
                None => caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
            }
        })
        .into_owned()
}

fn flatten_value(prefix: &str, value: &Value, out: &mut Vec<(String, TemplateValue)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_value(&path, nested, out);
            }
        }
        other => {
            if !prefix.is_empty() {
                out.push((prefix.to_string(), TemplateValue::from_json(other)));
            }
        }
    }
}
