//! Fluent prompt builder.
//!
//! A [`PromptBuilder`] accumulates named, ordered content sections (role,
//! context, objectives, constraints, output schema, ...) and renders them to
//! a single prompt string. Sections keep insertion order unless an explicit
//! order is supplied at build time.

use crate::format::FORMATTING_RULES;
use crate::template::TemplateValue;
use serde_json::Value;

/// Default separator between rendered sections.
const SECTION_SEPARATOR: &str = "\n\n";

/// Markers that indicate a value slipped through unserialized. Their presence
/// in the final text is reported as a non-fatal lint.
const LINT_MARKERS: [&str; 2] = ["undefined", "[object Object]"];

#[derive(Debug, Clone)]
struct PromptSection {
    name: String,
    body: String,
}

/// Accumulates named sections and renders them into one prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
    separator: String,
    headers: bool,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            separator: SECTION_SEPARATOR.to_string(),
            headers: true,
        }
    }

    /// Overrides the separator placed between sections.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Disables the `NAME:` header line in front of each section body.
    pub fn without_headers(mut self) -> Self {
        self.headers = false;
        self
    }

    /// Appends one named section. The content may be any [`TemplateValue`]
    /// convertible type; lists and maps render line-wise.
    pub fn add_section(mut self, name: impl Into<String>, content: impl Into<TemplateValue>) -> Self {
        self.sections.push(PromptSection {
            name: name.into(),
            body: content.into().render(),
        });
        self
    }

    pub fn add_role(self, role: impl Into<TemplateValue>) -> Self {
        self.add_section("ROLE", role)
    }

    pub fn add_task(self, task: impl Into<TemplateValue>) -> Self {
        self.add_section("TASK", task)
    }

    /// Adds a CONTEXT section from a JSON value, rendered as `key: value`
    /// lines (nested objects render indented through the map formatter).
    pub fn add_context(self, context: &Value) -> Self {
        self.add_section("CONTEXT", TemplateValue::from_json(context))
    }

    pub fn add_objectives(self, objectives: Vec<String>) -> Self {
        self.add_section("LEARNING OBJECTIVES", objectives)
    }

    pub fn add_instructions(self, instructions: Vec<String>) -> Self {
        self.add_section("INSTRUCTIONS", instructions)
    }

    pub fn add_examples(self, examples: Vec<String>) -> Self {
        self.add_section("EXAMPLES", examples)
    }

    pub fn add_constraints(self, constraints: Vec<String>) -> Self {
        self.add_section("CONSTRAINTS", constraints)
    }

    /// Adds the canonical speech/display formatting rules block.
    pub fn add_formatting_rules(self) -> Self {
        self.add_section("FORMATTING RULES", FORMATTING_RULES)
    }

    /// Adds the visual tools available to the agent, rendered line-wise.
    /// When no tools are in scope, states that explicitly so the model does
    /// not invent one.
    pub fn add_visual_tools(self, tools: &Value) -> Self {
        let empty = match tools {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            self.add_section(
                "VISUAL TOOLS",
                "NO visual tools are available. Do NOT attempt to use one.",
            )
        } else {
            self.add_section("VISUAL TOOLS", TemplateValue::from_json(tools))
        }
    }

    /// Adds the expected response schema, rendered as pretty JSON.
    pub fn add_output_schema(self, schema: &Value) -> Self {
        let body = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        self.add_section("OUTPUT SCHEMA", body)
    }

    /// Conditionally applies `f` to the builder. Keeps fluent chains linear
    /// when a section depends on optional context.
    pub fn add_if(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition { f(self) } else { self }
    }

    /// Appends every section of `other`, after this builder's own sections.
    /// Duplicate names are allowed; later sections simply repeat the header.
    pub fn merge(mut self, other: &PromptBuilder) -> Self {
        self.sections.extend(other.sections.iter().cloned());
        self
    }

    /// Names of the accumulated sections, in insertion order.
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Renders all sections in insertion order.
    pub fn build(&self) -> String {
        let (text, warnings) = self.build_report();
        for warning in warnings {
            tracing::warn!("{warning}");
        }
        text
    }

    /// Renders with an explicit section order. Named sections come first in
    /// the given order; sections not named keep their insertion order after.
    pub fn build_ordered(&self, order: &[&str]) -> String {
        let mut ordered: Vec<&PromptSection> = Vec::with_capacity(self.sections.len());
        for name in order {
            ordered.extend(self.sections.iter().filter(|s| s.name == *name));
        }
        ordered.extend(
            self.sections
                .iter()
                .filter(|s| !order.contains(&s.name.as_str())),
        );
        self.render(&ordered)
    }

    /// Renders and returns the text together with the lint warnings instead
    /// of logging them.
    pub fn build_report(&self) -> (String, Vec<String>) {
        let refs: Vec<&PromptSection> = self.sections.iter().collect();
        let text = self.render(&refs);
        let warnings = LINT_MARKERS
            .iter()
            .filter(|marker| text.contains(*marker))
            .map(|marker| format!("prompt contains residual marker '{marker}'"))
            .collect();
        (text, warnings)
    }

    fn render(&self, sections: &[&PromptSection]) -> String {
        sections
            .iter()
            .map(|section| {
                if self.headers {
                    format!("{}:\n{}", section.name.to_uppercase(), section.body)
                } else {
                    section.body.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}
