//! Dual-channel output formatting contract.
//!
//! Every agent response carries two channels: `speech.text` is read aloud by
//! a TTS engine and must be plain words only, while `display.content` is
//! rendered visually and may use structural emphasis and math notation.
//! Display math prefers the fixed Unicode symbol table below; the `$...$`
//! math-markup delimiter is the fallback for expressions Unicode cannot
//! represent. A backslash-escaped dollar sign is a literal currency symbol
//! and must never appear inside a delimited math span.
//!
//! [`validate_formatting`] is mandatory for the speech channel and advisory
//! for display: callers must reject a response with any `errors` entry.

use crate::response::AgentResponse;
use regex::Regex;
use std::sync::LazyLock;

/// Unicode symbols the display channel should prefer over `$...$` markup.
pub const MATH_SYMBOLS: &[char] = &[
    // Greek letters
    'α', 'β', 'γ', 'δ', 'ε', 'θ', 'λ', 'μ', 'π', 'ρ', 'σ', 'τ', 'φ', 'ω', 'Δ', 'Σ', 'Ω',
    // Operators and relations
    '×', '÷', '±', '−', '√', '∞', '≈', '≠', '≤', '≥', '∈', '∩', '∪', '⊂', '°', '∠', '⊥', '∥',
    // Superscripts and subscripts
    '⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹', '₀', '₁', '₂', '₃', '₄',
    // Common fractions
    '½', '⅓', '⅔', '¼', '¾', '⅕', '⅛',
];

/// The rule block embedded into every generation-agent prompt.
pub const FORMATTING_RULES: &str = r#"speech.text rules (spoken by a TTS avatar):
- PLAIN WORDS ONLY: no markdown emphasis (* _ ** __ #), no math markup ($ or backslash commands)
- Write math in words: "two thirds divided by four", "x squared"
- No hyphenated acronyms or number runs: say "SOH CAH TOA" not "SOH-CAH-TOA", "thirty sixty ninety" not "30-60-90"
- Numbers small and word-friendly; avoid symbol-heavy phrasing

display.content rules (rendered visually):
- Markdown emphasis is allowed for structure
- Prefer Unicode math symbols (Greek letters, x², √, ≤, ½, °) over $...$ markup
- Use $...$ delimiters ONLY for what Unicode cannot express (arbitrary fractions, nested radicals)
- A literal dollar amount is written \$ and must NEVER appear inside a $...$ math span
- No document-level markup commands (\begin, \section, \documentclass)"#;

static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*[^*]+\*\*|__[^_]+__|(?m)^\s*#{1,6}\s|(?m)^\s*[-*]\s+\S|`[^`]+`").unwrap()
});

static DOC_MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(begin|end|section|subsection|documentclass|usepackage|newcommand)\b").unwrap()
});

static MATH_COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(frac|sqrt|times|div|cdot|sin|cos|tan|pi|theta|alpha|beta)\b").unwrap());

static HYPHEN_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[A-Z]{2,}|\d+)(?:-(?:[A-Z]{2,}|\d+)){1,}\b").unwrap());

/// Outcome of a formatting check. `errors` make the response unusable for
/// the speech channel; `warnings` are logged only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattingReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FormattingReport {
    fn finish(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Checks an agent response against the dual-channel contract.
pub fn validate_formatting(response: &AgentResponse) -> FormattingReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_speech(&response.speech.text, &mut errors, &mut warnings);
    if let Some(content) = &response.display.content {
        check_display(content, &mut errors);
    }

    FormattingReport::finish(errors, warnings)
}

fn check_speech(text: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if !math_spans(text).is_empty() {
        errors.push("speech.text contains $...$ math markup".to_string());
    }
    if MATH_COMMAND_RE.is_match(text) {
        errors.push("speech.text contains backslash math commands".to_string());
    }
    if EMPHASIS_RE.is_match(text) {
        errors.push("speech.text contains structural emphasis markers".to_string());
    }
    if DOC_MARKUP_RE.is_match(text) {
        errors.push("speech.text contains document-level markup commands".to_string());
    }
    for symbol in text.chars().filter(|c| MATH_SYMBOLS.contains(c)) {
        warnings.push(format!(
            "speech.text contains Unicode math symbol '{symbol}' which often mispronounces"
        ));
    }
    if let Some(m) = HYPHEN_RUN_RE.find(text) {
        warnings.push(format!(
            "speech.text contains hyphenated run '{}' which reads poorly aloud",
            m.as_str()
        ));
    }
}

fn check_display(content: &str, errors: &mut Vec<String>) {
    if DOC_MARKUP_RE.is_match(content) {
        errors.push("display.content contains document-level markup commands".to_string());
    }
    for span in math_spans(content) {
        if span.contains("\\$") {
            errors.push(format!(
                "currency amount nested inside math span '${span}$'; the two escaping conventions must never nest"
            ));
        }
    }
}

/// Extracts the contents of unescaped `$...$` spans. A `\$` is a literal
/// currency symbol and neither opens nor closes a span.
fn math_spans(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut current: Option<String> = None;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            if let Some(span) = current.as_mut() {
                span.push('\\');
                span.push(ch);
            }
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '$' => match current.take() {
                Some(span) => spans.push(span),
                None => current = Some(String::new()),
            },
            other => {
                if let Some(span) = current.as_mut() {
                    span.push(other);
                }
            }
        }
    }
    spans
}
