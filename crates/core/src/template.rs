//! Named-placeholder SQL templates.
//!
//! Templates contain `{name}` placeholders where `name` is an ASCII
//! identifier. `{{` and `}}` render as literal braces. Rendering is strict:
//! every placeholder must have a value, and malformed braces are rejected
//! rather than passed through to the warehouse.

use std::collections::BTreeMap;

/// Substitution values keyed by placeholder name.
pub type Params = BTreeMap<String, String>;

/// Errors raised while parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder has no value in the supplied parameters.
    #[error("Missing value for template placeholder '{name}'")]
    MissingParameter { name: String },

    /// The template text itself is not well formed.
    #[error("Malformed template at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                // Escaped brace: keep one of the pair as text.
                segments.push(Segment::Text(&template[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'{' => {
                let close = template[i + 1..]
                    .find(|c: char| c == '{' || c == '}')
                    .map(|p| i + 1 + p)
                    .filter(|&c| bytes[c] == b'}')
                    .ok_or_else(|| TemplateError::Malformed {
                        offset: i,
                        reason: "unterminated placeholder".into(),
                    })?;
                let name = &template[i + 1..close];
                if !is_identifier(name) {
                    return Err(TemplateError::Malformed {
                        offset: i,
                        reason: format!("invalid placeholder name '{name}'"),
                    });
                }
                if text_start < i {
                    segments.push(Segment::Text(&template[text_start..i]));
                }
                segments.push(Segment::Placeholder(name));
                i = close + 1;
                text_start = i;
            }
            b'}' => {
                return Err(TemplateError::Malformed {
                    offset: i,
                    reason: "single '}' encountered".into(),
                });
            }
            _ => i += 1,
        }
    }

    if text_start < bytes.len() {
        segments.push(Segment::Text(&template[text_start..]));
    }
    Ok(segments)
}

/// Render `template`, substituting every placeholder from `params`.
///
/// Keys in `params` without a matching placeholder are ignored.
pub fn render(template: &str, params: &Params) -> Result<String, TemplateError> {
    render_partial(template, params, &[])
}

/// Render `template`, leaving the placeholders named in `keep` untouched.
///
/// The output is itself a valid template: kept placeholders stay as
/// `{name}` and literal braces are re-escaped, so it can be rendered again
/// later (the executor resolves `{dataset}` this way).
pub fn render_partial(
    template: &str,
    params: &Params,
    keep: &[&str],
) -> Result<String, TemplateError> {
    let segments = parse(template)?;
    let mut out = String::with_capacity(template.len());

    for segment in segments {
        match segment {
            Segment::Text(text) if keep.is_empty() => out.push_str(text),
            Segment::Text(text) => {
                for c in text.chars() {
                    match c {
                        '{' => out.push_str("{{"),
                        '}' => out.push_str("}}"),
                        _ => out.push(c),
                    }
                }
            }
            Segment::Placeholder(name) if keep.contains(&name) => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
            Segment::Placeholder(name) => {
                let value = params.get(name).ok_or_else(|| TemplateError::MissingParameter {
                    name: name.to_string(),
                })?;
                out.push_str(value);
            }
        }
    }

    Ok(out)
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut names: Vec<String> = Vec::new();
    for segment in parse(template)? {
        if let Segment::Placeholder(name) = segment {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}
