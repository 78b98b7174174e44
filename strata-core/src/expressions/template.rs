use std::sync::LazyLock;

use regex::Regex;

use super::reference::parse_reference;

static REF_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[A-Za-z_][A-Za-z0-9_\-]*(?:\[(?:\d+|"[^"]*")\])?(?:\.[A-Za-z_][A-Za-z0-9_\-]*(?:\[(?:\d+|"[^"]*")\])?)+"#)
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// The expression when the whole string is exactly one `${...}`.
    pub fn single_expr(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Expr(e)] => Some(e),
            _ => None,
        }
    }

    pub fn has_exprs(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Expr(_)))
    }
}

/// Split a string into literal text and `${ ... }` expressions.
/// `$${` escapes a literal `${`.
pub fn parse_template(input: &str) -> Result<Template, TemplateError> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            buf.push(ch);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                let mut lookahead = chars.clone();
                if lookahead.next() == Some('{') {
                    buf.push('$');
                } else {
                    buf.push_str("$$");
                }
            }
            Some('{') => {
                chars.next();
                // No nesting support.
                let mut inner = String::new();
                let mut found = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        found = true;
                        break;
                    }
                    inner.push(n);
                }
                if !found {
                    return Err(TemplateError::UnclosedExpression);
                }
                let inner = inner.trim();
                if inner.is_empty() {
                    return Err(TemplateError::EmptyExpression);
                }
                if !buf.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut buf)));
                }
                segments.push(Segment::Expr(inner.to_string()));
            }
            _ => buf.push('$'),
        }
    }

    if !buf.is_empty() {
        segments.push(Segment::Literal(buf));
    }

    Ok(Template { segments })
}

/// Raw reference strings found inside the templates of `value`.
pub fn references_in_value(value: &serde_json::Value) -> Result<Vec<String>, TemplateError> {
    let mut out = Vec::new();
    scan_value(value, &mut out)?;
    Ok(out)
}

fn scan_value(value: &serde_json::Value, out: &mut Vec<String>) -> Result<(), TemplateError> {
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => Ok(()),
        serde_json::Value::String(s) => scan_string(s, out),
        serde_json::Value::Array(arr) => {
            for v in arr {
                scan_value(v, out)?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                scan_value(v, out)?;
            }
            Ok(())
        }
    }
}

fn scan_string(s: &str, out: &mut Vec<String>) -> Result<(), TemplateError> {
    let tpl = parse_template(s)?;
    for seg in tpl.segments {
        let Segment::Expr(expr) = seg else { continue };
        // Best-effort: an expression may wrap references in function calls or operators.
        for m in REF_TOKEN_RE.find_iter(&expr) {
            if parse_reference(m.as_str()).is_ok() && !out.iter().any(|r| r == m.as_str()) {
                out.push(m.as_str().to_string());
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed template expression (missing '}}')")]
    UnclosedExpression,
    #[error("empty template expression")]
    EmptyExpression,
}
