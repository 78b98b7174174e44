use serde_json::Value as JsonValue;

use strata_core::expressions::{parse_reference, parse_template, Reference, Segment};
use strata_core::Attributes;

/// Resolves references to values within one evaluation scope.
pub trait Lookup {
    /// `None` when the value is not known (yet).
    fn lookup(&self, reference: &Reference) -> Option<JsonValue>;
}

/// Substitute every known `${...}` reference in `value`.
///
/// A string that is exactly one template takes the referenced value as-is;
/// templates embedded in text are rendered as strings. Anything that cannot
/// be resolved stays as written.
pub fn interpolate_value(value: &JsonValue, scope: &dyn Lookup) -> JsonValue {
    match value {
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => value.clone(),
        JsonValue::String(s) => interpolate_string(s, scope),
        JsonValue::Array(arr) => {
            JsonValue::Array(arr.iter().map(|v| interpolate_value(v, scope)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, scope)))
                .collect(),
        ),
    }
}

pub fn interpolate_attributes(attrs: &Attributes, scope: &dyn Lookup) -> Attributes {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), interpolate_value(v, scope)))
        .collect()
}

fn interpolate_string(s: &str, scope: &dyn Lookup) -> JsonValue {
    let Ok(tpl) = parse_template(s) else {
        return JsonValue::String(s.to_string());
    };
    if !tpl.has_exprs() {
        // Escapes are resolved even without expressions.
        return JsonValue::String(
            tpl.segments
                .iter()
                .map(|seg| match seg {
                    Segment::Literal(l) => l.as_str(),
                    Segment::Expr(_) => "",
                })
                .collect(),
        );
    }
    if let Some(expr) = tpl.single_expr() {
        return resolve_expr(expr, scope).unwrap_or_else(|| JsonValue::String(s.to_string()));
    }

    let mut out = String::new();
    for seg in &tpl.segments {
        match seg {
            Segment::Literal(l) => out.push_str(l),
            Segment::Expr(e) => match resolve_expr(e, scope) {
                Some(JsonValue::String(s)) => out.push_str(&s),
                Some(JsonValue::Null) => {}
                Some(other) => out.push_str(&other.to_string()),
                None => {
                    out.push_str("${");
                    out.push_str(e);
                    out.push('}');
                }
            },
        }
    }
    JsonValue::String(out)
}

fn resolve_expr(expr: &str, scope: &dyn Lookup) -> Option<JsonValue> {
    let reference = parse_reference(expr).ok()?;
    let value = scope.lookup(&reference)?;
    match &reference {
        Reference::Resource { attribute, .. } => walk_attribute(value, attribute),
        _ => Some(value),
    }
}

fn walk_attribute(mut value: JsonValue, path: &[String]) -> Option<JsonValue> {
    for seg in path {
        value = match value {
            JsonValue::Object(mut map) => map.remove(seg)?,
            JsonValue::Array(arr) => {
                let idx: usize = seg.parse().ok()?;
                arr.into_iter().nth(idx)?
            }
            _ => return None,
        };
    }
    Some(value)
}

/// Whether a value still carries unresolved templates.
pub fn has_unknowns(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(s) => parse_template(s).map(|t| t.has_exprs()).unwrap_or(false),
        JsonValue::Array(arr) => arr.iter().any(has_unknowns),
        JsonValue::Object(map) => map.values().any(has_unknowns),
        _ => false,
    }
}
