use std::sync::LazyLock;

use regex::Regex;

use crate::addrs::{InstanceKey, ModulePath};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("valid regex"));

static RESOURCE_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z][A-Za-z0-9_\-]*)\.([A-Za-z_][A-Za-z0-9_\-]*)(?:\[(\d+|"[^"]*")\])?(?:\.(.+))?$"#)
        .expect("valid regex")
});

/// A parsed reference to another object in the same or a child module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Variable {
        name: String,
    },
    Resource {
        resource_type: String,
        name: String,
        key: Option<InstanceKey>,
        attribute: Vec<String>,
    },
    ModuleCall {
        name: String,
    },
    ModuleOutput {
        module: String,
        output: String,
    },
    /// `count.*`, `each.*`, `self.*`, `path.*`: bound at evaluation, never a dependency.
    Contextual(String),
}

impl Reference {
    /// Referenceable names that may satisfy this reference, most specific
    /// first. Names are scoped to the module they live in.
    pub fn lookup_names(&self, from: &ModulePath) -> Vec<(ModulePath, String)> {
        match self {
            Reference::Variable { name } => vec![(from.clone(), format!("var.{name}"))],
            Reference::Resource {
                resource_type,
                name,
                key,
                ..
            } => {
                let base = format!("{resource_type}.{name}");
                match key {
                    Some(k) => vec![(from.clone(), format!("{base}{k}")), (from.clone(), base)],
                    None => vec![(from.clone(), base)],
                }
            }
            Reference::ModuleCall { name } => vec![(from.clone(), format!("module.{name}"))],
            Reference::ModuleOutput { module, output } => {
                vec![(from.child(module), format!("output.{output}"))]
            }
            Reference::Contextual(_) => Vec::new(),
        }
    }
}

pub fn parse_reference(input: &str) -> Result<Reference, ReferenceError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ReferenceError::Empty);
    }

    for prefix in ["count.", "each.", "self.", "path."] {
        if s.starts_with(prefix) {
            return Ok(Reference::Contextual(s.to_string()));
        }
    }

    if let Some(rest) = s.strip_prefix("var.") {
        let name = rest.split('.').next().unwrap_or_default();
        validate_name(name)?;
        return Ok(Reference::Variable {
            name: name.to_string(),
        });
    }

    if let Some(rest) = s.strip_prefix("module.") {
        let parts: Vec<&str> = rest.split('.').collect();
        for p in &parts {
            validate_name(p)?;
        }
        return match parts.as_slice() {
            [name] => Ok(Reference::ModuleCall {
                name: (*name).to_string(),
            }),
            [module, "output", output, ..] | [module, output, ..] => {
                Ok(Reference::ModuleOutput {
                    module: (*module).to_string(),
                    output: (*output).to_string(),
                })
            }
            [] => Err(ReferenceError::Empty),
        };
    }

    let caps = RESOURCE_HEAD_RE
        .captures(s)
        .ok_or_else(|| ReferenceError::Unknown(s.to_string()))?;
    let key = match caps.get(3) {
        None => None,
        Some(k) => {
            let raw = k.as_str();
            match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
                Some(inner) => Some(InstanceKey::Str(inner.to_string())),
                None => Some(InstanceKey::Int(
                    raw.parse()
                        .map_err(|_| ReferenceError::InvalidKey(raw.to_string()))?,
                )),
            }
        }
    };
    let attribute = match caps.get(4) {
        Some(rest) => {
            let parts: Vec<String> = rest.as_str().split('.').map(str::to_string).collect();
            if parts.iter().any(String::is_empty) {
                return Err(ReferenceError::Empty);
            }
            parts
        }
        None => Vec::new(),
    };

    Ok(Reference::Resource {
        resource_type: caps[1].to_string(),
        name: caps[2].to_string(),
        key,
        attribute,
    })
}

fn validate_name(name: &str) -> Result<(), ReferenceError> {
    if name.is_empty() {
        return Err(ReferenceError::Empty);
    }
    if !NAME_RE.is_match(name) {
        return Err(ReferenceError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("reference must not be empty")]
    Empty,
    #[error("invalid name segment: {0}")]
    InvalidName(String),
    #[error("invalid instance key: {0}")]
    InvalidKey(String),
    #[error("unrecognized reference: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_with_key_and_attribute() {
        let r = parse_reference("aws_instance.web[1].private_ip").unwrap();
        assert_eq!(
            r,
            Reference::Resource {
                resource_type: "aws_instance".into(),
                name: "web".into(),
                key: Some(InstanceKey::Int(1)),
                attribute: vec!["private_ip".into()],
            }
        );
        let names = r.lookup_names(&ModulePath::root());
        assert_eq!(names[0].1, "aws_instance.web[1]");
        assert_eq!(names[1].1, "aws_instance.web");
    }

    #[test]
    fn module_output_both_spellings() {
        let long = parse_reference("module.net.output.vpc_id").unwrap();
        let short = parse_reference("module.net.vpc_id").unwrap();
        assert_eq!(long, short);
        let names = long.lookup_names(&ModulePath::root());
        assert_eq!(names, vec![(ModulePath::new(["net"]), "output.vpc_id".to_string())]);
    }

    #[test]
    fn contextual_references_have_no_lookup() {
        let r = parse_reference("count.index").unwrap();
        assert!(r.lookup_names(&ModulePath::root()).is_empty());
    }

    #[test]
    fn rejects_single_segment() {
        assert!(matches!(parse_reference("web"), Err(ReferenceError::Unknown(_))));
        assert!(matches!(parse_reference("var."), Err(ReferenceError::Empty)));
    }
}
