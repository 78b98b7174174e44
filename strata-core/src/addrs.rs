use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static INSTANCE_ADDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^((?:module\.[A-Za-z0-9_\-]+\.)*)([A-Za-z][A-Za-z0-9_\-]*)\.([A-Za-z_][A-Za-z0-9_\-]*)(?:\[(\d+|"[^"]*")\])?$"#,
    )
    .expect("valid regex")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("valid regex"));

/// Path of module calls from the root module. The root module is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// `None` for the root module.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Name of the call that instantiated this module.
    pub fn call_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// This path, then each ancestor up to and including the root.
    pub fn self_and_ancestors(&self) -> Vec<ModulePath> {
        (0..=self.0.len())
            .rev()
            .map(|n| Self(self.0[..n].to_vec()))
            .collect()
    }

    fn prefixed(&self, local: &str) -> String {
        if self.is_root() {
            local.to_string()
        } else {
            format!("{self}.{local}")
        }
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "module.{seg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstanceKey {
    Int(u64),
    Str(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Int(i) => write!(f, "[{i}]"),
            InstanceKey::Str(s) => write!(f, "[\"{s}\"]"),
        }
    }
}

/// A resource as declared in configuration, before instance expansion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceAddr {
    pub module: ModulePath,
    pub resource_type: String,
    pub name: String,
}

impl ResourceAddr {
    pub fn new(module: ModulePath, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// `type.name`, without the module prefix.
    pub fn local_name(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    pub fn instance(&self, key: Option<InstanceKey>) -> InstanceAddr {
        InstanceAddr {
            resource: self.clone(),
            key,
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module.prefixed(&self.local_name()))
    }
}

/// A single resource instance; the key used by both diffs and state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceAddr {
    pub resource: ResourceAddr,
    pub key: Option<InstanceKey>,
}

impl InstanceAddr {
    pub fn module(&self) -> &ModulePath {
        &self.resource.module
    }

    /// `type.name[key]`, without the module prefix.
    pub fn local_name(&self) -> String {
        match &self.key {
            Some(k) => format!("{}{k}", self.resource.local_name()),
            None => self.resource.local_name(),
        }
    }
}

impl fmt::Display for InstanceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource.module.prefixed(&self.local_name()))
    }
}

impl FromStr for InstanceAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let caps = INSTANCE_ADDR_RE
            .captures(s)
            .ok_or_else(|| AddrParseError::Invalid(s.to_string()))?;

        let module = caps
            .get(1)
            .map(|m| {
                m.as_str()
                    .split('.')
                    .filter(|seg| !seg.is_empty())
                    .collect::<Vec<_>>()
                    .chunks(2)
                    .filter_map(|pair| pair.get(1).map(|s| s.to_string()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if caps[2].eq_ignore_ascii_case("module") {
            return Err(AddrParseError::Invalid(s.to_string()));
        }

        let key = match caps.get(4) {
            None => None,
            Some(k) => {
                let raw = k.as_str();
                if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
                    Some(InstanceKey::Str(inner.to_string()))
                } else {
                    let n = raw
                        .parse::<u64>()
                        .map_err(|_| AddrParseError::InvalidKey(raw.to_string()))?;
                    Some(InstanceKey::Int(n))
                }
            }
        };

        Ok(InstanceAddr {
            resource: ResourceAddr::new(ModulePath(module), &caps[2], &caps[3]),
            key,
        })
    }
}

impl serde::Serialize for InstanceAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for InstanceAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A provider configuration, e.g. `provider.aws` or `module.net.provider.aws.west`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderAddr {
    pub module: ModulePath,
    pub provider_type: String,
    pub alias: Option<String>,
}

impl ProviderAddr {
    pub fn new(module: ModulePath, provider_type: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            module,
            provider_type: provider_type.into(),
            alias,
        }
    }

    /// Provider type implied by a resource type: the prefix before the first `_`.
    pub fn implied_type(resource_type: &str) -> &str {
        resource_type
            .split_once('_')
            .map(|(prefix, _)| prefix)
            .unwrap_or(resource_type)
    }

    /// `provider.type[.alias]`, without the module prefix.
    pub fn local_name(&self) -> String {
        match &self.alias {
            Some(alias) => format!("provider.{}.{alias}", self.provider_type),
            None => format!("provider.{}", self.provider_type),
        }
    }

    /// Parse a module-relative provider reference: `aws`, `aws.west`,
    /// `provider.aws` or `provider.aws.west`.
    pub fn from_local(module: ModulePath, s: &str) -> Self {
        let s = s.strip_prefix("provider.").unwrap_or(s);
        match s.split_once('.') {
            Some((ty, alias)) => Self::new(module, ty, Some(alias.to_string())),
            None => Self::new(module, s, None),
        }
    }

    /// Same provider configuration relocated to another module.
    pub fn in_module(&self, module: ModulePath) -> Self {
        Self {
            module,
            provider_type: self.provider_type.clone(),
            alias: self.alias.clone(),
        }
    }
}

impl fmt::Display for ProviderAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module.prefixed(&self.local_name()))
    }
}

/// Any addressable object in the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    Resource(ResourceAddr),
    Instance(InstanceAddr),
    Provider(ProviderAddr),
    Variable { module: ModulePath, name: String },
    Output { module: ModulePath, name: String },
    ModuleCall { module: ModulePath, name: String },
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Resource(r) => r.fmt(f),
            Address::Instance(i) => i.fmt(f),
            Address::Provider(p) => p.fmt(f),
            Address::Variable { module, name } => f.write_str(&module.prefixed(&format!("var.{name}"))),
            Address::Output { module, name } => {
                f.write_str(&module.prefixed(&format!("output.{name}")))
            }
            Address::ModuleCall { module, name } => {
                f.write_str(&module.prefixed(&format!("module.{name}")))
            }
        }
    }
}

pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrParseError {
    #[error("invalid resource instance address: {0}")]
    Invalid(String),
    #[error("invalid instance key: {0}")]
    InvalidKey(String),
}
