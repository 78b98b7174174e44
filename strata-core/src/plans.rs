use std::collections::BTreeMap;

use crate::addrs::InstanceAddr;
use crate::config::Attributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    Replace,
    #[serde(rename = "no-op")]
    NoOp,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Replace => "replace",
            Action::NoOp => "no-op",
        }
    }

    pub fn destroys(&self) -> bool {
        matches!(self, Action::Delete | Action::Replace)
    }
}

/// Order of the two halves of a replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceOrder {
    #[default]
    DestroyBeforeCreate,
    CreateBeforeDestroy,
}

/// Proposed change for one resource instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Change {
    pub address: InstanceAddr,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Attributes>,
    /// Only meaningful for `Replace`.
    #[serde(default)]
    pub replace_order: ReplaceOrder,
    /// Provider configuration serving this instance, `provider.type[.alias]`
    /// relative to the resource's module. Set by planning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Change {
    pub fn new(address: InstanceAddr, action: Action) -> Self {
        Self {
            address,
            action,
            before: None,
            after: None,
            replace_order: ReplaceOrder::default(),
            provider: None,
        }
    }

    pub fn create(address: InstanceAddr, after: Attributes) -> Self {
        Self {
            after: Some(after),
            ..Self::new(address, Action::Create)
        }
    }

    pub fn update(address: InstanceAddr, before: Attributes, after: Attributes) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            ..Self::new(address, Action::Update)
        }
    }

    pub fn delete(address: InstanceAddr, before: Attributes) -> Self {
        Self {
            before: Some(before),
            ..Self::new(address, Action::Delete)
        }
    }

    pub fn replace(
        address: InstanceAddr,
        before: Attributes,
        after: Attributes,
        order: ReplaceOrder,
    ) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            replace_order: order,
            ..Self::new(address, Action::Replace)
        }
    }

    pub fn no_op(address: InstanceAddr, current: Option<Attributes>) -> Self {
        Self {
            before: current.clone(),
            after: current,
            ..Self::new(address, Action::NoOp)
        }
    }

    /// The two sequenced halves of a `Replace`; any other action is returned as-is.
    pub fn sub_operations(&self) -> Vec<Change> {
        if self.action != Action::Replace {
            return vec![self.clone()];
        }
        let destroy = Change {
            action: Action::Delete,
            after: None,
            ..self.clone()
        };
        let create = Change {
            action: Action::Create,
            before: None,
            ..self.clone()
        };
        match self.replace_order {
            ReplaceOrder::DestroyBeforeCreate => vec![destroy, create],
            ReplaceOrder::CreateBeforeDestroy => vec![create, destroy],
        }
    }
}

/// Change set keyed by instance address. Each address appears at most once.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diff {
    changes: BTreeMap<InstanceAddr, Change>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, change: Change) -> Result<(), DiffError> {
        if self.changes.contains_key(&change.address) {
            return Err(DiffError::Duplicate(change.address.to_string()));
        }
        self.changes.insert(change.address.clone(), change);
        Ok(())
    }

    pub fn get(&self, addr: &InstanceAddr) -> Option<&Change> {
        self.changes.get(addr)
    }

    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.values()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// True when every change is a no-op.
    pub fn is_no_op(&self) -> bool {
        self.changes.values().all(|c| c.action == Action::NoOp)
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes.values().filter(|c| c.action == action).count()
    }
}

impl FromIterator<Change> for Diff {
    fn from_iter<T: IntoIterator<Item = Change>>(iter: T) -> Self {
        Self {
            changes: iter
                .into_iter()
                .map(|c| (c.address.clone(), c))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error("duplicate change for {0}")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> InstanceAddr {
        s.parse().unwrap()
    }

    #[test]
    fn rejects_duplicate_entries() {
        let mut diff = Diff::new();
        diff.insert(Change::create(addr("null_resource.a"), Attributes::new()))
            .unwrap();
        let err = diff
            .insert(Change::delete(addr("null_resource.a"), Attributes::new()))
            .unwrap_err();
        assert_eq!(err, DiffError::Duplicate("null_resource.a".into()));
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn replace_splits_in_policy_order() {
        let c = Change::replace(
            addr("null_resource.a"),
            Attributes::new(),
            Attributes::new(),
            ReplaceOrder::CreateBeforeDestroy,
        );
        let ops: Vec<_> = c.sub_operations().into_iter().map(|c| c.action).collect();
        assert_eq!(ops, vec![Action::Create, Action::Delete]);

        let c = Change {
            replace_order: ReplaceOrder::DestroyBeforeCreate,
            ..c
        };
        let ops: Vec<_> = c.sub_operations().into_iter().map(|c| c.action).collect();
        assert_eq!(ops, vec![Action::Delete, Action::Create]);
    }
}
