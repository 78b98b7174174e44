//! Plan and apply semantics for each vertex kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as JsonValue;

use strata_core::expressions::Reference;
use strata_core::graph::{
    DiffResourceVertex, ModuleCallVertex, MovedVertex, OrphanVertex, OutputVertex, ProviderVertex,
    ResourceVertex, VariableVertex,
};
use strata_core::{
    Action, Attributes, Change, Diagnostic, Diagnostics, Diff, DiffError, InstanceAddr,
    InstanceKey, ModulePath, OutputValue, ProviderAddr, ReplaceOrder, ResourceAddr, Vertex,
};

use crate::executor::interpolate::{has_unknowns, interpolate_attributes, interpolate_value, Lookup};
use crate::executor::reconcile::{replace_order, Reconciler};
use crate::executor::result::EvalError;
use crate::executor::state::SharedState;
use crate::executor::walker::GraphWalker;
use crate::provider::{PlanRequest, Provider, ProviderRegistry};

/// Root module variable values supplied by the caller.
pub type Inputs = BTreeMap<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOperation {
    /// Compute a diff against a working copy of state.
    Plan,
    /// Carry out a diff against real state.
    Apply,
}

impl WalkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalkOperation::Plan => "plan",
            WalkOperation::Apply => "apply",
        }
    }
}

/// Evaluation context shared by every vertex of one walk.
pub struct ContextGraphWalker {
    operation: WalkOperation,
    state: Arc<SharedState>,
    registry: ProviderRegistry,
    inputs: Inputs,
    providers: DashMap<ProviderAddr, Arc<dyn Provider>>,
    /// `var.x` and `output.y` values per module.
    named: DashMap<(ModulePath, String), JsonValue>,
    /// Arguments for child module variables, keyed by child module path.
    call_args: DashMap<(ModulePath, String), JsonValue>,
    planned: DashMap<InstanceAddr, Change>,
    planned_values: DashMap<InstanceAddr, Attributes>,
    applied: DashMap<InstanceAddr, Action>,
}

impl ContextGraphWalker {
    pub fn new(
        operation: WalkOperation,
        state: Arc<SharedState>,
        registry: ProviderRegistry,
        inputs: Inputs,
    ) -> Self {
        Self {
            operation,
            state,
            registry,
            inputs,
            providers: DashMap::new(),
            named: DashMap::new(),
            call_args: DashMap::new(),
            planned: DashMap::new(),
            planned_values: DashMap::new(),
            applied: DashMap::new(),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Changes recorded by a plan walk.
    pub fn planned_diff(&self) -> Result<Diff, DiffError> {
        let mut changes: Vec<Change> = self.planned.iter().map(|e| e.value().clone()).collect();
        changes.sort_by(|a, b| a.address.cmp(&b.address));
        let mut diff = Diff::new();
        for change in changes {
            diff.insert(change)?;
        }
        Ok(diff)
    }

    /// Actions an apply walk actually carried out.
    pub fn applied(&self) -> BTreeMap<InstanceAddr, Action> {
        self.applied
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    /// Root module output values as evaluated by this walk.
    pub fn root_outputs(&self) -> BTreeMap<String, JsonValue> {
        self.named
            .iter()
            .filter(|e| e.key().0.is_root())
            .filter_map(|e| {
                e.key()
                    .1
                    .strip_prefix("output.")
                    .map(|name| (name.to_string(), e.value().clone()))
            })
            .collect()
    }

    fn scope<'a>(&'a self, module: &'a ModulePath, key: Option<&'a InstanceKey>) -> Scope<'a> {
        Scope {
            ctx: self,
            module,
            key,
        }
    }

    /// Nearest configured provider matching `addr`, searching up the module tree.
    fn provider_for(&self, addr: &ProviderAddr) -> Result<Arc<dyn Provider>, EvalError> {
        addr.module
            .self_and_ancestors()
            .into_iter()
            .find_map(|module| {
                self.providers
                    .get(&addr.in_module(module))
                    .map(|p| p.value().clone())
            })
            .ok_or_else(|| EvalError::invalid(format!("provider {addr} is not configured")))
    }

    fn instance_attributes(&self, addr: &InstanceAddr) -> Option<Attributes> {
        if self.operation == WalkOperation::Plan {
            if let Some(planned) = self.planned_values.get(addr) {
                return Some(planned.value().clone());
            }
        }
        self.state.get(addr).map(|s| s.attributes)
    }

    fn resource_value(&self, resource: &ResourceAddr, key: Option<&InstanceKey>) -> Option<JsonValue> {
        if let Some(key) = key {
            return self
                .instance_attributes(&resource.instance(Some(key.clone())))
                .map(attributes_value);
        }
        if let Some(single) = self.instance_attributes(&resource.instance(None)) {
            return Some(attributes_value(single));
        }

        let mut instances: BTreeMap<InstanceKey, Attributes> = BTreeMap::new();
        if self.operation == WalkOperation::Plan {
            for e in self.planned_values.iter() {
                if &e.key().resource == resource {
                    if let Some(k) = &e.key().key {
                        instances.insert(k.clone(), e.value().clone());
                    }
                }
            }
        }
        if instances.is_empty() {
            for (addr, state) in self.state.instances_of(resource) {
                if let Some(k) = addr.key {
                    instances.insert(k, state.attributes);
                }
            }
        }
        if instances.is_empty() {
            return None;
        }
        if instances.keys().all(|k| matches!(k, InstanceKey::Int(_))) {
            Some(JsonValue::Array(
                instances.into_values().map(attributes_value).collect(),
            ))
        } else {
            Some(JsonValue::Object(
                instances
                    .into_iter()
                    .map(|(k, v)| {
                        let name = match k {
                            InstanceKey::Str(s) => s,
                            InstanceKey::Int(i) => i.to_string(),
                        };
                        (name, attributes_value(v))
                    })
                    .collect(),
            ))
        }
    }

    async fn eval_provider(&self, v: &ProviderVertex) -> Result<(), EvalError> {
        let provider = self.registry.instantiate(&v.addr.provider_type)?;
        let config = interpolate_attributes(&v.config, &self.scope(&v.addr.module, None));
        provider.configure(&config).await?;
        tracing::debug!(provider = %v.addr, synthesized = v.synthesized, "provider configured");
        self.providers.insert(v.addr.clone(), provider);
        Ok(())
    }

    fn eval_variable(&self, v: &VariableVertex) -> Result<(), EvalError> {
        let name = &v.variable.name;
        let supplied = if v.module.is_root() {
            self.inputs.get(name).cloned()
        } else {
            self.call_args
                .get(&(v.module.clone(), name.clone()))
                .map(|a| a.value().clone())
        };
        let value = supplied
            .or_else(|| v.variable.default.clone())
            .ok_or_else(|| EvalError::invalid(format!("no value for required variable {name:?}")))?;
        self.named.insert((v.module.clone(), format!("var.{name}")), value);
        Ok(())
    }

    fn eval_module_call(&self, v: &ModuleCallVertex) {
        let scope = self.scope(&v.module, None);
        let child = v.child_path();
        for (name, arg) in &v.args {
            self.call_args
                .insert((child.clone(), name.clone()), interpolate_value(arg, &scope));
        }
    }

    fn eval_output(&self, v: &OutputVertex) {
        let value = interpolate_value(&v.output.value, &self.scope(&v.module, None));
        if v.module.is_root() && self.operation == WalkOperation::Apply {
            self.state.set_output(
                v.output.name.clone(),
                OutputValue {
                    value: value.clone(),
                    sensitive: v.output.sensitive,
                },
            );
        }
        self.named
            .insert((v.module.clone(), format!("output.{}", v.output.name)), value);
    }

    async fn plan_resource(&self, v: &ResourceVertex) -> Result<(), EvalError> {
        let provider_addr = v.config.provider_addr(&v.addr.module);
        let provider = self.provider_for(&provider_addr)?;
        let mut diags = Diagnostics::new();

        for key in v.config.instance_keys() {
            let addr = v.addr.instance(key.clone());
            let config = interpolate_attributes(&v.config.config, &self.scope(&v.addr.module, key.as_ref()));
            let prior = self.state.get(&addr).map(|s| s.attributes);
            let response = match provider
                .plan(PlanRequest {
                    address: addr.clone(),
                    prior: prior.clone(),
                    config,
                })
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    diags.push(Diagnostic::error(e.to_string()).with_address(&addr));
                    continue;
                }
            };

            let planned = response.planned_state;
            let mut change = match prior {
                None => Change::create(addr.clone(), planned.clone()),
                Some(prior) if prior == planned => Change::no_op(addr.clone(), Some(prior)),
                Some(prior) if response.requires_replace => {
                    let order = replace_order(
                        Some(&v.config.lifecycle),
                        provider.as_ref(),
                        &v.addr.resource_type,
                        ReplaceOrder::default(),
                    );
                    Change::replace(addr.clone(), prior, planned.clone(), order)
                }
                Some(prior) => Change::update(addr.clone(), prior, planned.clone()),
            };
            if change.action.destroys() && v.config.lifecycle.prevent_destroy {
                diags.push(prevent_destroy(&addr));
                continue;
            }
            change.provider = Some(provider_addr.local_name());
            self.planned_values.insert(addr.clone(), planned);
            self.planned.insert(addr, change);
        }

        if diags.has_errors() {
            Err(EvalError::Diagnostics(diags))
        } else {
            Ok(())
        }
    }

    fn plan_orphan(&self, v: &OrphanVertex) {
        let mut change = Change::delete(v.addr.clone(), v.state.attributes.clone());
        change.provider = Some(v.provider.local_name());
        self.planned.insert(v.addr.clone(), change);
    }

    async fn apply_change(&self, v: &DiffResourceVertex) -> Result<(), EvalError> {
        let provider = self.provider_for(&v.provider)?;
        let mut change = v.change.clone();
        let addr = change.address.clone();

        // Values unknown at plan time are taken from configuration evaluated now.
        if let Some(after) = change.after.as_mut() {
            let scope = self.scope(addr.module(), addr.key.as_ref());
            let fresh = v
                .config
                .as_ref()
                .map(|c| interpolate_attributes(&c.config, &scope));
            for (key, value) in after.iter_mut() {
                if !has_unknowns(value) {
                    continue;
                }
                *value = match fresh.as_ref().and_then(|f| f.get(key)) {
                    Some(current) => current.clone(),
                    None => interpolate_value(value, &scope),
                };
            }
        }

        let lifecycle = v.config.as_ref().map(|c| &c.lifecycle);
        if change.action.destroys() && lifecycle.is_some_and(|l| l.prevent_destroy) {
            return Err(EvalError::Diagnostics(prevent_destroy(&addr).into()));
        }
        if change.action == Action::Replace {
            change.replace_order = replace_order(
                lifecycle,
                provider.as_ref(),
                &addr.resource.resource_type,
                change.replace_order,
            );
        }

        Reconciler::new(provider.as_ref(), &self.state)
            .with_provider_name(v.provider.local_name())
            .apply(&change)
            .await?;
        tracing::debug!(address = %addr, action = change.action.as_str(), "change applied");
        self.applied.insert(addr, change.action);
        Ok(())
    }

    async fn apply_moves(&self, v: &MovedVertex) {
        for (from, to) in &v.moves {
            let _guards = self.state.lock_all(&[from, to]).await;
            if self.state.contains(to) {
                if self.state.contains(from) {
                    tracing::warn!(%from, %to, "move target already exists, leaving both objects in place");
                }
                continue;
            }
            if let Some(object) = self.state.remove(from) {
                tracing::info!(%from, %to, "moving resource instance");
                self.state.put(to.clone(), object);
            }
        }
    }
}

#[async_trait]
impl GraphWalker for ContextGraphWalker {
    fn operation(&self) -> &'static str {
        self.operation.as_str()
    }

    async fn evaluate(&self, vertex: &Vertex) -> Result<(), EvalError> {
        match (vertex, self.operation) {
            (Vertex::ConfigProvider(v), _) => self.eval_provider(v).await,
            (Vertex::ConfigVariable(v), _) => self.eval_variable(v),
            (Vertex::ConfigModuleCall(v), _) => {
                self.eval_module_call(v);
                Ok(())
            }
            (Vertex::ConfigOutput(v), _) => {
                self.eval_output(v);
                Ok(())
            }
            (Vertex::ConfigResource(v), WalkOperation::Plan) => self.plan_resource(v).await,
            (Vertex::OrphanResource(v), WalkOperation::Plan) => {
                self.plan_orphan(v);
                Ok(())
            }
            (Vertex::DiffResource(v), WalkOperation::Apply) => self.apply_change(v).await,
            (Vertex::MovedResourceExecutor(v), _) => {
                self.apply_moves(v).await;
                Ok(())
            }
            // Placeholders: configuration without changes during apply, and
            // vertex kinds that only carry work in the other operation.
            (Vertex::ConfigResource(_), _)
            | (Vertex::OrphanResource(_), _)
            | (Vertex::DiffResource(_), _)
            | (Vertex::RootAggregator, _) => Ok(()),
        }
    }
}

struct Scope<'a> {
    ctx: &'a ContextGraphWalker,
    module: &'a ModulePath,
    key: Option<&'a InstanceKey>,
}

impl Lookup for Scope<'_> {
    fn lookup(&self, reference: &Reference) -> Option<JsonValue> {
        match reference {
            Reference::Variable { name } => self
                .ctx
                .named
                .get(&(self.module.clone(), format!("var.{name}")))
                .map(|v| v.value().clone()),
            Reference::ModuleOutput { module, output } => self
                .ctx
                .named
                .get(&(self.module.child(module), format!("output.{output}")))
                .map(|v| v.value().clone()),
            Reference::Resource {
                resource_type,
                name,
                key,
                ..
            } => self.ctx.resource_value(
                &ResourceAddr::new(self.module.clone(), resource_type, name),
                key.as_ref(),
            ),
            Reference::ModuleCall { .. } => None,
            Reference::Contextual(path) => match (path.as_str(), self.key) {
                ("count.index", Some(InstanceKey::Int(i))) => Some(JsonValue::from(*i)),
                ("each.key" | "each.value", Some(InstanceKey::Str(s))) => {
                    Some(JsonValue::String(s.clone()))
                }
                ("path.module", _) => Some(JsonValue::String(self.module.to_string())),
                _ => None,
            },
        }
    }
}

fn attributes_value(attrs: Attributes) -> JsonValue {
    JsonValue::Object(attrs.into_iter().collect())
}

fn prevent_destroy(addr: &InstanceAddr) -> Diagnostic {
    Diagnostic::error("Instance cannot be destroyed")
        .with_detail("lifecycle.prevent_destroy is set; remove it to allow this plan")
        .with_address(addr)
}
