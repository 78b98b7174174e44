use std::collections::BTreeSet;

use strata_core::{
    Action, ApplyGraphBuilder, Attributes, Change, Config, Diff, InstanceAddr, PlanGraphBuilder,
    ResourceInstanceState, State, Vertex,
};

fn config(yaml: &str) -> Config {
    serde_yaml::from_str(yaml).unwrap()
}

fn addr(s: &str) -> InstanceAddr {
    s.parse().unwrap()
}

fn deps(graph: &strata_core::Graph, name: &str) -> Vec<String> {
    let id = graph.find(name).unwrap_or_else(|| panic!("missing vertex {name}"));
    let mut out: Vec<String> = graph
        .edges_from(id)
        .into_iter()
        .map(|d| graph.name_of(d))
        .collect();
    out.sort();
    out
}

#[test]
fn single_resource_graph_has_resource_provider_and_root() {
    let cfg = config(
        r#"
providers:
  - name: aws
    config:
      region: us-east-1
resources:
  - type: aws_instance
    name: web
    config:
      ami: ami-123
"#,
    );
    let state = State::new();
    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();

    assert_eq!(graph.len(), 3);
    assert_eq!(deps(&graph, "aws_instance.web"), vec!["provider.aws"]);
    assert!(deps(&graph, "provider.aws").is_empty());
    assert_eq!(deps(&graph, "root"), vec!["aws_instance.web"]);
    assert_eq!(
        graph.to_string(),
        "aws_instance.web\n  provider.aws\nprovider.aws\nroot\n  aws_instance.web\n"
    );
}

#[test]
fn references_become_edges_and_drive_order() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
  - type: null_resource
    name: b
    config:
      trigger: "${null_resource.a.id}"
  - type: null_resource
    name: c
    depends_on: [null_resource.b]
"#,
    );
    let state = State::new();
    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();

    assert_eq!(deps(&graph, "null_resource.b"), vec!["null_resource.a", "provider.null"]);
    assert_eq!(deps(&graph, "null_resource.c"), vec!["null_resource.b", "provider.null"]);
    assert_eq!(deps(&graph, "root"), vec!["null_resource.c"]);

    let order: Vec<String> = graph
        .topological_order()
        .unwrap()
        .into_iter()
        .map(|id| graph.name_of(id))
        .collect();
    assert_eq!(
        order,
        vec!["provider.null", "null_resource.a", "null_resource.b", "null_resource.c", "root"]
    );
}

#[test]
fn module_outputs_and_variables_resolve_across_scopes() {
    let cfg = config(
        r#"
variables:
  - name: base
    default: 10.0.0.0/8
providers:
  - name: aws
modules:
  - name: net
    args:
      cidr: "${var.base}"
    module:
      variables:
        - name: cidr
      resources:
        - type: aws_vpc
          name: main
          config:
            cidr_block: "${var.cidr}"
      outputs:
        - name: vpc_id
          value: "${aws_vpc.main.id}"
resources:
  - type: aws_subnet
    name: a
    config:
      vpc_id: "${module.net.output.vpc_id}"
"#,
    );
    let state = State::new();
    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();

    assert_eq!(deps(&graph, "module.net"), vec!["var.base"]);
    assert_eq!(deps(&graph, "module.net.var.cidr"), vec!["module.net"]);
    assert_eq!(
        deps(&graph, "module.net.aws_vpc.main"),
        vec!["module.net.var.cidr", "provider.aws"]
    );
    assert_eq!(deps(&graph, "module.net.output.vpc_id"), vec!["module.net.aws_vpc.main"]);
    assert_eq!(
        deps(&graph, "aws_subnet.a"),
        vec!["module.net.output.vpc_id", "provider.aws"]
    );
}

#[test]
fn same_name_in_child_module_does_not_leak_into_root() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
modules:
  - name: child
    module:
      resources:
        - type: null_resource
          name: a
        - type: null_resource
          name: b
          depends_on: [null_resource.a]
"#,
    );
    let state = State::new();
    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();
    assert_eq!(
        deps(&graph, "module.child.null_resource.b"),
        vec!["module.child.null_resource.a", "provider.null"]
    );
}

#[test]
fn missing_references_are_reported_together() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
    config:
      x: "${null_resource.nope.id}"
  - type: null_resource
    name: b
    config:
      y: "${var.undeclared}"
"#,
    );
    let state = State::new();
    let err = PlanGraphBuilder::new(&cfg, &state).build().unwrap_err();

    assert_eq!(err.diagnostics.error_count(), 2);
    let addrs: BTreeSet<_> = err
        .diagnostics
        .iter()
        .filter_map(|d| d.address.clone())
        .collect();
    assert_eq!(
        addrs,
        BTreeSet::from(["null_resource.a".to_string(), "null_resource.b".to_string()])
    );
}

#[test]
fn reference_cycle_aborts_build() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
    depends_on: [null_resource.b]
  - type: null_resource
    name: b
    depends_on: [null_resource.a]
"#,
    );
    let state = State::new();
    let err = PlanGraphBuilder::new(&cfg, &state).build().unwrap_err();
    let detail = err.diagnostics.iter().find_map(|d| d.detail.clone()).unwrap();
    assert!(detail.contains("cycle"), "{detail}");
    assert!(detail.contains("null_resource.a") && detail.contains("null_resource.b"));
}

#[test]
fn duplicate_declarations_are_rejected() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
  - type: null_resource
    name: a
"#,
    );
    let state = State::new();
    let err = PlanGraphBuilder::new(&cfg, &state).build().unwrap_err();
    assert!(err.diagnostics.iter().any(|d| d.summary == "Duplicate declaration"));
}

#[test]
fn unsupported_provider_type_is_a_configuration_error() {
    let cfg = config(
        r#"
resources:
  - type: aws_instance
    name: web
  - type: null_resource
    name: ok
"#,
    );
    let state = State::new();
    let err = PlanGraphBuilder::new(&cfg, &state)
        .with_providers(BTreeSet::from(["null".to_string()]))
        .build()
        .unwrap_err();
    assert!(err
        .diagnostics
        .iter()
        .any(|d| d.summary == "Unsupported provider" && d.address.as_deref() == Some("aws_instance.web")));
}

#[test]
fn explicitly_configured_unsupported_provider_is_a_configuration_error() {
    let cfg = config(
        r#"
providers:
  - name: aws
    config:
      region: us-east-1
resources:
  - type: null_resource
    name: ok
"#,
    );
    let state = State::new();
    let err = PlanGraphBuilder::new(&cfg, &state)
        .with_providers(BTreeSet::from(["null".to_string()]))
        .build()
        .unwrap_err();
    let unsupported: Vec<_> = err
        .diagnostics
        .iter()
        .filter(|d| d.summary == "Unsupported provider")
        .collect();
    assert_eq!(unsupported.len(), 1);
    assert_eq!(unsupported[0].address.as_deref(), Some("provider.aws"));
}

#[test]
fn aliased_provider_in_parent_module_serves_child() {
    let cfg = config(
        r#"
providers:
  - name: aws
    alias: west
modules:
  - name: app
    module:
      resources:
        - type: aws_instance
          name: web
          provider: aws.west
"#,
    );
    let state = State::new();
    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();
    assert_eq!(deps(&graph, "module.app.aws_instance.web"), vec!["provider.aws.west"]);
}

#[test]
fn orphaned_state_instances_get_vertices() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: kept
    count: 1
"#,
    );
    let mut state = State::new();
    state.insert(addr("null_resource.kept[0]"), ResourceInstanceState::new(Attributes::new()));
    state.insert(addr("null_resource.kept[1]"), ResourceInstanceState::new(Attributes::new()));
    state.insert(addr("null_resource.gone"), ResourceInstanceState::new(Attributes::new()));

    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();
    let orphans: BTreeSet<String> = graph
        .vertices()
        .filter(|(_, v)| matches!(v, Vertex::OrphanResource(_)))
        .map(|(_, v)| v.name())
        .collect();
    assert_eq!(
        orphans,
        BTreeSet::from([
            "null_resource.gone (orphan)".to_string(),
            "null_resource.kept[1] (orphan)".to_string(),
        ])
    );
    assert_eq!(deps(&graph, "null_resource.gone (orphan)"), vec!["provider.null"]);
}

#[test]
fn apply_graph_has_one_vertex_per_changed_instance() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: c
    count: 2
  - type: null_resource
    name: d
    config:
      peer: "${null_resource.c[1].id}"
  - type: null_resource
    name: untouched
"#,
    );
    let diff: Diff = [
        Change::create(addr("null_resource.c[0]"), Attributes::new()),
        Change::create(addr("null_resource.c[1]"), Attributes::new()),
        Change::create(addr("null_resource.d"), Attributes::new()),
        Change::delete(addr("null_resource.old"), Attributes::new()),
    ]
    .into_iter()
    .collect();

    let graph = ApplyGraphBuilder::new(&cfg, &diff).build().unwrap();

    let diff_vertices: BTreeSet<String> = graph
        .vertices()
        .filter(|(_, v)| matches!(v, Vertex::DiffResource(_)))
        .map(|(_, v)| v.name())
        .collect();
    assert_eq!(
        diff_vertices,
        BTreeSet::from([
            "null_resource.c[0]".to_string(),
            "null_resource.c[1]".to_string(),
            "null_resource.d".to_string(),
            "null_resource.old".to_string(),
        ])
    );
    assert_eq!(deps(&graph, "null_resource.d"), vec!["null_resource.c[1]", "provider.null"]);
    assert!(matches!(
        graph.find("null_resource.untouched").and_then(|id| graph.vertex(id)),
        Some(Vertex::ConfigResource(_))
    ));
    let old = graph.find("null_resource.old").unwrap();
    match graph.vertex(old) {
        Some(Vertex::DiffResource(v)) => {
            assert_eq!(v.change.action, Action::Delete);
            assert!(v.config.is_none());
        }
        other => panic!("unexpected vertex {other:?}"),
    }
}

#[test]
fn dot_output_lists_every_edge() {
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
"#,
    );
    let state = State::new();
    let graph = PlanGraphBuilder::new(&cfg, &state).build().unwrap();
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph strata {"));
    assert!(dot.contains("\"null_resource.a\" -> \"provider.null\";"));
    assert!(dot.contains("\"root\" -> \"null_resource.a\";"));
}
