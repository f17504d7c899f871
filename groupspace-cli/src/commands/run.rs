use crate::scenario::{resolve_path, ExprSpec, Scenario, Step};
use anyhow::{anyhow, bail, Context, Result};
use groupspace_core::{
    AllowList, Namespace, NamespaceConfig, NodeHandle, NodeId, NodeRef, ReturnCode,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Remote node used by `join` steps that do not name one
const LOCAL_NODE: &str = "local";

#[derive(Debug, Serialize)]
pub struct EvaluationRecord {
    pub step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub expr: String,
    pub node: String,
    pub groups: Vec<String>,
}

/// What the executor does with `dump` steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Text,
    Quiet,
}

/// Executes scenario steps against one namespace
struct Executor {
    namespace: Namespace,
    community: String,
    handles: HashMap<String, NodeHandle>,
    /// Every group joined so far, kept after `leave` so it can still be deactivated
    nodes: HashMap<String, NodeRef>,
    records: Vec<EvaluationRecord>,
    output: Output,
}

impl Executor {
    fn new(scenario: &Scenario, config: NamespaceConfig, output: Output) -> Self {
        Self {
            namespace: Namespace::with_config(config),
            community: scenario.community.clone(),
            handles: HashMap::new(),
            nodes: HashMap::new(),
            records: Vec::new(),
            output,
        }
    }

    fn handle(&self, label: &str) -> Result<&NodeHandle> {
        self.handles
            .get(label)
            .ok_or_else(|| anyhow!("No group joined under label '{}'", label))
    }

    fn node(&self, label: &str) -> Result<&NodeRef> {
        self.nodes
            .get(label)
            .ok_or_else(|| anyhow!("No group joined under label '{}'", label))
    }

    fn execute(&mut self, index: usize, step: &Step) -> Result<()> {
        match step {
            Step::Join {
                label,
                path,
                community,
                node,
                reserved,
                distributed,
                allow,
                expect_error,
            } => {
                if self.handles.contains_key(label) {
                    bail!("Label '{}' is already in use", label);
                }
                let path = resolve_path(community.as_deref().unwrap_or(&self.community), path)?;
                let remote = NodeId::new(node.as_deref().unwrap_or(LOCAL_NODE));

                let mut options = self.namespace.join_options().reserved(*reserved);
                if let Some(distributed) = distributed {
                    options = options.distributed(*distributed);
                }
                if let Some(allow) = allow {
                    let gatekeeper = AllowList::new(allow.iter().map(|n| NodeId::new(n.as_str())));
                    options = options.gatekeeper(Arc::new(gatekeeper));
                }

                let result = self.namespace.join(&path, &remote, &options);
                match (expect_error, result) {
                    (None, Ok(handle)) => {
                        debug!(%label, group = %path, "joined");
                        self.nodes.insert(label.clone(), handle.node());
                        self.handles.insert(label.clone(), handle);
                    }
                    (None, Err(e)) => {
                        return Err(e).with_context(|| format!("Failed to join {}", path));
                    }
                    (Some(expected), Ok(_)) => {
                        bail!("Joining {} succeeded, expected '{}'", path, expected);
                    }
                    (Some(expected), Err(e)) => {
                        let code = code_name(e.return_code());
                        if code != expected.as_str() {
                            bail!("Joining {} failed with '{}', expected '{}'", path, code, expected);
                        }
                        debug!(%label, group = %path, %code, "join refused as expected");
                    }
                }
            }
            Step::Leave { label } => {
                let handle = self
                    .handles
                    .remove(label)
                    .ok_or_else(|| anyhow!("No group joined under label '{}'", label))?;
                self.namespace.leave(handle);
            }
            Step::Activate { label, node, count } => {
                let handle = self.handle(label)?;
                self.namespace
                    .set_active_by(handle, &NodeId::new(node.as_str()), *count);
            }
            Step::Deactivate { label, node, count } => {
                let group = self.node(label)?;
                let remote = NodeId::new(node.as_str());
                let current = group.activation(&remote);
                if current < *count {
                    bail!(
                        "Cannot deactivate {} {} time(s) for {}: only {} activation(s)",
                        group.path(),
                        count,
                        remote,
                        current
                    );
                }
                self.namespace.deactivate_node(group, &remote, *count);
            }
            Step::Evaluate { expr, node, name } => {
                let groups = self.evaluate(expr, node)?;
                let record = EvaluationRecord {
                    step: index,
                    name: name.clone(),
                    expr: expr.build(&self.community)?.to_string(),
                    node: node.clone(),
                    groups,
                };
                if self.output == Output::Text {
                    let title = record.name.as_deref().unwrap_or(&record.expr);
                    if record.groups.is_empty() {
                        println!("{} @ {}: (none)", title, record.node);
                    } else {
                        println!("{} @ {}: {}", title, record.node, record.groups.join(", "));
                    }
                }
                self.records.push(record);
            }
            Step::Expect { expr, node, groups } => {
                let got: BTreeSet<String> = self.evaluate(expr, node)?.into_iter().collect();
                let want = groups
                    .iter()
                    .map(|g| resolve_path(&self.community, g).map(|p| p.to_string()))
                    .collect::<Result<BTreeSet<String>>>()?;
                if got != want {
                    bail!(
                        "Expectation at step {} failed for {}: got [{}], expected [{}]",
                        index,
                        node,
                        got.into_iter().collect::<Vec<_>>().join(", "),
                        want.into_iter().collect::<Vec<_>>().join(", ")
                    );
                }
            }
            Step::Dump => {
                if self.output == Output::Text {
                    print!("{}", self.namespace.dump());
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, spec: &ExprSpec, node: &str) -> Result<Vec<String>> {
        let expr = spec.build(&self.community)?;
        let nodes = self.namespace.evaluate(&expr, &NodeId::new(node));
        Ok(nodes.iter().map(describe).collect())
    }

    fn run(&mut self, scenario: &Scenario) -> Result<()> {
        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute(index, step)
                .with_context(|| format!("Step {} failed", index))?;
        }
        Ok(())
    }

    fn finish(self) -> Vec<EvaluationRecord> {
        self.records
    }
}

fn describe(node: &NodeRef) -> String {
    node.path().to_string()
}

fn code_name(code: ReturnCode) -> &'static str {
    match code {
        ReturnCode::Success => "success",
        ReturnCode::InvalidName => "invalid_name",
        ReturnCode::Reserved => "reserved",
        ReturnCode::AccessDenied => "access_denied",
    }
}

fn load(scenario_path: &Path, config_path: Option<&Path>) -> Result<(Scenario, NamespaceConfig)> {
    let scenario = Scenario::from_file(scenario_path)?;
    let config = match config_path {
        Some(path) => NamespaceConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => scenario.config.clone(),
    };
    Ok((scenario, config))
}

pub fn run_scenario(scenario_path: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let (scenario, config) = load(scenario_path, config_path)?;
    let output = if json { Output::Quiet } else { Output::Text };

    let mut executor = Executor::new(&scenario, config, output);
    let outcome = executor.run(&scenario);
    let records = executor.finish();
    outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Ok(())
}

pub fn print_tree(scenario_path: &Path, config_path: Option<&Path>) -> Result<()> {
    let (scenario, config) = load(scenario_path, config_path)?;

    let mut executor = Executor::new(&scenario, config, Output::Quiet);
    let outcome = executor.run(&scenario);
    let tree = executor.namespace.dump();
    executor.finish();
    outcome?;

    print!("{}", tree);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execute(yaml: &str) -> Result<Vec<EvaluationRecord>> {
        let scenario = Scenario::from_yaml_str(yaml)?;
        let mut executor = Executor::new(&scenario, scenario.config.clone(), Output::Quiet);
        let outcome = executor.run(&scenario);
        let records = executor.finish();
        outcome.map(|_| records)
    }

    #[test]
    fn test_evaluation_records() {
        let records = execute(
            r#"
community: C
steps:
  - { op: join, label: a, path: A }
  - { op: join, label: ab, path: A/B }
  - { op: activate, label: ab, node: K1 }
  - op: evaluate
    node: K1
    name: subtree
    expr: { kind: group, path: A, subtree: true }
  - op: evaluate
    node: K1
    expr: { kind: group, path: A }
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].groups, vec!["C:/A/B/"]);
        assert_eq!(records[0].name.as_deref(), Some("subtree"));
        assert!(records[1].groups.is_empty());
        assert_eq!(records[1].expr, "Group(C:/A/)");
    }

    #[test]
    fn test_expected_join_error() {
        let records = execute(
            r#"
community: C
steps:
  - { op: join, label: r, path: R, reserved: true }
  - { op: join, label: r2, path: R, expect_error: reserved }
  - { op: join, label: g, path: G, allow: [K1], node: K2, expect_error: access_denied }
"#,
        );
        assert!(records.is_ok());
    }

    #[test]
    fn test_failed_expectation_is_error() {
        let err = execute(
            r#"
community: C
steps:
  - { op: join, label: a, path: A }
  - { op: activate, label: a, node: K1 }
  - op: expect
    node: K1
    expr: { kind: universe }
    groups: []
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("Expectation at step 2 failed"));
    }

    #[test]
    fn test_leave_before_deactivate() {
        let records = execute(
            r#"
community: C
steps:
  - { op: join, label: a, path: A }
  - { op: activate, label: a, node: K1 }
  - { op: leave, label: a }
  - op: expect
    node: K1
    expr: { kind: group, path: A }
    groups: [A]
  - { op: deactivate, label: a, node: K1 }
  - op: expect
    node: K1
    expr: { kind: universe }
    groups: []
  - op: evaluate
    node: K1
    expr: { kind: group, path: A }
"#,
        )
        .unwrap();
        assert!(records[0].groups.is_empty());
    }

    #[test]
    fn test_active_handles_outlive_the_run() {
        let records = execute(
            r#"
steps:
  - { op: join, label: a, path: A/B }
  - { op: activate, label: a, node: K1 }
  - op: evaluate
    node: K1
    expr: { kind: universe }
"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].groups.len(), 1);
    }

    #[test]
    fn test_over_deactivation_is_refused() {
        let err = execute(
            r#"
steps:
  - { op: join, label: a, path: A }
  - { op: activate, label: a, node: K1 }
  - { op: deactivate, label: a, node: K1, count: 2 }
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("only 1 activation(s)"));
    }

    #[test]
    fn test_unknown_label() {
        let err = execute("steps:\n  - { op: leave, label: nope }\n").unwrap_err();
        assert!(format!("{:#}", err).contains("No group joined under label 'nope'"));
    }
}
