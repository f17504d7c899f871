//! Scenario files: a namespace configuration plus a list of steps.

use anyhow::{bail, Context, Result};
use groupspace_core::{algebra, GroupExpr, GroupPath, MultiGroup, NamespaceConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Community used when a path does not name one
    #[serde(default = "default_community")]
    pub community: String,

    #[serde(default)]
    pub config: NamespaceConfig,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_community() -> String {
    "default".to_string()
}

fn one() -> usize {
    1
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Join {
        label: String,
        path: String,
        #[serde(default)]
        community: Option<String>,
        #[serde(default)]
        node: Option<String>,
        #[serde(default)]
        reserved: bool,
        #[serde(default)]
        distributed: Option<bool>,
        /// Attach a gatekeeper admitting only these remote nodes
        #[serde(default)]
        allow: Option<Vec<String>>,
        /// Expected failure code instead of a handle
        #[serde(default)]
        expect_error: Option<String>,
    },
    Leave {
        label: String,
    },
    Activate {
        label: String,
        node: String,
        #[serde(default = "one")]
        count: usize,
    },
    Deactivate {
        label: String,
        node: String,
        #[serde(default = "one")]
        count: usize,
    },
    Evaluate {
        expr: ExprSpec,
        node: String,
        #[serde(default)]
        name: Option<String>,
    },
    Expect {
        expr: ExprSpec,
        node: String,
        groups: Vec<String>,
    },
    Dump,
}

/// Expression as written in a scenario
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprSpec {
    Group {
        path: String,
        #[serde(default)]
        community: Option<String>,
        #[serde(default)]
        subtree: bool,
    },
    Universe,
    Union {
        of: Vec<ExprSpec>,
    },
    Intersect {
        of: Vec<ExprSpec>,
    },
    Xor {
        of: Vec<ExprSpec>,
    },
    Minus {
        left: Box<ExprSpec>,
        right: Box<ExprSpec>,
    },
    Multi {
        #[serde(default)]
        include: Vec<ExprSpec>,
        #[serde(default)]
        exclude: Vec<ExprSpec>,
    },
}

impl ExprSpec {
    /// Build the expression, resolving bare paths in `community`
    pub fn build(&self, community: &str) -> Result<GroupExpr> {
        Ok(match self {
            ExprSpec::Group {
                path,
                community: explicit,
                subtree,
            } => {
                let path = resolve_path(explicit.as_deref().unwrap_or(community), path)?;
                if *subtree {
                    GroupExpr::subtree(path)
                } else {
                    GroupExpr::group(path)
                }
            }
            ExprSpec::Universe => GroupExpr::Universe,
            ExprSpec::Union { of } => fold(of, community, algebra::union)?,
            ExprSpec::Intersect { of } => fold(of, community, algebra::intersect)?,
            ExprSpec::Xor { of } => fold(of, community, algebra::symmetric_difference)?,
            ExprSpec::Minus { left, right } => {
                algebra::minus(&left.build(community)?, &right.build(community)?)
            }
            ExprSpec::Multi { include, exclude } => {
                let mut multi = MultiGroup::new();
                for spec in include {
                    multi.add(spec.build(community)?);
                }
                for spec in exclude {
                    multi.add_excluded(spec.build(community)?);
                }
                multi.into()
            }
        })
    }
}

fn fold(
    specs: &[ExprSpec],
    community: &str,
    op: fn(&GroupExpr, &GroupExpr) -> GroupExpr,
) -> Result<GroupExpr> {
    let mut iter = specs.iter();
    let Some(first) = iter.next() else {
        bail!("operator needs at least one operand");
    };
    let mut acc = first.build(community)?;
    for spec in iter {
        acc = op(&acc, &spec.build(community)?);
    }
    Ok(acc)
}

/// Parse `path`, or `community:path` when the community is spelled out
pub fn resolve_path(community: &str, path: &str) -> Result<GroupPath> {
    let (community, path) = match path.split_once(':') {
        Some((explicit, rest)) => (explicit, rest),
        None => (community, path),
    };
    GroupPath::parse(community, path).with_context(|| format!("Invalid group path '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_yaml_str(
            r#"
community: C
config:
  memoize: false
steps:
  - op: join
    label: ab
    path: A/B
  - op: activate
    label: ab
    node: K1
  - op: evaluate
    node: K1
    expr:
      kind: minus
      left: { kind: group, path: A, subtree: true }
      right: { kind: group, path: A/C }
  - op: dump
"#,
        )
        .unwrap();

        assert_eq!(scenario.community, "C");
        assert!(!scenario.config.memoize);
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(scenario.steps[1], Step::Activate { count: 1, .. }));
    }

    #[test]
    fn test_build_expression() {
        let spec: ExprSpec = serde_yaml::from_str(
            r#"
kind: multi
include:
  - { kind: group, path: A, subtree: true }
exclude:
  - { kind: group, path: A/B }
"#,
        )
        .unwrap();

        let expr = spec.build("C").unwrap();
        assert_eq!(
            expr.to_string(),
            "MultiGroup[GroupAndSubGroups(C:/A/), Forbidden Group(C:/A/B/)]"
        );
    }

    #[test]
    fn test_resolve_explicit_community() {
        let path = resolve_path("C", "other:/x/y").unwrap();
        assert_eq!(path.to_string(), "other:/x/y/");
        assert!(resolve_path("C", "a;b").is_err());
    }

    #[test]
    fn test_empty_operator_is_error() {
        let spec = ExprSpec::Union { of: Vec::new() };
        assert!(spec.build("C").is_err());
    }
}
