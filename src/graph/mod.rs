//! Declared resource graph.
//!
//! The graph is an ordered list of declarations. A declaration may only refer
//! to template parameters, pseudo parameters, or declarations that came before
//! it, so the declaration order is always a valid build order and the graph is
//! acyclic by construction. `validate` re-checks both properties on the whole
//! graph before anything is rendered.
//!
//! Components never build references by hand: `declare` returns a
//! [`ResourceRef`], and only a `ResourceRef` can produce `Ref`/`Fn::GetAtt`
//! values. Holding a handle is proof the target was declared first.

pub mod dag;
pub mod refs;

pub use refs::{join, pseudo};

use crate::error::BuildError;

use serde::Serialize;
use serde_json::{Value, json};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Result<Self, BuildError> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BuildError::InvalidLogicalId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LogicalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a declared resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    id: LogicalId,
    kind: &'static str,
}

impl ResourceRef {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// `{"Ref": id}`: the resource's primary identifier (instance id, vpc id, ...).
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.id })
    }

    pub fn attr(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.id, attribute] })
    }
}

/// Handle to a template parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRef {
    id: LogicalId,
}

impl ParamRef {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn reference(&self) -> Value {
        json!({ "Ref": self.id })
    }
}

/// Deploy-time input, e.g. an image id resolved from the external catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub description: String,
    pub value: Value,
}

/// A resource about to be declared.
#[derive(Debug, Clone)]
pub struct Decl {
    id: String,
    kind: &'static str,
    name: Option<String>,
    properties: Value,
    depends_on: Vec<LogicalId>,
}

impl Decl {
    pub fn new(id: impl Into<String>, kind: &'static str) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            properties: json!({}),
            depends_on: Vec::new(),
        }
    }

    /// Physical name carried by this resource; must be unique in the graph.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    /// Ordering-only dependency (no value flows between the two).
    pub fn depends_on(mut self, target: &ResourceRef) -> Self {
        self.depends_on.push(target.id.clone());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub id: LogicalId,
    pub kind: &'static str,
    pub name: Option<String>,
    pub properties: Value,
    pub depends_on: Vec<LogicalId>,
}

impl Declaration {
    /// Ids this declaration mentions, pseudo parameters excluded.
    fn mentions(&self) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = refs::collect_refs(&self.properties)
            .into_iter()
            .filter(|id| !refs::is_pseudo(id))
            .collect();
        ids.extend(self.depends_on.iter().map(|d| d.0.clone()));
        ids
    }
}

#[derive(Debug, Default)]
pub struct Graph {
    parameters: Vec<(LogicalId, Parameter)>,
    declarations: Vec<Declaration>,
    index: BTreeMap<LogicalId, usize>,
    names: BTreeMap<String, LogicalId>,
    outputs: Vec<(LogicalId, Output)>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declarations in construction order.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn parameters(&self) -> &[(LogicalId, Parameter)] {
        &self.parameters
    }

    pub fn outputs(&self) -> &[(LogicalId, Output)] {
        &self.outputs
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.id.as_str() == id)
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.declarations.iter().filter(|d| d.kind == kind).count()
    }

    fn is_parameter(&self, id: &str) -> bool {
        self.parameters.iter().any(|(p, _)| p.as_str() == id)
    }

    fn is_declared(&self, id: &str) -> bool {
        self.declarations.iter().any(|d| d.id.as_str() == id)
    }

    pub fn add_parameter(&mut self, id: &str, parameter: Parameter) -> Result<ParamRef, BuildError> {
        let id = LogicalId::new(id)?;
        if self.is_parameter(id.as_str()) || self.is_declared(id.as_str()) {
            return Err(BuildError::DuplicateLogicalId(id.0));
        }
        tracing::debug!(id = %id, kind = %parameter.kind, "parameter");
        self.parameters.push((id.clone(), parameter));
        Ok(ParamRef { id })
    }

    /// Append a declaration. Fails if the id or name is taken, or if the
    /// declaration mentions anything not declared before it.
    pub fn declare(&mut self, decl: Decl) -> Result<ResourceRef, BuildError> {
        let id = LogicalId::new(decl.id)?;
        if self.index.contains_key(&id) || self.is_parameter(id.as_str()) {
            return Err(BuildError::DuplicateLogicalId(id.0));
        }
        if let Some(name) = &decl.name {
            if let Some(first) = self.names.get(name) {
                return Err(BuildError::DuplicateResourceName {
                    name: name.clone(),
                    first: first.to_string(),
                    second: id.to_string(),
                });
            }
        }

        let declaration = Declaration {
            id: id.clone(),
            kind: decl.kind,
            name: decl.name,
            properties: decl.properties,
            depends_on: decl.depends_on,
        };
        for target in declaration.mentions() {
            if !self.index.contains_key(target.as_str()) && !self.is_parameter(&target) {
                return Err(BuildError::UnresolvedReference {
                    from: id.to_string(),
                    to: target,
                });
            }
        }

        tracing::debug!(id = %id, kind = decl.kind, "declared");
        if let Some(name) = &declaration.name {
            self.names.insert(name.clone(), id.clone());
        }
        self.index.insert(id.clone(), self.declarations.len());
        self.declarations.push(declaration);
        Ok(ResourceRef {
            id,
            kind: decl.kind,
        })
    }

    pub fn add_output(
        &mut self,
        id: &str,
        description: impl Into<String>,
        value: Value,
    ) -> Result<(), BuildError> {
        let id = LogicalId::new(id)?;
        if self.outputs.iter().any(|(o, _)| *o == id) {
            return Err(BuildError::DuplicateLogicalId(id.0));
        }
        for target in refs::collect_refs(&value) {
            if !refs::is_pseudo(&target) && !self.is_declared(&target) && !self.is_parameter(&target) {
                return Err(BuildError::UnresolvedReference {
                    from: format!("output {}", id),
                    to: target,
                });
            }
        }
        self.outputs.push((
            id,
            Output {
                description: description.into(),
                value,
            },
        ));
        Ok(())
    }

    /// Confirm `target` is declared in this graph with the expected type.
    pub fn require(
        &self,
        from: &str,
        target: &ResourceRef,
        expected: &'static str,
    ) -> Result<(), BuildError> {
        let Some(&pos) = self.index.get(&target.id) else {
            return Err(BuildError::UnresolvedReference {
                from: from.to_string(),
                to: target.id.to_string(),
            });
        };
        let actual = self.declarations[pos].kind;
        if actual != expected {
            return Err(BuildError::UnexpectedResourceType {
                id: target.id.to_string(),
                actual: actual.to_string(),
                expected,
            });
        }
        Ok(())
    }

    /// Resources `decl` depends on (parameters excluded), sorted by id.
    pub fn dependencies(&self, decl: &Declaration) -> Vec<LogicalId> {
        decl.mentions()
            .into_iter()
            .filter(|id| !self.is_parameter(id))
            .filter_map(|id| LogicalId::new(id).ok())
            .collect()
    }

    /// Whole-graph check:
    /// 1) every dependency is declared strictly earlier,
    /// 2) the dependency edges contain no cycle.
    pub fn validate(&self) -> Result<(), BuildError> {
        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (pos, decl) in self.declarations.iter().enumerate() {
            let deps = self.dependencies(decl);
            for dep in &deps {
                match self.index.get(dep) {
                    Some(&dep_pos) if dep_pos < pos => {}
                    _ => {
                        return Err(BuildError::UnresolvedReference {
                            from: decl.id.to_string(),
                            to: dep.to_string(),
                        });
                    }
                }
            }
            edges.insert(
                decl.id.to_string(),
                deps.into_iter().map(|d| d.0).collect(),
            );
        }
        dag::check_acyclic(&edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn declare_returns_usable_handles() {
        let mut graph = Graph::new();
        let vpc = graph.declare(Decl::new("Vpc", "AWS::EC2::VPC")).unwrap();
        assert_eq!(vpc.reference(), json!({ "Ref": "Vpc" }));
        assert_eq!(vpc.attr("CidrBlock"), json!({ "Fn::GetAtt": ["Vpc", "CidrBlock"] }));

        let subnet = graph
            .declare(
                Decl::new("Subnet", "AWS::EC2::Subnet")
                    .properties(json!({ "VpcId": vpc.reference(), "Region": pseudo("Region") })),
            )
            .unwrap();
        assert_eq!(graph.len(), 2);
        let deps = graph.dependencies(graph.get(subnet.id().as_str()).unwrap());
        assert_eq!(deps, vec![vpc.id().clone()]);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn forward_reference_is_rejected_and_nothing_is_added() {
        let mut graph = Graph::new();
        let err = graph
            .declare(
                Decl::new("Subnet", "AWS::EC2::Subnet")
                    .properties(json!({ "VpcId": { "Ref": "Vpc" } })),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnresolvedReference { ref from, ref to } if from == "Subnet" && to == "Vpc"
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut graph = Graph::new();
        let err = graph
            .declare(Decl::new("Sg", "AWS::EC2::SecurityGroup").properties(
                json!({ "SourceSecurityGroupId": { "Fn::GetAtt": ["Sg", "GroupId"] } }),
            ))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedReference { .. }));
    }

    #[test]
    fn duplicate_ids_and_names_are_rejected() {
        let mut graph = Graph::new();
        graph
            .declare(Decl::new("A", "AWS::IAM::Role").name("shared"))
            .unwrap();
        assert!(matches!(
            graph.declare(Decl::new("A", "AWS::IAM::Role")),
            Err(BuildError::DuplicateLogicalId(id)) if id == "A"
        ));
        assert!(matches!(
            graph.declare(Decl::new("B", "AWS::IAM::Role").name("shared")),
            Err(BuildError::DuplicateResourceName { first, second, .. }) if first == "A" && second == "B"
        ));
        assert!(matches!(
            graph.declare(Decl::new("bad-id", "AWS::IAM::Role")),
            Err(BuildError::InvalidLogicalId(_))
        ));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn parameters_are_resolvable_and_share_the_id_space() {
        let mut graph = Graph::new();
        let image = graph
            .add_parameter(
                "ImageId",
                Parameter {
                    kind: "AWS::EC2::Image::Id".into(),
                    description: "image".into(),
                    default: None,
                },
            )
            .unwrap();
        let inst = graph
            .declare(
                Decl::new("Instance", "AWS::EC2::Instance")
                    .properties(json!({ "ImageId": image.reference() })),
            )
            .unwrap();
        assert!(graph.dependencies(graph.get("Instance").unwrap()).is_empty());
        assert!(matches!(
            graph.declare(Decl::new("ImageId", "AWS::EC2::Instance")),
            Err(BuildError::DuplicateLogicalId(_))
        ));
        graph.add_output("InstanceId", "id", inst.reference()).unwrap();
        assert!(matches!(
            graph.add_output("Missing", "x", json!({ "Ref": "Nope" })),
            Err(BuildError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn require_checks_membership_and_type() {
        let mut other = Graph::new();
        let foreign = other.declare(Decl::new("Relay", "AWS::EC2::Instance")).unwrap();

        let mut graph = Graph::new();
        assert!(matches!(
            graph.require("Schedule", &foreign, "AWS::EC2::Instance"),
            Err(BuildError::UnresolvedReference { .. })
        ));
        let sg = graph.declare(Decl::new("Relay", "AWS::EC2::SecurityGroup")).unwrap();
        assert!(matches!(
            graph.require("Schedule", &sg, "AWS::EC2::Instance"),
            Err(BuildError::UnexpectedResourceType { .. })
        ));
        assert!(graph.require("Schedule", &sg, "AWS::EC2::SecurityGroup").is_ok());
    }
}
