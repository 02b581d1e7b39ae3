use crate::Result;
use crate::graph::{Declaration, Graph, LogicalId, Output, Parameter};

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

const FORMAT_VERSION: &str = "2010-09-09";

/// Render the declared graph as a provisioning-engine template (JSON).
///
/// Resources keep declaration order so the file reads top-down in build order;
/// the engine itself only relies on the references.
pub fn render_template(graph: &Graph, description: &str) -> Result<String> {
    let template = Template {
        version: FORMAT_VERSION,
        description,
        parameters: Entries(graph.parameters()),
        resources: Resources(graph.declarations()),
        outputs: Entries(graph.outputs()),
    };
    let mut text = serde_json::to_string_pretty(&template)?;
    text.push('\n');
    Ok(text)
}

#[derive(Serialize)]
struct Template<'a> {
    #[serde(rename = "AWSTemplateFormatVersion")]
    version: &'static str,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Parameters", skip_serializing_if = "Entries::is_empty")]
    parameters: Entries<'a, Parameter>,
    #[serde(rename = "Resources")]
    resources: Resources<'a>,
    #[serde(rename = "Outputs", skip_serializing_if = "Entries::is_empty")]
    outputs: Entries<'a, Output>,
}

/// Id-keyed entries serialized as a JSON object in their original order.
struct Entries<'a, T>(&'a [(LogicalId, T)]);

impl<T> Entries<'_, T> {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Serialize> Serialize for Entries<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, entry) in self.0 {
            map.serialize_entry(id, entry)?;
        }
        map.end()
    }
}

struct Resources<'a>(&'a [Declaration]);

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceBody<'a> {
    #[serde(rename = "Type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "no_dependencies")]
    depends_on: &'a [LogicalId],
    properties: &'a serde_json::Value,
}

fn no_dependencies(deps: &&[LogicalId]) -> bool {
    deps.is_empty()
}

impl Serialize for Resources<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for decl in self.0 {
            map.serialize_entry(
                &decl.id,
                &ResourceBody {
                    kind: decl.kind,
                    depends_on: &decl.depends_on,
                    properties: &decl.properties,
                },
            )?;
        }
        map.end()
    }
}
