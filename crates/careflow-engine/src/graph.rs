//! Workflow document model and a read-only adjacency index over it.

use std::collections::HashMap;
use std::path::Path;

use careflow_types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A workflow document as produced by the editor or an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub workflow_type: WorkflowType,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    Clinical,
    #[default]
    Data,
    Integration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// A workflow node. Serialized flat; on input, fields nested under a `data`
/// object (the editor's canvas export) are lifted to the top level, where a
/// top-level field of the same name wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowNode {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl<'de> Deserialize<'de> for WorkflowNode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FlatNode {
            id: String,
            #[serde(default)]
            label: String,
            #[serde(default)]
            description: Option<String>,
            #[serde(flatten)]
            kind: NodeKind,
        }

        let mut value = serde_json::Value::deserialize(deserializer)?;
        if let serde_json::Value::Object(map) = &mut value {
            if let Some(serde_json::Value::Object(data)) = map.remove("data") {
                for (key, field) in data {
                    map.entry(key).or_insert(field);
                }
            }
        }
        let flat: FlatNode = serde_json::from_value(value).map_err(serde::de::Error::custom)?;
        Ok(WorkflowNode {
            id: flat.id,
            label: flat.label,
            description: flat.description,
            kind: flat.kind,
        })
    }
}

/// Node kinds with their kind-specific payload, tagged by `"type"`.
///
/// Legacy type names from older editor exports are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Start,
    End,
    #[serde(alias = "condition", alias = "trueFalse")]
    Decision {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
    Branch {
        #[serde(default)]
        branches: Vec<String>,
    },
    LogicTree {
        #[serde(default)]
        operator: LogicOperator,
        #[serde(default)]
        conditions: Vec<String>,
    },
    #[serde(alias = "customForm", alias = "formField")]
    FormInput {
        #[serde(default)]
        fields: Vec<String>,
    },
    EmitData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    #[serde(alias = "action")]
    TakeAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    SubFlow {
        #[serde(rename = "flowId", default, skip_serializing_if = "Option::is_none")]
        flow_id: Option<String>,
    },
    Narrative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl NodeKind {
    /// The serialized type tag.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Decision { .. } => "decision",
            NodeKind::Branch { .. } => "branch",
            NodeKind::LogicTree { .. } => "logicTree",
            NodeKind::FormInput { .. } => "formInput",
            NodeKind::EmitData { .. } => "emitData",
            NodeKind::TakeAction { .. } => "takeAction",
            NodeKind::SubFlow { .. } => "subFlow",
            NodeKind::Narrative => "narrative",
        }
    }

    /// Nodes that route on a true/false/unknown outcome.
    pub fn is_ternary(&self) -> bool {
        matches!(self, NodeKind::Decision { .. } | NodeKind::LogicTree { .. })
    }

    /// Nodes whose successor depends on the supplied outcome.
    pub fn is_branching(&self) -> bool {
        self.is_ternary() || matches!(self, NodeKind::Branch { .. })
    }

    pub fn is_condition_bearing(&self) -> bool {
        self.is_ternary()
    }

    pub fn is_action_bearing(&self) -> bool {
        matches!(self, NodeKind::TakeAction { .. })
    }

    /// Condition expressions carried by the node, as opaque text.
    pub fn conditions(&self) -> Vec<&str> {
        match self {
            NodeKind::Decision {
                condition: Some(c),
            } => vec![c.as_str()],
            NodeKind::LogicTree { conditions, .. } => {
                conditions.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The action identifier of a `TakeAction` node.
    pub fn action(&self) -> Option<&str> {
        match self {
            NodeKind::TakeAction { action } => action.as_deref(),
            _ => None,
        }
    }

    /// Declared branch names of a `Branch` node.
    pub fn branches(&self) -> &[String] {
        match self {
            NodeKind::Branch { branches } => branches,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// `true`/`false` for ternary nodes, a branch name for branch nodes.
    #[serde(default, alias = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Workflow {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a workflow document from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let workflow = Self::from_json(&data)?;
        tracing::debug!(path = %path.display(), nodes = workflow.nodes.len(), "Workflow loaded");
        Ok(workflow)
    }

    /// Serialize this workflow to pretty JSON and write it to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn is_clinical(&self) -> bool {
        self.workflow_type == WorkflowType::Clinical
    }

    /// Build the adjacency index used by validation and linearization.
    pub fn graph(&self) -> WorkflowGraph<'_> {
        WorkflowGraph::new(self)
    }
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// Borrowed index over a [`Workflow`].
///
/// When node ids repeat, lookups resolve to the first declaration. Outgoing
/// edges keep their declaration order.
#[derive(Debug, Clone)]
pub struct WorkflowGraph<'a> {
    workflow: &'a Workflow,
    nodes: HashMap<&'a str, &'a WorkflowNode>,
    outgoing: HashMap<&'a str, Vec<&'a WorkflowEdge>>,
    incoming: HashMap<&'a str, usize>,
}

impl<'a> WorkflowGraph<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        let mut nodes = HashMap::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
        }

        let mut outgoing: HashMap<&str, Vec<&WorkflowEdge>> = HashMap::new();
        let mut incoming: HashMap<&str, usize> = HashMap::new();
        for edge in &workflow.edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
            *incoming.entry(edge.target.as_str()).or_default() += 1;
        }

        Self {
            workflow,
            nodes,
            outgoing,
            incoming,
        }
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    pub fn node(&self, id: &str) -> Option<&'a WorkflowNode> {
        self.nodes.get(id).copied()
    }

    pub fn outgoing_edges(&self, node_id: &str) -> &[&'a WorkflowEdge] {
        self.outgoing
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn incoming_count(&self, node_id: &str) -> usize {
        self.incoming.get(node_id).copied().unwrap_or(0)
    }

    /// All nodes in declaration order, duplicates included.
    pub fn all_nodes(&self) -> impl Iterator<Item = &'a WorkflowNode> {
        self.workflow.nodes.iter()
    }

    pub fn all_edges(&self) -> &'a [WorkflowEdge] {
        &self.workflow.edges
    }

    pub fn start_nodes(&self) -> impl Iterator<Item = &'a WorkflowNode> {
        self.all_nodes()
            .filter(|n| matches!(n.kind, NodeKind::Start))
    }

    /// The first `Start` node in declaration order.
    pub fn start_node(&self) -> Option<&'a WorkflowNode> {
        self.start_nodes().next()
    }

    pub fn end_nodes(&self) -> impl Iterator<Item = &'a WorkflowNode> {
        self.all_nodes().filter(|n| matches!(n.kind, NodeKind::End))
    }
}
