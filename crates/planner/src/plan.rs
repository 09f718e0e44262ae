use serde::Serialize;
use value::{ConstValue, Name, Variables};

use crate::Request;

/// A top-level key of the merged response, in the order the operation selects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseField {
    pub key: Name,
    pub non_null: bool,
    /// Set when the gateway answers the field itself instead of forwarding it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ConstValue>,
}

/// One forwarded sub-request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchNode {
    pub service: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "variables_is_empty")]
    pub variables: Variables,
    /// The response keys this request is responsible for.
    pub fields: Vec<Name>,
}

fn variables_is_empty(variables: &Variables) -> bool {
    variables.is_empty()
}

impl FetchNode {
    pub fn to_request(&self) -> Request {
        Request {
            query: self.query.clone(),
            operation_name: self.operation_name.clone(),
            variables: self.variables.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParallelNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlanNode {
    Sequence(SequenceNode),
    Parallel(ParallelNode),
    Fetch(FetchNode),
}

impl PlanNode {
    /// Collapse sequence and parallel nodes that only wrap a single node.
    pub(crate) fn flatten(self) -> Self {
        match self {
            PlanNode::Sequence(mut node) if node.nodes.len() == 1 => node.nodes.remove(0),
            PlanNode::Parallel(mut node) if node.nodes.len() == 1 => node.nodes.remove(0),
            _ => self,
        }
    }

    /// Every fetch in this tree, in dispatch order.
    pub fn fetch_nodes(&self) -> Vec<&FetchNode> {
        fn collect<'a>(node: &'a PlanNode, nodes: &mut Vec<&'a FetchNode>) {
            match node {
                PlanNode::Sequence(SequenceNode { nodes: children }) |
                PlanNode::Parallel(ParallelNode { nodes: children }) => {
                    children.iter().for_each(|child| collect(child, nodes))
                },
                PlanNode::Fetch(fetch) => nodes.push(fetch),
            }
        }

        let mut nodes = Vec::new();
        collect(self, &mut nodes);
        nodes
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryNode {
    pub node: PlanNode,
    pub shape: Vec<ResponseField>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeNode {
    pub subscribe_nodes: Vec<FetchNode>,
    pub shape: Vec<ResponseField>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RootNode {
    Query(QueryNode),
    Subscribe(SubscribeNode),
}
