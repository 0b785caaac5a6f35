//! Runtime elements produced by the `gql` composer and their prebuild data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentPrebuild {
    pub typename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrebuild {
    pub typename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlicePrebuild {
    pub operation_type: OperationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPrebuild {
    pub operation_name: String,
    pub operation_type: OperationType,
    pub variable_names: Vec<String>,
}

/// The artifact categories, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Model,
    Slice,
    Operation,
    Fragment,
}

impl ElementKind {
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Model,
        ElementKind::Slice,
        ElementKind::Operation,
        ElementKind::Fragment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Model => "model",
            ElementKind::Slice => "slice",
            ElementKind::Operation => "operation",
            ElementKind::Fragment => "fragment",
        }
    }

    /// Name of the export bucket this kind is collected into.
    pub fn bucket(self) -> &'static str {
        match self {
            ElementKind::Model => "models",
            ElementKind::Slice => "slices",
            ElementKind::Operation => "operations",
            ElementKind::Fragment => "fragments",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeElement {
    Model(ModelPrebuild),
    Slice(SlicePrebuild),
    Operation(OperationPrebuild),
    Fragment(FragmentPrebuild),
}

impl RuntimeElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            RuntimeElement::Model(_) => ElementKind::Model,
            RuntimeElement::Slice(_) => ElementKind::Slice,
            RuntimeElement::Operation(_) => ElementKind::Operation,
            RuntimeElement::Fragment(_) => ElementKind::Fragment,
        }
    }

    /// Properties readable from evaluated code.
    pub fn property(&self, name: &str) -> Option<String> {
        match (self, name) {
            (RuntimeElement::Model(m), "typename") => Some(m.typename.clone()),
            (RuntimeElement::Fragment(f), "typename") => Some(f.typename.clone()),
            (RuntimeElement::Slice(s), "operationType") => Some(s.operation_type.as_str().into()),
            (RuntimeElement::Operation(o), "operationType") => {
                Some(o.operation_type.as_str().into())
            }
            (RuntimeElement::Operation(o), "operationName") => Some(o.operation_name.clone()),
            _ => None,
        }
    }
}
