//! The DSL surface visible to definition expressions.
//!
//! [`GqlHost`] installs a single `gql` global. `gql.<schema>(cb)` invokes
//! `cb` with the element factories:
//!
//! ```text
//! gql.default(({ fragment, model, query, mutation, subscription }) => ...)
//! ```
//!
//! * `fragment.User(...)` / `model.User(...)` build fragments and models
//!   for the named type.
//! * `query.slice(...)` builds a slice of that operation type.
//! * `query.operation({ name, variables })` builds a named operation.

use std::rc::Rc;

use indexmap::IndexMap;

use super::element::{
    FragmentPrebuild, ModelPrebuild, OperationPrebuild, OperationType, RuntimeElement,
    SlicePrebuild,
};
use super::error::RuntimeError;
use super::issues::IssueRegistry;
use super::value::{HostObject, Invoker, Value};

/// Supplies the global bindings definition expressions run against.
pub trait DslHost {
    fn globals(&self, issues: &IssueRegistry) -> IndexMap<String, Value>;
}

/// The default host: the `gql` composer.
#[derive(Debug, Clone, Default)]
pub struct GqlHost {
    /// Accepted schema names; `None` accepts any.
    schemas: Option<Vec<String>>,
}

impl GqlHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas<I, S>(schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GqlHost {
            schemas: Some(schemas.into_iter().map(Into::into).collect()),
        }
    }
}

impl DslHost for GqlHost {
    fn globals(&self, issues: &IssueRegistry) -> IndexMap<String, Value> {
        let mut globals = IndexMap::new();
        globals.insert(
            "gql".to_string(),
            Value::host(GqlRoot {
                schemas: self.schemas.clone(),
                issues: issues.clone(),
            }),
        );
        globals
    }
}

#[derive(Debug)]
struct GqlRoot {
    schemas: Option<Vec<String>>,
    issues: IssueRegistry,
}

impl HostObject for GqlRoot {
    fn type_name(&self) -> &str {
        "gql"
    }

    fn get(&self, property: &str) -> Result<Value, RuntimeError> {
        if let Some(schemas) = &self.schemas {
            if !schemas.iter().any(|s| s == property) {
                return Err(RuntimeError::dsl(format!("unknown schema '{property}'")));
            }
        }
        Ok(Value::host(SchemaComposer {
            schema: property.to_string(),
            issues: self.issues.clone(),
        }))
    }
}

#[derive(Debug)]
struct SchemaComposer {
    schema: String,
    issues: IssueRegistry,
}

impl HostObject for SchemaComposer {
    fn type_name(&self) -> &str {
        "gql composer"
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: Vec<Value>, invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
        let Some(callback) = args.into_iter().next().filter(Value::is_callable) else {
            return Err(RuntimeError::dsl(format!(
                "gql.{} expects a composer callback",
                self.schema
            )));
        };
        let mut helpers = IndexMap::new();
        helpers.insert(
            "fragment".to_string(),
            Value::host(TypeFactory {
                kind: TypeElement::Fragment,
            }),
        );
        helpers.insert(
            "model".to_string(),
            Value::host(TypeFactory {
                kind: TypeElement::Model,
            }),
        );
        for operation_type in [
            OperationType::Query,
            OperationType::Mutation,
            OperationType::Subscription,
        ] {
            helpers.insert(
                operation_type.as_str().to_string(),
                Value::host(OperationFactory {
                    operation_type,
                    issues: self.issues.clone(),
                }),
            );
        }
        invoker.invoke(&callback, vec![Value::object(helpers)])
    }
}

#[derive(Debug, Clone, Copy)]
enum TypeElement {
    Fragment,
    Model,
}

/// `fragment` / `model`: any property names a type.
#[derive(Debug)]
struct TypeFactory {
    kind: TypeElement,
}

impl HostObject for TypeFactory {
    fn type_name(&self) -> &str {
        match self.kind {
            TypeElement::Fragment => "fragment",
            TypeElement::Model => "model",
        }
    }

    fn get(&self, property: &str) -> Result<Value, RuntimeError> {
        Ok(Value::host(ElementBuilder::Type {
            kind: self.kind,
            typename: property.to_string(),
        }))
    }
}

#[derive(Debug)]
struct OperationFactory {
    operation_type: OperationType,
    issues: IssueRegistry,
}

impl HostObject for OperationFactory {
    fn type_name(&self) -> &str {
        self.operation_type.as_str()
    }

    fn get(&self, property: &str) -> Result<Value, RuntimeError> {
        Ok(match property {
            "slice" => Value::host(ElementBuilder::Slice {
                operation_type: self.operation_type,
            }),
            "operation" => Value::host(ElementBuilder::Operation {
                operation_type: self.operation_type,
                issues: self.issues.clone(),
            }),
            _ => Value::Undefined,
        })
    }
}

#[derive(Debug)]
enum ElementBuilder {
    Type {
        kind: TypeElement,
        typename: String,
    },
    Slice {
        operation_type: OperationType,
    },
    Operation {
        operation_type: OperationType,
        issues: IssueRegistry,
    },
}

impl HostObject for ElementBuilder {
    fn type_name(&self) -> &str {
        match self {
            ElementBuilder::Type { .. } => "element builder",
            ElementBuilder::Slice { .. } => "slice builder",
            ElementBuilder::Operation { .. } => "operation builder",
        }
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: Vec<Value>, _invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
        let element = match self {
            ElementBuilder::Type {
                kind: TypeElement::Fragment,
                typename,
            } => RuntimeElement::Fragment(FragmentPrebuild {
                typename: typename.clone(),
            }),
            ElementBuilder::Type {
                kind: TypeElement::Model,
                typename,
            } => RuntimeElement::Model(ModelPrebuild {
                typename: typename.clone(),
            }),
            ElementBuilder::Slice { operation_type } => RuntimeElement::Slice(SlicePrebuild {
                operation_type: *operation_type,
            }),
            ElementBuilder::Operation {
                operation_type,
                issues,
            } => {
                let options = args.first().cloned().unwrap_or_default();
                let operation = operation_prebuild(*operation_type, &options)?;
                issues.record_operation(&operation.operation_name);
                RuntimeElement::Operation(operation)
            }
        };
        Ok(Value::Element(Rc::new(element)))
    }
}

fn operation_prebuild(
    operation_type: OperationType,
    options: &Value,
) -> Result<OperationPrebuild, RuntimeError> {
    let Value::Object(options) = options else {
        return Err(RuntimeError::dsl(format!(
            "{}.operation expects an options object",
            operation_type.as_str()
        )));
    };
    let operation_name = match options.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(RuntimeError::dsl(format!(
                "{}.operation requires a non-empty string `name`",
                operation_type.as_str()
            )))
        }
    };
    let variable_names = match options.get("variables") {
        None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
        Some(Value::Object(variables)) => variables.keys().cloned().collect(),
        Some(Value::Array(variables)) => variables
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    RuntimeError::dsl("operation variables must be strings".to_string())
                })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(RuntimeError::dsl(
                "operation variables must be an object or an array of names".to_string(),
            ))
        }
    };
    Ok(OperationPrebuild {
        operation_name,
        operation_type,
        variable_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::element::ElementKind;
    use crate::runtime::interp::{Interpreter, InterpreterConfig};
    use crate::runtime::value::Env;
    use tessera_core::syntax::parse_expression;

    fn run(host: &GqlHost, src: &str) -> (Result<Value, RuntimeError>, IssueRegistry) {
        let issues = IssueRegistry::new();
        let env = Env::root();
        for (name, value) in host.globals(&issues) {
            env.define(name, value);
        }
        let expr = parse_expression(src).expect("parse failed");
        let result = Interpreter::new(InterpreterConfig::default()).eval(&expr, &env);
        (result, issues)
    }

    fn element(src: &str) -> RuntimeElement {
        let (result, _) = run(&GqlHost::new(), src);
        match result.unwrap() {
            Value::Element(element) => (*element).clone(),
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn fragment_records_typename() {
        let el = element("gql.default(({ fragment }) => fragment.User({}, () => ({})))");
        assert_eq!(
            el,
            RuntimeElement::Fragment(FragmentPrebuild {
                typename: "User".to_string()
            })
        );
    }

    #[test]
    fn model_and_slice() {
        assert_eq!(
            element("gql.default(({ model }) => model.Post({}))").kind(),
            ElementKind::Model
        );
        assert_eq!(
            element("gql.default(({ mutation }) => mutation.slice({}))"),
            RuntimeElement::Slice(SlicePrebuild {
                operation_type: OperationType::Mutation
            })
        );
    }

    #[test]
    fn operation_collects_name_and_variables() {
        let el = element(
            "gql.default(({ query }) => query.operation({ name: \"ProfilePageQuery\", variables: { userId: \"ID!\", first: \"Int\" } }))",
        );
        assert_eq!(
            el,
            RuntimeElement::Operation(OperationPrebuild {
                operation_name: "ProfilePageQuery".to_string(),
                operation_type: OperationType::Query,
                variable_names: vec!["userId".to_string(), "first".to_string()],
            })
        );
        assert_eq!(el.property("operationName").as_deref(), Some("ProfilePageQuery"));
    }

    #[test]
    fn operation_prebuild_serializes_camel_case() {
        let RuntimeElement::Operation(prebuild) = element(
            "gql.default(({ subscription }) => subscription.operation({ name: \"OnPost\", variables: { postId: \"ID!\" } }))",
        ) else {
            panic!("expected operation");
        };
        insta::assert_json_snapshot!(prebuild, @r#"
        {
          "operationName": "OnPost",
          "operationType": "subscription",
          "variableNames": [
            "postId"
          ]
        }
        "#);
    }

    #[test]
    fn operation_without_name_is_a_dsl_error() {
        let (result, _) = run(
            &GqlHost::new(),
            "gql.default(({ query }) => query.operation({}))",
        );
        assert!(matches!(result, Err(RuntimeError::Dsl { .. })));
    }

    #[test]
    fn duplicate_operation_names_become_issues() {
        let (result, issues) = run(
            &GqlHost::new(),
            "[gql.default(({ query }) => query.operation({ name: \"Q\" })), gql.default(({ subscription }) => subscription.operation({ name: \"Q\" }))]",
        );
        assert!(result.is_ok());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn unknown_schema_is_rejected_when_schemas_are_restricted() {
        let host = GqlHost::with_schemas(["admin"]);
        let (ok, _) = run(&host, "gql.admin(({ model }) => model.User())");
        assert!(ok.is_ok());
        let (err, _) = run(&host, "gql.default(({ model }) => model.User())");
        assert_eq!(
            err.unwrap_err(),
            RuntimeError::Dsl {
                message: "unknown schema 'default'".to_string()
            }
        );
    }

    #[test]
    fn composer_requires_a_callback() {
        let (result, _) = run(&GqlHost::new(), "gql.default(1)");
        assert!(matches!(result, Err(RuntimeError::Dsl { .. })));
    }
}
