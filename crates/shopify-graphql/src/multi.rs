//! Multi-operation compiler.
//!
//! Merges several independently declared GraphQL operations into one aliased
//! request. Every generated call gets a synthetic alias `gql{N}`, its
//! variables get the same numeric suffix, and every declared output is
//! rewritten to read from the alias (or aliases) that produced it.
//!
//! ```
//! use serde_json::json;
//! use shopify_graphql::{MultiOperation, Operation, Target};
//!
//! let mut ids: Vec<Vec<String>> = Vec::new();
//! let mut multi = MultiOperation::query();
//! multi.push(
//!     Operation::new("products")
//!         .signature("first: Int, reverse: Boolean")
//!         .returns("ProductConnection { edges { node { id title } } }")
//!         .inputs([json!(3), json!(true), json!(3), json!(false)])
//!         .output(Target::nested(&mut ids), ".edges.*.node.id"),
//! );
//! let compiled = multi.compile().expect("valid operations");
//! assert!(compiled.query().contains("gql1: products(first: $first1, reverse: $reverse1)"));
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::bind::{Route, Shape, Target};
use crate::error::{BindError, CompileError};
use crate::path::PathPattern;

static ARGUMENT_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*:\s*([\w!\[\]]+)").expect("valid argument pattern"));

/// Root operation type of a combined request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    /// `query`
    #[default]
    Query,
    /// `mutation`
    Mutation,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Mutation => f.write_str("mutation"),
        }
    }
}

/// Declared operation argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Argument name.
    pub name: String,
    /// GraphQL type, passed through unchecked.
    pub ty: String,
}

/// Return shape of an operation.
///
/// With a target type the body is emitted once as a named fragment shared by
/// every call of the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    target: Option<String>,
    body: String,
}

impl Selection {
    /// Split `"Type { fields }"` into a fragment target and body.
    ///
    /// Text before the first `{` is the target type; an empty prefix means the
    /// body is inlined into each call.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.find('{') {
            Some(index) => {
                let target = text[..index].trim();
                Self {
                    target: (!target.is_empty()).then(|| target.to_string()),
                    body: text[index..].to_string(),
                }
            }
            None => Self {
                target: None,
                body: text.to_string(),
            },
        }
    }

    /// Fragment target type, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Selection body starting at `{`.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[derive(Debug)]
struct Output<'a> {
    target: Target<'a>,
    path: PathPattern,
}

/// One logical operation, possibly invoked with several input tuples.
#[derive(Debug)]
pub struct Operation<'a> {
    name: String,
    arguments: Vec<Argument>,
    selection: Option<Selection>,
    inputs: Vec<Value>,
    outputs: Vec<Output<'a>>,
    error: Option<CompileError>,
}

impl<'a> Operation<'a> {
    /// Declare an operation by field name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            selection: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            error: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn argument(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Append arguments from `"name: Type, other: Type!"` text.
    #[must_use]
    pub fn signature(mut self, signature: &str) -> Self {
        let before = self.arguments.len();
        for captures in ARGUMENT_PAIR.captures_iter(signature) {
            self.arguments.push(Argument {
                name: captures[1].to_string(),
                ty: captures[2].to_string(),
            });
        }
        if self.arguments.len() == before && !signature.trim().is_empty() {
            self.fail(CompileError::InvalidSignature {
                operation: self.name.clone(),
                signature: signature.to_string(),
            });
        }
        self
    }

    /// Set the return shape; see [`Selection::parse`].
    #[must_use]
    pub fn returns(mut self, selection: &str) -> Self {
        self.selection = Some(Selection::parse(selection));
        self
    }

    /// Append one input value.
    #[must_use]
    pub fn input(mut self, value: impl Into<Value>) -> Self {
        self.inputs.push(value.into());
        self
    }

    /// Append input values, one per argument per call, in argument order.
    #[must_use]
    pub fn inputs(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.inputs.extend(values);
        self
    }

    /// Append serializable input values.
    ///
    /// A serialization failure is reported by [`MultiOperation::compile`].
    #[must_use]
    pub fn inputs_from<T: Serialize>(mut self, values: impl IntoIterator<Item = T>) -> Self {
        for value in values {
            match serde_json::to_value(value) {
                Ok(value) => self.inputs.push(value),
                Err(err) => {
                    self.fail(CompileError::InvalidInput {
                        operation: self.name.clone(),
                        message: err.to_string(),
                    });
                    break;
                }
            }
        }
        self
    }

    /// Declare a destination relative to this operation's result.
    ///
    /// An empty path binds the whole result object.
    #[must_use]
    pub fn output(mut self, target: Target<'a>, path: impl Into<PathPattern>) -> Self {
        self.outputs.push(Output {
            target,
            path: path.into(),
        });
        self
    }

    /// Declared arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    fn fail(&mut self, error: CompileError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn multiplicity(&self) -> Result<usize, CompileError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let arguments = self.arguments.len();
        let inputs = self.inputs.len();
        if arguments == 0 {
            if inputs > 0 {
                return Err(CompileError::UnexpectedInputs {
                    operation: self.name.clone(),
                    inputs,
                });
            }
            return Ok(1);
        }
        if inputs == 0 {
            return Err(CompileError::MissingInputs {
                operation: self.name.clone(),
            });
        }
        if inputs % arguments != 0 {
            return Err(CompileError::UnevenInputs {
                operation: self.name.clone(),
                inputs,
                arguments,
            });
        }
        Ok(inputs / arguments)
    }
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("(")?;
            for (index, argument) in self.arguments.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", argument.name, argument.ty)?;
            }
            f.write_str(")")?;
        }
        if let Some(selection) = &self.selection {
            write!(f, " {}", selection.body)?;
        }
        Ok(())
    }
}

/// Ordered set of operations compiled into one request.
#[derive(Debug, Default)]
pub struct MultiOperation<'a> {
    kind: OperationKind,
    operations: Vec<Operation<'a>>,
}

impl<'a> MultiOperation<'a> {
    /// Start an empty request of the given kind.
    #[must_use]
    pub const fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            operations: Vec::new(),
        }
    }

    /// Start an empty `query`.
    #[must_use]
    pub const fn query() -> Self {
        Self::new(OperationKind::Query)
    }

    /// Start an empty `mutation`.
    #[must_use]
    pub const fn mutation() -> Self {
        Self::new(OperationKind::Mutation)
    }

    /// Append an operation.
    pub fn push(&mut self, operation: Operation<'a>) -> &mut Self {
        self.operations.push(operation);
        self
    }

    /// Number of declared operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if no operation was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Generate the combined request text, variables and routes.
    pub fn compile(self) -> Result<CompiledRequest<'a>, CompileError> {
        let mut fragments = String::new();
        let mut calls = String::new();
        let mut declarations: Vec<String> = Vec::new();
        let mut variables: Vec<(String, Value)> = Vec::new();
        let mut routes = Vec::new();
        let mut next_alias = 0_usize;
        let mut next_fragment = 0_usize;

        for operation in self.operations {
            let multiplicity = operation.multiplicity()?;
            let Operation {
                name,
                arguments,
                selection,
                inputs,
                outputs,
                ..
            } = operation;

            let body = match selection {
                Some(Selection {
                    target: Some(target),
                    body,
                }) => {
                    let fragment = format!("frag{next_fragment}");
                    next_fragment += 1;
                    fragments.push_str(&format!("fragment {fragment} on {target} {body}\n"));
                    format!("{{ ...{fragment} }}")
                }
                Some(Selection { body, .. }) => body,
                None => String::new(),
            };

            let first_alias = next_alias;
            let mut inputs = inputs.into_iter();
            for _ in 0..multiplicity {
                let alias = next_alias;
                next_alias += 1;

                let mut assignments = Vec::with_capacity(arguments.len());
                for (argument, value) in arguments.iter().zip(inputs.by_ref()) {
                    let variable = format!("{}{alias}", argument.name);
                    assignments.push(format!("{}: ${variable}", argument.name));
                    declarations.push(format!("${variable}: {}", argument.ty));
                    variables.push((variable, value));
                }

                calls.push_str(&format!("{}: {name}", alias_name(alias)));
                if !assignments.is_empty() {
                    calls.push_str(&format!("({})", assignments.join(", ")));
                }
                if !body.is_empty() {
                    calls.push(' ');
                    calls.push_str(&body);
                }
                calls.push('\n');
            }

            for Output { target, path } in outputs {
                let route = if target.shape() == Shape::Nested {
                    let paths = (first_alias..next_alias)
                        .map(|alias| path.prefixed(alias_name(alias)))
                        .collect();
                    Route::fanned(target, paths)
                } else {
                    if multiplicity > 1 {
                        warn!(
                            operation = %name,
                            multiplicity,
                            path = %path,
                            "non-nested output of a repeated operation binds only the last call"
                        );
                    }
                    Route::new(target, path.prefixed(alias_name(next_alias - 1)))
                };
                routes.push(route);
            }
        }

        let mut query = fragments;
        query.push_str(&self.kind.to_string());
        if !declarations.is_empty() {
            query.push_str(&format!("({})", declarations.join(", ")));
        }
        query.push_str(" {\n");
        query.push_str(&calls);
        query.push('}');

        debug!(
            kind = %self.kind,
            calls = next_alias,
            fragments = next_fragment,
            variables = variables.len(),
            "compiled multi-operation request"
        );

        Ok(CompiledRequest {
            query,
            variables,
            routes,
        })
    }
}

impl fmt::Display for MultiOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, operation) in self.operations.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{operation}")?;
        }
        Ok(())
    }
}

fn alias_name(index: usize) -> String {
    format!("gql{index}")
}

/// Output of [`MultiOperation::compile`].
#[derive(Debug)]
pub struct CompiledRequest<'a> {
    query: String,
    variables: Vec<(String, Value)>,
    routes: Vec<Route<'a>>,
}

impl<'a> CompiledRequest<'a> {
    /// Combined operation text.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Variables in declaration order.
    #[must_use]
    pub fn variables(&self) -> &[(String, Value)] {
        &self.variables
    }

    /// Variables as a JSON object for the request body.
    #[must_use]
    pub fn variables_map(&self) -> Map<String, Value> {
        self.variables.iter().cloned().collect()
    }

    /// Rewritten routes in output declaration order.
    #[must_use]
    pub fn routes(&self) -> &[Route<'a>] {
        &self.routes
    }

    /// Split into text, variables and routes.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<(String, Value)>, Vec<Route<'a>>) {
        (self.query, self.variables, self.routes)
    }

    /// Populate every destination from a response `data` tree.
    pub fn bind(self, data: &Value) -> Result<(), BindError> {
        crate::bind::bind_all(self.routes, data)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn route_paths(compiled: &CompiledRequest<'_>) -> Vec<Vec<String>> {
        compiled
            .routes()
            .iter()
            .map(|route| route.paths().iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn single_call_without_fragment() {
        let mut title = String::new();
        let mut multi = MultiOperation::query();
        multi.push(
            Operation::new("product")
                .argument("id", "ID!")
                .returns("{ title }")
                .input("gid://shopify/Product/1")
                .output(Target::scalar(&mut title), ".title"),
        );
        let compiled = multi.compile().expect("compile");

        assert_eq!(
            compiled.query(),
            "query($id0: ID!) {\ngql0: product(id: $id0) { title }\n}"
        );
        assert!(!compiled.query().contains("fragment"));
        assert_eq!(
            compiled.variables(),
            &[("id0".to_string(), json!("gid://shopify/Product/1"))]
        );
        assert_eq!(route_paths(&compiled), vec![vec!["gql0.title".to_string()]]);
    }

    #[test]
    fn repeated_call_shares_one_fragment() {
        let mut ids: Vec<Vec<String>> = Vec::new();
        let mut multi = MultiOperation::query();
        multi.push(
            Operation::new("products")
                .signature("first: Int, reverse: Boolean")
                .returns("ProductConnection { edges { node { id title } } }")
                .inputs([json!(3), json!(true), json!(3), json!(false)])
                .output(Target::nested(&mut ids), ".edges.*.node.id"),
        );
        let compiled = multi.compile().expect("compile");

        assert_eq!(compiled.query().matches("fragment ").count(), 1);
        assert_eq!(compiled.query().matches("{ ...frag0 }").count(), 2);
        assert!(compiled.query().contains("gql0: products(first: $first0, reverse: $reverse0)"));
        assert!(compiled.query().contains("gql1: products(first: $first1, reverse: $reverse1)"));

        let names: Vec<&str> = compiled
            .variables()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["first0", "reverse0", "first1", "reverse1"]);

        assert_eq!(
            route_paths(&compiled),
            vec![vec![
                "gql0.edges.*.node.id".to_string(),
                "gql1.edges.*.node.id".to_string(),
            ]]
        );
    }

    #[test]
    fn four_operation_request_text() {
        let mut ids: Vec<Vec<String>> = Vec::new();
        let mut titles: Vec<Vec<String>> = Vec::new();
        let mut codes: Vec<String> = Vec::new();
        let mut app: HashMap<String, String> = HashMap::new();

        let mut multi = MultiOperation::query();
        multi
            .push(
                Operation::new("products")
                    .signature("first: Int, reverse: Boolean")
                    .returns("ProductConnection { edges { node { id title } } }")
                    .inputs([json!(3), json!(true), json!(3), json!(false)])
                    .output(Target::nested(&mut ids), ".edges.*.node.id")
                    .output(Target::nested(&mut titles), ".edges.*.node.title"),
            )
            .push(
                Operation::new("codeDiscountNodes")
                    .signature("first: Int")
                    .returns(
                        "{ edges { node { codeDiscount { ...on DiscountCodeBasic { title } } } } }",
                    )
                    .input(10)
                    .output(Target::sequence(&mut codes), ".edges.*.node.codeDiscount.title"),
            )
            .push(
                Operation::new("currentAppInstallation")
                    .returns("AppInstallation { id launchUrl }")
                    .output(Target::scalar(&mut app), ""),
            );
        assert_eq!(multi.len(), 3);

        let compiled = multi.compile().expect("compile");
        assert_eq!(
            compiled.query(),
            "fragment frag0 on ProductConnection { edges { node { id title } } }\n\
             fragment frag1 on AppInstallation { id launchUrl }\n\
             query($first0: Int, $reverse0: Boolean, $first1: Int, $reverse1: Boolean, $first2: Int) {\n\
             gql0: products(first: $first0, reverse: $reverse0) { ...frag0 }\n\
             gql1: products(first: $first1, reverse: $reverse1) { ...frag0 }\n\
             gql2: codeDiscountNodes(first: $first2) { edges { node { codeDiscount { ...on DiscountCodeBasic { title } } } } }\n\
             gql3: currentAppInstallation { ...frag1 }\n\
             }"
        );
        assert_eq!(
            serde_json::to_value(compiled.variables()).expect("json"),
            json!([
                ["first0", 3],
                ["reverse0", true],
                ["first1", 3],
                ["reverse1", false],
                ["first2", 10]
            ])
        );
        assert_eq!(
            route_paths(&compiled),
            vec![
                vec!["gql0.edges.*.node.id".to_string(), "gql1.edges.*.node.id".to_string()],
                vec![
                    "gql0.edges.*.node.title".to_string(),
                    "gql1.edges.*.node.title".to_string()
                ],
                vec!["gql2.edges.*.node.codeDiscount.title".to_string()],
                vec!["gql3".to_string()],
            ]
        );

        let data = json!({
            "gql0": {"edges": [{"node": {"id": "p1", "title": "One"}}]},
            "gql1": {"edges": [{"node": {"id": "p9", "title": "Nine"}}, {"node": {"id": "p8", "title": "Eight"}}]},
            "gql2": {"edges": [{"node": {"codeDiscount": {"title": "SPRING"}}}, {"node": {"codeDiscount": {}}}]},
            "gql3": {"id": "gid://shopify/AppInstallation/1", "launchUrl": "https://example.com"},
        });
        compiled.bind(&data).expect("bind");
        assert_eq!(ids, vec![vec!["p1".to_string()], vec!["p9".to_string(), "p8".to_string()]]);
        assert_eq!(titles[1], vec!["Nine".to_string(), "Eight".to_string()]);
        assert_eq!(codes, vec!["SPRING".to_string(), String::new()]);
        assert_eq!(app.get("launchUrl").map(String::as_str), Some("https://example.com"));
    }

    #[test]
    fn flat_output_of_repeated_call_reads_last_alias() {
        let mut codes: Vec<String> = Vec::new();
        let mut multi = MultiOperation::query();
        multi.push(
            Operation::new("codeDiscountNodeByCode")
                .signature("code: String!")
                .returns("{ id }")
                .inputs_from(["SPRING", "SUMMER", "FALL"])
                .output(Target::sequence(&mut codes), ".id"),
        );
        let compiled = multi.compile().expect("compile");
        assert_eq!(route_paths(&compiled), vec![vec!["gql2.id".to_string()]]);
    }

    #[test]
    fn aliases_continue_across_operations() {
        let mut multi = MultiOperation::query();
        multi
            .push(
                Operation::new("product")
                    .argument("id", "ID!")
                    .returns("{ title }")
                    .inputs([json!("a"), json!("b")]),
            )
            .push(
                Operation::new("collection")
                    .argument("id", "ID!")
                    .returns("{ title }")
                    .input("c"),
            );
        let compiled = multi.compile().expect("compile");
        assert!(compiled.routes().is_empty());
        assert_eq!(
            compiled.query(),
            "query($id0: ID!, $id1: ID!, $id2: ID!) {\n\
             gql0: product(id: $id0) { title }\n\
             gql1: product(id: $id1) { title }\n\
             gql2: collection(id: $id2) { title }\n\
             }"
        );
        let map = compiled.variables_map();
        assert_eq!(map.get("id2"), Some(&json!("c")));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn operation_without_arguments_or_selection() {
        let mut multi = MultiOperation::mutation();
        multi.push(Operation::new("appSubscriptionCancel"));
        let compiled = multi.compile().expect("compile");
        assert_eq!(compiled.query(), "mutation {\ngql0: appSubscriptionCancel\n}");
        assert!(compiled.variables().is_empty());
    }

    #[test]
    fn uneven_inputs_are_rejected() {
        let mut multi = MultiOperation::query();
        multi.push(
            Operation::new("products")
                .signature("first: Int, reverse: Boolean")
                .inputs([json!(3), json!(true), json!(3)]),
        );
        let err = multi.compile().expect_err("three inputs for two arguments");
        assert_eq!(
            err,
            CompileError::UnevenInputs {
                operation: "products".into(),
                inputs: 3,
                arguments: 2,
            }
        );
    }

    #[test]
    fn missing_and_unexpected_inputs_are_rejected() {
        let mut multi = MultiOperation::query();
        multi.push(Operation::new("products").signature("first: Int"));
        assert!(matches!(
            multi.compile(),
            Err(CompileError::MissingInputs { .. })
        ));

        let mut multi = MultiOperation::query();
        multi.push(Operation::new("shop").input(1));
        assert!(matches!(
            multi.compile(),
            Err(CompileError::UnexpectedInputs { inputs: 1, .. })
        ));
    }

    #[test]
    fn signature_accepts_list_types() {
        let operation = Operation::new("nodes").signature("ids: [ID!]!, first:Int");
        assert_eq!(
            operation.arguments(),
            &[
                Argument {
                    name: "ids".into(),
                    ty: "[ID!]!".into(),
                },
                Argument {
                    name: "first".into(),
                    ty: "Int".into(),
                },
            ]
        );
        assert_eq!(operation.to_string(), "nodes(ids: [ID!]!, first: Int)");
    }

    #[test]
    fn unparseable_signature_is_reported_at_compile() {
        let mut multi = MultiOperation::query();
        multi.push(Operation::new("nodes").signature("ids"));
        assert!(matches!(
            multi.compile(),
            Err(CompileError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn unserializable_input_is_reported_at_compile() {
        let grid: HashMap<(u8, u8), &str> = HashMap::from([((1, 2), "x")]);
        let mut multi = MultiOperation::query();
        multi.push(
            Operation::new("metafields")
                .signature("filter: JSON")
                .inputs_from([grid]),
        );
        match multi.compile() {
            Err(CompileError::InvalidInput { operation, message }) => {
                assert_eq!(operation, "metafields");
                assert!(message.contains("key must be a string"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn selection_splits_target_type() {
        let selection = Selection::parse("AppInstallation { id }");
        assert_eq!(selection.target(), Some("AppInstallation"));
        assert_eq!(selection.body(), "{ id }");

        let inline = Selection::parse("{ id }");
        assert_eq!(inline.target(), None);
        assert_eq!(inline.body(), "{ id }");
    }

    #[test]
    fn display_lists_operations() {
        let mut multi = MultiOperation::query();
        multi
            .push(
                Operation::new("products")
                    .signature("first: Int")
                    .returns("ProductConnection { edges { node { id } } }"),
            )
            .push(Operation::new("shop").returns("{ name }"));
        assert_eq!(
            multi.to_string(),
            "products(first: Int) { edges { node { id } } }\nshop { name }"
        );
    }
}
