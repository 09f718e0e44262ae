use parser::types::OperationType;
use pretty_assertions::assert_eq;
use stitchgate_planner::{print_document, PartitionPolicy, PlanBuilder, PlanError, PlanNode, RootNode};
use stitchgate_schema::ComposedSchema;
use value::{ConstValue, Name, Variables};

const FIELDS: &str = r#"
    type Query {
        fieldA: Int!
        fieldB: Int!
        field3: Int!
    }
"#;

fn single_upstream() -> ComposedSchema {
    ComposedSchema::remote("fields", parser::parse_schema(FIELDS).unwrap()).unwrap()
}

fn plan(schema: &ComposedSchema, query: &str, policy: PartitionPolicy) -> Result<RootNode, PlanError> {
    PlanBuilder::new(schema, parser::parse_query(query).unwrap())
        .policy(policy)
        .plan()
}

fn fetch_queries(root: &RootNode) -> Vec<(String, String)> {
    match root {
        RootNode::Query(query) => query
            .node
            .fetch_nodes()
            .into_iter()
            .map(|fetch| (fetch.service.clone(), fetch.query.clone()))
            .collect(),
        RootNode::Subscribe(subscribe) => subscribe
            .subscribe_nodes
            .iter()
            .map(|fetch| (fetch.service.clone(), fetch.query.clone()))
            .collect(),
    }
}

#[test]
fn coalesce_forwards_the_whole_operation_once() {
    let schema = single_upstream();
    let query = "query {\n  fieldA\n  fieldB\n  field3\n}\n";
    let root = plan(&schema, query, PartitionPolicy::Coalesce).unwrap();

    let expected = print_document(&parser::parse_query(query).unwrap());
    assert_eq!(fetch_queries(&root), vec![("fields".to_string(), expected)]);
    match root {
        RootNode::Query(query) => {
            assert!(matches!(query.node, PlanNode::Fetch(_)));
            assert_eq!(
                query.shape.iter().map(|field| field.key.as_str()).collect::<Vec<_>>(),
                vec!["fieldA", "fieldB", "field3"]
            );
        },
        RootNode::Subscribe(_) => panic!("expected a query plan"),
    }
}

#[test]
fn split_forwards_one_request_per_field() {
    let schema = single_upstream();
    let root = plan(&schema, "query { fieldA fieldB field3 }", PartitionPolicy::Split).unwrap();

    assert_eq!(fetch_queries(&root), vec![
        ("fields".to_string(), "{\n  fieldA\n}\n".to_string()),
        ("fields".to_string(), "{\n  fieldB\n}\n".to_string()),
        ("fields".to_string(), "{\n  field3\n}\n".to_string()),
    ]);
    match root {
        RootNode::Query(query) => assert!(matches!(query.node, PlanNode::Parallel(_))),
        RootNode::Subscribe(_) => panic!("expected a query plan"),
    }
}

#[test]
fn planning_is_deterministic() {
    let schema = single_upstream();
    for policy in [PartitionPolicy::Coalesce, PartitionPolicy::Split] {
        let first = plan(&schema, "{ b: fieldB fieldA }", policy).unwrap();
        let second = plan(&schema, "{ b: fieldB fieldA }", policy).unwrap();
        assert_eq!(fetch_queries(&first), fetch_queries(&second));
    }
}

#[test]
fn every_root_field_is_owned_by_exactly_one_fetch() {
    let schema = single_upstream();
    for policy in [PartitionPolicy::Coalesce, PartitionPolicy::Split] {
        let root = plan(&schema, "{ fieldA x: fieldA fieldB fieldA field3 }", policy).unwrap();
        let RootNode::Query(query) = root else {
            panic!("expected a query plan");
        };

        let mut owned: Vec<&str> = query
            .node
            .fetch_nodes()
            .into_iter()
            .flat_map(|fetch| fetch.fields.iter().map(|name| name.as_str()))
            .collect();
        owned.sort_unstable();
        assert_eq!(owned, vec!["field3", "fieldA", "fieldB", "x"]);
    }
}

#[test]
fn empty_operation() {
    let schema = single_upstream();
    let variables: Variables = serde_json::from_str(r#"{"skip": true}"#).unwrap();
    let err = PlanBuilder::new(
        &schema,
        parser::parse_query(
            "query ($skip: Boolean!) { ...Fields @skip(if: $skip) ... @include(if: false) { fieldB } } fragment Fields on Query { fieldA }",
        )
        .unwrap(),
    )
    .variables(variables)
    .plan()
    .unwrap_err();

    assert_eq!(err, PlanError::EmptyOperation);
}

#[test]
fn typename_is_answered_locally() {
    let schema = single_upstream();
    let root = plan(&schema, "{ __typename }", PartitionPolicy::Coalesce).unwrap();
    let RootNode::Query(query) = root else {
        panic!("expected a query plan");
    };

    assert!(query.node.fetch_nodes().is_empty());
    assert_eq!(query.shape.len(), 1);
    assert_eq!(query.shape[0].value, Some(ConstValue::String("Query".to_string())));
}

#[test]
fn unresolvable_fields() {
    let schema = single_upstream();

    assert_eq!(
        plan(&schema, "{ fieldA missing }", PartitionPolicy::Coalesce).unwrap_err(),
        PlanError::UnresolvableField {
            type_name: "Query".to_string(),
            field_name: "missing".to_string(),
        }
    );
    assert_eq!(
        plan(&schema, "{ __schema { types { name } } }", PartitionPolicy::Split).unwrap_err(),
        PlanError::UnresolvableField {
            type_name: "Query".to_string(),
            field_name: "__schema".to_string(),
        }
    );
}

#[test]
fn missing_fragment() {
    let schema = single_upstream();
    assert_eq!(
        plan(&schema, "{ ...Fields }", PartitionPolicy::Coalesce).unwrap_err(),
        PlanError::UnknownFragment("Fields".to_string())
    );
}

#[test]
fn operation_selection() {
    let schema = single_upstream();
    let document = "query A { fieldA } query B { fieldB }";

    assert_eq!(
        plan(&schema, document, PartitionPolicy::Coalesce).unwrap_err(),
        PlanError::OperationNameRequired
    );
    assert_eq!(
        PlanBuilder::new(&schema, parser::parse_query(document).unwrap())
            .operation_name("C")
            .plan()
            .unwrap_err(),
        PlanError::UnknownOperation("C".to_string())
    );

    let root = PlanBuilder::new(&schema, parser::parse_query(document).unwrap())
        .operation_name("B")
        .plan()
        .unwrap();
    assert_eq!(fetch_queries(&root), vec![(
        "fields".to_string(),
        "query B {\n  fieldB\n}\n".to_string()
    )]);
}

#[test]
fn missing_root_type() {
    let schema = single_upstream();
    assert_eq!(
        plan(&schema, "mutation { fieldA }", PartitionPolicy::Coalesce).unwrap_err(),
        PlanError::MissingRootType(OperationType::Mutation)
    );
}

#[test]
fn variables_are_pruned_per_request() {
    let schema = single_upstream();
    let variables: Variables = serde_json::from_str(r#"{"a": true, "b": false}"#).unwrap();
    let root = PlanBuilder::new(
        &schema,
        parser::parse_query("query Q($a: Boolean!, $b: Boolean!) { fieldA @include(if: $a) fieldB @skip(if: $b) }")
            .unwrap(),
    )
    .variables(variables)
    .policy(PartitionPolicy::Split)
    .plan()
    .unwrap();
    let RootNode::Query(query) = root else {
        panic!("expected a query plan");
    };

    let fetches = query.node.fetch_nodes();
    assert_eq!(fetches.len(), 2);
    assert_eq!(fetches[0].query, "query Q($a: Boolean!) {\n  fieldA @include(if: $a)\n}\n");
    assert_eq!(
        fetches[0].variables.keys().map(Name::as_str).collect::<Vec<_>>(),
        vec!["a"]
    );
    assert_eq!(fetches[1].query, "query Q($b: Boolean!) {\n  fieldB @skip(if: $b)\n}\n");
    assert_eq!(fetches[1].operation_name.as_deref(), Some("Q"));
    assert_eq!(
        fetches[1].to_request().variables.get("b"),
        Some(&ConstValue::Boolean(false))
    );
}

#[test]
fn skipped_root_fields_are_left_out() {
    let schema = single_upstream();
    for policy in [PartitionPolicy::Coalesce, PartitionPolicy::Split] {
        let root = plan(
            &schema,
            "{ fieldA @skip(if: true) fieldB field3 @include(if: false) }",
            policy,
        )
        .unwrap();
        assert_eq!(fetch_queries(&root), vec![(
            "fields".to_string(),
            "{\n  fieldB\n}\n".to_string()
        )]);

        let RootNode::Query(query) = root else {
            panic!("expected a query plan");
        };
        assert_eq!(
            query.shape.iter().map(|field| field.key.as_str()).collect::<Vec<_>>(),
            vec!["fieldB"]
        );
    }
}

#[test]
fn skipped_selection_keeps_a_sibling_with_the_same_key() {
    let schema = single_upstream();
    let root = plan(
        &schema,
        "{ value: fieldA @skip(if: true) value: fieldA }",
        PartitionPolicy::Coalesce,
    )
    .unwrap();

    assert_eq!(fetch_queries(&root), vec![(
        "fields".to_string(),
        "{\n  value: fieldA\n}\n".to_string()
    )]);
}

#[test]
fn missing_variables_fall_back_to_their_default() {
    let schema = single_upstream();
    let query = "query ($s: Boolean = true, $i: Boolean = false) { ... @skip(if: $s) { fieldA } fieldB @include(if: $i) field3 }";

    let root = plan(&schema, query, PartitionPolicy::Coalesce).unwrap();
    let RootNode::Query(query_node) = &root else {
        panic!("expected a query plan");
    };
    assert_eq!(
        query_node.shape.iter().map(|field| field.key.as_str()).collect::<Vec<_>>(),
        vec!["field3"]
    );

    let variables: Variables = serde_json::from_str(r#"{"s": false, "i": true}"#).unwrap();
    let root = PlanBuilder::new(&schema, parser::parse_query(query).unwrap())
        .variables(variables)
        .plan()
        .unwrap();
    let RootNode::Query(query_node) = root else {
        panic!("expected a query plan");
    };
    assert_eq!(
        query_node.shape.iter().map(|field| field.key.as_str()).collect::<Vec<_>>(),
        vec!["fieldA", "fieldB", "field3"]
    );
}
