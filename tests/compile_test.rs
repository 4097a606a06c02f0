//! Integration tests: the concrete scenarios and testable properties.

use std::collections::HashMap;

use mbql_compiler::prelude::*;

fn orders_store() -> InMemoryMetadataStore {
    InMemoryMetadataStore::new()
        .with_table(TableRecord {
            id: TableId(1),
            name: "orders".into(),
            schema: Some("public".into()),
            is_alias: false,
        })
        .with_field(FieldRecord {
            id: FieldId(10),
            name: "id".into(),
            table_id: TableId(1),
            base_type: "int".into(),
            special_type: SpecialType::None,
        })
        .with_field(FieldRecord {
            id: FieldId(11),
            name: "status".into(),
            table_id: TableId(1),
            base_type: "string".into(),
            special_type: SpecialType::None,
        })
        .with_field(FieldRecord {
            id: FieldId(12),
            name: "name".into(),
            table_id: TableId(1),
            base_type: "string".into(),
            special_type: SpecialType::None,
        })
        .with_field(FieldRecord {
            id: FieldId(13),
            name: "total".into(),
            table_id: TableId(1),
            base_type: "float".into(),
            special_type: SpecialType::None,
        })
        .with_field(FieldRecord {
            id: FieldId(14),
            name: "created_at".into(),
            table_id: TableId(1),
            base_type: "timestamp".into(),
            special_type: SpecialType::None,
        })
        .with_field(FieldRecord {
            id: FieldId(15),
            name: "created_unix".into(),
            table_id: TableId(1),
            base_type: "int".into(),
            special_type: SpecialType::UnixTimestampSeconds,
        })
        .with_field(FieldRecord {
            id: FieldId(16),
            name: "customer_id".into(),
            table_id: TableId(1),
            base_type: "int".into(),
            special_type: SpecialType::None,
        })
}

fn query(inner: InnerQuery) -> OuterQuery {
    OuterQuery {
        database: None,
        query: inner,
    }
}

fn compile(outer: &OuterQuery) -> CompiledQuery {
    let mut store = orders_store();
    let joins = StaticJoinInfoResolver::new();
    mbql_to_native(Dialect::Postgres, &mut store, &joins, outer).expect("compiles")
}

// Scenario 1: a bare field-id select.
#[test]
fn scenario_simple_field_select() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        fields: vec![FieldClause::FieldId(FieldId(10))],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("\"public\".\"orders\".\"id\""));
    assert!(compiled.sql.contains("FROM \"public\".\"orders\""));
    assert!(!compiled.sql.contains("AS \"id\""));
}

// Scenario 2: breakout + a bare count, no select-list aliasing at top level.
#[test]
fn scenario_breakout_with_count() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        aggregation: vec![AggregationClause::Count(None)],
        breakout: vec![FieldClause::FieldId(FieldId(11))],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("\"public\".\"orders\".\"status\""));
    assert!(compiled.sql.contains("COUNT(*)"));
    assert!(compiled.sql.contains("GROUP BY \"public\".\"orders\".\"status\""));
    assert!(!compiled.sql.contains("AS \"count\""));
}

// Scenario 3: case-insensitive starts-with, pattern kept in original case.
#[test]
fn scenario_starts_with_case_insensitive() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        filter: Some(FilterClause::StartsWith {
            field: FieldClause::FieldId(FieldId(12)),
            value: ValueClause::Value(Scalar::String("A".into())),
            case_sensitive: false,
        }),
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("LOWER(\"public\".\"orders\".\"name\")"));
    assert!(compiled.sql.contains("LIKE LOWER(?)"));
    assert_eq!(compiled.params, vec![Scalar::String("A%".into())]);
}

// Scenario 4: dividing an aggregation by an integer literal promotes it to
// float and guards against a zero divisor.
#[test]
fn scenario_divide_aggregation_by_integer_literal() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        aggregation: vec![AggregationClause::Arithmetic {
            op: ArithOp::Div,
            args: vec![
                AggregationClause::Sum(FieldClause::FieldId(FieldId(13))),
                AggregationClause::Number(2.0),
            ],
        }],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("SUM(\"public\".\"orders\".\"total\")"));
    assert!(compiled.sql.contains("CASE WHEN 2 = 0 THEN NULL ELSE 2 END") || compiled.sql.contains("CASE WHEN 2.0 = 0 THEN NULL ELSE 2.0 END"));
}

// Scenario 5: a source-query's results get a stable "source" alias and its
// own select-list is aliased, since the outer level references it by name.
#[test]
fn scenario_nested_source_query_aliases_and_limit() {
    let sub = InnerQuery {
        source: Some(Source::Table(TableId(1))),
        aggregation: vec![AggregationClause::Count(None)],
        ..Default::default()
    };
    let outer = query(InnerQuery {
        source: Some(Source::Query(Box::new(sub))),
        limit: Some(10),
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("COUNT(*) AS \"count\""));
    assert!(compiled.sql.contains(") AS \"source\""));
    assert!(compiled.sql.contains("SELECT * FROM"));
    assert!(compiled.sql.contains("LIMIT 10"));
}

// Scenario 6: datetime-field goes through the dialect's default `date`
// rewrite (DATE_TRUNC for any non-default unit, on a dialect with no
// override).
#[test]
fn scenario_datetime_field_truncation() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        fields: vec![FieldClause::DatetimeField {
            inner: Box::new(FieldClause::FieldId(FieldId(14))),
            unit: DateUnit::Month,
        }],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("DATE_TRUNC"));
    assert!(compiled.sql.contains("'month'"));
    assert!(compiled.sql.contains("\"public\".\"orders\".\"created_at\""));
}

#[test]
fn count_where_matches_sum_where_shape() {
    let pred = Box::new(FilterClause::Eq(
        FieldClause::FieldId(FieldId(11)),
        ValueClause::Value(Scalar::String("done".into())),
    ));

    let count_where_outer = {
        let sub = InnerQuery {
            source: Some(Source::Table(TableId(1))),
            aggregation: vec![AggregationClause::CountWhere(pred.clone())],
            ..Default::default()
        };
        query(InnerQuery {
            source: Some(Source::Query(Box::new(sub))),
            ..Default::default()
        })
    };
    let sum_where_outer = {
        let sub = InnerQuery {
            source: Some(Source::Table(TableId(1))),
            aggregation: vec![AggregationClause::SumWhere {
                arg: Aggregand::Number(1.0),
                pred,
            }],
            ..Default::default()
        };
        query(InnerQuery {
            source: Some(Source::Query(Box::new(sub))),
            ..Default::default()
        })
    };

    let a = compile(&count_where_outer).sql;
    let b = compile(&sum_where_outer).sql;
    let case_a = a.split("AS ").next().unwrap();
    let case_b = b.split("AS ").next().unwrap();
    assert_eq!(case_a, case_b);
}

#[test]
fn share_is_count_where_divided_by_count_star() {
    let pred = Box::new(FilterClause::Eq(
        FieldClause::FieldId(FieldId(11)),
        ValueClause::Value(Scalar::String("done".into())),
    ));
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        aggregation: vec![AggregationClause::Share(pred)],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("SUM(CASE WHEN"));
    assert!(compiled.sql.contains("COUNT(*)"));
}

#[test]
fn default_projection_is_star_with_no_clauses() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.starts_with("SELECT * FROM"));
}

#[test]
fn fk_navigation_qualifies_dest_field_by_join_alias() {
    let mut store = orders_store();
    let joins = StaticJoinInfoResolver::new().with_join(
        FieldId(16),
        FieldId(20),
        JoinInfo {
            dest_table: TableId(2),
            alias: "customers".into(),
        },
    );
    store = store.with_table(TableRecord {
        id: TableId(2),
        name: "customers".into(),
        schema: Some("public".into()),
        is_alias: false,
    });
    store = store.with_field(FieldRecord {
        id: FieldId(20),
        name: "email".into(),
        table_id: TableId(2),
        base_type: "string".into(),
        special_type: SpecialType::None,
    });

    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        fields: vec![FieldClause::Fk {
            source_fk: Box::new(FieldClause::FieldId(FieldId(16))),
            dest_field: Box::new(FieldClause::FieldId(FieldId(20))),
        }],
        ..Default::default()
    });
    let compiled = mbql_to_native(Dialect::Postgres, &mut store, &joins, &outer).expect("compiles");
    assert!(compiled.sql.contains("\"customers\".\"email\""));
    assert!(!compiled.sql.contains("\"public\".\"customers\""));
}

#[test]
fn join_tables_emits_left_join_on_fk_equality() {
    let mut store = orders_store();
    store = store.with_table(TableRecord {
        id: TableId(2),
        name: "customers".into(),
        schema: Some("public".into()),
        is_alias: false,
    });
    store = store.with_field(FieldRecord {
        id: FieldId(21),
        name: "id".into(),
        table_id: TableId(2),
        base_type: "int".into(),
        special_type: SpecialType::None,
    });
    let joins = StaticJoinInfoResolver::new();

    let mut join_tables = Vec::new();
    join_tables.push(JoinTableSpec {
        source_fk: FieldClause::FieldId(FieldId(16)),
        dest_field: FieldClause::FieldId(FieldId(21)),
        dest_table: JoinTarget::Table(TableId(2)),
        alias: Some("c".into()),
    });

    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        join_tables,
        ..Default::default()
    });
    let compiled = mbql_to_native(Dialect::Postgres, &mut store, &joins, &outer).expect("compiles");
    assert!(compiled.sql.contains("LEFT JOIN \"public\".\"customers\" AS \"c\""));
    assert!(compiled.sql.contains("ON"));
    assert!(compiled.sql.contains("\"c\".\"id\""));
}

#[test]
fn unix_timestamp_field_is_converted_before_use() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        fields: vec![FieldClause::FieldId(FieldId(15))],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("TO_TIMESTAMP"));
    assert!(compiled.sql.contains("\"public\".\"orders\".\"created_unix\""));
}

#[test]
fn binning_strategy_rewrite_shape() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        breakout: vec![FieldClause::BinningStrategy {
            inner: Box::new(FieldClause::FieldId(FieldId(13))),
            strategy: BinningStrategy {
                kind: "num-bins".into(),
                resolution: 10.0,
                params: BinningParams {
                    bin_width: 10.0,
                    min_value: 0.0,
                    max_value: 100.0,
                },
            },
        }],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("FLOOR("));
    assert!(compiled.sql.contains("10"));
}

#[test]
fn order_by_renders_direction_per_entry() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        order_by: vec![
            (SortDirection::Desc, FieldClause::FieldId(FieldId(13))),
            (SortDirection::Asc, FieldClause::FieldId(FieldId(12))),
        ],
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains(
        "ORDER BY \"public\".\"orders\".\"total\" DESC, \"public\".\"orders\".\"name\" ASC"
    ));
}

#[test]
fn page_clause_computes_1_indexed_offset() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        page: Some(Page { items: 10, page: 2 }),
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("LIMIT 10"));
    assert!(compiled.sql.contains("OFFSET 10"));
}

#[test]
fn page_clause_first_page_has_zero_offset() {
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        page: Some(Page { items: 25, page: 1 }),
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("LIMIT 25"));
    assert!(compiled.sql.contains("OFFSET 0"));
}

#[test]
fn expressions_map_arithmetic_tree() {
    let mut expressions = HashMap::new();
    expressions.insert(
        "margin".to_string(),
        ExpressionTree::Sub(
            Box::new(ExpressionTree::Field(FieldClause::FieldId(FieldId(13)))),
            Box::new(ExpressionTree::Literal(1.0)),
        ),
    );
    let outer = query(InnerQuery {
        source: Some(Source::Table(TableId(1))),
        fields: vec![FieldClause::Expression("margin".into())],
        expressions,
        ..Default::default()
    });
    let compiled = compile(&outer);
    assert!(compiled.sql.contains("\"public\".\"orders\".\"total\""));
    assert!(compiled.sql.contains("-"));
}
