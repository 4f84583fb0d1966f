use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use segsieve::error::{PlanError, PlanResult};
use segsieve::executor::{PredicateExecutor, Selection};
use segsieve::plan::{parse_plan, parse_plan_bytes, PlanNodeKind};
use segsieve::query::{execute_retrieve, execute_search, SearchHit, VectorSearcher};
use segsieve::plan::SearchInfo;
use segsieve::schema::{FieldId, FieldOffset, FieldSchema, Schema};
use segsieve::segment::{MemSegment, SegmentData, Timestamp};
use segsieve::value::{DataType, GenericValue};
use segsieve::wire::{
    BinaryLogicalNode, BinaryRangeNode, ColumnNode, ExprKind, ExprNode, GenericValueNode,
    PlanNode, QueryInfo, RetrieveNode, TermNode, UnaryRangeNode, VectorSearchNode,
};
use segsieve::wire;

fn test_schema() -> Schema {
    let _ = env_logger::builder().is_test(true).try_init();
    Schema::new(vec![
        FieldSchema::scalar(FieldId(100), "age", DataType::Int32),
        FieldSchema::vector(FieldId(101), "embedding", DataType::FloatVector, 4),
        FieldSchema::scalar(FieldId(102), "score", DataType::Double),
    ])
}

fn populate(segment: &MemSegment, ages: &[i32]) {
    for (i, age) in ages.iter().enumerate() {
        segment
            .append_row(
                &[
                    (FieldOffset(0), GenericValue::Int32(*age)),
                    (FieldOffset(2), GenericValue::Double(*age as f64 / 10.0)),
                ],
                Timestamp(i as u64 + 1),
            )
            .unwrap();
    }
}

fn age_column() -> ExprNode {
    ExprNode::new(ExprKind::Column(ColumnNode {
        field_id: 100,
        data_type: DataType::Int32,
    }))
}

fn age_range(op: wire::CompareOp, value: i64) -> ExprNode {
    ExprNode::new(ExprKind::UnaryRange(UnaryRangeNode {
        op,
        value: GenericValueNode::int64_val(value),
        child: Box::new(age_column()),
    }))
}

fn retrieve_plan(predicate: ExprNode) -> PlanNode {
    PlanNode::retrieve(RetrieveNode {
        predicate: Some(predicate),
        output_field_ids: vec![100],
    })
}

#[test]
fn test_retrieve_conjunction_over_chunked_segment() {
    let schema = test_schema();
    let ages: Vec<i32> = (0..50).map(|i| i * 100).collect();
    let segment = MemSegment::new(&schema, 8).unwrap();
    populate(&segment, &ages);

    // age > 2000 and age < 3000, shipped as bincode wire bytes.
    let wire_plan = retrieve_plan(ExprNode::new(ExprKind::BinaryLogical(BinaryLogicalNode {
        op: wire::BinaryLogicalOp::And,
        left: Box::new(age_range(wire::CompareOp::Gt, 2000)),
        right: Box::new(age_range(wire::CompareOp::Lt, 3000)),
    })));
    let bytes = wire_plan.to_bytes().unwrap();
    let plan = parse_plan_bytes(&schema, &bytes).unwrap();

    let rows = execute_retrieve(&plan, &segment, Timestamp::max()).unwrap();
    let expected: Vec<usize> = ages
        .iter()
        .enumerate()
        .filter_map(|(i, a)| (*a > 2000 && *a < 3000).then_some(i))
        .collect();
    assert_eq!(rows, expected);
}

#[test]
fn test_retrieve_term_membership() {
    let schema = test_schema();
    let ages = [10, 20, 30, 40, 50, 60, 70];
    let segment = MemSegment::new(&schema, 3).unwrap();
    populate(&segment, &ages);

    let wire_plan = retrieve_plan(ExprNode::new(ExprKind::Term(TermNode {
        child: Box::new(age_column()),
        values: vec![
            GenericValueNode::int64_val(20),
            GenericValueNode::int64_val(60),
            GenericValueNode::int64_val(999),
        ],
    })));
    let plan = parse_plan(&schema, &wire_plan).unwrap();

    let rows = execute_retrieve(&plan, &segment, Timestamp::max()).unwrap();
    assert_eq!(rows, vec![1, 5]);
}

#[test]
fn test_empty_term_and_degenerate_range_return_nothing() {
    let schema = test_schema();
    let segment = MemSegment::new(&schema, 4).unwrap();
    populate(&segment, &[1, 2, 3]);

    let empty_term = retrieve_plan(ExprNode::new(ExprKind::Term(TermNode {
        child: Box::new(age_column()),
        values: vec![],
    })));
    let plan = parse_plan(&schema, &empty_term).unwrap();
    assert!(execute_retrieve(&plan, &segment, Timestamp::max())
        .unwrap()
        .is_empty());

    // lower == upper with an open bound selects nothing.
    let degenerate = retrieve_plan(ExprNode::new(ExprKind::BinaryRange(BinaryRangeNode {
        lower_inclusive: true,
        upper_inclusive: false,
        lower_value: GenericValueNode::int64_val(2),
        upper_value: GenericValueNode::int64_val(2),
        child: Box::new(age_column()),
    })));
    let plan = parse_plan(&schema, &degenerate).unwrap();
    assert!(execute_retrieve(&plan, &segment, Timestamp::max())
        .unwrap()
        .is_empty());
}

#[test]
fn test_index_and_scan_masks_are_identical() {
    let schema = test_schema();
    let mut rng = StdRng::seed_from_u64(7);
    let ages: Vec<i32> = (0..200).map(|_| rng.gen_range(-500..500)).collect();

    // Index only the chunks sealed so far; later rows stay raw.
    let segment = MemSegment::new(&schema, 16).unwrap();
    populate(&segment, &ages[..120]);
    segment.build_index(FieldOffset(0)).unwrap();
    for (i, age) in ages[120..].iter().enumerate() {
        segment
            .append_row(
                &[
                    (FieldOffset(0), GenericValue::Int32(*age)),
                    (FieldOffset(2), GenericValue::Double(0.0)),
                ],
                Timestamp(120 + i as u64 + 1),
            )
            .unwrap();
    }
    assert!(segment.indexed_chunk_count(FieldOffset(0)) > 0);

    let plain = MemSegment::new(&schema, 16).unwrap();
    populate(&plain, &ages);
    assert_eq!(plain.indexed_chunk_count(FieldOffset(0)), 0);

    for (lower, upper) in [(-100, 100), (-500, -400), (250, 251), (0, 0)] {
        let wire_plan = retrieve_plan(ExprNode::new(ExprKind::BinaryRange(BinaryRangeNode {
            lower_inclusive: true,
            upper_inclusive: true,
            lower_value: GenericValueNode::int64_val(lower),
            upper_value: GenericValueNode::int64_val(upper),
            child: Box::new(age_column()),
        })));
        let plan = parse_plan(&schema, &wire_plan).unwrap();
        let indexed = execute_retrieve(&plan, &segment, Timestamp::max()).unwrap();
        let scanned = execute_retrieve(&plan, &plain, Timestamp::max()).unwrap();
        assert_eq!(indexed, scanned, "bounds [{}, {}]", lower, upper);
    }
}

#[test]
fn test_visibility_excludes_deleted_and_future_rows() {
    let schema = test_schema();
    let segment = MemSegment::new(&schema, 4).unwrap();
    populate(&segment, &[10, 20, 30, 40, 50, 60]);
    segment.delete_row(2).unwrap();

    let plan = parse_plan(&schema, &retrieve_plan(age_range(wire::CompareOp::Gt, 0))).unwrap();

    // At ts 4 rows 4 and 5 are not yet active; row 2 is deleted.
    let rows = execute_retrieve(&plan, &segment, Timestamp(4)).unwrap();
    assert_eq!(rows, vec![0, 1, 3]);

    let rows = execute_retrieve(&plan, &segment, Timestamp::max()).unwrap();
    assert_eq!(rows, vec![0, 1, 3, 4, 5]);
}

#[test]
fn test_search_pipeline_with_exclusion_bitmap() {
    struct NearestRows;
    impl VectorSearcher for NearestRows {
        fn search(
            &self,
            info: &SearchInfo,
            active_count: usize,
            excluded: &[bool],
        ) -> PlanResult<Vec<SearchHit>> {
            assert_eq!(excluded.len(), active_count);
            Ok(excluded
                .iter()
                .enumerate()
                .filter_map(|(row, ex)| {
                    (!ex).then_some(SearchHit {
                        row_offset: row,
                        distance: row as f32,
                    })
                })
                .take(info.topk)
                .collect())
        }
    }

    let schema = test_schema();
    let segment = MemSegment::new(&schema, 4).unwrap();
    populate(&segment, &[5, 15, 25, 35, 45]);
    segment.delete_row(3).unwrap();

    let wire_plan = PlanNode::vector_search(VectorSearchNode {
        field_id: 101,
        is_binary: false,
        placeholder_tag: "$0".into(),
        query_info: QueryInfo {
            metric_type: "L2".into(),
            topk: 10,
            round_decimal: -1,
            search_params: "{\"nprobe\": 8}".into(),
        },
        predicate: Some(age_range(wire::CompareOp::Gt, 10)),
        output_field_ids: vec![100, 102],
    });
    let plan = parse_plan(&schema, &wire_plan).unwrap();
    match &plan.node {
        PlanNodeKind::VectorSearch(info) => assert_eq!(info.field, FieldOffset(1)),
        other => panic!("unexpected node: {:?}", other),
    }

    let result = execute_search(&plan, &segment, Timestamp::max(), &NearestRows).unwrap();
    // Rows 0 (predicate) and 3 (deleted) are excluded.
    assert_eq!(
        result.hits.iter().map(|h| h.row_offset).collect::<Vec<_>>(),
        vec![1, 2, 4]
    );
}

#[test]
fn test_search_on_empty_segment_skips_everything() {
    struct Unreachable;
    impl VectorSearcher for Unreachable {
        fn search(
            &self,
            _info: &SearchInfo,
            _active_count: usize,
            _excluded: &[bool],
        ) -> PlanResult<Vec<SearchHit>> {
            panic!("searcher must not run on an empty segment");
        }
    }

    let schema = test_schema();
    let segment = MemSegment::new(&schema, 4).unwrap();
    let wire_plan = PlanNode::vector_search(VectorSearchNode {
        field_id: 101,
        is_binary: false,
        placeholder_tag: "$0".into(),
        query_info: QueryInfo {
            metric_type: "L2".into(),
            topk: 3,
            round_decimal: -1,
            search_params: "{}".into(),
        },
        predicate: Some(age_range(wire::CompareOp::Gt, 0)),
        output_field_ids: vec![],
    });
    let plan = parse_plan(&schema, &wire_plan).unwrap();
    let result = execute_search(&plan, &segment, Timestamp::max(), &Unreachable).unwrap();
    assert!(result.hits.is_empty());
}

#[test]
fn test_concurrent_evaluations_agree() {
    let schema = test_schema();
    let mut rng = StdRng::seed_from_u64(11);
    let ages: Vec<i32> = (0..300).map(|_| rng.gen_range(0..1000)).collect();
    let segment = MemSegment::new(&schema, 32).unwrap();
    populate(&segment, &ages);
    segment.build_index(FieldOffset(0)).unwrap();

    let plan = parse_plan(
        &schema,
        &retrieve_plan(ExprNode::new(ExprKind::BinaryLogical(BinaryLogicalNode {
            op: wire::BinaryLogicalOp::And,
            left: Box::new(age_range(wire::CompareOp::Ge, 200)),
            right: Box::new(age_range(wire::CompareOp::Lt, 800)),
        }))),
    )
    .unwrap();

    let row_count = segment.row_count();
    let expr = plan.predicate().unwrap();
    let reference = match PredicateExecutor::new(&segment, row_count)
        .evaluate(expr)
        .unwrap()
    {
        Selection::Mask(mask) => mask,
        other => panic!("expected mask, got {:?}", other),
    };

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    match PredicateExecutor::new(&segment, row_count)
                        .evaluate(expr)
                        .unwrap()
                    {
                        Selection::Mask(mask) => mask,
                        other => panic!("expected mask, got {:?}", other),
                    }
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), reference);
        }
    });
}

#[test]
fn test_evaluation_errors_are_terminal_not_fatal() {
    let schema = test_schema();
    let segment = MemSegment::new(&schema, 4).unwrap();
    populate(&segment, &[1, 2, 3]);

    // (age / 0) > 1 fails at evaluation time.
    let wire_plan = retrieve_plan(ExprNode::new(ExprKind::UnaryRange(UnaryRangeNode {
        op: wire::CompareOp::Gt,
        value: GenericValueNode::int64_val(1),
        child: Box::new(ExprNode::new(ExprKind::BinaryArith(wire::BinaryArithNode {
            op: wire::BinaryArithOp::Div,
            left: Box::new(age_column()),
            right: Box::new(ExprNode::new(ExprKind::Value(wire::ValueNode {
                value: GenericValueNode::int64_val(0),
            }))),
        }))),
    })));

    // The arith widens to Int64, so the range literal decodes as Int64.
    let plan = parse_plan(&schema, &wire_plan).unwrap();
    assert!(matches!(
        execute_retrieve(&plan, &segment, Timestamp::max()),
        Err(PlanError::Evaluation(_))
    ));

    // The segment stays usable after the failed query.
    let ok = parse_plan(&schema, &retrieve_plan(age_range(wire::CompareOp::Gt, 1))).unwrap();
    assert_eq!(
        execute_retrieve(&ok, &segment, Timestamp::max()).unwrap(),
        vec![1, 2]
    );
}

#[test]
fn test_wire_round_trip_preserves_plan() {
    let schema = test_schema();
    let wire_plan = retrieve_plan(ExprNode::new(ExprKind::BinaryLogical(BinaryLogicalNode {
        op: wire::BinaryLogicalOp::Or,
        left: Box::new(age_range(wire::CompareOp::Lt, -100)),
        right: Box::new(ExprNode::new(ExprKind::Term(TermNode {
            child: Box::new(age_column()),
            values: vec![GenericValueNode::int64_val(42)],
        }))),
    })));

    let bytes = wire_plan.to_bytes().unwrap();
    let decoded = PlanNode::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, wire_plan);

    let direct = parse_plan(&schema, &wire_plan).unwrap();
    let framed = parse_plan_bytes(&schema, &bytes).unwrap();
    assert_eq!(
        direct.predicate().map(|e| e.to_string()),
        framed.predicate().map(|e| e.to_string())
    );

    assert!(matches!(
        parse_plan_bytes(&schema, &[0xff; 3]),
        Err(PlanError::WireDecode(_))
    ));
}
