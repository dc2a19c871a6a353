//! Compiled predicates against the in-memory reference evaluation.

use dbframe::planner::eval;
use dbframe::planner::CompareOp;
use dbframe::{CacheConfig, Database, Predicate, Row, TableSchema, Value};
use proptest::prelude::*;

const SCRIPT: &str = "
    CREATE TABLE t (a INTEGER, b REAL, s TEXT);
    INSERT INTO t VALUES
        (1, 0.5, 'oak'),
        (2, NULL, 'ash'),
        (NULL, 2.5, 'elm'),
        (-1, -0.5, NULL),
        (3, 1.0, 'oak'),
        (0, 0.0, 'fir'),
        (2, 2.5, NULL),
        (NULL, NULL, 'ash'),
        (-3, 3.0, 'elm'),
        (1, 1.5, 'birch');
";

fn db() -> Database {
    Database::open_in_memory(SCRIPT, CacheConfig::disabled()).expect("fixture loads")
}

fn schema() -> TableSchema {
    TableSchema::new("t", [("a", "INTEGER"), ("b", "REAL"), ("s", "TEXT")])
}

fn sorted(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by(|x, y| x.values().cmp(y.values()));
    rows
}

fn selected(db: &Database, pred: &Predicate) -> Vec<Row> {
    let t = db.table("t").unwrap();
    sorted(t.filter(pred.clone()).unwrap().collect_rows().unwrap())
}

fn reference(db: &Database, pred: &Predicate) -> Vec<Row> {
    let t = db.table("t").unwrap();
    let all = t.view().collect_rows().unwrap();
    sorted(
        all.into_iter()
            .filter(|r| eval::matches(pred, t.schema(), r).unwrap())
            .collect(),
    )
}

fn op() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
    ]
}

fn word() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("oak"), Just("ash"), Just("elm"), Just("fir"), Just("pine")]
}

fn leaf() -> impl Strategy<Value = Predicate> {
    let t = schema();
    let a = t.column("a").unwrap().clone();
    let b = t.column("b").unwrap().clone();
    let s = t.column("s").unwrap().clone();
    let (a2, a3, a4, b2, s2, s3, s4) = (
        a.clone(),
        a.clone(),
        a.clone(),
        b.clone(),
        s.clone(),
        s.clone(),
        s.clone(),
    );
    prop_oneof![
        (op(), -4i64..4).prop_map(move |(o, v)| Predicate::compare(&a, o, v).unwrap()),
        (op(), -1.0f64..3.5).prop_map(move |(o, v)| Predicate::compare(&b, o, v).unwrap()),
        (op(), word()).prop_map(move |(o, v)| Predicate::compare(&s, o, v).unwrap()),
        (-4i64..4, 0i64..4).prop_map(move |(lo, w)| Predicate::between(&a2, lo, lo + w).unwrap()),
        proptest::collection::vec(-4i64..4, 0..4)
            .prop_map(move |vs| Predicate::is_in(&a3, vs).unwrap()),
        proptest::collection::vec(word(), 0..3)
            .prop_map(move |vs| Predicate::is_in(&s2, vs).unwrap()),
        prop_oneof![Just("o%"), Just("%a%"), Just("_sh"), Just("e_m"), Just("%")]
            .prop_map(move |p| Predicate::like(&s3, p).unwrap()),
        Just(Predicate::is_null(&a4)),
        Just(Predicate::not_null(&b2)),
        Just(Predicate::eq(&s4, Value::Null).unwrap()),
    ]
}

fn predicate() -> impl Strategy<Value = Predicate> {
    leaf().prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(x, y)| x & y),
            (inner.clone(), inner.clone()).prop_map(|(x, y)| x | y),
            inner.prop_map(|x| !x),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn compiled_sql_matches_reference(p in predicate()) {
        let db = db();
        prop_assert_eq!(selected(&db, &p), reference(&db, &p));
    }

    #[test]
    fn conjunction_is_associative(x in leaf(), y in leaf(), z in leaf()) {
        let db = db();
        let left = (x.clone() & y.clone()) & z.clone();
        let right = x & (y & z);
        let t = schema();
        prop_assert_eq!(left.compile(&t).unwrap(), right.compile(&t).unwrap());
        prop_assert_eq!(selected(&db, &left), selected(&db, &right));
    }

    #[test]
    fn disjunction_is_associative(x in leaf(), y in leaf(), z in leaf()) {
        let db = db();
        let left = (x.clone() | y.clone()) | z.clone();
        let right = x | (y | z);
        prop_assert_eq!(selected(&db, &left), selected(&db, &right));
    }
}

#[test]
fn like_on_untyped_cells_agrees_with_sqlite() {
    let db = Database::open_in_memory(
        "CREATE TABLE m (v);
         INSERT INTO m VALUES (1.0), (12.5), (1e20), (3), ('x1'), (x'3132'), (0.25), (NULL);",
        CacheConfig::disabled(),
    )
    .unwrap();
    let m = db.table("m").unwrap();
    let v = m.column("v").unwrap();
    let all = m.view().collect_rows().unwrap();
    for pattern in ["1%", "1.0", "1", "%.5", "%e+20", "12", "1_", "%2%", "3", "0.25"] {
        let pred = v.like(pattern).unwrap();
        let via_sql = m.filter(pred.clone()).unwrap().collect_rows().unwrap();
        let via_eval: Vec<Row> = all
            .iter()
            .filter(|r| eval::matches(&pred, m.schema(), r).unwrap())
            .cloned()
            .collect();
        assert_eq!(via_sql, via_eval, "pattern {pattern}");
    }
}

#[test]
fn null_equality_selects_exactly_the_null_rows() {
    let db = db();
    let t = db.table("t").unwrap();
    let b = t.column("b").unwrap();

    let nulls = t.filter(b.eq(Value::Null).unwrap()).unwrap().collect_rows().unwrap();
    assert_eq!(nulls.len(), 2);
    assert!(nulls.iter().all(|r| r[1].is_null()));

    let rest = t.filter(b.ne(Value::Null).unwrap()).unwrap().collect_rows().unwrap();
    assert_eq!(rest.len(), 8);
    assert!(rest.iter().all(|r| !r[1].is_null()));
    assert_eq!(nulls.len() + rest.len(), t.len().unwrap() as usize);
}

#[test]
fn ordering_against_null_is_a_type_error() {
    let t = schema();
    let a = t.column("a").unwrap();
    for op in [CompareOp::Lt, CompareOp::Le, CompareOp::Gt, CompareOp::Ge] {
        assert!(matches!(
            Predicate::compare(a, op, Value::Null),
            Err(dbframe::Error::TypeMismatch(_))
        ));
    }
}

#[test]
fn parameters_follow_placeholder_order() {
    let t = schema();
    let a = t.column("a").unwrap();
    let s = t.column("s").unwrap();
    let p = (Predicate::gt(a, 1).unwrap() | Predicate::eq(s, "oak").unwrap())
        & !Predicate::between(a, 5, 9).unwrap();
    let frag = p.compile(&t).unwrap();
    assert_eq!(
        frag.sql,
        "((\"a\" > ? OR \"s\" = ?) AND (NOT (\"a\" >= ? AND \"a\" <= ?)))"
    );
    assert_eq!(
        frag.params,
        vec![Value::Int(1), Value::from("oak"), Value::Int(5), Value::Int(9)]
    );
}

#[test]
fn values_are_never_interpolated() {
    let t = schema();
    let s = t.column("s").unwrap();
    let p = Predicate::eq(s, "x'; DROP TABLE t; --").unwrap();
    let frag = p.compile(&t).unwrap();
    assert_eq!(frag.sql, "\"s\" = ?");
    let db = db();
    assert!(selected(&db, &p).is_empty());
    assert_eq!(db.table("t").unwrap().len().unwrap(), 10);
}
