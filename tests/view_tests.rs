//! Lazy views: clause order, ranges, sorting and re-execution.

use dbframe::{CacheConfig, Database, Error, Row, Value};
use proptest::prelude::*;

fn digits() -> Database {
    let mut script = String::from("CREATE TABLE r (i INTEGER, tag TEXT);\n");
    for i in 0..10 {
        script.push_str(&format!("INSERT INTO r VALUES ({i}, 'r{i}');\n"));
    }
    Database::open_in_memory(&script, CacheConfig::default()).unwrap()
}

fn first_ints(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r[0].as_i64().unwrap()).collect()
}

#[test]
fn range_two_to_five() {
    let db = digits();
    let rows = db.table("r").unwrap().slice(2..5).unwrap().collect_rows().unwrap();
    assert_eq!(first_ints(&rows), vec![2, 3, 4]);
}

#[test]
fn range_past_the_end_is_clipped() {
    let db = digits();
    let rows = db.table("r").unwrap().slice(8..20).unwrap().collect_rows().unwrap();
    assert_eq!(first_ints(&rows), vec![8, 9]);
}

#[test]
fn open_ended_and_empty_ranges() {
    let db = digits();
    let t = db.table("r").unwrap();
    assert_eq!(first_ints(&t.slice(7..).unwrap().collect_rows().unwrap()), vec![7, 8, 9]);
    assert!(t.slice(5..5).unwrap().collect_rows().unwrap().is_empty());
    assert!(t.slice(12..).unwrap().collect_rows().unwrap().is_empty());
    assert_eq!(t.slice(7..).unwrap().count().unwrap(), 3);
}

#[test]
fn negative_and_strided_ranges_are_rejected() {
    let db = digits();
    let t = db.table("r").unwrap();
    assert!(matches!(t.slice(-2..4), Err(Error::Range(_))));
    assert!(matches!(
        dbframe::RowRange::with_step(0, Some(6), 2),
        Err(Error::Range(_))
    ));
    assert!(matches!(t.get(-1), Err(Error::Range(_))));
}

#[test]
fn nested_slices_compose() {
    let db = digits();
    let rows = db
        .table("r")
        .unwrap()
        .slice(2..9)
        .unwrap()
        .slice(1..3)
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(first_ints(&rows), vec![3, 4]);
}

#[test]
fn filter_example_keeps_original_order() {
    let db = Database::open_in_memory(
        "CREATE TABLE t (c1 INTEGER, c2 TEXT);
         INSERT INTO t VALUES (1, 'a'), (2, 'b'), (3, 'a');",
        CacheConfig::default(),
    )
    .unwrap();
    let t = db.table("t").unwrap();
    let rows = t
        .filter(t.column("c2").unwrap().eq("a").unwrap())
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            Row::new(vec![Value::Int(1), Value::from("a")]),
            Row::new(vec![Value::Int(3), Value::from("a")]),
        ]
    );
}

#[test]
fn builder_order_does_not_change_the_statement() {
    let db = digits();
    let t = db.table("r").unwrap();
    let pred = t.column("i").unwrap().ge(3).unwrap();
    let a = t
        .slice(1..4)
        .unwrap()
        .sort_by_directions([("i", "desc")])
        .unwrap()
        .filter(pred.clone())
        .unwrap();
    let b = t
        .filter(pred)
        .unwrap()
        .sort_by_directions([("i", "desc")])
        .unwrap()
        .slice(1..4)
        .unwrap();
    assert_eq!(a.compile().unwrap(), b.compile().unwrap());
    assert_eq!(
        a.compile().unwrap().sql,
        "SELECT * FROM \"r\" WHERE \"i\" >= ? ORDER BY \"i\" DESC, \"_rowid_\" ASC LIMIT ? OFFSET ?"
    );
    assert_eq!(first_ints(&a.collect_rows().unwrap()), vec![8, 7, 6]);
}

#[test]
fn unknown_sort_column_and_direction() {
    let db = digits();
    let t = db.table("r").unwrap();
    assert!(matches!(t.sort_by(["nope"]), Err(Error::Schema { .. })));
    assert!(matches!(
        t.sort_by_directions([("i", "sideways")]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn repeated_sort_column_keeps_last_direction() {
    let db = digits();
    let t = db.table("r").unwrap();
    let v = t
        .sort_by_directions([("i", "asc"), ("tag", "asc"), ("i", "desc")])
        .unwrap();
    assert_eq!(
        v.compile().unwrap().sql,
        "SELECT * FROM \"r\" ORDER BY \"tag\" ASC, \"i\" DESC, \"_rowid_\" ASC"
    );
}

#[test]
fn ties_keep_table_order_when_a_column_shadows_the_rowid() {
    let db = Database::open_in_memory(
        "CREATE TABLE t (_rowid_ TEXT, k INTEGER);
         INSERT INTO t VALUES ('z', 1), ('a', 1), ('m', 1);
         CREATE TABLE u (_rowid_ TEXT, rowid TEXT, oid TEXT, k INTEGER);
         INSERT INTO u VALUES ('z', 'z', 'z', 1), ('a', 'a', 'a', 2);",
        CacheConfig::default(),
    )
    .unwrap();
    let t = db.table("t").unwrap();
    let tags: Vec<String> = t
        .sort_by(["k"])
        .unwrap()
        .collect_rows()
        .unwrap()
        .iter()
        .map(|r| r[0].as_str().unwrap().to_string())
        .collect();
    assert_eq!(tags, vec!["z", "a", "m"]);
    assert_eq!(
        t.column("_rowid_").unwrap().unique().unwrap(),
        vec![Value::from("z"), Value::from("a"), Value::from("m")]
    );

    // Every alias shadowed: no tiebreak, but sorting still works.
    let u = db.table("u").unwrap();
    assert!(!u.schema().has_rowid());
    let v = u.sort_by_directions([("k", "desc")]).unwrap();
    assert_eq!(v.compile().unwrap().sql, "SELECT * FROM \"u\" ORDER BY \"k\" DESC");
    assert_eq!(v.collect_rows().unwrap()[0][0], Value::from("a"));
}

#[test]
fn projection_and_head() {
    let db = digits();
    let v = db.table("r").unwrap().head(2).unwrap().select(["tag"]).unwrap();
    assert_eq!(v.columns(), vec!["tag"]);
    assert_eq!(
        v.collect_rows().unwrap(),
        vec![Row::new(vec![Value::from("r0")]), Row::new(vec![Value::from("r1")])]
    );
    assert!(matches!(
        db.table("r").unwrap().view().select(["missing"]),
        Err(Error::Schema { .. })
    ));
}

#[test]
fn each_traversal_re_executes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.db");
    let writer = rusqlite::Connection::open(&path).unwrap();
    writer
        .execute_batch("CREATE TABLE log (n INTEGER); INSERT INTO log VALUES (1), (2);")
        .unwrap();

    let db = Database::open(&path, CacheConfig::default()).unwrap();
    let view = db.table("log").unwrap().view();
    let mut rows = view.rows().unwrap();
    assert_eq!(rows.iter().unwrap().count(), 2);

    writer.execute("INSERT INTO log VALUES (3)", []).unwrap();
    let seen: Vec<i64> = rows
        .iter()
        .unwrap()
        .map(|r| r.unwrap()[0].as_i64().unwrap())
        .collect();
    assert_eq!(seen, vec![1, 2, 3]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Rows tied on every sort key keep their table order.
    #[test]
    fn ties_keep_table_order(keys in proptest::collection::vec(0i64..3, 1..20), desc in any::<bool>()) {
        let mut script = String::from("CREATE TABLE s (k INTEGER, pos INTEGER);\n");
        for (pos, k) in keys.iter().enumerate() {
            script.push_str(&format!("INSERT INTO s VALUES ({k}, {pos});\n"));
        }
        let db = Database::open_in_memory(&script, CacheConfig::disabled()).unwrap();
        let dir = if desc { "desc" } else { "asc" };
        let rows = db
            .table("s")
            .unwrap()
            .sort_by_directions([("k", dir)])
            .unwrap()
            .collect_rows()
            .unwrap();

        let mut expected: Vec<(i64, i64)> = keys.iter().copied().zip(0..).collect();
        if desc {
            expected.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            expected.sort_by(|a, b| a.0.cmp(&b.0));
        }
        let got: Vec<(i64, i64)> = rows
            .iter()
            .map(|r| (r[0].as_i64().unwrap(), r[1].as_i64().unwrap()))
            .collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn any_forward_range_matches_vec_slicing(start in 0i64..14, len in 0i64..14) {
        let db = digits();
        let end = start + len;
        let rows = db.table("r").unwrap().slice(start..end).unwrap().collect_rows().unwrap();
        let expected: Vec<i64> = (0..10).filter(|i| *i >= start && *i < end).collect();
        prop_assert_eq!(first_ints(&rows), expected);
    }
}
