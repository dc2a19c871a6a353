//! Opening, closing, raw queries and the guarantee that malformed requests
//! never reach the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dbframe::io::{PreparedStatement, QueryExecutor, SqliteExecutor};
use dbframe::{CacheConfig, Catalog, Database, Error, ObjectKind, Predicate, Result, Value};

const SCRIPT: &str = "
    CREATE TABLE trees (id INTEGER PRIMARY KEY, species TEXT, height REAL);
    INSERT INTO trees VALUES (1, 'oak', 12.5), (2, 'ash', NULL), (3, 'oak', 7.0);
    CREATE TABLE sites (code INTEGER, name TEXT);
    INSERT INTO sites VALUES (10, 'north');
";

/// Delegates to SQLite and counts prepared statements.
struct Counting {
    inner: SqliteExecutor,
    prepared: Arc<AtomicUsize>,
}

impl QueryExecutor for Counting {
    fn prepare<'c>(&'c self, sql: &str) -> Result<Box<dyn PreparedStatement + 'c>> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        self.inner.prepare(sql)
    }

    fn describe_schema(&self) -> Result<Catalog> {
        self.inner.describe_schema()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

fn counting_db() -> (Database, Arc<AtomicUsize>) {
    let prepared = Arc::new(AtomicUsize::new(0));
    let exec = Counting {
        inner: SqliteExecutor::from_script(SCRIPT).unwrap(),
        prepared: Arc::clone(&prepared),
    };
    let db = Database::with_executor(Box::new(exec), CacheConfig::default()).unwrap();
    (db, prepared)
}

#[test]
fn build_errors_happen_before_any_statement() {
    let (db, prepared) = counting_db();
    let trees = db.table("trees").unwrap();
    let sites = db.table("sites").unwrap();
    let species = trees.column("species").unwrap();
    let height = trees.column("height").unwrap();

    assert!(matches!(db.table("shrubs"), Err(Error::Schema { .. })));
    assert!(matches!(trees.column("girth"), Err(Error::Schema { .. })));
    assert!(matches!(species.between("a", "z"), Err(Error::TypeMismatch(_))));
    assert!(matches!(height.gt("tall"), Err(Error::TypeMismatch(_))));
    assert!(matches!(height.lt(Value::Null), Err(Error::TypeMismatch(_))));
    assert!(matches!(height.like("1%"), Err(Error::TypeMismatch(_))));
    assert!(matches!(species.sum(), Err(Error::TypeMismatch(_))));

    let foreign = sites.column("code").unwrap().eq(10).unwrap();
    assert!(matches!(
        species.eq("oak").unwrap().and(foreign.clone()),
        Err(Error::CrossTablePredicate { .. })
    ));
    assert!(matches!(
        trees.filter(foreign.clone()),
        Err(Error::CrossTablePredicate { .. })
    ));
    // Operator form defers the check to compile time; still before I/O.
    let mixed = species.eq("oak").unwrap() & foreign;
    assert!(matches!(
        trees.count_where(&mixed),
        Err(Error::CrossTablePredicate { .. })
    ));

    assert!(matches!(trees.slice(-1..), Err(Error::Range(_))));
    assert!(matches!(trees.sort_by(["girth"]), Err(Error::Schema { .. })));

    assert_eq!(prepared.load(Ordering::SeqCst), 0);
}

#[test]
fn schema_error_names_the_alternatives() {
    let db = Database::open_in_memory(SCRIPT, CacheConfig::default()).unwrap();
    let msg = db.table("trees").unwrap().column("hieght").unwrap_err().to_string();
    assert!(msg.contains("hieght"));
    assert!(msg.contains("id, species, height"));
}

#[test]
fn engine_failures_carry_context_and_sql() {
    let db = Database::open_in_memory(SCRIPT, CacheConfig::default()).unwrap();
    match db.query("SELECT nope FROM trees", &[]) {
        Err(Error::QueryExecution { sql, .. }) => assert_eq!(sql, "SELECT nope FROM trees"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn raw_query_renames_repeated_columns() {
    let db = Database::open_in_memory(SCRIPT, CacheConfig::default()).unwrap();
    let (cols, rows) = db
        .query(
            "SELECT t.id, s.code, t.id, s.code, t.id FROM trees t, sites s WHERE t.species = ?",
            &[Value::from("ash")],
        )
        .unwrap();
    assert_eq!(cols, vec!["id", "code", "id_2", "code_2", "id_3"]);
    assert_eq!(rows.len(), 1);
}

#[test]
fn opens_files_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let script = dir.path().join("forest.sql");
    std::fs::write(&script, SCRIPT).unwrap();
    let db = Database::open(&script, CacheConfig::default()).unwrap();
    assert_eq!(db.table_names(), vec!["sites", "trees"]);

    for ext in ["db", "sqlite", "sqlite3"] {
        let path = dir.path().join(format!("forest.{ext}"));
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(SCRIPT)
            .unwrap();
        let db = Database::open(&path, CacheConfig::default()).unwrap();
        assert_eq!(db.table("trees").unwrap().len().unwrap(), 3);
        assert!(db.query("DELETE FROM trees", &[]).is_err());
    }

    let other = dir.path().join("forest.csv");
    std::fs::write(&other, "id,species\n").unwrap();
    assert!(matches!(
        Database::open(&other, CacheConfig::default()),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn views_and_temp_objects_are_read_only_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.db");
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(&format!(
            "{SCRIPT} CREATE VIEW oaks AS SELECT id, height FROM trees WHERE species = 'oak';"
        ))
        .unwrap();

    let db = Database::open(&path, CacheConfig::default()).unwrap();
    assert_eq!(db.views(), vec!["oaks"]);
    assert_eq!(db.table_names(), vec!["oaks", "sites", "trees"]);
    assert!(db.temp_tables().is_empty() && db.temp_views().is_empty());

    let oaks = db.table("oaks").unwrap();
    assert_eq!(oaks.kind(), ObjectKind::View);
    assert_eq!(oaks.column_names(), vec!["id", "height"]);
    assert_eq!(oaks.column("height").unwrap().sum().unwrap(), Value::Float(19.5));
    assert!(db.query("DELETE FROM trees", &[]).is_err());
    db.populate_cache().unwrap();

    let scripted = Database::open_in_memory(
        &format!("{SCRIPT} CREATE TEMP TABLE picks (id INTEGER); INSERT INTO picks VALUES (3);"),
        CacheConfig::default(),
    )
    .unwrap();
    assert_eq!(scripted.temp_tables(), vec!["picks"]);
    let picks = scripted.table("picks").unwrap();
    assert_eq!(picks.kind(), ObjectKind::TempTable);
    assert_eq!(picks.len().unwrap(), 1);
    assert!(scripted.query("INSERT INTO picks VALUES (4)", &[]).is_err());
}

#[test]
fn close_then_everything_fails() {
    let mut db = Database::open_in_memory(SCRIPT, CacheConfig::default()).unwrap();
    db.table("trees").unwrap().len().unwrap();
    db.close().unwrap();
    assert!(matches!(db.close(), Err(Error::ConnectionClosed)));
    assert!(matches!(db.table("trees"), Err(Error::ConnectionClosed)));
    assert!(matches!(db.tables(), Err(Error::ConnectionClosed)));
    assert!(matches!(db.populate_cache(), Err(Error::ConnectionClosed)));
}

#[test]
fn predicates_compose_across_builders() {
    let db = Database::open_in_memory(SCRIPT, CacheConfig::default()).unwrap();
    let trees = db.table("trees").unwrap();
    let species = trees.column("species").unwrap();
    let height = trees.column("height").unwrap();
    let p = species
        .is_in(["oak", "elm"])
        .unwrap()
        .and(height.between(5, 10).unwrap())
        .unwrap();
    assert_eq!(trees.count_where(&p).unwrap(), 1);
    assert_eq!(trees.count_where(&Predicate::is_null(height.handle())).unwrap(), 1);
    assert_eq!(trees.filter(!p).unwrap().count().unwrap(), 2);
}
