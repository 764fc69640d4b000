//! Integration tests against in-memory SQLite.

use std::io::Write;

use recordset::{
    Connection, ConnectionConfig, CsvLoader, CursorSettings, Error, ParamType, Statement,
    UpdateTarget, Value,
};

async fn open_seeded() -> Connection {
    let mut conn = Connection::open(ConnectionConfig::sqlite_in_memory())
        .await
        .unwrap();
    conn.runner()
        .execute_change(&Statement::new(
            "CREATE TABLE students (
                student_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                age INTEGER,
                phone BIGINT
            )",
        ))
        .await
        .unwrap();
    for (id, name, age, phone) in [
        (1, "Alice", 22, 9_991_112_222i64),
        (2, "Bob", 25, 9_992_223_333),
        (3, "Charlie", 21, 9_993_334_444),
    ] {
        let inserted = conn
            .runner()
            .execute_change(
                &Statement::new(
                    "INSERT INTO students (student_id, name, age, phone) VALUES (?, ?, ?, ?)",
                )
                .bind(ParamType::Int, id)
                .bind(ParamType::Text, name)
                .bind(ParamType::Int, age)
                .bind(ParamType::BigInt, phone),
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);
    }
    conn
}

#[test]
fn query_roundtrip_and_parameter_filter() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT name, age FROM students WHERE age > ? ORDER BY age")
            .bind(ParamType::Int, 21);
        let mut cursor = conn.runner().query(&stmt).await.unwrap();

        let mut seen = Vec::new();
        while cursor.next().unwrap() {
            let name = cursor.get("name").unwrap().as_str().unwrap().to_string();
            let age = cursor.get("age").unwrap().as_i64().unwrap();
            seen.push((name, age));
        }
        assert_eq!(
            seen,
            vec![("Alice".to_string(), 22), ("Bob".to_string(), 25)]
        );

        // exhausted cursor stays exhausted
        assert!(!cursor.next().unwrap());
    });
}

#[test]
fn column_metadata_matches_projection() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT student_id, name AS student_name, phone FROM students");
        let cursor = conn.runner().query(&stmt).await.unwrap();

        let meta = cursor.column_metadata();
        assert_eq!(meta.len(), 3);
        assert_eq!(meta[0].name, "student_id");
        assert_eq!(meta[1].name, "student_name");
        assert_eq!(meta[2].name, "phone");
        assert_eq!(meta[0].ordinal, 0);
        assert_eq!(meta[2].ordinal, 2);
        assert!(meta[0].type_name.to_uppercase().contains("INT"));
        // display width covers at least the header
        assert!(meta[1].display_width >= "student_name".len());
        assert_eq!(cursor.row_count(), 3);
    });
}

#[test]
fn binding_validation_rejects_bad_statements() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        // too few values
        let stmt = Statement::new("UPDATE students SET age = ? WHERE student_id = ?")
            .bind(ParamType::Int, 23);
        let err = conn.runner().execute_change(&stmt).await.unwrap_err();
        assert!(err.is_binding(), "expected binding error, got {err}");

        // declared int, bound text
        let stmt = Statement::new("UPDATE students SET age = ? WHERE student_id = ?")
            .bind(ParamType::Int, "twenty-three")
            .bind(ParamType::Int, 1);
        let err = conn.runner().execute_change(&stmt).await.unwrap_err();
        assert!(err.is_binding());

        // nothing was executed
        let stmt = Statement::new("SELECT age FROM students WHERE student_id = ?")
            .bind(ParamType::Int, 1);
        let mut cursor = conn.runner().query(&stmt).await.unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get("age").unwrap().as_i64(), Some(22));
    });
}

#[test]
fn execute_change_reports_affected_rows() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("UPDATE students SET age = age + 1 WHERE age >= ?")
            .bind(ParamType::Int, 22);
        assert_eq!(conn.runner().execute_change(&stmt).await.unwrap(), 2);

        let stmt = Statement::new("DELETE FROM students WHERE student_id = ?")
            .bind(ParamType::Int, 99);
        assert_eq!(conn.runner().execute_change(&stmt).await.unwrap(), 0);
    });
}

#[test]
fn forward_only_cursor_rejects_scrolling() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT name FROM students ORDER BY student_id");
        let mut cursor = conn.runner().query(&stmt).await.unwrap();

        // no current row before the first next()
        assert!(cursor.get("name").unwrap_err().is_cursor());

        assert!(cursor.absolute(2).unwrap_err().is_cursor());
        assert!(cursor.first().unwrap_err().is_cursor());
        assert!(cursor.last().unwrap_err().is_cursor());
        assert!(cursor.before_first().unwrap_err().is_cursor());

        // forward iteration still works after the rejected scrolls
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));
    });
}

#[test]
fn scrollable_cursor_repositions() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT name FROM students ORDER BY student_id");
        let mut cursor = conn
            .runner()
            .query_with(&stmt, CursorSettings::scrollable())
            .await
            .unwrap();

        assert!(cursor.absolute(2).unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Bob"));

        assert!(cursor.last().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Charlie"));

        assert!(cursor.absolute(-3).unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));

        // past the end
        assert!(!cursor.absolute(10).unwrap());
        assert!(cursor.get("name").unwrap_err().is_cursor());

        // zero means before-first; iteration restarts
        assert!(!cursor.absolute(0).unwrap());
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));

        cursor.before_first().unwrap();
        assert!(cursor.first().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));
    });
}

#[test]
fn read_only_cursor_rejects_updates() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT name FROM students ORDER BY student_id");
        let mut cursor = conn
            .runner()
            .query_with(&stmt, CursorSettings::scrollable())
            .await
            .unwrap();

        assert!(cursor.first().unwrap());
        assert!(cursor.update_column("name", "Nope").unwrap_err().is_cursor());
        assert!(cursor.move_to_insert_row().unwrap_err().is_cursor());
    });
}

#[test]
fn updatable_cursor_commits_in_place() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new(
            "SELECT student_id, name, age FROM students ORDER BY student_id",
        );
        let settings = CursorSettings::scrollable()
            .updatable(UpdateTarget::new("students", "student_id"));
        let mut cursor = conn.runner().query_with(&stmt, settings).await.unwrap();

        assert!(cursor.absolute(2).unwrap());
        cursor.update_column("name", "UpdatedBob").unwrap();
        cursor.update_column("age", 26).unwrap();
        cursor.update_row().await.unwrap();

        // the materialized row reflects the committed values
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("UpdatedBob"));
        assert_eq!(cursor.get("age").unwrap().as_i64(), Some(26));

        // update target's table lands in the metadata
        assert_eq!(
            cursor.column_metadata()[1].table.as_deref(),
            Some("students")
        );
        drop(cursor);

        // and the change is visible to a fresh query
        let stmt = Statement::new("SELECT name, age FROM students WHERE student_id = ?")
            .bind(ParamType::Int, 2);
        let mut check = conn.runner().query(&stmt).await.unwrap();
        assert!(check.next().unwrap());
        assert_eq!(check.get("name").unwrap().as_str(), Some("UpdatedBob"));
        assert_eq!(check.get("age").unwrap().as_i64(), Some(26));
    });
}

#[test]
fn update_row_with_empty_stage_is_a_noop() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT student_id, name FROM students ORDER BY student_id");
        let settings = CursorSettings::scrollable()
            .updatable(UpdateTarget::new("students", "student_id"));
        let mut cursor = conn.runner().query_with(&stmt, settings).await.unwrap();

        assert!(cursor.first().unwrap());
        cursor.update_row().await.unwrap();
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));
    });
}

#[test]
fn repositioning_discards_staged_changes() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT student_id, name FROM students ORDER BY student_id");
        let settings = CursorSettings::scrollable()
            .updatable(UpdateTarget::new("students", "student_id"));
        let mut cursor = conn.runner().query_with(&stmt, settings).await.unwrap();

        assert!(cursor.first().unwrap());
        cursor.update_column("name", "Abandoned").unwrap();
        assert!(cursor.absolute(2).unwrap());
        assert!(cursor.first().unwrap());
        // the stage was cleared; committing changes nothing
        cursor.update_row().await.unwrap();
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));
    });
}

#[test]
fn insert_row_through_updatable_cursor() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new(
            "SELECT student_id, name, age, phone FROM students ORDER BY student_id",
        );
        let settings = CursorSettings::scrollable()
            .updatable(UpdateTarget::new("students", "student_id"));
        let mut cursor = conn.runner().query_with(&stmt, settings).await.unwrap();

        assert!(cursor.absolute(2).unwrap());
        cursor.move_to_insert_row().unwrap();

        // navigation is invalid while positioned on the insert row
        assert!(cursor.next().unwrap_err().is_cursor());
        assert!(cursor.absolute(1).unwrap_err().is_cursor());

        cursor.update_column("student_id", 4).unwrap();
        cursor.update_column("name", "Divyesh").unwrap();
        cursor.update_column("age", 20).unwrap();
        cursor.update_column("phone", 9_997_771_723i64).unwrap();
        cursor.insert_row().await.unwrap();

        // position restored to where the cursor was before insert mode
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Bob"));
        drop(cursor);

        let stmt = Statement::new("SELECT name FROM students WHERE student_id = ?")
            .bind(ParamType::Int, 4);
        let mut check = conn.runner().query(&stmt).await.unwrap();
        assert!(check.next().unwrap());
        assert_eq!(check.get("name").unwrap().as_str(), Some("Divyesh"));
    });
}

#[test]
fn insert_row_requires_a_buffer_and_the_insert_position() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let stmt = Statement::new("SELECT student_id, name FROM students ORDER BY student_id");
        let settings = CursorSettings::scrollable()
            .updatable(UpdateTarget::new("students", "student_id"));
        let mut cursor = conn.runner().query_with(&stmt, settings).await.unwrap();

        assert!(cursor.first().unwrap());
        assert!(cursor.insert_row().await.unwrap_err().is_cursor());

        cursor.move_to_insert_row().unwrap();
        assert!(cursor.insert_row().await.unwrap_err().is_cursor());

        // leaving insert mode discards the buffer and restores the position
        cursor.update_column("name", "Ghost").unwrap();
        cursor.move_to_current_row().unwrap();
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Alice"));
    });
}

#[test]
fn csv_bulk_load_inserts_typed_rows() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "student_id,name,age,phone").unwrap();
        writeln!(file, "10,Daisy,23,9990001111").unwrap();
        writeln!(file, "11,Evan,,").unwrap();
        drop(file);

        let loader = CsvLoader::new("students", &path)
            .column("student_id", ParamType::Int)
            .column("name", ParamType::Text)
            .column("age", ParamType::Int)
            .column("phone", ParamType::BigInt);
        assert_eq!(loader.load(&mut conn).await.unwrap(), 2);

        let stmt = Statement::new(
            "SELECT name, age, phone FROM students WHERE student_id >= ? ORDER BY student_id",
        )
        .bind(ParamType::Int, 10);
        let mut cursor = conn.runner().query(&stmt).await.unwrap();

        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Daisy"));
        assert_eq!(cursor.get("phone").unwrap().as_i64(), Some(9_990_001_111));

        // empty fields load as NULL
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Evan"));
        assert_eq!(*cursor.get("age").unwrap(), Value::Null);
        assert_eq!(*cursor.get("phone").unwrap(), Value::Null);
    });
}

#[test]
fn csv_bulk_load_reports_conversion_failures() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "student_id,name,age,phone").unwrap();
        writeln!(file, "20,Fran,24,9990002222").unwrap();
        writeln!(file, "21,Gus,twenty,9990003333").unwrap();
        drop(file);

        let loader = CsvLoader::new("students", &path)
            .column("student_id", ParamType::Int)
            .column("name", ParamType::Text)
            .column("age", ParamType::Int)
            .column("phone", ParamType::BigInt);
        let err = loader.load(&mut conn).await.unwrap_err();
        assert!(err.is_binding(), "expected binding error, got {err}");
        assert!(err.to_string().contains("age"));

        // records before the failure stay inserted
        let stmt = Statement::new("SELECT name FROM students WHERE student_id = ?")
            .bind(ParamType::Int, 20);
        let mut cursor = conn.runner().query(&stmt).await.unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get("name").unwrap().as_str(), Some("Fran"));
    });
}

#[test]
fn csv_bulk_load_missing_file_is_a_bulk_load_error() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let loader = CsvLoader::new("students", "/nonexistent/students.csv")
            .column("student_id", ParamType::Int);
        let err = loader.load(&mut conn).await.unwrap_err();
        assert!(matches!(err, Error::BulkLoad { .. }), "got {err}");
    });
}

#[test]
fn stored_routines_are_rejected_on_sqlite() {
    smol::block_on(async {
        let mut conn = open_seeded().await;

        let err = conn
            .runner()
            .call_procedure("getAllStudents", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Statement { .. }), "got {err}");

        // a bad routine name fails validation before reaching the driver
        let err = conn
            .runner()
            .call_procedure("students; DROP TABLE students", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Statement { .. }));
    });
}

#[test]
fn close_is_idempotent_and_terminal() {
    smol::block_on(async {
        let mut conn = open_seeded().await;
        assert!(conn.is_open());

        conn.close().await.unwrap();
        assert!(!conn.is_open());
        conn.close().await.unwrap();

        let stmt = Statement::new("SELECT name FROM students");
        let err = conn.runner().query(&stmt).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }), "got {err}");
    });
}

#[test]
fn open_rejects_mismatched_parameters() {
    smol::block_on(async {
        let config = ConnectionConfig::new(
            recordset::DatabaseType::SQLite,
            recordset::ConnectionParams::server("localhost", 3306, "db", "user", "pw"),
        );
        let err = Connection::open(config).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }), "got {err}");
    });
}
