//! sqlite-adapter: SQLite implementation of the catalog ports.
//!
//! Purpose
//! - Durable, file-based storage for the course catalog, the university,
//!   category and country lookup lists, and the instructor directory.
//! - Implements `CourseRepository`, `TaxonomyRepository` and
//!   `InstructorDirectory` from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Courses are stored one row per record, keyed by id, with the record body
//!   as JSON (camelCase keys, same shape the domain serializes). A mutation
//!   only ever touches the rows it concerns.
//! - Lookup lists are keyed by their storage key (`courseUniversities`, ...)
//!   and start out with the built-in seed values.

use std::path::Path;
use std::sync::Mutex;

use domain::{
    CoreError, Course, CourseRepository, Instructor, InstructorDirectory, Slug, Taxonomy,
    TaxonomyRepository,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

/// SQLite-backed catalog storage.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }

    /// Add a name to the instructor directory. Returns false if it was
    /// already present.
    pub fn add_instructor(&self, name: &str) -> Result<bool, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::invalid("instructor", "must not be blank"));
        }
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO instructors(name) VALUES (?1)",
                params![name],
            )
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    pub fn remove_instructor(&self, name: &str) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM instructors WHERE name = ?1", params![name])
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            body TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS lookup_values (
            kind TEXT NOT NULL,
            value TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (kind, value)
        );
        CREATE INDEX IF NOT EXISTS idx_lookup_values_kind ON lookup_values(kind, position);
        CREATE TABLE IF NOT EXISTS instructors (
            name TEXT PRIMARY KEY
        );
        "#,
    )
    .map_err(map_sqerr)?;
    for kind in Taxonomy::ALL {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lookup_values WHERE kind = ?1",
                params![kind.storage_key()],
                |r| r.get(0),
            )
            .map_err(map_sqerr)?;
        if count == 0 {
            for (pos, value) in kind.seed().iter().enumerate() {
                conn.execute(
                    "INSERT OR IGNORE INTO lookup_values(kind, value, position) VALUES (?1, ?2, ?3)",
                    params![kind.storage_key(), value, pos as i64],
                )
                .map_err(map_sqerr)?;
            }
        }
    }
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

/// Map a write error, turning constraint violations into `AlreadyExists`.
fn map_write_err(e: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return CoreError::AlreadyExists;
        }
    }
    map_sqerr(e)
}

fn encode(course: &Course) -> Result<String, CoreError> {
    serde_json::to_string(course)
        .map_err(|e| CoreError::Repository(format!("encode course {}: {e}", course.id)))
}

fn decode(id: i64, body: &str) -> Result<Course, CoreError> {
    serde_json::from_str(body)
        .map_err(|e| CoreError::Repository(format!("corrupt course record {id}: {e}")))
}

impl CourseRepository for SqliteRepo {
    fn get(&self, id: u64) -> Result<Option<Course>, CoreError> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM courses WHERE id = ?1",
                params![id as i64],
                |r| r.get(0),
            )
            .optional()
            .map_err(map_sqerr)?;
        body.map(|b| decode(id as i64, &b)).transpose()
    }

    fn get_by_slug(&self, slug: &Slug) -> Result<Option<Course>, CoreError> {
        let conn = self.lock()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, body FROM courses WHERE slug = ?1",
                params![slug.as_str()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(map_sqerr)?;
        row.map(|(id, b)| decode(id, &b)).transpose()
    }

    fn slug_exists(&self, slug: &Slug) -> Result<bool, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM courses WHERE slug = ?1",
                params![slug.as_str()],
                |r| r.get(0),
            )
            .map_err(map_sqerr)?;
        Ok(count > 0)
    }

    fn put(&self, course: Course) -> Result<(), CoreError> {
        let body = encode(&course)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO courses(id, slug, body) VALUES (?1, ?2, ?3)",
            params![course.id as i64, course.slug.as_str(), body],
        )
        .map_err(map_write_err)?;
        Ok(())
    }

    fn update(&self, course: &Course) -> Result<(), CoreError> {
        let body = encode(course)?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE courses SET slug = ?1, body = ?2 WHERE id = ?3",
                params![course.slug.as_str(), body, course.id as i64],
            )
            .map_err(map_write_err)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn delete(&self, id: u64) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM courses WHERE id = ?1", params![id as i64])
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn list(&self) -> Result<Vec<Course>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, body FROM courses ORDER BY id ASC")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let id: i64 = row.get(0).map_err(map_sqerr)?;
            let body: String = row.get(1).map_err(map_sqerr)?;
            match decode(id, &body) {
                Ok(course) => out.push(course),
                Err(e) => warn!(course_id = id, error = %e, "skipping undecodable course row"),
            }
        }
        Ok(out)
    }

    fn max_id(&self) -> Result<Option<u64>, CoreError> {
        let conn = self.lock()?;
        let max: Option<i64> = conn
            .query_row("SELECT MAX(id) FROM courses", [], |r| r.get(0))
            .map_err(map_sqerr)?;
        Ok(max.map(|v| v as u64))
    }

    fn replace_all(&self, courses: Vec<Course>) -> Result<(), CoreError> {
        let mut encoded = Vec::with_capacity(courses.len());
        for course in &courses {
            encoded.push((course.id as i64, course.slug.as_str(), encode(course)?));
        }
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        tx.execute("DELETE FROM courses", []).map_err(map_sqerr)?;
        for (id, slug, body) in &encoded {
            tx.execute(
                "INSERT INTO courses(id, slug, body) VALUES (?1, ?2, ?3)",
                params![id, slug, body],
            )
            .map_err(map_write_err)?;
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().map_err(map_sqerr)?;
        Ok(())
    }
}

impl TaxonomyRepository for SqliteRepo {
    fn list(&self, kind: Taxonomy) -> Result<Vec<String>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT value FROM lookup_values WHERE kind = ?1 ORDER BY position ASC")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![kind.storage_key()]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let value: String = row.get(0).map_err(map_sqerr)?;
            if !value.trim().is_empty() {
                out.push(value);
            }
        }
        if out.is_empty() {
            return Ok(kind.seed().iter().map(|s| s.to_string()).collect());
        }
        Ok(out)
    }

    fn register(&self, kind: Taxonomy, value: &str) -> Result<bool, CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO lookup_values(kind, value, position)
                 VALUES (?1, ?2, (SELECT COALESCE(MAX(position), -1) + 1 FROM lookup_values WHERE kind = ?1))",
                params![kind.storage_key(), value],
            )
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn unregister(&self, kind: Taxonomy, value: &str) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM lookup_values WHERE kind = ?1 AND value = ?2",
            params![kind.storage_key(), value],
        )
        .map_err(map_sqerr)?;
        Ok(())
    }
}

impl InstructorDirectory for SqliteRepo {
    fn exists(&self, name: &str) -> Result<bool, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM instructors WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .map_err(map_sqerr)?;
        Ok(count > 0)
    }

    fn list(&self) -> Result<Vec<Instructor>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name FROM instructors ORDER BY name ASC")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(Instructor {
                name: row.get(0).map_err(map_sqerr)?,
            });
        }
        Ok(out)
    }
}
