//! SQLite-backed storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{EmailStore, IdPair, SenderRow, UserStore};
use crate::error::StoreError;
use crate::models::{labels, CredentialSet, EmailRecord, GmailId, User, UserId};

/// Database migrations, applied in order; the user_version pragma tracks
/// which have run.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: initial schema
        M::up(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT '',
                access_token TEXT,
                refresh_token TEXT,
                token_expiry TEXT
            );

            -- One row per mirrored Gmail message. gmail_id uniqueness is
            -- global; it is what makes re-sync idempotent.
            CREATE TABLE emails (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                gmail_id TEXT NOT NULL UNIQUE,
                thread_id TEXT NOT NULL DEFAULT '',
                from_header TEXT NOT NULL DEFAULT '',
                to_header TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                snippet TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                labels TEXT NOT NULL DEFAULT '[]',
                is_read INTEGER NOT NULL DEFAULT 0,
                is_starred INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_emails_user_date ON emails(user_id, date DESC);
            CREATE INDEX idx_emails_user ON emails(user_id);
            "#,
        ),
    ])
}

/// SQLite implementation of [`EmailStore`] and [`UserStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL for concurrent readers during writes; NORMAL sync is safe
        // with WAL; foreign_keys needed for ON DELETE CASCADE
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

const EMAIL_COLUMNS: &str = "id, user_id, gmail_id, thread_id, from_header, to_header, \
     subject, snippet, body, date, labels, is_read, is_starred";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmailRecord> {
    let date_text: String = row.get(9)?;
    let labels_json: String = row.get(10)?;

    let date = DateTime::parse_from_rfc3339(&date_text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let labels: Vec<String> = serde_json::from_str(&labels_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(EmailRecord {
        local_id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        gmail_id: GmailId::new(row.get::<_, String>(2)?),
        thread_id: row.get(3)?,
        from: row.get(4)?,
        to: row.get(5)?,
        subject: row.get(6)?,
        snippet: row.get(7)?,
        body: row.get(8)?,
        date,
        labels,
        is_read: row.get(11)?,
        is_starred: row.get(12)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl EmailStore for SqliteStore {
    fn insert_email(&self, record: EmailRecord) -> Result<EmailRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let labels_json =
            serde_json::to_string(&record.labels).map_err(|e| StoreError::Backend(e.into()))?;

        let result = conn.execute(
            "INSERT INTO emails (user_id, gmail_id, thread_id, from_header, to_header, \
             subject, snippet, body, date, labels, is_read, is_starred) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.user_id.0,
                record.gmail_id.as_str(),
                record.thread_id,
                record.from,
                record.to,
                record.subject,
                record.snippet,
                record.body,
                record.date.to_rfc3339(),
                labels_json,
                record.is_read,
                record.is_starred,
            ],
        );

        match result {
            Ok(_) => Ok(record.with_local_id(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate(record.gmail_id)),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_gmail_id(&self, gmail_id: &GmailId) -> Result<Option<EmailRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE gmail_id = ?1"),
                [gmail_id.as_str()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_email(&self, user_id: UserId, local_id: i64) -> Result<Option<EmailRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1 AND user_id = ?2"),
                params![local_id, user_id.0],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_page(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EmailRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EMAIL_COLUMNS} FROM emails WHERE user_id = ?1 \
             ORDER BY date DESC LIMIT ?2 OFFSET ?3"
        ))?;

        let records = stmt
            .query_map(params![user_id.0, limit as i64, offset as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count_for_user(&self, user_id: UserId) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM emails WHERE user_id = ?1",
            [user_id.0],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn id_pairs_for_user(&self, user_id: UserId) -> Result<Vec<IdPair>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, gmail_id FROM emails WHERE user_id = ?1")?;

        let pairs = stmt
            .query_map([user_id.0], |row| {
                Ok(IdPair {
                    local_id: row.get(0)?,
                    gmail_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    fn sender_rows_for_user(&self, user_id: UserId) -> Result<Vec<SenderRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, gmail_id, from_header FROM emails WHERE user_id = ?1")?;

        let rows = stmt
            .query_map([user_id.0], |row| {
                Ok(SenderRow {
                    local_id: row.get(0)?,
                    gmail_id: GmailId::new(row.get::<_, String>(1)?),
                    from: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_by_local_ids(&self, user_id: UserId, local_ids: &[i64]) -> Result<usize, StoreError> {
        if local_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock().unwrap();
        let mut deleted = 0;

        // Chunked to stay under the SQLite bound-parameter limit
        for chunk in local_ids.chunks(500) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "DELETE FROM emails WHERE user_id = ? AND id IN ({placeholders})"
            );
            let bind: Vec<i64> = std::iter::once(user_id.0)
                .chain(chunk.iter().copied())
                .collect();
            deleted += conn.execute(&sql, rusqlite::params_from_iter(bind))?;
        }

        Ok(deleted)
    }

    fn set_read(&self, user_id: UserId, local_id: i64, is_read: bool) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(StoreError::from)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT labels FROM emails WHERE id = ?1 AND user_id = ?2",
                params![local_id, user_id.0],
                |row| row.get(0),
            )
            .optional()?;

        let Some(labels_json) = existing else {
            return Ok(false);
        };

        let mut label_set: Vec<String> =
            serde_json::from_str(&labels_json).map_err(|e| StoreError::Backend(e.into()))?;
        if is_read {
            label_set.retain(|l| l != labels::UNREAD);
        } else if !label_set.iter().any(|l| l == labels::UNREAD) {
            label_set.push(labels::UNREAD.to_string());
        }

        let updated =
            serde_json::to_string(&label_set).map_err(|e| StoreError::Backend(e.into()))?;
        tx.execute(
            "UPDATE emails SET is_read = ?1, labels = ?2 WHERE id = ?3 AND user_id = ?4",
            params![is_read, updated, local_id, user_id.0],
        )?;
        tx.commit().map_err(StoreError::from)?;
        Ok(true)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM emails", [])?;
        Ok(())
    }
}

impl UserStore for SqliteStore {
    fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (email, name, access_token, refresh_token, token_expiry) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.email,
                user.name,
                user.credentials.access_token,
                user.credentials.refresh_token,
                user.credentials.expires_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        user.id = UserId(conn.last_insert_rowid());
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                "SELECT id, email, name, access_token, refresh_token, token_expiry \
                 FROM users WHERE id = ?1",
                [id.0],
                |row| {
                    let expiry_text: Option<String> = row.get(5)?;
                    let expires_at = expiry_text
                        .as_deref()
                        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                        .map(|d| d.with_timezone(&Utc));
                    Ok(User {
                        id: UserId(row.get(0)?),
                        email: row.get(1)?,
                        name: row.get(2)?,
                        credentials: CredentialSet {
                            access_token: row.get(3)?,
                            refresh_token: row.get(4)?,
                            expires_at,
                        },
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn save_credentials(&self, id: UserId, credentials: &CredentialSet) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET access_token = ?1, refresh_token = ?2, token_expiry = ?3 \
             WHERE id = ?4",
            params![
                credentials.access_token,
                credentials.refresh_token,
                credentials.expires_at.map(|d| d.to_rfc3339()),
                id.0,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user: i64, gmail_id: &str, age_hours: i64) -> EmailRecord {
        EmailRecord::builder(UserId(user), GmailId::new(gmail_id))
            .thread_id("t1")
            .from("Alice <alice@example.com>")
            .subject("Hello")
            .labels(vec!["INBOX".into(), "UNREAD".into()])
            .is_read(false)
            .date(Utc::now() - Duration::hours(age_hours))
            .build()
    }

    fn store_with_user() -> (SqliteStore, UserId) {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.insert_user(User::new("a@b.com", "A")).unwrap();
        (store, user.id)
    }

    #[test]
    fn test_insert_and_find_roundtrip() {
        let (store, user_id) = store_with_user();
        let inserted = store.insert_email(record(user_id.0, "g1", 1)).unwrap();
        assert!(inserted.local_id > 0);

        let found = store.find_by_gmail_id(&GmailId::new("g1")).unwrap().unwrap();
        assert_eq!(found.local_id, inserted.local_id);
        assert_eq!(found.subject, "Hello");
        assert_eq!(found.labels, vec!["INBOX", "UNREAD"]);
        assert!(!found.is_read);
    }

    #[test]
    fn test_duplicate_insert_is_typed() {
        let (store, user_id) = store_with_user();
        store.insert_email(record(user_id.0, "g1", 1)).unwrap();
        let err = store.insert_email(record(user_id.0, "g1", 2)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id.as_str() == "g1"));
    }

    #[test]
    fn test_list_page_order_and_offset() {
        let (store, user_id) = store_with_user();
        for (id, age) in [("g1", 3), ("g2", 1), ("g3", 2)] {
            store.insert_email(record(user_id.0, id, age)).unwrap();
        }

        let page = store.list_page(user_id, 2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].gmail_id.as_str(), "g3");
        assert_eq!(page[1].gmail_id.as_str(), "g1");
    }

    #[test]
    fn test_bulk_delete_scoped_to_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        let u1 = store.insert_user(User::new("a@b.com", "A")).unwrap().id;
        let u2 = store.insert_user(User::new("c@d.com", "C")).unwrap().id;

        let mine = store.insert_email(record(u1.0, "g1", 1)).unwrap();
        let theirs = store.insert_email(record(u2.0, "g2", 1)).unwrap();

        let deleted = store
            .delete_by_local_ids(u1, &[mine.local_id, theirs.local_id])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_for_user(u2).unwrap(), 1);
    }

    #[test]
    fn test_set_read_updates_labels() {
        let (store, user_id) = store_with_user();
        let inserted = store.insert_email(record(user_id.0, "g1", 1)).unwrap();

        assert!(store.set_read(user_id, inserted.local_id, true).unwrap());
        let updated = store.get_email(user_id, inserted.local_id).unwrap().unwrap();
        assert!(updated.is_read);
        assert_eq!(updated.labels, vec!["INBOX"]);
    }

    #[test]
    fn test_user_credentials_roundtrip() {
        let (store, user_id) = store_with_user();
        let credentials = CredentialSet {
            access_token: Some("tok".into()),
            refresh_token: Some("refresh".into()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        };
        store.save_credentials(user_id, &credentials).unwrap();

        let loaded = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(loaded.credentials.access_token.as_deref(), Some("tok"));
        assert_eq!(loaded.credentials.refresh_token.as_deref(), Some("refresh"));
        assert!(loaded.credentials.expires_at.is_some());
    }
}
