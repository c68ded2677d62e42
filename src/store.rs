//! Session store implementations
//!
//! `InMemorySessionStore` backs tests and fixtures. `SqliteSessionStore`
//! persists workouts, sessions and split times locally.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, RwLock};

use crate::error::StoreError;
use crate::models::{HeartRateZone, PremiumFields, SessionRecord, SplitTime, WorkoutCategory, WorkoutDefinition};
use crate::providers::SessionStore;

/// Volatile store holding workouts and sessions in memory
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    workouts: RwLock<Vec<WorkoutDefinition>>,
    sessions: RwLock<Vec<SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(workouts: Vec<WorkoutDefinition>, sessions: Vec<SessionRecord>) -> Self {
        Self {
            workouts: RwLock::new(workouts),
            sessions: RwLock::new(sessions),
        }
    }

    pub fn add_workout(&self, workout: WorkoutDefinition) -> Result<(), StoreError> {
        self.workouts.write().map_err(|_| poisoned())?.push(workout);
        Ok(())
    }

    pub fn add_session(&self, session: SessionRecord) -> Result<(), StoreError> {
        self.sessions.write().map_err(|_| poisoned())?.push(session);
        Ok(())
    }

    /// Snapshot of a stored session
    pub fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions
            .read()
            .ok()?
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable {
        reason: "store lock poisoned".to_string(),
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn fetch_sessions(&self, workout_id: Option<&str>) -> Result<Vec<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let mut matching: Vec<SessionRecord> = sessions
            .iter()
            .filter(|s| workout_id.map_or(true, |id| s.workout_id == id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(matching)
    }

    async fn fetch_workout(&self, workout_id: &str) -> Result<WorkoutDefinition, StoreError> {
        self.workouts
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .find(|w| w.id == workout_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                table: "workouts".to_string(),
                id: workout_id.to_string(),
            })
    }

    async fn save_premium_fields(&self, session_id: &str, fields: &PremiumFields) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| StoreError::NotFound {
                table: "sessions".to_string(),
                id: session_id.to_string(),
            })?;
        session.memoize(fields);
        Ok(())
    }
}

/// SQLite-backed session store
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| poisoned())
    }

    /// Insert or replace a workout definition
    pub fn insert_workout(&self, workout: &WorkoutDefinition) -> Result<(), StoreError> {
        let exercises = serde_json::to_string(&workout.exercises).map_err(|e| StoreError::Corrupt {
            table: "workouts".to_string(),
            reason: e.to_string(),
        })?;

        self.lock()?.execute(
            r#"
            INSERT OR REPLACE INTO workouts (
                id, title, exercises, category, rounds, fastest_time_seconds
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                workout.id,
                workout.title,
                exercises,
                workout.category.map(category_to_str),
                workout.rounds,
                workout.fastest_time_seconds,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a session together with its split times
    pub fn insert_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO sessions (
                id, workout_id, completed_at, duration_seconds, notes,
                intensity_score, composite_score, dominant_zone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                session.id,
                session.workout_id,
                session.completed_at,
                session.duration_seconds,
                session.notes,
                session.premium.intensity_score.map(|d| d.to_string()),
                session.premium.composite_score,
                session.premium.dominant_zone.map(|z| z.number()),
            ],
        )?;

        tx.execute("DELETE FROM split_times WHERE session_id = ?1", params![session.id])?;
        for split in &session.splits {
            tx.execute(
                "INSERT INTO split_times (session_id, position, duration_seconds) VALUES (?1, ?2, ?3)",
                params![session.id, split.order, split.duration_seconds],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_splits(conn: &Connection, session_id: &str) -> Result<Vec<SplitTime>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT position, duration_seconds FROM split_times WHERE session_id = ?1 ORDER BY position",
        )?;
        let splits = stmt
            .query_map(params![session_id], |row| {
                Ok(SplitTime {
                    order: row.get(0)?,
                    duration_seconds: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(splits)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS workouts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            exercises TEXT NOT NULL,
            category TEXT,
            rounds INTEGER,
            fastest_time_seconds INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            workout_id TEXT NOT NULL,
            completed_at DATETIME NOT NULL,
            duration_seconds INTEGER NOT NULL,
            notes TEXT NOT NULL DEFAULT '',

            -- Memoized premium metrics
            intensity_score TEXT,
            composite_score INTEGER,
            dominant_zone INTEGER,

            FOREIGN KEY (workout_id) REFERENCES workouts (id)
        );

        CREATE TABLE IF NOT EXISTS split_times (
            session_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            duration_seconds INTEGER NOT NULL,
            PRIMARY KEY (session_id, position),
            FOREIGN KEY (session_id) REFERENCES sessions (id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_workout_date ON sessions (workout_id, completed_at);
        "#,
    )?;
    Ok(())
}

fn category_to_str(category: WorkoutCategory) -> String {
    match serde_json::to_value(category) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "other".to_string(),
    }
}

fn category_from_str(value: &str) -> Result<WorkoutCategory, StoreError> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| StoreError::Corrupt {
        table: "workouts".to_string(),
        reason: format!("unknown category '{}': {}", value, e),
    })
}

fn row_to_workout(row: &Row) -> rusqlite::Result<(WorkoutDefinition, String, Option<String>)> {
    let exercises: String = row.get(2)?;
    let category: Option<String> = row.get(3)?;
    Ok((
        WorkoutDefinition {
            id: row.get(0)?,
            title: row.get(1)?,
            exercises: Vec::new(),
            category: None,
            rounds: row.get(4)?,
            fastest_time_seconds: row.get(5)?,
        },
        exercises,
        category,
    ))
}

struct SessionRow {
    session: SessionRecord,
    intensity: Option<String>,
    zone: Option<u8>,
}

fn row_to_session(row: &Row) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        session: SessionRecord {
            id: row.get(0)?,
            workout_id: row.get(1)?,
            completed_at: row.get(2)?,
            duration_seconds: row.get(3)?,
            splits: Vec::new(),
            notes: row.get(4)?,
            premium: PremiumFields {
                intensity_score: None,
                composite_score: row.get(6)?,
                dominant_zone: None,
            },
        },
        intensity: row.get(5)?,
        zone: row.get(7)?,
    })
}

impl SessionRow {
    fn decode(mut self, conn: &Connection) -> Result<SessionRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            table: "sessions".to_string(),
            reason,
        };
        if let Some(raw) = self.intensity {
            let score = Decimal::from_str(&raw).map_err(|e| corrupt(format!("intensity '{}': {}", raw, e)))?;
            self.session.premium.intensity_score = Some(score);
        }
        if let Some(number) = self.zone {
            let zone = HeartRateZone::from_number(number).ok_or_else(|| corrupt(format!("zone {}", number)))?;
            self.session.premium.dominant_zone = Some(zone);
        }
        self.session.splits = SqliteSessionStore::load_splits(conn, &self.session.id)?;
        Ok(self.session)
    }
}

const SESSION_COLUMNS: &str = "id, workout_id, completed_at, duration_seconds, notes, \
     intensity_score, composite_score, dominant_zone";

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn fetch_sessions(&self, workout_id: Option<&str>) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.lock()?;
        let rows = match workout_id {
            Some(id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sessions WHERE workout_id = ?1 ORDER BY completed_at DESC",
                    SESSION_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![id], row_to_session)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sessions ORDER BY completed_at DESC",
                    SESSION_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], row_to_session)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        rows.into_iter().map(|row| row.decode(&conn)).collect()
    }

    async fn fetch_workout(&self, workout_id: &str) -> Result<WorkoutDefinition, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT id, title, exercises, category, rounds, fastest_time_seconds FROM workouts WHERE id = ?1",
                params![workout_id],
                row_to_workout,
            )
            .optional()?;

        let (mut workout, exercises, category) = found.ok_or_else(|| StoreError::NotFound {
            table: "workouts".to_string(),
            id: workout_id.to_string(),
        })?;

        workout.exercises = serde_json::from_str(&exercises).map_err(|e| StoreError::Corrupt {
            table: "workouts".to_string(),
            reason: e.to_string(),
        })?;
        workout.category = category.as_deref().map(category_from_str).transpose()?;
        Ok(workout)
    }

    async fn save_premium_fields(&self, session_id: &str, fields: &PremiumFields) -> Result<(), StoreError> {
        let updated = self.lock()?.execute(
            r#"
            UPDATE sessions SET
                intensity_score = COALESCE(?2, intensity_score),
                composite_score = COALESCE(?3, composite_score),
                dominant_zone = COALESCE(?4, dominant_zone)
            WHERE id = ?1
            "#,
            params![
                session_id,
                fields.intensity_score.map(|d| d.to_string()),
                fields.composite_score,
                fields.dominant_zone.map(|z| z.number()),
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound {
                table: "sessions".to_string(),
                id: session_id.to_string(),
            });
        }
        Ok(())
    }
}
