//! Song catalog repository
//!
//! Maps spoken or identified song titles to the presentation identifier
//! the backend needs (e.g. a ProPresenter library path). Title lookups are
//! case-insensitive.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

use super::{DbConn, DbPool};
use crate::{Error, Result};

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, title, identifier, artist, created_at, updated_at";

/// Song repository
#[derive(Clone)]
pub struct SongRepo {
    pool: DbPool,
}

impl SongRepo {
    /// Create a new song repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }

    /// All songs, by title
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<Song>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM songs ORDER BY title COLLATE NOCASE ASC"
        ))?;
        let songs = stmt
            .query_map([], row_to_song)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    /// Insert a song, or replace the identifier of an existing title
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank fields, or a database error
    pub fn upsert(&self, title: &str, identifier: &str, artist: Option<&str>) -> Result<Song> {
        let title = title.trim();
        let identifier = identifier.trim();
        if title.is_empty() || identifier.is_empty() {
            return Err(Error::InvalidInput(
                "song title and identifier are required".to_string(),
            ));
        }
        let artist = artist.map(str::trim).filter(|a| !a.is_empty());
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        let song = conn.query_row(
            &format!(
                "INSERT INTO songs (title, identifier, artist, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(title) DO UPDATE SET
                    identifier = excluded.identifier,
                    artist = COALESCE(excluded.artist, songs.artist),
                    updated_at = excluded.updated_at
                 RETURNING {COLUMNS}"
            ),
            params![title, identifier, artist, now],
            row_to_song,
        )?;

        tracing::debug!(id = song.id, title = %song.title, "song saved");
        Ok(song)
    }

    /// Remove a song; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM songs WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    /// Look up a song by title, ignoring case and surrounding whitespace
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_title(&self, title: &str) -> Result<Option<Song>> {
        let conn = self.conn()?;
        let song = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM songs WHERE title = ?1 COLLATE NOCASE"),
                [title.trim()],
                row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    /// Presentation identifier for a title
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn identifier_for(&self, title: &str) -> Result<Option<String>> {
        Ok(self.find_by_title(title)?.map(|s| s.identifier))
    }

    /// Number of songs
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

fn row_to_song(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        identifier: row.get(2)?,
        artist: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
