use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use ebert_core::domain::chat::{ChannelId, MessageId, MessageLocation};
use ebert_core::domain::movie::{ExternalId, Movie, MovieId, MovieLookup, NewMovie};
use ebert_core::domain::poll::{Poll, PollId, PollOption};

use super::{check_invariants, PollStore, RepositoryError};
use crate::DbPool;

pub struct SqlPollStore {
    pool: DbPool,
}

impl SqlPollStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_options(&self, poll_id: i64) -> Result<Vec<PollOption>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT pm.react, m.id, m.title, m.external_id
             FROM poll_movie pm
             JOIN movie m ON m.id = pm.movie_id
             WHERE pm.poll_id = ?
             ORDER BY pm.position ASC",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PollOption { react: row.try_get("react").map_err(decode)?, movie: row_to_movie(row)? })
            })
            .collect()
    }

    async fn hydrate(&self, row: Option<SqliteRow>) -> Result<Option<Poll>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut poll = row_to_poll(&row)?;
        if let Some(PollId(id)) = poll.id {
            poll.options = self.load_options(id).await?;
        }
        Ok(Some(poll))
    }
}

fn decode(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}

fn row_to_movie(row: &SqliteRow) -> Result<Movie, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode)?;
    let title: String = row.try_get("title").map_err(decode)?;
    let external_id: Option<i64> = row.try_get("external_id").map_err(decode)?;

    Ok(Movie { id: MovieId(id), title, external_id: external_id.map(ExternalId) })
}

fn row_to_poll(row: &SqliteRow) -> Result<Poll, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode)?;
    let open: bool = row.try_get("open").map_err(decode)?;
    let channel_id: String = row.try_get("channel_id").map_err(decode)?;
    let message_id: String = row.try_get("message_id").map_err(decode)?;
    let winner_id: Option<i64> = row.try_get("winner_id").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let closed_at: Option<String> = row.try_get("closed_at").map_err(decode)?;

    Ok(Poll {
        id: Some(PollId(id)),
        open,
        location: Some(MessageLocation {
            channel_id: ChannelId(channel_id),
            message_id: MessageId(message_id),
        }),
        options: Vec::new(),
        winner: winner_id.map(MovieId),
        created_at: parse_timestamp(&created_at)?,
        closed_at: closed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn write_options(
    tx: &mut Transaction<'_, Sqlite>,
    poll_id: i64,
    options: &[PollOption],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM poll_movie WHERE poll_id = ?").bind(poll_id).execute(&mut **tx).await?;

    for (position, option) in options.iter().enumerate() {
        sqlx::query(
            "INSERT INTO poll_movie (poll_id, movie_id, react, position) VALUES (?, ?, ?, ?)",
        )
        .bind(poll_id)
        .bind(option.movie.id.0)
        .bind(&option.react)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

const FIND_OPEN: &str = "SELECT id, open, channel_id, message_id, winner_id, created_at, closed_at
     FROM poll WHERE open = 1 LIMIT 1";
const FIND_BY_ID: &str = "SELECT id, open, channel_id, message_id, winner_id, created_at, closed_at
     FROM poll WHERE id = ?";

#[async_trait::async_trait]
impl PollStore for SqlPollStore {
    async fn find_open(&self) -> Result<Option<Poll>, RepositoryError> {
        let row = sqlx::query(FIND_OPEN)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    async fn create(&self, poll: &Poll) -> Result<PollId, RepositoryError> {
        check_invariants(poll)?;
        if !poll.open {
            return Err(RepositoryError::Invalid("only open polls can be created".to_string()));
        }
        let Some(location) = &poll.location else {
            return Err(RepositoryError::Invalid("poll has no status message location".to_string()));
        };

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM poll WHERE open = 1 LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(RepositoryError::OpenPollExists);
        }

        let inserted = sqlx::query(
            "INSERT INTO poll (open, channel_id, message_id, winner_id, created_at, closed_at)
             VALUES (1, ?, ?, NULL, ?, NULL)",
        )
        .bind(&location.channel_id.0)
        .bind(&location.message_id.0)
        .bind(poll.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        let poll_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(error) if is_unique_violation(&error) => return Err(RepositoryError::OpenPollExists),
            Err(error) => return Err(error.into()),
        };

        write_options(&mut tx, poll_id, &poll.options).await?;
        tx.commit().await?;

        Ok(PollId(poll_id))
    }

    async fn save(&self, poll: &Poll) -> Result<(), RepositoryError> {
        check_invariants(poll)?;
        let Some(PollId(poll_id)) = poll.id else {
            return Err(RepositoryError::Invalid("poll has not been created yet".to_string()));
        };
        let Some(location) = &poll.location else {
            return Err(RepositoryError::Invalid("poll has no status message location".to_string()));
        };

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE poll
             SET open = ?, channel_id = ?, message_id = ?, winner_id = ?, closed_at = ?
             WHERE id = ?",
        )
        .bind(poll.open)
        .bind(&location.channel_id.0)
        .bind(&location.message_id.0)
        .bind(poll.winner.map(|MovieId(id)| id))
        .bind(poll.closed_at.map(|dt| dt.to_rfc3339()))
        .bind(poll_id)
        .execute(&mut *tx)
        .await;

        let updated = match updated {
            Ok(result) => result,
            Err(error) if is_unique_violation(&error) => return Err(RepositoryError::OpenPollExists),
            Err(error) => return Err(error.into()),
        };
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Invalid(format!("poll {poll_id} does not exist")));
        }

        write_options(&mut tx, poll_id, &poll.options).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn find_movie(&self, lookup: &MovieLookup) -> Result<Option<Movie>, RepositoryError> {
        let row = match lookup {
            MovieLookup::ByExternalId(ExternalId(external_id)) => {
                sqlx::query("SELECT id, title, external_id FROM movie WHERE external_id = ?")
                    .bind(external_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            MovieLookup::ByTitle(title) => {
                sqlx::query("SELECT id, title, external_id FROM movie WHERE title = ?")
                    .bind(title)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.as_ref().map(row_to_movie).transpose()
    }

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie, RepositoryError> {
        let result = sqlx::query("INSERT INTO movie (title, external_id) VALUES (?, ?)")
            .bind(&movie.title)
            .bind(movie.external_id.map(|ExternalId(id)| id))
            .execute(&self.pool)
            .await?;

        Ok(Movie {
            id: MovieId(result.last_insert_rowid()),
            title: movie.title,
            external_id: movie.external_id,
        })
    }

    async fn update_movie(&self, movie: &Movie) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE movie SET title = ?, external_id = ? WHERE id = ?")
            .bind(&movie.title)
            .bind(movie.external_id.map(|ExternalId(id)| id))
            .bind(movie.id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Invalid(format!("movie {} does not exist", movie.id.0)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let row = sqlx::query(FIND_BY_ID)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    async fn polls_mentioning(&self, movie_id: MovieId) -> Result<Vec<PollId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT DISTINCT poll_id FROM poll_movie WHERE movie_id = ? ORDER BY poll_id ASC",
        )
        .bind(movie_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get::<i64, _>("poll_id").map(PollId).map_err(decode)).collect()
    }
}
