use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;

use crate::error::{Result, is_foreign_key_violation};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateRating {
    #[garde(range(min = 1, max = 10))]
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct MovieRating {
    pub id: i64,
    pub movie_id: i64,
    pub score: i64,
    pub created_at: time::PrimitiveDateTime,
}

pub type RatingRepository = RatingRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct RatingRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> RatingRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Appends a rating. A missing movie is a normal outcome and signals
    /// [`crate::Error::RecordNotFound`]. Ratings are immutable once written,
    /// `created_at` is assigned by the store.
    pub async fn create(&self, movie_id: i64, payload: CreateRating) -> Result<MovieRating> {
        // the boundary rejects out-of-range scores already, but a bad value
        // must not slip through to the store either
        if !(1..=10).contains(&payload.score) {
            return Err(crate::Error::InvalidInput(format!(
                "score must be between 1 and 10, got {}",
                payload.score
            )));
        }

        let movie: Option<i64> = sqlx::query_scalar("SELECT id FROM movies WHERE id = ?")
            .bind(movie_id)
            .fetch_optional(&self.executor)
            .await?;
        if movie.is_none() {
            return Err(crate::Error::RecordNotFound(format!("Movie {movie_id}")));
        }

        let result = sqlx::query(
            "INSERT INTO movie_ratings (movie_id, score, created_at) VALUES (?, ?, datetime('now'))",
        )
        .bind(movie_id)
        .bind(payload.score)
        .execute(&self.executor)
        .await
        .map_err(|e| {
            // movie deleted between the existence check and the insert
            if is_foreign_key_violation(&e) {
                crate::Error::RecordNotFound(format!("Movie {movie_id}"))
            } else {
                e.into()
            }
        })?;

        let id = result.last_insert_rowid();
        debug!("Recorded rating {id} for movie {movie_id}");
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<MovieRating> {
        let record = sqlx::query_as::<_, MovieRating>(
            "SELECT id, movie_id, score, created_at FROM movie_ratings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| crate::Error::RecordNotFound(format!("Rating {id}")))?;
        Ok(record)
    }

    pub async fn list_for_movie(&self, movie_id: i64) -> Result<Vec<MovieRating>> {
        let records = sqlx::query_as::<_, MovieRating>(
            "SELECT id, movie_id, score, created_at FROM movie_ratings \
             WHERE movie_id = ? ORDER BY id",
        )
        .bind(movie_id)
        .fetch_all(&self.executor)
        .await?;
        Ok(records)
    }
}
