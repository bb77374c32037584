use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;

use crate::error::{Result, is_unique_violation};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateGenre {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(length(min = 1, max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct GenreShort {
    pub id: i64,
    pub name: String,
}

pub type GenreRepository = GenreRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct GenreRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> GenreRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateGenre) -> Result<Genre> {
        let result = sqlx::query("INSERT INTO genres (name, description) VALUES (?, ?)")
            .bind(&payload.name)
            .bind(&payload.description)
            .execute(&self.executor)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    debug!("Genre name already exists: {}", payload.name);
                    crate::Error::Conflict(format!("genre name '{}' already exists", payload.name))
                } else {
                    e.into()
                }
            })?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<GenreShort>> {
        let records = sqlx::query_as::<_, GenreShort>("SELECT id, name FROM genres ORDER BY id")
            .fetch(&self.executor)
            .take(limit.min(crate::MAX_LIMIT))
            .try_collect::<Vec<_>>()
            .await?;
        Ok(records)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM genres WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(crate::Error::RecordNotFound(format!("Genre {id}")))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Genre> {
        let record = sqlx::query_as::<_, Genre>(
            "SELECT id, name, description FROM genres WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| crate::Error::RecordNotFound(format!("Genre {id}")))?;
        Ok(record)
    }
}
