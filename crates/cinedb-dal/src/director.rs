use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;

use crate::error::{Result, is_foreign_key_violation};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateDirector {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(skip)]
    pub birth_year: Option<i64>,
    #[garde(length(min = 1, max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Director {
    pub id: i64,
    pub name: String,
    pub birth_year: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct DirectorShort {
    pub id: i64,
    pub name: String,
}

pub type DirectorRepository = DirectorRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct DirectorRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> DirectorRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateDirector) -> Result<Director> {
        let result =
            sqlx::query("INSERT INTO directors (name, birth_year, description) VALUES (?, ?, ?)")
                .bind(&payload.name)
                .bind(payload.birth_year)
                .bind(&payload.description)
                .execute(&self.executor)
                .await?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<DirectorShort>> {
        let records =
            sqlx::query_as::<_, DirectorShort>("SELECT id, name FROM directors ORDER BY id")
                .fetch(&self.executor)
                .take(limit.min(crate::MAX_LIMIT))
                .try_collect::<Vec<_>>()
                .await?;
        Ok(records)
    }

    /// Fails with [`crate::Error::Conflict`] while the director still owns
    /// movies (RESTRICT on movies.director_id).
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM directors WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    debug!("Refused to delete director {id}, movies still reference it");
                    crate::Error::Conflict(format!("director {id} still has movies"))
                } else {
                    e.into()
                }
            })?;

        if res.rows_affected() == 0 {
            Err(crate::Error::RecordNotFound(format!("Director {id}")))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Director> {
        let record = sqlx::query_as::<_, Director>(
            "SELECT id, name, birth_year, description FROM directors WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| crate::Error::RecordNotFound(format!("Director {id}")))?;
        Ok(record)
    }
}
