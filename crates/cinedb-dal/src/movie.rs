use std::collections::HashMap;

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, QueryBuilder, Row as _, SqliteConnection};
use tracing::debug;

use crate::{
    Batch, ChosenRow, ListingParams,
    director::{Director, DirectorShort},
    error::{Result, is_foreign_key_violation},
    genre::GenreShort,
};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[garde(allow_unvalidated)]
pub struct CreateMovie {
    #[garde(length(min = 1, max = 255))]
    pub title: String,
    #[garde(range(min = 1))]
    pub director_id: i64,
    pub release_year: i64,
    #[garde(inner(length(min = 1, max = 5000)))]
    pub cast: Option<String>,
    pub genre_ids: Option<Vec<i64>>,
}

/// Partial update. A field left at `None` keeps its stored value. For the
/// nullable `cast` an explicit JSON null clears it (`Some(None)`), which is
/// why it is deserialized into a double `Option`. `genre_ids: Some(vec![])`
/// removes all genre links, `None` leaves them untouched.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[garde(allow_unvalidated)]
pub struct UpdateMovie {
    #[garde(inner(length(min = 1, max = 255)))]
    pub title: Option<String>,
    #[garde(inner(range(min = 1)))]
    pub director_id: Option<i64>,
    pub release_year: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub cast: Option<Option<String>>,
    pub genre_ids: Option<Vec<i64>>,
}

fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    /// Case insensitive substring match on the title.
    pub title: Option<String>,
    pub release_year: Option<i64>,
    /// Case insensitive substring match on genre names.
    pub genre: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct MovieShort {
    pub id: i64,
    pub title: String,
    pub release_year: i64,
    pub director: DirectorShort,
    pub genres: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub release_year: i64,
    pub cast: Option<String>,
    pub director: Director,
    pub genres: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: i64,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

// Genres and rating stats come from separate batched queries, the row
// carries only movie and director columns.
impl sqlx::FromRow<'_, ChosenRow> for Movie {
    fn from_row(row: &ChosenRow) -> std::result::Result<Self, sqlx::Error> {
        let director = Director {
            id: row.try_get("director_id")?,
            name: row.try_get("director_name")?,
            birth_year: row.try_get("director_birth_year")?,
            description: row.try_get("director_description")?,
        };
        Ok(Movie {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            release_year: row.try_get("release_year")?,
            cast: row.try_get("cast")?,
            director,
            genres: Vec::new(),
            average_rating: None,
            ratings_count: 0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovieShortRow {
    id: i64,
    title: String,
    release_year: i64,
    director_id: i64,
    director_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct RatingStatsRow {
    movie_id: i64,
    avg_score: f64,
    ratings_count: i64,
}

pub type MovieRepository = MovieRepositoryImpl<sqlx::Pool<crate::ChosenDB>>;

pub struct MovieRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MovieRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Filtered, paginated listing ordered by movie id.
    ///
    /// The genre filter joins the many-to-many relation, which fans out to
    /// one row per matching genre - both the count and the page therefore
    /// select DISTINCT movie rows. Genres and rating aggregates for the
    /// page are fetched in two follow-up queries scoped to the page's ids,
    /// so aggregates are never computed for the whole table and the genre
    /// join cannot double count ratings.
    pub async fn list(
        &self,
        params: ListingParams,
        filter: MovieFilter,
    ) -> Result<Batch<MovieShort>> {
        let mut count_query = QueryBuilder::new("SELECT count(DISTINCT m.id)");
        push_filter_joins(&mut count_query, &filter);
        push_filter_predicate(&mut count_query, &filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.executor)
            .await?;

        let mut page_query = QueryBuilder::new(
            "SELECT DISTINCT m.id, m.title, m.release_year, \
             d.id AS director_id, d.name AS director_name",
        );
        push_filter_joins(&mut page_query, &filter);
        push_filter_predicate(&mut page_query, &filter);
        page_query.push(" ORDER BY m.id LIMIT ");
        page_query.push_bind(params.limit);
        page_query.push(" OFFSET ");
        page_query.push_bind(params.offset);
        let page: Vec<MovieShortRow> = page_query
            .build_query_as()
            .fetch_all(&self.executor)
            .await?;

        let ids = page.iter().map(|r| r.id).collect::<Vec<_>>();
        let mut genres = genres_for_movies(&ids, &self.executor).await?;
        let stats = rating_stats(&ids, &self.executor).await?;

        let rows = page
            .into_iter()
            .map(|r| {
                let (average_rating, ratings_count) = match stats.get(&r.id) {
                    Some(&(avg, count)) => (Some(avg), count),
                    None => (None, 0),
                };
                MovieShort {
                    id: r.id,
                    title: r.title,
                    release_year: r.release_year,
                    director: DirectorShort {
                        id: r.director_id,
                        name: r.director_name,
                    },
                    genres: genres.remove(&r.id).unwrap_or_default(),
                    average_rating,
                    ratings_count,
                }
            })
            .collect();

        Ok(Batch {
            rows,
            total: total as u64,
            offset: params.offset,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Movie> {
        let mut conn = self.executor.acquire().await?;
        fetch_movie(&mut conn, id).await
    }

    /// Creates the movie together with its genre links in one transaction.
    /// All genre ids must resolve, otherwise nothing is written. An unknown
    /// director id surfaces as a foreign key violation on insert and is
    /// translated to [`crate::Error::InvalidReference`].
    pub async fn create(&self, payload: CreateMovie) -> Result<Movie> {
        if payload.title.trim().is_empty() {
            return Err(crate::Error::InvalidInput("title must not be empty".into()));
        }

        let mut tx = self.executor.begin().await?;

        let genres =
            resolve_genres(&mut tx, payload.genre_ids.as_deref().unwrap_or_default()).await?;

        let result = sqlx::query(
            "INSERT INTO movies (title, director_id, release_year, \"cast\", created_at, updated_at) \
             VALUES (?, ?, ?, ?, datetime('now'), datetime('now'))",
        )
        .bind(&payload.title)
        .bind(payload.director_id)
        .bind(payload.release_year)
        .bind(&payload.cast)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate_director_violation(e, payload.director_id))?;

        let id = result.last_insert_rowid();
        link_genres(&mut tx, id, &genres).await?;

        let record = fetch_movie(&mut tx, id).await?;
        tx.commit().await?;
        debug!("Created movie {id} with {} genres", record.genres.len());
        Ok(record)
    }

    /// Partial update, see [`UpdateMovie`]. Not-found is checked before any
    /// field validation; the whole change set commits atomically. Rating
    /// stats of the returned record are re-read, edits never touch them.
    pub async fn update(&self, id: i64, payload: UpdateMovie) -> Result<Movie> {
        let mut tx = self.executor.begin().await?;

        let existing: Option<(String, i64, i64, Option<String>)> = sqlx::query_as(
            "SELECT title, director_id, release_year, \"cast\" FROM movies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (old_title, old_director_id, old_release_year, old_cast) =
            existing.ok_or_else(|| crate::Error::RecordNotFound(format!("Movie {id}")))?;

        let title = payload.title.unwrap_or(old_title);
        if title.trim().is_empty() {
            return Err(crate::Error::InvalidInput("title must not be empty".into()));
        }
        let director_id = payload.director_id.unwrap_or(old_director_id);
        let release_year = payload.release_year.unwrap_or(old_release_year);
        let cast = match payload.cast {
            Some(explicit) => explicit,
            None => old_cast,
        };

        if let Some(genre_ids) = &payload.genre_ids {
            let genres = resolve_genres(&mut tx, genre_ids).await?;
            sqlx::query("DELETE FROM genres_movie WHERE movie_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_genres(&mut tx, id, &genres).await?;
        }

        sqlx::query(
            "UPDATE movies SET title = ?, director_id = ?, release_year = ?, \"cast\" = ?, \
             updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&title)
        .bind(director_id)
        .bind(release_year)
        .bind(&cast)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate_director_violation(e, director_id))?;

        let record = fetch_movie(&mut tx, id).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Ratings and genre links go with the movie (ON DELETE CASCADE).
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(crate::Error::RecordNotFound(format!("Movie {id}")))
        } else {
            debug!("Deleted movie {id}");
            Ok(())
        }
    }
}

fn push_filter_joins(query: &mut QueryBuilder<'_, crate::ChosenDB>, filter: &MovieFilter) {
    query.push(" FROM movies m JOIN directors d ON d.id = m.director_id");
    if filter.genre.is_some() {
        query.push(
            " JOIN genres_movie gm ON gm.movie_id = m.id JOIN genres g ON g.id = gm.genre_id",
        );
    }
}

fn push_filter_predicate(query: &mut QueryBuilder<'_, crate::ChosenDB>, filter: &MovieFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(title) = &filter.title {
        query.push(" AND m.title LIKE ");
        query.push_bind(format!("%{title}%"));
    }
    if let Some(year) = filter.release_year {
        query.push(" AND m.release_year = ");
        query.push_bind(year);
    }
    if let Some(genre) = &filter.genre {
        query.push(" AND g.name LIKE ");
        query.push_bind(format!("%{genre}%"));
    }
}

/// Genre names per movie, in the order the links were inserted.
async fn genres_for_movies<'c, E>(ids: &[i64], executor: E) -> Result<HashMap<i64, Vec<String>>>
where
    E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut query = QueryBuilder::new(
        "SELECT gm.movie_id, g.name FROM genres_movie gm \
         JOIN genres g ON g.id = gm.genre_id WHERE gm.movie_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    query.push(") ORDER BY gm.movie_id, gm.rowid");

    let rows: Vec<(i64, String)> = query.build_query_as().fetch_all(executor).await?;
    let mut genres: HashMap<i64, Vec<String>> = HashMap::new();
    for (movie_id, name) in rows {
        genres.entry(movie_id).or_default().push(name);
    }
    Ok(genres)
}

/// One grouped aggregate scoped to the given movie ids. Movies without
/// ratings are simply absent from the result.
async fn rating_stats<'c, E>(ids: &[i64], executor: E) -> Result<HashMap<i64, (f64, i64)>>
where
    E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut query = QueryBuilder::new(
        "SELECT movie_id, avg(score) AS avg_score, count(id) AS ratings_count \
         FROM movie_ratings WHERE movie_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    query.push(") GROUP BY movie_id");

    let rows: Vec<RatingStatsRow> = query.build_query_as().fetch_all(executor).await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.movie_id, (r.avg_score, r.ratings_count)))
        .collect())
}

async fn fetch_movie(conn: &mut SqliteConnection, id: i64) -> Result<Movie> {
    const SQL: &str = r#"
    SELECT m.id, m.title, m.release_year, m."cast", m.created_at, m.updated_at,
    d.id AS director_id, d.name AS director_name, d.birth_year AS director_birth_year,
    d.description AS director_description
    FROM movies m
    JOIN directors d ON d.id = m.director_id
    WHERE m.id = ?;
    "#;
    let mut record = sqlx::query_as::<_, Movie>(SQL)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| crate::Error::RecordNotFound(format!("Movie {id}")))?;

    record.genres = sqlx::query_scalar(
        "SELECT g.name FROM genres_movie gm JOIN genres g ON g.id = gm.genre_id \
         WHERE gm.movie_id = ? ORDER BY gm.rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let (avg, count): (Option<f64>, i64) =
        sqlx::query_as("SELECT avg(score), count(id) FROM movie_ratings WHERE movie_id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
    record.average_rating = avg;
    record.ratings_count = count;

    Ok(record)
}

/// Resolves a caller supplied genre id set. Input ids are deduplicated, the
/// whole set fails when any id does not exist - genre links are never
/// attached partially. An empty set is valid, a movie may have no genres.
async fn resolve_genres(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<GenreShort>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }

    let mut query = QueryBuilder::new("SELECT id, name FROM genres WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in &unique {
        separated.push_bind(*id);
    }
    query.push(")");
    let found: Vec<GenreShort> = query.build_query_as().fetch_all(&mut *conn).await?;

    if found.len() != unique.len() {
        let missing = unique
            .iter()
            .filter(|id| !found.iter().any(|g| g.id == **id))
            .copied()
            .collect::<Vec<_>>();
        debug!("Genre set resolution failed, unknown ids: {missing:?}");
        return Err(crate::Error::InvalidReference(format!(
            "unknown genre ids: {missing:?}"
        )));
    }

    // back to caller order, the IN query does not preserve it
    let mut ordered = found;
    ordered.sort_by_key(|g| unique.iter().position(|id| *id == g.id).unwrap_or(usize::MAX));
    Ok(ordered)
}

async fn link_genres(conn: &mut SqliteConnection, movie_id: i64, genres: &[GenreShort]) -> Result<()> {
    for genre in genres {
        sqlx::query("INSERT INTO genres_movie (movie_id, genre_id) VALUES (?, ?)")
            .bind(movie_id)
            .bind(genre.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn translate_director_violation(err: sqlx::Error, director_id: i64) -> crate::Error {
    if is_foreign_key_violation(&err) {
        crate::Error::InvalidReference(format!("unknown director id: {director_id}"))
    } else {
        err.into()
    }
}
