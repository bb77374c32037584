use cinedb_dal::ListingParams;
use cinedb_dal::movie::{CreateMovie, MovieFilter, UpdateMovie};
use cinedb_dal::rating::CreateRating;
use sqlx::Executor as _;

const TEST_DATA: &str = r#"
INSERT INTO directors (id, name, birth_year, description)
VALUES (1, 'Christopher Nolan', 1970, NULL);
INSERT INTO directors (id, name, birth_year, description)
VALUES (2, 'Denis Villeneuve', 1967, 'Canadian filmmaker');
INSERT INTO directors (id, name, birth_year, description)
VALUES (3, 'Akira Kurosawa', 1910, NULL);

INSERT INTO genres (id, name) VALUES (1, 'Action');
INSERT INTO genres (id, name) VALUES (2, 'Sci-Fi');
INSERT INTO genres (id, name) VALUES (3, 'Drama');
INSERT INTO genres (id, name) VALUES (4, 'Science Fantasy');
INSERT INTO genres (id, name) VALUES (5, 'Thriller');

INSERT INTO movies (id, title, director_id, release_year, "cast")
VALUES (1, 'Inception', 1, 2010, 'Leonardo DiCaprio, Elliot Page');
INSERT INTO movies (id, title, director_id, release_year, "cast")
VALUES (2, 'Interstellar', 1, 2014, NULL);
INSERT INTO movies (id, title, director_id, release_year, "cast")
VALUES (3, 'Dune', 2, 2021, 'Timothee Chalamet');
INSERT INTO movies (id, title, director_id, release_year, "cast")
VALUES (4, 'Arrival', 2, 2016, 'Amy Adams');

INSERT INTO genres_movie (movie_id, genre_id) VALUES (1, 2);
INSERT INTO genres_movie (movie_id, genre_id) VALUES (1, 5);
INSERT INTO genres_movie (movie_id, genre_id) VALUES (2, 2);
INSERT INTO genres_movie (movie_id, genre_id) VALUES (2, 4);
INSERT INTO genres_movie (movie_id, genre_id) VALUES (2, 3);
INSERT INTO genres_movie (movie_id, genre_id) VALUES (3, 2);
INSERT INTO genres_movie (movie_id, genre_id) VALUES (4, 3);

INSERT INTO movie_ratings (movie_id, score) VALUES (1, 8);
INSERT INTO movie_ratings (movie_id, score) VALUES (1, 6);
INSERT INTO movie_ratings (movie_id, score) VALUES (1, 10);
INSERT INTO movie_ratings (movie_id, score) VALUES (3, 9);
"#;

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    sqlx::migrate!("../../migrations").run(&conn).await.unwrap();

    sqlx::raw_sql(TEST_DATA).execute(&conn).await.unwrap();

    conn
}

#[tokio::test]
async fn test_list_pagination() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let page = repo
        .list(ListingParams::new(0, 2), MovieFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].id, 1);
    assert_eq!(page.rows[1].id, 2);

    let page = repo
        .list(ListingParams::new(2, 2), MovieFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].id, 3);
    assert_eq!(page.rows[1].id, 4);

    // window past the data set is empty, total still counts everything
    let page = repo
        .list(ListingParams::new(4, 2), MovieFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert!(page.rows.is_empty());
}

#[tokio::test]
async fn test_list_merges_rating_stats() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let page = repo
        .list(ListingParams::default(), MovieFilter::default())
        .await
        .unwrap();
    assert_eq!(page.rows.len(), 4);

    let inception = &page.rows[0];
    assert_eq!(inception.average_rating, Some(8.0));
    assert_eq!(inception.ratings_count, 3);
    assert_eq!(inception.director.name, "Christopher Nolan");
    assert_eq!(inception.genres, vec!["Sci-Fi", "Thriller"]);

    // no ratings means null average, not zero
    let interstellar = &page.rows[1];
    assert_eq!(interstellar.average_rating, None);
    assert_eq!(interstellar.ratings_count, 0);
}

#[tokio::test]
async fn test_list_title_filter_is_case_insensitive() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let filter = MovieFilter {
        title: Some("INCEP".to_string()),
        ..Default::default()
    };
    let page = repo.list(ListingParams::default(), filter).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].title, "Inception");
}

#[tokio::test]
async fn test_list_release_year_filter() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let filter = MovieFilter {
        release_year: Some(2016),
        ..Default::default()
    };
    let page = repo.list(ListingParams::default(), filter).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].title, "Arrival");
}

#[tokio::test]
async fn test_list_genre_filter_counts_fanout_once() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    // Interstellar matches "sci" through both Sci-Fi and Science Fantasy,
    // it must still show up exactly once and count once
    let filter = MovieFilter {
        genre: Some("sci".to_string()),
        ..Default::default()
    };
    let page = repo.list(ListingParams::default(), filter).await.unwrap();
    assert_eq!(page.total, 3);
    let ids = page.rows.iter().map(|m| m.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 2, 3]);

    // the dedup applies to result rows, not to the movie's own genre list
    assert_eq!(page.rows[1].genres, vec!["Sci-Fi", "Science Fantasy", "Drama"]);

    // paging works on the deduplicated set
    let filter = MovieFilter {
        genre: Some("sci".to_string()),
        ..Default::default()
    };
    let page = repo.list(ListingParams::new(0, 2), filter).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.rows.len(), 2);
}

#[tokio::test]
async fn test_get_detail() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let movie = repo.get(1).await.unwrap();
    assert_eq!(movie.title, "Inception");
    assert_eq!(movie.cast.as_deref(), Some("Leonardo DiCaprio, Elliot Page"));
    assert_eq!(movie.director.name, "Christopher Nolan");
    assert_eq!(movie.director.birth_year, Some(1970));
    assert_eq!(movie.genres, vec!["Sci-Fi", "Thriller"]);
    assert_eq!(movie.average_rating, Some(8.0));
    assert_eq!(movie.ratings_count, 3);

    // zero ratings is distinct from not found
    let movie = repo.get(4).await.unwrap();
    assert_eq!(movie.average_rating, None);
    assert_eq!(movie.ratings_count, 0);

    let err = repo.get(999).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::RecordNotFound(_)));
}

#[tokio::test]
async fn test_create_movie() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let payload = CreateMovie {
        title: "Tenet".to_string(),
        director_id: 1,
        release_year: 2020,
        cast: None,
        // repeated ids are accepted idempotently
        genre_ids: Some(vec![2, 5, 2]),
    };
    let movie = repo.create(payload).await.unwrap();
    assert_eq!(movie.title, "Tenet");
    assert_eq!(movie.genres, vec!["Sci-Fi", "Thriller"]);
    assert_eq!(movie.average_rating, None);
    assert_eq!(movie.ratings_count, 0);

    let payload = CreateMovie {
        title: "Following".to_string(),
        director_id: 1,
        release_year: 1998,
        cast: None,
        genre_ids: None,
    };
    let movie = repo.create(payload).await.unwrap();
    assert!(movie.genres.is_empty());
}

#[tokio::test]
async fn test_create_movie_unknown_director_writes_nothing() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn.clone());

    let payload = CreateMovie {
        title: "Orphan".to_string(),
        director_id: 999,
        release_year: 2020,
        cast: None,
        genre_ids: Some(vec![1]),
    };
    let err = repo.create(payload).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidReference(_)));

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM movies")
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_create_movie_unknown_genre_writes_nothing() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn.clone());

    let payload = CreateMovie {
        title: "Orphan".to_string(),
        director_id: 1,
        release_year: 2020,
        cast: None,
        genre_ids: Some(vec![2, 999]),
    };
    let err = repo.create(payload).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidReference(_)));

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM movies")
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_create_movie_rejects_blank_title() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let payload = CreateMovie {
        title: "   ".to_string(),
        director_id: 1,
        release_year: 2020,
        cast: None,
        genre_ids: None,
    };
    let err = repo.create(payload).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_update_movie_partial_fields() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    // only the title changes, everything else keeps its stored value
    let movie = repo
        .update(
            1,
            UpdateMovie {
                title: Some("Inception (Director's Cut)".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(movie.title, "Inception (Director's Cut)");
    assert_eq!(movie.release_year, 2010);
    assert_eq!(movie.director.id, 1);
    assert_eq!(movie.genres, vec!["Sci-Fi", "Thriller"]);
    // edits never touch ratings, stats are re-read for the response
    assert_eq!(movie.average_rating, Some(8.0));
    assert_eq!(movie.ratings_count, 3);

    // explicit null clears the nullable cast
    let movie = repo
        .update(
            1,
            UpdateMovie {
                cast: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(movie.cast, None);

    let err = repo.update(999, UpdateMovie::default()).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::RecordNotFound(_)));
}

#[tokio::test]
async fn test_update_movie_genre_set_semantics() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    // empty list clears all genre links
    let movie = repo
        .update(
            1,
            UpdateMovie {
                genre_ids: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(movie.genres.is_empty());

    // replacement uses the caller's order
    let movie = repo
        .update(
            1,
            UpdateMovie {
                genre_ids: Some(vec![3, 1]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(movie.genres, vec!["Drama", "Action"]);

    // omitted set leaves the links untouched
    let movie = repo
        .update(
            1,
            UpdateMovie {
                release_year: Some(2011),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(movie.genres, vec!["Drama", "Action"]);

    // one bad id fails the whole set
    let err = repo
        .update(
            1,
            UpdateMovie {
                genre_ids: Some(vec![1, 999]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidReference(_)));
    let movie = repo.get(1).await.unwrap();
    assert_eq!(movie.genres, vec!["Drama", "Action"]);
}

#[tokio::test]
async fn test_update_movie_unknown_director() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn);

    let err = repo
        .update(
            1,
            UpdateMovie {
                director_id: Some(999),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidReference(_)));

    let movie = repo.get(1).await.unwrap();
    assert_eq!(movie.director.id, 1);
}

#[tokio::test]
async fn test_delete_movie_cascades() {
    let conn = init_db().await;
    let repo = cinedb_dal::movie::MovieRepositoryImpl::new(conn.clone());
    let ratings = cinedb_dal::rating::RatingRepositoryImpl::new(conn.clone());

    repo.delete(1).await.unwrap();

    let err = repo.get(1).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::RecordNotFound(_)));

    let left = ratings.list_for_movie(1).await.unwrap();
    assert!(left.is_empty());

    let links: i64 = sqlx::query_scalar("SELECT count(*) FROM genres_movie WHERE movie_id = 1")
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(links, 0);

    let err = repo.delete(1).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::RecordNotFound(_)));
}

#[tokio::test]
async fn test_add_rating() {
    let conn = init_db().await;
    let movies = cinedb_dal::movie::MovieRepositoryImpl::new(conn.clone());
    let ratings = cinedb_dal::rating::RatingRepositoryImpl::new(conn);

    let err = ratings
        .create(999, CreateRating { score: 5 })
        .await
        .unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::RecordNotFound(_)));

    let rating = ratings.create(2, CreateRating { score: 9 }).await.unwrap();
    assert_eq!(rating.movie_id, 2);
    assert_eq!(rating.score, 9);
    let movie = movies.get(2).await.unwrap();
    assert_eq!(movie.average_rating, Some(9.0));
    assert_eq!(movie.ratings_count, 1);

    ratings.create(2, CreateRating { score: 7 }).await.unwrap();
    let movie = movies.get(2).await.unwrap();
    assert_eq!(movie.average_rating, Some(8.0));
    assert_eq!(movie.ratings_count, 2);

    // range bounds are inclusive
    ratings.create(2, CreateRating { score: 1 }).await.unwrap();
    ratings.create(2, CreateRating { score: 10 }).await.unwrap();

    let err = ratings
        .create(2, CreateRating { score: 11 })
        .await
        .unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidInput(_)));
    let err = ratings
        .create(2, CreateRating { score: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_director_delete_restricted() {
    let conn = init_db().await;
    let directors = cinedb_dal::director::DirectorRepositoryImpl::new(conn);

    let err = directors.delete(1).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::Conflict(_)));

    // no movies reference Kurosawa in the seed
    directors.delete(3).await.unwrap();
    let err = directors.delete(3).await.unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::RecordNotFound(_)));
}

#[tokio::test]
async fn test_genre_name_unique() {
    let conn = init_db().await;
    let genres = cinedb_dal::genre::GenreRepositoryImpl::new(conn);

    let err = genres
        .create(cinedb_dal::genre::CreateGenre {
            name: "Action".to_string(),
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, cinedb_dal::Error::Conflict(_)));

    let all = genres.list(100).await.unwrap();
    assert_eq!(all.len(), 5);
}
