use cinedb_dal::movie::MovieRepository;
use cinedb_dal::rating::RatingRepository;

use crate::state::AppState;
#[allow(unused_imports)]
use axum::routing::{delete, get, post, put};

crate::repository_from_request!(MovieRepository);
crate::repository_from_request!(RatingRepository);

mod crud_api {
    use super::*;
    use crate::error::ApiResult;
    use crate::rest_api::{Page, SuccessResponse};
    use axum::{
        Json,
        extract::{Path, Query, State},
        response::IntoResponse,
    };
    use axum_valid::Garde;
    use cinedb_dal::{
        ListingParams,
        movie::{CreateMovie, MovieFilter, UpdateMovie},
        rating::CreateRating,
    };
    use garde::Validate;
    use http::StatusCode;
    use tracing::info;

    #[derive(Debug, Clone, Validate, serde::Deserialize)]
    #[garde(allow_unvalidated)]
    pub struct MovieListQuery {
        #[garde(range(min = 1))]
        page: Option<u32>,
        #[garde(range(min = 1, max = 100))]
        page_size: Option<u32>,
        #[garde(length(max = 255))]
        title: Option<String>,
        release_year: Option<i64>,
        #[garde(length(max = 255))]
        genre: Option<String>,
    }

    pub async fn list(
        repository: MovieRepository,
        State(state): State<AppState>,
        Garde(Query(query)): Garde<Query<MovieListQuery>>,
    ) -> ApiResult<impl IntoResponse> {
        let page = query.page.unwrap_or(1);
        let page_size = query.page_size.unwrap_or(state.config().default_page_size);
        info!(
            "Listing movies (page={page}, page_size={page_size}, title={:?}, release_year={:?}, genre={:?})",
            query.title, query.release_year, query.genre
        );
        let params = ListingParams::new((page as i64 - 1) * page_size as i64, page_size as i64);
        let filter = MovieFilter {
            title: query.title,
            release_year: query.release_year,
            genre: query.genre,
        };
        let batch = repository.list(params, filter).await?;
        Ok((
            StatusCode::OK,
            Json(SuccessResponse::new(Page::from_batch(batch, page, page_size))),
        ))
    }

    pub async fn get(
        Path(id): Path<i64>,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.get(id).await?;

        Ok((StatusCode::OK, Json(SuccessResponse::new(record))))
    }

    pub async fn create(
        repository: MovieRepository,
        Garde(Json(payload)): Garde<Json<CreateMovie>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.create(payload).await?;
        info!("Movie created (movie_id={}, title={})", record.id, record.title);

        Ok((StatusCode::CREATED, Json(SuccessResponse::new(record))))
    }

    pub async fn update(
        Path(id): Path<i64>,
        repository: MovieRepository,
        Garde(Json(payload)): Garde<Json<UpdateMovie>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.update(id, payload).await?;
        info!("Movie updated (movie_id={id})");

        Ok((StatusCode::OK, Json(SuccessResponse::new(record))))
    }

    pub async fn delete(
        Path(id): Path<i64>,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete(id).await?;
        info!("Movie deleted (movie_id={id})");

        Ok((StatusCode::NO_CONTENT, ()))
    }

    pub async fn add_rating(
        Path(id): Path<i64>,
        repository: RatingRepository,
        Garde(Json(payload)): Garde<Json<CreateRating>>,
    ) -> ApiResult<impl IntoResponse> {
        info!("Rating movie (movie_id={id}, score={})", payload.score);
        let rating = repository.create(id, payload).await?;

        Ok((StatusCode::CREATED, Json(SuccessResponse::new(rating))))
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(crud_api::list).post(crud_api::create))
        .route(
            "/{id}",
            get(crud_api::get)
                .put(crud_api::update)
                .delete(crud_api::delete),
        )
        .route("/{id}/ratings", post(crud_api::add_rating))
}
