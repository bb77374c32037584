use cinedb_dal::genre::GenreRepository;

use crate::state::AppState;
#[allow(unused_imports)]
use axum::routing::{delete, get, post, put};

crate::repository_from_request!(GenreRepository);

mod crud_api {
    use super::*;
    use crate::error::ApiResult;
    use crate::rest_api::SuccessResponse;
    use axum::{Json, extract::Path, response::IntoResponse};
    use axum_valid::Garde;
    use cinedb_dal::genre::CreateGenre;
    use http::StatusCode;

    pub async fn create(
        repository: GenreRepository,
        Garde(Json(payload)): Garde<Json<CreateGenre>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.create(payload).await?;

        Ok((StatusCode::CREATED, Json(SuccessResponse::new(record))))
    }

    pub async fn list(repository: GenreRepository) -> ApiResult<impl IntoResponse> {
        let records = repository.list(cinedb_dal::MAX_LIMIT).await?;
        Ok((StatusCode::OK, Json(SuccessResponse::new(records))))
    }

    pub async fn get(
        Path(id): Path<i64>,
        repository: GenreRepository,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.get(id).await?;

        Ok((StatusCode::OK, Json(SuccessResponse::new(record))))
    }

    pub async fn delete(
        Path(id): Path<i64>,
        repository: GenreRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete(id).await?;

        Ok((StatusCode::NO_CONTENT, ()))
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(crud_api::create).get(crud_api::list))
        .route("/{id}", get(crud_api::get).delete(crud_api::delete))
}
