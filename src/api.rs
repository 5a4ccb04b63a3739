use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::ToSocketAddrs;

use crate::container::ContainerID;
use crate::error::Error;
use crate::identity::IdentityQuery;
use crate::inspector::Inspector;
use crate::netns::NetnsTool;
use crate::record::{ContainerRecord, ImageRecord};
use crate::runtime::ContainerRuntime;

mod models;

type SharedInspector<R, N> = State<Arc<Inspector<R, N>>>;

/// An [`Error`] rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PathIsDirectory { .. } | Error::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Error::AmbiguousMatch { .. } => StatusCode::CONFLICT,
            Error::RuntimeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        } else {
            log::debug!("request rejected: {}", self.0);
        }

        let body = models::ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn container_id(raw: &str) -> std::result::Result<ContainerID, ApiError> {
    ContainerID::new(raw).map_err(|err| ApiError(err.into()))
}

async fn health<R, N>(State(inspector): SharedInspector<R, N>) -> Json<models::Health>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    Json(models::Health {
        runtime_available: inspector.is_runtime_available().await,
    })
}

async fn resolve<R, N>(inspector: &Inspector<R, N>, query: IdentityQuery) -> ApiResult<models::Resolved>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    let container_id = inspector.resolve(&query).await?;
    Ok(Json(models::Resolved { container_id }))
}

async fn resolve_process<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path(pid): Path<u32>,
) -> ApiResult<models::Resolved>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    resolve(&inspector, IdentityQuery::ProcessId(pid)).await
}

async fn resolve_port<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path(port): Path<u16>,
) -> ApiResult<models::Resolved>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    resolve(&inspector, IdentityQuery::ListenPort(port)).await
}

async fn resolve_interface<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path(name): Path<String>,
) -> ApiResult<models::Resolved>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    resolve(&inspector, IdentityQuery::VirtualInterface(name)).await
}

async fn container_record<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path(id): Path<String>,
) -> ApiResult<ContainerRecord>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    let id = container_id(&id)?;
    Ok(Json(inspector.container_record(&id).await?))
}

async fn hash_path<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path(id): Path<String>,
    Query(params): Query<models::HashParams>,
) -> ApiResult<models::PathHash>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    let id = container_id(&id)?;
    let sha256 = inspector.hash_path(&id, &params.path).await?;
    Ok(Json(models::PathHash {
        path: params.path,
        sha256,
    }))
}

async fn username<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path((id, uid)): Path<(String, u32)>,
) -> ApiResult<models::Username>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    let id = container_id(&id)?;
    let username = inspector.resolve_username(&id, uid).await?;
    Ok(Json(models::Username { uid, username }))
}

async fn image_record<R, N>(
    State(inspector): SharedInspector<R, N>,
    Path(id): Path<String>,
) -> ApiResult<ImageRecord>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    Ok(Json(inspector.image_record(&id).await?))
}

/// Builds the HTTP routes over `inspector`.
pub fn router<R, N>(inspector: Arc<Inspector<R, N>>) -> axum::Router
where
    R: ContainerRuntime + 'static,
    N: NetnsTool + 'static,
{
    axum::Router::new()
        .route("/health", get(health::<R, N>))
        .route("/resolve/process/{pid}", get(resolve_process::<R, N>))
        .route("/resolve/port/{port}", get(resolve_port::<R, N>))
        .route("/resolve/interface/{name}", get(resolve_interface::<R, N>))
        .route("/containers/{id}", get(container_record::<R, N>))
        .route("/containers/{id}/hash", get(hash_path::<R, N>))
        .route("/containers/{id}/users/{uid}", get(username::<R, N>))
        .route("/images/{id}", get(image_record::<R, N>))
        .with_state(inspector)
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new<R, N>(inspector: Arc<Inspector<R, N>>) -> Self
    where
        R: ContainerRuntime + 'static,
        N: NetnsTool + 'static,
    {
        Self {
            router: router(inspector),
        }
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("API listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}
