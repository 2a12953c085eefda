//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::warn;

use crate::domain::CallerId;
use crate::planner::SearchError;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/search", post(submit_search))
        .route("/search/:caller", get(search_status).delete(cancel_search))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Search and terrain counters.
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let coordinator = &state.coordinator;
    Json(StatsResponse {
        active_searches: coordinator.active_count(),
        running_searches: coordinator.running_count(),
        terrain: coordinator.context().terrain.stats(),
    })
}

/// Start a search, replacing the caller's previous one.
async fn submit_search(
    State(state): State<AppState>,
    Json(req): Json<SubmitSearchRequest>,
) -> Result<(StatusCode, Json<SearchStatusResponse>), AppError> {
    if req.caller.trim().is_empty() {
        return Err(AppError::BadRequest {
            message: "caller must not be empty".to_string(),
        });
    }
    let flags = req
        .flags()
        .map_err(|message| AppError::BadRequest { message })?;

    let handle =
        state
            .coordinator
            .submit(CallerId::new(req.caller), req.origin, req.destination, flags)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchStatusResponse::from_session(handle.session())),
    ))
}

/// Status of the caller's latest search, with its outcome once finished.
async fn search_status(
    State(state): State<AppState>,
    Path(caller): Path<String>,
) -> Result<Json<SearchStatusResponse>, AppError> {
    let handle = state
        .coordinator
        .session(&CallerId::new(caller.clone()))
        .ok_or_else(|| AppError::NotFound {
            message: format!("no search for caller {caller}"),
        })?;

    Ok(Json(SearchStatusResponse::from_session(handle.session())))
}

/// Cancel the caller's live search.
async fn cancel_search(
    State(state): State<AppState>,
    Path(caller): Path<String>,
) -> Json<CancelResponse> {
    let canceled = state.coordinator.cancel(&CallerId::new(caller));
    Json(CancelResponse { canceled })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Unavailable { message: String },
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidRequest(message) => AppError::BadRequest { message },
            SearchError::Unavailable(message) => AppError::Unavailable { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, Destination, RegionId, StaticTunnels};
    use crate::session::{CoordinatorConfig, SearchContext, SearchCoordinator, SessionState};
    use crate::terrain::{
        GridWorld, OwnerConfig, RegionSpec, TerrainCache, TerrainCacheConfig, TerrainOwner,
    };
    use std::sync::Arc;

    const R1: RegionId = RegionId(1);

    fn app() -> (AppState, TerrainOwner) {
        let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
        let world = GridWorld::new().with_region(R1, RegionSpec::flat(0));
        let owner = TerrainOwner::spawn(world, cache.clone(), OwnerConfig::default()).unwrap();
        let context = SearchContext::new(cache, Arc::new(StaticTunnels::default()));
        let coordinator = SearchCoordinator::new(context, &CoordinatorConfig::default());
        (AppState::new(Arc::new(coordinator)), owner)
    }

    fn request(caller: &str, to_x: i32) -> SubmitSearchRequest {
        SubmitSearchRequest {
            caller: caller.to_string(),
            origin: Cell::new(0, 0, 0, R1),
            destination: Destination::from(Cell::new(to_x, 0, 0, R1)),
            modes: None,
            timeout_ms: None,
            step_delay_ms: None,
            max_expansions: None,
            max_tunnels: None,
            use_cache: None,
        }
    }

    #[tokio::test]
    async fn submit_then_poll() {
        let (state, _owner) = app();

        let (status, Json(submitted)) =
            submit_search(State(state.clone()), Json(request("alice", 4)))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(submitted.caller, "alice");

        let handle = state.coordinator.session(&CallerId::from("alice")).unwrap();
        handle.outcome().await;

        let Json(polled) = search_status(State(state), Path("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(polled.session_id, submitted.session_id);
        assert_eq!(polled.state, SessionState::StoppedSuccessful);
        assert!(matches!(
            polled.outcome,
            Some(OutcomeResult::Found { total_length, .. }) if total_length == 4.0
        ));
    }

    #[tokio::test]
    async fn unknown_caller_is_not_found() {
        let (state, _owner) = app();

        let err = search_status(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_request_is_bad_request() {
        let (state, _owner) = app();
        let mut req = request("alice", 4);
        req.modes = Some(vec!["tunnel".to_string()]);

        let err = submit_search(State(state), Json(req)).await.unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_reports_whether_anything_stopped() {
        let (state, _owner) = app();
        let mut req = request("alice", 1_000);
        req.step_delay_ms = Some(5);
        submit_search(State(state.clone()), Json(req)).await.unwrap();

        let Json(first) = cancel_search(State(state.clone()), Path("alice".to_string())).await;
        let Json(second) = cancel_search(State(state), Path("alice".to_string())).await;

        assert!(first.canceled);
        assert!(!second.canceled);
    }

    #[test]
    fn unavailable_maps_to_503() {
        let err = AppError::from(SearchError::Unavailable("terrain owner stopped".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
