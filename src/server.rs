use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use log::{error, info, warn};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::data::{AllocationInput, AllocationOutput};
use crate::error::AllocationError;
use crate::solver;

async fn solve_handler(
    State(config): State<Arc<ServerConfig>>,
    Json(input): Json<AllocationInput>,
) -> Result<Json<AllocationOutput>, (StatusCode, String)> {
    let work = input.config.work_budget();
    if work > config.max_work {
        warn!("Rejecting request with work budget {work} (limit {})", config.max_work);
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "requested work budget {work} exceeds the server limit {}",
                config.max_work
            ),
        ));
    }

    // The solver is CPU-bound and budget-limited; keep it off the runtime threads.
    let result = tokio::task::spawn_blocking(move || solver::solve(&input))
        .await
        .map_err(|e| {
            error!("Solver task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    match result {
        Ok(output) => Ok(Json(output)),
        Err(e) => Err((status_for(&e), e.to_string())),
    }
}

fn status_for(error: &AllocationError) -> StatusCode {
    if error.is_input_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

pub fn app(config: ServerConfig) -> Router {
    Router::new()
        .route("/v1/capsules/solve", post(solve_handler))
        .with_state(Arc::new(config))
}

pub async fn run_server(config: &ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app(config.clone())).await
}
