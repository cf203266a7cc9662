use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::EngineHandle;
use crate::error::Error;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    devices: usize,
}

/// Response for the switch endpoints
#[derive(Serialize)]
struct SwitchResponse {
    unique_name: String,
    on: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: EngineHandle,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::UnknownDevice(_) => StatusCode::NOT_FOUND,
            Error::NotASwitch(_) => StatusCode::BAD_REQUEST,
            Error::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            devices: state.engine.state_snapshot().devices.len(),
        }),
    )
}

/// Handler for GET /v1/devices
#[tracing::instrument(skip(state))]
async fn devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.devices.clone()))
}

/// Handler for GET /v1/devices/{unique_name}
#[tracing::instrument(skip(state))]
async fn device(
    State(state): State<Arc<AppState>>,
    Path(unique_name): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let snapshot = state.engine.state_snapshot();
    let device = snapshot
        .device(&unique_name)
        .cloned()
        .ok_or(Error::UnknownDevice(unique_name))?;
    Ok((StatusCode::OK, Json(device)))
}

async fn switch(state: &AppState, unique_name: String, on: bool) -> Result<impl IntoResponse, Error> {
    let now_on = state.engine.set_switch(unique_name.clone(), on).await?;
    Ok((
        StatusCode::OK,
        Json(SwitchResponse {
            unique_name,
            on: now_on,
        }),
    ))
}

/// Handler for POST /v1/devices/{unique_name}/turn_on
#[tracing::instrument(skip(state))]
async fn turn_on(
    State(state): State<Arc<AppState>>,
    Path(unique_name): Path<String>,
) -> Result<impl IntoResponse, Error> {
    switch(&state, unique_name, true).await
}

/// Handler for POST /v1/devices/{unique_name}/turn_off
#[tracing::instrument(skip(state))]
async fn turn_off(
    State(state): State<Arc<AppState>>,
    Path(unique_name): Path<String>,
) -> Result<impl IntoResponse, Error> {
    switch(&state, unique_name, false).await
}

/// Create the API router with all endpoints
pub fn create_router(engine: EngineHandle) -> Router {
    let state = Arc::new(AppState {
        version: env!("CARGO_PKG_VERSION"),
        engine,
    });
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/devices", get(devices))
        .route("/v1/devices/:unique_name", get(device))
        .route("/v1/devices/:unique_name/turn_on", post(turn_on))
        .route("/v1/devices/:unique_name/turn_off", post(turn_off))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Runs until the provided shutdown signal is triggered.
pub async fn serve(
    addr: SocketAddr,
    engine: EngineHandle,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let app = create_router(engine);

    tracing::info!("Starting HTTP API server on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::controller::mock::MockController;
    use crate::controller::Controller;
    use crate::controller::VehicleId;
    use crate::device::vehicle_devices;
    use crate::device::VehicleData;
    use crate::engine::Engine;

    const SENTRY: &str = "Tesla%20Model%203%20000009%20sentry%20switch";
    const BATTERY: &str = "Tesla%20Model%203%20000009%20battery%20sensor";

    async fn running_engine() -> (EngineHandle, Arc<MockController>) {
        let mock = Arc::new(MockController::new());
        let controller: Arc<dyn Controller> = mock.clone();
        let data = VehicleData {
            id: VehicleId(9),
            vehicle_id: 90,
            vin: "5YJ3E1EA0KF000009".to_string(),
            display_name: None,
            state: None,
        };
        let (mut engine, handle) = Engine::new(Duration::from_secs(3600));
        for device in vehicle_devices(&data, &controller).unwrap() {
            engine.register_device(device);
        }
        tokio::spawn(engine.run());
        handle.refresh().await.unwrap();
        (handle, mock)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let (handle, _) = running_engine().await;
        let response = create_router(handle)
            .oneshot(Request::get("/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_devices() {
        let (handle, _) = running_engine().await;
        let response = create_router(handle)
            .oneshot(Request::get("/v1/devices").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_object().unwrap().len(), 4);
        assert_eq!(
            json["Tesla Model 3 000009 status sensor"]["value"],
            "Parked"
        );
    }

    #[tokio::test]
    async fn test_turn_on_sentry() {
        let (handle, mock) = running_engine().await;
        let response = create_router(handle)
            .oneshot(
                Request::post(format!("/v1/devices/{}/turn_on", SENTRY))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["on"], true);
        assert_eq!(mock.sent_commands().len(), 1);
    }

    #[tokio::test]
    async fn test_turn_on_sensor_is_rejected() {
        let (handle, _) = running_engine().await;
        let response = create_router(handle)
            .oneshot(
                Request::post(format!("/v1/devices/{}/turn_on", BATTERY))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let (handle, _) = running_engine().await;
        let response = create_router(handle)
            .oneshot(Request::get("/v1/devices/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
