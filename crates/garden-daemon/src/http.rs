use garden_core::{PlaybackCoordinator, Station};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    coordinator: Arc<PlaybackCoordinator>,
}

#[derive(Serialize)]
struct ApiState {
    current_station: Option<StationInfo>,
    is_playing: bool,
    is_buffering: bool,
    is_loading: bool,
    last_error: Option<String>,
    sleep_deadline_ms: Option<i64>,
}

#[derive(Serialize)]
struct StationInfo {
    id: String,
    name: String,
    description: String,
    stream_url: String,
    image_url: String,
    favorite: bool,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    coordinator: Arc<PlaybackCoordinator>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app_state = HttpState { coordinator };

        let app = Router::new()
            .route("/api/state", get(get_state))
            .route("/api/stations", get(get_stations))
            .route("/api/featured", get(get_featured))
            .route("/api/favorites", get(get_favorites))
            .route("/api/history", get(get_history))
            .route("/api/search", get(search).post(search))
            .route("/api/refresh", post(refresh))
            .route("/api/play/:id", get(play_station).post(play_station))
            .route("/api/toggle", get(toggle).post(toggle))
            .route("/api/favorite/:id", post(toggle_favorite))
            .route("/api/sleep/:minutes", post(set_sleep_timer))
            .route("/api/sleep", delete(clear_sleep_timer))
            .layer(CorsLayer::permissive())
            .with_state(app_state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

fn station_info(station: &Station, favorite: bool) -> StationInfo {
    StationInfo {
        id: station.id.clone(),
        name: station.name.clone(),
        description: station.description.clone(),
        stream_url: station.stream_url.clone(),
        image_url: station.image_url.clone(),
        favorite,
    }
}

fn station_list(state: &HttpState, stations: &[Station]) -> Vec<StationInfo> {
    let favorites = state.coordinator.favorite_ids().borrow().clone();
    stations
        .iter()
        .map(|s| station_info(s, favorites.contains(&s.id)))
        .collect()
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let playback = state.coordinator.playback().borrow().clone();
    let favorites = state.coordinator.favorite_ids().borrow().clone();

    Json(ApiState {
        current_station: playback
            .current_station
            .as_ref()
            .map(|s| station_info(s, favorites.contains(&s.id))),
        is_playing: playback.is_playing,
        is_buffering: playback.is_buffering,
        is_loading: *state.coordinator.is_loading().borrow(),
        last_error: playback.last_error,
        sleep_deadline_ms: *state.coordinator.sleep_deadline().borrow(),
    })
}

async fn get_stations(State(state): State<HttpState>) -> Json<Vec<StationInfo>> {
    let stations = state.coordinator.stations().borrow().clone();
    Json(station_list(&state, &stations))
}

async fn get_featured(State(state): State<HttpState>) -> Json<Vec<StationInfo>> {
    let featured = state.coordinator.featured().borrow().clone();
    Json(station_list(&state, &featured))
}

async fn get_favorites(State(state): State<HttpState>) -> Json<Vec<StationInfo>> {
    let favorites = state.coordinator.favorite_stations().borrow().clone();
    Json(station_list(&state, &favorites))
}

async fn get_history(State(state): State<HttpState>) -> Json<Vec<String>> {
    Json(state.coordinator.history().borrow().clone())
}

async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<StationInfo>> {
    info!("HTTP API: Search '{}'", params.q);
    state.coordinator.fetch_stations(&params.q).await;
    let stations = state.coordinator.stations().borrow().clone();
    Json(station_list(&state, &stations))
}

async fn refresh(State(state): State<HttpState>) -> Json<Vec<StationInfo>> {
    info!("HTTP API: Refresh");
    state.coordinator.refresh().await;
    let stations = state.coordinator.stations().borrow().clone();
    Json(station_list(&state, &stations))
}

async fn play_station(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    info!("HTTP API: Play station {}", id);
    match state.coordinator.play_station_id(&id).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Failed to play station {}: {}", id, e);
            StatusCode::NOT_FOUND
        }
    }
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Toggle play/pause");
    state.coordinator.toggle_play_pause().await;
    StatusCode::OK
}

async fn toggle_favorite(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    info!("HTTP API: Toggle favorite {}", id);
    state.coordinator.toggle_favorite(&id).await;
    StatusCode::OK
}

async fn set_sleep_timer(State(state): State<HttpState>, Path(minutes): Path<u64>) -> StatusCode {
    info!("HTTP API: Sleep timer {} minutes", minutes);
    if minutes == 0 {
        return StatusCode::BAD_REQUEST;
    }
    state.coordinator.set_sleep_timer(Some(minutes)).await;
    StatusCode::OK
}

async fn clear_sleep_timer(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Clear sleep timer");
    state.coordinator.set_sleep_timer(None).await;
    StatusCode::OK
}
