use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::checker::{CheckOutcome, CheckerOptions, GeofenceChecker, LocationCheckResult};
use crate::position::FixedPositionSource;
use crate::site::{filter_sites, find_site, Coordinate, SelectionStore, SiteLocation};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

async fn fetch_sites(state: &Arc<AppState>) -> Result<Vec<SiteLocation>, ApiError> {
    let directory = Arc::clone(&state.directory);
    tokio::task::spawn_blocking(move || directory.fetch_sites())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            warn!(error = %e, "Site directory unavailable");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        })
}

// ─── GET /api/sites ──────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct SitesQuery {
    pub search: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SiteSummary {
    pub project_no: String,
    pub project_name: Option<String>,
    pub site_location: String,
    pub detail_description: String,
    pub eligible: bool,
    pub radius_meters: f64,
}

impl From<&SiteLocation> for SiteSummary {
    fn from(site: &SiteLocation) -> Self {
        Self {
            project_no: site.project_no.clone(),
            project_name: site.project_name.clone(),
            site_location: site.site_location.clone(),
            detail_description: site.detail_description.clone(),
            eligible: site.has_valid_coordinates(),
            radius_meters: site.checkin_radius.meters(),
        }
    }
}

pub async fn sites(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SitesQuery>,
) -> Result<Json<Vec<SiteSummary>>, ApiError> {
    let start = Instant::now();
    let all = fetch_sites(&state).await?;
    let query = params.search.as_deref().unwrap_or("");
    let hits: Vec<SiteSummary> = filter_sites(&all, query).into_iter().map(SiteSummary::from).collect();

    info!(
        search = query,
        matches = hits.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/sites"
    );
    Ok(Json(hits))
}

// ─── GET /api/selection ──────────────────────────────────────────

pub async fn selection(State(state): State<Arc<AppState>>) -> Result<Json<SiteLocation>, ApiError> {
    SelectionStore::load_from(state.settings.storage_path())
        .current_office_location()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No site selected"))
}

// ─── POST /api/check ─────────────────────────────────────────────

#[derive(Deserialize, Debug)]
pub struct CheckRequest {
    pub project_no: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<LocationCheckResult>, ApiError> {
    let start = Instant::now();

    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid coordinates. Lat: -90..90, Lon: -180..180",
        ));
    }

    let all = fetch_sites(&state).await?;
    let site = find_site(&all, &req.project_no)
        .cloned()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown project '{}'", req.project_no)))?;

    let mut source = FixedPositionSource::new(Coordinate::new(req.latitude, req.longitude));
    if let Some(name) = req.name {
        source = source.with_name(name);
    }
    if let Some(address) = req.address {
        source = source.with_address(address);
    }

    let options = CheckerOptions {
        show_alerts: false,
        ..CheckerOptions::from(&state.settings)
    };
    let mut checker = GeofenceChecker::new(
        Arc::clone(&state.directory),
        Arc::new(source),
        SelectionStore::load_from(state.settings.storage_path()),
    )
    .with_options(options);

    let outcome = checker.check_location_distance(Some(site)).await;

    info!(
        project = %req.project_no,
        granted = outcome.can_access(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POST /api/check"
    );

    match outcome {
        CheckOutcome::Granted(result) | CheckOutcome::Denied(result) => Ok(Json(result)),
        CheckOutcome::Rejected { error, .. } | CheckOutcome::Error(error) => {
            Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, error.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::site::{CheckinRadius, StaticSiteDirectory};
    use tempfile::TempDir;

    fn test_state() -> (Arc<AppState>, TempDir) {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            storage_path: Some(dir.path().join("storage.json")),
            ..Settings::default()
        };
        let directory = Arc::new(StaticSiteDirectory::new(vec![
            SiteLocation {
                project_no: "P-100".into(),
                project_name: Some("Alpha Tower".into()),
                gps_location: Some("12.9716,77.5946".into()),
                checkin_radius: CheckinRadius::Meters(100.0),
                ..Default::default()
            },
            SiteLocation {
                project_no: "Q-300".into(),
                project_name: Some("Ridge".into()),
                ..Default::default()
            },
        ]));
        (Arc::new(AppState { settings, directory }), dir)
    }

    fn request(project_no: &str, latitude: f64, longitude: f64) -> CheckRequest {
        CheckRequest {
            project_no: project_no.into(),
            latitude,
            longitude,
            name: None,
            address: Some("Gate 1".into()),
        }
    }

    #[tokio::test]
    async fn test_sites_filtered() {
        let (state, _dir) = test_state();
        let Json(hits) = sites(
            State(state),
            Query(SitesQuery {
                search: Some("ridge".into()),
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].eligible);
    }

    #[tokio::test]
    async fn test_check_granted() {
        let (state, _dir) = test_state();
        let Json(result) = check(State(state), Json(request("P-100", 12.9716, 77.5946)))
            .await
            .ok()
            .unwrap();
        assert!(result.can_access);
        assert_eq!(result.distance_meters, Some(0));
        assert_eq!(result.address, "Gate 1");
    }

    #[tokio::test]
    async fn test_check_unknown_project() {
        let (state, _dir) = test_state();
        let err = check(State(state), Json(request("NOPE", 0.0, 0.0))).await.err().unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_invalid_site() {
        let (state, _dir) = test_state();
        let err = check(State(state), Json(request("Q-300", 0.0, 0.0))).await.err().unwrap();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_check_rejects_bad_coordinates() {
        let (state, _dir) = test_state();
        let err = check(State(state), Json(request("P-100", 95.0, 0.0))).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_selection_missing() {
        let (state, _dir) = test_state();
        let err = selection(State(state)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
