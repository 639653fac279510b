use crate::bridge::model::ReportModel;
use crate::mission::config::MissionConfig;
use crate::mission::runner::Runner;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use tokio::runtime::Builder;
use warp::http::StatusCode;
use warp::{Filter, Reply};

type SharedModel = Arc<RwLock<ReportModel>>;

const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

/// Holds the latest mission report and serves it to map clients.
pub struct ReportBridge {
    state: SharedModel,
}

impl ReportBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ReportModel::default())),
        }
    }

    /// Starts the HTTP endpoint on its own thread and runtime.
    pub fn serve(&self, runner: Runner, addr: SocketAddr) {
        let routes = routes(self.state.clone(), runner);
        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                log::info!("report bridge listening on {}", addr);
                warp::serve(routes).run(addr).await;
            });
        });
    }

    pub fn publish(&self, model: ReportModel) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        log::info!(
            "[bridge] {} -> {:.1}% coverage, {} station links",
            model.mission.as_deref().unwrap_or("-"),
            model.coverage_percentage,
            model.station_links.len()
        );
        *guard = model;
    }

    pub fn publish_status(&self, message: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .status = message.to_string();
        log::info!("[bridge] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> ReportModel {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ReportBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn routes(
    state: SharedModel,
    runner: Runner,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let runner_filter = warp::any().map(move || runner.clone());

    let report_route = warp::path("report")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| {
            let model = state.read().unwrap_or_else(PoisonError::into_inner).clone();
            warp::reply::json(&model)
        });

    let analyze_route = warp::path("analyze")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(state_filter)
        .and(runner_filter)
        .and_then(analyze);

    report_route.or(analyze_route)
}

async fn analyze(
    mission: MissionConfig,
    state: SharedModel,
    runner: Runner,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    match runner.execute(&mission).await {
        Ok(report) => {
            let model = ReportModel::from_report(&report);
            let reply = warp::reply::json(&model);
            *state.write().unwrap_or_else(PoisonError::into_inner) = model;
            Ok(warp::reply::with_status(reply, StatusCode::OK))
        }
        Err(err) => {
            log::error!("analyze error: {:#}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "status": "error", "message": format!("{:#}", err) })),
                StatusCode::UNPROCESSABLE_ENTITY,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use viscore::ElevationCache;

    fn runner() -> Runner {
        Runner::new(Arc::new(ElevationCache::default()))
    }

    #[tokio::test]
    async fn bridge_publishes_reports() {
        let report = runner().execute(&MissionConfig::demo()).await.unwrap();
        let bridge = ReportBridge::new();
        bridge.publish(ReportModel::from_report(&report));

        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.mission.as_deref(), Some(report.name.as_str()));
        assert_eq!(snapshot.overlay["type"], "FeatureCollection");
        assert_eq!(
            snapshot.overlay["features"].as_array().map(Vec::len),
            Some(report.analysis.segments.len())
        );

        bridge.publish_status("idle");
        assert_eq!(bridge.snapshot().status, "idle");
    }

    #[tokio::test]
    async fn analyze_route_updates_the_report() {
        let state: SharedModel = Arc::new(RwLock::new(ReportModel::default()));
        let filter = routes(state.clone(), runner());

        let response = warp::test::request()
            .method("POST")
            .path("/analyze")
            .json(&MissionConfig::demo())
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = warp::test::request()
            .method("GET")
            .path("/report")
            .reply(&filter)
            .await;
        let model: ReportModel = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(model.status, "ok");
        assert!(model.coverage_percentage > 0.0);
    }

    #[tokio::test]
    async fn invalid_mission_is_reported_as_unprocessable() {
        let state: SharedModel = Arc::new(RwLock::new(ReportModel::default()));
        let filter = routes(state.clone(), runner());
        let mission = MissionConfig {
            stations: Vec::new(),
            ..MissionConfig::demo()
        };

        let response = warp::test::request()
            .method("POST")
            .path("/analyze")
            .json(&mission)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.read().unwrap().mission, None);
    }
}
