pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use sms_core::config::SmsConfig;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/webhooks/jira", post(routes::webhooks::receive_webhook))
        .route("/api/jobs", get(routes::jobs::list_jobs))
        .route("/api/jobs/{name}/run", post(routes::jobs::run_job))
        .layer(cors)
        .with_state(app)
}

/// Run the webhook intake server and, unless disabled, the job scheduler.
pub async fn serve(config: SmsConfig) -> anyhow::Result<()> {
    let app = state::AppState::new(config);
    if app.config.scheduler.enabled {
        scheduler::spawn(app.clone());
    } else {
        tracing::info!("scheduler disabled by configuration");
    }

    let listener = tokio::net::TcpListener::bind(&app.config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "sms server listening");
    axum::serve(listener, build_router(app)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn router(configure: impl FnOnce(&mut SmsConfig)) -> Router {
        let mut config = SmsConfig::example();
        configure(&mut config);
        build_router(state::AppState::new(config))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = router(|_| {})
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn jobs_table_lists_schedules() {
        let response = router(|config| {
            config
                .scheduler
                .schedules
                .insert("due-reviews".to_string(), "0 0 6 * * *".to_string());
        })
        .oneshot(Request::get("/api/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let jobs = body["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 3);
        let due = jobs
            .iter()
            .find(|j| j["name"] == "due-reviews")
            .expect("due-reviews listed");
        assert_eq!(due["schedule"], "0 0 6 * * *");
    }

    #[tokio::test]
    async fn unknown_job_is_404() {
        let response = router(|_| {})
            .oneshot(
                Request::post("/api/jobs/nope/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_webhook_is_400() {
        let response = router(|_| {})
            .oneshot(
                Request::post("/api/webhooks/jira")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{ "webhookEvent": "jira:worklog_updated" }"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_secret_is_enforced() {
        let app = router(|config| {
            config.server.webhook_secret = Some("s3cret".to_string());
        });
        let response = app
            .oneshot(
                Request::post("/api/webhooks/jira")
                    .header("content-type", "application/json")
                    .header("x-automation-secret", "wrong")
                    .body(Body::from(r#"{ "webhookEvent": "jira:issue_created" }"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
