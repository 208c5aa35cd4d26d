use axum::{
    http::{header, HeaderValue},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/login", post(handlers::ui::login_handler))
        .route("/logout", post(handlers::ui::logout_handler))
        .route("/generate", post(handlers::ui::generate_handler))
        .route("/run", post(handlers::ui::run_handler))
        .route("/history/clear", post(handlers::ui::clear_history_handler))
        .route("/history/{index}/rerun", post(handlers::ui::rerun_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Session
            .route("/login", post(handlers::api::login))
            .route("/logout", post(handlers::api::logout))

            // Query endpoints
            .route("/generate", post(handlers::api::generate))
            .route("/query", post(handlers::api::execute_query))

            // History
            .route("/history", get(handlers::api::list_history))
            .route("/history", delete(handlers::api::clear_history))
            .route("/history/{index}/rerun", post(handlers::api::rerun_history_entry))

            // Schema and system status
            .route("/schema", get(handlers::api::get_schema))
            .route("/status", get(handlers::api::system_status)),
    )
}

pub fn app(state: Arc<AppState>) -> Router {
    ui_routes()
        .merge(api_routes())
        .fallback(handlers::ui::not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::{assistant, PASSWORD};
    use crate::config::testing::test_config;
    use crate::db::executor::testing::StubExecutor;
    use crate::llm::testing::StubProvider;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state(provider: StubProvider, executor: StubExecutor) -> Arc<AppState> {
        let state = AppState::new(
            &test_config(),
            assistant(Arc::new(provider), Arc::new(executor)),
        )
        .unwrap();
        Arc::new(state)
    }

    fn router(provider: StubProvider, executor: StubExecutor) -> Router {
        app(test_state(provider, executor))
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("nlsql_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(method: &str, uri: &str, cookie: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        if cookie.is_empty() {
            builder
        } else {
            builder.header(header::COOKIE, cookie)
        }
    }

    fn form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        request("POST", uri, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, cookie: &str, body: Value) -> Request<Body> {
        request(method, uri, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn log_in(app: &Router, cookie: &str) -> String {
        let response = app
            .clone()
            .oneshot(form("/login", cookie, &format!("password={}", PASSWORD)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        set_cookie(&response).unwrap()
    }

    #[tokio::test]
    async fn new_visitor_gets_login_page_without_session() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        let html = body_text(response).await;
        assert!(html.contains("Secure Login"));
        assert!(!html.contains("Generate SQL"));
    }

    #[tokio::test]
    async fn anonymous_requests_store_nothing() {
        let state = test_state(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));
        let app = app(state.clone());

        for _ in 0..20 {
            app.clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
        }
        let response = app
            .clone()
            .oneshot(form("/login", "", "password=wrong"))
            .await
            .unwrap();
        assert!(set_cookie(&response).is_none());

        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn wrong_password_stays_on_login_page() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));

        let response = app
            .clone()
            .oneshot(form("/login", "", "password=wrong"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Incorrect password"));
        assert!(html.contains("Secure Login"));
    }

    #[tokio::test]
    async fn login_issues_a_fresh_session_id() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(1));
        let planted = format!("nlsql_session={}", uuid::Uuid::new_v4());
        let first = log_in(&app, &planted).await;
        assert_ne!(first, planted);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/query", &first, json!({"query": "SELECT 1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let second = log_in(&app, &first).await;
        assert_ne!(second, first);

        let response = app
            .clone()
            .oneshot(json_request("GET", "/api/history", &first, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(json_request("GET", "/api/history", &second, json!({})))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn logout_returns_to_login_page() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(1));
        let cookie = log_in(&app, "").await;

        let response = app.clone().oneshot(form("/logout", &cookie, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app
            .clone()
            .oneshot(request("GET", "/", &cookie).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Secure Login"));

        let response = app
            .clone()
            .oneshot(form("/run", &cookie, "sql=SELECT+1"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Please log in first"));
    }

    #[tokio::test]
    async fn empty_result_still_shows_column_headers() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));
        let cookie = log_in(&app, "").await;

        let response = app
            .clone()
            .oneshot(form("/run", &cookie, "sql=SELECT+n+FROM+t+WHERE+false"))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Rows returned: 0"));
        assert!(html.contains("<th title=\"INT4\">n</th>"));
    }

    #[tokio::test]
    async fn form_flow_generates_and_runs_query() {
        let app = router(
            StubProvider::replying("```sql\nSELECT City, COUNT(*) AS customers FROM Customer GROUP BY City\n```"),
            StubExecutor::returning_rows(2),
        );
        let cookie = log_in(&app, "").await;

        let response = app
            .clone()
            .oneshot(form("/generate", &cookie, "question=How+many+customers+by+city%3F"))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Generated SQL"));
        assert!(html.contains("SELECT City, COUNT(*) AS customers FROM Customer GROUP BY City"));

        let response = app
            .clone()
            .oneshot(form("/run", &cookie, "sql=SELECT+1"))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Rows returned: 2"));
        assert!(html.contains("Query History"));
        assert!(html.contains("How many customers by city?"));
    }

    #[tokio::test]
    async fn api_requires_login() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(1));
        let cookie = format!("nlsql_session={}", uuid::Uuid::new_v4());

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/generate", "", json!({"question": "Q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(json_request("GET", "/api/history", &cookie, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_flow_records_history_most_recent_first() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(1));
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/login", "", json!({"password": PASSWORD})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response).unwrap();

        for question in ["Q1", "Q2", "Q3"] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/generate", &cookie, json!({"question": question})))
                .await
                .unwrap();
            let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(body["sql"], "SELECT 1");

            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/query", &cookie, json!({"query": "SELECT 1"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(json_request("GET", "/api/history", &cookie, json!({})))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let questions: Vec<&str> = body["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["question"].as_str().unwrap())
            .collect();
        assert_eq!(questions, vec!["Q3", "Q2", "Q1"]);

        let response = app
            .clone()
            .oneshot(json_request("DELETE", "/api/history", &cookie, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(json_request("GET", "/api/history", &cookie, json!({})))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn execution_error_carries_database_message() {
        let app = router(
            StubProvider::replying("SELECT 1"),
            StubExecutor::failing("column \"total\" does not exist"),
        );
        let cookie = log_in(&app, "").await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/query", &cookie, json!({"query": "SELECT total"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("column \"total\" does not exist"));
    }

    #[tokio::test]
    async fn status_endpoint_reports_backend() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));
        let response = app
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["llm_backend"], "gemini");
    }

    #[tokio::test]
    async fn unknown_page_renders_error_template() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));
        let response = app
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Page not found"));
    }

    #[tokio::test]
    async fn stylesheet_is_served() {
        let app = router(StubProvider::replying("SELECT 1"), StubExecutor::returning_rows(0));
        let response = app
            .oneshot(Request::builder().uri("/static/style.css").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
