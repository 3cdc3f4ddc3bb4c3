use std::net::SocketAddr;

use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::require_auth;
use crate::state::AppState;
use crate::{auth, history, predict};

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "message": "Backend is running!" }))
}

pub fn build_app(state: AppState) -> Router {
    // Everything merged here sits behind the auth gate.
    let protected = Router::new()
        .merge(predict::router(state.config.max_upload_bytes))
        .merge(history::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(|| async { "Backend is running!" }))
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(protected)
                .route("/health", get(health)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::image::label_for_image;
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use std::sync::Arc;
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "X-TRIAGE-BOUNDARY";

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.expect("router is infallible");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn image_request(token: Option<&str>, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/predict-image")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn register_and_login(app: &Router, email: &str, username: &str, password: &str) -> String {
        let (status, _) = send(
            app,
            json_request(
                Method::POST,
                "/api/register",
                None,
                json!({ "email": email, "username": username, "password": password }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            app,
            json_request(
                Method::POST,
                "/api/login",
                None,
                json!({ "email": email, "password": password }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }

    fn symptoms(fever: u8, cough: u8) -> Value {
        json!({
            "Fever": fever, "Cough": cough, "Fatigue": 0, "Diff_Breathing": 0,
            "Headache": 0, "Sore_Throat": 0, "Body_Aches": 0, "Runny_Nose": 0
        })
    }

    #[tokio::test]
    async fn register_login_predict_history() {
        let state = AppState::for_tests();
        let tokens = state.tokens.clone();
        let users = state.users.clone().unwrap();
        let app = build_app(state);

        let token = register_and_login(&app, "a@x.com", "alice", "pw123").await;
        let user = users.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(tokens.verify(&token), Ok(user.id));

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/predict", Some(&token), symptoms(1, 1)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let label = body["prediction"].as_str().unwrap().to_string();
        assert!(!label.is_empty());
        assert_eq!(body["features"], symptoms(1, 1));
        assert_eq!(body["recorded"], true);

        let (status, body) = send(&app, get_request("/api/history", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["kind"], "symptom");
        assert_eq!(items[0]["prediction"], label.as_str());
        assert_eq!(items[0]["input"], symptoms(1, 1));
    }

    #[tokio::test]
    async fn login_response_has_user_details() {
        let app = build_app(AppState::for_tests());
        register_and_login(&app, "Bob@X.com ", "bob", "secret").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/login",
                None,
                json!({ "email": "bob@x.com", "password": "secret" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "bob@x.com");
        assert_eq!(body["username"], "bob");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let app = build_app(AppState::for_tests());
        register_and_login(&app, "a@x.com", "alice", "pw123").await;

        let (wrong_pw_status, wrong_pw) = send(
            &app,
            json_request(
                Method::POST,
                "/api/login",
                None,
                json!({ "email": "a@x.com", "password": "nope" }),
            ),
        )
        .await;
        let (unknown_status, unknown) = send(
            &app,
            json_request(
                Method::POST,
                "/api/login",
                None,
                json!({ "email": "ghost@x.com", "password": "pw123" }),
            ),
        )
        .await;

        assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw["code"], "INVALID_CREDENTIALS");
        assert_eq!(wrong_pw, unknown);
    }

    #[tokio::test]
    async fn unknown_email_login_takes_as_long_as_wrong_password() {
        let app = build_app(AppState::for_tests());
        register_and_login(&app, "a@x.com", "alice", "pw123").await;

        let login = |email: &str| {
            json_request(
                Method::POST,
                "/api/login",
                None,
                json!({ "email": email, "password": "nope" }),
            )
        };
        send(&app, login("warm@x.com")).await;

        let start = std::time::Instant::now();
        let (status, _) = send(&app, login("a@x.com")).await;
        let wrong_pw = start.elapsed();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let start = std::time::Instant::now();
        let (status, _) = send(&app, login("ghost@x.com")).await;
        let unknown = start.elapsed();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(
            unknown * 4 >= wrong_pw,
            "unknown email {unknown:?} vs wrong password {wrong_pw:?}"
        );
    }

    #[tokio::test]
    async fn register_validation() {
        let app = build_app(AppState::for_tests());
        register_and_login(&app, "a@x.com", "alice", "pw123").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/register",
                None,
                json!({ "email": "A@x.com", "username": "other", "password": "pw" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMAIL_TAKEN");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/register",
                None,
                json!({ "email": "b@x.com", "password": "pw" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn predict_without_token_is_rejected_and_not_recorded() {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(AppState::for_tests_with_store(store.clone()));

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/predict", None, symptoms(1, 0)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_MISSING");
        assert!(body["message"].as_str().unwrap().contains("missing"));

        let (status, _) = send(&app, image_request(None, "image", "a.png", b"abc")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(store.prediction_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_token_and_unknown_user() {
        let state = AppState::for_tests();
        let tokens = state.tokens.clone();
        let app = build_app(state);

        let (status, body) = send(&app, get_request("/api/history", Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_INVALID");

        let orphan = tokens.issue(Uuid::new_v4()).unwrap();
        let (status, body) = send(&app, get_request("/api/history", Some(&orphan))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn predict_errors() {
        let mut state = AppState::for_tests();
        let app = build_app(state.clone());
        let token = register_and_login(&app, "a@x.com", "alice", "pw123").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/predict",
                Some(&token),
                json!({ "Fever": "maybe" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_FEATURE");

        state.classifier = None;
        let app = build_app(state);
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/predict", Some(&token), symptoms(1, 1)),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "MODEL_UNAVAILABLE");
    }

    #[tokio::test]
    async fn image_prediction_is_deterministic_and_recorded() {
        let app = build_app(AppState::for_tests());
        let token = register_and_login(&app, "a@x.com", "alice", "pw123").await;
        let data = b"\x89PNG\r\n\x1a\nnot really a png";

        let (status, first) = send(&app, image_request(Some(&token), "image", "rash.png", data)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["prediction"], label_for_image(data));
        assert_eq!(first["message"], "Image analyzed successfully");

        let (_, second) = send(&app, image_request(Some(&token), "image", "again.png", data)).await;
        assert_eq!(first["prediction"], second["prediction"]);

        let (_, history) = send(&app, get_request("/api/history", Some(&token))).await;
        let items = history.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["kind"], "image");
        assert_eq!(items[0]["filename"], "again.png");
        assert!(items[0].get("input").is_none());
        assert_eq!(items[1]["filename"], "rash.png");
    }

    #[tokio::test]
    async fn image_prediction_requires_a_file() {
        let app = build_app(AppState::for_tests());
        let token = register_and_login(&app, "a@x.com", "alice", "pw123").await;

        for req in [
            image_request(Some(&token), "photo", "a.png", b"abc"),
            image_request(Some(&token), "image", "", b"abc"),
            image_request(Some(&token), "image", "a.png", b""),
            json_request(Method::POST, "/api/predict-image", Some(&token), json!({})),
        ] {
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "NO_FILE");
        }
    }

    #[tokio::test]
    async fn oversized_image_is_payload_too_large() {
        let state = AppState::for_tests();
        let limit = state.config.max_upload_bytes;
        let app = build_app(state);
        let token = register_and_login(&app, "a@x.com", "alice", "pw123").await;

        let big = vec![7u8; limit * 2];
        let (status, body) = send(&app, image_request(Some(&token), "image", "big.png", &big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");

        let (_, body) = send(&app, get_request("/api/history", Some(&token))).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn history_is_per_user_and_newest_first() {
        let app = build_app(AppState::for_tests());
        let u = register_and_login(&app, "u@x.com", "u", "pw").await;
        let v = register_and_login(&app, "v@x.com", "v", "pw").await;

        for i in 0..4 {
            let mut body = symptoms(1, 0);
            body["seq"] = json!(i);
            send(&app, json_request(Method::POST, "/api/predict", Some(&u), body)).await;
            if i % 2 == 0 {
                send(&app, json_request(Method::POST, "/api/predict", Some(&v), symptoms(0, 1))).await;
            }
        }

        let (status, body) = send(&app, get_request("/api/history", Some(&u))).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 4);
        let seqs: Vec<i64> = items.iter().map(|i| i["input"]["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![3, 2, 1, 0]);
        let stamps: Vec<OffsetDateTime> = items
            .iter()
            .map(|i| OffsetDateTime::parse(i["timestamp"].as_str().unwrap(), &Rfc3339).expect("rfc3339"))
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] >= w[1]));

        let (_, body) = send(&app, get_request("/api/history", Some(&v))).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_prediction_store_degrades() {
        let mut state = AppState::for_tests();
        let app = build_app(state.clone());
        let token = register_and_login(&app, "a@x.com", "alice", "pw123").await;

        state.predictions = None;
        let app = build_app(state);

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/predict", Some(&token), symptoms(1, 1)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recorded"], false);

        let (status, body) = send(&app, get_request("/api/history", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::for_tests());
        let (status, body) = send(&app, get_request("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
