//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tasknest_core::{Config, TaskStore};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::ServerError;
use crate::assets;
use crate::auth::{AuthState, boundary_gate};
use crate::handlers::{self, api, auth, labels, pages, subjects, tasks};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Auth core.
    pub auth: Arc<AuthState>,
    /// Subjects, labels and tasks.
    pub tasks: TaskStore,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl FromRef<AppState> for Arc<AuthState> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Build the application router.
///
/// Every route, including the 404 fallback, sits behind the boundary gate.
pub fn build_router(state: AppState) -> Router {
    layered(routes(), state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/health", get(pages::health))
        .route("/static/{*path}", get(assets::serve_static))
        // Auth
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/token", post(auth::token))
        .route("/logout", get(auth::logout))
        // Pages
        .route("/dashboard", get(pages::dashboard))
        .route("/notifications", get(pages::notifications))
        .route("/profile", get(pages::profile))
        // Subjects
        .route("/subjects", get(subjects::list))
        .route("/subjects/create", get(subjects::create_page).post(subjects::create))
        .route("/subjects/{id}/edit", get(subjects::edit_page).post(subjects::edit))
        .route("/subjects/{id}/delete", post(subjects::delete))
        // Labels
        .route("/labels", get(labels::list))
        .route("/labels/create", get(labels::create_page).post(labels::create))
        .route("/labels/{id}/edit", get(labels::edit_page).post(labels::edit))
        .route("/labels/{id}/delete", post(labels::delete))
        // Tasks
        .route("/tasks", get(tasks::list))
        .route("/tasks/create", get(tasks::create_page).post(tasks::create))
        .route("/tasks/{id}/edit", get(tasks::edit_page).post(tasks::edit))
        .route("/tasks/{id}/toggle", post(tasks::toggle))
        .route("/tasks/{id}/delete", post(tasks::delete))
        // JSON
        .route("/api/me", get(api::me))
        .route("/api/subjects", get(api::subjects))
        .route("/api/labels", get(api::labels))
        .fallback(handlers::not_found)
}

/// Gate, request timeout and tracing around `router`, then CORS if enabled.
fn layered(router: Router<AppState>, state: AppState) -> Router {
    let server = &state.config.server;
    let timeout = Duration::from_secs(server.timeout_secs);
    let cors = server.cors;

    let router = router
        .layer(from_fn_with_state(state.auth.clone(), boundary_gate))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Builder for constructing a [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Config,
    db: Option<sled::Db>,
}

impl ServerBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use an already-open database instead of `config.data_dir()`.
    #[must_use]
    pub fn with_db(mut self, db: sled::Db) -> Self {
        self.db = Some(db);
        self
    }

    /// Build the server.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or auth initialization fails.
    pub fn build(self) -> Result<Server, ServerError> {
        let db = match self.db {
            Some(db) => db,
            None => {
                let data_dir = self.config.data_dir();
                std::fs::create_dir_all(&data_dir).map_err(|e| {
                    ServerError::Config(format!("Failed to create data dir: {e}"))
                })?;
                tasknest_core::open_db(&data_dir)?
            }
        };

        let auth = AuthState::initialize(self.config.auth.clone(), db.clone())
            .map_err(|e| ServerError::Config(format!("Auth init failed: {e}")))?;
        let tasks = TaskStore::with_db(db)?;

        Ok(Server {
            state: AppState {
                auth: Arc::new(auth),
                tasks,
                config: Arc::new(self.config),
            },
        })
    }
}

/// The Tasknest HTTP server.
#[derive(Debug)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from configuration, opening the database under
    /// `config.data_dir()`.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or auth initialization fails.
    pub fn new(config: Config) -> Result<Self, ServerError> {
        ServerBuilder::new().with_config(config).build()
    }

    /// Shared state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// The router, ready to serve.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Run until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let address = self.state.config.server.address();
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("Invalid address {address}: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Tasknest listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.tasks.flush()?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{NewUser, User};
    use crate::handlers::auth::TokenResponse;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use tasknest_core::types::{SubjectInput, TaskInput};
    use tasknest_core::{AuthConfig, HasherConfig};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        state: AppState,
    }

    impl TestApp {
        fn new(gate_accepts_bearer: bool) -> Self {
            Self::with_config(Config {
                auth: AuthConfig::builder()
                    .hasher(HasherConfig::insecure_fast())
                    .gate_accepts_bearer(gate_accepts_bearer)
                    .build(),
                ..Config::default()
            })
        }

        fn with_config(config: Config) -> Self {
            let dir = TempDir::new().unwrap();
            let db = sled::open(dir.path()).unwrap();
            let server = ServerBuilder::new()
                .with_config(config)
                .with_db(db)
                .build()
                .unwrap();
            Self {
                _dir: dir,
                state: server.state().clone(),
            }
        }

        fn register(&self, username: &str) -> User {
            self.state
                .auth
                .users
                .create(NewUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    full_name: None,
                    password_hash: self.state.auth.hasher.hash("password123").unwrap(),
                })
                .unwrap()
        }

        fn cookie_for(&self, user: &User) -> String {
            let token = self.state.auth.issue_session(user).unwrap();
            format!("access_token=\"Bearer {token}\"")
        }

        async fn send(&self, request: Request<Body>) -> Response {
            build_router(self.state.clone()).oneshot(request).await.unwrap()
        }

        async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
            let mut builder = Request::get(uri);
            if let Some(cookie) = cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
            let mut builder = Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            if let Some(cookie) = cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
            self.send(builder.body(Body::from(body.to_string())).unwrap())
                .await
        }
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_times_out() {
        let mut config = Config {
            auth: AuthConfig::builder()
                .hasher(HasherConfig::insecure_fast())
                .build(),
            ..Config::default()
        };
        config.server.timeout_secs = 1;
        let app = TestApp::with_config(config);
        let cookie = app.cookie_for(&app.register("alice"));

        let slow = routes().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "finished"
            }),
        );
        let request = || {
            Request::get("/slow")
                .header(header::COOKIE, cookie.as_str())
                .body(Body::empty())
                .unwrap()
        };

        let response = layered(slow.clone(), app.state.clone())
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        // Same route answers when the budget allows it
        let mut state = app.state.clone();
        let mut config = (*state.config).clone();
        config.server.timeout_secs = 10;
        state.config = Arc::new(config);
        let response = layered(slow, state).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "finished");
    }

    #[tokio::test]
    async fn test_protected_path_redirects_without_session() {
        let app = TestApp::new(false);
        let response = app.get("/dashboard", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_public_paths_pass_through() {
        let app = TestApp::new(false);

        let response = app.get("/static/css/app.css", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.get("/login", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.get("/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"ok\""));

        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_unlocks_dashboard() {
        let app = TestApp::new(false);
        app.register("alice");

        let response = app
            .post_form("/login", "username=alice&password=password123", None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("access_token=\"Bearer "));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=1800"));

        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let response = app.get("/dashboard", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Hello, alice"));
    }

    #[tokio::test]
    async fn test_bad_login_rerenders() {
        let app = TestApp::new(false);
        app.register("alice");

        let response = app
            .post_form("/login", "username=alice&password=wrong", None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("Incorrect username or password"));
    }

    #[tokio::test]
    async fn test_deleted_user_is_redirected() {
        let app = TestApp::new(false);
        let user = app.register("alice");
        let cookie = app.cookie_for(&user);
        app.state.auth.users.delete(user.id).unwrap();

        let response = app.get("/dashboard", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_token_endpoint() {
        let app = TestApp::new(false);
        app.register("alice");

        let response = app
            .post_form("/token", "username=alice&password=wrong", None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = app
            .post_form("/token", "username=alice&password=password123", None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: TokenResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body.token_type, "bearer");
        assert!(app.state.auth.codec.verify(&body.access_token).is_ok());
    }

    #[tokio::test]
    async fn test_header_only_request_follows_gate_flag() {
        for (accepts, expected) in [(false, StatusCode::SEE_OTHER), (true, StatusCode::OK)] {
            let app = TestApp::new(accepts);
            let user = app.register("alice");
            let token = app.state.auth.issue_session(&user).unwrap();

            let request = Request::get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap();
            let response = app.send(request).await;
            assert_eq!(response.status(), expected, "gate_accepts_bearer = {accepts}");
        }
    }

    #[tokio::test]
    async fn test_cross_user_task_is_not_found() {
        let app = TestApp::new(false);
        let alice = app.register("alice");
        let bob = app.register("bob");

        let subject = app
            .state
            .tasks
            .create_subject(
                alice.id,
                SubjectInput {
                    name: "Work".to_string(),
                    description: None,
                },
            )
            .unwrap();
        let task = app
            .state
            .tasks
            .create_task(
                alice.id,
                TaskInput {
                    title: "Secret".to_string(),
                    note: None,
                    subject_id: subject.id,
                    label_id: None,
                    due_date: None,
                    status: None,
                },
            )
            .unwrap();

        let bob_cookie = app.cookie_for(&bob);
        let response = app
            .get(&format!("/tasks/{}/edit", task.id), Some(&bob_cookie))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .post_form(&format!("/tasks/{}/delete", task.id), "", Some(&bob_cookie))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(app.state.tasks.get_task(alice.id, task.id).unwrap().is_some());

        let alice_cookie = app.cookie_for(&alice);
        let response = app
            .get(&format!("/tasks/{}/edit", task.id), Some(&alice_cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let app = TestApp::new(false);

        let form = "username=carol&email=carol%40example.com&full_name=&password=secret123";
        let response = app.post_form("/register", form, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?message=registered");

        let response = app.post_form("/register", form, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Username already registered"));
    }

    #[tokio::test]
    async fn test_subject_create_flow() {
        let app = TestApp::new(false);
        let user = app.register("alice");
        let cookie = app.cookie_for(&user);

        let response = app
            .post_form("/subjects/create", "name=Maths&description=", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/subjects");

        // Same name again re-renders with the conflict
        let response = app
            .post_form("/subjects/create", "name=Maths&description=", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("already exists"));

        let response = app.get("/subjects", Some(&cookie)).await;
        assert!(body_text(response).await.contains("Maths"));
    }

    #[tokio::test]
    async fn test_unknown_route_behind_gate() {
        let app = TestApp::new(false);
        let user = app.register("alice");

        let response = app.get("/nope", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app.get("/nope", Some(&app.cookie_for(&user))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
