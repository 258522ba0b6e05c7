use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::gate::{self, RouteTable};
use crate::auth::token::TokenService;
use crate::config::Config;
use crate::db::Store;

mod assets;
pub mod auth;
mod error;
mod system;
mod types;
pub mod users;

pub use error::ApiError;
pub use types::*;

pub struct AppState {
    config: Config,
    store: Store,
    tokens: TokenService,
    routes: RouteTable,
}

impl AppState {
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

pub async fn create_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    // Fails here, before the server binds, when no secret is configured.
    let tokens = TokenService::from_config(&config.auth)?;
    let routes = RouteTable::from_config(&config.auth.protected_routes);

    Ok(Arc::new(AppState {
        config,
        store,
        tokens,
        routes,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/password", put(auth::change_password))
        .route("/users/me", get(auth::me))
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/system/health", get(system::health))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .fallback(assets::serve_asset)
        .layer(middleware::from_fn_with_state(state, gate::auth_gate))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
