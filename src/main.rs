pub mod activities;
pub mod auth;
pub mod config;
pub mod directory;
pub mod err;
pub mod io;
pub mod models;
pub mod service;
pub mod session;


use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::config::{Action, ServeConfig};
use crate::err::{Error, Success};
use crate::service::Service;

pub type Payload<T> = Result<Json<Success<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V> where V: Serialize {
    Ok(Json(Success::of(value)))
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    message: String,
}

impl Message {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn router(service: Arc<Service>) -> Router {
    Router::new()
        .route("/activities", get(activities::list_activities))
        .route("/activities/:name/signup", post(activities::signup_for_activity))
        .route("/activities/:name/unregister", delete(activities::remove_from_activity))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/activities/:name/register", post(activities::register_student))
        .route("/api/activities/:name/unregister", post(activities::unregister_student))
        .fallback(err::handler404)
        .with_state(service)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = config::command().get_matches();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config::log_level(&matches)),
    )
    .init();

    match config::handler(&matches)? {
        Action::HashPassword(password) => {
            println!("{}", directory::hash_password(&password));
            Ok(())
        }
        Action::Serve(config) => serve(config).await,
    }
}

async fn serve(config: ServeConfig) -> anyhow::Result<()> {
    let service = Service::start(&config).await?;
    let app = router(service.clone());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    log::info!("Starting Mergington activities server on http://{}", config.addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.stop();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Could not listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
