use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::ToSocketAddrs;
use tokio::sync::RwLock;

use crate::flow::CardFlow;
use crate::netcard::{Enumeration, NetworkCards};

mod models;

/// Latest enumeration and flow rates, published by the sampling loop.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub timestamp: u64,
    pub cards: NetworkCards,
    pub failures: Vec<String>,
    pub container_scan_ran: bool,
    pub interval_secs: u64,
    pub flow: CardFlow,
}

impl Snapshot {
    /// Replaces the card part of the snapshot with `enumeration`.
    pub fn set_enumeration(&mut self, timestamp: u64, enumeration: Enumeration) {
        self.timestamp = timestamp;
        self.failures = enumeration.failures.iter().map(ToString::to_string).collect();
        self.cards = enumeration.cards;
        self.container_scan_ran = enumeration.container_scan_ran;
    }
}

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

async fn get_cards(snapshot: State<SharedSnapshot>) -> Response {
    let snapshot = snapshot.read().await;
    let body = models::CardsResponse {
        timestamp: snapshot.timestamp,
        cards: &snapshot.cards,
        failures: &snapshot.failures,
        container_scan_ran: snapshot.container_scan_ran,
    };
    match serde_json::to_value(&body) {
        Ok(value) => (axum::http::StatusCode::OK, Json(value)).into_response(),
        Err(err) => {
            log::error!("Failed to serialize network cards: {}", err);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "failed to export network cards",
            )
                .into_response()
        }
    }
}

async fn get_flow(snapshot: State<SharedSnapshot>) -> Response {
    let snapshot = snapshot.read().await;
    let body = models::FlowResponse {
        timestamp: snapshot.timestamp,
        interval_secs: snapshot.interval_secs,
        flow: &snapshot.flow,
    };
    match serde_json::to_value(&body) {
        Ok(value) => (axum::http::StatusCode::OK, Json(value)).into_response(),
        Err(err) => {
            log::error!("Failed to serialize card flow: {}", err);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "failed to export card flow",
            )
                .into_response()
        }
    }
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(snapshot: SharedSnapshot) -> Self {
        let router = axum::Router::new()
            .route("/cards", get(get_cards))
            .route("/flow", get(get_flow))
            .with_state(snapshot);
        Self { router }
    }

    /// Serves the API until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if binding `addr` fails or serving stops with an I/O error.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router.into_make_service()).await
    }
}
