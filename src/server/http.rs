// src/server/http.rs

//! The HTTP introspection/control surface of spec.md §6.4, built the way
//! the teacher exposes `/metrics`: an `axum::Router` bound by the caller
//! and served with `with_graceful_shutdown` keyed off the shutdown
//! broadcast channel.

use super::dispatcher::Dispatcher;
use crate::config::NodeRecord;
use crate::core::byzantine::ByzantineBehavior;
use crate::core::metrics::gather_metrics;
use crate::core::recsa::{ConfigValue, Notification, ProposalSet};
use crate::core::NodeId;
use crate::transport::TransportHandle;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    pub transport: Arc<TransportHandle>,
    pub nodes: Arc<parking_lot::RwLock<BTreeMap<NodeId, NodeRecord>>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/data", get(data))
        .route("/nodes", get(nodes))
        .route("/publish_node", post(publish_node))
        .route("/inject_conf", post(inject_conf))
        .route("/inject_prp", post(inject_prp))
        .route("/kill", post(kill))
        .route("/set-byz-behavior", post(set_byz_behavior))
        .route("/byz-behaviors", get(byz_behaviors))
        .route("/abd/read", get(abd_read))
        .route("/abd/write", post(abd_write))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: HttpState) -> anyhow::Result<()> {
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    info!("HTTP introspection surface listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("HTTP introspection surface shutting down.");
        })
        .await?;
    Ok(())
}

async fn root(State(state): State<HttpState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": format!("{:?}", state.dispatcher.status()),
        "service": "quorumd",
        "id": state.dispatcher.id,
    }))
}

async fn data(State(state): State<HttpState>) -> impl IntoResponse {
    Json(state.dispatcher.data_snapshot())
}

async fn nodes(State(state): State<HttpState>) -> impl IntoResponse {
    Json(state.nodes.read().clone())
}

#[derive(Deserialize)]
struct PublishNodeBody {
    node: NodeRecord,
}

async fn publish_node(State(state): State<HttpState>, Json(body): Json<PublishNodeBody>) -> impl IntoResponse {
    let addr = SocketAddr::new(body.node.ip, body.node.port);
    state.nodes.write().insert(body.node.id, body.node.clone());
    state.transport.add_peer(body.node.id, addr);
    StatusCode::OK
}

#[derive(Deserialize)]
struct InjectConfBody {
    members: Option<Vec<NodeId>>,
    not_participant: Option<bool>,
}

async fn inject_conf(State(state): State<HttpState>, Json(body): Json<InjectConfBody>) -> impl IntoResponse {
    let value = if body.not_participant.unwrap_or(false) {
        ConfigValue::NotParticipant
    } else {
        match body.members {
            Some(m) => ConfigValue::Set(m.into_iter().collect()),
            None => ConfigValue::Bottom,
        }
    };
    state.dispatcher.recsa.inject_conf(value);
    StatusCode::OK
}

#[derive(Deserialize)]
struct InjectPrpBody {
    phase: u8,
    set: Option<Vec<NodeId>>,
}

async fn inject_prp(State(state): State<HttpState>, Json(body): Json<InjectPrpBody>) -> impl IntoResponse {
    let set = match body.set {
        Some(s) => ProposalSet::Set(s.into_iter().collect()),
        None => ProposalSet::Bottom,
    };
    state.dispatcher.recsa.inject_prp(Notification { phase: body.phase, set });
    StatusCode::OK
}

async fn kill(State(state): State<HttpState>) -> impl IntoResponse {
    info!(node = state.dispatcher.id, "received /kill, shutting down");
    let _ = state.shutdown_tx.send(());
    StatusCode::OK
}

#[derive(Deserialize)]
struct SetByzBody {
    behavior: ByzantineBehavior,
}

async fn set_byz_behavior(State(state): State<HttpState>, Json(body): Json<SetByzBody>) -> impl IntoResponse {
    state.dispatcher.byzantine.set(body.behavior);
    StatusCode::OK
}

async fn byz_behaviors() -> impl IntoResponse {
    Json(ByzantineBehavior::ALL)
}

async fn abd_read(State(state): State<HttpState>) -> impl IntoResponse {
    let (value, label) = state.dispatcher.abd.read().await;
    Json(serde_json::json!({ "value": value, "label": label }))
}

async fn abd_write(State(state): State<HttpState>) -> impl IntoResponse {
    let (value, label) = state.dispatcher.abd.write().await;
    Json(serde_json::json!({ "value": value, "label": label }))
}

async fn metrics() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], gather_metrics())
}
