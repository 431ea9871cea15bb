// src/server/mod.rs

//! Wires one processor's five long-running tasks plus the HTTP
//! introspection surface into a `JoinSet`, following the teacher's
//! `server::spawner::spawn_all` pattern: clone what each task needs,
//! subscribe a dedicated shutdown receiver, spawn.

pub mod dispatcher;
pub mod http;
pub mod initialization;

use crate::config::Config;
use crate::transport::TransportHandle;
use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{error, info};

pub async fn run(config: Config) -> Result<()> {
    let ctx = initialization::setup(config).await?;
    initialization::wait_for_peers_ready(&ctx).await;

    let initialization::ServerContext {
        config,
        dispatcher,
        transport,
        nodes,
        http_listener,
        tcp_listener,
        udp_socket,
        shutdown_tx,
    } = ctx;

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    {
        let recsa = dispatcher.recsa.clone();
        let rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            recsa.run(rx).await;
            Ok(())
        });
    }
    {
        let recma = dispatcher.recma.clone();
        let rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            recma.run(rx).await;
            Ok(())
        });
    }
    {
        let joining = dispatcher.joining.clone();
        let rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            joining.run(rx).await;
            Ok(())
        });
    }
    {
        let fd = dispatcher.fd.clone();
        let rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            fd.run(rx).await;
            Ok(())
        });
    }
    {
        let router = dispatcher.clone();
        let shared_secret = transport.shared_secret();
        let rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            TransportHandle::run_tcp_acceptor(tcp_listener, router, shared_secret, rx).await;
            Ok(())
        });
    }
    {
        let router = dispatcher.clone();
        let rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            TransportHandle::run_udp_receiver(udp_socket, router, rx).await;
            Ok(())
        });
    }
    {
        let http_state = http::HttpState {
            dispatcher: dispatcher.clone(),
            transport: transport.clone(),
            nodes: nodes.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tasks.spawn(async move {
            http::run(http_listener, http_state).await?;
            Ok(())
        });
    }

    info!(id = config.id, "all background tasks spawned");

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {
                error!(id = config.id, "a background task exited unexpectedly");
                break;
            }
            Ok(Err(e)) => {
                error!(id = config.id, "a background task failed: {e}");
                break;
            }
            Err(e) => {
                error!(id = config.id, "a background task panicked: {e}");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    Ok(())
}
