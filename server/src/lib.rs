//! kurier-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und verdrahtet Registry, Resolver und
//! WebSocket-Endpunkt zu einem laufenden Prozess.

pub mod config;
pub mod ws;

use anyhow::Result;
use config::ServerConfig;
use kurier_relay::{RelayRegistry, StubResolver};
use std::sync::Arc;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet Registry und WebSocket-Endpunkt und laeuft bis zum
    /// Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Registry mit Stub-Resolver starten
    /// 2. WebSocket-Listener binden
    /// 3. Auf Ctrl-C / SIGTERM warten
    pub async fn starten(self) -> Result<()> {
        let registry = RelayRegistry::starten(Arc::new(StubResolver));

        let state = ws::WsState {
            registry,
            sende_queue_groesse: self.config.relay.sende_queue_groesse,
        };
        let router = ws::router(state);

        let adresse = self.config.ws_bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse).await?;
        tracing::info!(adresse = %adresse, "WebSocket-Relay gestartet");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Wartet auf das Shutdown-Signal (Ctrl-C)
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
