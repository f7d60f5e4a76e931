//! WebSocket-Upgrade-Endpunkt
//!
//! Ein fester Pfad `/ws` fuehrt den HTTP-auf-WebSocket-Upgrade aus. Die
//! Identitaet kommt als Query-Parameter `userId`; der Client behauptet
//! seine eigene Identitaet, eine Verifikation findet nicht statt.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use kurier_core::types::AccountId;
use kurier_relay::{
    ClientConnection, RegistryHandle, RelayError, RelayResult, TransportLeser, TransportSchreiber,
};
use serde::Deserialize;

/// Geteilter Zustand des WebSocket-Endpunkts
#[derive(Clone)]
pub struct WsState {
    /// Handle auf die laufende Registry
    pub registry: RegistryHandle,
    /// Groesse der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
}

/// Query-Parameter des Upgrade-Endpunkts
#[derive(Debug, Deserialize)]
pub struct VerbindungsParameter {
    /// Vom Client behauptete Identitaet; fehlt der Parameter, wird die
    /// Verbindung mit leerer Identitaet akzeptiert
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

/// Erstellt den Router mit dem Upgrade-Endpunkt
pub fn router(state: WsState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

/// GET /ws – HTTP-auf-WebSocket-Upgrade
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<VerbindungsParameter>,
    State(state): State<WsState>,
) -> Response {
    tracing::debug!(konto = %params.user_id, "WebSocket-Upgrade angefragt");
    ws.on_upgrade(move |socket| verbindung_betreiben(socket, params.user_id, state))
}

/// Betreibt eine aufgebaute WebSocket-Verbindung bis zum Ende beider Pumpen
async fn verbindung_betreiben(socket: WebSocket, konto: String, state: WsState) {
    let (sink, stream) = socket.split();
    let verbindung = ClientConnection::neu(
        AccountId::from(konto),
        state.registry.clone(),
        state.sende_queue_groesse,
    );
    tracing::info!(id = %verbindung.id(), konto = %verbindung.konto(), "WebSocket-Verbindung aufgebaut");
    verbindung
        .verarbeiten(WebSocketLeser { stream }, WebSocketSchreiber { sink })
        .await;
}

// ---------------------------------------------------------------------------
// Transport-Adapter
// ---------------------------------------------------------------------------

/// Lese-Haelfte des WebSocket-Transports
struct WebSocketLeser {
    stream: SplitStream<WebSocket>,
}

#[async_trait::async_trait]
impl TransportLeser for WebSocketLeser {
    async fn empfangen(&mut self) -> RelayResult<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Binaer-, Ping- und Pong-Frames betreffen das Relay nicht
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(RelayError::transport(e.to_string())),
            }
        }
    }
}

/// Schreib-Haelfte des WebSocket-Transports
struct WebSocketSchreiber {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl TransportSchreiber for WebSocketSchreiber {
    async fn senden(&mut self, text: &str) -> RelayResult<()> {
        self.sink
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| RelayError::transport(e.to_string()))
    }

    async fn schliessen(&mut self) -> RelayResult<()> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| RelayError::transport(e.to_string()))
    }
}
