//! Client-Verbindung – Lese- und Schreib-Pumpe einer Verbindung
//!
//! Jede Verbindung besitzt zwei unabhaengige Pumpen in eigenen
//! tokio-Tasks: die Lese-Pumpe dekodiert eingehende Frames und reicht
//! sie als Umschlaege in die Registry, die Schreib-Pumpe leert die
//! Send-Queue in den Transport.
//!
//! ## Lebenszyklus
//! ```text
//! Upgrade -> registrieren -> Pumpen laufen -> Lese- oder Schreibfehler
//!   -> Abmelden -> Registry schliesst die Queue -> Close-Frame -> Ende
//! ```
//!
//! Jeder Lesefehler gilt als Trennung; eine weitere Klassifikation
//! findet nicht statt. Schreibfehler werden identisch behandelt.

use async_trait::async_trait;
use kurier_core::types::{AccountId, ConnectionId};
use kurier_protocol::wire::RouteRequest;
use tokio::sync::mpsc;

use crate::error::RelayResult;
use crate::registry::{Envelope, RegistryHandle};

// ---------------------------------------------------------------------------
// Transport-Traits
// ---------------------------------------------------------------------------

/// Lese-Haelfte eines Duplex-Transports (Text-Frames)
///
/// Der Upgrade-Handshake ist eine externe Angelegenheit; die Pumpen
/// sehen nur den fertigen Duplex-Kanal. Die WebSocket-Implementierung
/// liegt im Server-Crate.
#[async_trait]
pub trait TransportLeser: Send {
    /// Empfaengt das naechste Text-Frame
    ///
    /// `Ok(None)` bedeutet ordentliches Verbindungsende. Jeder Fehler
    /// ist terminal fuer die Verbindung.
    async fn empfangen(&mut self) -> RelayResult<Option<String>>;
}

/// Schreib-Haelfte eines Duplex-Transports (Text-Frames)
#[async_trait]
pub trait TransportSchreiber: Send {
    /// Sendet ein Text-Frame
    async fn senden(&mut self, text: &str) -> RelayResult<()>;

    /// Sendet ein Close-Frame und beendet den Transport
    async fn schliessen(&mut self) -> RelayResult<()>;
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Eine Client-Verbindung mit Identitaet und Send-Queue
///
/// Die Identitaet ist bei der Registrierung zugewiesen und fuer die
/// Lebensdauer der Verbindung unveraenderlich.
pub struct ClientConnection {
    id: ConnectionId,
    konto: AccountId,
    registry: RegistryHandle,
    sende_queue_groesse: usize,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(konto: AccountId, registry: RegistryHandle, sende_queue_groesse: usize) -> Self {
        Self {
            id: ConnectionId::new(),
            konto,
            registry,
            sende_queue_groesse,
        }
    }

    /// Gibt die Verbindungs-ID zurueck
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Gibt die Konto-Identitaet zurueck
    pub fn konto(&self) -> &AccountId {
        &self.konto
    }

    /// Registriert die Verbindung und betreibt beide Pumpen
    ///
    /// Kehrt zurueck wenn beide Pumpen beendet sind. Die Abmeldung
    /// geschieht aus den Pumpen heraus (Lese- oder Schreibfehler),
    /// nicht hier.
    pub async fn verarbeiten(
        self,
        leser: impl TransportLeser + 'static,
        schreiber: impl TransportSchreiber + 'static,
    ) {
        let (sende_tx, sende_rx) = mpsc::channel(self.sende_queue_groesse);
        self.registry
            .registrieren(self.id, self.konto.clone(), sende_tx)
            .await;

        let lese_task = tokio::spawn(lese_pumpe(
            self.id,
            self.konto.clone(),
            self.registry.clone(),
            leser,
        ));
        let schreib_task = tokio::spawn(schreib_pumpe(
            self.id,
            self.registry.clone(),
            sende_rx,
            schreiber,
        ));

        let _ = lese_task.await;
        let _ = schreib_task.await;
        tracing::debug!(id = %self.id, "Verbindungs-Tasks beendet");
    }
}

// ---------------------------------------------------------------------------
// Pumpen
// ---------------------------------------------------------------------------

/// Lese-Pumpe: Transport -> Registry
///
/// Dekodiert jedes Text-Frame als Routing-Anfrage und reicht den
/// Umschlag in die Registry. Das Einreichen darf blockieren (Gegendruck
/// vom Absender zur Schleife). Fehlerhafte Einzelnachrichten werden
/// verworfen, die Pumpe laeuft weiter.
async fn lese_pumpe(
    id: ConnectionId,
    konto: AccountId,
    registry: RegistryHandle,
    mut leser: impl TransportLeser,
) {
    loop {
        match leser.empfangen().await {
            Ok(Some(text)) => {
                let anfrage = match RouteRequest::dekodieren(&text) {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::warn!(id = %id, fehler = %e, "Routing-Anfrage nicht dekodierbar, verworfen");
                        continue;
                    }
                };
                let ziel = match anfrage.ziel() {
                    Some(z) => z,
                    None => {
                        tracing::debug!(id = %id, "Routing-Anfrage ohne Ziel, null Zustellungen");
                        continue;
                    }
                };
                registry
                    .weiterleiten(Envelope {
                        absender: konto.clone(),
                        ziel,
                        inhalt: anfrage.content,
                    })
                    .await;
            }
            Ok(None) => {
                tracing::info!(id = %id, "Verbindung vom Client getrennt");
                break;
            }
            Err(e) => {
                tracing::info!(id = %id, fehler = %e, "Lesefehler, Verbindung wird getrennt");
                break;
            }
        }
    }
    registry.abmelden(id).await;
}

/// Schreib-Pumpe: Send-Queue -> Transport
///
/// Blockiert auf der Queue. Ein geschlossenes Queue-Ende (die Registry
/// hat die Verbindung abgemeldet) beendet die Pumpe mit einem
/// Close-Frame. Ein Schreibfehler wird wie ein Lesefehler behandelt und
/// loest die Abmeldung aus.
async fn schreib_pumpe(
    id: ConnectionId,
    registry: RegistryHandle,
    mut sende_rx: mpsc::Receiver<String>,
    mut schreiber: impl TransportSchreiber,
) {
    loop {
        match sende_rx.recv().await {
            Some(text) => {
                if let Err(e) = schreiber.senden(&text).await {
                    tracing::info!(id = %id, fehler = %e, "Schreibfehler, Verbindung wird getrennt");
                    registry.abmelden(id).await;
                    break;
                }
            }
            None => {
                if let Err(e) = schreiber.schliessen().await {
                    tracing::debug!(id = %id, fehler = %e, "Close-Frame nicht zustellbar");
                }
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
