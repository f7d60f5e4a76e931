//! Fehlertypen fuer das Relay

use thiserror::Error;

/// Fehlertyp fuer Registry, Pumpen und Transport
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transportfehler (Lese- oder Schreibfehler, auch ordentliches Ende)
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Eingehende Routing-Anfrage nicht dekodierbar
    #[error("Dekodier-Fehler: {0}")]
    Dekodieren(#[from] kurier_protocol::wire::WireError),

    /// Ziel-Aufloesung fehlgeschlagen
    #[error("Aufloesung fehlgeschlagen: {0}")]
    Aufloesung(String),

    /// Senden an eine Verbindung fehlgeschlagen (Queue geschlossen)
    #[error("Senden fehlgeschlagen")]
    SendFehler,
}

impl RelayError {
    /// Erstellt einen Transportfehler
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Erstellt einen Aufloesungsfehler
    pub fn aufloesung(msg: impl Into<String>) -> Self {
        Self::Aufloesung(msg.into())
    }
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;
