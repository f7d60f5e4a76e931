//! Wire-Envelope (WebSocket, JSON)
//!
//! Definiert die beiden Nachrichtenformen auf der Leitung:
//! eingehende Routing-Anfragen (`RouteRequest`) und ausgehende
//! Zustellungen bzw. System-Benachrichtigungen (`WireMessage`).
//!
//! ## Design
//! - JSON-Serialisierung via serde (Text-Frames, nicht zeitkritisch)
//! - Leere Felder werden beim Kodieren weggelassen
//! - Dekodier-Fehler betreffen immer nur die einzelne Nachricht

use kurier_core::types::{AccountId, RoutingZiel, TeamId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// System-Benachrichtigungen
// ---------------------------------------------------------------------------

/// Benachrichtigungstext bei neuer Verbindung
pub const HINWEIS_VERBUNDEN: &str = "/A new socket has connected.";

/// Benachrichtigungstext bei getrennter Verbindung
pub const HINWEIS_GETRENNT: &str = "/A socket has disconnected.";

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler an der Serialisierungsgrenze
#[derive(Debug, Error)]
pub enum WireError {
    /// Eingehende Nachricht ist kein gueltiges JSON bzw. falsches Schema
    #[error("Ungueltige Routing-Anfrage: {0}")]
    Dekodieren(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Eingehend: Routing-Anfrage
// ---------------------------------------------------------------------------

/// Eingehende Routing-Anfrage eines Clients
///
/// Genau eines der Felder `account_id`/`team_id` wird erwartet. Sind beide
/// leer, loest die Anfrage zu null Zielen auf (keine Zustellung, kein
/// Fehler an den Absender).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Direktes Ziel: Konto-Identitaet
    #[serde(default)]
    pub account_id: Option<String>,
    /// Gruppen-Ziel: Team-Identitaet
    #[serde(default)]
    pub team_id: Option<String>,
    /// Nachrichteninhalt
    #[serde(default)]
    pub content: String,
}

impl RouteRequest {
    /// Dekodiert eine Routing-Anfrage aus einem Text-Frame
    pub fn dekodieren(text: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Gibt das Routing-Ziel zurueck, falls eines angegeben ist
    ///
    /// `account_id` hat Vorrang vor `team_id` (Verhalten des Protokolls:
    /// der Client befuellt genau eines der beiden Felder).
    pub fn ziel(&self) -> Option<RoutingZiel> {
        if let Some(konto) = self.account_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(RoutingZiel::Direkt(AccountId::from(konto)));
        }
        if let Some(team) = self.team_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(RoutingZiel::Team(TeamId::from(team)));
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Ausgehend: Zustellung und Benachrichtigung
// ---------------------------------------------------------------------------

/// Ausgehende Nachricht an einen Client
///
/// Wird fuer geroutete Inhalte (`sender` + `content`) und fuer
/// System-Benachrichtigungen (nur `content`) verwendet. Leere Felder
/// erscheinen nicht im JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    /// Absender-Identitaet (bei gerouteten Inhalten)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Empfaenger-Identitaet (derzeit ungenutzt, Teil des Formats)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Inhalt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl WireMessage {
    /// Erstellt eine geroutete Zustellung mit Absender und Inhalt
    pub fn zustellung(absender: &AccountId, inhalt: &str) -> Self {
        Self {
            sender: Some(absender.as_str().to_string()),
            recipient: None,
            content: Some(inhalt.to_string()),
        }
    }

    /// Erstellt eine System-Benachrichtigung (nur Inhalt)
    pub fn hinweis(inhalt: &str) -> Self {
        Self {
            sender: None,
            recipient: None,
            content: Some(inhalt.to_string()),
        }
    }

    /// Kodiert die Nachricht als JSON-Text-Frame
    ///
    /// Serialisierung dieser Struktur kann nicht fehlschlagen, daher kein
    /// Result.
    pub fn kodieren(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
