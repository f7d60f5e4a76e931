//! Gemeinsame Identifikationstypen fuer Kurier
//!
//! Verbindungs-IDs verwenden das Newtype-Pattern ueber UUIDs, Identitaeten
//! sind vom Client selbst behauptete Strings (keine Verifikation, siehe
//! Upgrade-Endpunkt). Die Newtypes schliessen Verwechslungen zwischen den
//! verschiedenen Arten zur Compilezeit aus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige ID einer einzelnen Verbindung
///
/// Zwei Verbindungen mit derselben Konto-Identitaet bleiben unterscheidbar:
/// die Identitaet ist vom Client behauptet, die ConnectionId vom Server
/// vergeben.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Konto-Identitaet eines Clients (direktes Routing-Ziel)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Gibt die Identitaet als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "konto:{}", self.0)
    }
}

/// Team-Identitaet (Gruppen-Routing-Ziel, Aufloesung extern)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    /// Gibt die Identitaet als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TeamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TeamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "team:{}", self.0)
    }
}

/// Routing-Ziel einer eingehenden Nachricht
///
/// Entweder eine direkte Konto-Identitaet oder ein Team dessen
/// Mitgliedschaft der IdentityResolver aufloest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingZiel {
    /// Direktes Ziel: genau eine Konto-Identitaet
    Direkt(AccountId),
    /// Gruppen-Ziel: Mitgliedschaft wird extern aufgeloest
    Team(TeamId),
}
