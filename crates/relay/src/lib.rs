//! kurier-relay – Verbindungs-Registry und Routing-Schleife
//!
//! Dieser Crate implementiert den Kern des Relays: die Registry als
//! alleinige Autoritaet ueber die Menge der Live-Verbindungen und die
//! beiden Pumpen jeder Verbindung.
//!
//! ## Architektur
//!
//! ```text
//! Upgrade-Endpunkt (Server-Crate)
//!     |
//!     v
//! ClientConnection (pro Verbindung zwei Tasks)
//!     |  Lese-Pumpe:    Transport -> RouteRequest -> Envelope -> Registry
//!     |  Schreib-Pumpe: Send-Queue -> Transport
//!     v
//! RelayRegistry (eine Ereignisschleife, seriell)
//!     |
//!     +-- Registrieren   (Live-Menge + Rundruf "verbunden")
//!     +-- Abmelden       (idempotent, Rundruf "getrennt")
//!     +-- Weiterleiten   (Resolver -> try_send an passende Queues)
//!
//! IdentityResolver – Aufloesung von Konto-/Team-Zielen (extern, Stub)
//! ```
//!
//! Die Registry ist der einzige Schreiber der Live-Menge; alle drei
//! Operationen laufen als Ereignisse durch dieselbe Queue und sind damit
//! gegeneinander linearisiert. Jede Send-Queue wird ausschliesslich aus
//! der Ereignisschleife beschrieben und nur von der eigenen Schreib-Pumpe
//! geleert; eine einmal geschlossene Queue wird nie wieder beschrieben.

pub mod connection;
pub mod error;
pub mod registry;
pub mod resolver;

// Bequeme Re-Exporte
pub use connection::{ClientConnection, TransportLeser, TransportSchreiber};
pub use error::{RelayError, RelayResult};
pub use registry::{Envelope, RegistryBefehl, RegistryHandle, RelayRegistry};
pub use resolver::{IdentityResolver, StubResolver};
