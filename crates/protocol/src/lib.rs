//! kurier-protocol – Wire-Envelope-Definitionen
//!
//! Dieses Crate definiert die JSON-Nachrichtentypen die zwischen Client
//! und Relay ausgetauscht werden, und bildet damit die reine
//! Serialisierungsgrenze: Dekodieren eingehender Routing-Anfragen,
//! Kodieren ausgehender Zustellungen und System-Benachrichtigungen.

pub mod wire;

pub use wire::{RouteRequest, WireError, WireMessage};
