//! Fehlertypen fuer Kurier
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]`
//! konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Kurier
pub type Result<T> = std::result::Result<T, KurierError>;

/// Alle moeglichen Fehler im Kurier-System
#[derive(Debug, Error)]
pub enum KurierError {
    // --- Verbindung & Transport ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Routing ---
    #[error("Aufloesung fehlgeschlagen: {0}")]
    Aufloesung(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl KurierError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler die Verbindung beendet
    ///
    /// Jeder Transportfehler ist terminal fuer die betroffene Verbindung;
    /// Protokollfehler betreffen nur die einzelne Nachricht.
    pub fn ist_terminal(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Getrennt(_))
    }
}
