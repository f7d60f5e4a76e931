//! Relay-Registry – Alleinige Autoritaet ueber die Live-Verbindungen
//!
//! Die Registry verarbeitet Registrierung, Abmeldung und Zustellung als
//! Ereignisse in einer einzigen Schleife. Sie ist der einzige Schreiber
//! der Live-Menge und der einzige Produzent auf allen Send-Queues; damit
//! sind alle Entscheidungen ueber die Menge gegeneinander linearisiert,
//! ohne dass ein Lock noetig waere.
//!
//! ## Zustellungs-Policy
//! Jede Zustellung ist ein nicht-blockierendes `try_send`. Eine volle
//! oder geschlossene Queue fuehrt zur Zwangsabmeldung des betroffenen
//! Empfaengers – die Schleife blockiert nie auf einem einzelnen
//! langsamen Client, auch nicht beim Rundruf.

use kurier_core::types::{AccountId, ConnectionId, RoutingZiel};
use kurier_protocol::wire::{WireMessage, HINWEIS_GETRENNT, HINWEIS_VERBUNDEN};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::resolver::IdentityResolver;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standard-Groesse der Send-Queue pro Verbindung
pub const SENDE_QUEUE_GROESSE: usize = 64;

/// Groesse der Ereignis-Queue der Registry
const EREIGNIS_QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// Ereignisse und Umschlag
// ---------------------------------------------------------------------------

/// Dekodierter eingehender Umschlag
///
/// Wird pro eingehender Nachricht von der Lese-Pumpe gebaut und von der
/// Registry unmittelbar konsumiert.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Identitaet der sendenden Verbindung
    pub absender: AccountId,
    /// Routing-Ziel (direkt oder Team)
    pub ziel: RoutingZiel,
    /// Nachrichteninhalt
    pub inhalt: String,
}

/// Ereignisse die die Registry seriell verarbeitet
///
/// Es gibt keine feste Prioritaet zwischen den Arten; verarbeitet wird
/// in Eingangs-Reihenfolge, ein Ereignis nach dem anderen.
#[derive(Debug)]
pub enum RegistryBefehl {
    /// Verbindung in die Live-Menge aufnehmen
    Registrieren {
        id: ConnectionId,
        konto: AccountId,
        sende_tx: mpsc::Sender<String>,
    },
    /// Verbindung aus der Live-Menge entfernen (idempotent)
    Abmelden { id: ConnectionId },
    /// Umschlag an alle passenden Verbindungen zustellen
    Weiterleiten { umschlag: Envelope },
}

// ---------------------------------------------------------------------------
// VerbindungsEintrag
// ---------------------------------------------------------------------------

/// Eintrag einer Live-Verbindung in der Registry
///
/// Haelt die Konto-Identitaet und die Sende-Haelfte der Queue. Der
/// Eintrag ist der einzige Produzent auf dieser Queue; mit dem Entfernen
/// des Eintrags wird die Queue geschlossen.
#[derive(Debug)]
struct VerbindungsEintrag {
    konto: AccountId,
    sende_tx: mpsc::Sender<String>,
}

impl VerbindungsEintrag {
    /// Sendet einen Text nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    fn senden(&self, text: &str) -> bool {
        match self.sende_tx.try_send(text.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(konto = %self.konto, "Send-Queue voll, Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(konto = %self.konto, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryHandle
// ---------------------------------------------------------------------------

/// Handle auf eine laufende Registry
///
/// Clonebar; wird vom Upgrade-Endpunkt und von den Pumpen jeder
/// Verbindung benutzt. Alle Methoden reichen lediglich ein Ereignis in
/// die Schleife ein – das Einreichen darf blockieren wenn die Registry
/// momentan beschaeftigt ist (Gegendruck vom Absender zur Schleife).
#[derive(Clone)]
pub struct RegistryHandle {
    befehl_tx: mpsc::Sender<RegistryBefehl>,
}

impl RegistryHandle {
    /// Meldet eine neue Verbindung mit ihrer Send-Queue an
    pub async fn registrieren(
        &self,
        id: ConnectionId,
        konto: AccountId,
        sende_tx: mpsc::Sender<String>,
    ) {
        let _ = self
            .befehl_tx
            .send(RegistryBefehl::Registrieren { id, konto, sende_tx })
            .await;
    }

    /// Meldet eine Verbindung ab (idempotent)
    pub async fn abmelden(&self, id: ConnectionId) {
        let _ = self.befehl_tx.send(RegistryBefehl::Abmelden { id }).await;
    }

    /// Reicht einen Umschlag zur Zustellung ein
    pub async fn weiterleiten(&self, umschlag: Envelope) {
        let _ = self
            .befehl_tx
            .send(RegistryBefehl::Weiterleiten { umschlag })
            .await;
    }
}

// ---------------------------------------------------------------------------
// RelayRegistry
// ---------------------------------------------------------------------------

/// Die Registry: Live-Menge plus Ereignisschleife
///
/// Kein globaler Singleton – eine Registry wird beim Prozessstart
/// explizit erstellt und als Handle weitergereicht. Mehrere unabhaengige
/// Registries im selben Prozess sind moeglich (Tests).
pub struct RelayRegistry {
    /// Live-Verbindungen; vorhanden genau solange die Queue offen ist
    verbindungen: HashMap<ConnectionId, VerbindungsEintrag>,
    /// Aufloesung von Routing-Zielen
    resolver: Arc<dyn IdentityResolver>,
}

impl RelayRegistry {
    /// Erstellt eine Registry ohne sie zu starten (Tests treiben die
    /// Ereignisse direkt)
    pub fn neu(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            verbindungen: HashMap::new(),
            resolver,
        }
    }

    /// Erstellt und startet eine Registry, gibt das Handle zurueck
    pub fn starten(resolver: Arc<dyn IdentityResolver>) -> RegistryHandle {
        let (befehl_tx, befehl_rx) = mpsc::channel(EREIGNIS_QUEUE_GROESSE);
        let registry = Self::neu(resolver);
        tokio::spawn(registry.lauf(befehl_rx));
        RegistryHandle { befehl_tx }
    }

    /// Ereignisschleife: verarbeitet Befehle bis alle Handles weg sind
    pub async fn lauf(mut self, mut befehl_rx: mpsc::Receiver<RegistryBefehl>) {
        while let Some(befehl) = befehl_rx.recv().await {
            self.befehl_verarbeiten(befehl).await;
        }
        tracing::debug!("Registry-Ereignisschleife beendet");
    }

    /// Verarbeitet genau ein Ereignis
    pub async fn befehl_verarbeiten(&mut self, befehl: RegistryBefehl) {
        match befehl {
            RegistryBefehl::Registrieren { id, konto, sende_tx } => {
                self.registrieren(id, konto, sende_tx)
            }
            RegistryBefehl::Abmelden { id } => self.abmelden(&id),
            RegistryBefehl::Weiterleiten { umschlag } => self.weiterleiten(umschlag).await,
        }
    }

    /// Gibt die Anzahl der Live-Verbindungen zurueck
    pub fn verbindungs_anzahl(&self) -> usize {
        self.verbindungen.len()
    }

    /// Prueft ob eine Verbindung in der Live-Menge ist
    pub fn ist_registriert(&self, id: &ConnectionId) -> bool {
        self.verbindungen.contains_key(id)
    }

    // -----------------------------------------------------------------------
    // Ereignis-Handler (nur aus der Schleife aufgerufen)
    // -----------------------------------------------------------------------

    fn registrieren(&mut self, id: ConnectionId, konto: AccountId, sende_tx: mpsc::Sender<String>) {
        tracing::info!(id = %id, konto = %konto, "Verbindung registriert");
        self.verbindungen
            .insert(id, VerbindungsEintrag { konto, sende_tx });

        let hinweis = WireMessage::hinweis(HINWEIS_VERBUNDEN).kodieren();
        self.an_alle_ausser_senden(Some(&id), &hinweis);
        tracing::debug!(live = self.verbindungen.len(), "Live-Verbindungen");
    }

    /// Entfernt eine Verbindung und schliesst ihre Queue
    ///
    /// Idempotent: doppelte Abmeldung (Lese- und Schreibfehler derselben
    /// Verbindung) ist ein No-op. Eine abgemeldete Verbindung wird nie
    /// erneut registriert; eine neue Session braucht ein frisches Objekt.
    fn abmelden(&mut self, id: &ConnectionId) {
        let eintrag = match self.verbindungen.remove(id) {
            Some(e) => e,
            None => return,
        };
        // Mit dem Drop des Eintrags faellt der letzte Sender weg und die
        // Schreib-Pumpe sieht das Queue-Ende.
        drop(eintrag);
        tracing::info!(id = %id, "Verbindung abgemeldet");

        let hinweis = WireMessage::hinweis(HINWEIS_GETRENNT).kodieren();
        self.an_alle_ausser_senden(None, &hinweis);
        tracing::debug!(live = self.verbindungen.len(), "Live-Verbindungen");
    }

    /// Stellt einen Umschlag an alle passenden Verbindungen zu
    ///
    /// Aufloesungsfehler werden verschluckt: keine Zustellung, kein
    /// Fehler an den Absender (das Protokoll kennt keine Fehler-Antwort).
    async fn weiterleiten(&mut self, umschlag: Envelope) {
        let ziele = match self.resolver.aufloesen(&umschlag.ziel).await {
            Ok(ziele) => ziele,
            Err(e) => {
                tracing::warn!(absender = %umschlag.absender, fehler = %e, "Ziel-Aufloesung fehlgeschlagen");
                return;
            }
        };
        if ziele.is_empty() {
            tracing::debug!(absender = %umschlag.absender, "Keine Ziele aufgeloest");
            return;
        }

        let text = WireMessage::zustellung(&umschlag.absender, &umschlag.inhalt).kodieren();
        let mut opfer: Vec<ConnectionId> = Vec::new();
        for (id, eintrag) in &self.verbindungen {
            if !ziele.contains(&eintrag.konto) {
                continue;
            }
            if !eintrag.senden(&text) {
                opfer.push(*id);
            }
        }
        for id in opfer {
            tracing::warn!(id = %id, "Langsamer Empfaenger, Zwangsabmeldung");
            self.abmelden(&id);
        }
    }

    /// Rundruf: sendet einen Text nicht-blockierend an alle Verbindungen
    /// ausser der angegebenen
    ///
    /// Empfaenger mit voller oder geschlossener Queue werden nach der
    /// Iteration zwangsabgemeldet; ein einzelner haengender Client kann
    /// die Schleife nicht aufhalten.
    fn an_alle_ausser_senden(&mut self, ausser: Option<&ConnectionId>, text: &str) {
        let mut opfer: Vec<ConnectionId> = Vec::new();
        for (id, eintrag) in &self.verbindungen {
            if Some(id) == ausser {
                continue;
            }
            if !eintrag.senden(text) {
                opfer.push(*id);
            }
        }
        for id in opfer {
            tracing::warn!(id = %id, "Rundruf nicht zustellbar, Zwangsabmeldung");
            self.abmelden(&id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::resolver::StubResolver;
    use async_trait::async_trait;
    use kurier_core::types::TeamId;

    fn test_registry() -> RelayRegistry {
        RelayRegistry::neu(Arc::new(StubResolver))
    }

    async fn verbindung_anlegen(
        registry: &mut RelayRegistry,
        konto: &str,
        kapazitaet: usize,
    ) -> (ConnectionId, mpsc::Receiver<String>) {
        let (sende_tx, sende_rx) = mpsc::channel(kapazitaet);
        let id = ConnectionId::new();
        registry
            .befehl_verarbeiten(RegistryBefehl::Registrieren {
                id,
                konto: AccountId::from(konto),
                sende_tx,
            })
            .await;
        (id, sende_rx)
    }

    fn umschlag(absender: &str, ziel_konto: &str, inhalt: &str) -> Envelope {
        Envelope {
            absender: AccountId::from(absender),
            ziel: RoutingZiel::Direkt(AccountId::from(ziel_konto)),
            inhalt: inhalt.to_string(),
        }
    }

    fn leeren(rx: &mut mpsc::Receiver<String>) {
        while rx.try_recv().is_ok() {}
    }

    #[tokio::test]
    async fn live_menge_entspricht_registrierungen() {
        let mut registry = test_registry();

        let (a, _rx_a) = verbindung_anlegen(&mut registry, "a", 8).await;
        let (b, _rx_b) = verbindung_anlegen(&mut registry, "b", 8).await;
        let (c, _rx_c) = verbindung_anlegen(&mut registry, "c", 8).await;
        assert_eq!(registry.verbindungs_anzahl(), 3);

        registry
            .befehl_verarbeiten(RegistryBefehl::Abmelden { id: b })
            .await;
        assert_eq!(registry.verbindungs_anzahl(), 2);
        assert!(registry.ist_registriert(&a));
        assert!(!registry.ist_registriert(&b));
        assert!(registry.ist_registriert(&c));

        // Abmelden einer nie registrierten Verbindung ist ein No-op
        registry
            .befehl_verarbeiten(RegistryBefehl::Abmelden {
                id: ConnectionId::new(),
            })
            .await;
        assert_eq!(registry.verbindungs_anzahl(), 2);
    }

    #[tokio::test]
    async fn abmelden_ist_idempotent() {
        let mut registry = test_registry();

        let (a, _rx_a) = verbindung_anlegen(&mut registry, "a", 8).await;
        let (_b, mut rx_b) = verbindung_anlegen(&mut registry, "b", 8).await;
        leeren(&mut rx_b);

        registry
            .befehl_verarbeiten(RegistryBefehl::Abmelden { id: a })
            .await;
        registry
            .befehl_verarbeiten(RegistryBefehl::Abmelden { id: a })
            .await;

        assert_eq!(registry.verbindungs_anzahl(), 1);

        // Genau ein "getrennt"-Hinweis, nicht zwei
        let hinweis = rx_b.try_recv().expect("Hinweis muss vorhanden sein");
        assert!(hinweis.contains(HINWEIS_GETRENNT));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn registrierung_loest_rundruf_an_andere_aus() {
        let mut registry = test_registry();

        let (_a, mut rx_a) = verbindung_anlegen(&mut registry, "a", 8).await;
        let (_b, mut rx_b) = verbindung_anlegen(&mut registry, "b", 8).await;

        // a sieht den Beitritt von b, b selbst nicht
        let hinweis = rx_a.try_recv().expect("Hinweis muss vorhanden sein");
        assert!(hinweis.contains(HINWEIS_VERBUNDEN));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn direkte_zustellung_trifft_genau_passende_verbindungen() {
        let mut registry = test_registry();

        let (_b1, mut rx_b1) = verbindung_anlegen(&mut registry, "bob", 8).await;
        let (_b2, mut rx_b2) = verbindung_anlegen(&mut registry, "bob", 8).await;
        let (_c, mut rx_c) = verbindung_anlegen(&mut registry, "carol", 8).await;
        leeren(&mut rx_b1);
        leeren(&mut rx_b2);
        leeren(&mut rx_c);

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("alice", "bob", "hallo"),
            })
            .await;

        // Beide bob-Verbindungen bekommen die Zustellung, carol nichts
        for rx in [&mut rx_b1, &mut rx_b2] {
            let text = rx.try_recv().expect("Zustellung muss vorhanden sein");
            let msg: WireMessage = serde_json::from_str(&text).unwrap();
            assert_eq!(msg.sender.as_deref(), Some("alice"));
            assert_eq!(msg.content.as_deref(), Some("hallo"));
        }
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn zustellung_ohne_passende_verbindung_ist_kein_fehler() {
        let mut registry = test_registry();

        let (_a, mut rx_a) = verbindung_anlegen(&mut registry, "a", 8).await;
        leeren(&mut rx_a);

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("a", "niemand", "verloren"),
            })
            .await;

        assert_eq!(registry.verbindungs_anzahl(), 1);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn langsamer_empfaenger_wird_zwangsabgemeldet() {
        let mut registry = test_registry();

        // Kapazitaet 1, wird nicht geleert
        let (b, _rx_b) = verbindung_anlegen(&mut registry, "bob", 1).await;

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("alice", "bob", "eins"),
            })
            .await;
        assert!(registry.ist_registriert(&b), "eine Zustellung passt in die Queue");

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("alice", "bob", "zwei"),
            })
            .await;
        assert!(
            !registry.ist_registriert(&b),
            "volle Queue fuehrt zur Zwangsabmeldung"
        );
        assert_eq!(registry.verbindungs_anzahl(), 0);

        // Weitere Zustellungen zielen nicht mehr auf die Verbindung
        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("alice", "bob", "drei"),
            })
            .await;
        assert_eq!(registry.verbindungs_anzahl(), 0);
    }

    #[tokio::test]
    async fn drei_verbindungen_szenario() {
        let mut registry = test_registry();

        let (_a, mut rx_a) = verbindung_anlegen(&mut registry, "A", 8).await;
        let (_b, mut rx_b) = verbindung_anlegen(&mut registry, "B", 8).await;
        let (_c, mut rx_c) = verbindung_anlegen(&mut registry, "C", 8).await;

        // Beitritts-Hinweise: A sieht B und C, B sieht C, C nichts
        assert!(rx_a.try_recv().unwrap().contains(HINWEIS_VERBUNDEN));
        assert!(rx_a.try_recv().unwrap().contains(HINWEIS_VERBUNDEN));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().unwrap().contains(HINWEIS_VERBUNDEN));
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("A", "B", "hi"),
            })
            .await;

        // Nur B bekommt die Zustellung
        let text = rx_b.try_recv().expect("Zustellung muss vorhanden sein");
        let msg: WireMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(msg.sender.as_deref(), Some("A"));
        assert_eq!(msg.content.as_deref(), Some("hi"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn utf8_inhalt_kommt_unveraendert_an() {
        let mut registry = test_registry();

        let (_b, mut rx_b) = verbindung_anlegen(&mut registry, "bob", 8).await;
        let inhalt = "grüße 🦀 – ąćę\n\t\"quoted\"";

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("alice", "bob", inhalt),
            })
            .await;

        let text = rx_b.try_recv().unwrap();
        let msg: WireMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(msg.content.as_deref(), Some(inhalt));
    }

    #[tokio::test]
    async fn team_ziel_ist_derzeit_unzustellbar() {
        let mut registry = test_registry();

        let (_a, mut rx_a) = verbindung_anlegen(&mut registry, "a", 8).await;
        leeren(&mut rx_a);

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: Envelope {
                    absender: AccountId::from("a"),
                    ziel: RoutingZiel::Team(TeamId::from("team-1")),
                    inhalt: "an alle".into(),
                },
            })
            .await;

        assert!(rx_a.try_recv().is_err());
    }

    /// Resolver der jede Aufloesung fehlschlagen laesst
    struct FehlschlagResolver;

    #[async_trait]
    impl IdentityResolver for FehlschlagResolver {
        async fn aufloesen(&self, _ziel: &RoutingZiel) -> crate::error::RelayResult<Vec<AccountId>> {
            Err(RelayError::aufloesung("Verzeichnis nicht erreichbar"))
        }
    }

    #[tokio::test]
    async fn aufloesungsfehler_wird_verschluckt() {
        let mut registry = RelayRegistry::neu(Arc::new(FehlschlagResolver));

        let (_a, mut rx_a) = verbindung_anlegen(&mut registry, "a", 8).await;
        leeren(&mut rx_a);

        registry
            .befehl_verarbeiten(RegistryBefehl::Weiterleiten {
                umschlag: umschlag("a", "a", "x"),
            })
            .await;

        // Keine Zustellung, kein Fehler, Registry intakt
        assert!(rx_a.try_recv().is_err());
        assert_eq!(registry.verbindungs_anzahl(), 1);
    }

    #[tokio::test]
    async fn rundruf_an_vollen_empfaenger_meldet_ihn_ab() {
        let mut registry = test_registry();

        // a mit Kapazitaet 1: der Beitritts-Hinweis von b fuellt die Queue
        let (a, _rx_a) = verbindung_anlegen(&mut registry, "a", 1).await;
        let (_b, _rx_b) = verbindung_anlegen(&mut registry, "b", 8).await;
        assert!(registry.ist_registriert(&a));

        // Der naechste Rundruf trifft die volle Queue von a
        let (_c, _rx_c) = verbindung_anlegen(&mut registry, "c", 8).await;
        assert!(
            !registry.ist_registriert(&a),
            "voller Rundruf-Empfaenger wird abgemeldet"
        );
    }

    #[tokio::test]
    async fn zwei_registries_im_selben_prozess() {
        let mut erste = test_registry();
        let mut zweite = test_registry();

        let (_a, _rx) = verbindung_anlegen(&mut erste, "a", 8).await;
        assert_eq!(erste.verbindungs_anzahl(), 1);
        assert_eq!(zweite.verbindungs_anzahl(), 0);

        let (_b, _rx) = verbindung_anlegen(&mut zweite, "b", 8).await;
        assert_eq!(zweite.verbindungs_anzahl(), 1);
    }
}
