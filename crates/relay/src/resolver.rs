//! Identity-Resolver – Aufloesung von Routing-Zielen
//!
//! Die Registry kennt nur das Trait; welche Konten hinter einem Team
//! stehen ist eine externe Faehigkeit. Die konkrete Mitgliedschafts-
//! Abfrage (Verzeichnisdienst, Datenbank) wird spaeter hinter diesem
//! Trait bereitgestellt.

use async_trait::async_trait;
use kurier_core::types::{AccountId, RoutingZiel};

use crate::error::RelayResult;

/// Trait fuer die Aufloesung von Routing-Zielen
#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    /// Loest ein Routing-Ziel in konkrete Konto-Identitaeten auf
    ///
    /// Direkte Ziele ergeben genau eine Identitaet, Team-Ziele die
    /// (moeglicherweise leere) Mitgliedschaft.
    async fn aufloesen(&self, ziel: &RoutingZiel) -> RelayResult<Vec<AccountId>>;
}

/// Platzhalter-Resolver ohne Team-Mitgliedschafts-Abfrage
///
/// Direkte Ziele werden 1:1 aufgeloest. Team-Ziele ergeben eine leere
/// Liste – Team-adressierte Nachrichten sind in dieser Version nicht
/// zustellbar.
pub struct StubResolver;

#[async_trait]
impl IdentityResolver for StubResolver {
    async fn aufloesen(&self, ziel: &RoutingZiel) -> RelayResult<Vec<AccountId>> {
        match ziel {
            RoutingZiel::Direkt(konto) => Ok(vec![konto.clone()]),
            RoutingZiel::Team(team) => {
                tracing::debug!(team = %team, "Team-Aufloesung nicht implementiert, leere Mitgliedschaft");
                Ok(Vec::new())
            }
        }
    }
}
