//! The name-keyed ingestor registry. A single central manifest constructs
//! every concrete ingestor behind the `DynIngestor` façade so enumeration
//! never depends on import order or a filesystem walk.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::ingestor::{DynIngestor, SourceContexts};
use crate::ingestors::*;

type Factory = fn(&SourceContexts) -> Arc<dyn DynIngestor>;

fn manifest() -> &'static HashMap<&'static str, Factory> {
    static MANIFEST: OnceLock<HashMap<&'static str, Factory>> = OnceLock::new();
    MANIFEST.get_or_init(|| {
        let mut m: HashMap<&'static str, Factory> = HashMap::new();
        m.insert("seasons", |c| Arc::new(seasons::SeasonsIngestor::new(c)));
        m.insert("franchises", |c| Arc::new(franchises::FranchisesIngestor::new(c)));
        m.insert("players", |c| Arc::new(players::PlayersIngestor::new(c)));
        m.insert("draft", |c| Arc::new(draft::DraftIngestor::new(c)));
        m.insert("teams", |c| Arc::new(teams::TeamsIngestor::new(c)));
        m.insert("lineups", |c| Arc::new(lineups::LineupsIngestor::new(c)));
        m.insert("team_advanced", |c| Arc::new(team_advanced::TeamAdvancedIngestor::new(c)));
        m.insert("coaches", |c| Arc::new(coaches::CoachesIngestor::new(c)));
        m.insert("games", |c| Arc::new(games::GamesIngestor::new(c)));
        m.insert("officials", |c| Arc::new(officials::OfficialsIngestor::new(c)));
        m.insert("box_score_traditional", |c| {
            Arc::new(box_score_traditional::BoxScoreTraditionalIngestor::new(c))
        });
        m.insert("box_score_advanced", |c| Arc::new(box_score_advanced::BoxScoreAdvancedIngestor::new(c)));
        m.insert("box_score_hustle", |c| Arc::new(box_score_hustle::BoxScoreHustleIngestor::new(c)));
        m.insert("team_other_stats", |c| Arc::new(team_other_stats::TeamOtherStatsIngestor::new(c)));
        m.insert("play_by_play", |c| Arc::new(play_by_play::PlayByPlayIngestor::new(c)));
        m.insert("shot_charts", |c| Arc::new(shot_charts::ShotChartsIngestor::new(c)));
        m.insert("awards", |c| Arc::new(awards::AwardsIngestor::new(c)));
        m.insert("tracking", |c| Arc::new(tracking::TrackingIngestor::new(c)));
        m.insert("injuries", |c| Arc::new(injuries::InjuriesIngestor::new(c)));
        m.insert("contracts", |c| Arc::new(contracts::ContractsIngestor::new(c)));
        m.insert("bulk_elo", |c| Arc::new(bulk_elo::BulkEloIngestor::new(c)));
        m.insert("bulk_raptor", |c| Arc::new(bulk_raptor::BulkRaptorIngestor::new(c)));
        m.insert("bulk_pbp", |c| Arc::new(bulk_pbp::BulkPbpIngestor::new(c)));
        m.insert("bulk_box_scores", |c| Arc::new(bulk_box_scores::BulkBoxScoresIngestor::new(c)));
        m
    })
}

/// Instantiates the named ingestor against `contexts`, or `None` if the name
/// isn't registered. Instantiation is cheap -- each ingestor only clones a
/// `FetchContext` and builds a thin source client.
pub fn create(entity_kind: &str, contexts: &SourceContexts) -> Option<Arc<dyn DynIngestor>> {
    manifest().get(entity_kind).map(|factory| factory(contexts))
}

/// Every registered entity kind, in manifest order. Used by the orchestrator
/// to enumerate a stage's ingestors and by operator tooling to list what
/// exists (including stubbed ingestors like `contracts`).
pub fn list_all() -> Vec<&'static str> {
    manifest().keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_ingestor_is_registered() {
        let names = list_all();
        assert!(names.contains(&"seasons"));
        assert!(names.contains(&"contracts"));
        assert!(names.contains(&"bulk_raptor"));
        assert_eq!(names.len(), 24);
    }
}
