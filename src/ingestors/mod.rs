//! Every concrete ingestor, one module per entity kind. This file is the
//! "single central manifest" the design notes call for: every ingestor
//! module is declared here, so the registry's enumeration never depends on
//! filesystem walk order or self-registration at import time.

pub mod awards;
pub mod box_score_advanced;
pub mod box_score_hustle;
pub mod box_score_traditional;
pub mod bulk_box_scores;
pub mod bulk_elo;
pub mod bulk_pbp;
pub mod bulk_raptor;
pub mod coaches;
pub mod contracts;
pub mod draft;
pub mod franchises;
pub mod games;
pub mod injuries;
pub mod lineups;
pub mod officials;
pub mod play_by_play;
pub mod players;
pub mod seasons;
pub mod shot_charts;
pub mod teams;
pub mod team_advanced;
pub mod team_other_stats;
pub mod tracking;

/// Chunk size for bulk-ingestor batched commits: ~1000 rows per
/// transaction keeps the write-ahead journal bounded.
pub const BULK_BATCH_SIZE: usize = 1000;
