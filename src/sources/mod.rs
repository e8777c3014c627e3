//! Thin HTTP/file adapters, one per source family. These own the
//! wire-level shape (stats JSON vs HTML vs a bulk archive) and the
//! cache/rate-limit wiring; ingestors call into whichever adapter matches
//! their source and hand the raw body to their own `validate()`.

pub mod bulk_archive;
pub mod html_archive;
pub mod scraper;
pub mod stats_api;
