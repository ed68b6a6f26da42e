//!
//! src/main.rs
//!
//! Entry point: loads configuration, builds the catalog client
//! and cache, then runs the pipeline once
//!
//!

mod config;
mod errors;
mod logging;
mod types;

mod analysis;
mod fetch;
mod persistent;
mod pipeline;
mod sink;
mod table;

use crate::errors::PipelineError;

fn main() -> Result<(), PipelineError> {
    let cfgs = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="track-cache",
        version=%env!("CARGO_PKG_VERSION"),
        backend=?cfgs.cache.backend,
        "starting"
    );
    tracing::debug!(config = ?cfgs, "configuration");

    let spotify = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    let store   = persistent::open_store(&cfgs.cache)
        .inspect_err(|e| tracing::error!(error = %e, "cache.connect"))?;
    let cache   = persistent::TrackCache::initialize(store)?;
    let sink    = cfgs.sink.root.as_ref()
        .map(|root| sink::DiskZstdSink::new(root, cfgs.sink.level));

    let pipeline = pipeline::Pipeline::new(&cfgs.pipeline, Box::new(spotify), cache, sink);
    let summary  = pipeline.run()?;

    tracing::info!(
        run_id = %summary.run_id,
        artists_ok = summary.artists_ok.len(),
        tracks_stored = summary.tracks_stored,
        next_index = summary.next_index,
        rows = summary.table.len(),
        skipped_rows = summary.table.skipped.len(),
        skipped_artists = ?summary.artists_skipped,
        "finished"
    );

    Ok(())
}

/// Unit Tests
/// End to end against live services
#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
            && std::env::var("LIVE_REDIS").ok().as_deref() == Some("1")
    }

    #[test]
    fn pipeline_testbench() -> Result<(), PipelineError> {
        dotenvy::dotenv().ok();
        if !live() {
            eprintln!("Set LIVE_HTTP=1 and LIVE_REDIS=1 to run");
            return Ok(())
        }

        let mut cfgs = config::load_config()?;
        cfgs.pipeline.artists = vec!["Aerosmith".to_string(), "Unknown Artist XYZ qq".to_string()];

        let spotify = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
        let cache = persistent::TrackCache::initialize(persistent::open_store(&cfgs.cache)?)?;
        let summary = pipeline::Pipeline::new(&cfgs.pipeline, Box::new(spotify), cache, None)
            .run()?;

        println!("summary: {summary:#?}");
        assert_eq!(summary.table.len() as u64, summary.next_index);

        Ok(())
    }
}
