//!
//! src/pipeline.rs
//!
//! Defines the driver: one credential, one fetch and store per artist,
//! one table handed to the analysis consumers
//!

use serde_json::json;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::analysis;
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::fetch::Catalog;
use crate::persistent::TrackCache;
use crate::sink::{DiskZstdSink, RawType};
use crate::table::TrackTable;

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub artists_ok: Vec<String>,
    pub artists_skipped: Vec<String>,
    pub tracks_stored: u64,
    pub next_index: u64,
    pub table: TrackTable
}

pub struct Pipeline {
    catalog: Box<dyn Catalog>,
    cache: TrackCache,
    sink: Option<DiskZstdSink>,
    cfg: PipelineConfig
}

impl Pipeline {
    pub fn new(
        cfg: &PipelineConfig,
        catalog: Box<dyn Catalog>,
        cache: TrackCache,
        sink: Option<DiskZstdSink>
    ) -> Self {
        Self { catalog, cache, sink, cfg: cfg.clone() }
    }

    pub fn run(mut self) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        let _entered = span.enter();

        info!(artists = self.cfg.artists.len(), "pipeline.start");
        let credential = self.catalog.acquire_credential()
            .inspect_err(|e| error!(error = %e, "pipeline.credential"))?;

        let mut key_index: u64 = 0;
        let mut artists_ok = Vec::new();
        let mut artists_skipped = Vec::new();

        for artist in &self.cfg.artists {
            let tracks = match self.catalog.top_tracks_for_artist(&credential, artist) {
                Ok(tracks) => tracks,
                Err(e) if e.is_skippable() => {
                    warn!(artist = %artist, error = %e, "pipeline.artist.skip");
                    artists_skipped.push(artist.clone());
                    continue;
                },
                Err(e) => {
                    error!(artist = %artist, error = %e, "pipeline.artist.abort");
                    return Err(e);
                }
            };

            let start = key_index;
            key_index = self.cache.store_batch(key_index, &tracks)?;
            info!(artist = %artist, first = start, next = key_index, "pipeline.artist.stored");

            if let Some(sink) = &self.sink {
                sink.write_json(RawType::TopTracks, artist, serde_json::Value::Array(tracks))?;
            }
            artists_ok.push(artist.clone());
        }

        let table = self.cache.build_table(self.cfg.artist_selection)?;
        report(&table);

        if let Some(sink) = &self.sink {
            let snapshot = json!({
                "run_id": run_id.to_string(),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "table": serde_json::to_value(&table)?,
            });
            let path = sink.write_json(RawType::TrackTable, &run_id.to_string(), snapshot)?;
            info!(path = %path.display(), "pipeline.table.archived");
        }

        let tracks_stored = self.cache.track_count()? as u64;
        info!(
            ok = artists_ok.len(),
            skipped = artists_skipped.len(),
            tracks = tracks_stored,
            "pipeline.done"
        );

        Ok( RunSummary {
            run_id,
            artists_ok,
            artists_skipped,
            tracks_stored,
            next_index: key_index,
            table
        })
    }
}

/// Hands the table to each analysis consumer and logs what they found
fn report(table: &TrackTable) {
    if table.is_empty() {
        warn!("analysis.empty_table");
        return;
    }

    let duration = analysis::duration_vs_popularity(table);
    match duration.fit {
        Some(fit) => info!(
            slope = fit.slope, intercept = fit.intercept, r = ?fit.r, n = fit.n,
            mean_duration_ms = ?duration.mean_duration_ms,
            "analysis.duration_vs_popularity"
        ),
        None => warn!(rows = table.len(), "analysis.duration_vs_popularity.insufficient"),
    }

    let explicit = analysis::explicit_vs_popularity(table);
    info!(
        explicit = explicit.explicit_tracks,
        clean = explicit.clean_tracks,
        mean_explicit = ?explicit.mean_popularity_explicit,
        mean_clean = ?explicit.mean_popularity_clean,
        slope = ?explicit.fit.map(|f| f.slope),
        "analysis.explicit_vs_popularity"
    );

    for artist in analysis::artist_vs_popularity(table) {
        info!(
            artist = %artist.artist,
            tracks = artist.tracks,
            mean = artist.mean,
            min = artist.min,
            max = artist.max,
            "analysis.artist_vs_popularity"
        );
    }
}
