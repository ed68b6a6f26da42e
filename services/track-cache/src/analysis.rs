//!
//! src/analysis.rs
//!
//! Consumers of the flattened table: the three relationships the
//! exploratory plots look at, reduced to numbers
//!

use std::collections::BTreeMap;

use serde::Serialize;

use crate::table::TrackTable;

/// Order-1 least-squares fit `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation, `None` when `y` has no spread
    pub r: Option<f64>,
    pub n: usize
}

impl LinearFit {
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len().min(y.len());
        if n < 2 {
            return None;
        }
        let (x, y) = (&x[..n], &y[..n]);
        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;

        let mut sxx = 0.0;
        let mut syy = 0.0;
        let mut sxy = 0.0;
        for (xi, yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        if sxx == 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        let r = (syy > 0.0).then(|| sxy / (sxx * syy).sqrt());
        Some( Self { slope, intercept: mean_y - slope * mean_x, r, n } )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationVsPopularity {
    pub fit: Option<LinearFit>,
    pub mean_duration_ms: Option<f64>
}

pub fn duration_vs_popularity(table: &TrackTable) -> DurationVsPopularity {
    let durations = table.duration_ms();
    DurationVsPopularity {
        fit: LinearFit::fit(&table.popularity(), &durations),
        mean_duration_ms: mean(&durations)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplicitVsPopularity {
    pub fit: Option<LinearFit>,
    pub explicit_tracks: usize,
    pub clean_tracks: usize,
    pub mean_popularity_explicit: Option<f64>,
    pub mean_popularity_clean: Option<f64>
}

pub fn explicit_vs_popularity(table: &TrackTable) -> ExplicitVsPopularity {
    let (explicit, clean): (Vec<_>, Vec<_>) = table.rows.iter().partition(|r| r.explicit);
    let explicit: Vec<f64> = explicit.iter().map(|r| r.popularity as f64).collect();
    let clean: Vec<f64> = clean.iter().map(|r| r.popularity as f64).collect();

    ExplicitVsPopularity {
        fit: LinearFit::fit(&table.popularity(), &table.explicit()),
        explicit_tracks: explicit.len(),
        clean_tracks: clean.len(),
        mean_popularity_explicit: mean(&explicit),
        mean_popularity_clean: mean(&clean)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistPopularity {
    pub artist: String,
    pub tracks: usize,
    pub mean: f64,
    pub min: u8,
    pub max: u8
}

/// One entry per artist, sorted by name
pub fn artist_vs_popularity(table: &TrackTable) -> Vec<ArtistPopularity> {
    let mut by_artist: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
    for row in &table.rows {
        by_artist.entry(row.artist_name.as_str()).or_default().push(row.popularity);
    }

    by_artist.into_iter()
        .map(|(artist, scores)| {
            let total: u32 = scores.iter().map(|&s| s as u32).sum();
            ArtistPopularity {
                artist: artist.to_string(),
                tracks: scores.len(),
                mean: total as f64 / scores.len() as f64,
                min: scores.iter().copied().min().unwrap_or_default(),
                max: scores.iter().copied().max().unwrap_or_default()
            }
        })
        .collect()
}

fn mean(xs: &[f64]) -> Option<f64> {
    (!xs.is_empty()).then(|| xs.iter().sum::<f64>() / xs.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TrackRow;

    fn row(artist: &str, duration_ms: u64, explicit: bool, popularity: u8) -> TrackRow {
        TrackRow {
            track_name: format!("{artist} {popularity}"),
            artist_name: artist.to_string(),
            album_name: "album".to_string(),
            duration_ms,
            explicit,
            popularity
        }
    }

    fn table(rows: Vec<TrackRow>) -> TrackTable {
        TrackTable { rows, ..TrackTable::new() }
    }

    #[test]
    fn fit_recovers_a_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = LinearFit::fit(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.r.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fit_needs_spread_in_x() {
        assert!(LinearFit::fit(&[5.0], &[1.0]).is_none());
        assert!(LinearFit::fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).is_none());

        let flat = LinearFit::fit(&[1.0, 2.0], &[4.0, 4.0]).unwrap();
        assert_eq!(flat.slope, 0.0);
        assert!(flat.r.is_none());
    }

    #[test]
    fn duration_fit_uses_popularity_as_x() {
        let t = table(vec![
            row("Journey", 200_000, false, 40),
            row("Journey", 250_000, false, 60),
            row("Journey", 300_000, false, 80),
        ]);
        let got = duration_vs_popularity(&t);
        let fit = got.fit.unwrap();
        assert!((fit.slope - 2_500.0).abs() < 1e-6);
        assert_eq!(got.mean_duration_ms, Some(250_000.0));
    }

    #[test]
    fn explicit_split_counts_and_means() {
        let t = table(vec![
            row("a", 1, true, 30),
            row("a", 1, true, 50),
            row("b", 1, false, 80),
        ]);
        let got = explicit_vs_popularity(&t);
        assert_eq!(got.explicit_tracks, 2);
        assert_eq!(got.clean_tracks, 1);
        assert_eq!(got.mean_popularity_explicit, Some(40.0));
        assert_eq!(got.mean_popularity_clean, Some(80.0));
        assert!(got.fit.unwrap().slope < 0.0);
    }

    #[test]
    fn artists_are_grouped_and_sorted() {
        let t = table(vec![
            row("KISS", 1, false, 60),
            row("AC/DC", 1, false, 90),
            row("KISS", 1, false, 70),
        ]);
        let got = artist_vs_popularity(&t);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].artist, "AC/DC");
        assert_eq!(got[1], ArtistPopularity {
            artist: "KISS".into(), tracks: 2, mean: 65.0, min: 60, max: 70
        });
    }

    #[test]
    fn empty_table_yields_no_numbers() {
        let t = TrackTable::new();
        assert!(duration_vs_popularity(&t).fit.is_none());
        assert!(explicit_vs_popularity(&t).mean_popularity_clean.is_none());
        assert!(artist_vs_popularity(&t).is_empty());
    }
}
