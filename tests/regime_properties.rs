use chrono::NaiveDate;
use tempfile::TempDir;

use regime_horizon_map::features::{rolling_features, ReturnSeries};
use regime_horizon_map::panel::build_panels;
use regime_horizon_map::regime::{classify, median, Regime};
use regime_horizon_map::render::layout::{min_marker_gap, AMPLITUDE};
use regime_horizon_map::render::{compose, plot_regime_horizon_map, RenderOptions, TransitionStyle};

/// Three years of returns with a calm stretch, a turbulent one and a recovery.
fn clustered_returns() -> ReturnSeries {
    let start = NaiveDate::from_ymd_opt(2019, 1, 2).unwrap();
    let n = 900;
    let dates = (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect();
    let values = (0..n)
        .map(|i| {
            let t = i as f64;
            let scale = if (400..480).contains(&i) { 0.04 } else { 0.008 };
            let drift = if i < 400 { 0.0006 } else if i < 480 { -0.004 } else { 0.0009 };
            drift + scale * (t * 1.7).sin() * (t * 0.31).cos()
        })
        .collect();
    ReturnSeries::new(dates, values).unwrap()
}

#[test]
fn feature_length_matches_horizon() {
    let r = clustered_returns();
    for h in [2, 5, 20, 60, 250] {
        let f = rolling_features(&r, h).unwrap();
        assert_eq!(f.len(), r.len() - h + 1, "h={}", h);
    }
}

#[test]
fn labels_follow_median_rule_for_every_entry() {
    let r = clustered_returns();
    for h in [5, 20, 60] {
        let f = rolling_features(&r, h).unwrap();
        let labels = classify(&f).unwrap();
        assert_eq!(labels.len(), f.len());
        let vols: Vec<f64> = f.rows.iter().map(|row| row.vol).collect();
        let thr = median(&vols).unwrap();
        for (row, label) in f.rows.iter().zip(&labels) {
            let expected = if row.vol >= thr {
                Regime::Uncertain
            } else if row.mu >= 0.0 {
                Regime::Positive
            } else {
                Regime::Negative
            };
            assert_eq!(*label, expected);
        }
    }
}

#[test]
fn each_horizon_has_its_own_cutoff() {
    let r = clustered_returns();
    let m5 = median(&rolling_features(&r, 5).unwrap().rows.iter().map(|x| x.vol).collect::<Vec<_>>()).unwrap();
    let m60 = median(&rolling_features(&r, 60).unwrap().rows.iter().map(|x| x.vol).collect::<Vec<_>>()).unwrap();
    assert_ne!(m5, m60);
}

#[test]
fn figure_respects_normalization_alpha_and_spacing() {
    let panels = build_panels(&clustered_returns(), &[60, 5, 20]).unwrap();
    let fig = compose(&panels, &RenderOptions::for_ticker("SPY"));

    let labels: Vec<_> = fig.bands.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["5D", "20D", "60D"]);
    assert_eq!(fig.bands[2].axis_label, "60-Day Horizon");
    assert!(fig.title.contains("SPY"));

    for band in &fig.bands {
        for v in band.mag.iter().chain(&band.unc) {
            assert!((0.0..=1.0).contains(v));
        }
        let peak = band.unc.iter().cloned().fold(0.0_f64, f64::max);
        assert!((peak - 1.0).abs() < 1e-6);

        for s in &band.segments {
            assert!((0.05..=0.95).contains(&s.alpha));
            assert!((s.top - s.baseline).abs() <= AMPLITUDE + 1e-12);
        }

        let gap = min_marker_gap(&band.label);
        for w in band.markers.windows(2) {
            assert!(w[1].index - w[0].index >= gap);
        }
        for m in &band.markers {
            assert!(m.from == Regime::Uncertain || m.to == Regime::Uncertain);
        }
    }
}

#[test]
fn shock_annotation_sits_above_top_band() {
    let panels = build_panels(&clustered_returns(), &[5, 20]).unwrap();
    let fig = compose(&panels, &RenderOptions::default());
    let note = fig.annotation.expect("history spans 2020");
    assert_eq!(note.date, NaiveDate::from_ymd_opt(2020, 3, 16).unwrap());
    assert_eq!(note.point_y, 1.0);
}

#[test]
fn lines_style_is_carried_into_figure() {
    let panels = build_panels(&clustered_returns(), &[20]).unwrap();
    let opts = RenderOptions { transition_style: TransitionStyle::Lines, ..RenderOptions::default() };
    let fig = plot_regime_horizon_map(&panels, None, &opts).unwrap();
    assert_eq!(fig.transition_style, TransitionStyle::Lines);
    assert!(fig.saved_to.is_none());
    assert_eq!(fig.segment_count(), panels[0].len() - 1);
}

#[test]
fn chart_is_written_into_new_directories_and_overwritten() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("outputs").join("map.png");
    let panels = build_panels(&clustered_returns(), &[5, 20, 60]).unwrap();
    let opts = RenderOptions::for_ticker("SPY");

    let fig = plot_regime_horizon_map(&panels, Some(path.as_path()), &opts).unwrap();
    assert_eq!(fig.saved_to.as_deref(), Some(path.as_path()));
    let first = std::fs::read(&path).unwrap();
    assert!(first.starts_with(b"\x89PNG"));

    std::fs::write(&path, b"stale").unwrap();
    let again = plot_regime_horizon_map(&panels, Some(path.as_path()), &opts).unwrap();
    assert_eq!(again.saved_to.as_deref(), Some(path.as_path()));
    let second = std::fs::read(&path).unwrap();
    assert!(second.starts_with(b"\x89PNG"));
    assert!(second.len() > b"stale".len());
}
