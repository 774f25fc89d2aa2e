//! Chart geometry, computed without touching a drawing backend.
//!
//! Each panel becomes one horizontal band centred on its sort rank. Within
//! a band, every pair of consecutive dates produces a rectangle from the
//! baseline towards `sign(mu) * mag * AMPLITUDE`, filled with the current
//! point's regime color at an opacity driven by normalized volatility.

use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;

use crate::panel::{parse_horizon_label, HorizonPanel};
use crate::regime::Regime;
use crate::render::style::{style_for, LEGEND};

/// Vertical reach of a band; neighbours sit 1.0 apart.
pub const AMPLITUDE: f64 = 0.85;
pub const BAND_HEIGHT: f64 = 0.90;
pub const TICK_HALF: f64 = 0.18;
pub const Y_FLOOR: f64 = -0.8;
pub const EPS: f64 = 1e-12;

const UNPARSED_SORT_KEY: usize = 1_000_000_000;
const DEFAULT_MIN_GAP: usize = 15;

pub const SHOCK_TEXT: &str = "COVID-19 volatility shock";
pub const SHOCK_YEAR: i32 = 2020;
const SHOCK_TEXT_OFFSET: f64 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionStyle {
    /// Faint vertical line across the whole chart
    Lines,
    /// Short tick inside the panel's band
    #[default]
    Ticks,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub show_legend: bool,
    pub show_transitions: bool,
    pub transition_style: TransitionStyle,
    pub annotate_shocks: bool,
    pub title: String,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_legend: true,
            show_transitions: true,
            transition_style: TransitionStyle::Ticks,
            annotate_shocks: true,
            title: "Regime-Horizon Map".to_string(),
            width_in: 14.0,
            height_in: 6.0,
            dpi: 240.0,
        }
    }
}

impl RenderOptions {
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            title: format!("Regime-Horizon Map for {}", ticker),
            ..Self::default()
        }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi).round() as u32,
            (self.height_in * self.dpi).round() as u32,
        )
    }

    /// Point size to pixels at the configured resolution.
    pub fn px(&self, points: f64) -> f64 {
        points * self.dpi / 72.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub baseline: f64,
    pub top: f64,
    pub regime: Regime,
    pub rgb: (u8, u8, u8),
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub index: usize,
    pub date: NaiveDate,
    pub from: Regime,
    pub to: Regime,
}

#[derive(Debug, Clone)]
pub struct Band {
    pub label: String,
    pub axis_label: String,
    pub baseline: f64,
    pub mag: Vec<f64>,
    pub unc: Vec<f64>,
    pub segments: Vec<Segment>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShockAnnotation {
    pub date: NaiveDate,
    pub text: &'static str,
    pub point_y: f64,
    pub text_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: &'static str,
    pub rgb: (u8, u8, u8),
}

/// Everything needed to draw the chart; returned whether or not it was saved.
#[derive(Debug, Clone)]
pub struct RegimeFigure {
    pub title: String,
    pub subtitle: String,
    pub bands: Vec<Band>,
    pub legend: Vec<LegendEntry>,
    pub annotation: Option<ShockAnnotation>,
    pub transition_style: TransitionStyle,
    pub x_range: Option<(NaiveDate, NaiveDate)>,
    pub y_range: (f64, f64),
    pub saved_to: Option<PathBuf>,
}

impl RegimeFigure {
    pub fn segment_count(&self) -> usize {
        self.bands.iter().map(|b| b.segments.len()).sum()
    }

    pub fn marker_count(&self) -> usize {
        self.bands.iter().map(|b| b.markers.len()).sum()
    }
}

/// Ascending by day count; labels that are not `<N>D` go last in input order.
pub fn sort_panels(panels: &[HorizonPanel]) -> Vec<&HorizonPanel> {
    let mut sorted: Vec<&HorizonPanel> = panels.iter().collect();
    sorted.sort_by_key(|p| p.horizon_days().unwrap_or(UNPARSED_SORT_KEY));
    sorted
}

/// `|x| / (max|x| + EPS)`, so every value lands in [0, 1].
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let peak = values.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
    values.iter().map(|v| v.abs() / (peak + EPS)).collect()
}

/// -1, 0 or +1; zero drift draws a flat segment.
pub fn drift_sign(mu: f64) -> f64 {
    if mu > 0.0 {
        1.0
    } else if mu < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn min_marker_gap(label: &str) -> usize {
    match label.trim() {
        "5D" => 10,
        "20D" => 20,
        "60D" => 30,
        _ => DEFAULT_MIN_GAP,
    }
}

/// Regime changes worth marking.
///
/// A change is kept only when it enters or leaves the uncertain regime and
/// sits at least `min_marker_gap(label)` positions after the last kept
/// marker. Skipped changes never move the gap anchor. The first point counts
/// as a change, so a series opening in the uncertain regime is marked at
/// index 0.
pub fn transition_markers(dates: &[NaiveDate], regime: &[Regime], label: &str) -> Vec<Marker> {
    let min_gap = min_marker_gap(label);
    let mut last_mark: Option<usize> = None;
    let mut markers = Vec::new();

    for idx in 0..regime.len().min(dates.len()) {
        // The first point has no predecessor and always counts as a change
        let (from, to) = (regime[idx.saturating_sub(1)], regime[idx]);
        if idx > 0 && from == to {
            continue;
        }
        if last_mark.is_some_and(|last| idx - last < min_gap) {
            continue;
        }
        if from != Regime::Uncertain && to != Regime::Uncertain {
            continue;
        }
        last_mark = Some(idx);
        markers.push(Marker { index: idx, date: dates[idx], from, to });
    }
    markers
}

pub fn axis_label(label: &str) -> String {
    let lbl = label.trim();
    match lbl.strip_suffix('D') {
        Some(n) if parse_horizon_label(lbl).is_some() => format!("{}-Day Horizon", n),
        _ if !lbl.is_empty() => lbl.to_string(),
        _ => "Horizon".to_string(),
    }
}

/// Annotation for the 2020 shock when `panel` covers that year.
pub fn shock_annotation(panel: &HorizonPanel, top_baseline: f64) -> Option<ShockAnnotation> {
    let first = panel.dates().iter().map(|d| d.year()).min()?;
    let last = panel.dates().iter().map(|d| d.year()).max()?;
    if first > SHOCK_YEAR || last < SHOCK_YEAR {
        return None;
    }
    Some(ShockAnnotation {
        date: NaiveDate::from_ymd_opt(SHOCK_YEAR, 3, 16)?,
        text: SHOCK_TEXT,
        point_y: top_baseline,
        text_y: top_baseline + SHOCK_TEXT_OFFSET,
    })
}

fn band_for(panel: &HorizonPanel, rank: usize, opts: &RenderOptions) -> Band {
    let baseline = rank as f64;
    let mag = normalize(panel.mu());
    let unc = normalize(panel.vol());
    let dates = panel.dates();

    let segments = (1..panel.len())
        .map(|j| {
            let regime = panel.regime()[j];
            let style = style_for(regime);
            Segment {
                start: dates[j - 1],
                end: dates[j],
                baseline,
                top: baseline + drift_sign(panel.mu()[j]) * mag[j] * AMPLITUDE,
                regime,
                rgb: style.rgb,
                alpha: style.alpha(unc[j]),
            }
        })
        .collect();

    let markers = if opts.show_transitions {
        transition_markers(dates, panel.regime(), panel.label())
    } else {
        Vec::new()
    };

    Band {
        label: panel.label().to_string(),
        axis_label: axis_label(panel.label()),
        baseline,
        mag,
        unc,
        segments,
        markers,
    }
}

/// Lay out all panels into a figure.
pub fn compose(panels: &[HorizonPanel], opts: &RenderOptions) -> RegimeFigure {
    let sorted = sort_panels(panels);
    let n = sorted.len();
    let bands: Vec<Band> = sorted
        .iter()
        .enumerate()
        .map(|(i, p)| band_for(p, i, opts))
        .collect();

    let x_min = sorted.iter().filter_map(|p| p.dates().first()).min().copied();
    let x_max = sorted.iter().filter_map(|p| p.dates().last()).max().copied();
    let top_baseline = n.saturating_sub(1) as f64;

    let annotation = if opts.annotate_shocks {
        sorted.last().and_then(|p| shock_annotation(p, top_baseline))
    } else {
        None
    };

    let legend = if opts.show_legend {
        LEGEND
            .iter()
            .map(|&r| {
                let s = style_for(r);
                LegendEntry { label: s.legend, rgb: s.rgb }
            })
            .collect()
    } else {
        Vec::new()
    };

    RegimeFigure {
        title: opts.title.clone(),
        subtitle: "Green: Positive Drift | Red: Negative Drift | Gray: High Uncertainty (Volatility)".to_string(),
        bands,
        legend,
        annotation,
        transition_style: opts.transition_style,
        x_range: x_min.zip(x_max),
        y_range: (Y_FLOOR, top_baseline + BAND_HEIGHT),
        saved_to: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn panel(label: &str, regime: Vec<Regime>) -> HorizonPanel {
        let n = regime.len();
        let dates = (0..n).map(day).collect();
        let mu = (0..n).map(|i| ((i as f64) * 0.5).sin() * 0.01).collect();
        let vol = (0..n).map(|i| 0.01 + (i % 7) as f64 * 0.001).collect();
        HorizonPanel::new(label, dates, mu, vol, regime).unwrap()
    }

    #[test]
    fn test_sort_numeric_then_unparsed_stable() {
        let panels = vec![
            panel("60D", vec![Regime::Positive; 3]),
            panel("weekly", vec![Regime::Positive; 3]),
            panel("5D", vec![Regime::Positive; 3]),
            panel("", vec![Regime::Positive; 3]),
            panel("20D", vec![Regime::Positive; 3]),
        ];
        let labels: Vec<_> = sort_panels(&panels).iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["5D", "20D", "60D", "weekly", ""]);
    }

    #[test]
    fn test_normalize_bounds() {
        let v = normalize(&[0.02, -0.05, 0.0, 0.01]);
        assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
        assert!((v[1] - 1.0).abs() < 1e-9);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_drift_sign_zero_is_flat() {
        assert_eq!(drift_sign(0.0), 0.0);
        assert_eq!(drift_sign(-1e-9), -1.0);
        assert_eq!(drift_sign(3.0), 1.0);
    }

    #[test]
    fn test_axis_labels() {
        assert_eq!(axis_label("5D"), "5-Day Horizon");
        assert_eq!(axis_label(" 20D "), "20-Day Horizon");
        assert_eq!(axis_label("weekly"), "weekly");
        assert_eq!(axis_label("  "), "Horizon");
    }

    #[test]
    fn test_min_gap_table() {
        assert_eq!(min_marker_gap("5D"), 10);
        assert_eq!(min_marker_gap("20D"), 20);
        assert_eq!(min_marker_gap("60D"), 30);
        assert_eq!(min_marker_gap("10D"), 15);
    }

    #[test]
    fn test_direct_flip_not_marked() {
        let mut regime = vec![Regime::Positive; 40];
        for r in regime.iter_mut().skip(20) {
            *r = Regime::Negative;
        }
        let dates: Vec<_> = (0..40).map(day).collect();
        assert!(transition_markers(&dates, &regime, "5D").is_empty());
    }

    #[test]
    fn test_markers_respect_spacing() {
        // Flicker into and out of uncertainty every 3 steps
        let regime: Vec<Regime> = (0..200)
            .map(|i| if (i / 3) % 2 == 0 { Regime::Positive } else { Regime::Uncertain })
            .collect();
        let dates: Vec<_> = (0..200).map(day).collect();
        for (label, gap) in [("5D", 10), ("20D", 20), ("60D", 30), ("other", 15)] {
            let markers = transition_markers(&dates, &regime, label);
            assert!(!markers.is_empty());
            for w in markers.windows(2) {
                assert!(w[1].index - w[0].index >= gap, "{}: {:?}", label, w);
            }
        }
    }

    #[test]
    fn test_first_uncertain_change_is_marked() {
        let regime = vec![Regime::Positive, Regime::Positive, Regime::Uncertain, Regime::Negative];
        let dates: Vec<_> = (0..4).map(day).collect();
        let markers = transition_markers(&dates, &regime, "5D");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].index, 2);
        assert_eq!(markers[0].date, day(2));
    }

    #[test]
    fn test_leading_uncertainty_is_marked_and_holds_gap() {
        let regime: Vec<Regime> = std::iter::repeat(Regime::Uncertain)
            .take(5)
            .chain(std::iter::repeat(Regime::Positive).take(25))
            .collect();
        let dates: Vec<_> = (0..30).map(day).collect();
        let markers = transition_markers(&dates, &regime, "5D");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].index, 0);
        assert_eq!(markers[0].from, Regime::Uncertain);
        assert_eq!(markers[0].to, Regime::Uncertain);

        let mut calm = regime.clone();
        calm[..5].fill(Regime::Negative);
        assert!(transition_markers(&dates, &calm, "5D").is_empty());
    }

    #[test]
    fn test_segments_use_current_point() {
        let p = panel("5D", vec![Regime::Positive, Regime::Uncertain, Regime::Negative]);
        let fig = compose(&[p], &RenderOptions::default());
        let band = &fig.bands[0];
        assert_eq!(band.segments.len(), 2);
        assert_eq!(band.segments[0].regime, Regime::Uncertain);
        assert_eq!(band.segments[1].regime, Regime::Negative);
        assert_eq!(band.segments[0].start, day(0));
        assert_eq!(band.segments[0].end, day(1));
        for s in &band.segments {
            assert!((0.05..=0.95).contains(&s.alpha));
            assert!((s.top - s.baseline).abs() <= AMPLITUDE + 1e-12);
        }
    }

    #[test]
    fn test_bands_stack_by_rank() {
        let fig = compose(
            &[panel("60D", vec![Regime::Positive; 5]), panel("5D", vec![Regime::Positive; 5])],
            &RenderOptions::default(),
        );
        assert_eq!(fig.bands[0].label, "5D");
        assert_eq!(fig.bands[0].baseline, 0.0);
        assert_eq!(fig.bands[1].baseline, 1.0);
        assert_eq!(fig.y_range, (Y_FLOOR, 1.0 + BAND_HEIGHT));
        assert_eq!(fig.legend.len(), 3);
    }

    #[test]
    fn test_shock_annotation_requires_2020() {
        let p = panel("5D", vec![Regime::Positive; 10]);
        assert!(shock_annotation(&p, 0.0).is_none());

        let dates = vec![
            NaiveDate::from_ymd_opt(2019, 12, 30).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(),
        ];
        let p = HorizonPanel::new("5D", dates, vec![0.0; 2], vec![0.01; 2], vec![Regime::Positive; 2]).unwrap();
        let a = shock_annotation(&p, 2.0).unwrap();
        assert_eq!(a.date, NaiveDate::from_ymd_opt(2020, 3, 16).unwrap());
        assert_eq!(a.point_y, 2.0);
        assert!((a.text_y - 2.55).abs() < 1e-12);
    }

    #[test]
    fn test_options_toggle_extras() {
        let opts = RenderOptions {
            show_legend: false,
            show_transitions: false,
            annotate_shocks: false,
            ..RenderOptions::default()
        };
        let regime: Vec<Regime> = (0..50)
            .map(|i| if i % 12 < 6 { Regime::Positive } else { Regime::Uncertain })
            .collect();
        let fig = compose(&[panel("5D", regime)], &opts);
        assert!(fig.legend.is_empty());
        assert_eq!(fig.marker_count(), 0);
        assert!(fig.annotation.is_none());
    }

    #[test]
    fn test_pixel_size_at_240_dpi() {
        assert_eq!(RenderOptions::default().pixel_size(), (3360, 1440));
    }

    #[test]
    fn test_empty_panel_set() {
        let fig = compose(&[], &RenderOptions::default());
        assert!(fig.bands.is_empty());
        assert!(fig.x_range.is_none());
        assert!(fig.annotation.is_none());
    }
}
