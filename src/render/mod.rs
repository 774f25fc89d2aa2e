//! Regime-horizon chart: layout first, then a bitmap via plotters.

use chrono::{Datelike, NaiveDate};
use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

use crate::error::{RegimeError, Result};
use crate::logging::{log, log_render, obj, v_str, Domain, Level};
use crate::panel::HorizonPanel;

pub mod layout;
pub mod style;

pub use layout::{compose, RegimeFigure, RenderOptions, TransitionStyle};

fn render_err<E: std::fmt::Display>(err: E) -> RegimeError {
    RegimeError::Render(err.to_string())
}

/// Dates are plotted as days since the common era so the axes stay `f64`.
fn x_of(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn date_of(x: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}

fn rgb(c: (u8, u8, u8)) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

/// Vertical axis whose only key points are the band baselines.
struct BandAxis {
    span: RangedCoordf64,
    baselines: Vec<f64>,
}

impl BandAxis {
    fn new(range: Range<f64>, baselines: Vec<f64>) -> Self {
        Self { span: range.into(), baselines }
    }
}

impl Ranged for BandAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.span.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.baselines.clone()
    }

    fn range(&self) -> Range<f64> {
        self.span.range()
    }
}

/// Build the figure for `panels` and, when `out_path` is given, write it as
/// a PNG (parent directories are created, existing files overwritten).
pub fn plot_regime_horizon_map(
    panels: &[HorizonPanel],
    out_path: Option<&Path>,
    opts: &RenderOptions,
) -> Result<RegimeFigure> {
    let mut figure = compose(panels, opts);

    if let Some(path) = out_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        draw(&figure, path, opts)?;
        figure.saved_to = Some(path.to_path_buf());
    }

    log_render(
        figure.bands.len(),
        figure.segment_count(),
        figure.marker_count(),
        figure.saved_to.as_deref().and_then(|p| p.to_str()),
    );
    Ok(figure)
}

fn draw(figure: &RegimeFigure, path: &Path, opts: &RenderOptions) -> Result<()> {
    let (width, height) = opts.pixel_size();
    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let root = root
        .titled(&figure.title, ("sans-serif", opts.px(14.0)).into_font())
        .map_err(render_err)?;

    let (x0, x1) = match figure.x_range {
        Some((a, b)) if a < b => (x_of(a), x_of(b)),
        Some((a, _)) => (x_of(a) - 1.0, x_of(a) + 1.0),
        None => (0.0, 1.0),
    };
    let (y0, y1) = figure.y_range;
    let ticks: Vec<f64> = figure.bands.iter().map(|b| b.baseline).collect();
    let tick_labels: Vec<(f64, String)> = figure
        .bands
        .iter()
        .map(|b| (b.baseline, b.axis_label.clone()))
        .collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(&figure.subtitle, ("sans-serif", opts.px(10.0)).into_font())
        .margin(opts.px(8.0) as u32)
        .x_label_area_size(opts.px(28.0) as u32)
        .y_label_area_size(opts.px(90.0) as u32)
        .build_cartesian_2d(x0..x1, BandAxis::new(y0..y1, ticks))
        .map_err(render_err)?;

    let y_fmt = |y: &f64| {
        tick_labels
            .iter()
            .find(|(b, _)| (b - y).abs() < 1e-9)
            .map(|(_, l)| l.clone())
            .unwrap_or_default()
    };
    let x_fmt = |x: &f64| date_of(*x).map(|d| d.format("%Y-%m").to_string()).unwrap_or_default();

    chart
        .configure_mesh()
        .disable_y_mesh()
        .max_light_lines(0)
        .bold_line_style(BLACK.mix(0.18))
        .x_labels(10)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .x_desc("Date")
        .y_desc("Horizon (Rolling Window)")
        .label_style(("sans-serif", opts.px(9.0)).into_font())
        .axis_desc_style(("sans-serif", opts.px(10.0)).into_font())
        .draw()
        .map_err(render_err)?;

    for band in &figure.bands {
        chart
            .draw_series(band.segments.iter().map(|s| {
                let (a, b) = (x_of(s.start), x_of(s.end));
                Polygon::new(
                    vec![(a, s.baseline), (b, s.baseline), (b, s.top), (a, s.top)],
                    rgb(s.rgb).mix(s.alpha).filled(),
                )
            }))
            .map_err(render_err)?;

        let stroke = stroke_px(opts);
        chart
            .draw_series(band.markers.iter().map(|m| {
                let x = x_of(m.date);
                match figure.transition_style {
                    TransitionStyle::Lines => {
                        PathElement::new(vec![(x, y0), (x, y1)], BLACK.mix(0.15).stroke_width(stroke))
                    }
                    TransitionStyle::Ticks => PathElement::new(
                        vec![(x, band.baseline - layout::TICK_HALF), (x, band.baseline + layout::TICK_HALF)],
                        BLACK.mix(0.35).stroke_width(stroke),
                    ),
                }
            }))
            .map_err(render_err)?;
    }

    if !figure.legend.is_empty() {
        for entry in &figure.legend {
            let color = rgb(entry.rgb);
            let half = opts.px(3.0) as i32;
            let len = opts.px(18.0) as i32;
            chart
                .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())
                .map_err(render_err)?
                .label(entry.label)
                .legend(move |(x, y)| Rectangle::new([(x, y - half), (x + len, y + half)], color.mix(0.6).filled()));
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.0))
            .border_style(WHITE.mix(0.0))
            .label_font(("sans-serif", opts.px(9.0)).into_font())
            .draw()
            .map_err(render_err)?;
    }

    // Decorative only: a failure here must not cost the chart
    if let Some(note) = &figure.annotation {
        let x = x_of(note.date);
        let dx = (x1 - x0) * 0.004;
        let dy = (y1 - y0) * 0.02;
        let arrow = BLACK.mix(0.55).stroke_width(stroke_px(opts));
        let drawn = chart
            .draw_series([
                PathElement::new(vec![(x, note.text_y), (x, note.point_y)], arrow),
                PathElement::new(vec![(x - dx, note.point_y + dy), (x, note.point_y)], arrow),
                PathElement::new(vec![(x + dx, note.point_y + dy), (x, note.point_y)], arrow),
            ])
            .map(|_| ());
        let drawn = drawn.and_then(|_| {
            chart
                .draw_series(std::iter::once(Text::new(
                    note.text.to_string(),
                    (x + dx, note.text_y),
                    ("sans-serif", opts.px(9.0)).into_font().color(&BLACK.mix(0.85)),
                )))
                .map(|_| ())
        });
        if let Err(err) = drawn {
            log(
                Level::Debug,
                Domain::Render,
                "annotation_skipped",
                obj(&[("reason", v_str(&err.to_string()))]),
            );
        }
    }

    root.present().map_err(render_err)?;
    Ok(())
}

fn stroke_px(opts: &RenderOptions) -> u32 {
    opts.px(0.7).max(1.0) as u32
}
