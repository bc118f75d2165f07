//! Rolling statistics report
//!
//! Four summary lines for a text stream and a three-panel SVG (rolling
//! Sharpe, drawdowns, portfolio value) drawn by hand, no plotting backend.

use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::common::{first_valid, last_valid, nanmean, nanmin};
use crate::error::Result;
use crate::performance::{get_rolling_stats, PortfolioValueSeries, RollingStatsResult, SummaryStats};

const PANEL_WIDTH: i32 = 576;
const PANEL_HEIGHT: i32 = 288;
const PADDING: f64 = 36.0;
const LINE_COLOR: &str = "#348dc1";
const DRAWDOWN_COLOR: &str = "#e24a33";

#[derive(Debug, Clone, Serialize)]
pub struct RenderedStats {
    pub result: RollingStatsResult,
    pub summary: SummaryStats,
    pub svg: String,
}

/// Compute the rolling statistics, write the summary lines to `out` and
/// draw the chart.
pub fn render_rolling_stats<W: Write>(
    series: &PortfolioValueSeries,
    window: usize,
    out: &mut W,
) -> Result<RenderedStats> {
    let (result, summary) = get_rolling_stats(series, window)?;

    write_summary(&result, out)?;
    let svg = render_svg(&result);

    Ok(RenderedStats { result, summary, svg })
}

/// Starting value, final value, average rolling Sharpe, max drawdown
pub fn write_summary<W: Write>(result: &RollingStatsResult, out: &mut W) -> Result<()> {
    writeln!(out, "Starting portfolio value: {:.2}", first_valid(&result.portfolio_value).unwrap_or(f64::NAN))?;
    writeln!(out, "Final portfolio value: {:.2}", last_valid(&result.portfolio_value).unwrap_or(f64::NAN))?;
    writeln!(out, "Average rolling Sharpe: {:.4}", nanmean(&result.rolling_sharpe))?;
    writeln!(out, "Max drawdown: {:.2}%", nanmin(&result.drawdown) * 100.0)?;
    Ok(())
}

/// Three panels side by side in one SVG document
pub fn render_svg(result: &RollingStatsResult) -> String {
    let width = PANEL_WIDTH * 3;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#666}}</style>"#,
        w = width,
        h = PANEL_HEIGHT
    );

    let panels: [(&str, &[f64], &str, bool); 3] = [
        ("Rolling sharpe", &result.rolling_sharpe, LINE_COLOR, true),
        ("Drawdown", &result.drawdown, DRAWDOWN_COLOR, false),
        ("Portfolio value", &result.portfolio_value, LINE_COLOR, false),
    ];
    for (i, (title, values, color, zero_guide)) in panels.into_iter().enumerate() {
        svg.push_str(&format!(
            r#"<g transform="translate({x},0)">"#,
            x = i as i32 * PANEL_WIDTH
        ));
        draw_panel(&mut svg, title, &result.dates, values, color, zero_guide);
        svg.push_str("</g>");
    }

    svg.push_str("</svg>");
    svg
}

fn draw_panel(svg: &mut String, title: &str, dates: &[NaiveDate], values: &[f64], color: &str, zero_guide: bool) {
    let width = PANEL_WIDTH as f64;
    let height = PANEL_HEIGHT as f64;

    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" style="font-size:12px;fill:#333">{title}</text>"#,
        x = width / 2.0,
        y = PADDING / 2.0,
        title = title
    ));

    let Some((min, max)) = extent(values, zero_guide) else {
        return;
    };
    let xs = x_positions(values.len(), width);

    if zero_guide {
        let y = scale_value(0.0, min, max, height);
        svg.push_str(&format!(
            r#"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="red" stroke-width="1" stroke-dasharray="4 3" />"#,
            x1 = PADDING,
            x2 = width - PADDING,
            y = y
        ));
    }

    // NaN and infinite points break the line into segments
    let mut segment: Vec<(f64, f64)> = Vec::new();
    for (x, v) in xs.iter().zip(values) {
        if v.is_finite() {
            segment.push((*x, scale_value(*v, min, max, height)));
        } else {
            svg.push_str(&polyline(&segment, color));
            segment.clear();
        }
    }
    svg.push_str(&polyline(&segment, color));

    add_axis_labels(svg, dates, &xs, min, max, width, height);
}

/// Finite min and max, widened to include zero when a zero guide is drawn
fn extent(values: &[f64], include_zero: bool) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.iter().filter(|v| v.is_finite()) {
        min = min.min(*v);
        max = max.max(*v);
    }
    if !min.is_finite() {
        return None;
    }
    if include_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    if min == max {
        min -= 1.0;
        max += 1.0;
    }
    Some((min, max))
}

fn scale_value(value: f64, min: f64, max: f64, height: f64) -> f64 {
    let norm = (value - min) / (max - min);
    PADDING + (1.0 - norm) * (height - 2.0 * PADDING)
}

fn x_positions(len: usize, width: f64) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![width / 2.0],
        _ => {
            let inner = width - 2.0 * PADDING;
            (0..len)
                .map(|i| PADDING + inner * i as f64 / (len - 1) as f64)
                .collect()
        }
    }
}

fn polyline(points: &[(f64, f64)], stroke: &str) -> String {
    if points.len() < 2 {
        return String::new();
    }
    let coords = points
        .iter()
        .map(|(x, y)| format!("{:.2},{:.2}", x, y))
        .collect::<Vec<_>>()
        .join(" ");
    format!(r#"<polyline fill="none" stroke="{stroke}" stroke-width="1.5" points="{coords}" />"#)
}

fn add_axis_labels(svg: &mut String, dates: &[NaiveDate], xs: &[f64], min: f64, max: f64, width: f64, height: f64) {
    let baseline = height - PADDING;
    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#bbbbbb" stroke-width="1" />"##,
        x1 = PADDING,
        x2 = width - PADDING,
        y = baseline
    ));

    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        let y = baseline + 14.0;
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="start">{label}</text>"#,
            x = xs.first().copied().unwrap_or(PADDING),
            label = first.format("%Y-%m-%d")
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{label}</text>"#,
            x = xs.last().copied().unwrap_or(width - PADDING),
            label = last.format("%Y-%m-%d")
        ));
    }

    for value in [min, max] {
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{value:.3}</text>"#,
            x = PADDING - 4.0,
            y = scale_value(value, min, max, height) + 3.0
        ));
    }
}
