//! PNG chart rendering for the weekly dashboard and the per-spot comparison.
//!
//! Charts are plain raster panels (bars and polylines on a light grid); there
//! is no text rendering, titles travel in the notification caption instead.

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;
use tracing::info;

use crate::analyzers::types::AnomalyReport;
use crate::analyzers::weekly::WeeklySummary;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const STEELBLUE: Rgb<u8> = Rgb([70, 130, 180]);
const BASELINE: Rgb<u8> = Rgb([170, 170, 170]);
const ALERT: Rgb<u8> = Rgb([214, 39, 40]);
const FLOOR: Rgb<u8> = Rgb([255, 127, 14]);

/// Series colors, one per compared week.
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
];

#[derive(Debug, Clone, Copy)]
struct Panel {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Panel {
    fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// Pixel row for `value` on a 0..=`max` axis.
    fn y_for(&self, value: f64, max: f64) -> u32 {
        let frac = (value / max).clamp(0.0, 1.0);
        self.bottom() - (frac * f64::from(self.h)).round() as u32
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y.min(y_end)..y_end {
        for px in x.min(x_end)..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for (ox, oy) in [(0, 0), (1, 0), (0, 1)] {
            let (px, py) = (x0 + ox, y0 + oy);
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, color);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn axes(img: &mut RgbImage, panel: Panel) {
    for i in 1..=4 {
        let y = panel.y + panel.h * i / 4;
        fill_rect(img, panel.x, y.saturating_sub(1), panel.w, 1, GRID);
    }
    fill_rect(img, panel.x, panel.y, 2, panel.h, AXIS);
    fill_rect(img, panel.x, panel.bottom(), panel.w, 2, AXIS);
}

fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0, f64::max);
    if max > 0.0 { max * 1.1 } else { 1.0 }
}

/// `groups[g][s]` is series `s` within group `g`; colors are per series.
fn grouped_bars(img: &mut RgbImage, panel: Panel, groups: &[Vec<f64>], colors: &[Rgb<u8>]) {
    axes(img, panel);
    if groups.is_empty() {
        return;
    }
    let max = axis_max(groups.iter().flatten().copied());
    let series = groups.iter().map(Vec::len).max().unwrap_or(1).max(1) as u32;
    let slot = panel.w / groups.len() as u32;
    let bar_w = (slot * 8 / 10 / series).max(1);

    for (g, values) in groups.iter().enumerate() {
        let group_x = panel.x + slot * g as u32 + slot / 10;
        for (s, &value) in values.iter().enumerate() {
            let top = panel.y_for(value, max);
            let color = colors[s % colors.len()];
            fill_rect(
                img,
                group_x + bar_w * s as u32,
                top,
                bar_w.saturating_sub(1).max(1),
                panel.bottom() - top,
                color,
            );
        }
    }
}

fn polylines(img: &mut RgbImage, panel: Panel, series: &[Vec<f64>], colors: &[Rgb<u8>]) {
    axes(img, panel);
    let max = axis_max(series.iter().flatten().copied());
    for (s, values) in series.iter().enumerate() {
        if values.len() < 2 {
            continue;
        }
        let step = f64::from(panel.w) / (values.len() - 1) as f64;
        let points: Vec<(i64, i64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                (
                    i64::from(panel.x) + (step * i as f64).round() as i64,
                    i64::from(panel.y_for(v, max)),
                )
            })
            .collect();
        for pair in points.windows(2) {
            draw_line(img, pair[0], pair[1], colors[s % colors.len()]);
        }
    }
}

fn save(img: &RgbImage, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating chart directory {}", dir.display()))?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing chart {}", path.display()))?;
    info!(path = %path.display(), "Chart written");
    Ok(())
}

/// Three panels: total hours per week, hourly profile per week, and
/// per-spot hours grouped by week.
pub fn render_weekly_dashboard(summary: &WeeklySummary, path: &Path) -> Result<()> {
    let mut img = RgbImage::from_pixel(1800, 1200, BACKGROUND);

    let totals: Vec<Vec<f64>> = summary.weeks.iter().map(|w| vec![w.total_hours()]).collect();
    grouped_bars(
        &mut img,
        Panel { x: 80, y: 60, w: 760, h: 440 },
        &totals,
        &[STEELBLUE],
    );

    let hourly: Vec<Vec<f64>> = summary.weeks.iter().map(|w| w.hourly_hours.to_vec()).collect();
    polylines(
        &mut img,
        Panel { x: 960, y: 60, w: 760, h: 440 },
        &hourly,
        &PALETTE,
    );

    let per_spot: Vec<Vec<f64>> = (0..summary.spots)
        .map(|spot| {
            summary
                .weeks
                .iter()
                .map(|w| w.spot_hours.get(spot).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();
    grouped_bars(
        &mut img,
        Panel { x: 80, y: 620, w: 1640, h: 500 },
        &per_spot,
        &PALETTE,
    );

    save(&img, path)
}

/// Historical average next to the analyzed day for every spot, in spot
/// order. Flagged spots are drawn in red and the floor as a horizontal line.
pub fn render_spot_comparison(report: &AnomalyReport, path: &Path) -> Result<()> {
    let mut img = RgbImage::from_pixel(1600, 700, BACKGROUND);
    let panel = Panel { x: 80, y: 60, w: 1440, h: 560 };

    let mut findings: Vec<_> = report.findings.iter().collect();
    findings.sort_by_key(|f| f.spot);

    let groups: Vec<Vec<f64>> = findings
        .iter()
        .map(|f| vec![f.baseline_mean, f.current_hours])
        .collect();
    grouped_bars(&mut img, panel, &groups, &[BASELINE, STEELBLUE]);

    // Repaint flagged current-day bars.
    let max = axis_max(groups.iter().flatten().copied());
    if !findings.is_empty() {
        let slot = panel.w / findings.len() as u32;
        let bar_w = (slot * 8 / 10 / 2).max(1);
        for (g, f) in findings.iter().enumerate() {
            if !f.classification.is_flagged() {
                continue;
            }
            let top = panel.y_for(f.current_hours, max);
            let x = panel.x + slot * g as u32 + slot / 10 + bar_w;
            fill_rect(&mut img, x, top, bar_w.saturating_sub(1).max(1), panel.bottom() - top, ALERT);
        }
    }

    let floor_y = i64::from(panel.y_for(report.floor_hours, max));
    draw_line(
        &mut img,
        (i64::from(panel.x), floor_y),
        (i64::from(panel.x + panel.w), floor_y),
        FLOOR,
    );

    save(&img, path)
}
