//! SVG figures: confusion-matrix heatmaps and the trajectory scatter

use crate::structs::{ConfusionMatrix, Embedding, ModelOutcome, Result, TyperError};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

const PANEL_WIDTH: u32 = 440;
const PANEL_HEIGHT: u32 = 480;
const SCATTER_SIZE: (u32, u32) = (900, 700);

/// Category palette, cycled when there are more categories than colors
const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

fn render_error(e: &dyn std::fmt::Display) -> TyperError {
    TyperError::Render(e.to_string())
}

/// Light-to-dark blue ramp for `t` in `[0, 1]`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blues(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(lerp(247.0, 8.0), lerp(251.0, 48.0), lerp(255.0, 107.0))
}

fn category_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// One heatmap panel
#[derive(Debug, Clone)]
pub struct ConfusionPanel {
    pub title: String,
    pub matrix: ConfusionMatrix,
}

/// Side-by-side heatmaps, one per evaluated configuration
#[derive(Debug, Clone, Default)]
pub struct ConfusionFigure {
    pub panels: Vec<ConfusionPanel>,
}

impl ConfusionFigure {
    /// One panel per successful outcome, in configuration order
    #[must_use]
    pub fn from_outcomes(outcomes: &[ModelOutcome]) -> Self {
        let panels = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|eval| ConfusionPanel {
                title: format!("{} Confusion Matrix", eval.label),
                matrix: eval.confusion.clone(),
            })
            .collect();
        Self { panels }
    }

    /// Write the figure as SVG
    ///
    /// # Errors
    /// Returns error if there are no panels or drawing fails
    #[allow(clippy::cast_possible_truncation)]
    pub fn render_svg(&self, path: &Path) -> Result<()> {
        if self.panels.is_empty() {
            return Err(TyperError::Render(
                "No confusion matrices to draw".into(),
            ));
        }
        let width = PANEL_WIDTH * self.panels.len() as u32;
        self.draw(path, width).map_err(|e| render_error(&e))
    }

    fn draw(&self, path: &Path, width: u32) -> DrawResult {
        let root = SVGBackend::new(path, (width, PANEL_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let areas = root.split_evenly((1, self.panels.len()));
        for (area, panel) in areas.iter().zip(&self.panels) {
            draw_heatmap(area, panel)?;
        }

        root.present()?;
        Ok(())
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
fn draw_heatmap(area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>, panel: &ConfusionPanel) -> DrawResult {
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    let k = panel.matrix.labels.len().max(1) as i32;

    let left = 70;
    let top = 50;
    let grid = (w - left - 30).min(h - top - 70).max(k);
    let cell = grid / k;
    let grid = cell * k;

    let centered = |size: u32| {
        ("sans-serif", size)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center))
    };

    area.draw(&Text::new(
        panel.title.clone(),
        (w / 2, top / 2),
        centered(16),
    ))?;

    let max = panel.matrix.max_count().max(1) as f64;
    for (i, row) in panel.matrix.counts.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            let x0 = left + j as i32 * cell;
            let y0 = top + i as i32 * cell;
            let t = count as f64 / max;
            area.draw(&Rectangle::new(
                [(x0, y0), (x0 + cell, y0 + cell)],
                blues(t).filled(),
            ))?;
            let ink = if t > 0.5 { WHITE } else { BLACK };
            area.draw(&Text::new(
                count.to_string(),
                (x0 + cell / 2, y0 + cell / 2),
                ("sans-serif", 13)
                    .into_font()
                    .color(&ink)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            ))?;
        }
    }
    area.draw(&Rectangle::new(
        [(left, top), (left + grid, top + grid)],
        BLACK.stroke_width(1),
    ))?;

    for (idx, label) in panel.matrix.labels.iter().enumerate() {
        let offset = idx as i32 * cell + cell / 2;
        area.draw(&Text::new(
            label.clone(),
            (left + offset, top + grid + 14),
            centered(12),
        ))?;
        area.draw(&Text::new(
            label.clone(),
            (left - 14, top + offset),
            centered(12),
        ))?;
    }

    area.draw(&Text::new(
        "Predicted cell type",
        (left + grid / 2, top + grid + 40),
        centered(14),
    ))?;
    area.draw(&Text::new(
        "Actual cell type",
        (24, top + grid / 2),
        ("sans-serif", 14)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;

    Ok(())
}

/// Scatter of a two-dimensional embedding, colored by category
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryFigure<'a> {
    pub title: &'a str,
    pub embedding: &'a Embedding,
}

impl<'a> TrajectoryFigure<'a> {
    #[must_use]
    pub const fn new(embedding: &'a Embedding) -> Self {
        Self {
            title: "Cell trajectory",
            embedding,
        }
    }

    /// Write the figure as SVG
    ///
    /// # Errors
    /// Returns error if the embedding is empty or drawing fails
    pub fn render_svg(&self, path: &Path) -> Result<()> {
        if self.embedding.coords.nrows() == 0 || self.embedding.coords.ncols() < 2 {
            return Err(TyperError::Render("Embedding has no points to draw".into()));
        }
        draw_scatter(self.title, self.embedding, path).map_err(|e| render_error(&e))
    }
}

fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if (hi - lo).abs() < f64::EPSILON || !lo.is_finite() || !hi.is_finite() {
        (lo.min(0.0) - 1.0, hi.max(0.0) + 1.0)
    } else {
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
fn draw_scatter(title: &str, embedding: &Embedding, path: &Path) -> DrawResult {
    let (width, height) = SCATTER_SIZE;
    let root = SVGBackend::new(path, SCATTER_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (w, h) = (width as i32, height as i32);
    let legend_width = 140;
    let (left, right, top, bottom) = (70, w - legend_width - 20, 60, h - 60);

    root.draw(&Text::new(
        title,
        (w / 2, 30),
        ("sans-serif", 22)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;

    let (x_lo, x_hi) = axis_range(embedding.coords.column(0).iter().copied());
    let (y_lo, y_hi) = axis_range(embedding.coords.column(1).iter().copied());
    let to_px = |x: f64, y: f64| {
        let px = left + ((x - x_lo) / (x_hi - x_lo) * f64::from(right - left)) as i32;
        let py = bottom - ((y - y_lo) / (y_hi - y_lo) * f64::from(bottom - top)) as i32;
        (px, py)
    };

    root.draw(&Rectangle::new(
        [(left, top), (right, bottom)],
        BLACK.stroke_width(1),
    ))?;

    for (row, &target) in embedding.coords.rows().into_iter().zip(&embedding.targets) {
        root.draw(&Circle::new(
            to_px(row[0], row[1]),
            4,
            category_color(target).mix(0.8).filled(),
        ))?;
    }

    root.draw(&Text::new(
        "Component 1",
        ((left + right) / 2, bottom + 30),
        ("sans-serif", 14)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;
    root.draw(&Text::new(
        "Component 2",
        (30, (top + bottom) / 2),
        ("sans-serif", 14)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;

    // legend
    let legend_x = right + 20;
    for (idx, code) in embedding.class_codes.iter().enumerate() {
        let y = top + 10 + idx as i32 * 20;
        root.draw(&Circle::new((legend_x + 6, y), 5, category_color(idx).filled()))?;
        root.draw(&Text::new(
            code.clone(),
            (legend_x + 18, y),
            ("sans-serif", 12)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }

    root.present()?;
    Ok(())
}
