//! Chart Plotter Module
//! Draws aggregate bar charts as SVG using plotters.

use crate::charts::RenderError;
use crate::stats::Aggregate;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

/// Size of every chart, in pixels.
pub const CHART_SIZE: (u32, u32) = (960, 540);

/// Category labels longer than this are shortened on the axis.
const MAX_LABEL_CHARS: usize = 28;

/// Color palette for categories
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

fn chart_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Chart(e.to_string())
}

/// Creates static bar charts for aggregates.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Get color for a category by its position in the aggregate.
    pub fn color_for(index: usize) -> RGBColor {
        PALETTE[index % PALETTE.len()]
    }

    pub fn title(aggregate: &Aggregate) -> String {
        format!("{} (n = {})", aggregate.field.label(), aggregate.total)
    }

    fn short_label(label: &str) -> String {
        if label.chars().count() <= MAX_LABEL_CHARS {
            label.to_string()
        } else {
            let cut: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
            format!("{}…", cut)
        }
    }

    /// Render an aggregate as an SVG document.
    ///
    /// An empty aggregate renders the "no data" chart instead of failing.
    pub fn render_svg(aggregate: &Aggregate) -> Result<String, RenderError> {
        if aggregate.is_empty() {
            return Self::render_no_data(aggregate);
        }

        let labels: Vec<String> = aggregate
            .categories
            .iter()
            .map(|c| Self::short_label(&c.category))
            .collect();
        let n = labels.len();
        let max_count = aggregate
            .categories
            .iter()
            .map(|c| c.count)
            .max()
            .unwrap_or(0) as u32;
        let y_max = max_count + (max_count / 10).max(1);

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE).map_err(chart_err)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(Self::title(aggregate), ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(170)
                .y_label_area_size(60)
                .build_cartesian_2d((0..n).into_segmented(), 0u32..y_max)
                .map_err(chart_err)?;

            let x_formatter = |v: &SegmentValue<usize>| match v {
                SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
                _ => String::new(),
            };

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(n)
                .x_label_formatter(&x_formatter)
                .x_label_style(
                    ("sans-serif", 13)
                        .into_font()
                        .transform(FontTransform::Rotate90),
                )
                .y_desc("Incidents")
                .axis_desc_style(("sans-serif", 15))
                .draw()
                .map_err(chart_err)?;

            chart
                .draw_series(aggregate.categories.iter().enumerate().map(|(i, c)| {
                    let mut bar = Rectangle::new(
                        [
                            (SegmentValue::Exact(i), 0u32),
                            (SegmentValue::Exact(i + 1), c.count as u32),
                        ],
                        Self::color_for(i).filled(),
                    );
                    bar.set_margin(0, 0, 6, 6);
                    bar
                }))
                .map_err(chart_err)?;

            root.present().map_err(chart_err)?;
        }
        Ok(svg)
    }

    /// Fallback chart for an aggregate with no categories.
    pub fn render_no_data(aggregate: &Aggregate) -> Result<String, RenderError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE).map_err(chart_err)?;
            let body = root
                .titled(&Self::title(aggregate), ("sans-serif", 24))
                .map_err(chart_err)?;

            let (w, h) = body.dim_in_pixel();
            let style = TextStyle::from(("sans-serif", 32).into_font())
                .color(&RGBColor(107, 114, 128))
                .pos(Pos::new(HPos::Center, VPos::Center));
            body.draw_text("No data", &style, (w as i32 / 2, h as i32 / 2))
                .map_err(chart_err)?;

            root.present().map_err(chart_err)?;
        }
        Ok(svg)
    }
}
