//! Charts module - Chart and report rendering

mod plotter;
mod renderer;

pub use plotter::ChartPlotter;
pub use renderer::{Artifacts, RenderError, Report, ReportRenderer};
