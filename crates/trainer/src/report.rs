//! Reports
//!
//! Charts of the ranked features of selected segments and a JSON summary of
//! each run. Report failures are logged and never affect computed results.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{info, warn};

use crate::importance::RankedFeature;
use crate::pipeline::{RunReport, SegmentResult};
use crate::settings::{ReportConfig, ReportPolicy};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("no features to plot")]
    NothingToPlot,
}

/// Family every chart text style resolves to
const FONT_FAMILY: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Registers the embedded font with plotters once per process
fn ensure_font() -> Result<(), ReportError> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED.get_or_init(|| {
        plotters::style::register_font(FONT_FAMILY, plotters::style::FontStyle::Normal, FONT_BYTES)
            .is_ok()
    });
    if ok {
        Ok(())
    } else {
        Err(ReportError::Render("embedded font could not be loaded".into()))
    }
}

/// Renders one segment's ranked features to a file
pub trait ReportEmitter {
    /// File extension of the artifacts, without the dot
    fn extension(&self) -> &'static str;

    fn emit(&self, title: &str, features: &[RankedFeature], path: &Path) -> Result<(), ReportError>;
}

/// Horizontal bar chart saved as PNG, largest importance at the top
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngBarChart {
    pub width: u32,
    pub height: u32,
}

impl Default for PngBarChart {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
        }
    }
}

impl From<&ReportConfig> for PngBarChart {
    fn from(config: &ReportConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }
}

impl ReportEmitter for PngBarChart {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn emit(&self, title: &str, features: &[RankedFeature], path: &Path) -> Result<(), ReportError> {
        if features.is_empty() {
            return Err(ReportError::NothingToPlot);
        }
        ensure_font()?;

        let rendered = catch_unwind(AssertUnwindSafe(|| self.render(title, features)))
            .map_err(|_| ReportError::Render("renderer panicked".into()))?;
        let buf = rendered.map_err(|e| ReportError::Render(e.to_string()))?;

        image::save_buffer(path, &buf, self.width, self.height, image::ColorType::Rgb8)?;
        Ok(())
    }
}

impl PngBarChart {
    fn render(
        &self,
        title: &str,
        features: &[RankedFeature],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        use plotters::prelude::*;

        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        {
            let root =
                BitMapBackend::with_buffer(&mut buf, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            // bottom-up: smallest importance first
            let bars: Vec<&RankedFeature> = features.iter().rev().collect();
            let x_max = bars
                .iter()
                .map(|f| f.importance)
                .fold(0.0, f64::max)
                .max(f64::EPSILON)
                * 1.05;

            let mut chart = ChartBuilder::on(&root)
                .caption(title, (FONT_FAMILY, 28))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(240)
                .build_cartesian_2d(0f64..x_max, (0u32..bars.len() as u32).into_segmented())?;

            let label = |value: &SegmentValue<u32>| match value {
                SegmentValue::CenterOf(i) => bars
                    .get(*i as usize)
                    .map_or_else(String::new, |f| f.name.clone()),
                _ => String::new(),
            };
            chart
                .configure_mesh()
                .disable_y_mesh()
                .y_labels(bars.len())
                .y_label_formatter(&label)
                .label_style((FONT_FAMILY, 16))
                .x_desc("Importance")
                .draw()?;

            chart.draw_series(bars.iter().enumerate().map(|(i, f)| {
                let i = i as u32;
                Rectangle::new(
                    [
                        (0.0, SegmentValue::Exact(i)),
                        (f.importance, SegmentValue::Exact(i + 1)),
                    ],
                    RGBColor(70, 130, 180).filled(),
                )
            }))?;
            root.present()?;
        }
        Ok(buf)
    }
}

/// `<dir>/<prefix>_<value>_top_features.<ext>` with path separators in the
/// value replaced by `_`
pub fn chart_path(results_dir: &Path, file_prefix: &str, value: &str, extension: &str) -> PathBuf {
    let value: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    results_dir.join(format!("{file_prefix}_{value}_top_features.{extension}"))
}

pub fn chart_title(report: &RunReport, result: &SegmentResult, top_k: usize) -> String {
    format!(
        "Top-{} Feature Importances ({}: {})",
        top_k, report.spec.display, result.key
    )
}

/// Emit charts for the segments `policy` selects, returning the written paths
///
/// Individual failures are logged and skipped.
pub fn emit_charts(
    report: &RunReport,
    emitter: &dyn ReportEmitter,
    policy: ReportPolicy,
    results_dir: &Path,
    top_k: usize,
) -> Vec<PathBuf> {
    let selected: Vec<&SegmentResult> = match policy {
        ReportPolicy::None => Vec::new(),
        ReportPolicy::First => report.results.first().into_iter().collect(),
        ReportPolicy::All => report.results.iter().collect(),
    };
    if selected.is_empty() {
        return Vec::new();
    }

    if let Err(e) = std::fs::create_dir_all(results_dir) {
        warn!("Cannot create {}: {}", results_dir.display(), e);
        return Vec::new();
    }

    let mut written = Vec::with_capacity(selected.len());
    for result in selected {
        let path = chart_path(
            results_dir,
            &report.spec.file_prefix,
            &result.key,
            emitter.extension(),
        );
        match emitter.emit(&chart_title(report, result, top_k), &result.top_features, &path) {
            Ok(()) => {
                info!("Chart saved to {}", path.display());
                written.push(path);
            }
            Err(e) => warn!("Chart for {} {} not written: {}", report.spec.display, result.key, e),
        }
    }
    written
}

/// Write every result and skipped segment to `<dir>/<prefix>_results.json`
pub fn write_summary(report: &RunReport, results_dir: &Path) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(results_dir)?;
    let path = results_dir.join(format!("{}_results.json", report.spec.file_prefix));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
