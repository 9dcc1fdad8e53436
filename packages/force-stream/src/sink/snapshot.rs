// Snapshot export sink
//
// Renders the whole captured range as a standalone SVG line chart,
// `force_graph_<stamp>.svg`, next to the CSV export of the same run.
// Axes span `[0, last timestamp]` by `[min - 1, max + 1]`.

use super::display::decimate;
use super::{RunStamp, SampleSink, SinkError, SinkKind, SinkResult};
use crate::types::Sample;
use std::fmt::Write;
use std::path::{Path, PathBuf};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 500.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;
const TICKS: usize = 5;
const MAX_PLOT_POINTS: usize = 5000;

pub struct SnapshotSink {
    name: String,
    path: PathBuf,
    title: String,
    flushed: bool,
    written: Option<PathBuf>,
}

impl SnapshotSink {
    pub fn new(output_dir: &Path, stamp: &RunStamp) -> Self {
        Self {
            name: "snapshot-export".to_string(),
            path: output_dir.join(stamp.file_name("force_graph", "svg")),
            title: "FSR406 Force Data".to_string(),
            flushed: false,
            written: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSink for SnapshotSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Durable
    }

    fn write(&mut self, _sample: &Sample) -> SinkResult<()> {
        Ok(())
    }

    fn flush(&mut self, samples: &[Sample]) -> SinkResult<()> {
        if self.flushed {
            return Err(SinkError::AlreadyFlushed(self.name.clone()));
        }
        self.flushed = true;

        if samples.is_empty() {
            log::info!("No data recorded. Skipping graph snapshot.");
            return Ok(());
        }

        let svg = render_svg(samples, &self.title)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, svg)?;

        log::info!("Graph saved: {}", self.path.display());
        self.written = Some(self.path.clone());
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        self.written.iter().cloned().collect()
    }
}

/// Render `samples` as an SVG document.
pub fn render_svg(samples: &[Sample], title: &str) -> Result<String, std::fmt::Error> {
    let (x_min, x_max) = (0.0, samples.last().map_or(1.0, |s| s.elapsed_seconds));
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };

    let (lo, hi) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.value), hi.max(s.value))
        });
    let (y_min, y_max) = (lo - 1.0, hi + 1.0);

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let px = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_w;
    let py = |y: f64| MARGIN_TOP + (y_max - y) / (y_max - y_min) * plot_h;

    let mut svg = String::with_capacity(64 * 1024);
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = WIDTH,
        h = HEIGHT
    )?;
    writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
    writeln!(
        svg,
        r##"<text x="{}" y="24" font-family="sans-serif" font-size="18" text-anchor="middle">{}</text>"##,
        WIDTH / 2.0,
        escape(title)
    )?;

    // grid and tick labels
    for i in 0..=TICKS {
        let fx = x_min + (x_max - x_min) * i as f64 / TICKS as f64;
        let fy = y_min + (y_max - y_min) * i as f64 / TICKS as f64;
        writeln!(
            svg,
            r##"<line x1="{x:.1}" y1="{top}" x2="{x:.1}" y2="{bottom}" stroke="#e5e5e5"/>"##,
            x = px(fx),
            top = MARGIN_TOP,
            bottom = MARGIN_TOP + plot_h
        )?;
        writeln!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="12" text-anchor="middle">{:.1}</text>"##,
            px(fx),
            MARGIN_TOP + plot_h + 18.0,
            fx
        )?;
        writeln!(
            svg,
            r##"<line x1="{left}" y1="{y:.1}" x2="{right}" y2="{y:.1}" stroke="#e5e5e5"/>"##,
            y = py(fy),
            left = MARGIN_LEFT,
            right = MARGIN_LEFT + plot_w
        )?;
        writeln!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="12" text-anchor="end">{:.2}</text>"##,
            MARGIN_LEFT - 8.0,
            py(fy) + 4.0,
            fy
        )?;
    }

    writeln!(
        svg,
        r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#333333"/>"##,
        MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h
    )?;
    writeln!(
        svg,
        r##"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="14" text-anchor="middle">Time (s)</text>"##,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 12.0
    )?;
    writeln!(
        svg,
        r##"<text x="18" y="{y:.1}" font-family="sans-serif" font-size="14" text-anchor="middle" transform="rotate(-90 18 {y:.1})">Force (N)</text>"##,
        y = MARGIN_TOP + plot_h / 2.0
    )?;

    svg.push_str(r##"<polyline fill="none" stroke="#1f77b4" stroke-width="2" points=""##);
    for (i, sample) in decimate(samples, MAX_PLOT_POINTS).iter().enumerate() {
        if i > 0 {
            svg.push(' ');
        }
        write!(svg, "{:.2},{:.2}", px(sample.elapsed_seconds), py(sample.value))?;
    }
    svg.push_str("\"/>\n");
    svg.push_str("</svg>\n");

    Ok(svg)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
