//! SVG charts via `plotters`.
//!
//! One file per chart, named after a slug of the title
//! (`"Inflation, all countries"` -> `inflation-all-countries.svg`).

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::domain::TimeSeries;
use crate::error::AppError;
use crate::plot::{Marker, PlotOptions, PlotRenderer, Projected, bounds, pad_range, project, unproject_y};

#[derive(Debug, Clone)]
pub struct SvgRenderer {
    pub out_dir: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl SvgRenderer {
    pub fn new(out_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            out_dir: out_dir.into(),
            width,
            height,
        }
    }

    /// Output path for a chart title.
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.out_dir.join(format!("{}.svg", slug(title)))
    }
}

impl PlotRenderer for SvgRenderer {
    fn render(&self, series: &[TimeSeries], options: &PlotOptions) -> Result<(), AppError> {
        fs::create_dir_all(&self.out_dir).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create plot directory '{}': {e}", self.out_dir.display()),
            )
        })?;

        let path = self.path_for(&options.title);
        let projected = project(series, options.log_scale);
        if bounds(&projected).is_none() {
            log::warn!("Nothing to plot for '{}'; skipped.", options.title);
            return Ok(());
        }

        draw_chart(&path, (self.width, self.height), &projected, options)
            .map_err(|e| AppError::new(4, format!("Failed to render '{}': {e}", path.display())))?;
        log::info!("Wrote plot '{}'.", path.display());
        Ok(())
    }
}

fn draw_chart(
    path: &Path,
    size: (u32, u32),
    series: &[Projected],
    options: &PlotOptions,
) -> Result<(), Box<dyn Error>> {
    let Some(((x0, x1), (y0, y1))) = bounds(series) else {
        return Ok(());
    };
    let (x0, x1) = pad_range(x0, x1, 0.01);
    let (y0, y1) = pad_range(y0, y1, 0.05);
    let log_scale = options.log_scale;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .y_labels(8)
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format_tick(unproject_y(*v, log_scale)))
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    for (i, s) in series.iter().enumerate() {
        let rgba = Palette99::pick(i).to_rgba();
        let color = RGBColor(rgba.0, rgba.1, rgba.2);

        chart
            .draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(2)))?
            .label(s.name.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        if options.marker == Marker::Dot {
            chart.draw_series(s.points.iter().map(|&(x, y)| Circle::new((x, y), 2, color.filled())))?;
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn format_tick(v: f64) -> String {
    if v.abs() >= 100.0 {
        format!("{v:.0}")
    } else if v.abs() >= 1.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.2}")
    }
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() { "plot".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn slugs_are_file_friendly() {
        assert_eq!(slug("Inflation, all countries"), "inflation-all-countries");
        assert_eq!(slug("  Brazil: unemployment (%) "), "brazil-unemployment");
        assert_eq!(slug("!!!"), "plot");
    }

    #[test]
    fn writes_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgRenderer::new(dir.path().join("plots"), 400, 300);
        let s = TimeSeries::new(
            "Brazil_unemp",
            (1..=12).map(|m| (NaiveDate::from_ymd_opt(2000, m, 1).unwrap(), Some(f64::from(m)))),
        )
        .unwrap();
        let options = PlotOptions::new("Brazil unemployment", "year", "rate").with_marker(Marker::Dot);
        renderer.render(&[s], &options).unwrap();

        let text = std::fs::read_to_string(renderer.path_for("Brazil unemployment")).unwrap();
        assert!(text.contains("<svg"));
    }
}
