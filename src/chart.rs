use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use once_cell::sync::OnceCell;
use plotters::element::BitMapElement;
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};
use tracing::{debug, warn};

use crate::config::PipelineConfig;

const FONT_FAMILY: &str = "sans-serif";
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

// Legend layout, as fractions of the legend column height.
const LEGEND_Y_START: f64 = 0.95;
const LEGEND_Y_STEP: f64 = 0.12;
const LEGEND_LOGO_PX: u32 = 40;

const LINE_CHART_SIZE: (u32, u32) = (1200, 800);
const LINE_PLOT_WIDTH: u32 = 900;

static FONT_READY: OnceCell<bool> = OnceCell::new();

pub const TAB10: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

pub const TAB20: [RGBColor; 20] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xae, 0xc7, 0xe8),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0xff, 0xbb, 0x78),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0x98, 0xdf, 0x8a),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0xff, 0x98, 0x96),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0xc5, 0xb0, 0xd5),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xc4, 0x9c, 0x94),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0xf7, 0xb6, 0xd2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xc7, 0xc7, 0xc7),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0xdb, 0xdb, 0x8d),
    RGBColor(0x17, 0xbe, 0xcf),
    RGBColor(0x9e, 0xda, 0xe5),
];

/// One-time process setup for chart rendering: registers a font for text.
///
/// Returns whether text can be drawn. Without a usable font every chart is
/// still rendered, just without titles, tick labels or legend text.
pub fn init_rendering(font_path: Option<&Path>) -> bool {
    *FONT_READY.get_or_init(|| {
        let candidates = font_path
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));
        for candidate in candidates {
            let Ok(bytes) = fs::read(&candidate) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                debug!(font = %candidate.display(), "chart font registered");
                return true;
            }
        }
        warn!("no usable font found, charts are rendered without text");
        false
    })
}

pub fn text_available() -> bool {
    FONT_READY.get().copied().unwrap_or(false)
}

pub fn palette_color(palette: &[RGBColor], index: usize) -> RGBColor {
    palette[index % palette.len()]
}

/// Tick label for a valuation axis, e.g. `12B` for 12e9 with a 1e9 step.
pub fn format_axis_value(value: f64, step: f64) -> String {
    let unit = if step >= 1_000_000_000.0 {
        "B"
    } else if step >= 1_000_000.0 {
        "M"
    } else {
        "K"
    };
    format!("{:.0}{unit}", value / step)
}

/// Per-league logo lookup with a shared default image.
#[derive(Debug, Clone)]
pub struct LogoResolver {
    logos_dir: PathBuf,
    default_logo: PathBuf,
}

impl LogoResolver {
    pub fn new(logos_dir: impl Into<PathBuf>, default_logo: impl Into<PathBuf>) -> Self {
        Self {
            logos_dir: logos_dir.into(),
            default_logo: default_logo.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.league_logos_dir(), config.default_league_logo_path())
    }

    /// The first of the league's own logo and the default one that decodes,
    /// with the path it came from. Unreadable files are skipped.
    pub fn resolve(&self, id: &str) -> Option<(PathBuf, DynamicImage)> {
        let own = self.logos_dir.join(format!("{id}.png"));
        for path in [own, self.default_logo.clone()] {
            if !path.is_file() {
                continue;
            }
            match image::open(&path) {
                Ok(img) => return Some((path, img)),
                Err(err) => warn!(path = %path.display(), error = %err, "unreadable logo"),
            }
        }
        None
    }

    fn legend_logo(&self, id: &str) -> Option<DynamicImage> {
        self.resolve(id).map(|(_, img)| flatten_on_white(&img))
    }
}

/// Transparent logos would otherwise turn black when blitted as RGB.
fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    let thumb = img
        .resize(LEGEND_LOGO_PX, LEGEND_LOGO_PX, FilterType::Triangle)
        .to_rgba8();
    let mut out = RgbImage::new(thumb.width(), thumb.height());
    for (x, y, px) in thumb.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSeriesData {
    /// Key used for the legend logo.
    pub id: String,
    pub label: String,
    /// `(year, value)` in ascending year order.
    pub points: Vec<(i32, f64)>,
}

impl LineSeriesData {
    pub fn max_value(&self) -> f64 {
        self.points
            .iter()
            .map(|(_, v)| *v)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone)]
pub struct LineChart<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub step: f64,
}

/// Series sorted by their maximum, largest first, the legend order.
pub fn legend_order(series: &[LineSeriesData]) -> Vec<&LineSeriesData> {
    let mut sorted: Vec<&LineSeriesData> = series.iter().collect();
    sorted.sort_by(|a, b| {
        b.max_value()
            .total_cmp(&a.max_value())
            .then_with(|| a.label.cmp(&b.label))
    });
    sorted
}

pub fn render_line_chart(
    output: &Path,
    chart: &LineChart<'_>,
    series: &[LineSeriesData],
    logos: &LogoResolver,
) -> Result<()> {
    let with_text = text_available();
    let ordered = legend_order(series);

    let (min_year, max_year) = year_bounds(series).ok_or_else(|| anyhow!("line chart has no points"))?;
    let x_range = if min_year < max_year {
        min_year..max_year
    } else {
        (min_year - 1)..(max_year + 1)
    };
    let y_max = series
        .iter()
        .map(LineSeriesData::max_value)
        .fold(0.0_f64, f64::max);
    let y_range = 0.0..if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

    let root = BitMapBackend::new(output, LINE_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;
    let (plot_area, legend_area) = root.split_horizontally(LINE_PLOT_WIDTH);

    let mut builder = ChartBuilder::on(&plot_area);
    builder.margin(20);
    if with_text {
        builder
            .caption(chart.title, (FONT_FAMILY, 24))
            .x_label_area_size(40)
            .y_label_area_size(70);
    }
    let mut ctx = builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(draw_error)?;

    if with_text {
        let step = chart.step;
        let y_fmt = move |v: &f64| format_axis_value(*v, step);
        ctx.configure_mesh()
            .x_desc(chart.x_desc)
            .y_desc(chart.y_desc)
            .x_label_formatter(&|year: &i32| year.to_string())
            .y_label_formatter(&y_fmt)
            .draw()
            .map_err(draw_error)?;
    }

    for (idx, data) in ordered.iter().enumerate() {
        let color = palette_color(&TAB10, idx);
        ctx.draw_series(LineSeries::new(
            data.points.iter().copied(),
            color.stroke_width(2),
        ))
        .map_err(draw_error)?;
        ctx.draw_series(
            data.points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
        )
        .map_err(draw_error)?;
    }

    let (_, legend_height) = legend_area.dim_in_pixel();
    for (idx, data) in ordered.iter().enumerate() {
        let color = palette_color(&TAB10, idx);
        let fraction = 1.0 - (LEGEND_Y_START - idx as f64 * LEGEND_Y_STEP);
        let y = (fraction * f64::from(legend_height)) as i32;
        if let Some(logo) = logos.legend_logo(&data.id) {
            let top = y - (logo.height() / 2) as i32;
            legend_area
                .draw(&BitMapElement::from(((10, top), logo)))
                .map_err(draw_error)?;
        }
        if with_text {
            let style = (FONT_FAMILY, 16).into_font().color(&color);
            legend_area
                .draw(&Text::new(data.label.clone(), (20 + LEGEND_LOGO_PX as i32, y - 8), style))
                .map_err(draw_error)?;
        }
    }

    root.present().map_err(draw_error)?;
    debug!(path = %output.display(), series = series.len(), "line chart written");
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    /// Bars sharing a group share a colour and a legend entry.
    pub group: String,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct BarChart<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub step: f64,
}

/// Groups in first-seen order with their palette colour.
pub fn group_colors(bars: &[Bar]) -> Vec<(String, RGBColor)> {
    let mut out: Vec<(String, RGBColor)> = Vec::new();
    for bar in bars {
        if out.iter().any(|(g, _)| g == &bar.group) {
            continue;
        }
        let color = palette_color(&TAB20, out.len());
        out.push((bar.group.clone(), color));
    }
    out
}

/// Horizontal bars, first bar on top.
pub fn render_bar_chart(output: &Path, chart: &BarChart<'_>, bars: &[Bar]) -> Result<()> {
    if bars.is_empty() {
        return Err(anyhow!("bar chart has no bars"));
    }
    let with_text = text_available();
    let colors = group_colors(bars);
    let color_of = |group: &str| {
        colors
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, c)| *c)
            .unwrap_or(BLACK)
    };

    let height = (bars.len() as u32 * 28).max(400) + 120;
    let root = BitMapBackend::new(output, (1400, height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;
    let (plot_area, legend_area) = root.split_horizontally(1050);

    let x_max = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
    let x_range = 0.0..if x_max > 0.0 { x_max * 1.05 } else { 1.0 };
    let n = bars.len() as f64;

    let mut builder = ChartBuilder::on(&plot_area);
    builder.margin(20);
    if with_text {
        builder.caption(chart.title, (FONT_FAMILY, 24)).x_label_area_size(40);
    }
    let mut ctx = builder.build_cartesian_2d(x_range, 0.0..n).map_err(draw_error)?;

    if with_text {
        let step = chart.step;
        let x_fmt = move |v: &f64| format_axis_value(*v, step);
        ctx.configure_mesh()
            .disable_y_mesh()
            .y_labels(0)
            .x_desc(chart.x_desc)
            .x_label_formatter(&x_fmt)
            .draw()
            .map_err(draw_error)?;
    }

    ctx.draw_series(bars.iter().enumerate().map(|(idx, bar)| {
        let top = n - idx as f64;
        Rectangle::new(
            [(0.0, top - 0.9), (bar.value, top - 0.1)],
            color_of(&bar.group).filled(),
        )
    }))
    .map_err(draw_error)?;

    if with_text {
        ctx.draw_series(bars.iter().enumerate().map(|(idx, bar)| {
            let top = n - idx as f64;
            Text::new(
                bar.label.clone(),
                (0.0, top - 0.25),
                (FONT_FAMILY, 12).into_font().color(&BLACK),
            )
        }))
        .map_err(draw_error)?;

        for (idx, (group, color)) in colors.iter().enumerate() {
            let y = 40 + idx as i32 * 22;
            legend_area
                .draw(&Rectangle::new([(10, y), (26, y + 14)], color.filled()))
                .map_err(draw_error)?;
            legend_area
                .draw(&Text::new(
                    group.clone(),
                    (34, y),
                    (FONT_FAMILY, 13).into_font().color(&BLACK),
                ))
                .map_err(draw_error)?;
        }
    }

    root.present().map_err(draw_error)?;
    debug!(path = %output.display(), bars = bars.len(), "bar chart written");
    Ok(())
}

/// Markdown embedding each image as a base64 data URI, one per line.
pub fn markdown_preview(paths: &[PathBuf]) -> Result<String> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("read chart {}", path.display()))?;
        parts.push(format!(
            "![Image](data:image/png;base64,{})",
            STANDARD.encode(bytes)
        ));
    }
    Ok(parts.join("\n"))
}

fn year_bounds(series: &[LineSeriesData]) -> Option<(i32, i32)> {
    let years = series.iter().flat_map(|s| s.points.iter().map(|(y, _)| *y));
    let min = years.clone().min()?;
    let max = years.max()?;
    Some((min, max))
}

fn draw_error<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("chart drawing failed: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_units_follow_step() {
        assert_eq!(format_axis_value(12_000_000_000.0, 1_000_000_000.0), "12B");
        assert_eq!(format_axis_value(180_000_000.0, 1_000_000.0), "180M");
        assert_eq!(format_axis_value(4_000.0, 1_000.0), "4K");
        assert_eq!(format_axis_value(0.0, 1_000_000.0), "0M");
    }

    #[test]
    fn legend_is_ordered_by_series_peak() {
        let series = vec![
            LineSeriesData {
                id: "a".into(),
                label: "A".into(),
                points: vec![(2020, 1.0), (2021, 3.0)],
            },
            LineSeriesData {
                id: "b".into(),
                label: "B".into(),
                points: vec![(2020, 5.0)],
            },
        ];
        let order: Vec<&str> = legend_order(&series).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn groups_take_palette_slots_in_first_seen_order() {
        let bars = vec![
            Bar {
                label: "p1".into(),
                group: "Club B".into(),
                value: 3.0,
            },
            Bar {
                label: "p2".into(),
                group: "Club A".into(),
                value: 2.0,
            },
            Bar {
                label: "p3".into(),
                group: "Club B".into(),
                value: 1.0,
            },
        ];
        let colors = group_colors(&bars);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0], ("Club B".to_string(), TAB20[0]));
        assert_eq!(colors[1], ("Club A".to_string(), TAB20[1]));
    }

    #[test]
    fn preview_embeds_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        fs::write(&a, b"abc").unwrap();
        fs::write(&b, b"xyz").unwrap();
        let md = markdown_preview(&[a, b]).unwrap();
        assert_eq!(
            md,
            "![Image](data:image/png;base64,YWJj)\n![Image](data:image/png;base64,eHl6)"
        );
    }
}
