// Bar charts of one metric, drawn as SVG and rasterized to PNG.

use std::fmt::Write as _;

use png::{BitDepth, ColorType, Encoder};
use quick_xml::escape::escape;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree};

use crate::dash::*;

pub const CHART_WIDTH: u32 = 640;
pub const CHART_HEIGHT: u32 = 480;

const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 56.0;
const MARGIN_BOTTOM: f64 = 150.0;
const Y_TICKS: usize = 5;
const BAR_FILL: &str = "#1f77b4";
const FONT_FAMILY: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";

/// A rendered chart. The same bytes are shown and embedded in the report.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChartImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// The three charts of an analysis.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChartSet {
    pub all: ChartImage,
    pub top: ChartImage,
    pub bottom: ChartImage,
}

/// Titles of the overall, top and bottom charts.
pub fn chart_titles(kind: KpiKind) -> [&'static str; 3] {
    match kind {
        KpiKind::AppAdoption => [
            "Biểu đồ tổng thể",
            "Top 3 Điện lực cao nhất",
            "Bottom 3 Điện lực thấp nhất",
        ],
        KpiKind::LateTickets => [
            "Biểu đồ tổng thể",
            "Top 3 Đơn vị trễ hạn cao nhất",
            "Bottom 3 Đơn vị trễ hạn thấp nhất",
        ],
    }
}

impl ChartSet {
    /// Draws the overall chart (unit-level rows only), the top chart and the bottom chart.
    pub fn render<R: KpiRecord>(analysis: &Analysis<R>) -> DashResult<ChartSet> {
        let metric = R::KIND.metric();
        let [all_title, top_title, bottom_title] = chart_titles(R::KIND);
        Ok(ChartSet {
            all: render_bar_chart(&analysis.unit_level, metric, all_title)?,
            top: render_bar_chart(&analysis.top, metric, top_title)?,
            bottom: render_bar_chart(&analysis.bottom, metric, bottom_title)?,
        })
    }

    /// Writes `<stem>_all.png`, `<stem>_top.png` and `<stem>_bottom.png`.
    pub fn write_all(&self, dir: &Path, stem: &str) -> DashResult<Vec<PathBuf>> {
        let mut res: Vec<PathBuf> = Vec::new();
        for (suffix, chart) in [("all", &self.all), ("top", &self.top), ("bottom", &self.bottom)] {
            let p = dir.join(format!("{}_{}.png", stem, suffix));
            fs::write(&p, &chart.png).context(WritingOutputSnafu {
                path: p.display().to_string(),
            })?;
            res.push(p);
        }
        Ok(res)
    }
}

/// Renders one bar per row, tallest first, each bar annotated with its value.
pub fn render_bar_chart<R: KpiRecord>(
    rows: &[R],
    metric: &str,
    title: &str,
) -> DashResult<ChartImage> {
    let mut sorted: Vec<R> = rows.to_vec();
    sort_by_metric(&mut sorted, metric, SortDirection::Descending);
    let bars: Vec<(String, Option<f64>)> = sorted
        .iter()
        .map(|r| (r.unit().to_string(), r.value(metric)))
        .collect();
    debug!("render_bar_chart: title: {:?} bars: {:?}", title, bars);

    let svg = build_svg(&bars, R::KIND.unit_column(), metric, title);
    let png = svg_to_png(&svg, title, CHART_WIDTH, CHART_HEIGHT)?;
    Ok(ChartImage {
        png,
        width: CHART_WIDTH,
        height: CHART_HEIGHT,
    })
}

fn text_attrs(size: u32) -> String {
    format!(
        "fill='#222222' font-family='{}' font-size='{}'",
        FONT_FAMILY, size
    )
}

fn build_svg(
    bars: &[(String, Option<f64>)],
    unit_label: &str,
    metric: &str,
    title: &str,
) -> String {
    let width = CHART_WIDTH as f64;
    let height = CHART_HEIGHT as f64;
    let plot_width = width - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = height - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_height;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{:.0}' height='{:.0}' viewBox='0 0 {:.0} {:.0}'>",
        width, height, width, height
    );
    let _ = writeln!(
        svg,
        "  <rect width='{:.0}' height='{:.0}' fill='#ffffff'/>",
        width, height
    );
    let _ = writeln!(
        svg,
        "  <text x='{:.1}' y='32' text-anchor='middle' {} font-weight='bold'>{}</text>",
        width / 2.0,
        text_attrs(16),
        escape(title)
    );

    if bars.is_empty() {
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' text-anchor='middle' {}>Không có dữ liệu</text>",
            width / 2.0,
            height / 2.0,
            text_attrs(14)
        );
        let _ = writeln!(svg, "</svg>");
        return svg;
    }

    let max_value = bars
        .iter()
        .filter_map(|(_, v)| *v)
        .fold(0.0_f64, f64::max);
    // Headroom for the annotations above the tallest bar.
    let y_max = if max_value > 0.0 { max_value * 1.15 } else { 1.0 };
    let y_of = |v: f64| baseline - v.max(0.0) / y_max * plot_height;

    // Grid and y axis ticks
    for i in 0..=Y_TICKS {
        let v = y_max * i as f64 / Y_TICKS as f64;
        let y = y_of(v);
        let _ = writeln!(
            svg,
            "  <line x1='{:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='#e0e0e0' stroke-width='1'/>",
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' text-anchor='end' {}>{:.1}</text>",
            MARGIN_LEFT - 6.0,
            y + 4.0,
            text_attrs(10),
            v
        );
    }
    let _ = writeln!(
        svg,
        "  <text transform='translate(18 {:.1}) rotate(-90)' text-anchor='middle' {}>{}</text>",
        MARGIN_TOP + plot_height / 2.0,
        text_attrs(11),
        escape(metric)
    );

    let slot = plot_width / bars.len() as f64;
    let bar_width = slot * 0.7;
    for (idx, (label, value)) in bars.iter().enumerate() {
        let x = MARGIN_LEFT + slot * idx as f64 + (slot - bar_width) / 2.0;
        let center = x + bar_width / 2.0;
        if let Some(v) = value {
            let top = y_of(*v);
            let _ = writeln!(
                svg,
                "  <rect x='{:.2}' y='{:.2}' width='{:.2}' height='{:.2}' fill='{}'/>",
                x,
                top,
                bar_width,
                baseline - top,
                BAR_FILL
            );
            let _ = writeln!(
                svg,
                "  <text x='{:.2}' y='{:.2}' text-anchor='middle' {}>{:.2}%</text>",
                center,
                top - 4.0,
                text_attrs(9),
                v
            );
        }
        let label_y = baseline + 14.0;
        let _ = writeln!(
            svg,
            "  <text transform='translate({:.2} {:.2}) rotate(-45)' text-anchor='end' {}>{}</text>",
            center,
            label_y,
            text_attrs(10),
            escape(label.as_str())
        );
    }

    let _ = writeln!(
        svg,
        "  <text x='{:.1}' y='{:.1}' text-anchor='middle' {}>{}</text>",
        MARGIN_LEFT + plot_width / 2.0,
        height - 10.0,
        text_attrs(11),
        escape(unit_label)
    );

    // Axes
    let _ = writeln!(
        svg,
        "  <line x1='{:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='#222222' stroke-width='1'/>",
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        baseline
    );
    let _ = writeln!(
        svg,
        "  <line x1='{:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='#222222' stroke-width='1'/>",
        MARGIN_LEFT,
        baseline,
        MARGIN_LEFT + plot_width,
        baseline
    );
    let _ = writeln!(svg, "</svg>");
    svg
}

fn svg_to_png(svg: &str, title: &str, width: u32, height: u32) -> DashResult<Vec<u8>> {
    let mut options = Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree: Tree = Tree::from_data(svg.as_bytes(), &options).map_err(|err| {
        ChartSvgSnafu {
            title,
            message: err.to_string(),
        }
        .build()
    })?;

    let mut pixmap = Pixmap::new(width, height).context(ChartRasterSnafu { width, height })?;
    let mut pixmap_ref = pixmap.as_mut();
    resvg::render(&tree, Transform::default(), &mut pixmap_ref);

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header().context(PngEncodingSnafu {})?;
        writer
            .write_image_data(pixmap.data())
            .context(PngEncodingSnafu {})?;
        writer.finish().context(PngEncodingSnafu {})?;
    }
    Ok(out)
}
