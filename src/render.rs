//! The output document: a raster scatter plot of the projected samples under
//! an SVG layer carrying the parameters, the reference points and the
//! suggested boundary.

use std::fmt;
use std::io::{Cursor, Write};

use image::{ImageFormat, RgbImage};
use plotters::element::DashedPathElement;
use plotters::prelude::*;

use crate::config::RenderConfig;
use crate::discriminant::Discriminants;
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Line, Point2};

const POINT_RADIUS: u32 = 1;
const LEGEND_PROBABILITIES: [f64; 3] = [0.99, 0.95, 0.9];
const AXIS_GREY: RGBColor = RGBColor(64, 64, 64);

/// Mapping between the projected plane and canvas pixels, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub size: u32,
    pub half: i32,
    pub abs_max: f64,
    pub scale_factor: f64,
}

impl Canvas {
    /// Fit `bounds` so that its largest absolute coordinate reaches the edge.
    pub fn fit(bounds: &Bounds, config: &RenderConfig) -> Self {
        let half = config.half_size();
        let abs_max = bounds.abs_max();
        let scale_factor = if abs_max > 0.0 && abs_max.is_finite() {
            f64::from(half) / abs_max
        } else {
            1.0
        };
        Self {
            size: config.canvas_size,
            half,
            abs_max,
            scale_factor,
        }
    }

    pub fn to_canvas(&self, point: Point2) -> Point2 {
        let half = f64::from(self.half);
        Point2::new(point.x * self.scale_factor + half, half - point.y * self.scale_factor)
    }

    /// Express a projected-plane line in canvas coordinates.
    pub fn line_to_canvas(&self, line: &Line) -> Line {
        let half = f64::from(self.half);
        Line {
            wx: line.wx,
            wy: -line.wy,
            wc: (line.wy - line.wx) * half + line.wc * self.scale_factor,
        }
    }

    /// Length in pixels of the distance at which a calibrated separator
    /// reaches `probability`.
    pub fn confidence_length(&self, probability: f64) -> f64 {
        -(1.0 / probability - 1.0).ln() * self.scale_factor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCrossing {
    pub edge: Edge,
    pub point: Point2,
    pub in_bounds: bool,
}

/// Where `line` (canvas coordinates) meets the four edges of a `size` square.
/// Edges parallel to the line yield no candidate.
#[allow(clippy::float_cmp)]
pub fn edge_crossings(line: &Line, size: f64) -> Vec<EdgeCrossing> {
    const SLACK: f64 = 1e-6;
    let within = |value: f64| (-SLACK..=size + SLACK).contains(&value);
    let mut crossings = Vec::with_capacity(4);

    if line.wy != 0.0 {
        for (edge, x) in [(Edge::Left, 0.0), (Edge::Right, size)] {
            let y = (-line.wc - line.wx * x) / line.wy;
            crossings.push(EdgeCrossing {
                edge,
                point: Point2::new(x, y),
                in_bounds: within(y),
            });
        }
    }
    if line.wx != 0.0 {
        for (edge, y) in [(Edge::Top, 0.0), (Edge::Bottom, size)] {
            let x = (-line.wc - line.wy * y) / line.wx;
            crossings.push(EdgeCrossing {
                edge,
                point: Point2::new(x, y),
                in_bounds: within(x),
            });
        }
    }

    crossings
}

/// Polyline from one canvas edge through the pivot to another edge, or
/// `None` when the line does not cross the canvas.
pub fn boundary_path(line: &Line, pivot: Point2, size: f64) -> Option<[Point2; 3]> {
    let mut ends: Vec<Point2> = Vec::with_capacity(2);
    for crossing in edge_crossings(line, size) {
        if !crossing.in_bounds {
            continue;
        }
        // a corner is met by two edges at once
        let duplicate = ends.iter().any(|end| {
            let delta = *end - crossing.point;
            delta.x.abs() < 1e-9 && delta.y.abs() < 1e-9
        });
        if !duplicate {
            ends.push(crossing.point);
        }
    }

    match ends.as_slice() {
        [first, second, ..] => Some([*first, pivot, *second]),
        _ => None,
    }
}

fn render_error<E: std::fmt::Display>(err: E) -> Error {
    Error::Render(err.to_string())
}

fn pixel(point: Point2) -> (i32, i32) {
    (point.x.round() as i32, point.y.round() as i32)
}

/// Draw the scatter plot into an RGB buffer of `size * size * 3` bytes.
pub fn draw_raster(canvas: &Canvas, discriminants: &Discriminants) -> Result<Vec<u8>> {
    let size = canvas.size;
    let side = f64::from(size);
    let mut buffer = vec![0u8; size as usize * size as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (size, size)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        // translucent circles accumulate into a density picture
        let unlabeled_style = RGBAColor(102, 102, 102, 0.1).stroke_width(1);
        for &point in &discriminants.unlabeled {
            root.draw(&Circle::new(pixel(canvas.to_canvas(point)), POINT_RADIUS, unlabeled_style))
                .map_err(render_error)?;
        }

        let positive_style = RGBAColor(255, 0, 0, 0.75).stroke_width(1);
        let negative_style = RGBAColor(0, 0, 255, 0.75).stroke_width(1);
        for (point, &label) in discriminants.labeled_points().zip(&discriminants.labels) {
            let style = if label > 0.0 { positive_style } else { negative_style };
            root.draw(&Circle::new(pixel(canvas.to_canvas(point)), POINT_RADIUS, style))
                .map_err(render_error)?;
        }

        let legend_style = AXIS_GREY.stroke_width(1);
        for (row, &probability) in LEGEND_PROBABILITIES.iter().enumerate() {
            let y = side - 15.0 - 20.0 * row as f64;
            let length = canvas.confidence_length(probability);
            let bar = vec![
                pixel(Point2::new(side - length - 10.0, y)),
                pixel(Point2::new(side - 10.0, y)),
            ];
            root.draw(&PathElement::new(bar, legend_style))
                .map_err(render_error)?;
        }

        let half = canvas.half;
        let side_px = size as i32;
        let dash = (size / 100).max(3);
        let axes = [
            vec![(0, half), (side_px, half)],
            vec![(half, 0), (half, side_px)],
        ];
        for axis in axes {
            root.draw(&DashedPathElement::new(axis, dash, dash, legend_style))
                .map_err(render_error)?;
        }

        root.present().map_err(render_error)?;
    }
    Ok(buffer)
}

pub fn encode_png(rgb: Vec<u8>, size: u32) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(size, size, rgb)
        .ok_or_else(|| Error::Render("raster buffer does not match canvas size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

/// Plain-text PPM (P3) of an RGB buffer.
pub fn write_ppm<W: Write>(rgb: &[u8], size: u32, out: &mut W) -> Result<()> {
    writeln!(out, "P3 {size} {size} 255")?;
    for row in rgb.chunks(size as usize * 3) {
        let line: Vec<String> = row.iter().map(u8::to_string).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

/// How the raster is referenced from the SVG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterLink {
    /// Base64 PNG data
    Inline(String),
    /// Relative file name of a sibling image
    File(String),
}

/// Everything drawn in the vector layer.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub params_markup: String,
    pub raster: RasterLink,
    pub references: (Point2, Point2),
    pub boundary: Option<[Point2; 3]>,
}

pub fn svg_document(canvas: &Canvas, overlay: &Overlay) -> Result<String> {
    let mut svg = String::new();
    write_svg(&mut svg, canvas, overlay).map_err(render_error)?;
    Ok(svg)
}

fn write_svg<W: fmt::Write>(svg: &mut W, canvas: &Canvas, overlay: &Overlay) -> fmt::Result {
    let size = canvas.size;
    let side = f64::from(size);

    writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{size}\" height=\"{size}\" >"
    )?;
    writeln!(svg, "{}", overlay.params_markup)?;

    let href = match &overlay.raster {
        RasterLink::Inline(data) => format!("data:image/png;base64,{data}"),
        RasterLink::File(name) => name.clone(),
    };
    writeln!(
        svg,
        "<image xlink:href=\"{href}\" width=\"{size}\" height=\"{size}\" x=\"0\" y=\"0\" style=\"z-index:0\" />"
    )?;

    for (row, &probability) in LEGEND_PROBABILITIES.iter().enumerate() {
        let y = side - 15.0 - 20.0 * row as f64;
        let x = side - canvas.confidence_length(probability) - 20.0;
        let percent = (probability * 100.0).round();
        writeln!(
            svg,
            "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"end\" dominant-baseline=\"middle\" style=\"font-family:sans-serif;font-size:12px;font-weight:bold;fill:#404040\">p(classif)&gt;{percent}%</text>"
        )?;
    }

    for reference in [overlay.references.1, overlay.references.0] {
        let center = canvas.to_canvas(reference);
        writeln!(
            svg,
            "<circle cx=\"{}\" cy=\"{}\" r=\"2\" style=\"fill:none;stroke:#000000;stroke-width:1px;z-index:1;\" />",
            center.x, center.y
        )?;
    }

    if let Some([start, pivot, end]) = overlay.boundary {
        writeln!(
            svg,
            "<path style=\"fill:none;stroke:#000000;stroke-width:1px;z-index:1;\" d=\"M {},{} L {},{} L {},{}\" />",
            start.x, start.y, pivot.x, pivot.y, end.x, end.y
        )?;
    }

    writeln!(svg, "</svg>")
}
