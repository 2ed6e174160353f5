//! Figures drawn by scripts and their rendered PNG form.
//!
//! Scripts build a [`Figure`] with `figure()`, add series to it, and hand it
//! to `show(fig)` / `fig.show()`. Showing is routed through the
//! [`CaptureHarness`], which keeps the rendered [`PlotArtifact`] for the unit
//! being executed.

use std::{fmt, io::Cursor};

use image::{ImageFormat, Rgba, RgbaImage};
use rhai::{Array, Dynamic, Engine, EvalAltResult, FLOAT, Position};

use crate::{capture::CaptureHarness, config::ScriptConfig, error::PlotFailure};

/// Largest width or height, in pixels, that a figure may render at.
const MAX_SIDE_PIXELS: u32 = 16_384;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FRAME: Rgba<u8> = Rgba([40, 40, 40, 255]);
const PALETTE: [Rgba<u8>; 6] = [
    Rgba([31, 119, 180, 255]),
    Rgba([255, 127, 14, 255]),
    Rgba([44, 160, 44, 255]),
    Rgba([214, 39, 40, 255]),
    Rgba([148, 103, 189, 255]),
    Rgba([140, 86, 75, 255]),
];

/// A rendered figure.
///
/// `size_pixels` is always `size_inches` times `dpi`, rounded per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotArtifact {
    /// PNG-encoded image.
    pub png: Vec<u8>,
    /// Physical `(width, height)` in inches.
    pub size_inches: (f64, f64),
    /// `(width, height)` in pixels.
    pub size_pixels: (u32, u32),
    /// Resolution used to render.
    pub dpi: f64,
    /// Whether the figure kept the session's default size.
    pub is_default_size: bool,
}

/// One data series on a figure.
#[derive(Debug, Clone, PartialEq)]
enum Series {
    Line(Vec<(f64, f64)>),
    Scatter(Vec<(f64, f64)>),
    Bar(Vec<f64>),
}

/// A figure under construction by a script.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    width: f64,
    height: f64,
    dpi: f64,
    series: Vec<Series>,
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Figure({}x{}in @ {}dpi, {} series)",
            self.width,
            self.height,
            self.dpi,
            self.series.len()
        )
    }
}

impl Figure {
    /// Create an empty figure.
    pub fn new(width: f64, height: f64, dpi: f64) -> Self {
        Self {
            width,
            height,
            dpi,
            series: Vec::new(),
        }
    }

    /// Physical size in inches.
    pub fn size_inches(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Resolution in dots per inch.
    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// Pixel size at the figure's resolution.
    pub fn size_pixels(&self) -> (u32, u32) {
        (
            (self.width * self.dpi).round() as u32,
            (self.height * self.dpi).round() as u32,
        )
    }

    /// Add a line series.
    pub fn plot(&mut self, xs: &[f64], ys: &[f64]) -> Result<(), String> {
        self.series.push(Series::Line(zip_points(xs, ys)?));
        Ok(())
    }

    /// Add a scatter series.
    pub fn scatter(&mut self, xs: &[f64], ys: &[f64]) -> Result<(), String> {
        self.series.push(Series::Scatter(zip_points(xs, ys)?));
        Ok(())
    }

    /// Add a bar series, one bar per value at x = 0, 1, 2, ...
    pub fn bar(&mut self, values: &[f64]) -> Result<(), String> {
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(format!("bar values must be finite, got {v}"));
        }
        self.series.push(Series::Bar(values.to_vec()));
        Ok(())
    }

    /// Change the physical size.
    pub fn set_size(&mut self, width: f64, height: f64) -> Result<(), String> {
        check_dimension("width", width)?;
        check_dimension("height", height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Change the resolution.
    pub fn set_dpi(&mut self, dpi: f64) -> Result<(), String> {
        check_dimension("dpi", dpi)?;
        self.dpi = dpi;
        Ok(())
    }

    /// Render to PNG. `default_size` decides `is_default_size`.
    pub fn render(&self, default_size: (f64, f64)) -> Result<PlotArtifact, String> {
        check_dimension("width", self.width)?;
        check_dimension("height", self.height)?;
        check_dimension("dpi", self.dpi)?;

        let (w, h) = self.size_pixels();
        if w == 0 || h == 0 || w > MAX_SIDE_PIXELS || h > MAX_SIDE_PIXELS {
            return Err(format!(
                "figure renders at {w}x{h} pixels; each side must be between 1 and {MAX_SIDE_PIXELS}"
            ));
        }

        let image = self.rasterize(w, h);
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| format!("failed to encode PNG: {e}"))?;

        Ok(PlotArtifact {
            png,
            size_inches: self.size_inches(),
            size_pixels: (w, h),
            dpi: self.dpi,
            is_default_size: self.size_inches() == default_size,
        })
    }

    fn rasterize(&self, w: u32, h: u32) -> RgbaImage {
        let mut canvas = Canvas::new(w, h);
        let margin = (w.min(h) / 10).max(4) as i64;
        let area = Area {
            left: margin,
            top: margin,
            right: w as i64 - 1 - margin,
            bottom: h as i64 - 1 - margin,
        };
        if area.right <= area.left || area.bottom <= area.top {
            return canvas.image;
        }
        canvas.rect_outline(area.left, area.top, area.right, area.bottom, FRAME);

        let Some(bounds) = self.bounds() else {
            return canvas.image;
        };
        let marker = ((self.dpi / 50.0).round() as i64).max(1);

        for (idx, series) in self.series.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];
            match series {
                Series::Line(points) => {
                    let mapped: Vec<_> = points.iter().map(|p| area.map(&bounds, *p)).collect();
                    for pair in mapped.windows(2) {
                        canvas.line(pair[0], pair[1], color);
                    }
                    if let [(x, y)] = mapped.as_slice() {
                        canvas.fill_rect(x - marker, y - marker, x + marker, y + marker, color);
                    }
                }
                Series::Scatter(points) => {
                    for p in points {
                        let (x, y) = area.map(&bounds, *p);
                        canvas.fill_rect(x - marker, y - marker, x + marker, y + marker, color);
                    }
                }
                Series::Bar(values) => {
                    for (i, v) in values.iter().enumerate() {
                        let x = i as f64;
                        let (x0, y0) = area.map(&bounds, (x - 0.4, 0.0));
                        let (x1, y1) = area.map(&bounds, (x + 0.4, *v));
                        canvas.fill_rect(x0, y0.min(y1), x1, y0.max(y1), color);
                    }
                }
            }
        }
        canvas.image
    }

    /// Data range over every series, padded so neither axis is empty.
    fn bounds(&self) -> Option<Bounds> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for series in &self.series {
            match series {
                Series::Line(points) | Series::Scatter(points) => {
                    for (x, y) in points {
                        xs.push(*x);
                        ys.push(*y);
                    }
                }
                Series::Bar(values) if !values.is_empty() => {
                    xs.push(-0.5);
                    xs.push(values.len() as f64 - 0.5);
                    ys.push(0.0);
                    ys.extend(values.iter().copied());
                }
                Series::Bar(_) => {}
            }
        }
        let (x_min, x_max) = min_max(&xs)?;
        let (y_min, y_max) = min_max(&ys)?;
        let (x_min, x_max) = pad(x_min, x_max);
        let (y_min, y_max) = pad(y_min, y_max);
        Some(Bounds {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }
}

struct Bounds {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

/// Pixel rectangle the data is drawn into.
struct Area {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

impl Area {
    fn map(&self, bounds: &Bounds, (x, y): (f64, f64)) -> (i64, i64) {
        let fx = (x - bounds.x_min) / (bounds.x_max - bounds.x_min);
        let fy = (y - bounds.y_min) / (bounds.y_max - bounds.y_min);
        let px = self.left as f64 + fx * (self.right - self.left) as f64;
        // Image rows grow downwards.
        let py = self.bottom as f64 - fy * (self.bottom - self.top) as f64;
        (px.round() as i64, py.round() as i64)
    }
}

struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    fn new(w: u32, h: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(w, h, BACKGROUND),
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        if (0..w).contains(&x) && (0..h).contains(&y) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Bresenham line.
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgba<u8>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.put(x, y, color);
            }
        }
    }

    fn rect_outline(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
        self.line((x0, y0), (x1, y0), color);
        self.line((x1, y0), (x1, y1), color);
        self.line((x1, y1), (x0, y1), color);
        self.line((x0, y1), (x0, y0), color);
    }
}

fn zip_points(xs: &[f64], ys: &[f64]) -> Result<Vec<(f64, f64)>, String> {
    if xs.len() != ys.len() {
        return Err(format!(
            "x and y must have the same length, got {} and {}",
            xs.len(),
            ys.len()
        ));
    }
    if let Some(v) = xs.iter().chain(ys).find(|v| !v.is_finite()) {
        return Err(format!("coordinates must be finite, got {v}"));
    }
    Ok(xs.iter().copied().zip(ys.iter().copied()).collect())
}

fn check_dimension(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a positive number, got {value}"))
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn pad(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        let margin = (hi - lo) * 0.05;
        (lo - margin, hi + margin)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

fn plot_error(message: String) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(PlotFailure(message)),
        Position::NONE,
    ))
}

fn number(value: &Dynamic) -> Option<f64> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as f64))
}

fn to_number(name: &str, value: &Dynamic) -> RhaiResult<f64> {
    number(value).ok_or_else(|| {
        plot_error(format!("{name} must be a number, got {}", value.type_name()))
    })
}

fn to_numbers(name: &str, values: &Array) -> RhaiResult<Vec<f64>> {
    values.iter().map(|v| to_number(name, v)).collect()
}

/// Register the `Figure` type, its methods, and the display entry points.
pub(crate) fn register(engine: &mut Engine, config: &ScriptConfig, harness: CaptureHarness) {
    let (default_w, default_h) = config.default_size;
    let default_dpi = config.dpi;

    engine
        .register_type_with_name::<Figure>("Figure")
        .register_fn("figure", move || Figure::new(default_w, default_h, default_dpi))
        .register_fn("figure", move |w: Dynamic, h: Dynamic| -> RhaiResult<Figure> {
            let mut fig = Figure::new(default_w, default_h, default_dpi);
            fig.set_size(to_number("width", &w)?, to_number("height", &h)?)
                .map_err(plot_error)?;
            Ok(fig)
        })
        .register_fn("plot", |fig: &mut Figure, xs: Array, ys: Array| -> RhaiResult<()> {
            fig.plot(&to_numbers("x", &xs)?, &to_numbers("y", &ys)?)
                .map_err(plot_error)
        })
        .register_fn("plot", |fig: &mut Figure, ys: Array| -> RhaiResult<()> {
            let ys = to_numbers("y", &ys)?;
            let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
            fig.plot(&xs, &ys).map_err(plot_error)
        })
        .register_fn("scatter", |fig: &mut Figure, xs: Array, ys: Array| -> RhaiResult<()> {
            fig.scatter(&to_numbers("x", &xs)?, &to_numbers("y", &ys)?)
                .map_err(plot_error)
        })
        .register_fn("bar", |fig: &mut Figure, values: Array| -> RhaiResult<()> {
            fig.bar(&to_numbers("value", &values)?).map_err(plot_error)
        })
        .register_fn("set_size", |fig: &mut Figure, w: Dynamic, h: Dynamic| -> RhaiResult<()> {
            fig.set_size(to_number("width", &w)?, to_number("height", &h)?)
                .map_err(plot_error)
        })
        .register_fn("set_dpi", |fig: &mut Figure, dpi: Dynamic| -> RhaiResult<()> {
            fig.set_dpi(to_number("dpi", &dpi)?).map_err(plot_error)
        })
        .register_get("width", |fig: &mut Figure| -> FLOAT { fig.width })
        .register_get("height", |fig: &mut Figure| -> FLOAT { fig.height })
        .register_get("dpi", |fig: &mut Figure| -> FLOAT { fig.dpi })
        .register_fn("to_string", |fig: &mut Figure| fig.to_string())
        .register_fn("to_debug", |fig: &mut Figure| fig.to_string());

    engine.register_fn("show", move |fig: &mut Figure| -> RhaiResult<()> {
        harness.display(fig).map_err(plot_error)
    });
}
