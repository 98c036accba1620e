#![warn(missing_docs)]
//! # faceid-overlay
//!
//! ## Purpose
//! Draws detection boxes on a transparent surface laid over the live video.
//!
//! ## Responsibilities
//! - Map source-frame boxes onto the video's displayed geometry with
//!   independent horizontal/vertical scale factors.
//! - Render a rectangle outline plus four L-shaped corner accents per box.
//! - Keep the surface sized to the video's current displayed size.
//!
//! ## Data flow
//! Detection outcome boxes -> [`OverlayRenderer::draw`] -> [`project_box`] ->
//! stroke commands on an [`OverlaySurface`].
//!
//! ## Ownership and lifetimes
//! The renderer owns its surface. Boxes are borrowed for the duration of one
//! draw call and never retained.
//!
//! ## Error model
//! Drawing cannot fail. Non-finite boxes are skipped and a video without
//! known native size draws nothing.
//!
//! ## Security and privacy notes
//! Only geometry reaches this crate; no frame pixels.

use faceid_core::BoundingBox;
use image::{Rgba, RgbaImage};

/// Default outline width in surface pixels.
pub const DEFAULT_LINE_WIDTH: f64 = 3.0;

/// Default length of each corner-accent leg in surface pixels.
pub const DEFAULT_CORNER_LEG: f64 = 15.0;

/// Point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// RGBA stroke color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeColor(pub [u8; 4]);

impl StrokeColor {
    /// CSS `green`, used for detected faces.
    pub const GREEN: Self = Self([0, 128, 0, 255]);
    /// CSS `red`.
    pub const RED: Self = Self([255, 0, 0, 255]);
}

/// Stroke parameters for one draw command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// Stroke color.
    pub color: StrokeColor,
    /// Line width in surface pixels.
    pub line_width: f64,
}

/// Displayed vs. native size of the video element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoGeometry {
    /// On-screen width.
    pub displayed_width: f64,
    /// On-screen height.
    pub displayed_height: f64,
    /// Native stream width.
    pub native_width: u32,
    /// Native stream height.
    pub native_height: u32,
}

impl VideoGeometry {
    /// Creates a geometry snapshot.
    pub fn new(displayed_width: f64, displayed_height: f64, native_width: u32, native_height: u32) -> Self {
        Self {
            displayed_width,
            displayed_height,
            native_width,
            native_height,
        }
    }

    /// Independent `(x, y)` scale factors, or `None` while the native size is
    /// still unknown.
    pub fn scale(&self) -> Option<(f64, f64)> {
        if self.native_width == 0 || self.native_height == 0 {
            return None;
        }
        Some((
            self.displayed_width / f64::from(self.native_width),
            self.displayed_height / f64::from(self.native_height),
        ))
    }

    /// Displayed size rounded to whole surface pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        (
            self.displayed_width.max(0.0).round() as u32,
            self.displayed_height.max(0.0).round() as u32,
        )
    }
}

/// Maps a source-frame box into displayed coordinates.
pub fn project_box(bounding_box: &BoundingBox, (scale_x, scale_y): (f64, f64)) -> Rect {
    Rect {
        x: bounding_box.x * scale_x,
        y: bounding_box.y * scale_y,
        width: bounding_box.width * scale_x,
        height: bounding_box.height * scale_y,
    }
}

/// The four L-shaped corner accents of `rect`, each as a three-point
/// polyline, in top-left, top-right, bottom-left, bottom-right order.
pub fn corner_accents(rect: &Rect, leg: f64) -> [[Point; 3]; 4] {
    let left = rect.x;
    let top = rect.y;
    let right = rect.x + rect.width;
    let bottom = rect.y + rect.height;

    [
        [
            Point::new(left, top + leg),
            Point::new(left, top),
            Point::new(left + leg, top),
        ],
        [
            Point::new(right - leg, top),
            Point::new(right, top),
            Point::new(right, top + leg),
        ],
        [
            Point::new(left, bottom - leg),
            Point::new(left, bottom),
            Point::new(left + leg, bottom),
        ],
        [
            Point::new(right - leg, bottom),
            Point::new(right, bottom),
            Point::new(right, bottom - leg),
        ],
    ]
}

/// Transparent drawing surface aligned with the video.
pub trait OverlaySurface {
    /// Current displayed/native geometry of the video underneath.
    fn video_geometry(&self) -> VideoGeometry;

    /// Resizes the surface's pixel buffer.
    fn resize(&mut self, width: u32, height: u32);

    /// Erases everything.
    fn clear(&mut self);

    /// Strokes a rectangle outline.
    fn stroke_rect(&mut self, rect: Rect, style: StrokeStyle);

    /// Strokes an open polyline.
    fn stroke_path(&mut self, points: &[Point], style: StrokeStyle);
}

/// Line width and corner-leg length used for every box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Outline width.
    pub line_width: f64,
    /// Corner-accent leg length.
    pub corner_leg: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            corner_leg: DEFAULT_CORNER_LEG,
        }
    }
}

/// Renders detection boxes onto an [`OverlaySurface`].
#[derive(Debug)]
pub struct OverlayRenderer<S> {
    surface: S,
    style: OverlayStyle,
}

impl<S: OverlaySurface> OverlayRenderer<S> {
    /// Creates a renderer with the default style.
    pub fn new(surface: S) -> Self {
        Self::with_style(surface, OverlayStyle::default())
    }

    /// Creates a renderer with a custom style.
    pub fn with_style(surface: S, style: OverlayStyle) -> Self {
        Self { surface, style }
    }

    /// Replaces the overlay with `boxes`.
    ///
    /// The surface is resized to the video's current displayed size and
    /// fully cleared before drawing, so `draw(&[], ..)` equals [`Self::clear`].
    /// Returns the projected rectangles that were drawn.
    pub fn draw(&mut self, boxes: &[BoundingBox], color: StrokeColor) -> Vec<Rect> {
        let geometry = self.surface.video_geometry();
        let (width, height) = geometry.surface_size();
        self.surface.resize(width, height);
        self.surface.clear();

        let Some(scale) = geometry.scale() else {
            log::debug!("overlay draw skipped: native video size unknown");
            return Vec::new();
        };

        let style = StrokeStyle {
            color,
            line_width: self.style.line_width,
        };
        let mut drawn = Vec::with_capacity(boxes.len());
        for bounding_box in boxes.iter().filter(|candidate| candidate.is_finite()) {
            let rect = project_box(bounding_box, scale);
            self.surface.stroke_rect(rect, style);
            for accent in corner_accents(&rect, self.style.corner_leg) {
                self.surface.stroke_path(&accent, style);
            }
            drawn.push(rect);
        }
        drawn
    }

    /// Erases the overlay.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// Borrows the surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutably borrows the surface, e.g. to report a layout change.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

/// One recorded stroke.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Rectangle outline.
    Rect(Rect, StrokeStyle),
    /// Open polyline.
    Path(Vec<Point>, StrokeStyle),
}

/// Surface that records strokes since the last clear; used by tests and
/// headless hosts.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    geometry: VideoGeometry,
    size: (u32, u32),
    commands: Vec<DrawCommand>,
    clears: u32,
}

impl RecordingSurface {
    /// Creates an empty surface over a video with `geometry`.
    pub fn new(geometry: VideoGeometry) -> Self {
        Self {
            geometry,
            size: (0, 0),
            commands: Vec::new(),
            clears: 0,
        }
    }

    /// Reports a new video geometry (layout resize or stream change).
    pub fn set_video_geometry(&mut self, geometry: VideoGeometry) {
        self.geometry = geometry;
    }

    /// Strokes currently visible.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Rectangle outlines currently visible.
    pub fn visible_rects(&self) -> Vec<Rect> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Rect(rect, _) => Some(*rect),
                DrawCommand::Path(..) => None,
            })
            .collect()
    }

    /// Current pixel size.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Number of clears performed.
    pub fn clear_count(&self) -> u32 {
        self.clears
    }
}

impl OverlaySurface for RecordingSurface {
    fn video_geometry(&self) -> VideoGeometry {
        self.geometry
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clears += 1;
    }

    fn stroke_rect(&mut self, rect: Rect, style: StrokeStyle) {
        self.commands.push(DrawCommand::Rect(rect, style));
    }

    fn stroke_path(&mut self, points: &[Point], style: StrokeStyle) {
        self.commands.push(DrawCommand::Path(points.to_vec(), style));
    }
}

/// Surface that rasterizes strokes into an RGBA pixel buffer.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    geometry: VideoGeometry,
    canvas: RgbaImage,
}

impl RasterSurface {
    /// Creates a transparent surface over a video with `geometry`.
    pub fn new(geometry: VideoGeometry) -> Self {
        let (width, height) = geometry.surface_size();
        Self {
            geometry,
            canvas: RgbaImage::new(width, height),
        }
    }

    /// Reports a new video geometry.
    pub fn set_video_geometry(&mut self, geometry: VideoGeometry) {
        self.geometry = geometry;
    }

    /// Rendered pixels.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Number of non-transparent pixels.
    pub fn painted_pixels(&self) -> usize {
        self.canvas.pixels().filter(|pixel| pixel.0[3] != 0).count()
    }

    fn stroke_segment(&mut self, from: Point, to: Point, style: StrokeStyle) {
        let half = (style.line_width / 2.0).max(0.5);
        let (width, height) = self.canvas.dimensions();
        let bounds = Rect {
            x: -half,
            y: -half,
            width: f64::from(width) + 2.0 * half,
            height: f64::from(height) + 2.0 * half,
        };
        // Steps are counted on the visible part only; box coordinates come off the wire.
        let Some((from, to)) = clip_segment(from, to, &bounds) else {
            return;
        };
        let steps = (to.x - from.x).abs().max((to.y - from.y).abs()).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = f64::from(step) / f64::from(steps);
            let x = from.x + (to.x - from.x) * t;
            let y = from.y + (to.y - from.y) * t;
            self.fill_square(x, y, half, style.color);
        }
    }

    fn fill_square(&mut self, center_x: f64, center_y: f64, half: f64, color: StrokeColor) {
        let (width, height) = self.canvas.dimensions();
        let x0 = (center_x - half).floor().max(0.0) as u32;
        let y0 = (center_y - half).floor().max(0.0) as u32;
        let x1 = ((center_x + half).ceil().max(0.0) as u32).min(width);
        let y1 = ((center_y + half).ceil().max(0.0) as u32).min(height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.canvas.put_pixel(x, y, Rgba(color.0));
            }
        }
    }
}

/// Liang-Barsky clip of the segment `from`..`to` against `bounds`.
fn clip_segment(from: Point, to: Point, bounds: &Rect) -> Option<(Point, Point)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mut enter = 0.0_f64;
    let mut leave = 1.0_f64;
    let edges = [
        (-dx, from.x - bounds.x),
        (dx, bounds.x + bounds.width - from.x),
        (-dy, from.y - bounds.y),
        (dy, bounds.y + bounds.height - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            enter = enter.max(t);
        } else {
            leave = leave.min(t);
        }
        if enter > leave {
            return None;
        }
    }
    Some((
        Point::new(from.x + dx * enter, from.y + dy * enter),
        Point::new(from.x + dx * leave, from.y + dy * leave),
    ))
}

impl OverlaySurface for RasterSurface {
    fn video_geometry(&self) -> VideoGeometry {
        self.geometry
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, style: StrokeStyle) {
        let corners = [
            Point::new(rect.x, rect.y),
            Point::new(rect.x + rect.width, rect.y),
            Point::new(rect.x + rect.width, rect.y + rect.height),
            Point::new(rect.x, rect.y + rect.height),
            Point::new(rect.x, rect.y),
        ];
        self.stroke_path(&corners, style);
    }

    fn stroke_path(&mut self, points: &[Point], style: StrokeStyle) {
        for pair in points.windows(2) {
            self.stroke_segment(pair[0], pair[1], style);
        }
    }
}
