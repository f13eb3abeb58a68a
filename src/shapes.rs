// Outline primitives built on single-pixel writes.
//
// Coordinates are signed so rotated corners may land off screen; those
// points are simply not plotted.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_hal::digital::OutputPin;

use crate::bus::BusTransport;
use crate::st7796s::{Result, St7796s};

/// Integer Bresenham walk from (x1, y1) to (x2, y2), both ends included.
///
/// When the doubled error satisfies both tests in one step the walk moves
/// diagonally; the exact tie-break decides which pixels a shallow line hits.
///
/// State is kept in `i64` so any pair of `i32` endpoints walks without
/// overflow.
#[derive(Clone, Debug)]
pub struct LinePoints {
    x: i64,
    y: i64,
    x2: i64,
    y2: i64,
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    done: bool,
}

impl LinePoints {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let (x1, y1, x2, y2) = (x1 as i64, y1 as i64, x2 as i64, y2 as i64);
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        Self {
            x: x1,
            y: y1,
            x2,
            y2,
            dx,
            dy,
            sx: if x1 < x2 { 1 } else { -1 },
            sy: if y1 < y2 { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }
}

impl Iterator for LinePoints {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        // Every point lies between the two i32 endpoints.
        let here = (self.x as i32, self.y as i32);
        if self.x == self.x2 && self.y == self.y2 {
            self.done = true;
            return Some(here);
        }

        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(here)
    }
}

// Rotate (px, py) about the origin by `rad`, then move to (cx, cy).
// The centre is added before truncating toward zero.
fn rotate(px: f64, py: f64, sin: f64, cos: f64, cx: i32, cy: i32) -> (i32, i32) {
    (
        (px * cos - py * sin + cx as f64) as i32,
        (px * sin + py * cos + cy as f64) as i32,
    )
}

// Screen y grows downward, so a positive angle turns clockwise on the panel.
fn sin_cos(angle: u16) -> (f64, f64) {
    let rad = -(angle as f64) * core::f64::consts::PI / 180.0;
    (libm::sin(rad), libm::cos(rad))
}

impl<BUS, PIN> St7796s<BUS, PIN>
where
    BUS: BusTransport,
    PIN: OutputPin,
{
    /// Off-screen points are skipped. The walk stops once the line has
    /// crossed the screen and left it again, and a line whose bounding box
    /// misses the screen is not walked at all.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb565) -> Result<(), BUS, PIN> {
        let (w, h) = (self.width() as i32, self.height() as i32);
        if x1.max(x2) < 0 || y1.max(y2) < 0 || x1.min(x2) >= w || y1.min(y2) >= h {
            return Ok(());
        }

        // x and y are monotonic along the walk, so the on-screen points
        // form one contiguous run.
        let mut entered = false;
        for (x, y) in LinePoints::new(x1, y1, x2, y2) {
            if (0..w).contains(&x) && (0..h).contains(&y) {
                entered = true;
                self.draw_pixel(x as u16, y as u16, color)?;
            } else if entered {
                break;
            }
        }
        Ok(())
    }

    /// Rectangle outline with corners (x1, y1) and (x2, y2).
    pub fn draw_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb565) -> Result<(), BUS, PIN> {
        self.draw_line(x1, y1, x2, y1, color)?;
        self.draw_line(x2, y1, x2, y2, color)?;
        self.draw_line(x2, y2, x1, y2, color)?;
        self.draw_line(x1, y2, x1, y1, color)
    }

    /// `w` x `h` rectangle outline centred on (cx, cy), turned by `angle` degrees.
    pub fn draw_rect_angle(
        &mut self,
        cx: i32,
        cy: i32,
        w: u16,
        h: u16,
        angle: u16,
        color: Rgb565,
    ) -> Result<(), BUS, PIN> {
        let (sin, cos) = sin_cos(angle);
        let hw = (w / 2) as f64;
        let hh = (h / 2) as f64;

        let (x1, y1) = rotate(-hw, hh, sin, cos, cx, cy);
        let (x2, y2) = rotate(-hw, -hh, sin, cos, cx, cy);
        let (x3, y3) = rotate(hw, hh, sin, cos, cx, cy);
        let (x4, y4) = rotate(hw, -hh, sin, cos, cx, cy);

        self.draw_line(x1, y1, x2, y2, color)?;
        self.draw_line(x1, y1, x3, y3, color)?;
        self.draw_line(x2, y2, x4, y4, color)?;
        self.draw_line(x3, y3, x4, y4, color)
    }

    /// Isosceles triangle outline: apex at +h/2, base at -h/2 spanning w.
    pub fn draw_triangle(
        &mut self,
        cx: i32,
        cy: i32,
        w: u16,
        h: u16,
        angle: u16,
        color: Rgb565,
    ) -> Result<(), BUS, PIN> {
        let (sin, cos) = sin_cos(angle);
        let hw = (w / 2) as f64;
        let hh = (h / 2) as f64;

        let (x1, y1) = rotate(0.0, hh, sin, cos, cx, cy);
        let (x2, y2) = rotate(hw, -hh, sin, cos, cx, cy);
        let (x3, y3) = rotate(-hw, -hh, sin, cos, cx, cy);

        self.draw_line(x1, y1, x2, y2, color)?;
        self.draw_line(x1, y1, x3, y3, color)?;
        self.draw_line(x2, y2, x3, y3, color)
    }
}
