use std::path::Path;

use crate::Result;

/// Straight-alpha RGBA with every channel in `[0, 1]`.
pub type Rgba = [f32; 4];

pub const BLACK: Rgba = [0.0, 0.0, 0.0, 1.0];
pub const TRANSPARENT: Rgba = [0.0, 0.0, 0.0, 0.0];

/// An owned pixel buffer, row-major, origin at the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Frame {
    /// A fully transparent frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, TRANSPARENT)
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Rgba) {
        let index = self.index(x, y);
        self.pixels[index] = color;
    }

    /// Nearest-pixel lookup with edge clamping, in pixel coordinates.
    pub fn sample(&self, x: f32, y: f32) -> Rgba {
        if self.pixels.is_empty() {
            return TRANSPARENT;
        }
        let xi = clamp_coord(x, self.width);
        let yi = clamp_coord(y, self.height);
        self.get(xi, yi)
    }

    /// Like [`Frame::sample`] but transparent outside the frame.
    pub fn sample_or_clear(&self, x: f32, y: f32) -> Rgba {
        if !x.is_finite()
            || !y.is_finite()
            || x < 0.0
            || y < 0.0
            || x >= self.width as f32
            || y >= self.height as f32
        {
            return TRANSPARENT;
        }
        self.get(x as u32, y as u32)
    }

    /// Rebuilds the frame by pulling each output pixel from a function of
    /// its coordinates.
    pub fn remap(&self, mut f: impl FnMut(&Frame, u32, u32) -> Rgba) -> Frame {
        let mut out = Frame::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let value = f(self, x, y);
                out.set(x, y, value);
            }
        }
        out
    }

    /// Resamples to new dimensions (nearest neighbour).
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.width == width && self.height == height {
            return self.clone();
        }
        let sx = self.width as f32 / width.max(1) as f32;
        let sy = self.height as f32 / height.max(1) as f32;
        let mut out = Frame::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let value = self.sample((x as f32 + 0.5) * sx, (y as f32 + 0.5) * sy);
                out.set(x, y, value);
            }
        }
        out
    }

    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let mut raw = Vec::with_capacity(self.pixels.len() * 4);
        for px in &self.pixels {
            for channel in px {
                raw.push((channel.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }

    pub fn from_rgba_image(img: &image::RgbaImage) -> Self {
        let pixels = img
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                [
                    f32::from(r) / 255.0,
                    f32::from(g) / 255.0,
                    f32::from(b) / 255.0,
                    f32::from(a) / 255.0,
                ]
            })
            .collect();
        Self {
            width: img.width(),
            height: img.height(),
            pixels,
        }
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgba_image().save(path)?;
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

fn clamp_coord(v: f32, extent: u32) -> u32 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    (v as u32).min(extent.saturating_sub(1))
}

/// Parses `#rrggbb` (or `rrggbb`) into an opaque color.
pub fn parse_hex_color(raw: &str) -> Option<Rgba> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([
        f32::from(channel(0)?) / 255.0,
        f32::from(channel(2)?) / 255.0,
        f32::from(channel(4)?) / 255.0,
        1.0,
    ])
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn luma(px: Rgba) -> f32 {
    0.2126 * px[0] + 0.7152 * px[1] + 0.0722 * px[2]
}

/// HSV (hue in degrees) to opaque RGB.
pub fn hsv(hue: f32, saturation: f32, value: f32) -> Rgba {
    let h = crate::effects::wrap_degrees(hue) / 60.0;
    let c = value * saturation;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    [r + m, g + m, b + m, 1.0]
}
