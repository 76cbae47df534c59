//! Per-pixel field patterns.

use std::f32::consts::{PI, TAU};

use noise::{NoiseFn, Perlin};

use super::{Pattern, RenderContext};
use crate::frame::{hsv, lerp, Frame, Rgba};

/// Seeded Perlin source shared by the noise-driven patterns.
#[derive(Debug, Clone)]
pub(crate) struct NoiseField {
    seed: u32,
    perlin: Perlin,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            perlin: Perlin::new(seed),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Fractional Brownian motion, roughly in `[-1, 1]`.
    pub fn fbm(&self, x: f32, y: f32, z: f32, octaves: u32) -> f32 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut norm = 0.0;
        for _ in 0..octaves.max(1) {
            let sample = self.perlin.get([
                f64::from(x * frequency),
                f64::from(y * frequency),
                f64::from(z * frequency),
            ]) as f32;
            sum += sample * amplitude;
            norm += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        sum / norm
    }

    /// [`NoiseField::fbm`] remapped to `[0, 1]`.
    pub fn fbm01(&self, x: f32, y: f32, z: f32, octaves: u32) -> f32 {
        (0.5 + 0.5 * self.fbm(x, y, z, octaves)).clamp(0.0, 1.0)
    }
}

/// Integer lattice hash in `[0, 1)`.
pub(crate) fn hash2(x: i32, y: i32, seed: u32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ seed.wrapping_mul(0xcb1a_b31f);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    (h & 0x00ff_ffff) as f32 / 16_777_216.0
}

/// Hue of an RGB color in degrees.
pub(crate) fn hue_of(color: Rgba) -> f32 {
    let [r, g, b, _] = color;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if delta <= f32::EPSILON {
        return 0.0;
    }
    let hue = if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    crate::effects::wrap_degrees(hue)
}

/// Shades the base color by a field value.
pub(crate) fn shade(ctx: &RenderContext<'_>, color: Rgba, value: f32) -> Rgba {
    let gain = (0.6 + 0.8 * ctx.settings.intensity) * ctx.energy.min(2.0);
    let level = (0.15 + 0.85 * value.clamp(0.0, 1.0)) * gain;
    [
        (color[0] * level).clamp(0.0, 1.0),
        (color[1] * level).clamp(0.0, 1.0),
        (color[2] * level).clamp(0.0, 1.0),
        1.0,
    ]
}

/// Aspect-corrected coordinates centred on the frame, shorter side spans 1.
pub(crate) fn centred(ctx: &RenderContext<'_>, x: u32, y: u32) -> (f32, f32) {
    let unit = ctx.width.min(ctx.height).max(1) as f32;
    (
        (x as f32 + 0.5 - ctx.width as f32 * 0.5) / unit,
        (y as f32 + 0.5 - ctx.height as f32 * 0.5) / unit,
    )
}

pub(crate) fn render_field(pattern: Pattern, ctx: &RenderContext<'_>, field: &NoiseField) -> Frame {
    let mut frame = Frame::new(ctx.width, ctx.height);
    let s = ctx.settings;
    let t = ctx.t;
    let freq = (2.0 + s.complexity * 10.0) / s.size;
    let octaves = 1 + (s.complexity * 4.0).round() as u32;
    let warp = s.turbulence * ctx.energy;
    let base_hue = hue_of(ctx.color);

    for y in 0..ctx.height {
        for x in 0..ctx.width {
            let (nx, ny) = centred(ctx, x, y);
            let px = match pattern {
                Pattern::Organic => {
                    let wx = nx + warp * 0.3 * (ny * 5.0 + t).sin();
                    let wy = ny + warp * 0.3 * (nx * 5.0 - t * 0.8).cos();
                    let v = ((wx * freq + t).sin()
                        + (wy * freq * 1.3 - t * 0.7).sin()
                        + ((wx + wy) * freq * 0.7 + t * 0.5 * (1.0 + s.flow)).sin())
                        / 6.0
                        + 0.5;
                    shade(ctx, ctx.color, v)
                }
                Pattern::Spiral => {
                    let arms = 1.0 + (s.symmetry * 7.0).round();
                    let r = nx.hypot(ny);
                    let a = ny.atan2(nx);
                    let v = 0.5 + 0.5 * (a * arms + r * freq * 3.0 - t * 3.0).sin();
                    shade(ctx, ctx.color, v * (1.0 - r * 0.4).max(0.0))
                }
                Pattern::Maze => shade(ctx, ctx.color, maze(ctx, nx, ny)),
                Pattern::Cellular => shade(ctx, ctx.color, cellular(ctx, nx, ny)),
                Pattern::Voronoi => shade(ctx, ctx.color, voronoi(ctx, nx, ny)),
                Pattern::Perlin => {
                    let v = field.fbm01(nx * freq * 0.5, ny * freq * 0.5, t * 0.3, octaves);
                    shade(ctx, ctx.color, v)
                }
                Pattern::Fire => {
                    let heat = (y as f32 + 0.5) / ctx.height.max(1) as f32;
                    let q = field.fbm(nx * 3.0, ny * 3.0 + t * 1.5, t * 0.5, octaves);
                    let v = (heat * 1.3 * (0.55 + 0.45 * q * (1.0 + warp))).clamp(0.0, 1.0);
                    let fire = [
                        (v * 1.5).min(1.0),
                        v * v,
                        v.powi(4) * 0.5,
                        1.0,
                    ];
                    mix(fire, shade(ctx, ctx.color, v), 0.2)
                }
                Pattern::Smoke => {
                    let wx = nx + warp * field.fbm(nx * 2.0, ny * 2.0, t * 0.2, 2) * 0.5;
                    let v = field.fbm01(wx * 2.0 + t * 0.2 * s.flow, ny * 2.0 - t * 0.3, t * 0.1, octaves);
                    let grey = [0.6 + 0.4 * v, 0.6 + 0.4 * v, 0.6 + 0.4 * v, 1.0];
                    shade(ctx, mix(grey, ctx.color, 0.3), v)
                }
                Pattern::Water => {
                    let a = (nx * freq + t * (1.0 + s.flow)).sin();
                    let b = (ny * freq * 1.2 - t * 0.8).sin();
                    let c = ((nx + ny) * freq * 0.6 + t * 0.5).cos();
                    let ripple = field.fbm(nx * 3.0, ny * 3.0, t * 0.25, 2) * warp;
                    let v = ((a + b + c) / 6.0 + 0.5 + ripple * 0.3).clamp(0.0, 1.0);
                    let caustic = v.powi(3);
                    let deep = mix([0.05, 0.25, 0.55, 1.0], ctx.color, 0.4);
                    let lit = [
                        lerp(deep[0], 1.0, caustic),
                        lerp(deep[1], 1.0, caustic),
                        lerp(deep[2], 1.0, caustic),
                        1.0,
                    ];
                    shade(ctx, lit, 0.6 + 0.4 * v)
                }
                Pattern::Nebula => {
                    let v = field.fbm01(nx * 1.5, ny * 1.5, t * 0.1, octaves + 1);
                    let h = field.fbm(nx * 0.8 + 10.0, ny * 0.8, t * 0.05, 2);
                    let tint = hsv(base_hue + h * 120.0, 0.7, 1.0);
                    shade(ctx, mix(tint, ctx.color, 0.3), v * v * 1.4)
                }
                // Wave, plus the shape patterns routed elsewhere.
                _ => {
                    let bend = s.flow * (ny * freq + t).sin();
                    let v = 0.5
                        + 0.5
                            * (nx * freq * PI * 0.5 + t * 2.0 + bend).sin()
                            * (ny * freq * PI * 0.25 - t).cos();
                    shade(ctx, ctx.color, v)
                }
            };
            frame.set(x, y, px);
        }
    }
    frame
}

pub(crate) fn mix(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
        lerp(a[3], b[3], t),
    ]
}

fn grid_scale(ctx: &RenderContext<'_>) -> f32 {
    (6.0 + ctx.settings.complexity * 18.0) / ctx.settings.size
}

fn maze(ctx: &RenderContext<'_>, nx: f32, ny: f32) -> f32 {
    let grid = grid_scale(ctx);
    let gx = (nx + ctx.t * ctx.settings.flow * 0.2) * grid;
    let gy = ny * grid;
    let (cx, cy) = (gx.floor(), gy.floor());
    let (fx, fy) = (gx - cx, gy - cy);
    let forward = hash2(cx as i32, cy as i32, ctx.settings.seed) < 0.5;
    let d = if forward {
        (fx - fy).abs()
    } else {
        (fx + fy - 1.0).abs()
    };
    let width = 0.08 + 0.12 * ctx.settings.intensity;
    if d < width {
        1.0
    } else {
        0.05
    }
}

fn cellular(ctx: &RenderContext<'_>, nx: f32, ny: f32) -> f32 {
    let grid = grid_scale(ctx);
    let (gx, gy) = (nx * grid, ny * grid);
    let (cx, cy) = (gx.floor(), gy.floor());
    let step = (ctx.t * 2.0).floor() as i32;
    let threshold = 0.3 + 0.4 * ctx.settings.complexity;
    let alive = hash2(
        cx as i32 ^ step.wrapping_mul(31),
        cy as i32 ^ step.wrapping_mul(17),
        ctx.settings.seed,
    ) < threshold;
    let (fx, fy) = (gx - cx - 0.5, gy - cy - 0.5);
    let edge = 1.0 - (fx.abs().max(fy.abs()) * 2.0).powi(4);
    if alive {
        edge.max(0.3)
    } else {
        0.1
    }
}

fn voronoi(ctx: &RenderContext<'_>, nx: f32, ny: f32) -> f32 {
    let grid = grid_scale(ctx) * 0.5;
    let (gx, gy) = (nx * grid, ny * grid);
    let (cx, cy) = (gx.floor() as i32, gy.floor() as i32);
    let mut nearest = f32::MAX;
    for oy in -1..=1 {
        for ox in -1..=1 {
            let (kx, ky) = (cx + ox, cy + oy);
            let phase = hash2(kx, ky, ctx.settings.seed.wrapping_add(1)) * TAU;
            let drift = 0.3 * ctx.settings.flow;
            let px = kx as f32 + hash2(kx, ky, ctx.settings.seed) + drift * (ctx.t + phase).sin();
            let py = ky as f32
                + hash2(ky, kx, ctx.settings.seed)
                + drift * (ctx.t * 0.8 + phase).cos();
            nearest = nearest.min((gx - px).hypot(gy - py));
        }
    }
    (1.0 - nearest * 1.5).clamp(0.0, 1.0)
}
