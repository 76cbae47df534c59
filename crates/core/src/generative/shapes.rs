//! Shape-based patterns: particles, geometry grids, recursive fractals and
//! the galaxy star field.

use std::f32::consts::TAU;

use super::{
    fields::{centred, hue_of, shade, NoiseField},
    GeometryType, RenderContext,
};
use crate::frame::{hsv, Frame, Rgba};

const MAX_FRACTAL_PRIMITIVES: usize = 20_000;

/// Composites `color` over `dst` with the given coverage.
fn over(dst: Rgba, color: Rgba, coverage: f32) -> Rgba {
    let a = (coverage * color[3]).clamp(0.0, 1.0);
    [
        color[0] * a + dst[0] * (1.0 - a),
        color[1] * a + dst[1] * (1.0 - a),
        color[2] * a + dst[2] * (1.0 - a),
        a + dst[3] * (1.0 - a),
    ]
}

fn polygon_sides(kind: GeometryType, complexity: f32) -> u32 {
    match kind {
        GeometryType::Triangles => 3,
        GeometryType::Squares => 4,
        GeometryType::Hexagons => 6,
        GeometryType::Polygons => 5 + (complexity * 3.0).round() as u32,
        GeometryType::Circles | GeometryType::Stars => 0,
    }
}

/// Antialiased coverage of a primitive of circumradius `radius` (pixels)
/// centred at the origin, at offset (`dx`, `dy`) and rotation `rotation`
/// (radians).
fn shape_coverage(kind: GeometryType, sides: u32, dx: f32, dy: f32, radius: f32, rotation: f32) -> f32 {
    let r = dx.hypot(dy);
    if r > radius + 1.0 {
        return 0.0;
    }
    let theta = dy.atan2(dx) - rotation;
    let edge = match kind {
        GeometryType::Circles => radius - r,
        GeometryType::Stars => {
            let seg = TAU / 5.0;
            let a = theta.rem_euclid(seg) / seg;
            let k = (a * 2.0 - 1.0).abs();
            let boundary = radius * (0.45 + 0.55 * k);
            boundary - r
        }
        _ => {
            let seg = TAU / sides.max(3) as f32;
            let a = theta.rem_euclid(seg) - seg * 0.5;
            radius * (seg * 0.5).cos() - r * a.cos()
        }
    };
    (edge + 0.5).clamp(0.0, 1.0)
}

fn stamp(frame: &mut Frame, cx: f32, cy: f32, radius: f32, color: Rgba, coverage_of: impl Fn(f32, f32) -> f32) {
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let x0 = ((cx - radius - 1.0).floor() as i64).max(0);
    let x1 = ((cx + radius + 1.0).ceil() as i64).min(w - 1);
    let y0 = ((cy - radius - 1.0).floor() as i64).max(0);
    let y1 = ((cy + radius + 1.0).ceil() as i64).min(h - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let coverage = coverage_of(x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
            if coverage > 0.0 {
                let (ux, uy) = (x as u32, y as u32);
                let blended = over(frame.get(ux, uy), color, coverage);
                frame.set(ux, uy, blended);
            }
        }
    }
}

fn disc(frame: &mut Frame, cx: f32, cy: f32, radius: f32, color: Rgba) {
    stamp(frame, cx, cy, radius, color, |dx, dy| {
        (radius + 0.5 - dx.hypot(dy)).clamp(0.0, 1.0)
    });
}

pub(crate) fn particles(ctx: &RenderContext<'_>) -> Frame {
    let s = ctx.settings;
    let mut frame = Frame::new(ctx.width, ctx.height);
    let mut rng = fastrand::Rng::with_seed(u64::from(s.pattern_seed()));
    let base_hue = hue_of(ctx.color);
    let (w, h) = (ctx.width as f32, ctx.height as f32);
    let radius = s.particle.size as f32 * 0.5 * s.size;

    for _ in 0..s.particle.count {
        let x0 = rng.f32();
        let y0 = rng.f32();
        let heading = rng.f32() * TAU;
        let velocity = 0.02 + rng.f32() * 0.08;
        let hue_shift = (rng.f32() - 0.5) * 60.0 * s.complexity;
        let phase = rng.f32() * TAU;

        let travel = velocity * ctx.t * s.particle.speed;
        let wobble = s.turbulence * 0.02 * (ctx.t * 2.0 + phase).sin();
        let x = (x0 + heading.cos() * travel + wobble).rem_euclid(1.0) * w;
        let y = (y0 + heading.sin() * travel + s.flow * 0.05 * ctx.t).rem_euclid(1.0) * h;

        let tint = hsv(base_hue + hue_shift, 0.6, 1.0);
        let color = shade(ctx, tint, 0.6 + 0.4 * (ctx.t + phase).sin().abs());
        disc(&mut frame, x, y, radius * ctx.energy.min(2.0), color);
    }
    frame
}

pub(crate) fn geometric(ctx: &RenderContext<'_>) -> Frame {
    let s = ctx.settings;
    let mut frame = Frame::new(ctx.width, ctx.height);
    let unit = ctx.width.min(ctx.height).max(1) as f32;
    let cell = (unit / 4.0 * s.geometry.size).max(2.0);
    let sides = polygon_sides(s.geometry.kind, s.complexity);
    let base_hue = hue_of(ctx.color);
    let (ox, oy) = (ctx.width as f32 * 0.5, ctx.height as f32 * 0.5);

    for y in 0..ctx.height {
        for x in 0..ctx.width {
            let gx = (x as f32 + 0.5 - ox) / cell + 0.5;
            let gy = (y as f32 + 0.5 - oy) / cell + 0.5;
            let (ci, cj) = (gx.floor(), gy.floor());
            let dx = (gx - ci - 0.5) * cell;
            let dy = (gy - cj - 0.5) * cell;
            let parity = ((ci + cj) as i64).rem_euclid(2) as f32;
            let pulse = 0.85 + 0.15 * (ctx.t * 2.0 + ci + cj).sin();
            let radius = cell * 0.38 * pulse * ctx.energy.min(1.3);
            let rotation = (s.geometry.rotation + ctx.t * 45.0 + parity * s.symmetry * 180.0)
                .to_radians();
            let coverage = shape_coverage(s.geometry.kind, sides, dx, dy, radius, rotation);
            if coverage > 0.0 {
                let tint = hsv(base_hue + (ci + cj) * s.complexity * 20.0, 0.65, 1.0);
                let color = shade(ctx, tint, 0.7 + 0.3 * parity);
                frame.set(x, y, over(frame.get(x, y), color, coverage));
            }
        }
    }
    frame
}

struct Primitive {
    x: f32,
    y: f32,
    radius: f32,
    rotation: f32,
    level: u32,
}

pub(crate) fn fractal(ctx: &RenderContext<'_>) -> Frame {
    let s = ctx.settings;
    let mut frame = Frame::new(ctx.width, ctx.height);
    let unit = ctx.width.min(ctx.height).max(1) as f32;
    let branches = 3 + (s.symmetry * 3.0).round() as u32;
    let spin = (s.fractal.rotation + ctx.t * 20.0).to_radians();

    let mut primitives = vec![Primitive {
        x: ctx.width as f32 * 0.5,
        y: ctx.height as f32 * 0.5,
        radius: unit * 0.3 * s.geometry.size.min(1.5),
        rotation: spin,
        level: 0,
    }];
    let mut cursor = 0;
    while cursor < primitives.len() && primitives.len() < MAX_FRACTAL_PRIMITIVES {
        let parent = &primitives[cursor];
        cursor += 1;
        if parent.level + 1 >= s.fractal.depth {
            continue;
        }
        let child_radius = parent.radius * s.fractal.scale;
        if child_radius < 0.75 {
            continue;
        }
        let (px, py, pr, prot, level) = (parent.x, parent.y, parent.radius, parent.rotation, parent.level);
        for k in 0..branches {
            let angle = prot + k as f32 / branches as f32 * TAU;
            let distance = pr * (1.0 + s.fractal.scale);
            primitives.push(Primitive {
                x: px + angle.cos() * distance,
                y: py + angle.sin() * distance,
                radius: child_radius,
                rotation: prot + spin,
                level: level + 1,
            });
        }
    }

    let sides = polygon_sides(s.geometry.kind, s.complexity);
    let base_hue = hue_of(ctx.color);
    for p in &primitives {
        let tint = hsv(base_hue + p.level as f32 * 25.0, 0.6, 1.0);
        let mut color = shade(ctx, tint, 1.0 - p.level as f32 * 0.08);
        color[3] = (1.0 - p.level as f32 * 0.08).max(0.3);
        let (kind, radius, rotation) = (s.geometry.kind, p.radius, p.rotation);
        stamp(&mut frame, p.x, p.y, radius, color, |dx, dy| {
            shape_coverage(kind, sides, dx, dy, radius, rotation)
        });
    }
    frame
}

pub(crate) fn galaxy(ctx: &RenderContext<'_>, field: &NoiseField) -> Frame {
    let s = ctx.settings;
    let mut frame = Frame::new(ctx.width, ctx.height);
    let arms = 2.0 + (s.symmetry * 3.0).round();
    let twist = 4.0 + s.complexity * 6.0;

    for y in 0..ctx.height {
        for x in 0..ctx.width {
            let (nx, ny) = centred(ctx, x, y);
            let (nx, ny) = (nx / s.size, ny / s.size);
            let r = nx.hypot(ny);
            let a = ny.atan2(nx);
            let arm = (0.5 + 0.5 * (arms * a - r * twist + ctx.t * 0.3).cos()).powi(3);
            let dust = field.fbm01(nx * 4.0, ny * 4.0, ctx.t * 0.05, 3);
            let core = (-r * 6.0).exp();
            let density = (core + arm * (-r * 2.5).exp() * (0.5 + s.turbulence * dust)).clamp(0.0, 1.0);
            frame.set(x, y, shade(ctx, ctx.color, density));
        }
    }

    let mut rng = fastrand::Rng::with_seed(u64::from(s.pattern_seed()));
    let unit = ctx.width.min(ctx.height).max(1) as f32 * s.size;
    let stars = 50 + (s.complexity * 250.0) as u32;
    for _ in 0..stars {
        let radius = rng.f32().powi(2) * 0.7;
        let arm = rng.u32(0..arms as u32) as f32;
        let scatter = (rng.f32() - 0.5) * 0.6;
        let phase = rng.f32() * TAU;
        let orbit = ctx.t * 0.2 / (radius + 0.2);
        let angle = arm / arms * TAU + radius * twist / arms + scatter + orbit;
        let cx = ctx.width as f32 * 0.5 + angle.cos() * radius * unit;
        let cy = ctx.height as f32 * 0.5 + angle.sin() * radius * unit;
        let twinkle = 0.5 + 0.5 * (ctx.t * 3.0 + phase).sin();
        let color = [1.0, 1.0, 0.95, 0.4 + 0.6 * twinkle];
        disc(&mut frame, cx, cy, 0.6, color);
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_cover_their_centre() {
        for kind in [
            GeometryType::Triangles,
            GeometryType::Squares,
            GeometryType::Circles,
            GeometryType::Hexagons,
            GeometryType::Stars,
            GeometryType::Polygons,
        ] {
            let sides = polygon_sides(kind, 0.5);
            assert_eq!(shape_coverage(kind, sides, 0.0, 0.0, 10.0, 0.3), 1.0, "{kind:?}");
            assert_eq!(shape_coverage(kind, sides, 30.0, 0.0, 10.0, 0.3), 0.0, "{kind:?}");
        }
    }

    #[test]
    fn square_corner_is_inside_but_circle_misses_it() {
        let corner = (6.5, 6.5);
        let rotation = 45f32.to_radians();
        let square = shape_coverage(GeometryType::Squares, 4, corner.0, corner.1, 10.0, rotation);
        let circle = shape_coverage(GeometryType::Circles, 0, corner.0, corner.1, 8.0, 0.0);
        assert!(square > 0.9);
        assert_eq!(circle, 0.0);
    }

    #[test]
    fn over_keeps_channels_in_range() {
        let out = over([1.0, 1.0, 1.0, 1.0], [1.0, 0.0, 0.0, 1.0], 0.5);
        assert_eq!(out, [1.0, 0.5, 0.5, 1.0]);
    }
}
