//! CPU effect passes, one function per effect group.
//!
//! Each pass is skipped when its fields are neutral. Visual fidelity is
//! approximate; the parameter semantics and the group order are what
//! matter.

use std::f32::consts::{PI, TAU};

use crate::{
    frame::{lerp, luma, Frame, Rgba},
    generative::hash2,
    EffectParameterSet,
};

/// Runs every group in compositor order: color, distortion, mask, special,
/// transform.
pub fn apply_effects(frame: Frame, fx: &EffectParameterSet, time: f32) -> Frame {
    let frame = color(frame, fx);
    let frame = distortion(frame, fx, time);
    let frame = mask(frame, fx);
    let frame = special(frame, fx, time);
    transform(frame, fx)
}

fn clamp_rgb(mut px: Rgba) -> Rgba {
    for channel in px.iter_mut() {
        *channel = if channel.is_finite() {
            channel.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
    px
}

fn mix_rgb(a: Rgba, b: [f32; 3], t: f32) -> Rgba {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
        a[3],
    ]
}

pub(crate) fn box_blur(frame: &Frame, radius: u32) -> Frame {
    if radius == 0 {
        return frame.clone();
    }
    let r = radius as i64;
    let pass = |src: &Frame, horizontal: bool| {
        src.remap(|f, x, y| {
            let mut sum = [0.0f32; 4];
            let mut n = 0.0;
            for k in -r..=r {
                let (sx, sy) = if horizontal {
                    (x as i64 + k, y as i64)
                } else {
                    (x as i64, y as i64 + k)
                };
                let px = f.sample(sx as f32, sy as f32);
                for (acc, v) in sum.iter_mut().zip(px) {
                    *acc += v;
                }
                n += 1.0;
            }
            sum.map(|v| v / n)
        })
    };
    let horizontal = pass(frame, true);
    pass(&horizontal, false)
}

fn hue_rotate(px: Rgba, degrees: f32) -> Rgba {
    let (s, c) = degrees.to_radians().sin_cos();
    let [r, g, b, a] = px;
    [
        (0.213 + 0.787 * c - 0.213 * s) * r
            + (0.715 - 0.715 * c - 0.715 * s) * g
            + (0.072 - 0.072 * c + 0.928 * s) * b,
        (0.213 - 0.213 * c + 0.143 * s) * r
            + (0.715 + 0.285 * c + 0.140 * s) * g
            + (0.072 - 0.072 * c - 0.283 * s) * b,
        (0.213 - 0.213 * c - 0.787 * s) * r
            + (0.715 - 0.715 * c + 0.715 * s) * g
            + (0.072 + 0.928 * c + 0.072 * s) * b,
        a,
    ]
}

fn color(frame: Frame, fx: &EffectParameterSet) -> Frame {
    if fx.color_is_neutral() {
        return frame;
    }
    let mut frame = box_blur(&frame, (fx.blur * 8.0).round() as u32);
    let inv_gamma = 1.0 / fx.gamma.max(0.1);
    for px in frame.pixels_mut() {
        let mut c = *px;
        for channel in c.iter_mut().take(3) {
            *channel = (*channel * fx.brightness - 0.5) * fx.contrast + 0.5;
        }
        let l = luma(c);
        c = mix_rgb(c, [l, l, l], 1.0 - fx.saturation);
        if fx.hue != 0.0 {
            c = hue_rotate(c, fx.hue);
        }
        if fx.grayscale > 0.0 {
            let l = luma(c);
            c = mix_rgb(c, [l, l, l], fx.grayscale);
        }
        if fx.sepia > 0.0 {
            let [r, g, b, _] = c;
            let tone = [
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            ];
            c = mix_rgb(c, tone, fx.sepia);
        }
        if fx.invert > 0.0 {
            c = mix_rgb(c, [1.0 - c[0], 1.0 - c[1], 1.0 - c[2]], fx.invert);
        }
        c = clamp_rgb(c);
        for channel in c.iter_mut().take(3) {
            *channel = channel.powf(inv_gamma);
        }
        *px = c;
    }
    frame
}

fn distortion(frame: Frame, fx: &EffectParameterSet, time: f32) -> Frame {
    if fx.distortion == 0.0 && fx.wave == 0.0 && fx.ripple == 0.0 && fx.twirl == 0.0 {
        return frame;
    }
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    let (cx, cy) = (w * 0.5, h * 0.5);
    let half = cx.min(cy).max(1.0);
    frame.remap(|src, x, y| {
        let mut u = (x as f32 + 0.5 - cx) / half;
        let mut v = (y as f32 + 0.5 - cy) / half;

        if fx.distortion > 0.0 {
            let factor = 1.0 + fx.distortion * 0.5 * (u * u + v * v);
            u *= factor;
            v *= factor;
        }
        if fx.twirl > 0.0 {
            let r = u.hypot(v);
            if r < 1.0 {
                let angle = fx.twirl * PI * (1.0 - r);
                let (s, c) = angle.sin_cos();
                (u, v) = (u * c - v * s, u * s + v * c);
            }
        }
        if fx.ripple > 0.0 {
            let r = u.hypot(v).max(1e-4);
            let push = fx.ripple * 0.06 * (r * 30.0 - time * 6.0).sin();
            u += u / r * push;
            v += v / r * push;
        }
        if fx.wave > 0.0 {
            u += fx.wave * 0.1 * (v * 6.0 + time * 4.0).sin();
        }

        src.sample(cx + u * half, cy + v * half)
    })
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mask(frame: Frame, fx: &EffectParameterSet) -> Frame {
    if fx.vignette == 0.0 && fx.radial_blur == 0.0 && fx.edge_detection == 0.0 {
        return frame;
    }
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    let (cx, cy) = (w * 0.5, h * 0.5);
    let half = cx.min(cy).max(1.0);

    let mut frame = if fx.radial_blur > 0.0 {
        frame.remap(|src, x, y| {
            let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
            let mut sum = [0.0f32; 4];
            const TAPS: usize = 6;
            for k in 0..TAPS {
                let scale = 1.0 - fx.radial_blur * 0.1 * k as f32 / TAPS as f32;
                let px = src.sample(cx + dx * scale, cy + dy * scale);
                for (acc, v) in sum.iter_mut().zip(px) {
                    *acc += v / TAPS as f32;
                }
            }
            sum
        })
    } else {
        frame
    };

    if fx.edge_detection > 0.0 {
        frame = frame.remap(|src, x, y| {
            let at = |ox: i64, oy: i64| luma(src.sample((x as i64 + ox) as f32, (y as i64 + oy) as f32));
            let gx = -at(-1, -1) - 2.0 * at(-1, 0) - at(-1, 1) + at(1, -1) + 2.0 * at(1, 0) + at(1, 1);
            let gy = -at(-1, -1) - 2.0 * at(0, -1) - at(1, -1) + at(-1, 1) + 2.0 * at(0, 1) + at(1, 1);
            let edge = gx.hypot(gy).min(1.0);
            mix_rgb(src.get(x, y), [edge, edge, edge], fx.edge_detection)
        });
    }

    if fx.vignette > 0.0 {
        let (width, height) = (frame.width(), frame.height());
        for y in 0..height {
            for x in 0..width {
                let r = (x as f32 + 0.5 - cx).hypot(y as f32 + 0.5 - cy) / half;
                let shade = 1.0 - fx.vignette * smoothstep(0.4, 1.4, r);
                let mut px = frame.get(x, y);
                for channel in px.iter_mut().take(3) {
                    *channel *= shade;
                }
                frame.set(x, y, px);
            }
        }
    }
    frame
}

fn special(frame: Frame, fx: &EffectParameterSet, time: f32) -> Frame {
    let block = fx.pixelate.round().max(1.0);
    if fx.glitch == 0.0
        && fx.scanlines == 0.0
        && fx.crt == 0.0
        && fx.kaleidoscope == 0.0
        && fx.noise == 0.0
        && block <= 1.0
    {
        return frame;
    }
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    let (cx, cy) = (w * 0.5, h * 0.5);
    let half = cx.min(cy).max(1.0);
    let step = (time * 10.0).floor() as i32;
    let grain_step = (time * 30.0).floor() as i32;

    frame.remap(|src, x, y| {
        let (mut sx, mut sy) = (x as f32 + 0.5, y as f32 + 0.5);

        if block > 1.0 {
            sx = (sx / block).floor() * block + block * 0.5;
            sy = (sy / block).floor() * block + block * 0.5;
        }
        if fx.crt > 0.0 {
            let (u, v) = ((sx - cx) / half, (sy - cy) / half);
            let bend = 1.0 + fx.crt * 0.2 * (u * u + v * v);
            sx = cx + u * bend * half;
            sy = cy + v * bend * half;
        }

        let mut px = src.sample(sx, sy);

        if fx.kaleidoscope > 0.0 {
            let segment = TAU / 6.0;
            let (u, v) = (sx - cx, sy - cy);
            let r = u.hypot(v);
            let mut a = v.atan2(u).rem_euclid(segment);
            if a > segment * 0.5 {
                a = segment - a;
            }
            let folded = src.sample(cx + r * a.cos(), cy + r * a.sin());
            px = mix_rgb(px, [folded[0], folded[1], folded[2]], fx.kaleidoscope);
        }
        if fx.glitch > 0.0 {
            let band = (sy / (h / 16.0).max(1.0)).floor() as i32;
            let roll = hash2(band, step, 0x9e37);
            let shift = if roll < fx.glitch * 0.5 {
                (hash2(step, band, 0x51ed) - 0.5) * fx.glitch * 0.2 * w
            } else {
                0.0
            };
            let split = fx.glitch * 4.0;
            let red = src.sample(sx + shift + split, sy)[0];
            let blue = src.sample(sx + shift - split, sy)[2];
            let mid = src.sample(sx + shift, sy);
            px = [red, mid[1], blue, mid[3].max(px[3])];
        }
        if fx.noise > 0.0 {
            let grain = (hash2(x as i32, y as i32, grain_step as u32) - 0.5) * fx.noise * 0.5;
            for channel in px.iter_mut().take(3) {
                *channel += grain;
            }
        }
        if fx.scanlines > 0.0 && y % 2 == 1 {
            for channel in px.iter_mut().take(3) {
                *channel *= 1.0 - fx.scanlines * 0.5;
            }
        }
        if fx.crt > 0.0 && y % 3 == 0 {
            for channel in px.iter_mut().take(3) {
                *channel *= 1.0 - fx.crt * 0.15;
            }
        }
        clamp_rgb(px)
    })
}

fn transform(frame: Frame, fx: &EffectParameterSet) -> Frame {
    let moves = fx.rotate != 0.0
        || fx.zoom_in != 0.0
        || fx.slide_in != 0.0
        || fx.mirror
        || fx.flip_h
        || fx.flip_v;
    let mut frame = if moves {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let (cx, cy) = (w * 0.5, h * 0.5);
        let zoom = 1.0 + fx.zoom_in;
        let (s, c) = (-fx.rotate.to_radians()).sin_cos();
        frame.remap(|src, x, y| {
            let mut px = x as f32 + 0.5 - cx;
            let mut py = y as f32 + 0.5 - cy;
            if fx.mirror && px > 0.0 {
                px = -px;
            }
            if fx.flip_h {
                px = -px;
            }
            if fx.flip_v {
                py = -py;
            }
            px -= fx.slide_in * w;
            px /= zoom;
            py /= zoom;
            let (rx, ry) = (px * c - py * s, px * s + py * c);
            src.sample_or_clear(cx + rx, cy + ry)
        })
    } else {
        frame
    };
    if fx.fade_in > 0.0 {
        for px in frame.pixels_mut() {
            px[3] *= 1.0 - fx.fade_in;
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EffectField;

    fn gradient(w: u32, h: u32) -> Frame {
        let mut frame = Frame::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = x as f32 / (w - 1) as f32;
                frame.set(x, y, [v, 0.5, 1.0 - v, 1.0]);
            }
        }
        frame
    }

    #[test]
    fn neutral_effects_leave_frames_untouched() {
        let frame = gradient(8, 6);
        let out = apply_effects(frame.clone(), &EffectParameterSet::default(), 1.0);
        assert_eq!(out, frame);
    }

    #[test]
    fn every_single_effect_keeps_channels_in_range() {
        let frame = gradient(10, 8);
        for field in EffectField::ALL {
            let mut fx = EffectParameterSet::default();
            fx.set(*field, 1e6);
            let out = apply_effects(frame.clone(), &fx, 0.7);
            assert!(out.same_size(&frame));
            assert!(
                out.pixels()
                    .iter()
                    .all(|px| px.iter().all(|c| c.is_finite() && (0.0..=1.0).contains(c))),
                "{field:?}"
            );
        }
    }

    #[test]
    fn invert_flips_colors() {
        let frame = Frame::filled(2, 2, [0.2, 0.4, 0.6, 1.0]);
        let fx = EffectParameterSet {
            invert: 1.0,
            ..Default::default()
        };
        let out = apply_effects(frame, &fx, 0.0);
        let px = out.get(0, 0);
        assert!((px[0] - 0.8).abs() < 1e-5 && (px[2] - 0.4).abs() < 1e-5);
    }

    #[test]
    fn flip_h_mirrors_columns() {
        let frame = gradient(4, 1);
        let fx = EffectParameterSet {
            flip_h: true,
            ..Default::default()
        };
        let out = apply_effects(frame.clone(), &fx, 0.0);
        assert_eq!(out.get(0, 0), frame.get(3, 0));
        assert_eq!(out.get(3, 0), frame.get(0, 0));
    }

    #[test]
    fn fade_in_scales_alpha() {
        let fx = EffectParameterSet {
            fade_in: 0.25,
            ..Default::default()
        };
        let out = apply_effects(Frame::filled(2, 2, [1.0, 1.0, 1.0, 1.0]), &fx, 0.0);
        assert_eq!(out.get(1, 1)[3], 0.75);
    }

    #[test]
    fn pixelate_makes_blocks() {
        let frame = gradient(8, 2);
        let fx = EffectParameterSet {
            pixelate: 4.0,
            ..Default::default()
        };
        let out = apply_effects(frame, &fx, 0.0);
        assert_eq!(out.get(0, 0), out.get(3, 0));
        assert_ne!(out.get(3, 0), out.get(4, 0));
    }
}
