//! Layer blending and whole-output transitions.

use crate::{
    frame::{Frame, BLACK, TRANSPARENT},
    layers::BlendMode,
    EffectParameterSet, TransitionBlend,
};

mod passes;

pub use passes::apply_effects;

/// A layer frame ready to blend: effects and layer transition already
/// applied, sized to the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFrame {
    pub frame: Frame,
    pub blend_mode: BlendMode,
    pub opacity: f32,
}

/// Blends `src` onto `dst` in place. Per channel
/// `dst = mix(dst, blend(dst, src), opacity * src_alpha)`.
pub fn blend_onto(dst: &mut Frame, src: &Frame, mode: BlendMode, opacity: f32) {
    let opacity = if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if opacity <= 0.0 || !dst.same_size(src) {
        return;
    }
    for (d, s) in dst.pixels_mut().iter_mut().zip(src.pixels()) {
        let a = opacity * s[3];
        if a <= 0.0 {
            continue;
        }
        for i in 0..3 {
            let blended = mode.apply(d[i], s[i]);
            d[i] = (d[i] + (blended - d[i]) * a).clamp(0.0, 1.0);
        }
    }
}

/// Moves, scales, rotates and wipes a frame per a transition blend.
/// Uncovered pixels become `fill`.
fn apply_spatial(frame: &Frame, blend: &TransitionBlend, fill: [f32; 4]) -> Frame {
    if !blend.is_spatial() {
        return frame.clone();
    }
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    if blend.scale <= 1e-4 || !blend.scale.is_finite() {
        return Frame::filled(frame.width(), frame.height(), fill);
    }
    let (cx, cy) = (w * 0.5, h * 0.5);
    let (s, c) = (-blend.rotation.to_radians()).sin_cos();
    let reveal_edge = blend.reveal.clamp(0.0, 1.0) * w;
    frame.remap(|src, x, y| {
        if x as f32 + 0.5 > reveal_edge {
            return fill;
        }
        let px = (x as f32 + 0.5 - cx - blend.offset_x * w) / blend.scale;
        let py = (y as f32 + 0.5 - cy) / blend.scale;
        let (rx, ry) = (px * c - py * s, px * s + py * c);
        let sample = src.sample_or_clear(cx + rx, cy + ry);
        if sample[3] <= 0.0 {
            fill
        } else {
            sample
        }
    })
}

/// Owns the canvas size and turns layer frames into one output frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compositor {
    width: u32,
    height: u32,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    /// Prepares a source frame for blending: applies `effects` (with the
    /// transition's effect ramp on top) then the transition's spatial part.
    pub fn render_layer(
        &self,
        source: Frame,
        effects: &EffectParameterSet,
        blend: &TransitionBlend,
        time: f32,
    ) -> Frame {
        let source = if source.width() == self.width && source.height() == self.height {
            source
        } else {
            source.resized(self.width, self.height)
        };
        let mut effects = effects.clone();
        blend.apply_ramp(&mut effects);
        let frame = apply_effects(source, &effects, time);
        apply_spatial(&frame, blend, TRANSPARENT)
    }

    /// Blends layers bottom to top over opaque black.
    pub fn composite(&self, layers: &[LayerFrame]) -> Frame {
        let mut out = Frame::filled(self.width, self.height, BLACK);
        for layer in layers {
            if layer.frame.same_size(&out) {
                blend_onto(&mut out, &layer.frame, layer.blend_mode, layer.opacity);
            } else {
                let resized = layer.frame.resized(self.width, self.height);
                blend_onto(&mut out, &resized, layer.blend_mode, layer.opacity);
            }
        }
        out
    }

    /// Applies the master transition to a composited frame.
    pub fn apply_master(&self, frame: Frame, blend: &TransitionBlend, time: f32) -> Frame {
        if blend.is_identity() {
            return frame;
        }
        let mut effects = EffectParameterSet::default();
        blend.apply_ramp(&mut effects);
        let frame = apply_effects(frame, &effects, time);
        let mut frame = apply_spatial(&frame, blend, BLACK);
        let opacity = blend.opacity.clamp(0.0, 1.0);
        if opacity < 1.0 {
            for px in frame.pixels_mut() {
                for channel in px.iter_mut().take(3) {
                    *channel *= opacity;
                }
                px[3] = 1.0;
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransitionKind;

    fn solid(color: [f32; 4]) -> Frame {
        Frame::filled(4, 4, color)
    }

    fn layer(color: [f32; 4], blend_mode: BlendMode, opacity: f32) -> LayerFrame {
        LayerFrame {
            frame: solid(color),
            blend_mode,
            opacity,
        }
    }

    #[test]
    fn empty_stack_is_opaque_black() {
        let out = Compositor::new(4, 4).composite(&[]);
        assert!(out.pixels().iter().all(|px| *px == BLACK));
    }

    #[test]
    fn normal_blend_mixes_by_opacity_and_alpha() {
        let compositor = Compositor::new(4, 4);
        let out = compositor.composite(&[layer([1.0, 1.0, 1.0, 0.5], BlendMode::Normal, 0.5)]);
        assert_eq!(out.get(0, 0), [0.25, 0.25, 0.25, 1.0]);
    }

    #[test]
    fn multiply_over_white_equals_source() {
        let compositor = Compositor::new(4, 4);
        let out = compositor.composite(&[
            layer([1.0, 1.0, 1.0, 1.0], BlendMode::Normal, 1.0),
            layer([0.5, 0.25, 1.0, 1.0], BlendMode::Multiply, 1.0),
        ]);
        assert_eq!(out.get(2, 2), [0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn zero_opacity_layer_changes_nothing() {
        let compositor = Compositor::new(4, 4);
        let base = [layer([0.3, 0.6, 0.9, 1.0], BlendMode::Normal, 1.0)];
        let with_ghost = [
            layer([0.3, 0.6, 0.9, 1.0], BlendMode::Normal, 1.0),
            layer([1.0, 0.0, 0.0, 1.0], BlendMode::Difference, 0.0),
        ];
        assert_eq!(compositor.composite(&base), compositor.composite(&with_ghost));
    }

    #[test]
    fn identity_master_is_a_no_op() {
        let compositor = Compositor::new(4, 4);
        let frame = solid([0.2, 0.4, 0.6, 1.0]);
        let out = compositor.apply_master(frame.clone(), &TransitionBlend::identity(), 0.0);
        assert_eq!(out, frame);
    }

    #[test]
    fn fade_master_darkens_toward_black() {
        let compositor = Compositor::new(4, 4);
        let out = compositor.apply_master(
            solid([1.0, 1.0, 1.0, 1.0]),
            &TransitionKind::Fade.blend(0.25),
            0.0,
        );
        assert_eq!(out.get(1, 1), [0.25, 0.25, 0.25, 1.0]);
    }

    #[test]
    fn wipe_hides_columns_past_the_edge() {
        let compositor = Compositor::new(4, 4);
        let out = compositor.render_layer(
            solid([1.0, 0.0, 0.0, 1.0]),
            &EffectParameterSet::default(),
            &TransitionKind::Wipe.blend(0.5),
            0.0,
        );
        assert_eq!(out.get(0, 0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(out.get(3, 0), TRANSPARENT);
    }

    #[test]
    fn render_layer_resizes_sources() {
        let compositor = Compositor::new(4, 4);
        let out = compositor.render_layer(
            Frame::filled(2, 2, [0.0, 1.0, 0.0, 1.0]),
            &EffectParameterSet::default(),
            &TransitionBlend::identity(),
            0.0,
        );
        assert_eq!((out.width(), out.height()), (4, 4));
    }
}
