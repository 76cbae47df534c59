//! Procedural frame sources.
//!
//! A generative layer renders one frame per tick as a pure function of
//! elapsed time and its [`GenerativeSettings`]. Patterns that need
//! stochastic texture draw it from noise and RNG seeded by
//! `settings.seed` and the pattern, so the same seed and time always
//! reproduce the same frame.

use serde::{Deserialize, Serialize};

use crate::{
    effects::wrap_degrees,
    frame::{parse_hex_color, Rgba},
    EffectParameterSet, Frame,
};

mod fields;
mod shapes;

pub(crate) use fields::hash2;

pub const DEFAULT_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pattern {
    #[default]
    Wave,
    Particles,
    Geometric,
    Organic,
    Fractal,
    Spiral,
    Maze,
    Cellular,
    Voronoi,
    Perlin,
    Fire,
    Smoke,
    Water,
    Galaxy,
    Nebula,
}

impl Pattern {
    pub const ALL: [Pattern; 15] = [
        Self::Wave,
        Self::Particles,
        Self::Geometric,
        Self::Organic,
        Self::Fractal,
        Self::Spiral,
        Self::Maze,
        Self::Cellular,
        Self::Voronoi,
        Self::Perlin,
        Self::Fire,
        Self::Smoke,
        Self::Water,
        Self::Galaxy,
        Self::Nebula,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Wave => "wave",
            Self::Particles => "particles",
            Self::Geometric => "geometric",
            Self::Organic => "organic",
            Self::Fractal => "fractal",
            Self::Spiral => "spiral",
            Self::Maze => "maze",
            Self::Cellular => "cellular",
            Self::Voronoi => "voronoi",
            Self::Perlin => "perlin",
            Self::Fire => "fire",
            Self::Smoke => "smoke",
            Self::Water => "water",
            Self::Galaxy => "galaxy",
            Self::Nebula => "nebula",
        }
    }

    /// Resolves a pattern id. Unknown ids fall back to [`Pattern::Wave`].
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .unwrap_or_else(|| {
                tracing::debug!(pattern = name, "unknown pattern, using wave");
                Self::Wave
            })
    }

    /// Patterns whose texture comes from seeded randomness.
    pub fn is_stochastic(self) -> bool {
        matches!(
            self,
            Self::Particles
                | Self::Perlin
                | Self::Fire
                | Self::Smoke
                | Self::Galaxy
                | Self::Nebula
        )
    }

    fn index(self) -> u32 {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0) as u32
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<Pattern> for String {
    fn from(value: Pattern) -> Self {
        value.name().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    #[default]
    Triangles,
    Squares,
    Circles,
    Hexagons,
    Stars,
    Polygons,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub count: u32,
    pub size: u32,
    pub speed: f32,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            count: 100,
            size: 2,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub size: f32,
    pub rotation: f32,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            kind: GeometryType::Triangles,
            size: 1.0,
            rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalSettings {
    pub depth: u32,
    pub scale: f32,
    pub rotation: f32,
}

impl Default for FractalSettings {
    fn default() -> Self {
        Self {
            depth: 3,
            scale: 0.5,
            rotation: 0.0,
        }
    }
}

/// Parameters of a generative layer source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeSettings {
    pub pattern: Pattern,
    pub speed: f32,
    pub intensity: f32,
    pub size: f32,
    pub complexity: f32,
    pub symmetry: f32,
    pub flow: f32,
    pub turbulence: f32,
    pub particle: ParticleSettings,
    pub geometry: GeometrySettings,
    pub fractal: FractalSettings,
    pub color: String,
    pub seed: u32,
}

impl Default for GenerativeSettings {
    fn default() -> Self {
        Self {
            pattern: Pattern::Wave,
            speed: 1.0,
            intensity: 0.5,
            size: 1.0,
            complexity: 0.5,
            symmetry: 0.5,
            flow: 0.5,
            turbulence: 0.3,
            particle: ParticleSettings::default(),
            geometry: GeometrySettings::default(),
            fractal: FractalSettings::default(),
            color: DEFAULT_COLOR.to_string(),
            seed: 0,
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

impl GenerativeSettings {
    /// Clamps every field into its declared range.
    pub fn sanitized(mut self) -> Self {
        self.speed = clamp_finite(self.speed, 0.0, 2.0);
        self.intensity = clamp_finite(self.intensity, 0.0, 1.0);
        self.size = clamp_finite(self.size, 0.1, 3.0);
        self.complexity = clamp_finite(self.complexity, 0.0, 1.0);
        self.symmetry = clamp_finite(self.symmetry, 0.0, 1.0);
        self.flow = clamp_finite(self.flow, 0.0, 1.0);
        self.turbulence = clamp_finite(self.turbulence, 0.0, 1.0);
        self.particle.count = self.particle.count.clamp(10, 500);
        self.particle.size = self.particle.size.clamp(1, 10);
        self.particle.speed = clamp_finite(self.particle.speed, 0.1, 3.0);
        self.geometry.size = clamp_finite(self.geometry.size, 0.1, 3.0);
        self.geometry.rotation = wrap_degrees(self.geometry.rotation);
        self.fractal.depth = self.fractal.depth.clamp(1, 8);
        self.fractal.scale = clamp_finite(self.fractal.scale, 0.1, 1.0);
        self.fractal.rotation = wrap_degrees(self.fractal.rotation);
        if parse_hex_color(&self.color).is_none() {
            self.color = DEFAULT_COLOR.to_string();
        }
        self
    }

    pub fn base_color(&self) -> Rgba {
        parse_hex_color(&self.color)
            .or_else(|| parse_hex_color(DEFAULT_COLOR))
            .unwrap_or([0.39, 0.4, 0.95, 1.0])
    }

    /// Seed mixed with the pattern so two stochastic layers sharing a seed
    /// still differ by pattern.
    pub fn pattern_seed(&self) -> u32 {
        self.seed ^ self.pattern.index().wrapping_mul(0x9E37_79B9)
    }
}

/// Inputs shared by every pattern renderer for one frame.
pub(crate) struct RenderContext<'a> {
    pub settings: &'a GenerativeSettings,
    /// Pattern time: elapsed seconds scaled by `speed`.
    pub t: f32,
    /// Extra drive from the layer's effective effects (reactive scaling
    /// raises it above 1).
    pub energy: f32,
    pub color: Rgba,
    pub width: u32,
    pub height: u32,
}

/// Renders generative frames for one layer.
#[derive(Debug, Clone)]
pub struct GenerativeEngine {
    settings: GenerativeSettings,
    field: Option<fields::NoiseField>,
}

impl GenerativeEngine {
    pub fn new(settings: GenerativeSettings) -> Self {
        Self {
            settings: settings.sanitized(),
            field: None,
        }
    }

    pub fn settings(&self) -> &GenerativeSettings {
        &self.settings
    }

    /// Swaps settings; the seeded noise field is rebuilt lazily if the seed
    /// or pattern changed.
    pub fn set_settings(&mut self, settings: GenerativeSettings) {
        self.settings = settings.sanitized();
        if self
            .field
            .as_ref()
            .map(|f| f.seed() != self.settings.pattern_seed())
            .unwrap_or(false)
        {
            self.field = None;
        }
    }

    /// Produces the frame for `elapsed` seconds of playback.
    pub fn render(
        &mut self,
        elapsed: f32,
        effects: &EffectParameterSet,
        width: u32,
        height: u32,
    ) -> Frame {
        let settings = &self.settings;
        let ctx = RenderContext {
            settings,
            t: elapsed.max(0.0) * settings.speed,
            energy: 1.0 + 0.5 * (effects.distortion + effects.wave),
            color: settings.base_color(),
            width,
            height,
        };

        match settings.pattern {
            Pattern::Particles => shapes::particles(&ctx),
            Pattern::Geometric => shapes::geometric(&ctx),
            Pattern::Fractal => shapes::fractal(&ctx),
            Pattern::Galaxy => {
                let field = self
                    .field
                    .get_or_insert_with(|| fields::NoiseField::new(settings.pattern_seed()));
                shapes::galaxy(&ctx, field)
            }
            pattern => {
                let field = self
                    .field
                    .get_or_insert_with(|| fields::NoiseField::new(settings.pattern_seed()));
                fields::render_field(pattern, &ctx, field)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(settings: GenerativeSettings, time: f32) -> Frame {
        GenerativeEngine::new(settings).render(time, &EffectParameterSet::default(), 24, 18)
    }

    #[test]
    fn unknown_pattern_falls_back_to_wave() {
        assert_eq!(Pattern::from_name("kaleidoplasm"), Pattern::Wave);
        let settings: GenerativeSettings =
            serde_json::from_str(r#"{ "pattern": "kaleidoplasm" }"#).unwrap();
        assert_eq!(settings.pattern, Pattern::Wave);
    }

    #[test]
    fn every_pattern_renders_a_full_frame() {
        for pattern in Pattern::ALL {
            let frame = render(
                GenerativeSettings {
                    pattern,
                    ..Default::default()
                },
                1.25,
            );
            assert_eq!((frame.width(), frame.height()), (24, 18));
            assert!(
                frame.pixels().iter().any(|px| px[3] > 0.0),
                "{pattern:?} produced an empty frame"
            );
            assert!(frame
                .pixels()
                .iter()
                .all(|px| px.iter().all(|c| (0.0..=1.0).contains(c))));
        }
    }

    #[test]
    fn stochastic_patterns_are_reproducible_per_seed() {
        for pattern in Pattern::ALL.into_iter().filter(|p| p.is_stochastic()) {
            let settings = GenerativeSettings {
                pattern,
                seed: 7,
                ..Default::default()
            };
            let a = render(settings.clone(), 2.0);
            let b = render(settings.clone(), 2.0);
            assert_eq!(a, b, "{pattern:?}");

            let other = render(
                GenerativeSettings {
                    seed: 8,
                    ..settings
                },
                2.0,
            );
            assert_ne!(a, other, "{pattern:?} ignores its seed");
        }
    }

    #[test]
    fn time_moves_the_pattern() {
        let settings = GenerativeSettings::default();
        assert_ne!(render(settings.clone(), 0.0), render(settings, 1.0));
    }

    #[test]
    fn zero_speed_freezes_time() {
        let settings = GenerativeSettings {
            speed: 0.0,
            ..Default::default()
        };
        assert_eq!(render(settings.clone(), 0.0), render(settings, 3.0));
    }

    #[test]
    fn sanitizes_ranges() {
        let settings = GenerativeSettings {
            particle: ParticleSettings {
                count: 5_000,
                size: 0,
                speed: 9.0,
            },
            fractal: FractalSettings {
                depth: 12,
                scale: 0.0,
                rotation: 370.0,
            },
            color: "not-a-color".to_string(),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.particle.count, 500);
        assert_eq!(settings.particle.size, 1);
        assert_eq!(settings.particle.speed, 3.0);
        assert_eq!(settings.fractal.depth, 8);
        assert_eq!(settings.fractal.scale, 0.1);
        assert_eq!(settings.fractal.rotation, 10.0);
        assert_eq!(settings.color, DEFAULT_COLOR);
    }
}
