use serde::{Deserialize, Serialize};

const BACK_C1: f32 = 1.701_58;
const BACK_C3: f32 = BACK_C1 + 1.0;
const ELASTIC_C4: f32 = std::f32::consts::TAU / 3.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
    Bounce,
    Elastic,
    Back,
}

impl Easing {
    pub const ALL: [Easing; 7] = [
        Self::Linear,
        Self::EaseIn,
        Self::EaseOut,
        Self::EaseInOut,
        Self::Bounce,
        Self::Elastic,
        Self::Back,
    ];

    /// Maps progress in `[0, 1]` to eased progress. Endpoints are exact for
    /// every curve; `Elastic` and `Back` overshoot in between.
    pub fn apply(self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::Bounce => bounce_out(t),
            Self::Elastic => 2f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * ELASTIC_C4).sin() + 1.0,
            Self::Back => 1.0 + BACK_C3 * (t - 1.0).powi(3) + BACK_C1 * (t - 1.0).powi(2),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "linear" => Some(Self::Linear),
            "ease-in" | "easein" | "in" => Some(Self::EaseIn),
            "ease-out" | "easeout" | "out" => Some(Self::EaseOut),
            "ease-in-out" | "easeinout" | "in-out" => Some(Self::EaseInOut),
            "bounce" => Some(Self::Bounce),
            "elastic" => Some(Self::Elastic),
            "back" => Some(Self::Back),
            _ => None,
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984_375
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact_for_every_curve() {
        for ease in Easing::ALL {
            assert_eq!(ease.apply(0.0), 0.0, "{ease:?}");
            assert_eq!(ease.apply(1.0), 1.0, "{ease:?}");
            assert_eq!(ease.apply(-0.5), 0.0, "{ease:?}");
            assert_eq!(ease.apply(1.5), 1.0, "{ease:?}");
        }
    }

    #[test]
    fn curves_are_nearly_continuous_at_the_ends() {
        for ease in Easing::ALL {
            assert!(ease.apply(1e-4).abs() < 0.05, "{ease:?}");
            assert!((ease.apply(1.0 - 1e-4) - 1.0).abs() < 0.05, "{ease:?}");
        }
    }

    #[test]
    fn shape_sanity() {
        assert!(Easing::EaseIn.apply(0.5) < 0.5);
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
        assert!((Easing::EaseInOut.apply(0.5) - 0.5).abs() < 1e-6);
        assert!(Easing::Back.apply(0.8) > 1.0);
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!(Easing::parse("ease-in-out"), Some(Easing::EaseInOut));
        assert_eq!(Easing::parse("EASE_OUT"), Some(Easing::EaseOut));
        assert_eq!(Easing::parse("wobble"), None);
    }
}
