/* Layer-level blend modes applied by the animation compositor (§4.8), each
 * operating channel-wise in linear float space on the source/destination
 * RGB triples. Alpha compositing itself (`RgbaF::over`) is a separate,
 * per-pixel concern handled by `crate::color`. */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Normal,
    Screen,
    Multiply,
    Addition,
    Subtract,
    LightenOnly,
    DarkenOnly,
    SoftLight,
    HardLight,
    Dodge,
    Difference,
    GrainExtract,
    GrainMerge,
    Divide,
}

impl BlendMode {
    fn channel(self, src: f32, dst: f32) -> f32 {
        match self {
            BlendMode::Normal => src,
            BlendMode::Screen => 1.0 - (1.0 - src) * (1.0 - dst),
            BlendMode::Multiply => src * dst,
            BlendMode::Addition => src + dst,
            BlendMode::Subtract => dst - src,
            BlendMode::LightenOnly => src.max(dst),
            BlendMode::DarkenOnly => src.min(dst),
            BlendMode::SoftLight => {
                if src <= 0.5 {
                    dst - (1.0 - 2.0 * src) * dst * (1.0 - dst)
                } else {
                    let d = if dst <= 0.25 {
                        ((16.0 * dst - 12.0) * dst + 4.0) * dst
                    } else {
                        dst.sqrt()
                    };
                    dst + (2.0 * src - 1.0) * (d - dst)
                }
            }
            BlendMode::HardLight => {
                if src <= 0.5 {
                    2.0 * src * dst
                } else {
                    1.0 - 2.0 * (1.0 - src) * (1.0 - dst)
                }
            }
            BlendMode::Dodge => {
                if src >= 1.0 {
                    1.0
                } else {
                    (dst / (1.0 - src)).min(1.0)
                }
            }
            BlendMode::Difference => (src - dst).abs(),
            BlendMode::GrainExtract => dst - src + 0.5,
            BlendMode::GrainMerge => dst + src - 0.5,
            BlendMode::Divide => {
                if src <= 0.0 {
                    1.0
                } else {
                    (dst / src).min(1.0)
                }
            }
        }
    }

    /// Blend `src` over `dst`, both RGB-only, then clamp to `[0,1]`.
    pub fn apply(self, src: (f32, f32, f32), dst: (f32, f32, f32)) -> (f32, f32, f32) {
        (
            self.channel(src.0, dst.0).clamp(0.0, 1.0),
            self.channel(src.1, dst.1).clamp(0.0, 1.0),
            self.channel(src.2, dst.2).clamp(0.0, 1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_is_identity_on_black_destination() {
        let out = BlendMode::Screen.apply((0.5, 0.2, 0.9), (0.0, 0.0, 0.0));
        assert_eq!(out, (0.5, 0.2, 0.9));
    }

    #[test]
    fn multiply_with_white_source_is_identity() {
        let out = BlendMode::Multiply.apply((1.0, 1.0, 1.0), (0.3, 0.4, 0.5));
        assert_eq!(out, (0.3, 0.4, 0.5));
    }

    #[test]
    fn difference_is_symmetric() {
        let a = BlendMode::Difference.apply((0.2, 0.0, 0.0), (0.8, 0.0, 0.0));
        let b = BlendMode::Difference.apply((0.8, 0.0, 0.0), (0.2, 0.0, 0.0));
        assert_eq!(a, b);
    }
}
