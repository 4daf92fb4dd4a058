use super::Color;

/// How a source fragment is combined with the pixel already in the target.
///
/// All modes operate on premultiplied colors. Only `Additive` is commutative;
/// draw order matters for the rest.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Source replaces destination, alpha included.
    #[default]
    Opaque,
    /// Premultiplied source-over.
    Alpha,
    /// Saturating add.
    Additive,
    /// Premultiplied multiply; transparent regions keep the other operand.
    Multiply,
}

impl BlendMode {
    pub fn apply(self, src: Color, dst: Color) -> Color {
        match self {
            BlendMode::Opaque => src,
            BlendMode::Alpha => {
                let k = 1.0 - src.a;
                Color::from_premul(
                    src.r + dst.r * k,
                    src.g + dst.g * k,
                    src.b + dst.b * k,
                    src.a + dst.a * k,
                )
            }
            BlendMode::Additive => Color::from_premul(
                (src.r + dst.r).min(1.0),
                (src.g + dst.g).min(1.0),
                (src.b + dst.b).min(1.0),
                (src.a + dst.a).min(1.0),
            ),
            BlendMode::Multiply => {
                let ks = 1.0 - src.a;
                let kd = 1.0 - dst.a;
                let ch = |s: f32, d: f32| s * d + s * kd + d * ks;
                Color::from_premul(
                    ch(src.r, dst.r),
                    ch(src.g, dst.g),
                    ch(src.b, dst.b),
                    src.a + dst.a * ks,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::from_premul(1.0, 0.0, 0.0, 1.0);
    const HALF_BLUE: Color = Color::from_premul(0.0, 0.0, 0.5, 0.5);

    #[test]
    fn opaque_replaces() {
        assert_eq!(BlendMode::Opaque.apply(HALF_BLUE, RED), HALF_BLUE);
    }

    #[test]
    fn alpha_is_source_over() {
        let out = BlendMode::Alpha.apply(HALF_BLUE, RED);
        assert_eq!(out, Color::from_premul(0.5, 0.0, 0.5, 1.0));
    }

    #[test]
    fn alpha_is_order_sensitive() {
        let a = BlendMode::Alpha.apply(HALF_BLUE, RED);
        let b = BlendMode::Alpha.apply(RED, HALF_BLUE);
        assert_ne!(a, b);
    }

    #[test]
    fn additive_saturates() {
        let out = BlendMode::Additive.apply(RED, RED);
        assert_eq!(out, RED);
    }

    #[test]
    fn multiply_with_white_is_identity() {
        let out = BlendMode::Multiply.apply(Color::WHITE, RED);
        assert_eq!(out, RED);
    }

    #[test]
    fn multiply_over_transparent_keeps_source() {
        let out = BlendMode::Multiply.apply(RED, Color::TRANSPARENT);
        assert_eq!(out, RED);
    }
}
