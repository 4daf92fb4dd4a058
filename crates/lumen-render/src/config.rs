use crate::paint::{BlendMode, Color};

/// Baseline backend state applied when a context is activated.
///
/// New render targets also start from these settings.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ContextDefaults {
    /// Color used by `Renderer::clear`.
    pub clear_color: Color,

    /// Blend mode applied to draws that carry no override.
    pub blend_mode: BlendMode,

    /// Whether out-of-range texture sampling wraps (`true`) or clamps (`false`).
    pub wrapped: bool,
}

impl Default for ContextDefaults {
    fn default() -> Self {
        Self {
            clear_color: Color::BLACK,
            blend_mode: BlendMode::Opaque,
            wrapped: false,
        }
    }
}

/// Context manager configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    pub defaults: ContextDefaults,

    /// Make the first initialized context current automatically.
    ///
    /// Keeps the single-window case free of an explicit `make_current` call.
    pub activate_first_context: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            defaults: ContextDefaults::default(),
            activate_first_context: true,
        }
    }
}
