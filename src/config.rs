//! Context-wide settings.

use crate::sampler::TexturePreset;

/// Settings fixed when a [`GpuContext`](crate::GpuContext) is created.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContextConfig {
    /// Skip bind calls that would not change the driver's binding.
    ///
    /// Turn this off when other code issues raw GL binds on the same context
    /// without calling [`GpuContext::invalidate_bindings`](crate::GpuContext::invalidate_bindings).
    pub cache_bindings: bool,

    /// Poll `glGetError` after uploads and allocations.
    pub check_errors: bool,

    /// Sampler applied to textures created without an explicit one.
    pub default_sampler: TexturePreset,

    /// Upper bound on anisotropic filtering requested by samplers.
    pub max_anisotropy: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_bindings: true,
            check_errors: cfg!(debug_assertions),
            default_sampler: TexturePreset::LinearClamp,
            max_anisotropy: 1.0,
        }
    }
}

impl ContextConfig {
    /// Set [`cache_bindings`](Self::cache_bindings).
    #[must_use]
    pub fn with_binding_cache(mut self, enabled: bool) -> Self {
        self.cache_bindings = enabled;
        self
    }

    /// Set [`check_errors`](Self::check_errors).
    #[must_use]
    pub fn with_error_checks(mut self, enabled: bool) -> Self {
        self.check_errors = enabled;
        self
    }

    /// Set [`default_sampler`](Self::default_sampler).
    #[must_use]
    pub fn with_default_sampler(mut self, preset: TexturePreset) -> Self {
        self.default_sampler = preset;
        self
    }

    /// Set [`max_anisotropy`](Self::max_anisotropy), clamped to at least 1.
    #[must_use]
    pub fn with_max_anisotropy(mut self, level: f32) -> Self {
        self.max_anisotropy = level.max(1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ContextConfig::default();
        assert!(config.cache_bindings);
        assert_eq!(config.check_errors, cfg!(debug_assertions));
        assert_eq!(config.default_sampler, TexturePreset::LinearClamp);
        assert!((config.max_anisotropy - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn builder_clamps_anisotropy() {
        let config = ContextConfig::default()
            .with_binding_cache(false)
            .with_error_checks(true)
            .with_max_anisotropy(0.25);
        assert!(!config.cache_bindings);
        assert!(config.check_errors);
        assert!((config.max_anisotropy - 1.0).abs() < f32::EPSILON);
    }
}
