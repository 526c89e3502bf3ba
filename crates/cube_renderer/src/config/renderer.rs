use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Config, ConfigError};

/// How the frame loop paces the CPU against the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameMode {
    /// Host waits on every frame's fence before presenting; one set of uniform buffers
    #[default]
    Blocking,
    /// Two frames in flight with per-frame fences and duplicated uniform buffers
    Pipelined,
}

impl FrameMode {
    /// Number of CPU-side frame slots this mode needs
    pub const fn frames_in_flight(self) -> usize {
        match self {
            Self::Blocking => 1,
            Self::Pipelined => 2,
        }
    }
}

/// # Shader Configuration
///
/// Paths of the SPIR-V blobs paired with the fixed four-set pipeline layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Look for the shaders in the usual build and source locations.
    ///
    /// The first directory holding a file wins; unresolved names fall back to `shaders/`.
    pub fn with_path_resolution(vertex_name: &str, fragment_name: &str) -> Self {
        const SHADER_DIRS: [&str; 5] = [
            "target/shaders/",
            "../target/shaders/",
            "shaders/",
            "resources/shaders/",
            "./",
        ];

        let resolve = |name: &str| {
            SHADER_DIRS
                .iter()
                .map(|dir| format!("{dir}{name}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("shaders/{name}"))
        };

        Self {
            vertex_shader_path: resolve(vertex_name),
            fragment_shader_path: resolve(fragment_name),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("shader not found: {path}")));
            }
        }
        Ok(())
    }
}

/// Find `name` under the texture directories, falling back to `resources/textures/`
pub fn resolve_texture_path(name: &str) -> String {
    const TEXTURE_DIRS: [&str; 3] = ["resources/textures/", "../resources/textures/", "./"];

    TEXTURE_DIRS
        .iter()
        .map(|dir| format!("{dir}{name}"))
        .find(|candidate| Path::new(candidate).exists())
        .unwrap_or_else(|| format!("resources/textures/{name}"))
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("sample-vert.spv", "sample-frag.spv")
    }
}

/// # Renderer Configuration
///
/// Everything the init stages need: window extent, instance/device layer and
/// extension wish lists, asset paths and the frame pacing mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for instance creation and the window title
    pub application_name: String,
    /// Render target width in pixels
    pub width: u32,
    /// Render target height in pixels
    pub height: u32,
    /// Whether to request validation layers; `None` enables them in debug builds
    pub enable_validation: Option<bool>,
    /// Instance layers to enable when the loader reports them
    pub wanted_instance_layers: Vec<String>,
    /// Instance extensions to enable on top of what the window system requires
    pub wanted_instance_extensions: Vec<String>,
    /// Device layers to pass through (ignored by current loaders)
    pub wanted_device_layers: Vec<String>,
    /// Device extensions to enable when the adapter reports them
    pub wanted_device_extensions: Vec<String>,
    /// Texture sampled in display mode 1
    pub texture_path: String,
    /// Frame pacing
    pub frame_mode: FrameMode,
    /// Color the render pass clears to
    pub clear_color: [f32; 4],
    /// Shader configuration (kept last so TOML writes it as a trailing table)
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a configuration with defaults and the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Set the render target extent
    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the texture file
    pub fn with_texture(mut self, path: impl Into<String>) -> Self {
        self.texture_path = path.into();
        self
    }

    /// Select the frame pacing mode
    pub fn with_frame_mode(mut self, mode: FrameMode) -> Self {
        self.frame_mode = mode;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Effective validation setting
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Check values, then the shader files
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render extent must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.texture_path.is_empty() {
            return Err(ConfigError::Invalid("texture path cannot be empty".to_string()));
        }
        self.shaders.validate()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Cube Sample Program".to_string(),
            width: 1024,
            height: 1024,
            enable_validation: None,
            wanted_instance_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            wanted_instance_extensions: vec!["VK_EXT_debug_utils".to_string()],
            wanted_device_layers: Vec::new(),
            wanted_device_extensions: vec!["VK_KHR_swapchain".to_string()],
            shaders: ShaderConfig::default(),
            texture_path: resolve_texture_path("puppy.bmp"),
            frame_mode: FrameMode::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_shader(name: &str) -> String {
        let path = std::env::temp_dir().join(format!("cube_renderer_{}_{name}", std::process::id()));
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07]).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults_match_sample() {
        let config = RendererConfig::default();
        assert_eq!((config.width, config.height), (1024, 1024));
        assert_eq!(config.frame_mode, FrameMode::Blocking);
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert!(config.texture_path.ends_with("textures/puppy.bmp"));
        assert!(config.wanted_device_extensions.contains(&"VK_KHR_swapchain".to_string()));
    }

    #[test]
    fn test_frames_in_flight() {
        assert_eq!(FrameMode::Blocking.frames_in_flight(), 1);
        assert_eq!(FrameMode::Pipelined.frames_in_flight(), 2);
    }

    #[test]
    fn test_validate_rejects_zero_extent() {
        let config = RendererConfig::default().with_extent(0, 512);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("extent"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = RendererConfig::new("");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_checks_shader_files() {
        let missing = RendererConfig::default()
            .with_shaders(ShaderConfig::new("/nonexistent/a.spv", "/nonexistent/b.spv"));
        assert!(missing.validate().is_err());

        let present = RendererConfig::default()
            .with_shaders(ShaderConfig::new(temp_shader("vert.spv"), temp_shader("frag.spv")));
        assert!(present.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RendererConfig::new("Round Trip")
            .with_extent(640, 480)
            .with_frame_mode(FrameMode::Pipelined)
            .with_validation(false);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = RendererConfig::parse("renderer.toml", &text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed = RendererConfig::parse("renderer.ron", "(width: 800, frame_mode: Pipelined)").unwrap();
        assert_eq!(parsed.width, 800);
        assert_eq!(parsed.height, 1024);
        assert_eq!(parsed.frame_mode, FrameMode::Pipelined);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = RendererConfig::parse("renderer.json", "{}").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_unresolved_texture_falls_back_to_resources() {
        assert_eq!(
            resolve_texture_path("no_such_texture.bmp"),
            "resources/textures/no_such_texture.bmp"
        );
    }
}
