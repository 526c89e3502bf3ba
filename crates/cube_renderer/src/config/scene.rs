use serde::{Deserialize, Serialize};

use super::Config;

/// Material and light constants written once into the light uniform block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// Ambient coefficient
    pub ka: f32,
    /// Diffuse coefficient
    pub kd: f32,
    /// Specular coefficient
    pub ks: f32,
    /// Specular exponent
    pub shininess: f32,
    /// World-space light position
    pub position: [f32; 3],
    /// Specular highlight color
    pub specular_color: [f32; 3],
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            ka: 0.2,
            kd: 0.5,
            ks: 0.3,
            shininess: 100.0,
            position: [-50.0, -50.0, 10.0],
            specular_color: [1.0, 1.0, 1.0],
        }
    }
}

/// Camera, animation and mouse-interaction constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Distance of the eye from the origin along +Z
    pub eye_distance: f32,
    /// Near clip plane
    pub near_plane: f32,
    /// Far clip plane
    pub far_plane: f32,
    /// Seconds for one full turn in rotate mode
    pub seconds_per_cycle: f32,
    /// Radians of rotation per pixel of mouse motion
    pub angle_factor: f32,
    /// Scale change per pixel of mouse motion
    pub scale_factor: f32,
    /// Smallest allowed model scale
    pub min_scale: f32,
    /// Lighting constants
    pub light: LightSettings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            eye_distance: 3.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            seconds_per_cycle: 3.0,
            angle_factor: std::f32::consts::PI / 180.0,
            scale_factor: 0.005,
            min_scale: 0.05,
            light: LightSettings::default(),
        }
    }
}

impl Config for SceneConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_defaults() {
        let light = LightSettings::default();
        assert_eq!(light.ka, 0.2);
        assert_eq!(light.kd, 0.5);
        assert_eq!(light.ks, 0.3);
        assert_eq!(light.shininess, 100.0);
        assert_eq!(light.position, [-50.0, -50.0, 10.0]);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let parsed = SceneConfig::parse("scene.toml", "eye_distance = 5.0\n[light]\nks = 0.9\n").unwrap();
        assert_eq!(parsed.eye_distance, 5.0);
        assert_eq!(parsed.fov_degrees, 60.0);
        assert_eq!(parsed.light.ks, 0.9);
        assert_eq!(parsed.light.kd, 0.5);
    }
}
