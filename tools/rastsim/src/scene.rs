use std::fs;
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use rast_core::{
    BoundingBox, DescriptorImage, FetchPolicy, RasterConfig, Rgb, ScanOrder, ShapeDescriptor, ShapeType,
};
use serde::Deserialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scan {
    Rows,
    Columns,
}

impl From<Scan> for ScanOrder {
    fn from(scan: Scan) -> Self {
        match scan {
            Scan::Rows => ScanOrder::RowMajor,
            Scan::Columns => ScanOrder::ColumnMajor,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Fetch {
    PerPixel,
    PerPass,
}

impl From<Fetch> for FetchPolicy {
    fn from(fetch: Fetch) -> Self {
        match fetch {
            Fetch::PerPixel => FetchPolicy::PerPixel,
            Fetch::PerPass => FetchPolicy::PerPass,
        }
    }
}

/// Rasterizer settings. Unset fields fall back to the device defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    pub scan: Option<Scan>,
    pub fetch: Option<Fetch>,
    pub turnaround: Option<u8>,
    pub check_shape_types: Option<bool>,
}

impl SceneConfig {
    /// Fields set in `overrides` win.
    pub fn merge(&self, overrides: &SceneConfig) -> SceneConfig {
        SceneConfig {
            scan: overrides.scan.or(self.scan),
            fetch: overrides.fetch.or(self.fetch),
            turnaround: overrides.turnaround.or(self.turnaround),
            check_shape_types: overrides.check_shape_types.or(self.check_shape_types),
        }
    }

    pub fn raster_config(&self) -> RasterConfig {
        let defaults = RasterConfig::default();
        RasterConfig {
            scan_order: self.scan.map_or(defaults.scan_order, Into::into),
            fetch_policy: self.fetch.map_or(defaults.fetch_policy, Into::into),
            turnaround_cycles: self.turnaround.unwrap_or(defaults.turnaround_cycles),
            check_shape_types: self.check_shape_types.unwrap_or(defaults.check_shape_types),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneShape {
    /// x_min, x_max, y_min, y_max, inclusive
    pub bounds: [u8; 4],
    pub color: [u8; 3],
    #[serde(default)]
    pub kind: u8,
}

impl From<&SceneShape> for ShapeDescriptor {
    fn from(shape: &SceneShape) -> Self {
        ShapeDescriptor {
            bounds: BoundingBox::from(shape.bounds),
            color: Rgb::from(shape.color),
            kind: ShapeType::from(shape.kind),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub shapes: Vec<SceneShape>,
    #[serde(default)]
    pub config: SceneConfig,
}

impl Scene {
    pub fn load(path: &Path) -> anyhow::Result<Scene> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read scene {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse scene {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Scene> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn descriptors(&self) -> Vec<ShapeDescriptor> {
        self.shapes.iter().map(ShapeDescriptor::from).collect()
    }

    pub fn image(&self) -> anyhow::Result<DescriptorImage> {
        Ok(DescriptorImage::from_shapes(&self.descriptors())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENE_B: &str = r#"{
        "shapes": [
            { "bounds": [32, 96, 32, 96], "color": [255, 0, 0] },
            { "bounds": [64, 128, 64, 128], "color": [0, 0, 255], "kind": 0 }
        ],
        "config": { "scan": "columns", "turnaround": 2 }
    }"#;

    #[test]
    fn parses_shapes_and_config() {
        let scene = Scene::parse(SCENE_B).unwrap();
        assert_eq!(scene.shapes.len(), 2);
        assert_eq!(scene.shapes[1].bounds, [64, 128, 64, 128]);

        let config = scene.config.raster_config();
        assert_eq!(config.scan_order, ScanOrder::ColumnMajor);
        assert_eq!(config.turnaround_cycles, 2);
        assert_eq!(config.fetch_policy, FetchPolicy::PerPixel);
        assert!(config.check_shape_types);
    }

    #[test]
    fn overrides_win() {
        let scene = Scene::parse(SCENE_B).unwrap();
        let overrides = SceneConfig { fetch: Some(Fetch::PerPass), turnaround: Some(0), ..SceneConfig::default() };

        let config = scene.config.merge(&overrides).raster_config();
        assert_eq!(config.scan_order, ScanOrder::ColumnMajor);
        assert_eq!(config.fetch_policy, FetchPolicy::PerPass);
        assert_eq!(config.turnaround_cycles, 0);
    }

    #[test]
    fn builds_descriptor_image() {
        let image = Scene::parse(SCENE_B).unwrap().image().unwrap();
        assert_eq!(image.count(), 2);
        assert_eq!(&image.as_bytes()[1..9], &[32, 96, 32, 96, 255, 0, 0, 0]);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(Scene::parse(r#"{ "shapes": [], "colour": 1 }"#).is_err());
        assert!(Scene::parse(r#"{ "shapes": [{ "bounds": [0, 1, 2], "color": [0, 0, 0] }] }"#).is_err());
    }

    #[test]
    fn bundled_scenes_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenes");
        let square = Scene::load(&dir.join("single_square.json")).unwrap();
        assert_eq!(square.image().unwrap().count(), 1);

        let overlap = Scene::load(&dir.join("overlap.json")).unwrap();
        assert_eq!(overlap.config.raster_config().fetch_policy, FetchPolicy::PerPass);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENE_B.as_bytes()).unwrap();

        let scene = Scene::load(file.path()).unwrap();
        assert_eq!(scene.descriptors()[0].color, Rgb::new(255, 0, 0));
        assert!(Scene::load(Path::new("/nonexistent/scene.json")).is_err());
    }
}
