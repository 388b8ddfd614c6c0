//! Model loading: blueprint rigid bodies from RON shape descriptions
//!
//! A model document describes one rigid body: its static flag, center of
//! gravity and a list of shapes with materials and offset transforms. The
//! loader caches the resulting [`BodyBlueprint`] by name and instantiates
//! live bodies from the cache on demand.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::body::{BodyBlueprint, BodyId};
use crate::collision::{Geom, Material, Shape, TriMeshData};
use crate::foundation::math::{utils, BodyFrame, Vec3};
use crate::simulator::Simulator;

/// Errors raised while loading or instantiating a model.
///
/// Every variant names the model (and shape, where applicable) so the
/// failure context accumulates as it propagates.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// The model file could not be read
    #[error("model '{name}': {source}")]
    Io {
        /// Model name
        name: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The model document failed to parse
    #[error("model '{name}': parse error: {message}")]
    Parse {
        /// Model name
        name: String,
        /// Parser diagnostics, including unknown shape types
        message: String,
    },

    /// A shape's material declared a mass of exactly zero
    #[error("model '{model}', shape '{shape}': material has no mass")]
    ZeroMass {
        /// Model name
        model: String,
        /// Offending shape name
        shape: String,
    },

    /// Trimeshes and planes are only supported in static bodies
    #[error("model '{model}', shape '{shape}': {kind} in non-static body")]
    ShapeRequiresStatic {
        /// Model name
        model: String,
        /// Offending shape name
        shape: String,
        /// Shape kind name
        kind: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct ModelDoc {
    #[serde(rename = "static", default)]
    is_static: bool,
    #[serde(default)]
    cog: (f32, f32, f32),
    shapes: Vec<ShapeDoc>,
}

#[derive(Debug, Deserialize)]
struct ShapeDoc {
    name: String,
    shape: ShapeKindDoc,
    material: MaterialDoc,
    #[serde(default)]
    sensor: bool,
    #[serde(default)]
    category: u32,
    #[serde(default)]
    offset: OffsetDoc,
}

#[derive(Debug, Deserialize)]
enum ShapeKindDoc {
    Sphere {
        radius: f32,
    },
    Capsule {
        radius: f32,
        length: f32,
    },
    Box {
        x: f32,
        y: f32,
        z: f32,
    },
    Plane {
        normal: (f32, f32, f32),
        d: f32,
    },
    Ray {
        length: f32,
    },
    TriMesh {
        vertices: Vec<(f32, f32, f32)>,
        faces: Vec<(u32, u32, u32)>,
    },
    Continuous,
}

#[derive(Debug, Deserialize)]
struct MaterialDoc {
    friction: f32,
    bounciness: f32,
    mass: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OffsetDoc {
    translation: (f32, f32, f32),
    /// Euler rotation in degrees, XYZ order
    rotation_deg: (f32, f32, f32),
}

fn vec3(t: (f32, f32, f32)) -> Vec3 {
    Vec3::new(t.0, t.1, t.2)
}

/// Loader and cache for blueprint rigid bodies.
pub struct ModelLoader {
    root: PathBuf,
    cache: HashMap<String, BodyBlueprint>,
}

impl ModelLoader {
    /// Create a loader reading model documents from `root` as
    /// `<root>/<name>.ron`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: HashMap::new(),
        }
    }

    /// Instantiate the named model in `simulator`, loading and caching its
    /// blueprint on first use.
    pub fn instantiate_model(
        &mut self,
        simulator: &mut Simulator,
        name: &str,
    ) -> Result<BodyId, ModelError> {
        if !self.cache.contains_key(name) {
            let blueprint = self.load_model(name)?;
            self.cache.insert(name.to_string(), blueprint);
        }
        Ok(simulator.instantiate(&self.cache[name]))
    }

    /// The cached blueprint for a name, if already loaded.
    pub fn blueprint(&self, name: &str) -> Option<&BodyBlueprint> {
        self.cache.get(name)
    }

    /// Put a blueprint into the cache directly, bypassing the filesystem.
    pub fn insert_blueprint(&mut self, blueprint: BodyBlueprint) {
        self.cache.insert(blueprint.name.clone(), blueprint);
    }

    fn load_model(&self, name: &str) -> Result<BodyBlueprint, ModelError> {
        let path = self.root.join(format!("{name}.ron"));
        log::debug!("loading model '{name}' from {path:?}");
        let source = std::fs::read_to_string(&path).map_err(|source| ModelError::Io {
            name: name.to_string(),
            source,
        })?;
        parse_model(name, &source)
    }
}

/// Parse a model document into a blueprint.
pub fn parse_model(name: &str, source: &str) -> Result<BodyBlueprint, ModelError> {
    let doc: ModelDoc = ron::from_str(source).map_err(|e| ModelError::Parse {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    let mut geoms = Vec::with_capacity(doc.shapes.len());
    for shape_doc in doc.shapes {
        geoms.push(build_geom(name, doc.is_static, shape_doc)?);
    }

    Ok(BodyBlueprint {
        name: name.to_string(),
        is_static: doc.is_static,
        cog: vec3(doc.cog),
        geoms,
    })
}

fn build_geom(model: &str, is_static: bool, doc: ShapeDoc) -> Result<Geom, ModelError> {
    if doc.material.mass == 0.0 {
        return Err(ModelError::ZeroMass {
            model: model.to_string(),
            shape: doc.name,
        });
    }

    let shape = match doc.shape {
        ShapeKindDoc::Sphere { radius } => Shape::Sphere { radius },
        ShapeKindDoc::Capsule { radius, length } => Shape::Capsule { radius, length },
        ShapeKindDoc::Box { x, y, z } => Shape::Box { x, y, z },
        ShapeKindDoc::Plane { normal, d } => {
            if !is_static {
                return Err(ModelError::ShapeRequiresStatic {
                    model: model.to_string(),
                    shape: doc.name,
                    kind: "plane",
                });
            }
            Shape::Plane {
                normal: vec3(normal).normalize(),
                d,
            }
        }
        ShapeKindDoc::Ray { length } => Shape::Ray { length },
        ShapeKindDoc::TriMesh { vertices, faces } => {
            if !is_static {
                return Err(ModelError::ShapeRequiresStatic {
                    model: model.to_string(),
                    shape: doc.name,
                    kind: "trimesh",
                });
            }
            let vertices: Vec<Vec3> = vertices.into_iter().map(vec3).collect();
            let faces: Vec<[u32; 3]> = faces.into_iter().map(|f| [f.0, f.1, f.2]).collect();
            Shape::TriMesh(std::sync::Arc::new(TriMeshData::new(vertices, faces)))
        }
        ShapeKindDoc::Continuous => Shape::Continuous(Default::default()),
    };

    let rotation = nalgebra::Rotation3::from_euler_angles(
        utils::deg_to_rad(doc.offset.rotation_deg.0),
        utils::deg_to_rad(doc.offset.rotation_deg.1),
        utils::deg_to_rad(doc.offset.rotation_deg.2),
    )
    .matrix()
    .clone_owned();

    let mut geom = Geom::new(doc.name, shape);
    geom.material = Material {
        friction: doc.material.friction,
        bounciness: doc.material.bounciness,
        mass: doc.material.mass,
    };
    geom.sensor = doc.sensor;
    geom.category = doc.category;
    geom.offset = BodyFrame::new(rotation, vec3(doc.offset.translation));
    Ok(geom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use approx::assert_relative_eq;

    const CRATE_MODEL: &str = r#"(
        static: false,
        cog: (0.0, -0.25, 0.0),
        shapes: [
            (
                name: "hull",
                shape: Box(x: 1.0, y: 1.0, z: 1.0),
                material: (friction: 0.8, bounciness: 0.2, mass: 40.0),
                offset: (translation: (0.0, 0.5, 0.0)),
            ),
            (
                name: "pickup-zone",
                shape: Sphere(radius: 2.0),
                material: (friction: 0.0, bounciness: 0.0, mass: 1.0),
                sensor: true,
            ),
        ],
    )"#;

    #[test]
    fn parses_shapes_and_attributes() {
        let blueprint = parse_model("crate", CRATE_MODEL).unwrap();
        assert!(!blueprint.is_static);
        assert_relative_eq!(blueprint.cog.y, -0.25);
        assert_eq!(blueprint.geoms.len(), 2);
        assert!(blueprint.geoms[1].sensor);
        assert_relative_eq!(blueprint.geoms[0].offset.translation.y, 0.5);
    }

    #[test]
    fn zero_mass_is_rejected() {
        let doc = r#"(
            shapes: [(
                name: "hull",
                shape: Sphere(radius: 1.0),
                material: (friction: 1.0, bounciness: 0.0, mass: 0.0),
            )],
        )"#;
        let err = parse_model("bad", doc).unwrap_err();
        assert!(matches!(err, ModelError::ZeroMass { .. }));
        assert!(err.to_string().contains("hull"));
    }

    #[test]
    fn unknown_shape_type_fails_parse() {
        let doc = r#"(
            shapes: [(
                name: "hull",
                shape: Torus(radius: 1.0),
                material: (friction: 1.0, bounciness: 0.0, mass: 1.0),
            )],
        )"#;
        let err = parse_model("bad", doc).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn trimesh_requires_static_body() {
        let doc = r#"(
            static: false,
            shapes: [(
                name: "terrain",
                shape: TriMesh(
                    vertices: [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 0.0, 1.0)],
                    faces: [(0, 1, 2)],
                ),
                material: (friction: 1.0, bounciness: 0.0, mass: 1.0),
            )],
        )"#;
        let err = parse_model("terrain", doc).unwrap_err();
        assert!(matches!(err, ModelError::ShapeRequiresStatic { .. }));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let mut loader = ModelLoader::new("/nonexistent/models");
        let mut sim = Simulator::new("test", PhysicsConfig::default());
        let err = loader.instantiate_model(&mut sim, "ghost").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn cache_is_reused_across_instantiations() {
        let mut loader = ModelLoader::new(".");
        loader.insert_blueprint(parse_model("crate", CRATE_MODEL).unwrap());

        let mut sim = Simulator::new("test", PhysicsConfig::default());
        let a = loader.instantiate_model(&mut sim, "crate").unwrap();
        let b = loader.instantiate_model(&mut sim, "crate").unwrap();
        assert_ne!(a, b);
        assert_eq!(sim.body(a).name, sim.body(b).name);
    }
}
