//! Geometric primitives and the source they are queried from.
//!
//! Obstacles are read through [GeometrySource]; how a scene stores or updates its geometry is
//! up to the implementor. [SceneGeometry] is a plain in-memory scene.

use std::collections::BTreeMap;

use nalgebra::{Isometry3,Vector3};

use crate::error::{Error,Result};

/// A rigid transform `X_AB`, the pose of frame `B` in frame `A`.
pub type RigidTransform = Isometry3<f64>;

/// Geometric primitives, expressed in their own frame `G`.
#[derive(Clone,Debug,PartialEq)]
pub enum Shape {
    /// Centered box with extents along x, y and z.
    Box { width : f64, depth : f64, height : f64 },
    Sphere { radius : f64 },
    /// Ellipsoid with semi-axes a, b and c along x, y and z.
    Ellipsoid { a : f64, b : f64, c : f64 },
    /// Cylinder along the z axis, centered at the origin.
    Cylinder { radius : f64, length : f64 },
    /// Capsule along the z axis: the segment between `±length/2` inflated by `radius`.
    Capsule { radius : f64, length : f64 },
    /// The half space `z ≤ 0`.
    HalfSpace,
    /// A convex mesh given by its vertices.
    Convex { vertices : Vec<Vector3<f64>> },
    /// A general mesh; only its convex hull is used.
    Mesh { vertices : Vec<Vector3<f64>> },
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Box{..}       => "Box",
            Shape::Sphere{..}    => "Sphere",
            Shape::Ellipsoid{..} => "Ellipsoid",
            Shape::Cylinder{..}  => "Cylinder",
            Shape::Capsule{..}   => "Capsule",
            Shape::HalfSpace     => "HalfSpace",
            Shape::Convex{..}    => "Convex",
            Shape::Mesh{..}      => "Mesh",
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct GeometryId(usize);

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct FrameId(usize);

impl FrameId {
    pub fn world() -> FrameId { FrameId(0) }
}

/// Read access to a scene of posed shapes.
pub trait GeometrySource {
    /// All geometries that take part in collision queries.
    fn proximity_geometries(&self) -> Vec<GeometryId>;
    fn shape(&self, id : GeometryId) -> Result<Shape>;
    /// `X_WG`
    fn pose_in_world(&self, id : GeometryId) -> Result<RigidTransform>;
    /// `X_WF`
    fn frame_pose_in_world(&self, frame : FrameId) -> Result<RigidTransform>;

    /// `X_FG`, the pose of geometry `id` in `frame`.
    fn pose_in_frame(&self, id : GeometryId, frame : FrameId) -> Result<RigidTransform> {
        Ok(self.frame_pose_in_world(frame)?.inverse() * self.pose_in_world(id)?)
    }
}

#[derive(Clone,Debug)]
pub struct GeometryInstance {
    pub name      : String,
    pub frame     : FrameId,
    /// `X_FG`
    pub pose      : RigidTransform,
    pub shape     : Shape,
    pub proximity : bool,
}

/// An in-memory scene: named frames posed in the world and shapes posed in the frames.
#[derive(Clone,Debug)]
pub struct SceneGeometry {
    frames     : BTreeMap<FrameId,(String,RigidTransform)>,
    geometries : BTreeMap<GeometryId,GeometryInstance>,
    next_frame : usize,
    next_geom  : usize,
}

impl Default for SceneGeometry {
    fn default() -> Self {
        let mut frames = BTreeMap::new();
        frames.insert(FrameId::world(),("world".to_string(),RigidTransform::identity()));
        SceneGeometry{ frames, geometries : BTreeMap::new(), next_frame : 1, next_geom : 0 }
    }
}

impl SceneGeometry {
    pub fn new() -> SceneGeometry { SceneGeometry::default() }

    pub fn add_frame(& mut self, name : &str, x_wf : RigidTransform) -> FrameId {
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        self.frames.insert(id,(name.to_string(),x_wf));
        id
    }

    pub fn set_frame_pose(& mut self, frame : FrameId, x_wf : RigidTransform) -> Result<()> {
        if frame == FrameId::world() {
            return Err(Error::invalid("the world frame can not be moved"));
        }
        match self.frames.get_mut(&frame) {
            Some(f) => { f.1 = x_wf; Ok(()) },
            None    => Err(Error::invalid(format!("unknown frame {:?}",frame)))
        }
    }

    /// Add a shape posed at `x_fg` in `frame`, taking part in collision queries.
    pub fn add_geometry(& mut self, frame : FrameId, name : &str, x_fg : RigidTransform, shape : Shape) -> Result<GeometryId> {
        if ! self.frames.contains_key(&frame) {
            return Err(Error::invalid(format!("unknown frame {:?}",frame)));
        }
        let id = GeometryId(self.next_geom);
        self.next_geom += 1;
        self.geometries.insert(id,GeometryInstance{ name : name.to_string(), frame, pose : x_fg, shape, proximity : true });
        Ok(id)
    }

    /// Include or exclude a geometry from collision queries.
    pub fn set_proximity(& mut self, id : GeometryId, proximity : bool) -> Result<()> {
        self.instance_mut(id)?.proximity = proximity;
        Ok(())
    }

    pub fn geometry(&self, id : GeometryId) -> Result<&GeometryInstance> {
        self.geometries.get(&id).ok_or_else(|| Error::invalid(format!("unknown geometry {:?}",id)))
    }

    fn instance_mut(& mut self, id : GeometryId) -> Result<& mut GeometryInstance> {
        self.geometries.get_mut(&id).ok_or_else(|| Error::invalid(format!("unknown geometry {:?}",id)))
    }
}

impl GeometrySource for SceneGeometry {
    fn proximity_geometries(&self) -> Vec<GeometryId> {
        self.geometries.iter().filter(|(_,g)| g.proximity).map(|(id,_)| *id).collect()
    }

    fn shape(&self, id : GeometryId) -> Result<Shape> {
        Ok(self.geometry(id)?.shape.clone())
    }

    fn pose_in_world(&self, id : GeometryId) -> Result<RigidTransform> {
        let g = self.geometry(id)?;
        Ok(self.frame_pose_in_world(g.frame)? * g.pose)
    }

    fn frame_pose_in_world(&self, frame : FrameId) -> Result<RigidTransform> {
        self.frames.get(&frame)
            .map(|f| f.1)
            .ok_or_else(|| Error::invalid(format!("unknown frame {:?}",frame)))
    }
}
