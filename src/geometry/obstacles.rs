//! Conversion of posed shapes into convex sets.
//!
//! Each constructor reads one geometry from a [GeometrySource] and expresses it in a reference
//! frame `F`; [make_iris_obstacles] converts every proximity geometry of a source.

use nalgebra::{DMatrix,DVector,Matrix3,Vector3};
use tracing::warn;

use crate::error::{Error,Result};
use super::{ConvexSet,ConvexSets,CartesianProduct,FrameId,GeometryId,GeometrySource,HPolyhedron,Hyperellipsoid,MinkowskiSum,Point,RigidTransform,Shape,VPolytope};
use super::minkowski_sum::segment;

fn rotation(x : &RigidTransform) -> DMatrix<f64> {
    let r : Matrix3<f64> = x.rotation.to_rotation_matrix().into_inner();
    DMatrix::from_iterator(3,3,r.iter().cloned())
}

fn translation(x : &RigidTransform) -> DVector<f64> {
    let p = x.translation.vector;
    DVector::from_column_slice(p.as_slice())
}

fn to_dvector(v : &Vector3<f64>) -> DVector<f64> { DVector::from_column_slice(v.as_slice()) }

/// The vertices `X_FG vᵢ` as columns.
fn transformed_vertices(x_fg : &RigidTransform, vertices : &[Vector3<f64>]) -> DMatrix<f64> {
    let cols : Vec<DVector<f64>> = vertices.iter().map(|v| to_dvector(&x_fg.transform_point(&(*v).into()).coords)).collect();
    if cols.is_empty() { DMatrix::zeros(3,0) } else { DMatrix::from_columns(&cols) }
}

fn box_vertices(width : f64, depth : f64, height : f64) -> Vec<Vector3<f64>> {
    let h = Vector3::new(width/2.0,depth/2.0,height/2.0);
    (0..8).map(|k| Vector3::new(if k & 1 == 1 { h.x } else { -h.x },
                                if k & 2 == 2 { h.y } else { -h.y },
                                if k & 4 == 4 { h.z } else { -h.z }))
          .collect()
}

impl HPolyhedron {
    /// A box, convex mesh or half space geometry in `reference_frame`.
    pub fn from_geometry(source : &dyn GeometrySource, id : GeometryId, reference_frame : FrameId) -> Result<HPolyhedron> {
        let x_fg = source.pose_in_frame(id,reference_frame)?;
        let r = rotation(&x_fg);
        let p = translation(&x_fg);
        match source.shape(id)? {
            Shape::Box{width,depth,height} => {
                // A_G Rᵀ x ≤ b_G + A_G Rᵀ p
                let g = HPolyhedron::make_box(&DVector::from_vec(vec![-width/2.0,-depth/2.0,-height/2.0]),
                                              &DVector::from_vec(vec![width/2.0,depth/2.0,height/2.0]))?;
                let a = g.A() * r.transpose();
                let b = g.b() + &a * &p;
                HPolyhedron::new(a,b)
            },
            Shape::HalfSpace => {
                let normal = r.column(2).into_owned();
                let b = normal.dot(&p);
                HPolyhedron::new(DMatrix::from_row_slice(1,3,normal.as_slice()),DVector::from_element(1,b))
            },
            Shape::Convex{vertices} => {
                HPolyhedron::from_vpolytope(&VPolytope::new(transformed_vertices(&x_fg,&vertices)))
            },
            s => Err(Error::invalid(format!("HPolyhedron can not represent a {}",s.name())))
        }
    }
}

impl VPolytope {
    /// A box or mesh geometry in `reference_frame`. A non-convex mesh is replaced by its convex
    /// hull.
    pub fn from_geometry(source : &dyn GeometrySource, id : GeometryId, reference_frame : FrameId) -> Result<VPolytope> {
        let x_fg = source.pose_in_frame(id,reference_frame)?;
        let vertices = match source.shape(id)? {
            Shape::Box{width,depth,height} => box_vertices(width,depth,height),
            Shape::Convex{vertices} => vertices,
            Shape::Mesh{vertices} => {
                warn!("geometry {:?} is a non-convex mesh, using its convex hull",id);
                vertices
            },
            s => return Err(Error::invalid(format!("VPolytope can not represent a {}",s.name())))
        };
        VPolytope::new(transformed_vertices(&x_fg,&vertices)).get_minimal_representation()
    }
}

impl Hyperellipsoid {
    /// A sphere or ellipsoid geometry in `reference_frame`.
    pub fn from_geometry(source : &dyn GeometrySource, id : GeometryId, reference_frame : FrameId) -> Result<Hyperellipsoid> {
        let x_fg = source.pose_in_frame(id,reference_frame)?;
        let r = rotation(&x_fg);
        let p = translation(&x_fg);
        let radii = match source.shape(id)? {
            Shape::Sphere{radius}  => [radius,radius,radius],
            Shape::Ellipsoid{a,b,c} => [a,b,c],
            s => return Err(Error::invalid(format!("Hyperellipsoid can not represent a {}",s.name())))
        };
        if radii.iter().any(|v| ! (*v > 0.0)) {
            return Err(Error::invalid("Hyperellipsoid radii must be positive"));
        }
        // x_G = Rᵀ (x_F - p)
        let a_g = DMatrix::from_diagonal(&DVector::from_iterator(3,radii.iter().map(|v| 1.0/v)));
        Hyperellipsoid::new(a_g * r.transpose(),p)
    }
}

impl Point {
    /// A sphere geometry whose radius is at most `maximum_allowable_radius`, as its center.
    pub fn from_geometry(source : &dyn GeometrySource, id : GeometryId, reference_frame : FrameId, maximum_allowable_radius : f64) -> Result<Point> {
        match source.shape(id)? {
            Shape::Sphere{radius} if radius <= maximum_allowable_radius => {
                let x_fg = source.pose_in_frame(id,reference_frame)?;
                Ok(Point::new(translation(&x_fg)))
            },
            Shape::Sphere{radius} =>
                Err(Error::invalid(format!("sphere radius {} exceeds the allowed radius {}",radius,maximum_allowable_radius))),
            s => Err(Error::invalid(format!("Point can not represent a {}",s.name())))
        }
    }
}

impl CartesianProduct {
    /// A cylinder geometry in `reference_frame`: the disk in the geometry's xy-plane times the
    /// interval along its z axis, pulled back through the inverse pose.
    pub fn from_geometry(source : &dyn GeometrySource, id : GeometryId, reference_frame : FrameId) -> Result<CartesianProduct> {
        let (radius,length) = match source.shape(id)? {
            Shape::Cylinder{radius,length} => (radius,length),
            s => return Err(Error::invalid(format!("CartesianProduct can not represent a {}",s.name())))
        };
        let x_fg = source.pose_in_frame(id,reference_frame)?;
        let rt = rotation(&x_fg).transpose();
        let b = -(&rt * translation(&x_fg));
        let disk = Hyperellipsoid::make_hypersphere(radius,DVector::zeros(2))?;
        let interval = HPolyhedron::make_box(&DVector::from_element(1,-length/2.0),&DVector::from_element(1,length/2.0))?;
        CartesianProduct::with_affine_map(vec![Box::new(disk),Box::new(interval)],rt,b)
    }
}

impl MinkowskiSum {
    /// A capsule geometry in `reference_frame`: its axis segment plus a ball.
    pub fn from_geometry(source : &dyn GeometrySource, id : GeometryId, reference_frame : FrameId) -> Result<MinkowskiSum> {
        let (radius,length) = match source.shape(id)? {
            Shape::Capsule{radius,length} => (radius,length),
            s => return Err(Error::invalid(format!("MinkowskiSum can not represent a {}",s.name())))
        };
        let x_fg = source.pose_in_frame(id,reference_frame)?;
        let top    = x_fg.transform_point(&Vector3::new(0.0,0.0,length/2.0).into()).coords;
        let bottom = x_fg.transform_point(&Vector3::new(0.0,0.0,-length/2.0).into()).coords;
        let ball = Hyperellipsoid::make_hypersphere(radius,DVector::zeros(3))?;
        MinkowskiSum::new(vec![Box::new(segment(&to_dvector(&bottom),&to_dvector(&top))),Box::new(ball)])
    }
}

/// One convex set per proximity geometry of `source`, expressed in `reference_frame`.
///
/// Boxes and half spaces become [HPolyhedron]s, spheres and ellipsoids [Hyperellipsoid]s,
/// cylinders [CartesianProduct]s, capsules [MinkowskiSum]s and meshes [VPolytope]s of their
/// convex hull.
pub fn make_iris_obstacles(source : &dyn GeometrySource, reference_frame : FrameId) -> Result<ConvexSets> {
    let mut obstacles : ConvexSets = Vec::new();
    for id in source.proximity_geometries() {
        let set : Box<dyn ConvexSet> = match source.shape(id)? {
            Shape::Box{..} | Shape::HalfSpace   => Box::new(HPolyhedron::from_geometry(source,id,reference_frame)?),
            Shape::Sphere{..} | Shape::Ellipsoid{..} => Box::new(Hyperellipsoid::from_geometry(source,id,reference_frame)?),
            Shape::Cylinder{..} => Box::new(CartesianProduct::from_geometry(source,id,reference_frame)?),
            Shape::Capsule{..}  => Box::new(MinkowskiSum::from_geometry(source,id,reference_frame)?),
            Shape::Convex{..} | Shape::Mesh{..} => Box::new(VPolytope::from_geometry(source,id,reference_frame)?),
        };
        obstacles.push(set);
    }
    Ok(obstacles)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{Isometry3,Translation3,UnitQuaternion};
    use crate::geometry::{downcast,SceneGeometry};
    use std::f64::consts::FRAC_PI_2;

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    fn translated(x : f64, y : f64, z : f64) -> RigidTransform {
        Isometry3::from_parts(Translation3::new(x,y,z),UnitQuaternion::identity())
    }

    #[test]
    fn box_in_world() {
        let mut scene = SceneGeometry::new();
        let g = scene.add_geometry(FrameId::world(),"box",translated(1.0,0.0,0.0),
                                   Shape::Box{ width : 2.0, depth : 1.0, height : 1.0 }).unwrap();
        let h = HPolyhedron::from_geometry(&scene,g,FrameId::world()).unwrap();
        assert!(h.point_in_set(&vec(&[1.9,0.4,0.4]),1e-12));
        assert!(!h.point_in_set(&vec(&[2.1,0.0,0.0]),1e-12));
        let v = VPolytope::from_geometry(&scene,g,FrameId::world()).unwrap();
        assert_eq!(v.vertices().ncols(),8);
        assert!((v.calc_volume().unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn box_in_other_frame() {
        let mut scene = SceneGeometry::new();
        let f = scene.add_frame("body",translated(0.0,0.0,5.0));
        let g = scene.add_geometry(FrameId::world(),"box",translated(0.0,0.0,0.0),
                                   Shape::Box{ width : 1.0, depth : 1.0, height : 1.0 }).unwrap();
        let h = HPolyhedron::from_geometry(&scene,g,f).unwrap();
        assert!(h.point_in_set(&vec(&[0.0,0.0,-5.0]),1e-12));
        assert!(!h.point_in_set(&vec(&[0.0,0.0,0.0]),1e-12));
    }

    #[test]
    fn rotated_ellipsoid() {
        let mut scene = SceneGeometry::new();
        let pose = Isometry3::from_parts(Translation3::new(0.0,0.0,1.0),UnitQuaternion::from_axis_angle(&Vector3::z_axis(),FRAC_PI_2));
        let g = scene.add_geometry(FrameId::world(),"e",pose,Shape::Ellipsoid{ a : 2.0, b : 1.0, c : 0.5 }).unwrap();
        let e = Hyperellipsoid::from_geometry(&scene,g,FrameId::world()).unwrap();
        // the long axis now points along world y
        assert!(e.point_in_set(&vec(&[0.0,1.9,1.0]),1e-9));
        assert!(!e.point_in_set(&vec(&[1.9,0.0,1.0]),1e-9));
    }

    #[test]
    fn sphere_as_point() {
        let mut scene = SceneGeometry::new();
        let g = scene.add_geometry(FrameId::world(),"s",translated(1.0,2.0,3.0),Shape::Sphere{ radius : 0.0 }).unwrap();
        let p = Point::from_geometry(&scene,g,FrameId::world(),0.0).unwrap();
        assert_eq!(p.x(),&vec(&[1.0,2.0,3.0]));
        let g2 = scene.add_geometry(FrameId::world(),"s2",translated(0.0,0.0,0.0),Shape::Sphere{ radius : 0.5 }).unwrap();
        assert!(Point::from_geometry(&scene,g2,FrameId::world(),0.1).is_err());
    }

    #[test]
    fn cylinder_and_capsule() {
        let mut scene = SceneGeometry::new();
        let pose = Isometry3::from_parts(Translation3::new(1.0,0.0,0.0),UnitQuaternion::from_axis_angle(&Vector3::y_axis(),FRAC_PI_2));
        let c = scene.add_geometry(FrameId::world(),"cyl",pose,Shape::Cylinder{ radius : 0.5, length : 2.0 }).unwrap();
        let cyl = CartesianProduct::from_geometry(&scene,c,FrameId::world()).unwrap();
        // the axis is along world x after the rotation
        assert!(cyl.point_in_set(&vec(&[1.9,0.0,0.4]),1e-9));
        assert!(!cyl.point_in_set(&vec(&[1.0,0.0,0.6]),1e-9));
        assert!(!cyl.point_in_set(&vec(&[2.1,0.0,0.0]),1e-9));

        let k = scene.add_geometry(FrameId::world(),"cap",translated(0.0,0.0,0.0),Shape::Capsule{ radius : 0.5, length : 2.0 }).unwrap();
        let cap = MinkowskiSum::from_geometry(&scene,k,FrameId::world()).unwrap();
        assert!(cap.point_in_set(&vec(&[0.0,0.0,1.45]),1e-6));
        assert!(!cap.point_in_set(&vec(&[0.0,0.0,1.55]),1e-6));
        assert!(!cap.point_in_set(&vec(&[0.6,0.0,0.0]),1e-6));
    }

    #[test]
    fn halfspace() {
        let mut scene = SceneGeometry::new();
        let g = scene.add_geometry(FrameId::world(),"ground",translated(0.0,0.0,-1.0),Shape::HalfSpace).unwrap();
        let h = HPolyhedron::from_geometry(&scene,g,FrameId::world()).unwrap();
        assert!(h.point_in_set(&vec(&[10.0,-4.0,-1.5]),1e-12));
        assert!(!h.point_in_set(&vec(&[0.0,0.0,-0.5]),1e-12));
    }

    #[test]
    fn all_obstacles() {
        let mut scene = SceneGeometry::new();
        scene.add_geometry(FrameId::world(),"box",translated(0.0,0.0,0.0),Shape::Box{ width : 1.0, depth : 1.0, height : 1.0 }).unwrap();
        scene.add_geometry(FrameId::world(),"ball",translated(2.0,0.0,0.0),Shape::Sphere{ radius : 0.5 }).unwrap();
        scene.add_geometry(FrameId::world(),"cyl",translated(4.0,0.0,0.0),Shape::Cylinder{ radius : 0.5, length : 1.0 }).unwrap();
        scene.add_geometry(FrameId::world(),"cap",translated(6.0,0.0,0.0),Shape::Capsule{ radius : 0.5, length : 1.0 }).unwrap();
        scene.add_geometry(FrameId::world(),"mesh",translated(8.0,0.0,0.0),Shape::Mesh{ vertices : box_vertices(1.0,1.0,1.0) }).unwrap();
        let hidden = scene.add_geometry(FrameId::world(),"hidden",translated(8.0,0.0,0.0),Shape::HalfSpace).unwrap();
        scene.set_proximity(hidden,false).unwrap();

        let obstacles = make_iris_obstacles(&scene,FrameId::world()).unwrap();
        assert_eq!(obstacles.len(),5);
        assert!(downcast::<HPolyhedron>(obstacles[0].as_ref()).is_some());
        assert!(downcast::<Hyperellipsoid>(obstacles[1].as_ref()).is_some());
        assert!(downcast::<CartesianProduct>(obstacles[2].as_ref()).is_some());
        assert!(downcast::<MinkowskiSum>(obstacles[3].as_ref()).is_some());
        assert!(downcast::<VPolytope>(obstacles[4].as_ref()).is_some());
        assert!(obstacles.iter().all(|o| o.ambient_dimension() == 3));
    }
}
