use approx::assert_abs_diff_eq;
use nalgebra::{DMatrix,DVector,Isometry3};

use convexsets::*;

fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

#[test]
fn box_representations_agree() {
    let h = HPolyhedron::make_box(&vec(&[-1.0,0.0,2.0]),&vec(&[1.0,1.0,3.0])).unwrap();
    let v = VPolytope::from_hpolyhedron(&h).unwrap();
    assert_eq!(v.vertices().ncols(),8);
    assert_abs_diff_eq!(v.calc_volume().unwrap(),2.0,epsilon = 1e-9);

    let back = HPolyhedron::from_vpolytope(&v).unwrap();
    for p in [vec(&[0.0,0.5,2.5]),vec(&[0.99,0.01,2.99]),vec(&[1.01,0.5,2.5])] {
        assert_eq!(h.point_in_set(&p,1e-9),back.point_in_set(&p,1e-9));
        assert_eq!(h.point_in_set(&p,1e-9),v.point_in_set(&p,1e-7));
    }
}

#[test]
fn inscribed_ellipsoid_and_center() {
    let h = HPolyhedron::make_unit_box(2);
    let c = h.chebyshev_center().unwrap();
    assert_abs_diff_eq!(c.norm(),0.0,epsilon = 1e-6);
    let e = h.maximum_volume_inscribed_ellipsoid().unwrap();
    assert_abs_diff_eq!(e.volume(),std::f64::consts::PI,epsilon = 1e-4);
    assert_abs_diff_eq!(e.center().norm(),0.0,epsilon = 1e-5);
}

#[test]
fn combinators() {
    let square : Box<dyn ConvexSet> = Box::new(HPolyhedron::make_unit_box(2));
    let ball : Box<dyn ConvexSet> = Box::new(Hyperellipsoid::make_hypersphere(0.5,vec(&[2.0,0.0])).unwrap());

    let sum = MinkowskiSum::new(vec![square.clone(),ball.clone()]).unwrap();
    assert!(sum.point_in_set(&vec(&[3.4,0.0]),1e-6));
    assert!(! sum.point_in_set(&vec(&[3.6,0.0]),1e-6));
    assert!(sum.is_bounded().unwrap());

    let inter = Intersection::new(vec![square.clone(),ball.clone()]).unwrap();
    assert!(inter.is_empty().unwrap());
    assert!(! square.intersects_with(ball.as_ref()).unwrap());

    let product = CartesianProduct::new(vec![square.clone(),Box::new(Point::new(vec(&[7.0])))]);
    assert_eq!(product.ambient_dimension(),3);
    assert!(product.point_in_set(&vec(&[0.5,-0.5,7.0]),1e-9));
    assert!(! product.point_in_set(&vec(&[0.5,-0.5,7.1]),1e-9));
    assert_eq!(product.maybe_get_point(),None);
}

#[test]
fn scaled_membership() {
    let h = HPolyhedron::make_unit_box(2);
    let mut prog = MathematicalProgram::new();
    let x = prog.new_continuous_variables(2,"x");
    let t = prog.new_continuous_variables(1,"t");
    h.add_point_in_nonnegative_scaling_constraints(& mut prog,&x,&t[0]).unwrap();
    prog.add_bounding_box_constraint(vec(&[3.0]),vec(&[3.0]),&x[..1]).unwrap();
    prog.add_linear_cost(vec(&[1.0]),0.0,&t).unwrap();
    let r = solvers::solve(&prog).unwrap();
    assert!(r.is_success());
    assert_abs_diff_eq!(r.get_solution(&t[0]),3.0,epsilon = 1e-5);
}

#[test]
fn scene_obstacles() {
    let mut scene = SceneGeometry::new();
    let frame = scene.add_frame("table",Isometry3::translation(1.0,0.0,0.0));
    scene.add_geometry(frame,"block",Isometry3::identity(),Shape::Box{ width : 0.2, depth : 0.2, height : 0.2 }).unwrap();
    scene.add_geometry(FrameId::world(),"ball",Isometry3::translation(0.0,0.0,1.0),Shape::Sphere{ radius : 0.1 }).unwrap();

    let obstacles = make_iris_obstacles(&scene,FrameId::world()).unwrap();
    assert_eq!(obstacles.len(),2);
    assert!(obstacles.iter().any(|o| o.point_in_set(&vec(&[1.05,0.0,0.0]),1e-9)));
    assert!(obstacles.iter().any(|o| o.point_in_set(&vec(&[0.0,0.05,1.0]),1e-9)));
    assert!(obstacles.iter().all(|o| ! o.point_in_set(&vec(&[0.0,0.0,0.0]),1e-9)));
}

#[test]
fn write_obj() {
    // a simplex with one interior point
    let v = VPolytope::new(DMatrix::from_column_slice(3,5,&[0.0,0.0,0.0,
                                                            1.0,0.0,0.0,
                                                            0.0,1.0,0.0,
                                                            0.0,0.0,1.0,
                                                            0.1,0.1,0.1]));
    let path = std::env::temp_dir().join(format!("convexsets-simplex-{}.obj",std::process::id()));
    v.write_obj(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(),4);
    assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(),4);
    std::fs::remove_file(&path).unwrap();

    assert!(VPolytope::make_unit_box(2).unwrap().write_obj(&path).is_err());
}
