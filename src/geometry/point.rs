use std::any::Any;

use nalgebra::{DVector,Isometry3,Translation3,UnitQuaternion};

use crate::error::{check_dimension,Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,Variable};
use super::{add_eq_zero,ConvexSet,RigidTransform,Shape};

/// A set containing exactly one point.
#[derive(Clone,Debug,Default,PartialEq)]
pub struct Point {
    x : DVector<f64>,
}

impl Point {
    pub fn new(x : DVector<f64>) -> Point { Point{ x } }

    pub fn x(&self) -> &DVector<f64> { &self.x }

    /// Move the point. The dimension can not change.
    pub fn set_x(& mut self, x : DVector<f64>) -> Result<()> {
        check_dimension(self.x.len(),x.len())?;
        self.x = x;
        Ok(())
    }
}

impl ConvexSet for Point {
    fn ambient_dimension(&self) -> usize { self.x.len() }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "Point" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        (x - &self.x).amax() <= tol
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let c = prog.add_bounding_box_constraint(self.x.clone(),self.x.clone(),x)?;
        Ok((Vec::new(),vec![c]))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        let rows : Vec<LinearExpr> = x.iter().zip(self.x.iter())
            .map(|(xi,&pi)| xi.clone() - t.clone() * pi)
            .collect();
        Ok(vec![add_eq_zero(prog,&rows)?])
    }

    fn do_is_empty(&self) -> Result<bool> { Ok(false) }
    fn do_is_bounded(&self) -> Result<bool> { Ok(true) }
    fn do_maybe_get_point(&self) -> Option<DVector<f64>> { Some(self.x.clone()) }

    /// A point in 3D is a sphere of radius zero.
    fn do_to_shape_with_pose(&self) -> Result<(Shape,RigidTransform)> {
        if self.x.len() != 3 {
            return Err(Error::invalid(format!("ToShapeWithPose requires a 3-dimensional Point, got dimension {}",self.x.len())));
        }
        Ok((Shape::Sphere{ radius : 0.0 },
            Isometry3::from_parts(Translation3::new(self.x[0],self.x[1],self.x[2]),UnitQuaternion::identity())))
    }
}
