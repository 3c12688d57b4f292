use std::any::Any;

use nalgebra::DVector;

use crate::error::{check_dimension,Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,Variable};
use super::{generic_is_bounded,generic_is_empty,membership_or_warn,ConvexSet,ConvexSets};

/// The intersection `S₁ ∩ S₂ ∩ ...`.
#[derive(Clone,Debug,Default)]
pub struct Intersection {
    sets : ConvexSets,
    dim  : usize,
}

impl Intersection {
    /// Fails with [Error::DimensionMismatch] unless all elements have the same dimension.
    pub fn new(sets : ConvexSets) -> Result<Intersection> {
        let dim = sets.first().map(|s| s.ambient_dimension()).unwrap_or(0);
        for s in sets.iter() {
            check_dimension(dim,s.ambient_dimension())?;
        }
        Ok(Intersection{ sets, dim })
    }

    pub fn num_elements(&self) -> usize { self.sets.len() }

    pub fn element(&self, i : usize) -> Result<&dyn ConvexSet> {
        self.sets.get(i)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::invalid(format!("element index {} out of range ({} elements)",i,self.sets.len())))
    }
}

impl ConvexSet for Intersection {
    fn ambient_dimension(&self) -> usize { self.dim }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "Intersection" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        membership_or_warn(self.type_name(),self.do_try_point_in_set(x,tol))
    }

    fn do_try_point_in_set(&self, x : &DVector<f64>, tol : f64) -> Result<bool> {
        for s in self.sets.iter() {
            if ! s.try_point_in_set(x,tol)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let mut newvars = Vec::new();
        let mut cons = Vec::new();
        for s in self.sets.iter() {
            let (v,c) = s.add_point_in_set_constraints(prog,x)?;
            newvars.extend(v);
            cons.extend(c);
        }
        Ok((newvars,cons))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        let mut cons = Vec::new();
        for s in self.sets.iter() {
            cons.extend(s.do_add_point_in_nonnegative_scaling_constraints(prog,x,t)?);
        }
        Ok(cons)
    }

    fn do_is_empty(&self) -> Result<bool> { generic_is_empty(self) }

    fn do_is_bounded(&self) -> Result<bool> {
        for s in self.sets.iter() {
            if s.is_bounded()? { return Ok(true); }
        }
        generic_is_bounded(self)
    }

    fn do_maybe_get_point(&self) -> Option<DVector<f64>> {
        let p = self.sets.iter().find_map(|s| s.maybe_get_point())?;
        if self.sets.iter().all(|s| s.point_in_set(&p,0.0)) { Some(p) } else { None }
    }
}
