use std::any::Any;
use std::collections::HashMap;

use nalgebra::DVector;

use crate::error::{Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,Variable};
use super::{add_homogenized_constraint,ConvexSet};

/// The feasible set of a semidefinite program, in the space of all its decision variables.
///
/// Supported constraints are positive semidefinite, linear matrix inequality, linear, linear
/// equality and bounding box constraints. Costs are ignored.
#[derive(Clone,Debug,Default)]
pub struct Spectrahedron {
    vars        : Vec<Variable>,
    constraints : Vec<Binding<Constraint>>,
}

impl Spectrahedron {
    pub fn new(prog : &MathematicalProgram) -> Result<Spectrahedron> {
        for c in prog.constraints() {
            match c.evaluator() {
                Constraint::PositiveSemidefinite{..}
                | Constraint::LinearMatrixInequality{..}
                | Constraint::Linear{..}
                | Constraint::LinearEquality{..}
                | Constraint::BoundingBox{..} => {},
                other => return Err(Error::invalid(format!("Spectrahedron does not support {} constraints",crate::program::Evaluator::kind(other)))),
            }
        }
        Ok(Spectrahedron{ vars : prog.decision_variables().to_vec(), constraints : prog.constraints().to_vec() })
    }

    pub fn constraints(&self) -> &[Binding<Constraint>] { self.constraints.as_slice() }

    fn index(&self) -> HashMap<Variable,usize> {
        self.vars.iter().cloned().enumerate().map(|(i,v)| (v,i)).collect()
    }
}

impl ConvexSet for Spectrahedron {
    fn ambient_dimension(&self) -> usize { self.vars.len() }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "Spectrahedron" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        let index = self.index();
        self.constraints.iter().all(|c| {
            let v = DVector::from_iterator(c.variables().len(),c.variables().iter().map(|v| x[index[v]]));
            c.evaluator().check_satisfied(&v,tol)
        })
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let index = self.index();
        let mut cons = Vec::with_capacity(self.constraints.len());
        for c in self.constraints.iter() {
            let vars : Vec<Variable> = c.variables().iter().map(|v| x[index[v]].clone()).collect();
            cons.push(prog.add_constraint(c.rebind(vars)?)?);
        }
        Ok((Vec::new(),cons))
    }

    /// Each constraint is homogenized: the constant parts are multiplied by `t`.
    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        let index = self.index();
        let mut cons = Vec::with_capacity(self.constraints.len());
        for c in self.constraints.iter() {
            let xs : Vec<LinearExpr> = c.variables().iter().map(|v| x[index[v]].clone()).collect();
            cons.extend(add_homogenized_constraint(prog,c.evaluator(),&xs,t)?);
        }
        Ok(cons)
    }
}
