use std::any::Any;

use nalgebra::{DMatrix,DVector};

use crate::error::{check_dimension,Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,Variable};
use super::{add_eq_zero,feasibility,membership_or_warn,ConvexSet,ConvexSets};

/// The sum `{ x₁ + x₂ + ... : xᵢ ∈ Sᵢ }`.
#[derive(Clone,Debug,Default)]
pub struct MinkowskiSum {
    sets : ConvexSets,
    dim  : usize,
}

impl MinkowskiSum {
    /// Fails with [Error::DimensionMismatch] unless all terms have the same dimension.
    pub fn new(sets : ConvexSets) -> Result<MinkowskiSum> {
        let dim = sets.first().map(|s| s.ambient_dimension()).unwrap_or(0);
        for s in sets.iter() {
            check_dimension(dim,s.ambient_dimension())?;
        }
        Ok(MinkowskiSum{ sets, dim })
    }

    pub fn num_terms(&self) -> usize { self.sets.len() }

    pub fn term(&self, i : usize) -> Result<&dyn ConvexSet> {
        self.sets.get(i)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::invalid(format!("term index {} out of range ({} terms)",i,self.sets.len())))
    }

    /// Add `x = Σ yᵢ` for new variables `yᵢ`, one vector per term.
    fn add_sum(&self, prog : & mut MathematicalProgram, x : &[LinearExpr]) -> Result<(Vec<Vec<Variable>>,Binding<Constraint>)> {
        let ys : Vec<Vec<Variable>> = (0..self.sets.len())
            .map(|i| prog.new_continuous_variables(self.dim,format!("y{}",i).as_str()))
            .collect();
        let rows : Vec<LinearExpr> = (0..self.dim)
            .map(|j| {
                let mut e = x[j].clone();
                for y in ys.iter() { e.add_term(&y[j],-1.0); }
                e
            })
            .collect();
        let c = add_eq_zero(prog,&rows)?;
        Ok((ys,c))
    }
}

impl ConvexSet for MinkowskiSum {
    fn ambient_dimension(&self) -> usize { self.dim }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "MinkowskiSum" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        membership_or_warn(self.type_name(),self.do_try_point_in_set(x,tol))
    }

    fn do_try_point_in_set(&self, x : &DVector<f64>, tol : f64) -> Result<bool> {
        if self.sets.is_empty() {
            return Ok(false);
        }
        let mut prog = MathematicalProgram::new();
        let mut total : Vec<LinearExpr> = vec![LinearExpr::new(); self.dim];
        for s in self.sets.iter() {
            let y = prog.new_continuous_variables(self.dim,"y");
            s.add_point_in_set_constraints(& mut prog,&y)?;
            for (e,yi) in total.iter_mut().zip(y.iter()) { e.add_term(yi,1.0); }
        }
        let (a,b,vars) = crate::program::decompose(&total);
        let lb = x - &b - DVector::from_element(self.dim,tol);
        let ub = x - &b + DVector::from_element(self.dim,tol);
        prog.add_linear_constraint(a,lb,ub,&vars)?;
        feasibility(&prog)
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let xe : Vec<LinearExpr> = x.iter().map(LinearExpr::from).collect();
        let (ys,sum) = self.add_sum(prog,&xe)?;
        let mut newvars = Vec::new();
        let mut cons = vec![sum];
        for (s,y) in self.sets.iter().zip(ys.into_iter()) {
            let (v,c) = s.add_point_in_set_constraints(prog,&y)?;
            newvars.extend(y);
            newvars.extend(v);
            cons.extend(c);
        }
        Ok((newvars,cons))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        let (ys,sum) = self.add_sum(prog,x)?;
        let mut cons = vec![sum];
        for (s,y) in self.sets.iter().zip(ys.iter()) {
            let ye : Vec<LinearExpr> = y.iter().map(LinearExpr::from).collect();
            cons.extend(s.do_add_point_in_nonnegative_scaling_constraints(prog,&ye,t)?);
        }
        Ok(cons)
    }

    fn do_is_empty(&self) -> Result<bool> {
        if self.sets.is_empty() {
            return Ok(true);
        }
        for s in self.sets.iter() {
            if s.is_empty()? { return Ok(true); }
        }
        Ok(false)
    }

    fn do_is_bounded(&self) -> Result<bool> {
        if self.do_is_empty()? {
            return Ok(true);
        }
        for s in self.sets.iter() {
            if ! s.is_bounded()? { return Ok(false); }
        }
        Ok(true)
    }

    fn do_maybe_get_point(&self) -> Option<DVector<f64>> {
        if self.sets.is_empty() {
            return None;
        }
        self.sets.iter().try_fold(DVector::zeros(self.dim),|acc,s| s.maybe_get_point().map(|p| acc + p))
    }
}

/// The segment between two points, as a V-polytope.
pub(crate) fn segment(p : &DVector<f64>, q : &DVector<f64>) -> super::VPolytope {
    super::VPolytope::new(DMatrix::from_columns(&[p.clone(),q.clone()]))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{CartesianProduct,HPolyhedron,Hyperellipsoid,Point};
    use crate::geometry::testing::Unsolvable;

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    #[test]
    fn points() {
        let s = MinkowskiSum::new(vec![Box::new(Point::new(vec(&[1.2,3.4]))),
                                       Box::new(Point::new(vec(&[5.6,7.8])))]).unwrap();
        assert_eq!(s.num_terms(),2);
        assert_eq!(s.ambient_dimension(),2);
        assert!(s.term(0).is_ok());
        assert!(s.term(2).is_err());
        assert!(s.point_in_set(&vec(&[6.8,11.2]),1e-6));
        assert!(!s.point_in_set(&vec(&[6.8,11.3]),1e-6));
        assert_eq!(s.maybe_get_point(),Some(vec(&[6.8,11.2])));
        assert!(!s.is_empty().unwrap());
        assert!(s.is_bounded().unwrap());
    }

    #[test]
    fn dimension_mismatch() {
        let r = MinkowskiSum::new(vec![Box::new(Point::new(vec(&[1.0]))),
                                       Box::new(Point::new(vec(&[1.0,2.0])))]);
        assert!(matches!(r,Err(Error::DimensionMismatch{..})));
    }

    #[test]
    fn capsule_like() {
        let seg = segment(&vec(&[0.0,0.0]),&vec(&[2.0,0.0]));
        let s = MinkowskiSum::new(vec![Box::new(seg),Box::new(Hyperellipsoid::make_unit_ball(2))]).unwrap();
        assert!(s.point_in_set(&vec(&[1.0,0.9]),1e-6));
        assert!(s.point_in_set(&vec(&[2.9,0.0]),1e-6));
        assert!(!s.point_in_set(&vec(&[3.1,0.0]),1e-6));
        assert!(!s.point_in_set(&vec(&[1.0,1.1]),1e-6));
        assert!(s.maybe_get_point().is_none());
    }

    #[test]
    fn membership_failure() {
        let s = MinkowskiSum::new(vec![Box::new(HPolyhedron::make_unit_box(2)),
                                       Box::new(Unsolvable{ dim : 2 })]).unwrap();
        let x = vec(&[0.0,0.0]);
        assert!(matches!(s.try_point_in_set(&x,1e-6),Err(Error::SolverFailure(_))));
        assert!(!s.point_in_set(&x,1e-6));

        let p = CartesianProduct::new(vec![Box::new(Point::new(vec(&[1.0]))),Box::new(s)]);
        assert!(matches!(p.try_point_in_set(&vec(&[1.0,0.0,0.0]),1e-6),Err(Error::SolverFailure(_))));
        assert!(!p.try_point_in_set(&vec(&[2.0,0.0,0.0]),1e-6).unwrap());
    }

    #[test]
    fn constraints() {
        let s = MinkowskiSum::new(vec![Box::new(HPolyhedron::make_unit_box(2)),
                                       Box::new(Point::new(vec(&[3.0,0.0])))]).unwrap();
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        let (newvars,cons) = s.add_point_in_set_constraints(& mut prog,&x).unwrap();
        assert_eq!(newvars.len(),4);
        assert_eq!(cons.len(),3);
        prog.add_linear_cost(vec(&[1.0,0.0]),0.0,&x).unwrap();
        let r = crate::solvers::solve(&prog).unwrap();
        assert!(r.is_success());
        assert!((r.get_optimal_cost() - 2.0).abs() < 1e-6);

        let t = prog.new_continuous_variables(1,"t");
        let cons = s.add_point_in_nonnegative_scaling_constraints(& mut prog,&x,&t[0]).unwrap();
        assert_eq!(cons.len(),4);
    }
}
