use std::any::Any;

use nalgebra::{DMatrix,DVector};

use crate::error::{check_dimension,Error,Result};
use crate::program::{compose,Binding,Constraint,LinearExpr,MathematicalProgram,Variable};
use super::{add_eq_zero,generic_is_bounded,membership_or_warn,ConvexSet,ConvexSets};

/// The product `S₁ × S₂ × ...`, optionally pulled back through an affine map: the set
/// `{ x : A x + b ∈ S₁ × S₂ × ... }`.
#[derive(Clone,Debug,Default)]
pub struct CartesianProduct {
    sets : ConvexSets,
    map  : Option<(DMatrix<f64>,DVector<f64>)>,
}

impl CartesianProduct {
    pub fn new(sets : ConvexSets) -> CartesianProduct {
        CartesianProduct{ sets, map : None }
    }

    /// The set `{ x : A x + b ∈ S₁ × S₂ × ... }`. `A` must have as many rows as the product has
    /// dimensions.
    pub fn with_affine_map(sets : ConvexSets, a : DMatrix<f64>, b : DVector<f64>) -> Result<CartesianProduct> {
        let dim : usize = sets.iter().map(|s| s.ambient_dimension()).sum();
        check_dimension(dim,a.nrows())?;
        check_dimension(dim,b.len())?;
        Ok(CartesianProduct{ sets, map : Some((a,b)) })
    }

    pub fn num_factors(&self) -> usize { self.sets.len() }

    pub fn factor(&self, i : usize) -> Result<&dyn ConvexSet> {
        self.sets.get(i)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::invalid(format!("factor index {} out of range ({} factors)",i,self.sets.len())))
    }

    #[allow(non_snake_case)]
    pub fn A(&self) -> Option<&DMatrix<f64>> { self.map.as_ref().map(|m| &m.0) }
    pub fn b(&self) -> Option<&DVector<f64>> { self.map.as_ref().map(|m| &m.1) }

    fn product_dimension(&self) -> usize { self.sets.iter().map(|s| s.ambient_dimension()).sum() }
}

impl ConvexSet for CartesianProduct {
    fn ambient_dimension(&self) -> usize {
        match &self.map {
            Some((a,_)) => a.ncols(),
            None        => self.product_dimension()
        }
    }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "CartesianProduct" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        membership_or_warn(self.type_name(),self.do_try_point_in_set(x,tol))
    }

    fn do_try_point_in_set(&self, x : &DVector<f64>, tol : f64) -> Result<bool> {
        let y = match &self.map {
            Some((a,b)) => a * x + b,
            None        => x.clone()
        };
        let mut offset = 0;
        for s in self.sets.iter() {
            let d = s.ambient_dimension();
            if ! s.try_point_in_set(&y.rows(offset,d).into_owned(),tol)? {
                return Ok(false);
            }
            offset += d;
        }
        Ok(true)
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let mut newvars = Vec::new();
        let mut cons = Vec::new();
        let y = match &self.map {
            Some((a,b)) => {
                // y = A x + b
                let y = prog.new_continuous_variables(self.product_dimension(),"y");
                let rows : Vec<LinearExpr> = compose(a,b,x).into_iter().zip(y.iter())
                    .map(|(e,yi)| e - yi)
                    .collect();
                cons.push(add_eq_zero(prog,&rows)?);
                newvars.extend(y.iter().cloned());
                y
            },
            None => x.to_vec()
        };
        let mut offset = 0;
        for s in self.sets.iter() {
            let d = s.ambient_dimension();
            let (v,c) = s.add_point_in_set_constraints(prog,&y[offset..offset+d])?;
            newvars.extend(v);
            cons.extend(c);
            offset += d;
        }
        Ok((newvars,cons))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        // A x + b t ∈ t·(S₁ × S₂ × ...)
        let y : Vec<LinearExpr> = match &self.map {
            Some((a,b)) => (0..a.nrows())
                .map(|i| {
                    let mut e = t.clone() * b[i];
                    for (j,xj) in x.iter().enumerate() {
                        if a[(i,j)] != 0.0 { e += xj.clone() * a[(i,j)]; }
                    }
                    e
                })
                .collect(),
            None => x.to_vec()
        };
        let mut cons = Vec::new();
        let mut offset = 0;
        for s in self.sets.iter() {
            let d = s.ambient_dimension();
            cons.extend(s.do_add_point_in_nonnegative_scaling_constraints(prog,&y[offset..offset+d],t)?);
            offset += d;
        }
        Ok(cons)
    }

    fn do_is_empty(&self) -> Result<bool> {
        if self.map.is_some() {
            return super::generic_is_empty(self);
        }
        for s in self.sets.iter() {
            if s.is_empty()? { return Ok(true); }
        }
        Ok(false)
    }

    fn do_is_bounded(&self) -> Result<bool> {
        if self.map.is_some() {
            return generic_is_bounded(self);
        }
        for s in self.sets.iter() {
            if ! s.is_bounded()? { return Ok(false); }
        }
        Ok(true)
    }

    fn do_maybe_get_point(&self) -> Option<DVector<f64>> {
        if self.map.is_some() {
            return None;
        }
        let points : Option<Vec<DVector<f64>>> = self.sets.iter().map(|s| s.maybe_get_point()).collect();
        points.map(|ps| DVector::from_iterator(self.product_dimension(),ps.iter().flat_map(|p| p.iter().cloned())))
    }
}
