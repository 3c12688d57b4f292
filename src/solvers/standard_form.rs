//! Conic standard form shared by the solver backends.
//!
//! A [ConicProblem] is
//! ```text
//! minimize    ½ xᵀ P x + cᵀ x + cfix
//! subject to  A x + b ∈ K₁ × K₂ × ... × Kₚ
//!             xⱼ ∈ {0,1} for integer j
//! ```
//! where the rows of `A` are stored row-wise (`a_ptr`, `a_subj`, `a_cof`) and partitioned into
//! consecutive cone blocks. Cones follow the conventions below:
//!
//! - `Zero`: `z = 0`
//! - `NonNegative`: `z ≥ 0`
//! - `QuadraticCone`: `z₀ ≥ |z₁..|`
//! - `RotatedQuadraticCone`: `2 z₀ z₁ ≥ |z₂..|²`, `z₀,z₁ ≥ 0`
//! - `ExponentialCone`: `z₀ ≥ z₁ exp(z₂/z₁)`, `z₁ > 0`
//! - `SVecPSDCone`: the scaled lower triangle (off-diagonal entries multiplied by `√2`, column
//!   by column) of a positive semidefinite matrix.
//!
//! The first `numdecision` variables are the program's decision variables, in order; the rest
//! are auxiliary epigraph variables introduced by the translation.

use std::f64::consts::SQRT_2;

use itertools::izip;
use nalgebra::{DMatrix,DVector};

use crate::error::{Error,Result};
use crate::program::{Constraint,Cost,Evaluator,MathematicalProgram,VariableType};
use crate::utils::ChunksByPtrExt;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ConeType {
    Zero,
    NonNegative,
    QuadraticCone,
    RotatedQuadraticCone,
    ExponentialCone,
    SVecPSDCone,
}

/// A block of consecutive rows belonging to one cone.
#[derive(Clone,Copy,Debug)]
pub struct ConeBlock {
    pub cone  : ConeType,
    pub first : usize,
    pub num   : usize,
}

type Row = (Vec<(usize,f64)>,f64);

#[derive(Clone,Debug,Default)]
pub struct ConicProblem {
    pub numvar      : usize,
    pub numdecision : usize,
    pub var_int     : Vec<bool>,

    pub c           : Vec<f64>,
    pub cfix        : f64,
    /// Lower triangular entries (`q_subi ≥ q_subj`) of `P`; duplicates are summed.
    pub q_subi      : Vec<usize>,
    pub q_subj      : Vec<usize>,
    pub q_cof       : Vec<f64>,

    pub a_ptr       : Vec<usize>,
    pub a_subj      : Vec<usize>,
    pub a_cof       : Vec<f64>,
    pub b           : Vec<f64>,

    pub cones       : Vec<ConeBlock>,
}

impl ConicProblem {
    fn with_variables(n : usize) -> ConicProblem {
        ConicProblem{
            numvar      : n,
            numdecision : n,
            var_int     : vec![false; n],
            c           : vec![0.0; n],
            a_ptr       : vec![0],
            .. Default::default()
        }
    }

    pub fn num_rows(&self) -> usize { self.b.len() }

    /// Iterate over rows as `(subj, cof, b)`.
    pub fn rows(&self) -> impl Iterator<Item=(&[usize],&[f64],f64)> {
        izip!(self.a_subj.chunks_ptr(&self.a_ptr),
              self.a_cof.chunks_ptr(&self.a_ptr),
              self.b.iter())
            .map(|(subj,cof,&b)| (subj,cof,b))
    }

    /// True if there are no quadratic terms and no cones other than `Zero` and `NonNegative`.
    pub fn is_linear(&self) -> bool {
        self.q_cof.iter().all(|&v| v == 0.0) &&
            self.cones.iter().all(|c| matches!(c.cone, ConeType::Zero | ConeType::NonNegative))
    }

    pub fn has_integer_variables(&self) -> bool { self.var_int.iter().any(|&v| v) }

    fn add_auxiliary_variable(& mut self) -> usize {
        self.numvar += 1;
        self.var_int.push(false);
        self.c.push(0.0);
        self.numvar - 1
    }

    /// Append a block of rows in the cone `cone`.
    pub fn append_block(& mut self, cone : ConeType, rows : Vec<Row>) {
        if rows.is_empty() { return; }
        let first = self.b.len();
        let num = rows.len();
        for (mut terms,b) in rows.into_iter() {
            terms.sort_by_key(|t| t.0);
            let mut last : Option<usize> = None;
            for (j,v) in terms.into_iter() {
                if last == Some(j) {
                    if let Some(c) = self.a_cof.last_mut() { *c += v; }
                }
                else {
                    self.a_subj.push(j);
                    self.a_cof.push(v);
                    last = Some(j);
                }
            }
            self.a_ptr.push(self.a_subj.len());
            self.b.push(b);
        }
        match self.cones.last_mut() {
            Some(last) if last.cone == cone && matches!(cone, ConeType::Zero | ConeType::NonNegative) && last.first + last.num == first => last.num += num,
            _ => self.cones.push(ConeBlock{ cone, first, num })
        }
    }

    /// Fix variable `j` to `value` by appending an equality row.
    pub fn fix_variable(& mut self, j : usize, value : f64) {
        self.append_block(ConeType::Zero, vec![(vec![(j,1.0)],-value)]);
    }

    /// Objective value at `x`.
    pub fn objective_value(&self, x : &[f64]) -> f64 {
        let lin : f64 = self.c.iter().zip(x.iter()).map(|(c,x)| c*x).sum();
        let quad : f64 = izip!(self.q_subi.iter(),self.q_subj.iter(),self.q_cof.iter())
            .map(|(&i,&j,&q)| if i == j { 0.5 * q * x[i] * x[i] } else { q * x[i] * x[j] })
            .sum();
        lin + quad + self.cfix
    }

    /// Build the standard form of a program.
    ///
    /// Binary variables get the bounds `[0,1]` and are marked as integer; whether integrality is
    /// honored is up to the caller.
    pub fn from_program(prog : &MathematicalProgram) -> Result<ConicProblem> {
        let mut p = ConicProblem::with_variables(prog.num_vars());

        let mut bin_rows = Vec::new();
        for (j,v) in prog.decision_variables().iter().enumerate() {
            if v.vartype() == VariableType::Binary {
                p.var_int[j] = true;
                bin_rows.push((vec![(j,1.0)],0.0));
                bin_rows.push((vec![(j,-1.0)],1.0));
            }
        }
        p.append_block(ConeType::NonNegative,bin_rows);

        for binding in prog.costs() {
            let idx = indexes(prog,binding.variables())?;
            match binding.evaluator() {
                Cost::Linear{a,b} => {
                    for (&j,&aj) in idx.iter().zip(a.iter()) { p.c[j] += aj; }
                    p.cfix += b;
                },
                Cost::Quadratic{q,a,b} => {
                    let qs = (q + q.transpose()) * 0.5;
                    for (k,&i) in idx.iter().enumerate() {
                        for (l,&j) in idx.iter().enumerate() {
                            if i >= j && qs[(k,l)] != 0.0 {
                                p.q_subi.push(i);
                                p.q_subj.push(j);
                                p.q_cof.push(qs[(k,l)]);
                            }
                        }
                    }
                    for (&j,&aj) in idx.iter().zip(a.iter()) { p.c[j] += aj; }
                    p.cfix += b;
                },
                Cost::L2Norm{a,b} => {
                    let s = p.add_auxiliary_variable();
                    p.c[s] += 1.0;
                    let mut rows = vec![(vec![(s,1.0)],0.0)];
                    rows.extend(affine_rows(a,b,&idx));
                    p.append_block(ConeType::QuadraticCone,rows);
                },
            }
        }

        for binding in prog.constraints() {
            let idx = indexes(prog,binding.variables())?;
            append_constraint(& mut p,binding.evaluator(),&idx)?;
        }
        Ok(p)
    }
}

fn indexes(prog : &MathematicalProgram, vars : &[crate::program::Variable]) -> Result<Vec<usize>> {
    vars.iter()
        .map(|v| prog.decision_variable_index(v).ok_or_else(|| Error::invalid(format!("variable {} is not a decision variable of the program",v))))
        .collect()
}

/// Rows `A v + b` with `v = x[idx]`.
fn affine_rows(a : &DMatrix<f64>, b : &DVector<f64>, idx : &[usize]) -> Vec<Row> {
    (0..a.nrows())
        .map(|r| (idx.iter().enumerate().filter(|(k,_)| a[(r,*k)] != 0.0).map(|(k,&j)| (j,a[(r,k)])).collect(), b[r]))
        .collect()
}

fn append_constraint(p : & mut ConicProblem, con : &Constraint, idx : &[usize]) -> Result<()> {
    if idx.len() != con.num_vars() {
        return Err(Error::invalid(format!("{} bound to {} variables",con.kind(),idx.len())));
    }
    match con {
        Constraint::Linear{a,lb,ub} => {
            let mut eq = Vec::new();
            let mut ineq = Vec::new();
            for r in 0..a.nrows() {
                let terms : Vec<(usize,f64)> = idx.iter().enumerate().filter(|(k,_)| a[(r,*k)] != 0.0).map(|(k,&j)| (j,a[(r,k)])).collect();
                if lb[r] == ub[r] {
                    eq.push((terms,-lb[r]));
                }
                else {
                    if ub[r] < f64::INFINITY {
                        ineq.push((terms.iter().map(|&(j,v)| (j,-v)).collect(),ub[r]));
                    }
                    if lb[r] > f64::NEG_INFINITY {
                        ineq.push((terms,-lb[r]));
                    }
                }
            }
            p.append_block(ConeType::Zero,eq);
            p.append_block(ConeType::NonNegative,ineq);
        },
        Constraint::LinearEquality{a,b} => {
            let rows = affine_rows(a,&(-b),idx);
            p.append_block(ConeType::Zero,rows);
        },
        Constraint::BoundingBox{lb,ub} => {
            let mut eq = Vec::new();
            let mut ineq = Vec::new();
            for (&j,&l,&u) in izip!(idx.iter(),lb.iter(),ub.iter()) {
                if l == u {
                    eq.push((vec![(j,1.0)],-l));
                }
                else {
                    if u < f64::INFINITY { ineq.push((vec![(j,-1.0)],u)); }
                    if l > f64::NEG_INFINITY { ineq.push((vec![(j,1.0)],-l)); }
                }
            }
            p.append_block(ConeType::Zero,eq);
            p.append_block(ConeType::NonNegative,ineq);
        },
        Constraint::LorentzCone{a,b} => {
            p.append_block(ConeType::QuadraticCone,affine_rows(a,b,idx));
        },
        Constraint::RotatedLorentzCone{a,b} => {
            // z₀ z₁ = 2 (z₀/2) z₁
            let mut rows = affine_rows(a,b,idx);
            rows[0].0.iter_mut().for_each(|t| t.1 *= 0.5);
            rows[0].1 *= 0.5;
            p.append_block(ConeType::RotatedQuadraticCone,rows);
        },
        Constraint::ExponentialCone{a,b} => {
            p.append_block(ConeType::ExponentialCone,affine_rows(a,b,idx));
        },
        Constraint::PositiveSemidefinite{rows : n} => {
            let n = *n;
            let mut rows = Vec::with_capacity(n*(n+1)/2);
            for j in 0..n {
                for i in j..n {
                    let s = if i == j { 1.0 } else { SQRT_2 };
                    rows.push((vec![(idx[j*n+i],s)],0.0));
                }
            }
            p.append_block(ConeType::SVecPSDCone,rows);
        },
        Constraint::LinearMatrixInequality{f} => {
            let n = f.first().map(|f0| f0.nrows()).unwrap_or(0);
            let mut rows = Vec::with_capacity(n*(n+1)/2);
            for j in 0..n {
                for i in j..n {
                    let s = if i == j { 1.0 } else { SQRT_2 };
                    let entry = |m : &DMatrix<f64>| 0.5 * (m[(i,j)] + m[(j,i)]) * s;
                    let terms = idx.iter().zip(f[1..].iter())
                        .map(|(&k,fk)| (k,entry(fk)))
                        .filter(|t| t.1 != 0.0)
                        .collect();
                    rows.push((terms,entry(&f[0])));
                }
            }
            p.append_block(ConeType::SVecPSDCone,rows);
        },
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn linear_rows_and_blocks() {
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        prog.add_linear_constraint(DMatrix::from_row_slice(2,2,&[1.0,1.0, 1.0,-1.0]),
                                   DVector::from_vec(vec![1.0,f64::NEG_INFINITY]),
                                   DVector::from_vec(vec![1.0,2.0]),
                                   &x).unwrap();
        prog.add_bounding_box_constraint(DVector::from_element(2,0.0),DVector::from_element(2,f64::INFINITY),&x).unwrap();
        let p = ConicProblem::from_program(&prog).unwrap();
        assert_eq!(p.num_rows(),4);
        assert_eq!(p.cones.len(),2);
        assert_eq!(p.cones[0].cone,ConeType::Zero);
        assert_eq!(p.cones[1].cone,ConeType::NonNegative);
        assert_eq!(p.cones[1].num,3);
        assert!(p.is_linear());
    }

    #[test]
    fn quadratic_cost_entries() {
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        prog.add_quadratic_cost(DMatrix::from_row_slice(2,2,&[2.0,1.0, 1.0,4.0]),DVector::zeros(2),0.0,&x).unwrap();
        let p = ConicProblem::from_program(&prog).unwrap();
        // ½ xᵀQx at x = (1,1) is ½(2 + 2 + 4)
        assert!((p.objective_value(&[1.0,1.0]) - 4.0).abs() < 1e-12);
    }
}
