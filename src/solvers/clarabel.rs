//! Backend using the Clarabel interior point solver.
//!
//! Clarabel solves
//! ```text
//! minimize ½ xᵀPx + qᵀx  subject to  A x + s = b, s ∈ K
//! ```
//! so a standard form row block `a x + b ∈ K` becomes `A = -a`, `b = b`. Rotated quadratic cones
//! are rewritten as quadratic cones and exponential cones are permuted into Clarabel's
//! `(x,y,z) : y exp(x/y) ≤ z` ordering. Semidefinite blocks arrive as the scaled lower triangle
//! by columns and are reordered into Clarabel's scaled upper triangle by columns; both use the
//! `√2` off-diagonal scaling.

use std::f64::consts::FRAC_1_SQRT_2;

use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings,DefaultSolver,IPSolver,SolverStatus,SupportedConeT};
use nalgebra::DVector;
use tracing::{debug,warn};

use crate::error::{Error,Result};
use crate::program::{MathematicalProgram,MathematicalProgramResult,SolutionResult};
use crate::utils::Cummulate;
use super::{SolverId,SolverInterface,SolverOptions};
use super::branch_and_bound::{branch_and_bound,BranchAndBoundParameters,RelaxationSolution};
use super::standard_form::{ConeType,ConicProblem};

/// The default conic backend.
///
/// Supports linear, quadratic, second order, rotated second order, exponential cone and
/// semidefinite constraints, and binary variables through branch-and-bound.
///
/// Recognized options (keyed by [ClarabelSolver::id]):
/// `verbose`, `max_iter`, `time_limit`, `tol_gap_abs`, `tol_gap_rel`, `tol_feas`,
/// `tol_infeas_abs`, `tol_infeas_rel`, `equilibrate_enable` and, for mixed-binary problems,
/// `max_nodes`.
#[derive(Clone,Copy,Debug,Default)]
pub struct ClarabelSolver {}

impl ClarabelSolver {
    pub fn new() -> ClarabelSolver { ClarabelSolver{} }
    pub fn id() -> SolverId { SolverId::new("Clarabel") }

    fn settings(&self, options : &SolverOptions) -> (DefaultSettings<f64>,BranchAndBoundParameters) {
        let mut settings = DefaultSettings::<f64>{ verbose : false, .. DefaultSettings::default() };
        let mut bb = BranchAndBoundParameters::default();
        for (name,value) in options.get_options(&ClarabelSolver::id()) {
            let ok = match name.as_str() {
                "verbose"            => value.as_bool().map(|v| settings.verbose = v),
                "max_iter"           => value.as_i64().map(|v| settings.max_iter = v.max(0) as u32),
                "time_limit"         => value.as_f64().map(|v| settings.time_limit = v),
                "tol_gap_abs"        => value.as_f64().map(|v| settings.tol_gap_abs = v),
                "tol_gap_rel"        => value.as_f64().map(|v| settings.tol_gap_rel = v),
                "tol_feas"           => value.as_f64().map(|v| settings.tol_feas = v),
                "tol_infeas_abs"     => value.as_f64().map(|v| settings.tol_infeas_abs = v),
                "tol_infeas_rel"     => value.as_f64().map(|v| settings.tol_infeas_rel = v),
                "equilibrate_enable" => value.as_bool().map(|v| settings.equilibrate_enable = v),
                "max_nodes"          => value.as_i64().map(|v| bb.max_nodes = v.max(1) as usize),
                _ => None
            };
            if ok.is_none() {
                warn!("Clarabel: ignoring option {} = {:?}",name,value);
            }
        }
        (settings,bb)
    }

    fn solve_relaxation(&self, p : &ConicProblem, settings : &DefaultSettings<f64>) -> Result<RelaxationSolution> {
        let n = p.numvar.max(1);

        let mut q = p.c.clone();
        q.resize(n,0.0);

        let ptrip : Vec<(usize,usize,f64)> = itertools::izip!(p.q_subi.iter(),p.q_subj.iter(),p.q_cof.iter())
            .map(|(&i,&j,&v)| (j,i,v)) // upper triangle
            .collect();
        let pmat = csc_from_triplets(n,n,ptrip);

        let mut atrip : Vec<(usize,usize,f64)> = Vec::with_capacity(p.a_subj.len());
        let mut b : Vec<f64> = Vec::with_capacity(p.num_rows());
        let mut cones : Vec<SupportedConeT<f64>> = Vec::with_capacity(p.cones.len());
        let rows : Vec<(&[usize],&[f64],f64)> = p.rows().collect();

        let push_row = |terms : Vec<(usize,f64)>, rhs : f64, atrip : & mut Vec<(usize,usize,f64)>, b : & mut Vec<f64>| {
            let r = b.len();
            atrip.extend(terms.into_iter().map(|(j,v)| (r,j,-v)));
            b.push(rhs);
        };
        let terms = |i : usize| -> Vec<(usize,f64)> { rows[i].0.iter().cloned().zip(rows[i].1.iter().cloned()).collect() };

        for block in p.cones.iter() {
            match block.cone {
                ConeType::Zero | ConeType::NonNegative | ConeType::QuadraticCone => {
                    for i in block.first..block.first+block.num {
                        push_row(terms(i),rows[i].2,& mut atrip,& mut b);
                    }
                    cones.push(match block.cone {
                        ConeType::Zero        => SupportedConeT::ZeroConeT(block.num),
                        ConeType::NonNegative => SupportedConeT::NonnegativeConeT(block.num),
                        _                     => SupportedConeT::SecondOrderConeT(block.num),
                    });
                },
                ConeType::RotatedQuadraticCone => {
                    let (i0,i1) = (block.first,block.first+1);
                    let w0 = terms(i0);
                    let w1 = terms(i1);
                    let plus  = w0.iter().map(|&(j,v)| (j,v*FRAC_1_SQRT_2)).chain(w1.iter().map(|&(j,v)| (j,v*FRAC_1_SQRT_2))).collect();
                    let minus = w0.iter().map(|&(j,v)| (j,v*FRAC_1_SQRT_2)).chain(w1.iter().map(|&(j,v)| (j,-v*FRAC_1_SQRT_2))).collect();
                    push_row(plus, (rows[i0].2+rows[i1].2)*FRAC_1_SQRT_2,& mut atrip,& mut b);
                    push_row(minus,(rows[i0].2-rows[i1].2)*FRAC_1_SQRT_2,& mut atrip,& mut b);
                    for i in block.first+2..block.first+block.num {
                        push_row(terms(i),rows[i].2,& mut atrip,& mut b);
                    }
                    cones.push(SupportedConeT::SecondOrderConeT(block.num));
                },
                ConeType::ExponentialCone => {
                    for i in [block.first+2,block.first+1,block.first] {
                        push_row(terms(i),rows[i].2,& mut atrip,& mut b);
                    }
                    cones.push(SupportedConeT::ExponentialConeT());
                },
                ConeType::SVecPSDCone => {
                    let n = psd_order(block.num)?;
                    // row of entry (c,r), c ≥ r, in the lower triangle by columns
                    for c in 0..n {
                        for r in 0..=c {
                            let i = block.first + r*(2*n-r+1)/2 + (c-r);
                            push_row(terms(i),rows[i].2,& mut atrip,& mut b);
                        }
                    }
                    cones.push(SupportedConeT::PSDTriangleConeT(n));
                }
            }
        }

        let amat = csc_from_triplets(b.len(),n,atrip);
        let mut solver = DefaultSolver::new(&pmat,&q,&amat,&b,&cones,settings.clone());
        solver.solve();

        let status = solver.solution.status;
        let result_status = match status {
            SolverStatus::Solved       => SolutionResult::Success,
            SolverStatus::AlmostSolved => {
                debug!("Clarabel: solved to reduced accuracy");
                SolutionResult::Success
            },
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => SolutionResult::InfeasibleConstraints,
            SolverStatus::DualInfeasible   | SolverStatus::AlmostDualInfeasible   => SolutionResult::Unbounded,
            SolverStatus::MaxIterations    | SolverStatus::MaxTime                => SolutionResult::IterationLimit,
            _ => SolutionResult::SolverSpecificError,
        };
        let x : Vec<f64> = solver.solution.x.iter().take(p.numvar).cloned().collect();
        let objective = if x.len() == p.numvar { p.objective_value(&x) } else { f64::NAN };
        debug!("Clarabel: status {:?}, objective {}",status,objective);
        Ok(RelaxationSolution{
            status    : result_status,
            x,
            objective,
            details   : format!("Clarabel status: {:?}",status),
        })
    }
}

/// The order `n` of a semidefinite block with `n(n+1)/2` rows.
fn psd_order(num : usize) -> Result<usize> {
    let mut n = 0;
    while n*(n+1)/2 < num { n += 1; }
    if n*(n+1)/2 == num { Ok(n) }
    else { Err(Error::solver(format!("a semidefinite block can not have {} rows",num))) }
}

fn csc_from_triplets(m : usize, n : usize, mut trip : Vec<(usize,usize,f64)>) -> CscMatrix<f64> {
    trip.sort_by(|a,b| (a.1,a.0).cmp(&(b.1,b.0)));
    let mut colptr = vec![0usize; n+1];
    let mut rowval = Vec::with_capacity(trip.len());
    let mut nzval : Vec<f64> = Vec::with_capacity(trip.len());
    let mut last : Option<(usize,usize)> = None;
    for (i,j,v) in trip.into_iter() {
        if last == Some((i,j)) {
            if let Some(z) = nzval.last_mut() { *z += v; }
        }
        else {
            rowval.push(i);
            nzval.push(v);
            colptr[j+1] += 1;
            last = Some((i,j));
        }
    }
    colptr.cummulate();
    CscMatrix::new(m,n,colptr,rowval,nzval)
}

impl SolverInterface for ClarabelSolver {
    fn solver_id(&self) -> SolverId { ClarabelSolver::id() }

    fn check_program(&self, prog : &MathematicalProgram) -> Result<()> {
        ConicProblem::from_program(prog).map(|_| ())
    }

    fn solve(&self, prog : &MathematicalProgram, _initial_guess : Option<&DVector<f64>>, options : &SolverOptions) -> Result<MathematicalProgramResult> {
        let p = ConicProblem::from_program(prog)?;
        let (settings,bb) = self.settings(options);

        let sol =
            if p.has_integer_variables() {
                branch_and_bound(&p,&bb,|node| self.solve_relaxation(node,&settings))?
            }
            else {
                self.solve_relaxation(&p,&settings)?
            };

        let mut result = MathematicalProgramResult::new(ClarabelSolver::id());
        result.set_solution_result(sol.status);
        result.set_solver_details(sol.details);
        if matches!(sol.status, SolutionResult::Success | SolutionResult::IterationLimit) && sol.x.len() >= p.numdecision {
            result.set_values(prog.decision_variables(),&DVector::from_column_slice(&sol.x[..p.numdecision]));
            result.set_optimal_cost(sol.objective);
        }
        else if sol.status == SolutionResult::Unbounded {
            result.set_optimal_cost(f64::NEG_INFINITY);
        }
        else if sol.status == SolutionResult::InfeasibleConstraints {
            result.set_optimal_cost(f64::INFINITY);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{DMatrix,DVector};

    #[test]
    fn small_lp() {
        // minimize -x - y s.t. x + 2y ≤ 4, 3x + y ≤ 6, x,y ≥ 0
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        prog.add_linear_constraint(DMatrix::from_row_slice(2,2,&[1.0,2.0, 3.0,1.0]),
                                   DVector::from_element(2,f64::NEG_INFINITY),
                                   DVector::from_vec(vec![4.0,6.0]),&x).unwrap();
        prog.add_bounding_box_constraint(DVector::zeros(2),DVector::from_element(2,f64::INFINITY),&x).unwrap();
        prog.add_linear_cost(DVector::from_vec(vec![-1.0,-1.0]),0.0,&x).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert!((r.get_optimal_cost() + 2.8).abs() < 1e-6);
        assert!((r.get_solution(&x[0]) - 1.6).abs() < 1e-5);
    }

    #[test]
    fn rotated_cone_and_l2norm() {
        // minimize |x - (3,4)| s.t. x₀ x₁ ≥ 1
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        prog.add_l2norm_cost(DMatrix::identity(2,2),DVector::from_vec(vec![-3.0,-4.0]),&x).unwrap();
        prog.add_rotated_lorentz_cone_constraint(DMatrix::from_row_slice(3,2,&[1.0,0.0, 0.0,1.0, 0.0,0.0]),
                                                 DVector::from_vec(vec![0.0,0.0,1.0]),&x).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert!(r.get_optimal_cost().abs() < 1e-6);
    }

    #[test]
    fn infeasible_lp() {
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(1,"x");
        prog.add_bounding_box_constraint(DVector::from_element(1,1.0),DVector::from_element(1,0.0),&x).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert_eq!(r.solution_result(),SolutionResult::InfeasibleConstraints);
    }

    #[test]
    fn binary_knapsack() {
        // maximize 5a + 4b + 3c s.t. 2a + 3b + c ≤ 4 -> a = c = 1
        let mut prog = MathematicalProgram::new();
        let x = prog.new_binary_variables(3,"x");
        prog.add_linear_constraint(DMatrix::from_row_slice(1,3,&[2.0,3.0,1.0]),
                                   DVector::from_element(1,f64::NEG_INFINITY),
                                   DVector::from_element(1,4.0),&x).unwrap();
        prog.add_linear_cost(DVector::from_vec(vec![-5.0,-4.0,-3.0]),0.0,&x).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert_eq!(r.get_solution_vec(&x),DVector::from_vec(vec![1.0,0.0,1.0]));
        assert!((r.get_optimal_cost() + 8.0).abs() < 1e-6);
    }

    #[test]
    fn semidefinite_2x2() {
        // minimize X₀₀ + X₁₁ s.t. X₁₀ = 1, X ⪰ 0 -> X = [1 1; 1 1]
        let mut prog = MathematicalProgram::new();
        let x = prog.new_symmetric_continuous_variables(2,"X");
        prog.add_positive_semidefinite_constraint(&x).unwrap();
        prog.add_bounding_box_constraint(DVector::from_element(1,1.0),DVector::from_element(1,1.0),&[x[1][0].clone()]).unwrap();
        prog.add_linear_cost(DVector::from_element(2,1.0),0.0,&[x[0][0].clone(),x[1][1].clone()]).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert!((r.get_optimal_cost() - 2.0).abs() < 1e-5);
        assert!((r.get_solution(&x[0][0]) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn semidefinite_3x3_entry_order() {
        // unit diagonal, X₁₀ = X₂₁ = 0.9: det X ≥ 0 gives X₂₀ ∈ [0.62,1]
        let mut prog = MathematicalProgram::new();
        let x = prog.new_symmetric_continuous_variables(3,"X");
        prog.add_positive_semidefinite_constraint(&x).unwrap();
        let fixed = [x[0][0].clone(),x[1][1].clone(),x[2][2].clone(),x[1][0].clone(),x[2][1].clone()];
        prog.add_bounding_box_constraint(DVector::from_vec(vec![1.0,1.0,1.0,0.9,0.9]),
                                         DVector::from_vec(vec![1.0,1.0,1.0,0.9,0.9]),
                                         &fixed).unwrap();
        prog.add_linear_cost(DVector::from_element(1,1.0),0.0,&[x[2][0].clone()]).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert!((r.get_optimal_cost() - 0.62).abs() < 1e-5);

        prog.add_linear_cost(DVector::from_element(1,-2.0),0.0,&[x[2][0].clone()]).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert!((r.get_solution(&x[2][0]) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn linear_matrix_inequality() {
        // maximize y s.t. [[1, y], [y, 1]] ⪰ 0 -> y = 1
        let mut prog = MathematicalProgram::new();
        let y = prog.new_continuous_variables(1,"y");
        prog.add_linear_matrix_inequality_constraint(vec![DMatrix::identity(2,2),
                                                          DMatrix::from_row_slice(2,2,&[0.0,1.0, 1.0,0.0])],&y).unwrap();
        prog.add_linear_cost(DVector::from_element(1,-1.0),0.0,&y).unwrap();
        let r = ClarabelSolver::new().solve(&prog,None,&SolverOptions::new()).unwrap();
        assert!(r.is_success());
        assert!((r.get_solution(&y[0]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn semidefinite_block_sizes() {
        assert_eq!(psd_order(1).unwrap(),1);
        assert_eq!(psd_order(6).unwrap(),3);
        assert!(psd_order(5).is_err());
    }
}
