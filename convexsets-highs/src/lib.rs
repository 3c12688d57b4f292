//! HiGHS backend for `convexsets`.
//!
//! Handles programs whose standard form is linear: linear costs, linear (in)equalities, bounds,
//! and binary variables. Anything else is rejected by [HighsSolver::check_program].
//!
//! ```ignore
//! use convexsets::gcs::GraphOfConvexSetsOptions;
//! use convexsets_highs::HighsSolver;
//!
//! let mut options = GraphOfConvexSetsOptions::default();
//! options.solver = Some(std::sync::Arc::new(HighsSolver::new()));
//! ```

use highs::{HighsModelStatus,RowProblem,Sense};
use itertools::izip;
use nalgebra::DVector;
use tracing::{debug,warn};

use convexsets::error::{Error,Result};
use convexsets::program::{MathematicalProgram,MathematicalProgramResult,SolutionResult};
use convexsets::solvers::standard_form::{ConeType,ConicProblem};
use convexsets::solvers::{OptionValue,SolverId,SolverInterface,SolverOptions};

/// LP/MILP backend.
///
/// Options keyed by [HighsSolver::id] are passed to HiGHS by name, e.g. `time_limit`,
/// `mip_rel_gap` or `output_flag`. Output is off unless `output_flag` is set.
#[derive(Clone,Copy,Debug,Default)]
pub struct HighsSolver {}

impl HighsSolver {
    pub fn new() -> HighsSolver { HighsSolver{} }
    pub fn id() -> SolverId { SolverId::new("HiGHS") }
}

fn standard_form(prog : &MathematicalProgram) -> Result<ConicProblem> {
    let p = ConicProblem::from_program(prog)?;
    if ! p.is_linear() {
        return Err(Error::SolverFailure("HiGHS only handles linear costs and constraints".to_string()));
    }
    Ok(p)
}

impl SolverInterface for HighsSolver {
    fn solver_id(&self) -> SolverId { HighsSolver::id() }

    fn check_program(&self, prog : &MathematicalProgram) -> Result<()> {
        standard_form(prog).map(|_| ())
    }

    fn solve(&self, prog : &MathematicalProgram, _initial_guess : Option<&DVector<f64>>, options : &SolverOptions) -> Result<MathematicalProgramResult> {
        let p = standard_form(prog)?;

        let mut pb = RowProblem::default();
        let cols : Vec<highs::Col> = p.c.iter().zip(p.var_int.iter())
            .map(|(&c,&int)| if int { pb.add_integer_column(c,f64::NEG_INFINITY..=f64::INFINITY) }
                             else   { pb.add_column(c,f64::NEG_INFINITY..=f64::INFINITY) })
            .collect();

        let rows : Vec<(&[usize],&[f64],f64)> = p.rows().collect();
        for block in p.cones.iter() {
            for &(subj,cof,b) in rows[block.first..block.first+block.num].iter() {
                let factors : Vec<(highs::Col,f64)> = izip!(subj.iter(),cof.iter()).map(|(&j,&v)| (cols[j],v)).collect();
                match block.cone {
                    ConeType::Zero        => pb.add_row(-b..=-b,&factors),
                    ConeType::NonNegative => pb.add_row(-b..=f64::INFINITY,&factors),
                    _ => return Err(Error::SolverFailure("HiGHS only handles linear costs and constraints".to_string())),
                };
            }
        }

        let mut model = pb.optimise(Sense::Minimise);
        model.set_option("output_flag",false);
        for (name,value) in options.get_options(&HighsSolver::id()) {
            match value {
                OptionValue::Double(v) => model.set_option(name.as_str(),v),
                OptionValue::Int(v)    => model.set_option(name.as_str(),v as i32),
                OptionValue::Str(s)    => model.set_option(name.as_str(),s.as_str()),
            }
        }

        debug!(vars = p.numvar, rows = rows.len(), integer = p.has_integer_variables(), "HiGHS: solving");
        let solved = model.solve();
        let status = solved.status();

        let mut result = MathematicalProgramResult::new(HighsSolver::id());
        result.set_solver_details(format!("{:?}",status));
        let sr = match status {
            HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => SolutionResult::Success,
            HighsModelStatus::Infeasible            => SolutionResult::InfeasibleConstraints,
            HighsModelStatus::Unbounded             => SolutionResult::Unbounded,
            HighsModelStatus::UnboundedOrInfeasible => SolutionResult::InfeasibleOrUnbounded,
            HighsModelStatus::ReachedIterationLimit | HighsModelStatus::ReachedTimeLimit => SolutionResult::IterationLimit,
            other => {
                warn!("HiGHS: solve ended with status {:?}",other);
                SolutionResult::SolverSpecificError
            }
        };
        result.set_solution_result(sr);
        if sr == SolutionResult::Success {
            let solution = solved.get_solution();
            let x = solution.columns();
            result.set_optimal_cost(p.objective_value(x));
            result.set_values(prog.decision_variables(),&DVector::from_column_slice(&x[..p.numdecision]));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use convexsets::program::LinearExpr;

    #[test]
    fn lp() {
        // min -x - y  s.t.  x + 2y ≤ 4, 3x + y ≤ 6, x,y ≥ 0
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        prog.add_formula_constraint(&(LinearExpr::from(&x[0]) + &x[1] + &x[1]).le(4.0)).unwrap();
        prog.add_formula_constraint(&(LinearExpr::term(&x[0],3.0) + &x[1]).le(6.0)).unwrap();
        prog.add_bounding_box_constraint(DVector::zeros(2),DVector::from_element(2,f64::INFINITY),&x).unwrap();
        prog.add_linear_cost(DVector::from_element(2,-1.0),0.5,&x).unwrap();
        let r = HighsSolver::new().solve(&prog,None,&SolverOptions::default()).unwrap();
        assert!(r.is_success());
        assert!((r.get_solution(&x[0]) - 1.6).abs() < 1e-6);
        assert!((r.get_solution(&x[1]) - 1.2).abs() < 1e-6);
        assert!((r.get_optimal_cost() + 2.3).abs() < 1e-6);
    }

    #[test]
    fn binary() {
        // max x + 2y with binaries, x + y ≤ 1.5
        let mut prog = MathematicalProgram::new();
        let b = prog.new_binary_variables(2,"b");
        prog.add_formula_constraint(&(LinearExpr::from(&b[0]) + &b[1]).le(1.5)).unwrap();
        prog.add_linear_cost(DVector::from_column_slice(&[-1.0,-2.0]),0.0,&b).unwrap();
        let r = HighsSolver::new().solve(&prog,None,&SolverOptions::default()).unwrap();
        assert!(r.is_success());
        assert!(r.get_solution(&b[0]).abs() < 1e-6);
        assert!((r.get_solution(&b[1]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible_and_unsupported() {
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(1,"x");
        prog.add_bounding_box_constraint(DVector::from_element(1,1.0),DVector::from_element(1,0.0),&x).unwrap();
        let r = HighsSolver::new().solve(&prog,None,&SolverOptions::default()).unwrap();
        assert!(! r.is_success());

        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        prog.add_l2norm_cost(nalgebra::DMatrix::identity(2,2),DVector::zeros(2),&x).unwrap();
        assert!(HighsSolver::new().check_program(&prog).is_err());
    }
}
