use std::collections::HashMap;

use nalgebra::DVector;

use crate::solvers::SolverId;
use super::{Binding,Constraint,Cost,Variable};

/// Overall outcome of a solve.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum SolutionResult {
    /// An optimal (or, for mixed-integer problems, the best found) solution.
    Success,
    /// Certificate of primal infeasibility.
    InfeasibleConstraints,
    /// Certificate of dual infeasibility.
    Unbounded,
    InfeasibleOrUnbounded,
    /// The solver stopped at an iteration, node or trial limit.
    IterationLimit,
    /// Any other solver status; see [MathematicalProgramResult::solver_details].
    SolverSpecificError,
}

impl std::fmt::Display for SolutionResult {
    fn fmt(&self, f : & mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolutionResult::Success               => "Success",
            SolutionResult::InfeasibleConstraints => "InfeasibleConstraints",
            SolutionResult::Unbounded             => "Unbounded",
            SolutionResult::InfeasibleOrUnbounded => "InfeasibleOrUnbounded",
            SolutionResult::IterationLimit        => "IterationLimit",
            SolutionResult::SolverSpecificError   => "SolverSpecificError",
        };
        f.write_str(s)
    }
}

/// Immutable snapshot of a solve.
///
/// Values are stored per variable identity, so a result can be queried with variables that were
/// created outside the program that produced it (as long as that program adopted them).
#[derive(Clone,Debug)]
pub struct MathematicalProgramResult {
    solution_result : SolutionResult,
    optimal_cost    : f64,
    solver_id       : SolverId,
    solver_details  : String,
    values          : HashMap<usize,f64>,
}

impl MathematicalProgramResult {
    pub fn new(solver_id : SolverId) -> MathematicalProgramResult {
        MathematicalProgramResult{
            solution_result : SolutionResult::SolverSpecificError,
            optimal_cost    : f64::NAN,
            solver_id,
            solver_details  : String::new(),
            values          : HashMap::new(),
        }
    }

    pub fn is_success(&self) -> bool { self.solution_result == SolutionResult::Success }
    pub fn solution_result(&self) -> SolutionResult { self.solution_result }
    pub fn get_optimal_cost(&self) -> f64 { self.optimal_cost }
    pub fn solver_id(&self) -> &SolverId { &self.solver_id }
    /// Solver specific diagnostic text.
    pub fn solver_details(&self) -> &str { self.solver_details.as_str() }

    /// Value of `v`, or NaN if the result holds no value for it.
    pub fn get_solution(&self, v : &Variable) -> f64 {
        self.values.get(&v.id()).cloned().unwrap_or(f64::NAN)
    }
    pub fn has_solution(&self, v : &Variable) -> bool { self.values.contains_key(&v.id()) }

    pub fn get_solution_vec(&self, vars : &[Variable]) -> DVector<f64> {
        DVector::from_iterator(vars.len(), vars.iter().map(|v| self.get_solution(v)))
    }

    /// Evaluate a cost binding at the solution.
    pub fn eval_cost(&self, binding : &Binding<Cost>) -> f64 {
        binding.evaluator().eval(&self.get_solution_vec(binding.variables()))
    }

    /// Check a constraint binding at the solution.
    pub fn is_satisfied(&self, binding : &Binding<Constraint>, tol : f64) -> bool {
        binding.evaluator().check_satisfied(&self.get_solution_vec(binding.variables()),tol)
    }

    //======================================================
    // Used by solver backends

    pub fn set_solution_result(& mut self, r : SolutionResult) { self.solution_result = r; }
    pub fn set_optimal_cost(& mut self, c : f64) { self.optimal_cost = c; }
    pub fn set_solver_details<S : Into<String>>(& mut self, d : S) { self.solver_details = d.into(); }
    pub(crate) fn set_solver_id(& mut self, id : SolverId) { self.solver_id = id; }
    pub(crate) fn set_value(& mut self, v : &Variable, value : f64) { self.values.insert(v.id(),value); }
    pub fn set_values(& mut self, vars : &[Variable], values : &DVector<f64>) {
        for (v,x) in vars.iter().zip(values.iter()) { self.values.insert(v.id(),*x); }
    }
    pub(crate) fn remove_value(& mut self, v : &Variable) { self.values.remove(&v.id()); }
}
