//! Solver backends.
//!
//! A backend implements [SolverInterface]. Backends translate a [MathematicalProgram] into the
//! conic [standard_form::ConicProblem], solve it and map the solution back onto the program's
//! variables. Binary variables are handled by [branch_and_bound] on top of any backend able to
//! solve the continuous relaxation.
//!
//! The default backend is [ClarabelSolver], a pure Rust interior point solver.

pub mod standard_form;
pub mod branch_and_bound;
mod clarabel;

use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::error::Result;
use crate::program::{MathematicalProgram,MathematicalProgramResult};

pub use self::clarabel::ClarabelSolver;

/// Identifies a solver backend; used to key [SolverOptions].
#[derive(Clone,Debug,PartialEq,Eq,Hash,PartialOrd,Ord)]
pub struct SolverId(String);

impl SolverId {
    pub fn new(name : &str) -> SolverId { SolverId(name.to_string()) }
    pub fn name(&self) -> &str { self.0.as_str() }
}

impl std::fmt::Display for SolverId {
    fn fmt(&self, f : & mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// A solver parameter value.
#[derive(Clone,Debug,PartialEq)]
pub enum OptionValue {
    Double(f64),
    Int(i64),
    Str(String),
}

impl From<f64>  for OptionValue { fn from(v : f64) -> OptionValue { OptionValue::Double(v) } }
impl From<i64>  for OptionValue { fn from(v : i64) -> OptionValue { OptionValue::Int(v) } }
impl From<i32>  for OptionValue { fn from(v : i32) -> OptionValue { OptionValue::Int(v as i64) } }
impl From<bool> for OptionValue { fn from(v : bool) -> OptionValue { OptionValue::Int(v as i64) } }
impl From<&str> for OptionValue { fn from(v : &str) -> OptionValue { OptionValue::Str(v.to_string()) } }
impl From<String> for OptionValue { fn from(v : String) -> OptionValue { OptionValue::Str(v) } }

impl OptionValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Double(v) => Some(*v),
            OptionValue::Int(v)    => Some(*v as f64),
            OptionValue::Str(s)    => s.parse().ok()
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Double(v) => if v.fract() == 0.0 { Some(*v as i64) } else { None },
            OptionValue::Int(v)    => Some(*v),
            OptionValue::Str(s)    => s.parse().ok()
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Str(s) => match s.as_str() { "true" | "on" => Some(true), "false" | "off" => Some(false), _ => None },
            v => v.as_i64().map(|i| i != 0)
        }
    }
}

/// Solver parameters, keyed by solver and parameter name.
///
/// Parameters for a solver that is not used in a solve are ignored.
#[derive(Clone,Debug,Default,PartialEq)]
pub struct SolverOptions {
    options : BTreeMap<SolverId,BTreeMap<String,OptionValue>>,
}

impl SolverOptions {
    pub fn new() -> SolverOptions { SolverOptions::default() }

    /// Set parameter `name` for solver `id`.
    pub fn set_option<V : Into<OptionValue>>(& mut self, id : &SolverId, name : &str, value : V) {
        self.options.entry(id.clone()).or_default().insert(name.to_string(),value.into());
    }

    /// All parameters set for solver `id`.
    pub fn get_options(&self, id : &SolverId) -> BTreeMap<String,OptionValue> {
        self.options.get(id).cloned().unwrap_or_default()
    }

    pub fn get_option(&self, id : &SolverId, name : &str) -> Option<&OptionValue> {
        self.options.get(id).and_then(|o| o.get(name))
    }
}

/// A solver backend.
pub trait SolverInterface : Send + Sync {
    fn solver_id(&self) -> SolverId;

    /// False if the backend is compiled in but cannot be used (e.g. a missing license).
    fn is_available(&self) -> bool { true }

    /// Fail with [crate::Error::SolverFailure] if the program contains costs or constraints the
    /// backend cannot handle.
    fn check_program(&self, prog : &MathematicalProgram) -> Result<()>;

    /// Solve the program.
    ///
    /// Infeasibility and unboundedness are reported through
    /// [MathematicalProgramResult::solution_result]; an `Err` means the program could not be
    /// handed to the solver at all.
    ///
    /// # Arguments
    /// - `prog` The program.
    /// - `initial_guess` Optional values for all decision variables; backends may ignore it.
    /// - `options` Solver parameters; only those keyed by [SolverInterface::solver_id] are used.
    fn solve(&self, prog : &MathematicalProgram, initial_guess : Option<&DVector<f64>>, options : &SolverOptions) -> Result<MathematicalProgramResult>;
}

/// Solve `prog` with the default backend and default parameters.
pub fn solve(prog : &MathematicalProgram) -> Result<MathematicalProgramResult> {
    ClarabelSolver::new().solve(prog,None,&SolverOptions::default())
}

/// Solve `prog` with `solver`, or with the default backend if `solver` is `None`.
pub fn solve_with(solver : Option<&dyn SolverInterface>, prog : &MathematicalProgram, options : &SolverOptions) -> Result<MathematicalProgramResult> {
    match solver {
        Some(s) => s.solve(prog,None,options),
        None    => ClarabelSolver::new().solve(prog,None,options)
    }
}
