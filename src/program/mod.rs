//! Mathematical programs: decision variables, costs and constraints bound to variables.
//!
//! A [MathematicalProgram] only stores the problem. Solving is done by a
//! [crate::solvers::SolverInterface] backend that translates the program into a conic standard
//! form.
//!
//! Variables have process-wide identities. A variable created outside a program (for example
//! the placeholder variables of a graph vertex) can be adopted by any number of programs using
//! [MathematicalProgram::add_decision_variables], and a [MathematicalProgramResult] can be queried
//! with that same variable afterwards.

mod evaluator;
mod expr;
mod result;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize,Ordering};

use itertools::izip;
use nalgebra::{DMatrix,DVector};

use crate::error::{Error,Result};

pub use evaluator::{Constraint,Cost,Evaluator};
pub use expr::{compose,decompose,LinearExpr,LinearFormula,Relation};
pub use result::{MathematicalProgramResult,SolutionResult};

static NEXT_VARIABLE_ID : AtomicUsize = AtomicUsize::new(0);

#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum VariableType {
    Continuous,
    Binary,
}

/// A scalar decision variable.
///
/// Cloning a variable yields the same variable; equality, ordering and hashing are by identity.
#[derive(Clone,Debug)]
pub struct Variable {
    id      : usize,
    name    : Arc<str>,
    vartype : VariableType,
}

impl Variable {
    pub fn new(name : &str, vartype : VariableType) -> Variable {
        Variable{
            id      : NEXT_VARIABLE_ID.fetch_add(1,Ordering::Relaxed),
            name    : Arc::from(name),
            vartype
        }
    }
    pub fn continuous(name : &str) -> Variable { Variable::new(name,VariableType::Continuous) }
    pub fn binary(name : &str) -> Variable { Variable::new(name,VariableType::Binary) }

    /// Create `n` continuous variables named `name(i)`.
    pub fn continuous_vec(n : usize, name : &str) -> Vec<Variable> {
        (0..n).map(|i| Variable::continuous(format!("{}({})",name,i).as_str())).collect()
    }

    pub fn id(&self) -> usize { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn vartype(&self) -> VariableType { self.vartype }
}

impl PartialEq for Variable { fn eq(&self, other : &Variable) -> bool { self.id == other.id } }
impl Eq for Variable {}
impl std::hash::Hash for Variable { fn hash<H : std::hash::Hasher>(&self, state : & mut H) { self.id.hash(state) } }
impl PartialOrd for Variable { fn partial_cmp(&self, other : &Variable) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) } }
impl Ord for Variable { fn cmp(&self, other : &Variable) -> std::cmp::Ordering { self.id.cmp(&other.id) } }
impl std::fmt::Display for Variable {
    fn fmt(&self, f : & mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.name) }
}

/// An evaluator bound to an ordered list of variables.
///
/// The evaluator is shared between clones of a binding; two bindings are equal if they share
/// the evaluator and bind the same variables.
#[derive(Debug)]
pub struct Binding<E> {
    evaluator : Arc<E>,
    vars      : Vec<Variable>,
}

impl<E> Clone for Binding<E> {
    fn clone(&self) -> Self { Binding{ evaluator : self.evaluator.clone(), vars : self.vars.clone() } }
}

impl<E> PartialEq for Binding<E> {
    fn eq(&self, other : &Self) -> bool { Arc::ptr_eq(&self.evaluator,&other.evaluator) && self.vars == other.vars }
}

impl<E : Evaluator> Binding<E> {
    /// Bind `evaluator` to `vars`. Fails if the number of variables does not match.
    pub fn new(evaluator : E, vars : Vec<Variable>) -> Result<Binding<E>> {
        if evaluator.num_vars() != vars.len() {
            return Err(Error::invalid(format!("{} expects {} variables, got {}",evaluator.kind(),evaluator.num_vars(),vars.len())));
        }
        Ok(Binding{ evaluator : Arc::new(evaluator), vars })
    }

    pub fn evaluator(&self) -> &E { &self.evaluator }
    pub fn variables(&self) -> &[Variable] { self.vars.as_slice() }

    /// Bind the same evaluator to a different list of variables.
    pub fn rebind(&self, vars : Vec<Variable>) -> Result<Binding<E>> {
        if vars.len() != self.vars.len() {
            return Err(Error::invalid(format!("{} expects {} variables, got {}",self.evaluator.kind(),self.vars.len(),vars.len())));
        }
        Ok(Binding{ evaluator : self.evaluator.clone(), vars })
    }
}

/// Costs, constraints and the decision variables they are bound to.
#[derive(Clone,Debug,Default)]
pub struct MathematicalProgram {
    vars          : Vec<Variable>,
    var_index     : HashMap<usize,usize>,
    initial_guess : Vec<f64>,
    costs         : Vec<Binding<Cost>>,
    constraints   : Vec<Binding<Constraint>>,
}

impl MathematicalProgram {
    pub fn new() -> MathematicalProgram { MathematicalProgram::default() }

    pub fn num_vars(&self) -> usize { self.vars.len() }
    pub fn decision_variables(&self) -> &[Variable] { self.vars.as_slice() }
    /// Position of `v` in [MathematicalProgram::decision_variables].
    pub fn decision_variable_index(&self, v : &Variable) -> Option<usize> { self.var_index.get(&v.id()).cloned() }
    pub fn has_binary_variables(&self) -> bool { self.vars.iter().any(|v| v.vartype() == VariableType::Binary) }

    pub fn costs(&self) -> &[Binding<Cost>] { self.costs.as_slice() }
    pub fn constraints(&self) -> &[Binding<Constraint>] { self.constraints.as_slice() }

    fn push_variable(& mut self, v : Variable) {
        self.var_index.insert(v.id(),self.vars.len());
        self.vars.push(v);
        self.initial_guess.push(f64::NAN);
    }

    /// Create `n` new continuous variables named `name(i)`.
    pub fn new_continuous_variables(& mut self, n : usize, name : &str) -> Vec<Variable> {
        let vars = Variable::continuous_vec(n,name);
        for v in vars.iter() { self.push_variable(v.clone()); }
        vars
    }

    /// Create `n` new binary variables named `name(i)`.
    pub fn new_binary_variables(& mut self, n : usize, name : &str) -> Vec<Variable> {
        let vars : Vec<Variable> = (0..n).map(|i| Variable::binary(format!("{}({})",name,i).as_str())).collect();
        for v in vars.iter() { self.push_variable(v.clone()); }
        vars
    }

    /// Create a symmetric `n×n` matrix of continuous variables.
    ///
    /// Only the `n(n+1)/2` entries of the lower triangle are new variables; entry `(i,j)` and
    /// `(j,i)` of the returned matrix are the same variable.
    pub fn new_symmetric_continuous_variables(& mut self, n : usize, name : &str) -> Vec<Vec<Variable>> {
        let mut m : Vec<Vec<Option<Variable>>> = vec![vec![None; n]; n];
        for j in 0..n {
            for i in j..n {
                let v = Variable::continuous(format!("{}({},{})",name,i,j).as_str());
                self.push_variable(v.clone());
                m[i][j] = Some(v.clone());
                m[j][i] = Some(v);
            }
        }
        m.into_iter().map(|row| row.into_iter().flatten().collect()).collect()
    }

    /// Adopt variables created elsewhere. Fails if one of them already belongs to the program.
    pub fn add_decision_variables(& mut self, vars : &[Variable]) -> Result<()> {
        if let Some(v) = vars.iter().find(|v| self.var_index.contains_key(&v.id())) {
            return Err(Error::invalid(format!("variable {} is already a decision variable of the program",v)));
        }
        for v in vars.iter() { self.push_variable(v.clone()); }
        Ok(())
    }

    fn check_registered(&self, vars : &[Variable]) -> Result<()> {
        match vars.iter().find(|v| ! self.var_index.contains_key(&v.id())) {
            Some(v) => Err(Error::invalid(format!("variable {} is not a decision variable of the program",v))),
            None    => Ok(())
        }
    }

    //======================================================
    // Costs

    /// Add an existing cost binding.
    pub fn add_cost(& mut self, binding : Binding<Cost>) -> Result<Binding<Cost>> {
        self.check_registered(binding.variables())?;
        self.costs.push(binding.clone());
        Ok(binding)
    }

    pub fn add_linear_cost(& mut self, a : DVector<f64>, b : f64, vars : &[Variable]) -> Result<Binding<Cost>> {
        self.add_cost(Binding::new(Cost::Linear{ a, b }, vars.to_vec())?)
    }

    /// Add the cost given by a linear expression.
    pub fn add_linear_cost_expr(& mut self, e : &LinearExpr) -> Result<Binding<Cost>> {
        self.add_cost(e.to_cost()?)
    }

    pub fn add_quadratic_cost(& mut self, q : DMatrix<f64>, a : DVector<f64>, b : f64, vars : &[Variable]) -> Result<Binding<Cost>> {
        if q.nrows() != a.len() || q.ncols() != a.len() {
            return Err(Error::invalid(format!("quadratic cost: Q is {}x{} but a has length {}",q.nrows(),q.ncols(),a.len())));
        }
        self.add_cost(Binding::new(Cost::Quadratic{ q, a, b }, vars.to_vec())?)
    }

    pub fn add_l2norm_cost(& mut self, a : DMatrix<f64>, b : DVector<f64>, vars : &[Variable]) -> Result<Binding<Cost>> {
        if a.nrows() != b.len() {
            return Err(Error::invalid(format!("l2 norm cost: A has {} rows but b has length {}",a.nrows(),b.len())));
        }
        self.add_cost(Binding::new(Cost::L2Norm{ a, b }, vars.to_vec())?)
    }

    //======================================================
    // Constraints

    /// Add an existing constraint binding.
    pub fn add_constraint(& mut self, binding : Binding<Constraint>) -> Result<Binding<Constraint>> {
        self.check_registered(binding.variables())?;
        self.constraints.push(binding.clone());
        Ok(binding)
    }

    /// Add the constraint given by a linear formula.
    pub fn add_formula_constraint(& mut self, f : &LinearFormula) -> Result<Binding<Constraint>> {
        self.add_constraint(f.to_binding()?)
    }

    /// Add `lb ≤ A vars ≤ ub`.
    pub fn add_linear_constraint(& mut self, a : DMatrix<f64>, lb : DVector<f64>, ub : DVector<f64>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        if a.nrows() != lb.len() || a.nrows() != ub.len() {
            return Err(Error::invalid(format!("linear constraint: A has {} rows, lb has length {} and ub has length {}",a.nrows(),lb.len(),ub.len())));
        }
        self.add_constraint(Binding::new(Constraint::Linear{ a, lb, ub }, vars.to_vec())?)
    }

    /// Add `A vars = b`.
    pub fn add_linear_equality_constraint(& mut self, a : DMatrix<f64>, b : DVector<f64>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        if a.nrows() != b.len() {
            return Err(Error::invalid(format!("linear equality: A has {} rows but b has length {}",a.nrows(),b.len())));
        }
        self.add_constraint(Binding::new(Constraint::LinearEquality{ a, b }, vars.to_vec())?)
    }

    /// Add `lb ≤ vars ≤ ub`.
    pub fn add_bounding_box_constraint(& mut self, lb : DVector<f64>, ub : DVector<f64>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        if lb.len() != ub.len() {
            return Err(Error::invalid(format!("bounding box: lb has length {} but ub has length {}",lb.len(),ub.len())));
        }
        self.add_constraint(Binding::new(Constraint::BoundingBox{ lb, ub }, vars.to_vec())?)
    }

    /// Add `(A vars + b)₀ ≥ |(A vars + b)₁..|`.
    pub fn add_lorentz_cone_constraint(& mut self, a : DMatrix<f64>, b : DVector<f64>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        if a.nrows() != b.len() || a.nrows() < 1 {
            return Err(Error::invalid(format!("lorentz cone: A has {} rows and b has length {}",a.nrows(),b.len())));
        }
        self.add_constraint(Binding::new(Constraint::LorentzCone{ a, b }, vars.to_vec())?)
    }

    /// Add `z₀ z₁ ≥ |z₂..|²` with `z = A vars + b`.
    pub fn add_rotated_lorentz_cone_constraint(& mut self, a : DMatrix<f64>, b : DVector<f64>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        if a.nrows() != b.len() || a.nrows() < 2 {
            return Err(Error::invalid(format!("rotated lorentz cone: A has {} rows and b has length {}",a.nrows(),b.len())));
        }
        self.add_constraint(Binding::new(Constraint::RotatedLorentzCone{ a, b }, vars.to_vec())?)
    }

    /// Add `z₀ ≥ z₁ exp(z₂/z₁)` with `z = A vars + b`.
    pub fn add_exponential_cone_constraint(& mut self, a : DMatrix<f64>, b : DVector<f64>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        if a.nrows() != 3 || b.len() != 3 {
            return Err(Error::invalid("exponential cone: A must have 3 rows and b length 3"));
        }
        self.add_constraint(Binding::new(Constraint::ExponentialCone{ a, b }, vars.to_vec())?)
    }

    /// Add `X ⪰ 0` for a symmetric matrix of variables given as rows.
    pub fn add_positive_semidefinite_constraint(& mut self, x : &[Vec<Variable>]) -> Result<Binding<Constraint>> {
        let n = x.len();
        if x.iter().any(|row| row.len() != n) {
            return Err(Error::invalid("positive semidefinite constraint: matrix is not square"));
        }
        for i in 0..n {
            for j in 0..i {
                if x[i][j] != x[j][i] {
                    return Err(Error::invalid("positive semidefinite constraint: matrix is not symmetric"));
                }
            }
        }
        // column-major listing
        let vars : Vec<Variable> = (0..n).flat_map(|j| x.iter().map(move |row| row[j].clone())).collect();
        self.add_constraint(Binding::new(Constraint::PositiveSemidefinite{ rows : n }, vars)?)
    }

    /// Add `F₀ + Σ vars[i] F₍ᵢ₊₁₎ ⪰ 0`.
    pub fn add_linear_matrix_inequality_constraint(& mut self, f : Vec<DMatrix<f64>>, vars : &[Variable]) -> Result<Binding<Constraint>> {
        let n = f.first().map(|f0| f0.nrows()).unwrap_or(0);
        if f.iter().any(|fi| fi.nrows() != n || fi.ncols() != n) {
            return Err(Error::invalid("linear matrix inequality: all matrices must be square of the same size"));
        }
        self.add_constraint(Binding::new(Constraint::LinearMatrixInequality{ f }, vars.to_vec())?)
    }

    /// Remove a constraint binding. Returns false if the program does not contain it.
    pub fn remove_constraint(& mut self, binding : &Binding<Constraint>) -> bool {
        let n = self.constraints.len();
        self.constraints.retain(|b| b != binding);
        n != self.constraints.len()
    }

    //======================================================
    // Evaluation

    pub fn set_initial_guess(& mut self, vars : &[Variable], values : &DVector<f64>) -> Result<()> {
        self.check_registered(vars)?;
        for (v,x) in izip!(vars.iter(),values.iter()) {
            self.initial_guess[self.var_index[&v.id()]] = *x;
        }
        Ok(())
    }
    pub fn initial_guess(&self) -> DVector<f64> { DVector::from_column_slice(self.initial_guess.as_slice()) }

    /// Values of `vars` extracted from `values`, a vector over all decision variables.
    pub fn binding_values(&self, vars : &[Variable], values : &DVector<f64>) -> Result<DVector<f64>> {
        self.check_registered(vars)?;
        Ok(DVector::from_iterator(vars.len(), vars.iter().map(|v| values[self.var_index[&v.id()]])))
    }

    /// Check whether all `bindings` are satisfied by `values`, a vector over all decision
    /// variables of the program.
    pub fn check_satisfied(&self, bindings : &[Binding<Constraint>], values : &DVector<f64>, tol : f64) -> Result<bool> {
        if values.len() != self.num_vars() {
            return Err(Error::DimensionMismatch{ expected : self.num_vars(), actual : values.len() });
        }
        for b in bindings.iter() {
            let v = self.binding_values(b.variables(),values)?;
            if ! b.evaluator().check_satisfied(&v,tol) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check whether all constraints of the program are satisfied by `values`.
    pub fn check_all_satisfied(&self, values : &DVector<f64>, tol : f64) -> Result<bool> {
        self.check_satisfied(self.constraints.as_slice(),values,tol)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symmetric_variables() {
        let mut prog = MathematicalProgram::new();
        let x = prog.new_symmetric_continuous_variables(3,"X");
        assert_eq!(prog.num_vars(),6);
        assert_eq!(x[0][2],x[2][0]);
        let psd = prog.add_positive_semidefinite_constraint(&x).unwrap();
        assert_eq!(psd.variables().len(),9);
    }

    #[test]
    fn check_satisfied_without_solver() {
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        let b = prog.add_linear_constraint(DMatrix::from_row_slice(1,2,&[1.0,1.0]),
                                           DVector::from_element(1,f64::NEG_INFINITY),
                                           DVector::from_element(1,1.0),
                                           &x).unwrap();
        assert!(prog.check_satisfied(&[b.clone()],&DVector::from_vec(vec![0.5,0.5]),1e-9).unwrap());
        assert!(!prog.check_satisfied(&[b],&DVector::from_vec(vec![1.0,0.5]),1e-9).unwrap());
    }

    #[test]
    fn foreign_variables_are_rejected() {
        let mut prog = MathematicalProgram::new();
        let y = Variable::continuous("y");
        assert!(prog.add_linear_cost(DVector::from_element(1,1.0),0.0,&[y.clone()]).is_err());
        prog.add_decision_variables(&[y.clone()]).unwrap();
        assert!(prog.add_linear_cost(DVector::from_element(1,1.0),0.0,&[y.clone()]).is_ok());
        assert!(prog.add_decision_variables(&[y]).is_err());
    }
}
