//! Convex sets.
//!
//! Every set implements [ConvexSet]: membership tests, emptiness and boundedness queries, and
//! injection of the constraints describing the set into a [MathematicalProgram]. The latter is
//! what makes the sets usable as obstacles in IRIS and as vertex domains in a graph of convex
//! sets.
//!
//! Set variants:
//! - [Point], [HPolyhedron], [Hyperellipsoid], [VPolytope], [Spectrahedron]
//! - combinators owning their operands: [CartesianProduct], [MinkowskiSum], [Intersection].
//!
//! Sets are immutable values, except [Point::set_x].

mod point;
mod hpolyhedron;
mod hyperellipsoid;
mod vpolytope;
mod spectrahedron;
mod cartesian_product;
mod minkowski_sum;
mod intersection;
mod shape;
mod obstacles;
pub mod double_description;

use std::any::Any;

use nalgebra::{DMatrix,DVector};
use tracing::warn;

use crate::error::{check_dimension,Error,Result};
use crate::program::{compose,decompose,Binding,Constraint,Evaluator,LinearExpr,MathematicalProgram,SolutionResult,Variable};
use crate::solvers;

pub use point::Point;
pub use hpolyhedron::HPolyhedron;
pub use hyperellipsoid::Hyperellipsoid;
pub use vpolytope::VPolytope;
pub use spectrahedron::Spectrahedron;
pub use cartesian_product::CartesianProduct;
pub use minkowski_sum::MinkowskiSum;
pub use intersection::Intersection;
pub use shape::{FrameId,GeometryId,GeometryInstance,GeometrySource,RigidTransform,SceneGeometry,Shape};
pub use obstacles::make_iris_obstacles;

/// An owned list of sets.
pub type ConvexSets = Vec<Box<dyn ConvexSet>>;

/// Common interface of all convex sets.
///
/// Implementors provide the `do_*` methods; callers use the provided methods, which check
/// dimensions and handle the zero-dimensional (default constructed) case:
/// - [ConvexSet::is_empty] fails,
/// - [ConvexSet::point_in_set] is false,
/// - [ConvexSet::is_bounded] is true,
/// - [ConvexSet::intersects_with] is false.
pub trait ConvexSet : std::fmt::Debug + Send + Sync {
    fn ambient_dimension(&self) -> usize;
    fn clone_box(&self) -> Box<dyn ConvexSet>;
    fn as_any(&self) -> &dyn Any;
    /// Name of the variant, used in messages.
    fn type_name(&self) -> &'static str;

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool;

    /// Add constraints `x ∈ self` to `prog`; `x` has length [ConvexSet::ambient_dimension].
    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)>;

    /// Add constraints `x ∈ t·self` to `prog`, assuming `t ≥ 0` is handled by the caller.
    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>>;

    /// Membership for sets that need a solver to decide it. Solver failures are errors here;
    /// [ConvexSet::do_point_in_set] reports them and answers false.
    fn do_try_point_in_set(&self, x : &DVector<f64>, tol : f64) -> Result<bool> { Ok(self.do_point_in_set(x,tol)) }

    fn do_is_empty(&self) -> Result<bool> { generic_is_empty(self) }
    fn do_is_bounded(&self) -> Result<bool> { generic_is_bounded(self) }
    fn do_maybe_get_point(&self) -> Option<DVector<f64>> { None }
    fn do_to_shape_with_pose(&self) -> Result<(Shape,RigidTransform)> {
        Err(Error::not_implemented(format!("ToShapeWithPose is not implemented yet for {}",self.type_name())))
    }

    //======================================================
    // Provided interface

    /// Returns true if the set has no points. Fails for a zero-dimensional set.
    fn is_empty(&self) -> Result<bool> {
        if self.ambient_dimension() == 0 {
            return Err(Error::invalid(format!("IsEmpty is not defined for a zero-dimensional {}",self.type_name())));
        }
        self.do_is_empty()
    }

    fn is_bounded(&self) -> Result<bool> {
        if self.ambient_dimension() == 0 { Ok(true) } else { self.do_is_bounded() }
    }

    /// Returns true if `x` is in the set, within tolerance `tol`. A point of the wrong dimension
    /// is never in the set.
    fn point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        self.ambient_dimension() > 0 && x.len() == self.ambient_dimension() && self.do_point_in_set(x,tol)
    }

    /// As [ConvexSet::point_in_set], but a failing membership program is returned as an error
    /// instead of reading as "not in the set".
    fn try_point_in_set(&self, x : &DVector<f64>, tol : f64) -> Result<bool> {
        if self.ambient_dimension() == 0 || x.len() != self.ambient_dimension() {
            return Ok(false);
        }
        self.do_try_point_in_set(x,tol)
    }

    /// The point of a singleton set.
    fn maybe_get_point(&self) -> Option<DVector<f64>> {
        if self.ambient_dimension() == 0 { None } else { self.do_maybe_get_point() }
    }

    /// Add constraints `x ∈ self` to `prog`.
    ///
    /// # Returns
    /// The new variables introduced by the formulation and the added constraints.
    fn add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        check_dimension(self.ambient_dimension(),x.len())?;
        self.do_add_point_in_set_constraints(prog,x)
    }

    /// Add constraints `x ∈ t·self` and `t ≥ 0` to `prog`.
    fn add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable], t : &Variable) -> Result<Vec<Binding<Constraint>>> {
        check_dimension(self.ambient_dimension(),x.len())?;
        let xe : Vec<LinearExpr> = x.iter().map(LinearExpr::from).collect();
        self.add_point_in_nonnegative_scaling_constraints_expr(prog,&xe,&LinearExpr::from(t))
    }

    /// Add constraints `A x + b ∈ (cᵀ t + d)·self` and `cᵀ t + d ≥ 0` to `prog`.
    fn add_point_in_nonnegative_scaling_constraints_affine(&self,
                                                           prog : & mut MathematicalProgram,
                                                           a : &DMatrix<f64>,
                                                           b : &DVector<f64>,
                                                           c : &DVector<f64>,
                                                           d : f64,
                                                           x : &[Variable],
                                                           t : &[Variable]) -> Result<Vec<Binding<Constraint>>> {
        check_dimension(self.ambient_dimension(),a.nrows())?;
        check_dimension(self.ambient_dimension(),b.len())?;
        check_dimension(a.ncols(),x.len())?;
        check_dimension(c.len(),t.len())?;
        let xe = compose(a,b,x);
        let te = LinearExpr::from_terms(t,c.as_slice(),d);
        self.add_point_in_nonnegative_scaling_constraints_expr(prog,&xe,&te)
    }

    /// Expression form of [ConvexSet::add_point_in_nonnegative_scaling_constraints].
    fn add_point_in_nonnegative_scaling_constraints_expr(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        check_dimension(self.ambient_dimension(),x.len())?;
        let mut cons = self.do_add_point_in_nonnegative_scaling_constraints(prog,x,t)?;
        if t.variables().next().is_some() {
            cons.push(prog.add_formula_constraint(&t.clone().ge(0.0))?);
        }
        else if t.constant_term() < 0.0 {
            return Err(Error::invalid("the scaling factor must be nonnegative"));
        }
        Ok(cons)
    }

    /// Returns the shape and pose of an equivalent geometry.
    fn to_shape_with_pose(&self) -> Result<(Shape,RigidTransform)> { self.do_to_shape_with_pose() }

    /// Returns true if the sets have a point in common.
    fn intersects_with(&self, other : &dyn ConvexSet) -> Result<bool> {
        check_dimension(self.ambient_dimension(),other.ambient_dimension())?;
        if self.ambient_dimension() == 0 {
            return Ok(false);
        }
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(self.ambient_dimension(),"x");
        self.add_point_in_set_constraints(& mut prog,&x)?;
        other.add_point_in_set_constraints(& mut prog,&x)?;
        feasibility(&prog)
    }
}

impl Clone for Box<dyn ConvexSet> {
    fn clone(&self) -> Box<dyn ConvexSet> { self.clone_box() }
}

//======================================================
// Helpers shared by the set implementations

/// Solve a feasibility program; true if feasible.
pub(crate) fn feasibility(prog : &MathematicalProgram) -> Result<bool> {
    let r = solvers::solve(prog)?;
    match r.solution_result() {
        SolutionResult::Success               => Ok(true),
        SolutionResult::InfeasibleConstraints => Ok(false),
        s => Err(Error::solver(format!("feasibility program returned {} ({})",s,r.solver_details())))
    }
}

/// Resolve a fallible membership test for [ConvexSet::do_point_in_set], logging failures.
pub(crate) fn membership_or_warn(set_name : &str, r : Result<bool>) -> bool {
    r.unwrap_or_else(|e| {
        warn!("{}: membership test failed, reading the point as outside: {}",set_name,e);
        false
    })
}

pub(crate) fn generic_is_empty<S : ConvexSet + ?Sized>(set : &S) -> Result<bool> {
    let mut prog = MathematicalProgram::new();
    let x = prog.new_continuous_variables(set.ambient_dimension(),"x");
    set.add_point_in_set_constraints(& mut prog,&x)?;
    feasibility(&prog).map(|feasible| ! feasible)
}

/// Bounded if the support function is finite along all coordinate directions.
pub(crate) fn generic_is_bounded<S : ConvexSet + ?Sized>(set : &S) -> Result<bool> {
    let n = set.ambient_dimension();
    for i in 0..n {
        for sign in [1.0,-1.0] {
            let mut dir = DVector::zeros(n);
            dir[i] = sign;
            match support(set,&dir)? {
                Some(v) if v.is_finite() => {},
                Some(_) => return Ok(false),
                None    => return Ok(true), // empty
            }
        }
    }
    Ok(true)
}

/// `max { dᵀx : x ∈ set }`; `None` if the set is empty, `+∞` if unbounded in direction `d`.
pub(crate) fn support<S : ConvexSet + ?Sized>(set : &S, d : &DVector<f64>) -> Result<Option<f64>> {
    let mut prog = MathematicalProgram::new();
    let x = prog.new_continuous_variables(set.ambient_dimension(),"x");
    set.add_point_in_set_constraints(& mut prog,&x)?;
    prog.add_linear_cost(-d,0.0,&x)?;
    let r = solvers::solve(&prog)?;
    match r.solution_result() {
        SolutionResult::Success               => Ok(Some(-r.get_optimal_cost())),
        SolutionResult::Unbounded             => Ok(Some(f64::INFINITY)),
        SolutionResult::InfeasibleConstraints => Ok(None),
        s => Err(Error::solver(format!("support program returned {} ({})",s,r.solver_details())))
    }
}

/// Add `exprs ≤ 0`.
pub(crate) fn add_le_zero(prog : & mut MathematicalProgram, exprs : &[LinearExpr]) -> Result<Binding<Constraint>> {
    let (a,b,vars) = decompose(exprs);
    let m = exprs.len();
    prog.add_linear_constraint(a,DVector::from_element(m,f64::NEG_INFINITY),-b,&vars)
}

/// Add `exprs = 0`.
pub(crate) fn add_eq_zero(prog : & mut MathematicalProgram, exprs : &[LinearExpr]) -> Result<Binding<Constraint>> {
    let (a,b,vars) = decompose(exprs);
    prog.add_linear_equality_constraint(a,-b,&vars)
}

/// Add `exprs₀ ≥ |exprs₁..|`.
pub(crate) fn add_lorentz(prog : & mut MathematicalProgram, exprs : &[LinearExpr]) -> Result<Binding<Constraint>> {
    let (a,b,vars) = decompose(exprs);
    prog.add_lorentz_cone_constraint(a,b,&vars)
}

/// Add `M ⪰ 0` for a symmetric matrix of expressions, given column-major.
pub(crate) fn add_lmi(prog : & mut MathematicalProgram, n : usize, entries : &[LinearExpr]) -> Result<Binding<Constraint>> {
    let (a,b,vars) = decompose(entries);
    let mut f = Vec::with_capacity(vars.len()+1);
    f.push(DMatrix::from_column_slice(n,n,b.as_slice()));
    for k in 0..vars.len() {
        f.push(DMatrix::from_iterator(n,n,a.column(k).iter().cloned()));
    }
    prog.add_linear_matrix_inequality_constraint(f,&vars)
}

/// Add `exprs ∈` rotated Lorentz cone.
pub(crate) fn add_rotated_lorentz(prog : & mut MathematicalProgram, exprs : &[LinearExpr]) -> Result<Binding<Constraint>> {
    let (a,b,vars) = decompose(exprs);
    prog.add_rotated_lorentz_cone_constraint(a,b,&vars)
}

/// Add the constraint `c` stated on `x / t`, multiplied through by `t ≥ 0`: constant terms are
/// scaled by `t`. Cone constraints keep their cone; linear rows with only infinite bounds add
/// nothing.
pub(crate) fn add_homogenized_constraint(prog : & mut MathematicalProgram, c : &Constraint, x : &[LinearExpr], t : &LinearExpr) -> Result<Option<Binding<Constraint>>> {
    check_dimension(c.num_vars(),x.len())?;
    let row = |coefs : & mut dyn Iterator<Item=f64>| -> LinearExpr {
        let mut e = LinearExpr::new();
        for (xj,a) in x.iter().zip(coefs) {
            if a != 0.0 { e += xj.clone() * a; }
        }
        e
    };
    let cone_rows = |a : &DMatrix<f64>, b : &DVector<f64>| -> Vec<LinearExpr> {
        (0..a.nrows()).map(|i| row(& mut a.row(i).iter().cloned()) + t.clone() * b[i]).collect()
    };
    let bounded = |rows : Vec<(LinearExpr,f64,f64)>| -> Vec<LinearExpr> {
        let mut out = Vec::new();
        for (e,lb,ub) in rows {
            if ub.is_finite() { out.push(e.clone() - t.clone() * ub); }
            if lb.is_finite() { out.push(t.clone() * lb - e); }
        }
        out
    };
    let binding = match c {
        Constraint::Linear{a,lb,ub} => {
            let rows = bounded((0..a.nrows()).map(|i| (row(& mut a.row(i).iter().cloned()),lb[i],ub[i])).collect());
            if rows.is_empty() { None } else { Some(add_le_zero(prog,&rows)?) }
        },
        Constraint::BoundingBox{lb,ub} => {
            let rows = bounded(x.iter().enumerate().map(|(i,xi)| (xi.clone(),lb[i],ub[i])).collect());
            if rows.is_empty() { None } else { Some(add_le_zero(prog,&rows)?) }
        },
        Constraint::LinearEquality{a,b} => Some(add_eq_zero(prog,&cone_rows(a,&(-b)))?),
        Constraint::LorentzCone{a,b}        => Some(add_lorentz(prog,&cone_rows(a,b))?),
        Constraint::RotatedLorentzCone{a,b} => Some(add_rotated_lorentz(prog,&cone_rows(a,b))?),
        Constraint::ExponentialCone{a,b}    => {
            let (aa,bb,vars) = decompose(&cone_rows(a,b));
            Some(prog.add_exponential_cone_constraint(aa,bb,&vars)?)
        },
        Constraint::PositiveSemidefinite{rows} => Some(add_lmi(prog,*rows,x)?),
        Constraint::LinearMatrixInequality{f} => {
            let n = f.first().map(|f0| f0.nrows()).unwrap_or(0);
            let mut entries = Vec::with_capacity(n*n);
            for j in 0..n {
                for i in 0..n {
                    let mut e = t.clone() * f[0][(i,j)];
                    for (k,xk) in x.iter().enumerate() {
                        if f[k+1][(i,j)] != 0.0 { e += xk.clone() * f[k+1][(i,j)]; }
                    }
                    entries.push(e);
                }
            }
            Some(add_lmi(prog,n,&entries)?)
        },
    };
    Ok(binding)
}

/// Rows `A x - b t` as expressions.
pub(crate) fn affine_minus_scaled(a : &DMatrix<f64>, x : &[LinearExpr], b : &DVector<f64>, t : &LinearExpr) -> Vec<LinearExpr> {
    (0..a.nrows())
        .map(|i| {
            let mut e = t.clone() * (-b[i]);
            for (j,xj) in x.iter().enumerate() {
                if a[(i,j)] != 0.0 { e += xj.clone() * a[(i,j)]; }
            }
            e
        })
        .collect()
}

/// Downcast a set to a concrete variant.
pub fn downcast<T : 'static>(set : &dyn ConvexSet) -> Option<&T> { set.as_any().downcast_ref::<T>() }
