//! Cost and constraint evaluators.
//!
//! An evaluator is a function of an ordered list of variables; a [super::Binding] attaches it to
//! concrete [super::Variable]s. All evaluators are affine maps composed with a convex function
//! (costs) or a closed convex cone (constraints).

use nalgebra::{DMatrix,DVector};

/// Anything that can be bound to a list of variables.
pub trait Evaluator {
    /// Number of variables the evaluator expects.
    fn num_vars(&self) -> usize;
    /// Short name of the evaluator kind, used in diagnostics.
    fn kind(&self) -> &'static str;
}

/// Convex cost functions.
#[derive(Clone,Debug)]
pub enum Cost {
    /// `aᵀ v + b`
    Linear { a : DVector<f64>, b : f64 },
    /// `½ vᵀ Q v + aᵀ v + b` with `Q` positive semidefinite.
    Quadratic { q : DMatrix<f64>, a : DVector<f64>, b : f64 },
    /// `|A v + b|₂`
    L2Norm { a : DMatrix<f64>, b : DVector<f64> },
}

impl Evaluator for Cost {
    fn num_vars(&self) -> usize {
        match self {
            Cost::Linear{a,..}    => a.len(),
            Cost::Quadratic{a,..} => a.len(),
            Cost::L2Norm{a,..}    => a.ncols(),
        }
    }
    fn kind(&self) -> &'static str {
        match self {
            Cost::Linear{..}    => "LinearCost",
            Cost::Quadratic{..} => "QuadraticCost",
            Cost::L2Norm{..}    => "L2NormCost",
        }
    }
}

impl Cost {
    pub fn eval(&self, v : &DVector<f64>) -> f64 {
        match self {
            Cost::Linear{a,b}      => a.dot(v) + b,
            Cost::Quadratic{q,a,b} => 0.5 * v.dot(&(q * v)) + a.dot(v) + b,
            Cost::L2Norm{a,b}      => (a * v + b).norm(),
        }
    }
}

/// Convex constraints.
///
/// Cone constraints are stated on `z = A v + b`.
#[derive(Clone,Debug)]
pub enum Constraint {
    /// `lb ≤ A v ≤ ub`, bounds may be infinite.
    Linear { a : DMatrix<f64>, lb : DVector<f64>, ub : DVector<f64> },
    /// `A v = b`
    LinearEquality { a : DMatrix<f64>, b : DVector<f64> },
    /// `lb ≤ v ≤ ub`
    BoundingBox { lb : DVector<f64>, ub : DVector<f64> },
    /// `z₀ ≥ |z₁..|₂`
    LorentzCone { a : DMatrix<f64>, b : DVector<f64> },
    /// `z₀ z₁ ≥ |z₂..|₂²`, `z₀ ≥ 0`, `z₁ ≥ 0`
    RotatedLorentzCone { a : DMatrix<f64>, b : DVector<f64> },
    /// `z₀ ≥ z₁ exp(z₂/z₁)`, `z₁ > 0`
    ExponentialCone { a : DMatrix<f64>, b : DVector<f64> },
    /// The variables form a symmetric `rows×rows` matrix, listed column-major, that is positive
    /// semidefinite.
    PositiveSemidefinite { rows : usize },
    /// `F₀ + Σ vᵢ Fᵢ ⪰ 0` where all `Fᵢ` are symmetric.
    LinearMatrixInequality { f : Vec<DMatrix<f64>> },
}

impl Evaluator for Constraint {
    fn num_vars(&self) -> usize {
        match self {
            Constraint::Linear{a,..}             => a.ncols(),
            Constraint::LinearEquality{a,..}     => a.ncols(),
            Constraint::BoundingBox{lb,..}       => lb.len(),
            Constraint::LorentzCone{a,..}        => a.ncols(),
            Constraint::RotatedLorentzCone{a,..} => a.ncols(),
            Constraint::ExponentialCone{a,..}    => a.ncols(),
            Constraint::PositiveSemidefinite{rows} => rows*rows,
            Constraint::LinearMatrixInequality{f}  => f.len().saturating_sub(1),
        }
    }
    fn kind(&self) -> &'static str {
        match self {
            Constraint::Linear{..}                 => "LinearConstraint",
            Constraint::LinearEquality{..}         => "LinearEqualityConstraint",
            Constraint::BoundingBox{..}            => "BoundingBoxConstraint",
            Constraint::LorentzCone{..}            => "LorentzConeConstraint",
            Constraint::RotatedLorentzCone{..}     => "RotatedLorentzConeConstraint",
            Constraint::ExponentialCone{..}        => "ExponentialConeConstraint",
            Constraint::PositiveSemidefinite{..}   => "PositiveSemidefiniteConstraint",
            Constraint::LinearMatrixInequality{..} => "LinearMatrixInequalityConstraint",
        }
    }
}

impl Constraint {
    /// Number of scalar rows the constraint contributes to a conic standard form.
    pub fn num_rows(&self) -> usize {
        match self {
            Constraint::Linear{a,..}             => a.nrows(),
            Constraint::LinearEquality{a,..}     => a.nrows(),
            Constraint::BoundingBox{lb,..}       => lb.len(),
            Constraint::LorentzCone{a,..}        => a.nrows(),
            Constraint::RotatedLorentzCone{a,..} => a.nrows(),
            Constraint::ExponentialCone{..}      => 3,
            Constraint::PositiveSemidefinite{rows} => rows*(rows+1)/2,
            Constraint::LinearMatrixInequality{f}  => f.first().map(|f0| f0.nrows()*(f0.nrows()+1)/2).unwrap_or(0),
        }
    }

    /// True if the constraint is a linear (in)equality or a bound.
    pub fn is_linear(&self) -> bool {
        matches!(self, Constraint::Linear{..} | Constraint::LinearEquality{..} | Constraint::BoundingBox{..})
    }

    /// Check whether `v` satisfies the constraint within tolerance `tol`.
    pub fn check_satisfied(&self, v : &DVector<f64>, tol : f64) -> bool {
        match self {
            Constraint::Linear{a,lb,ub} => {
                let z = a * v;
                z.iter().zip(lb.iter().zip(ub.iter())).all(|(&z,(&l,&u))| z >= l - tol && z <= u + tol)
            },
            Constraint::LinearEquality{a,b} => (a * v - b).amax() <= tol,
            Constraint::BoundingBox{lb,ub} =>
                v.iter().zip(lb.iter().zip(ub.iter())).all(|(&z,(&l,&u))| z >= l - tol && z <= u + tol),
            Constraint::LorentzCone{a,b} => {
                let z = a * v + b;
                z.len() == 0 || z[0] >= z.rows(1,z.len()-1).norm() - tol
            },
            Constraint::RotatedLorentzCone{a,b} => {
                let z = a * v + b;
                z.len() < 2 || (z[0] >= -tol && z[1] >= -tol && z[0]*z[1] >= z.rows(2,z.len()-2).norm_squared() - tol)
            },
            Constraint::ExponentialCone{a,b} => {
                let z = a * v + b;
                if z[1] > 0.0 {
                    z[0] >= z[1] * (z[2]/z[1]).exp() - tol
                }
                else {
                    // closure of the cone: z₁ = 0, z₂ ≤ 0, z₀ ≥ 0
                    z[1] >= -tol && z[2] <= tol && z[0] >= -tol
                }
            },
            Constraint::PositiveSemidefinite{rows} => {
                let m = DMatrix::from_column_slice(*rows,*rows,v.as_slice());
                min_symmetric_eigenvalue(&m) >= -tol
            },
            Constraint::LinearMatrixInequality{f} => {
                if f.is_empty() { return true; }
                let mut m = f[0].clone();
                for (fi,vi) in f[1..].iter().zip(v.iter()) {
                    m += fi * *vi;
                }
                min_symmetric_eigenvalue(&m) >= -tol
            },
        }
    }
}

fn min_symmetric_eigenvalue(m : &DMatrix<f64>) -> f64 {
    if m.nrows() == 0 { return 0.0; }
    let sym = (m + m.transpose()) * 0.5;
    sym.symmetric_eigenvalues().min()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lorentz_membership() {
        let c = Constraint::LorentzCone{ a : DMatrix::identity(3,3), b : DVector::zeros(3) };
        assert!(c.check_satisfied(&DVector::from_vec(vec![5.0,3.0,4.0]), 1e-9));
        assert!(!c.check_satisfied(&DVector::from_vec(vec![4.9,3.0,4.0]), 1e-9));
    }

    #[test]
    fn psd_membership() {
        let c = Constraint::PositiveSemidefinite{ rows : 2 };
        assert!(c.check_satisfied(&DVector::from_vec(vec![2.0,1.0,1.0,2.0]), 1e-9));
        assert!(!c.check_satisfied(&DVector::from_vec(vec![1.0,2.0,2.0,1.0]), 1e-9));
    }

    #[test]
    fn exponential_membership() {
        let c = Constraint::ExponentialCone{ a : DMatrix::identity(3,3), b : DVector::zeros(3) };
        assert!(c.check_satisfied(&DVector::from_vec(vec![std::f64::consts::E,1.0,1.0]), 1e-9));
        assert!(!c.check_satisfied(&DVector::from_vec(vec![2.0,1.0,1.0]), 1e-9));
    }
}
