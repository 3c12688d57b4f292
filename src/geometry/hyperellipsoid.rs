use std::any::Any;

use nalgebra::{DMatrix,DVector,Isometry3,Matrix3,Rotation3,Translation3,UnitQuaternion};

use crate::error::{check_dimension,Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,SolutionResult,Variable};
use crate::solvers;
use crate::utils::unit_ball_volume;
use super::{add_lorentz,ConvexSet,RigidTransform,Shape};

/// The set `{ x : |A (x - center)|₂ ≤ 1 }`.
///
/// `A` may have any number of rows; the set is bounded only if `A` has full column rank.
#[derive(Clone,Debug,PartialEq)]
pub struct Hyperellipsoid {
    a      : DMatrix<f64>,
    center : DVector<f64>,
}

impl Default for Hyperellipsoid {
    fn default() -> Self { Hyperellipsoid{ a : DMatrix::zeros(0,0), center : DVector::zeros(0) } }
}

impl Hyperellipsoid {
    pub fn new(a : DMatrix<f64>, center : DVector<f64>) -> Result<Hyperellipsoid> {
        if a.ncols() != center.len() {
            return Err(Error::invalid(format!("A has {} columns but center has length {}",a.ncols(),center.len())));
        }
        if a.iter().chain(center.iter()).any(|v| ! v.is_finite()) {
            return Err(Error::invalid("Hyperellipsoid parameters must be finite"));
        }
        Ok(Hyperellipsoid{ a, center })
    }

    /// The ball `{ x : |x| ≤ 1 }`.
    pub fn make_unit_ball(dim : usize) -> Hyperellipsoid {
        Hyperellipsoid{ a : DMatrix::identity(dim,dim), center : DVector::zeros(dim) }
    }

    pub fn make_hypersphere(radius : f64, center : DVector<f64>) -> Result<Hyperellipsoid> {
        if ! (radius > 0.0) {
            return Err(Error::invalid(format!("radius must be positive, got {}",radius)));
        }
        let n = center.len();
        Hyperellipsoid::new(DMatrix::identity(n,n) / radius,center)
    }

    /// The ellipsoid with semi-axes `radius` along the coordinate axes.
    pub fn make_axis_aligned(radius : &DVector<f64>, center : DVector<f64>) -> Result<Hyperellipsoid> {
        check_dimension(center.len(),radius.len())?;
        if radius.iter().any(|r| ! (*r > 0.0)) {
            return Err(Error::invalid("all radii must be positive"));
        }
        Hyperellipsoid::new(DMatrix::from_diagonal(&radius.map(|r| 1.0/r)),center)
    }

    #[allow(non_snake_case)]
    pub fn A(&self) -> &DMatrix<f64> { &self.a }
    pub fn center(&self) -> &DVector<f64> { &self.center }

    /// Volume, infinite for an unbounded ellipsoid.
    pub fn volume(&self) -> f64 {
        let n = self.center.len();
        if self.a.nrows() < n {
            return f64::INFINITY;
        }
        let det = (self.a.transpose() * &self.a).determinant();
        if det <= 0.0 {
            f64::INFINITY
        }
        else {
            unit_ball_volume(n) / det.sqrt()
        }
    }

    /// The smallest `σ ≥ 0` such that `σ·(self - center) + center` touches `other`, and the
    /// touching point.
    pub fn minimum_uniform_scaling_to_touch(&self, other : &dyn ConvexSet) -> Result<(f64,DVector<f64>)> {
        let n = self.ambient_dimension();
        check_dimension(n,other.ambient_dimension())?;
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(n,"x");
        let s = prog.new_continuous_variables(1,"s");
        other.add_point_in_set_constraints(& mut prog,&x)?;

        // (s, A x - A c) ∈ Lorentz cone
        let m = self.a.nrows();
        let mut a = DMatrix::zeros(m+1,n+1);
        a[(0,n)] = 1.0;
        a.view_mut((1,0),(m,n)).copy_from(&self.a);
        let mut b = DVector::zeros(m+1);
        b.rows_mut(1,m).copy_from(&(-(&self.a * &self.center)));
        let vars : Vec<Variable> = x.iter().chain(s.iter()).cloned().collect();
        prog.add_lorentz_cone_constraint(a,b,&vars)?;
        prog.add_linear_cost(DVector::from_element(1,1.0),0.0,&s)?;

        let r = solvers::solve(&prog)?;
        match r.solution_result() {
            SolutionResult::Success => Ok((r.get_optimal_cost(),r.get_solution_vec(&x))),
            SolutionResult::InfeasibleConstraints =>
                Err(Error::invalid(format!("MinimumUniformScalingToTouch: the {} is empty",other.type_name()))),
            sr => Err(Error::solver(format!("MinimumUniformScalingToTouch failed with {} ({})",sr,r.solver_details())))
        }
    }
}

impl ConvexSet for Hyperellipsoid {
    fn ambient_dimension(&self) -> usize { self.center.len() }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "Hyperellipsoid" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        let y = &self.a * (x - &self.center);
        y.norm_squared() <= 1.0 + tol
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let (m,n) = self.a.shape();
        let mut a = DMatrix::zeros(m+1,n);
        a.view_mut((1,0),(m,n)).copy_from(&self.a);
        let mut b = DVector::zeros(m+1);
        b[0] = 1.0;
        b.rows_mut(1,m).copy_from(&(-(&self.a * &self.center)));
        let c = prog.add_lorentz_cone_constraint(a,b,x)?;
        Ok((Vec::new(),vec![c]))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        // (t, A x - A c t)
        let ac = &self.a * &self.center;
        let mut rows = Vec::with_capacity(self.a.nrows()+1);
        rows.push(t.clone());
        for i in 0..self.a.nrows() {
            let mut e = t.clone() * (-ac[i]);
            for (j,xj) in x.iter().enumerate() {
                if self.a[(i,j)] != 0.0 { e += xj.clone() * self.a[(i,j)]; }
            }
            rows.push(e);
        }
        Ok(vec![add_lorentz(prog,&rows)?])
    }

    fn do_is_empty(&self) -> Result<bool> { Ok(false) }

    fn do_is_bounded(&self) -> Result<bool> {
        let n = self.center.len();
        Ok(self.a.nrows() >= n && self.a.rank(1e-10) == n)
    }

    /// The ellipsoid with semi-axes sorted in decreasing length, posed along its principal axes.
    fn do_to_shape_with_pose(&self) -> Result<(Shape,RigidTransform)> {
        if self.center.len() != 3 {
            return Err(Error::invalid(format!("ToShapeWithPose requires a 3-dimensional Hyperellipsoid, got dimension {}",self.center.len())));
        }
        let ata = self.a.transpose() * &self.a;
        let eig = ata.symmetric_eigen();
        if eig.eigenvalues.iter().any(|&l| l <= 1e-12) {
            return Err(Error::invalid("ToShapeWithPose: the Hyperellipsoid is unbounded"));
        }
        // smallest eigenvalue first, i.e. longest semi-axis first
        let mut order = [0usize,1,2];
        order.sort_by(|&i,&j| eig.eigenvalues[i].total_cmp(&eig.eigenvalues[j]));
        let radii : Vec<f64> = order.iter().map(|&i| 1.0 / eig.eigenvalues[i].sqrt()).collect();

        let mut r = Matrix3::from_fn(|i,j| eig.eigenvectors[(i,order[j])]);
        if r.determinant() < 0.0 {
            r.column_mut(2).neg_mut();
        }
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        let pose = Isometry3::from_parts(Translation3::new(self.center[0],self.center[1],self.center[2]),rotation);
        Ok((Shape::Ellipsoid{ a : radii[0], b : radii[1], c : radii[2] },pose))
    }
}
