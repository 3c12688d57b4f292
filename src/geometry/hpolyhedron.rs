use std::any::Any;
use std::collections::BTreeSet;

use nalgebra::{DMatrix,DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::error::{check_dimension,Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,SolutionResult,Variable};
use crate::solvers::{self,SolverOptions};
use super::{add_le_zero,affine_minus_scaled,support,ConvexSet,Hyperellipsoid,VPolytope};

/// The set `{ x : A x ≤ b }`.
#[derive(Clone,Debug,Default,PartialEq)]
pub struct HPolyhedron {
    a : DMatrix<f64>,
    b : DVector<f64>,
}

/// Largest `rowᵀ x` over `{ x : A x ≤ b }` with the extra row `rowᵀ x ≤ rhs + 1` keeping the
/// program bounded; `None` if the polyhedron is empty.
fn row_support(a : &DMatrix<f64>, b : &DVector<f64>, row : &DVector<f64>, rhs : f64) -> Result<Option<f64>> {
    let n = row.len();
    let mut prog = MathematicalProgram::new();
    let x = prog.new_continuous_variables(n,"x");
    if a.nrows() > 0 {
        prog.add_linear_constraint(a.clone(),DVector::from_element(a.nrows(),f64::NEG_INFINITY),b.clone(),&x)?;
    }
    prog.add_linear_constraint(DMatrix::from_row_slice(1,n,row.as_slice()),
                               DVector::from_element(1,f64::NEG_INFINITY),
                               DVector::from_element(1,rhs + 1.0),
                               &x)?;
    prog.add_linear_cost(-row,0.0,&x)?;
    let r = solvers::solve(&prog)?;
    match r.solution_result() {
        SolutionResult::Success               => Ok(Some(-r.get_optimal_cost())),
        SolutionResult::InfeasibleConstraints => Ok(None),
        s => Err(Error::solver(format!("redundancy program returned {} ({})",s,r.solver_details())))
    }
}

impl HPolyhedron {
    /// Create `{ x : A x ≤ b }`. Fails if `A` and `b` have different number of rows.
    pub fn new(a : DMatrix<f64>, b : DVector<f64>) -> Result<HPolyhedron> {
        if a.nrows() != b.len() {
            return Err(Error::invalid(format!("A has {} rows but b has length {}",a.nrows(),b.len())));
        }
        Ok(HPolyhedron{ a, b })
    }

    #[allow(non_snake_case)]
    pub fn A(&self) -> &DMatrix<f64> { &self.a }
    pub fn b(&self) -> &DVector<f64> { &self.b }

    /// The H-representation of the convex hull of a V-polytope.
    pub fn from_vpolytope(vpoly : &VPolytope) -> Result<HPolyhedron> {
        let (a,b) = super::double_description::facets(vpoly.vertices())?;
        HPolyhedron::new(a,b)
    }

    /// The box `{ x : lb ≤ x ≤ ub }` as `[I;-I] x ≤ [ub;-lb]`.
    pub fn make_box(lb : &DVector<f64>, ub : &DVector<f64>) -> Result<HPolyhedron> {
        check_dimension(lb.len(),ub.len())?;
        if lb.iter().zip(ub.iter()).any(|(l,u)| l > u) {
            return Err(Error::invalid("lower bounds must not exceed upper bounds"));
        }
        let n = lb.len();
        let mut a = DMatrix::zeros(2*n,n);
        a.view_mut((0,0),(n,n)).fill_with_identity();
        a.view_mut((n,0),(n,n)).copy_from(&(-DMatrix::<f64>::identity(n,n)));
        let mut b = DVector::zeros(2*n);
        b.rows_mut(0,n).copy_from(ub);
        b.rows_mut(n,n).copy_from(&(-lb));
        Ok(HPolyhedron{ a, b })
    }

    /// The box `[-1,1]ⁿ`.
    pub fn make_unit_box(dim : usize) -> HPolyhedron {
        let mut a = DMatrix::zeros(2*dim,dim);
        for i in 0..dim {
            a[(i,i)] = 1.0;
            a[(dim+i,i)] = -1.0;
        }
        HPolyhedron{ a, b : DVector::from_element(2*dim,1.0) }
    }

    /// The unit L1 ball `{ x : |x|₁ ≤ 1 }` using `2ⁿ` inequalities, one per sign pattern.
    pub fn make_l1_ball(dim : usize) -> Result<HPolyhedron> {
        if dim == 0 || dim >= usize::BITS as usize {
            return Err(Error::invalid(format!("invalid dimension {} for an L1 ball",dim)));
        }
        let m = 1usize << dim;
        let a = DMatrix::from_fn(m,dim,|k,j| if (k >> j) & 1 == 1 { -1.0 } else { 1.0 });
        Ok(HPolyhedron{ a, b : DVector::from_element(m,1.0) })
    }

    /// Returns true if `self ⊆ other`, checked one row of `other` at a time.
    pub fn contained_in(&self, other : &HPolyhedron, tol : f64) -> Result<bool> {
        check_dimension(self.ambient_dimension(),other.ambient_dimension())?;
        for i in 0..other.a.nrows() {
            let row = other.a.row(i).transpose();
            match support(self,&row)? {
                None                                  => return Ok(true),
                Some(v) if v > other.b[i] + tol       => return Ok(false),
                Some(_)                               => {}
            }
        }
        Ok(true)
    }

    /// Intersect with `other` by stacking the inequalities.
    ///
    /// With `check_for_redundancy` the rows of `other` that are already implied, within `tol`, by
    /// the inequalities collected so far are dropped.
    pub fn intersection(&self, other : &HPolyhedron, check_for_redundancy : bool, tol : f64) -> Result<HPolyhedron> {
        check_dimension(self.ambient_dimension(),other.ambient_dimension())?;
        if ! check_for_redundancy {
            let a = concat_rows(&self.a,&other.a);
            let b = concat_vec(&self.b,&other.b);
            return Ok(HPolyhedron{ a, b });
        }

        let mut a = self.a.clone();
        let mut b = self.b.clone();
        for i in 0..other.a.nrows() {
            let row = other.a.row(i).transpose();
            let redundant = match row_support(&a,&b,&row,other.b[i])? {
                Some(v) => v <= other.b[i] + tol,
                None    => true,
            };
            if ! redundant {
                a = concat_rows(&a,&other.a.rows(i,1).into_owned());
                b = concat_vec(&b,&DVector::from_element(1,other.b[i]));
            }
        }
        Ok(HPolyhedron{ a, b })
    }

    /// Indices of inequalities implied, within `tol`, by the other inequalities.
    ///
    /// Rows are visited in order and a row found redundant is not used when checking later rows,
    /// so of two identical rows only the first is reported.
    pub fn find_redundant(&self, tol : f64) -> Result<BTreeSet<usize>> {
        let m = self.a.nrows();
        let mut redundant = BTreeSet::new();
        for i in 0..m {
            let kept : Vec<usize> = (0..m).filter(|&j| j != i && ! redundant.contains(&j)).collect();
            let a = self.a.select_rows(kept.iter());
            let b = self.b.select_rows(kept.iter());
            let row = self.a.row(i).transpose();
            if let Some(v) = row_support(&a,&b,&row,self.b[i])? {
                if v <= self.b[i] + tol {
                    redundant.insert(i);
                }
            }
        }
        debug!("find_redundant: {} of {} rows are redundant",redundant.len(),m);
        Ok(redundant)
    }

    /// Drop the redundant inequalities.
    pub fn reduce_inequalities(&self, tol : f64) -> Result<HPolyhedron> {
        let redundant = self.find_redundant(tol)?;
        let kept : Vec<usize> = (0..self.a.nrows()).filter(|i| ! redundant.contains(i)).collect();
        Ok(HPolyhedron{ a : self.a.select_rows(kept.iter()), b : self.b.select_rows(kept.iter()) })
    }

    /// The product `{ (x,y) : x ∈ self, y ∈ other }`.
    pub fn cartesian_product(&self, other : &HPolyhedron) -> HPolyhedron {
        let (m1,n1) = self.a.shape();
        let (m2,n2) = other.a.shape();
        let mut a = DMatrix::zeros(m1+m2,n1+n2);
        a.view_mut((0,0),(m1,n1)).copy_from(&self.a);
        a.view_mut((m1,n1),(m2,n2)).copy_from(&other.a);
        HPolyhedron{ a, b : concat_vec(&self.b,&other.b) }
    }

    /// The product of `n` copies of the polyhedron.
    pub fn cartesian_power(&self, n : usize) -> HPolyhedron {
        let (m,d) = self.a.shape();
        let mut a = DMatrix::zeros(m*n,d*n);
        let mut b = DVector::zeros(m*n);
        for k in 0..n {
            a.view_mut((k*m,k*d),(m,d)).copy_from(&self.a);
            b.rows_mut(k*m,m).copy_from(&self.b);
        }
        HPolyhedron{ a, b }
    }

    /// The set `{ x : x + y ∈ self for all y ∈ other }`.
    pub fn pontryagin_difference(&self, other : &HPolyhedron) -> Result<HPolyhedron> {
        check_dimension(self.ambient_dimension(),other.ambient_dimension())?;
        let mut b = self.b.clone();
        for i in 0..self.a.nrows() {
            let row = self.a.row(i).transpose();
            match support(other,&row)? {
                Some(h) if h.is_finite() => b[i] -= h,
                Some(_) => return Err(Error::invalid("PontryaginDifference: the subtracted polyhedron is unbounded")),
                None    => return Err(Error::invalid("PontryaginDifference: the subtracted polyhedron is empty")),
            }
        }
        Ok(HPolyhedron{ a : self.a.clone(), b })
    }

    /// Center of the largest inscribed ball.
    pub fn chebyshev_center(&self) -> Result<DVector<f64>> {
        let n = self.ambient_dimension();
        let m = self.a.nrows();
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(n,"x");
        let r = prog.new_continuous_variables(1,"r");
        let vars : Vec<Variable> = x.iter().chain(r.iter()).cloned().collect();
        let mut a = DMatrix::zeros(m,n+1);
        a.view_mut((0,0),(m,n)).copy_from(&self.a);
        for i in 0..m {
            a[(i,n)] = self.a.row(i).norm();
        }
        prog.add_linear_constraint(a,DVector::from_element(m,f64::NEG_INFINITY),self.b.clone(),&vars)?;
        prog.add_bounding_box_constraint(DVector::zeros(1),DVector::from_element(1,f64::INFINITY),&r)?;
        prog.add_linear_cost(DVector::from_element(1,-1.0),0.0,&r)?;
        let res = solvers::solve(&prog)?;
        match res.solution_result() {
            SolutionResult::Success               => Ok(res.get_solution_vec(&x)),
            SolutionResult::InfeasibleConstraints => Err(Error::solver("ChebyshevCenter: the polyhedron is empty")),
            SolutionResult::Unbounded             => Err(Error::solver("ChebyshevCenter: the polyhedron contains arbitrarily large balls")),
            s => Err(Error::solver(format!("ChebyshevCenter failed with {} ({})",s,res.solver_details())))
        }
    }

    /// The inscribed ellipsoid of maximum volume.
    ///
    /// The ellipsoid is parametrized as `{ L u + d : |u| ≤ 1 }` with `L` lower triangular; we
    /// maximize `Σ log Lₖₖ` subject to `|Lᵀaᵢ| ≤ bᵢ - aᵢᵀd`.
    pub fn maximum_volume_inscribed_ellipsoid(&self) -> Result<Hyperellipsoid> {
        self.maximum_volume_inscribed_ellipsoid_with(&SolverOptions::default())
    }

    /// [HPolyhedron::maximum_volume_inscribed_ellipsoid] with explicit parameters for the
    /// default backend.
    pub fn maximum_volume_inscribed_ellipsoid_with(&self, options : &SolverOptions) -> Result<Hyperellipsoid> {
        let n = self.ambient_dimension();
        if n == 0 {
            return Err(Error::invalid("MaximumVolumeInscribedEllipsoid of a zero-dimensional polyhedron"));
        }
        let mut prog = MathematicalProgram::new();
        // lower triangle of L, column by column
        let mut lindex = vec![vec![0usize; n]; n];
        let mut lvars = Vec::with_capacity(n*(n+1)/2);
        for j in 0..n {
            for i in j..n {
                lindex[i][j] = lvars.len();
                lvars.push(prog.new_continuous_variables(1,format!("L({},{})",i,j).as_str()).remove(0));
            }
        }
        let d = prog.new_continuous_variables(n,"d");
        let t = prog.new_continuous_variables(n,"t");
        let nl = lvars.len();
        let vars : Vec<Variable> = lvars.iter().chain(d.iter()).cloned().collect();

        for i in 0..self.a.nrows() {
            let ai = self.a.row(i);
            let mut a = DMatrix::zeros(n+1,nl+n);
            let mut b = DVector::zeros(n+1);
            for j in 0..n { a[(0,nl+j)] = -ai[j]; }
            b[0] = self.b[i];
            // (Lᵀ aᵢ)ₖ = Σ_{j ≥ k} L(j,k) aᵢⱼ
            for k in 0..n {
                for j in k..n {
                    a[(k+1,lindex[j][k])] = ai[j];
                }
            }
            prog.add_lorentz_cone_constraint(a,b,&vars)?;
        }
        for k in 0..n {
            let lkk = &lvars[lindex[k][k]];
            let a = DMatrix::from_row_slice(3,2,&[1.0,0.0, 0.0,0.0, 0.0,1.0]);
            let b = DVector::from_vec(vec![0.0,1.0,0.0]);
            prog.add_exponential_cone_constraint(a,b,&[lkk.clone(),t[k].clone()])?;
        }
        prog.add_linear_cost(DVector::from_element(n,-1.0),0.0,&t)?;

        let res = solvers::solve_with(None,&prog,options)?;
        match res.solution_result() {
            SolutionResult::Success => {},
            SolutionResult::InfeasibleConstraints => return Err(Error::solver("MaximumVolumeInscribedEllipsoid: the polyhedron is empty")),
            SolutionResult::Unbounded => return Err(Error::solver("MaximumVolumeInscribedEllipsoid: the polyhedron is unbounded")),
            s => return Err(Error::solver(format!("MaximumVolumeInscribedEllipsoid failed with {} ({})",s,res.solver_details())))
        }
        let lval = res.get_solution_vec(&lvars);
        let l = DMatrix::from_fn(n,n,|i,j| if i >= j { lval[lindex[i][j]] } else { 0.0 });
        let center = res.get_solution_vec(&d);
        let linv = l.try_inverse()
            .ok_or_else(|| Error::solver("MaximumVolumeInscribedEllipsoid: the inscribed ellipsoid is degenerate"))?;
        Hyperellipsoid::new(linv,center)
    }

    /// Draw a sample by hit-and-run, starting from `previous_sample` or from the Chebyshev
    /// center.
    pub fn uniform_sample<R : Rng + ?Sized>(&self, rng : & mut R, previous_sample : Option<&DVector<f64>>, mixing_steps : usize) -> Result<DVector<f64>> {
        let n = self.ambient_dimension();
        let mut current = match previous_sample {
            Some(x) => {
                check_dimension(n,x.len())?;
                if ! self.point_in_set(x,1e-9) {
                    return Err(Error::invalid("UniformSample: the previous sample is not in the polyhedron"));
                }
                x.clone()
            },
            None => self.chebyshev_center()?
        };
        for _ in 0..mixing_steps.max(1) {
            let dir = DVector::from_fn(n,|_,_| rng.sample::<f64,_>(StandardNormal));
            let line_a = &self.a * &dir;
            let line_b = &self.b - &self.a * &current;
            let mut theta_min = f64::NEG_INFINITY;
            let mut theta_max = f64::INFINITY;
            for (&ad,&rhs) in line_a.iter().zip(line_b.iter()) {
                if ad > 0.0 { theta_max = theta_max.min(rhs / ad); }
                else if ad < 0.0 { theta_min = theta_min.max(rhs / ad); }
            }
            if ! theta_min.is_finite() || ! theta_max.is_finite() {
                return Err(Error::invalid("UniformSample: the polyhedron is unbounded"));
            }
            let theta = if theta_max > theta_min { theta_min + (theta_max - theta_min) * rng.gen::<f64>() } else { theta_min };
            current += dir * theta;
        }
        Ok(current)
    }

    /// Scale the polyhedron about `center` so that its volume is multiplied by `scale`. The
    /// center defaults to the Chebyshev center.
    pub fn scale(&self, scale : f64, center : Option<DVector<f64>>) -> Result<HPolyhedron> {
        if scale < 0.0 {
            return Err(Error::invalid(format!("scale must be nonnegative, got {}",scale)));
        }
        let c = match center {
            Some(c) => { check_dimension(self.ambient_dimension(),c.len())?; c },
            None    => self.chebyshev_center()?
        };
        let ac = &self.a * &c;
        let factor = scale.powf(1.0 / self.ambient_dimension() as f64);
        Ok(HPolyhedron{ a : self.a.clone(), b : (&self.b - &ac) * factor + ac })
    }
}

fn concat_rows(a : &DMatrix<f64>, b : &DMatrix<f64>) -> DMatrix<f64> {
    let n = a.ncols().max(b.ncols());
    let mut r = DMatrix::zeros(a.nrows()+b.nrows(),n);
    r.view_mut((0,0),a.shape()).copy_from(a);
    r.view_mut((a.nrows(),0),b.shape()).copy_from(b);
    r
}

fn concat_vec(a : &DVector<f64>, b : &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(a.len()+b.len(),a.iter().chain(b.iter()).cloned())
}

impl ConvexSet for HPolyhedron {
    fn ambient_dimension(&self) -> usize { self.a.ncols() }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "HPolyhedron" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        (&self.a * x - &self.b).iter().all(|&v| v <= tol)
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let c = prog.add_linear_constraint(self.a.clone(),
                                           DVector::from_element(self.b.len(),f64::NEG_INFINITY),
                                           self.b.clone(),
                                           x)?;
        Ok((Vec::new(),vec![c]))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        let rows = affine_minus_scaled(&self.a,x,&self.b,t);
        Ok(vec![add_le_zero(prog,&rows)?])
    }

    fn do_is_bounded(&self) -> Result<bool> {
        let n = self.ambient_dimension();
        // a polyhedron whose A has a nontrivial null space contains a line, unless it is empty
        if self.a.nrows() < n || self.a.rank(1e-10) < n {
            return super::generic_is_empty(self);
        }
        super::generic_is_bounded(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    #[test]
    fn unit_box() {
        let h = HPolyhedron::make_unit_box(3);
        assert_eq!(h.A().shape(),(6,3));
        assert!(h.point_in_set(&vec(&[0.8,0.3,-0.9]),1e-12));
        assert!(!h.point_in_set(&vec(&[1.2,0.3,0.0]),1e-12));
        assert!(h.is_bounded().unwrap());
        assert!(!h.is_empty().unwrap());

        let b = HPolyhedron::make_box(&vec(&[-1.0,-1.0,-1.0]),&vec(&[1.0,1.0,1.0])).unwrap();
        assert_eq!(b,h);
        assert!(HPolyhedron::make_box(&vec(&[1.0]),&vec(&[0.0])).is_err());
    }

    #[test]
    fn new_checks_rows() {
        assert!(HPolyhedron::new(DMatrix::zeros(2,2),DVector::zeros(3)).is_err());
    }

    #[test]
    fn l1_ball() {
        let h = HPolyhedron::make_l1_ball(3).unwrap();
        assert_eq!(h.A().nrows(),8);
        assert!(h.point_in_set(&vec(&[0.5,-0.25,0.25]),1e-12));
        assert!(!h.point_in_set(&vec(&[0.5,-0.5,0.25]),1e-12));
        assert!(h.is_bounded().unwrap());
    }

    #[test]
    fn unbounded_halfspace() {
        let h = HPolyhedron::new(DMatrix::from_row_slice(1,2,&[1.0,0.0]),vec(&[1.0])).unwrap();
        assert!(!h.is_bounded().unwrap());
        assert!(!h.is_empty().unwrap());
    }

    #[test]
    fn empty_polyhedron() {
        let h = HPolyhedron::new(DMatrix::from_row_slice(2,1,&[1.0,-1.0]),vec(&[-1.0,-1.0])).unwrap();
        assert!(h.is_empty().unwrap());
    }

    #[test]
    fn chebyshev_center() {
        let h = HPolyhedron::make_box(&vec(&[0.0,0.0]),&vec(&[4.0,2.0])).unwrap();
        let c = h.chebyshev_center().unwrap();
        assert!((c[1] - 1.0).abs() < 1e-6);
        assert!(c[0] >= 1.0 - 1e-6 && c[0] <= 3.0 + 1e-6);
    }

    #[test]
    fn find_redundant() {
        let a = DMatrix::from_row_slice(5,2,&[1.0,0.0, 0.0,1.0, -1.0,0.0, 0.0,-1.0, 1.0,0.0]);
        let b = vec(&[1.0,1.0,1.0,1.0,2.0]);
        let h = HPolyhedron::new(a,b).unwrap();
        let r = h.find_redundant(1e-9).unwrap();
        assert_eq!(r.into_iter().collect::<Vec<_>>(),vec![4]);
        let reduced = h.reduce_inequalities(1e-9).unwrap();
        assert_eq!(reduced.A().nrows(),4);
    }

    #[test]
    fn duplicate_rows() {
        let a = DMatrix::from_row_slice(3,1,&[1.0,1.0,-1.0]);
        let h = HPolyhedron::new(a,vec(&[1.0,1.0,1.0])).unwrap();
        let r = h.find_redundant(1e-9).unwrap();
        assert_eq!(r.len(),1);
    }

    #[test]
    fn intersection() {
        let h1 = HPolyhedron::make_unit_box(2);
        let h2 = HPolyhedron::make_box(&vec(&[0.0,0.0]),&vec(&[2.0,2.0])).unwrap();
        let plain = h1.intersection(&h2,false,1e-9).unwrap();
        assert_eq!(plain.A().nrows(),8);
        let checked = h1.intersection(&h2,true,1e-9).unwrap();
        assert_eq!(checked.A().nrows(),6);
        assert!(checked.point_in_set(&vec(&[0.5,0.5]),1e-12));
        assert!(!checked.point_in_set(&vec(&[-0.5,0.5]),1e-12));
        assert!(h1.intersection(&HPolyhedron::make_unit_box(3),false,1e-9).is_err());
    }

    #[test]
    fn contained_in() {
        let small = HPolyhedron::make_box(&vec(&[-0.5,-0.5]),&vec(&[0.5,0.5])).unwrap();
        let big = HPolyhedron::make_unit_box(2);
        assert!(small.contained_in(&big,1e-8).unwrap());
        assert!(!big.contained_in(&small,1e-8).unwrap());
    }

    #[test]
    fn cartesian_products() {
        let h = HPolyhedron::make_unit_box(1);
        let p = h.cartesian_product(&HPolyhedron::make_box(&vec(&[0.0]),&vec(&[2.0])).unwrap());
        assert_eq!(p.ambient_dimension(),2);
        assert!(p.point_in_set(&vec(&[-1.0,2.0]),1e-12));
        assert!(!p.point_in_set(&vec(&[0.0,-0.5]),1e-12));
        let q = h.cartesian_power(3);
        assert_eq!(q,HPolyhedron::make_unit_box(3));
    }

    #[test]
    fn pontryagin_difference() {
        let big = HPolyhedron::make_box(&vec(&[-2.0,-2.0]),&vec(&[2.0,2.0])).unwrap();
        let small = HPolyhedron::make_box(&vec(&[-0.5,-0.5]),&vec(&[0.5,0.5])).unwrap();
        let d = big.pontryagin_difference(&small).unwrap();
        let expected = HPolyhedron::make_box(&vec(&[-1.5,-1.5]),&vec(&[1.5,1.5])).unwrap();
        assert!((d.b() - expected.b()).amax() < 1e-6);
    }

    #[test]
    fn mvie_of_box() {
        let h = HPolyhedron::make_box(&vec(&[0.0,0.0]),&vec(&[2.0,4.0])).unwrap();
        let e = h.maximum_volume_inscribed_ellipsoid().unwrap();
        assert!((e.center() - vec(&[1.0,2.0])).amax() < 1e-4);
        // semi-axes 1 and 2
        let ata = e.A().transpose() * e.A();
        assert!((ata[(0,0)] - 1.0).abs() < 1e-3);
        assert!((ata[(1,1)] - 0.25).abs() < 1e-3);
        assert!(ata[(0,1)].abs() < 1e-3);
    }

    #[test]
    fn uniform_sample_stays_inside() {
        let h = HPolyhedron::make_l1_ball(2).unwrap();
        let mut rng = StdRng::seed_from_u64(1234);
        let mut x = h.uniform_sample(& mut rng,None,10).unwrap();
        for _ in 0..100 {
            x = h.uniform_sample(& mut rng,Some(&x),3).unwrap();
            assert!(h.point_in_set(&x,1e-9));
        }
        let unbounded = HPolyhedron::new(DMatrix::from_row_slice(1,2,&[1.0,0.0]),vec(&[1.0])).unwrap();
        assert!(unbounded.uniform_sample(& mut rng,Some(&vec(&[0.0,0.0])),1).is_err());
    }

    #[test]
    fn scale() {
        let h = HPolyhedron::make_unit_box(2);
        let s = h.scale(4.0,Some(vec(&[0.0,0.0]))).unwrap();
        assert!((s.b() - DVector::from_element(4,2.0)).amax() < 1e-12);
        let s = h.scale(0.25,None).unwrap();
        assert!(s.point_in_set(&vec(&[0.5,0.5]),1e-6));
        assert!(!s.point_in_set(&vec(&[0.6,0.0]),1e-6));
        assert!(h.scale(-1.0,None).is_err());
    }

    #[test]
    fn scaling_constraints() {
        let h = HPolyhedron::make_unit_box(2);
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        let t = prog.new_continuous_variables(1,"t");
        let cons = h.add_point_in_nonnegative_scaling_constraints(& mut prog,&x,&t[0]).unwrap();
        assert_eq!(cons.len(),2);
        assert!(prog.check_satisfied(&cons,&vec(&[1.5,-1.5,2.0]),1e-9).unwrap());
        assert!(!prog.check_satisfied(&cons,&vec(&[1.5,-1.5,1.0]),1e-9).unwrap());
        assert!(prog.check_satisfied(&cons,&vec(&[0.0,0.0,0.0]),1e-9).unwrap());
    }

    #[test]
    fn affine_scaling_constraints() {
        // A x + b ∈ (cᵀt + d) [-1,1]²
        let h = HPolyhedron::make_unit_box(2);
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        let t = prog.new_continuous_variables(2,"t");
        let a = DMatrix::from_row_slice(2,2,&[2.0,0.0, 0.0,1.0]);
        let b = vec(&[0.0,1.0]);
        let c = vec(&[1.0,1.0]);
        let cons = h.add_point_in_nonnegative_scaling_constraints_affine(& mut prog,&a,&b,&c,1.0,&x,&t).unwrap();
        assert_eq!(cons.len(),2);
        // x = (1,0), t = (0,1): A x + b = (2,1), scale 2
        assert!(prog.check_satisfied(&cons,&vec(&[1.0,0.0,0.0,1.0]),1e-9).unwrap());
        // x = (1,2): A x + b = (2,3) not in 2·box
        assert!(!prog.check_satisfied(&cons,&vec(&[1.0,2.0,0.0,1.0]),1e-9).unwrap());
    }

    #[test]
    fn intersects_with() {
        let h1 = HPolyhedron::make_unit_box(2);
        let h2 = HPolyhedron::make_box(&vec(&[0.5,0.5]),&vec(&[3.0,3.0])).unwrap();
        let h3 = HPolyhedron::make_box(&vec(&[1.5,1.5]),&vec(&[3.0,3.0])).unwrap();
        assert!(h1.intersects_with(&h2).unwrap());
        assert!(!h1.intersects_with(&h3).unwrap());
    }

    #[test]
    fn shape_not_implemented() {
        let h = HPolyhedron::make_unit_box(3);
        match h.to_shape_with_pose() {
            Err(Error::NotImplemented(msg)) => assert!(msg.contains("not implemented yet for HPolyhedron")),
            other => panic!("unexpected {:?}",other.map(|_| ())),
        }
    }
}
