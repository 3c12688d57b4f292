//! Iterative regional inflation.
//!
//! IRIS grows a large convex region around a seed point that avoids a set of convex obstacles.
//! Each iteration separates every obstacle from the current inscribed ellipsoid with a
//! hyperplane tangent to a scaled copy of the ellipsoid, intersects those half spaces with the
//! domain, and then recomputes the maximum volume inscribed ellipsoid of the result. The loop
//! stops when the ellipsoid volume stops growing or the iteration limit is hit.
//!
//! [cspace::iris_in_configuration_space] runs the same loop with obstacles that are only known
//! through a collision predicate.

pub mod cspace;

use std::sync::Arc;

use nalgebra::{DMatrix,DVector};
use tracing::{debug,info};

use crate::error::{check_dimension,Error,Result};
use crate::geometry::{ConvexSet,HPolyhedron,Hyperellipsoid};
use crate::program::MathematicalProgram;
use crate::solvers::SolverOptions;

/// Radius of the ball around the sample used as the first ellipsoid.
const STARTING_RADIUS : f64 = 1e-2;

/// Parameters for [iris] and [cspace::iris_in_configuration_space].
#[derive(Clone,Debug)]
pub struct IrisOptions {
    /// Stop, and return the region of the previous iteration, if a new region would not contain
    /// the sample.
    pub require_sample_point_is_contained : bool,
    pub iteration_limit : usize,
    /// Stop when the inscribed ellipsoid volume grows by less than this.
    pub termination_threshold : f64,
    /// Stop when the inscribed ellipsoid volume grows by less than this fraction.
    pub relative_termination_threshold : f64,
    /// Configuration space only: hyperplanes found by sampling are moved this far towards the
    /// ellipsoid center.
    pub configuration_space_margin : f64,
    /// Configuration space only: the number of consecutive collision free samples after which
    /// no more collisions are searched for in an iteration.
    pub num_collision_infeasible_samples : usize,
    /// Configuration space only: obstacles given directly in configuration space. The handles
    /// are shared, so the sets read back are the ones stored.
    pub configuration_obstacles : Vec<Arc<dyn ConvexSet>>,
    /// Configuration space only: a program whose decision variables are the positions. Its
    /// constraints must hold everywhere in the region.
    pub prog_with_additional_constraints : Option<Arc<MathematicalProgram>>,
    /// Like `num_collision_infeasible_samples`, for `prog_with_additional_constraints`.
    pub num_additional_constraint_infeasible_samples : usize,
    /// Seed for the sampler in configuration space.
    pub random_seed : u64,
    /// First ellipsoid, in place of a small ball around the sample.
    pub starting_ellipse : Option<Hyperellipsoid>,
    /// Configuration space only: intersected with the position limits to form the domain.
    pub bounding_region : Option<HPolyhedron>,
    /// Parameters for the inscribed ellipsoid solves.
    pub solver_options : Option<SolverOptions>,
}

impl Default for IrisOptions {
    fn default() -> Self {
        IrisOptions{
            require_sample_point_is_contained : false,
            iteration_limit : 100,
            termination_threshold : 2e-2,
            relative_termination_threshold : 1e-3,
            configuration_space_margin : 1e-2,
            num_collision_infeasible_samples : 5,
            configuration_obstacles : Vec::new(),
            prog_with_additional_constraints : None,
            num_additional_constraint_infeasible_samples : 5,
            random_seed : 1234,
            starting_ellipse : None,
            bounding_region : None,
            solver_options : None,
        }
    }
}

/// Why the region growing stopped.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum IrisTermination {
    /// The inscribed ellipsoid volume stopped growing.
    Converged,
    IterationLimit,
    /// The next region would not have contained the sample; the previous region was returned.
    SampleNotContained,
}

impl std::fmt::Display for IrisTermination {
    fn fmt(&self, f : & mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            IrisTermination::Converged          => write!(f,"converged"),
            IrisTermination::IterationLimit     => write!(f,"iteration limit"),
            IrisTermination::SampleNotContained => write!(f,"sample not contained"),
        }
    }
}

/////////////////////////////////////////////////////////////////////
// Half space accumulation

/// Inequalities `aᵢᵀx ≤ bᵢ` collected in one iteration, starting with the domain.
pub(crate) struct Halfspaces {
    dim  : usize,
    rows : Vec<DVector<f64>>,
    rhs  : Vec<f64>,
}

impl Halfspaces {
    pub(crate) fn new(domain : &HPolyhedron) -> Halfspaces {
        let a = domain.A();
        Halfspaces{
            dim  : a.ncols(),
            rows : a.row_iter().map(|r| r.transpose()).collect(),
            rhs  : domain.b().iter().cloned().collect(),
        }
    }

    pub(crate) fn push(& mut self, a : DVector<f64>, b : f64) {
        self.rows.push(a);
        self.rhs.push(b);
    }

    pub(crate) fn len(&self) -> usize { self.rows.len() }

    pub(crate) fn polyhedron(&self) -> Result<HPolyhedron> {
        let a = DMatrix::from_fn(self.rows.len(),self.dim,|i,j| self.rows[i][j]);
        HPolyhedron::new(a,DVector::from_column_slice(self.rhs.as_slice()))
    }
}

/// Add a hyperplane tangent to a scaled copy of `e` for every obstacle that is not already
/// excluded, visiting the obstacles closest to `e` first.
///
/// # Returns
/// The number of hyperplanes added.
pub(crate) fn add_obstacle_hyperplanes(e : &Hyperellipsoid, obstacles : &[&dyn ConvexSet], hs : & mut Halfspaces) -> Result<usize> {
    let tangent = e.A().transpose() * e.A() * 2.0;
    let mut touch = obstacles.iter().enumerate()
        .map(|(i,o)| e.minimum_uniform_scaling_to_touch(*o).map(|(s,x)| (s,i,x)))
        .collect::<Result<Vec<(f64,usize,DVector<f64>)>>>()?;
    touch.sort_by(|a,b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut added = 0;
    for (_,i,point) in touch {
        if ! hs.polyhedron()?.intersects_with(obstacles[i])? {
            continue;
        }
        let normal = &tangent * (&point - e.center());
        let norm = normal.norm();
        if norm <= 1e-12 {
            return Err(Error::solver(format!("IRIS: obstacle {} contains the center of the inscribed ellipsoid",i)));
        }
        let normal = normal / norm;
        let b = normal.dot(&point);
        hs.push(normal,b);
        added += 1;
    }
    Ok(added)
}

/// Outcome of one iteration; shared by both variants.
pub(crate) enum Step {
    Continue(Hyperellipsoid),
    Stop(IrisTermination),
}

/// Accept `candidate` as the current region, and decide whether to go on.
pub(crate) fn advance(candidate : HPolyhedron,
                      region : & mut HPolyhedron,
                      sample : &DVector<f64>,
                      iteration : & mut usize,
                      best_volume : & mut f64,
                      options : &IrisOptions,
                      solver_options : &SolverOptions) -> Result<Step> {
    if options.require_sample_point_is_contained && ! candidate.point_in_set(sample,0.0) {
        info!(iteration = *iteration, "IRIS: the new region does not contain the sample");
        return Ok(Step::Stop(IrisTermination::SampleNotContained));
    }
    *region = candidate;
    *iteration += 1;
    if *iteration >= options.iteration_limit {
        info!(iteration = *iteration, faces = region.A().nrows(), "IRIS: iteration limit reached");
        return Ok(Step::Stop(IrisTermination::IterationLimit));
    }

    let e = region.maximum_volume_inscribed_ellipsoid_with(solver_options)?;
    let volume = e.volume();
    let delta = volume - *best_volume;
    debug!(iteration = *iteration, faces = region.A().nrows(), volume, delta, "IRIS iteration");
    if delta <= options.termination_threshold || delta / *best_volume <= options.relative_termination_threshold {
        info!(iteration = *iteration, volume, "IRIS converged");
        return Ok(Step::Stop(IrisTermination::Converged));
    }
    *best_volume = volume;
    Ok(Step::Continue(e))
}

pub(crate) fn starting_ellipse(sample : &DVector<f64>, options : &IrisOptions) -> Result<Hyperellipsoid> {
    match &options.starting_ellipse {
        Some(e) => {
            check_dimension(sample.len(),e.ambient_dimension())?;
            Ok(e.clone())
        },
        None => Hyperellipsoid::make_hypersphere(STARTING_RADIUS,sample.clone())
    }
}

/////////////////////////////////////////////////////////////////////
// Entry points

/// Grow an obstacle free convex region around `sample` inside `domain`.
///
/// # Arguments
/// - `obstacles` Convex obstacles; they may overlap each other and the domain boundary.
/// - `sample` The seed point. It must be in `domain` and outside every obstacle.
/// - `domain` A bounded polyhedron the region is confined to.
/// - `options` See [IrisOptions]; the configuration space fields are ignored.
///
/// # Returns
/// The region, as the intersection of `domain` and the separating half spaces.
pub fn iris(obstacles : &[Box<dyn ConvexSet>], sample : &DVector<f64>, domain : &HPolyhedron, options : &IrisOptions) -> Result<HPolyhedron> {
    iris_with_status(obstacles,sample,domain,options).map(|(region,_)| region)
}

/// Like [iris], but also report why the iterations stopped.
pub fn iris_with_status(obstacles : &[Box<dyn ConvexSet>], sample : &DVector<f64>, domain : &HPolyhedron, options : &IrisOptions) -> Result<(HPolyhedron,IrisTermination)> {
    let n = sample.len();
    check_dimension(domain.ambient_dimension(),n)?;
    for o in obstacles.iter() {
        check_dimension(n,o.ambient_dimension())?;
    }
    if ! domain.point_in_set(sample,1e-12) {
        return Err(Error::invalid("IRIS: the sample is outside the domain"));
    }
    for (i,o) in obstacles.iter().enumerate() {
        if o.try_point_in_set(sample,0.0)? {
            return Err(Error::invalid(format!("IRIS: the sample is inside obstacle {} ({})",i,o.type_name())));
        }
    }
    if ! domain.is_bounded()? {
        return Err(Error::invalid("IRIS: the domain must be bounded"));
    }

    let solver_options = options.solver_options.clone().unwrap_or_default();
    let refs : Vec<&dyn ConvexSet> = obstacles.iter().map(|o| o.as_ref()).collect();
    let mut e = starting_ellipse(sample,options)?;
    let mut best_volume = e.volume();
    let mut region = domain.clone();
    let mut iteration = 0;

    loop {
        let mut hs = Halfspaces::new(domain);
        let added = add_obstacle_hyperplanes(&e,&refs,& mut hs)?;
        debug!(iteration, added, "IRIS: separating hyperplanes");
        match advance(hs.polyhedron()?,& mut region,sample,& mut iteration,& mut best_volume,options,&solver_options)? {
            Step::Continue(next) => e = next,
            Step::Stop(status)   => return Ok((region,status)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{Hyperellipsoid,MinkowskiSum,Point};
    use crate::geometry::testing::Unsolvable;

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    #[test]
    fn default_options() {
        let options = IrisOptions::default();
        assert_eq!(options.iteration_limit,100);
        assert_eq!(options.random_seed,1234);
        assert!(options.starting_ellipse.is_none());
        let s = format!("{:?}",options);
        assert!(s.contains("require_sample_point_is_contained"));
        assert!(s.contains("relative_termination_threshold"));
        assert!(s.contains("num_additional_constraint_infeasible_samples"));
    }

    #[test]
    fn configuration_obstacles_keep_identity() {
        let obstacle : Arc<dyn ConvexSet> = Arc::new(Point::new(vec(&[1.0,2.0])));
        let mut options = IrisOptions::default();
        options.configuration_obstacles = vec![obstacle.clone()];
        assert!(Arc::ptr_eq(&options.configuration_obstacles[0],&obstacle));
        let copy = options.clone();
        assert!(Arc::ptr_eq(&copy.configuration_obstacles[0],&obstacle));
    }

    #[test]
    fn no_obstacles() {
        let domain = HPolyhedron::make_unit_box(2);
        let mut options = IrisOptions::default();
        options.iteration_limit = 1;
        let (region,status) = iris_with_status(&[],&vec(&[0.1,0.2]),&domain,&options).unwrap();
        assert_eq!(status,IrisTermination::IterationLimit);
        assert_eq!(region.A(),domain.A());
        assert_eq!(region.b(),domain.b());
    }

    #[test]
    fn no_obstacles_converges() {
        let domain = HPolyhedron::make_unit_box(2);
        let (region,status) = iris_with_status(&[],&vec(&[0.0,0.0]),&domain,&IrisOptions::default()).unwrap();
        assert_eq!(status,IrisTermination::Converged);
        assert_eq!(region.A().nrows(),4);
    }

    #[test]
    fn invalid_samples() {
        let domain = HPolyhedron::make_unit_box(2);
        let obstacles : Vec<Box<dyn ConvexSet>> = vec![Box::new(Hyperellipsoid::make_hypersphere(0.2,vec(&[0.5,0.5])).unwrap())];
        let r = iris(&obstacles,&vec(&[0.5,0.45]),&domain,&IrisOptions::default());
        assert!(matches!(r,Err(Error::InvalidArgument(_))));
        let r = iris(&obstacles,&vec(&[1.5,0.0]),&domain,&IrisOptions::default());
        assert!(matches!(r,Err(Error::InvalidArgument(_))));
        let r = iris(&obstacles,&vec(&[0.0,0.0,0.0]),&domain,&IrisOptions::default());
        assert!(matches!(r,Err(Error::DimensionMismatch{..})));
    }

    #[test]
    fn obstacle_membership_failure_is_reported() {
        let domain = HPolyhedron::make_unit_box(2);
        let obstacle = MinkowskiSum::new(vec![Box::new(Point::new(vec(&[0.5,0.5]))),Box::new(Unsolvable{ dim : 2 })]).unwrap();
        let obstacles : Vec<Box<dyn ConvexSet>> = vec![Box::new(obstacle)];
        let r = iris(&obstacles,&vec(&[0.0,0.0]),&domain,&IrisOptions::default());
        assert!(matches!(r,Err(Error::SolverFailure(_))));
    }

    #[test]
    fn box_obstacle() {
        let domain = HPolyhedron::make_unit_box(2);
        let obstacle = HPolyhedron::make_box(&vec(&[0.5,-1.0]),&vec(&[1.0,1.0])).unwrap();
        let sample = vec(&[-0.5,0.0]);
        let region = iris(&[Box::new(obstacle.clone()) as Box<dyn ConvexSet>],&sample,&domain,&IrisOptions::default()).unwrap();
        assert!(region.point_in_set(&sample,1e-9));
        assert!(region.point_in_set(&vec(&[0.4,0.0]),1e-6));
        assert!(! region.point_in_set(&vec(&[0.75,0.0]),1e-6));
        assert!(! region.intersects_with(&HPolyhedron::make_box(&vec(&[0.51,-0.99]),&vec(&[0.99,0.99])).unwrap()).unwrap());
        assert!(region.contained_in(&domain,1e-9).unwrap());
    }

    #[test]
    fn starting_ellipse_dimension() {
        let domain = HPolyhedron::make_unit_box(2);
        let mut options = IrisOptions::default();
        options.starting_ellipse = Some(Hyperellipsoid::make_unit_ball(3));
        assert!(iris(&[],&vec(&[0.0,0.0]),&domain,&options).is_err());
    }
}
