//! IRIS in configuration space.
//!
//! Obstacles in configuration space are generally not convex and are only known through a
//! collision predicate. Collisions are searched for by sampling the current candidate region;
//! every colliding sample is bisected towards the ellipsoid center to find a point close to the
//! collision boundary, and a hyperplane tangent to the ellipsoid through that point is added.
//! The search ends after a number of consecutive samples without a collision, so the region is
//! collision free with high probability, not certainly.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug,warn};

use crate::error::{check_dimension,Error,Result};
use crate::geometry::{ConvexSet,HPolyhedron,Hyperellipsoid};
use super::{add_obstacle_hyperplanes,advance,starting_ellipse,Halfspaces,IrisOptions,IrisTermination,Step};

const MIXING_STEPS : usize = 10;
const SEGMENT_CHECKS : usize = 8;
const BISECTION_STEPS : usize = 20;
/// Bound on the hyperplanes one search may add in one iteration.
const MAX_COUNTEREXAMPLES : usize = 100;
const ADDITIONAL_CONSTRAINT_TOL : f64 = 1e-9;

/// A robot configuration space as seen by [iris_in_configuration_space].
pub trait ConfigurationSpace {
    fn num_positions(&self) -> usize;
    fn position_lower_limits(&self) -> DVector<f64>;
    fn position_upper_limits(&self) -> DVector<f64>;
    /// The seed configuration.
    fn positions(&self) -> DVector<f64>;
    fn is_collision_free(&self, q : &DVector<f64>) -> bool;
}

/// Grow a collision free region around the seed configuration of `space`.
///
/// The domain is the box given by the position limits, intersected with
/// [IrisOptions::bounding_region] if set. Besides collisions, the region excludes
/// [IrisOptions::configuration_obstacles] exactly and, by sampling, configurations violating
/// [IrisOptions::prog_with_additional_constraints].
pub fn iris_in_configuration_space(space : &dyn ConfigurationSpace, options : &IrisOptions) -> Result<HPolyhedron> {
    iris_in_configuration_space_with_status(space,options).map(|(region,_)| region)
}

pub fn iris_in_configuration_space_with_status(space : &dyn ConfigurationSpace, options : &IrisOptions) -> Result<(HPolyhedron,IrisTermination)> {
    let n = space.num_positions();
    let lower = space.position_lower_limits();
    let upper = space.position_upper_limits();
    let sample = space.positions();
    check_dimension(n,lower.len())?;
    check_dimension(n,upper.len())?;
    check_dimension(n,sample.len())?;
    if lower.iter().chain(upper.iter()).any(|v| ! v.is_finite()) {
        return Err(Error::invalid("IrisInConfigurationSpace requires finite position limits"));
    }

    let mut domain = HPolyhedron::make_box(&lower,&upper)?;
    if let Some(bounding) = &options.bounding_region {
        domain = domain.intersection(bounding,false,0.0)?;
    }
    if ! domain.point_in_set(&sample,1e-12) {
        return Err(Error::invalid("IrisInConfigurationSpace: the seed is outside the domain"));
    }
    if ! space.is_collision_free(&sample) {
        return Err(Error::invalid("IrisInConfigurationSpace: the seed is in collision"));
    }
    for (i,o) in options.configuration_obstacles.iter().enumerate() {
        check_dimension(n,o.ambient_dimension())?;
        if o.try_point_in_set(&sample,0.0)? {
            return Err(Error::invalid(format!("IrisInConfigurationSpace: the seed is inside configuration obstacle {}",i)));
        }
    }
    let additional = match &options.prog_with_additional_constraints {
        Some(prog) => {
            check_dimension(n,prog.num_vars())?;
            if ! prog.check_all_satisfied(&sample,ADDITIONAL_CONSTRAINT_TOL)? {
                return Err(Error::invalid("IrisInConfigurationSpace: the seed violates the additional constraints"));
            }
            Some(prog.as_ref())
        },
        None => None
    };

    let solver_options = options.solver_options.clone().unwrap_or_default();
    let obstacles : Vec<&dyn ConvexSet> = options.configuration_obstacles.iter().map(|o| o.as_ref()).collect();
    let mut rng = StdRng::seed_from_u64(options.random_seed);
    let mut e = starting_ellipse(&sample,options)?;
    let mut best_volume = e.volume();
    let mut region = domain.clone();
    let mut iteration = 0;

    loop {
        let mut hs = Halfspaces::new(&domain);
        let exact = add_obstacle_hyperplanes(&e,&obstacles,& mut hs)?;
        let mut search = CounterexampleSearch{
            ellipse : &e,
            sample  : &sample,
            margin  : options.configuration_space_margin,
            rng     : & mut rng
        };
        let collisions = search.run(& mut hs,options.num_collision_infeasible_samples,|q| space.is_collision_free(q))?;
        let infeasible = match additional {
            Some(prog) => search.run(& mut hs,
                                     options.num_additional_constraint_infeasible_samples,
                                     |q| prog.check_all_satisfied(q,ADDITIONAL_CONSTRAINT_TOL).unwrap_or(false))?,
            None => 0
        };
        debug!(iteration, exact, collisions, infeasible, faces = hs.len(), "IrisInConfigurationSpace: hyperplanes");

        match advance(hs.polyhedron()?,& mut region,&sample,& mut iteration,& mut best_volume,options,&solver_options)? {
            Step::Continue(next) => e = next,
            Step::Stop(status)   => return Ok((region,status)),
        }
    }
}

/// Sampling search for configurations that violate a predicate.
struct CounterexampleSearch<'a> {
    ellipse : &'a Hyperellipsoid,
    sample  : &'a DVector<f64>,
    margin  : f64,
    rng     : &'a mut StdRng,
}

impl CounterexampleSearch<'_> {
    /// Sample the region given by `hs` until `budget` consecutive samples satisfy `feasible`,
    /// adding a separating hyperplane for each sample that does not.
    ///
    /// # Returns
    /// The number of hyperplanes added.
    fn run<F>(& mut self, hs : & mut Halfspaces, budget : usize, feasible : F) -> Result<usize> where F : Fn(&DVector<f64>) -> bool {
        let center = self.ellipse.center().clone();
        let anchor = if feasible(&center) {
            center.clone()
        }
        else {
            warn!("IrisInConfigurationSpace: the ellipsoid center is infeasible, bisecting towards the seed");
            self.sample.clone()
        };
        let tangent = self.ellipse.A().transpose() * self.ellipse.A() * 2.0;

        let mut added = 0;
        let mut failures = 0;
        let mut region = hs.polyhedron()?;
        let mut previous = center.clone();
        while failures < budget && added < MAX_COUNTEREXAMPLES {
            let q = region.uniform_sample(& mut *self.rng,Some(&previous),MIXING_STEPS)?;
            previous = q.clone();
            let bad = match first_infeasible(&anchor,&q,&feasible) {
                Some(bad) => bad,
                None => { failures += 1; continue; }
            };
            let boundary = bisect(&anchor,&bad,&feasible);
            let normal = &tangent * (&boundary - &center);
            let norm = normal.norm();
            if norm <= 1e-12 {
                failures += 1;
                continue;
            }
            let normal = normal / norm;
            let at_center = normal.dot(&center);
            let at_boundary = normal.dot(&boundary);
            if at_boundary <= at_center {
                failures += 1;
                continue;
            }
            // the margin never moves the hyperplane past the center
            let b = (at_boundary - self.margin).max(0.5 * (at_center + at_boundary));
            hs.push(normal,b);
            region = hs.polyhedron()?;
            previous = center.clone();
            added += 1;
            failures = 0;
        }
        if added >= MAX_COUNTEREXAMPLES {
            warn!(added, "IrisInConfigurationSpace: counterexample limit reached in one iteration");
        }
        Ok(added)
    }
}

/// `q` if it is infeasible, otherwise the first infeasible point on the segment from `anchor`.
fn first_infeasible<F>(anchor : &DVector<f64>, q : &DVector<f64>, feasible : &F) -> Option<DVector<f64>> where F : Fn(&DVector<f64>) -> bool {
    if ! feasible(q) {
        return Some(q.clone());
    }
    (1..SEGMENT_CHECKS)
        .map(|k| anchor + (q - anchor) * (k as f64 / SEGMENT_CHECKS as f64))
        .find(|p| ! feasible(p))
}

/// A point near the boundary between feasible `free` and infeasible `bad`, on the infeasible
/// side.
fn bisect<F>(free : &DVector<f64>, bad : &DVector<f64>, feasible : &F) -> DVector<f64> where F : Fn(&DVector<f64>) -> bool {
    let mut lo = free.clone();
    let mut hi = bad.clone();
    for _ in 0..BISECTION_STEPS {
        let mid = (&lo + &hi) * 0.5;
        if feasible(&mid) { lo = mid; } else { hi = mid; }
    }
    hi
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use crate::program::MathematicalProgram;

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    /// The box `[-2,2]²` with a disk of radius 0.5 at (1,0) as the only obstacle.
    struct DiskWorld {
        seed : DVector<f64>,
    }

    impl ConfigurationSpace for DiskWorld {
        fn num_positions(&self) -> usize { 2 }
        fn position_lower_limits(&self) -> DVector<f64> { vec(&[-2.0,-2.0]) }
        fn position_upper_limits(&self) -> DVector<f64> { vec(&[2.0,2.0]) }
        fn positions(&self) -> DVector<f64> { self.seed.clone() }
        fn is_collision_free(&self, q : &DVector<f64>) -> bool {
            (q - vec(&[1.0,0.0])).norm() > 0.5
        }
    }

    fn options() -> IrisOptions {
        let mut options = IrisOptions::default();
        options.iteration_limit = 4;
        options.num_collision_infeasible_samples = 200;
        options.num_additional_constraint_infeasible_samples = 200;
        options
    }

    #[test]
    fn disk() {
        let space = DiskWorld{ seed : vec(&[-1.0,0.0]) };
        let region = iris_in_configuration_space(&space,&options()).unwrap();
        assert!(region.point_in_set(&vec(&[-1.0,0.0]),1e-9));
        assert!(! region.point_in_set(&vec(&[1.0,0.0]),1e-9));
        assert!(region.contained_in(&HPolyhedron::make_box(&vec(&[-2.0,-2.0]),&vec(&[2.0,2.0])).unwrap(),1e-6).unwrap());
    }

    #[test]
    fn seed_in_collision() {
        let space = DiskWorld{ seed : vec(&[1.1,0.0]) };
        let r = iris_in_configuration_space(&space,&options());
        assert!(matches!(r,Err(Error::InvalidArgument(_))));
        let space = DiskWorld{ seed : vec(&[3.0,0.0]) };
        let r = iris_in_configuration_space(&space,&options());
        assert!(matches!(r,Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn configuration_obstacles() {
        let space = DiskWorld{ seed : vec(&[-1.0,0.0]) };
        let mut options = options();
        options.configuration_obstacles = vec![Arc::new(HPolyhedron::make_box(&vec(&[-2.0,1.0]),&vec(&[2.0,2.0])).unwrap())];
        let region = iris_in_configuration_space(&space,&options).unwrap();
        assert!(! region.point_in_set(&vec(&[-1.0,1.5]),1e-9));

        options.configuration_obstacles = vec![Arc::new(Hyperellipsoid::make_hypersphere(0.1,vec(&[-1.0,0.0])).unwrap())];
        assert!(iris_in_configuration_space(&space,&options).is_err());
    }

    #[test]
    fn additional_constraints() {
        let space = DiskWorld{ seed : vec(&[-1.0,0.0]) };
        let mut prog = MathematicalProgram::new();
        let q = prog.new_continuous_variables(2,"q");
        prog.add_linear_constraint(nalgebra::DMatrix::from_row_slice(1,2,&[0.0,1.0]),vec(&[-1.0]),vec(&[1.0]),&q).unwrap();
        let mut options = options();
        options.prog_with_additional_constraints = Some(Arc::new(prog));
        let region = iris_in_configuration_space(&space,&options).unwrap();
        assert!(region.point_in_set(&vec(&[-1.0,0.0]),1e-9));
        assert!(! region.point_in_set(&vec(&[-1.0,1.9]),1e-9));
        assert!(! region.point_in_set(&vec(&[-1.0,-1.9]),1e-9));
    }

    #[test]
    fn bounding_region() {
        let space = DiskWorld{ seed : vec(&[-1.0,0.0]) };
        let mut options = options();
        options.bounding_region = Some(HPolyhedron::make_box(&vec(&[-1.5,-0.5]),&vec(&[-0.5,0.5])).unwrap());
        let (region,_) = iris_in_configuration_space_with_status(&space,&options).unwrap();
        assert!(region.contained_in(options.bounding_region.as_ref().unwrap(),1e-6).unwrap());
    }
}
