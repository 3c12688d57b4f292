//! Convex sets, region growing and shortest paths in graphs of convex sets.
//!
//! The crate has three layers:
//! - [geometry]: convex set representations sharing the [ConvexSet] trait, and conversion of
//!   posed shapes into obstacles.
//! - [iris]: growing large obstacle free convex regions around a seed point, in task space or in
//!   a configuration space.
//! - [gcs]: shortest paths through a graph whose vertices are convex sets, solved as a
//!   mixed-integer convex program or by convex relaxation and rounding.
//!
//! All optimization goes through [program::MathematicalProgram], which is translated to conic
//! standard form and handed to a backend implementing [solvers::SolverInterface]. The default
//! backend is the Clarabel interior point solver.
//!
//! # Example
//! ```no_run
//! use convexsets::*;
//! use nalgebra::DVector;
//!
//! let domain = HPolyhedron::make_unit_box(2);
//! let obstacle = HPolyhedron::make_box(&DVector::from_vec(vec![0.5,-1.0]),
//!                                      &DVector::from_vec(vec![1.0,1.0])).unwrap();
//! let region = iris(&[Box::new(obstacle) as Box<dyn ConvexSet>],
//!                   &DVector::from_vec(vec![-0.5,0.0]),
//!                   &domain,
//!                   &IrisOptions::default()).unwrap();
//! assert!(region.point_in_set(&DVector::from_vec(vec![0.4,0.0]),1e-6));
//! ```

extern crate itertools;

pub mod error;
pub mod utils;
pub mod program;
pub mod solvers;
pub mod geometry;
pub mod iris;
pub mod regions;
pub mod gcs;

/////////////////////////////////////////////////////////////////////
// Re-exports

pub use error::{Error,Result};
pub use program::{Binding,Constraint,Cost,LinearExpr,MathematicalProgram,MathematicalProgramResult,SolutionResult,Variable};
pub use solvers::{ClarabelSolver,SolverId,SolverInterface,SolverOptions};
pub use geometry::{CartesianProduct,ConvexSet,ConvexSets,HPolyhedron,Hyperellipsoid,Intersection,MinkowskiSum,Point,Spectrahedron,VPolytope};
pub use geometry::{make_iris_obstacles,FrameId,GeometryId,GeometrySource,RigidTransform,SceneGeometry,Shape};
pub use iris::{iris,iris_with_status,IrisOptions,IrisTermination};
pub use iris::cspace::{iris_in_configuration_space,iris_in_configuration_space_with_status,ConfigurationSpace};
pub use regions::{load_iris_regions_json_file,save_iris_regions_json_file};
pub use gcs::{Edge,EdgeId,GraphOfConvexSets,GraphOfConvexSetsOptions,Vertex,VertexId};
