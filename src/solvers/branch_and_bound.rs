//! Depth first branch-and-bound over binary variables.
//!
//! The continuous relaxations are solved by a callback, so any backend that can solve the
//! relaxed [ConicProblem] can be used to solve mixed-binary problems.

use tracing::debug;

use crate::error::Result;
use crate::program::SolutionResult;
use super::standard_form::ConicProblem;

/// Solution of one relaxation.
#[derive(Clone,Debug)]
pub struct RelaxationSolution {
    pub status    : SolutionResult,
    pub x         : Vec<f64>,
    pub objective : f64,
    pub details   : String,
}

/// Parameters of the search.
#[derive(Clone,Copy,Debug)]
pub struct BranchAndBoundParameters {
    /// Maximum number of relaxations to solve.
    pub max_nodes         : usize,
    /// A value within this distance of 0 or 1 counts as integral.
    pub integer_tolerance : f64,
    /// Relative optimality gap used when pruning by bound.
    pub relative_gap      : f64,
}

impl Default for BranchAndBoundParameters {
    fn default() -> Self {
        BranchAndBoundParameters{
            max_nodes         : 10000,
            integer_tolerance : 1e-6,
            relative_gap      : 1e-7,
        }
    }
}

/// Solve `problem` honoring the integrality of `problem.var_int`.
///
/// Branches on the most fractional variable and explores the branch nearest to the relaxed value
/// first. If the node limit is reached the best integral solution found so far is returned with
/// status [SolutionResult::IterationLimit].
pub fn branch_and_bound<F>(problem : &ConicProblem, par : &BranchAndBoundParameters, mut relax : F) -> Result<RelaxationSolution>
    where F : FnMut(&ConicProblem) -> Result<RelaxationSolution>
{
    let mut stack : Vec<Vec<(usize,f64)>> = vec![Vec::new()];
    let mut incumbent : Option<RelaxationSolution> = None;
    let mut nodes = 0usize;
    let mut limit_hit = false;
    let mut root_status = SolutionResult::InfeasibleConstraints;
    let mut root_details = String::new();

    while let Some(fixings) = stack.pop() {
        if nodes >= par.max_nodes {
            limit_hit = true;
            break;
        }
        nodes += 1;

        let mut node = problem.clone();
        for &(j,v) in fixings.iter() { node.fix_variable(j,v); }
        let sol = relax(&node)?;

        if nodes == 1 {
            root_status = sol.status;
            root_details = sol.details.clone();
            if sol.status != SolutionResult::Success {
                break;
            }
        }
        if sol.status != SolutionResult::Success {
            continue;
        }
        if let Some(best) = incumbent.as_ref() {
            if sol.objective >= best.objective - par.relative_gap * (1.0 + best.objective.abs()) {
                continue;
            }
        }

        let branch = problem.var_int.iter().enumerate()
            .filter(|(_,&int)| int)
            .map(|(j,_)| (j,(sol.x[j] - sol.x[j].round()).abs()))
            .filter(|&(_,f)| f > par.integer_tolerance)
            .max_by(|a,b| a.1.total_cmp(&b.1));

        match branch {
            None => {
                let mut sol = sol;
                for (x,_) in sol.x.iter_mut().zip(problem.var_int.iter()).filter(|(_,&int)| int) {
                    *x = x.round();
                }
                debug!("branch-and-bound: incumbent {} at node {}",sol.objective,nodes);
                incumbent = Some(sol);
            },
            Some((j,_)) => {
                let up = sol.x[j] >= 0.5;
                let mut far = fixings.clone(); far.push((j,if up { 0.0 } else { 1.0 }));
                let mut near = fixings; near.push((j,if up { 1.0 } else { 0.0 }));
                stack.push(far);
                stack.push(near);
            }
        }
    }

    debug!("branch-and-bound: {} nodes",nodes);
    match incumbent {
        Some(mut sol) => {
            sol.status = if limit_hit { SolutionResult::IterationLimit } else { SolutionResult::Success };
            sol.details = format!("branch-and-bound: {} nodes",nodes);
            Ok(sol)
        },
        None => {
            let status =
                if limit_hit { SolutionResult::IterationLimit }
                else if root_status == SolutionResult::Success { SolutionResult::InfeasibleConstraints }
                else { root_status };
            Ok(RelaxationSolution{
                status,
                x         : Vec::new(),
                objective : f64::NAN,
                details   : if root_details.is_empty() { format!("branch-and-bound: {} nodes",nodes) } else { root_details },
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::solvers::standard_form::ConeType;

    // Relaxation oracle for: minimize -x0 - x1 s.t. x0 + x1 ≤ 1.5, 0 ≤ x ≤ 1, only knowing how
    // to handle fixings; good enough to exercise the search.
    fn oracle(p : &ConicProblem) -> Result<RelaxationSolution> {
        let mut fixed = [None,None];
        for (subj,cof,b) in p.rows() {
            if subj.len() == 1 && cof[0] == 1.0 && b <= 0.0 && p.cones.iter().any(|c| c.cone == ConeType::Zero) {
                fixed[subj[0]] = Some(-b);
            }
        }
        let x = match fixed {
            [Some(a),Some(b)] => if a + b <= 1.5 { vec![a,b] } else {
                return Ok(RelaxationSolution{ status : SolutionResult::InfeasibleConstraints, x : vec![], objective : f64::NAN, details : String::new() })
            },
            [Some(a),None] => vec![a,(1.5-a).min(1.0)],
            [None,Some(b)] => vec![(1.5-b).min(1.0),b],
            [None,None]    => vec![1.0,0.5],
        };
        Ok(RelaxationSolution{ status : SolutionResult::Success, objective : -x[0]-x[1], x, details : String::new() })
    }

    #[test]
    fn finds_integral_optimum() {
        let mut p = ConicProblem::default();
        p.numvar = 2;
        p.numdecision = 2;
        p.var_int = vec![true,true];
        p.c = vec![-1.0,-1.0];
        p.a_ptr = vec![0];
        let sol = branch_and_bound(&p,&BranchAndBoundParameters::default(),oracle).unwrap();
        assert_eq!(sol.status,SolutionResult::Success);
        assert_eq!(sol.objective,-1.0);
    }
}
