//! Shortest path formulations.
//!
//! The mixed-integer program follows the perspective formulation: every edge `e = (u,v)` gets
//! copies `y = phi·xu` and `z = phi·xv` constrained to `phi·Xu` and `phi·Xv`, every cost gets
//! an epigraph variable bounded below by the perspective of the cost, and flow conservation on
//! `phi` and on the copies ties consecutive edges together. Relaxing `phi ∈ {0,1}` to
//! `phi ∈ [0,1]` gives a convex program whose flow can be rounded to paths.

use std::collections::{BTreeMap,BTreeSet,HashMap,VecDeque};

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng,SeedableRng};
use tracing::{debug,info,warn};

use crate::error::{Error,Result};
use crate::geometry::{add_homogenized_constraint,add_le_zero,add_eq_zero,add_lorentz,add_rotated_lorentz};
use crate::program::{Binding,Constraint,Cost,LinearExpr,MathematicalProgram,MathematicalProgramResult,SolutionResult,Variable};
use crate::solvers::{self,ClarabelSolver,SolverId};
use super::{EdgeId,GraphOfConvexSets,GraphOfConvexSetsOptions,VertexId};

/// Eigenvalues of a quadratic cost below this are treated as zero.
const PSD_TOL : f64 = 1e-12;

/// Add `ell ≥ t·cost(x/t)` for `t ≥ 0`.
fn add_perspective_cost(prog : & mut MathematicalProgram, cost : &Cost, x : &[LinearExpr], t : &LinearExpr, ell : &Variable) -> Result<()> {
    let dot = |a : &DVector<f64>| -> LinearExpr {
        let mut e = LinearExpr::new();
        for (xi,&ai) in x.iter().zip(a.iter()) {
            if ai != 0.0 { e += xi.clone() * ai; }
        }
        e
    };
    match cost {
        Cost::Linear{a,b} => {
            add_le_zero(prog,&[dot(a) + t.clone() * *b - ell])?;
        },
        Cost::L2Norm{a,b} => {
            let mut rows = vec![LinearExpr::from(ell)];
            rows.extend((0..a.nrows()).map(|i| dot(&a.row(i).transpose()) + t.clone() * b[i]));
            add_lorentz(prog,&rows)?;
        },
        Cost::Quadratic{q,a,b} => {
            // ½|R x|² ≤ t·w  with  Q = RᵀR  and  w = ell - aᵀx - b t
            let eig = q.clone().symmetric_eigen();
            if eig.eigenvalues.iter().any(|&l| l < -PSD_TOL * q.amax().max(1.0)) {
                return Err(Error::invalid("the Hessian of a quadratic cost must be positive semidefinite"));
            }
            let w = LinearExpr::from(ell) - dot(a) - t.clone() * *b;
            let rrows : Vec<DVector<f64>> = eig.eigenvalues.iter().enumerate()
                .filter(|(_,l)| **l > PSD_TOL)
                .map(|(k,&l)| eig.eigenvectors.column(k) * l.sqrt())
                .collect();
            if rrows.is_empty() {
                add_le_zero(prog,&[-w])?;
            }
            else {
                let mut rows = vec![t.clone(),w * 2.0];
                rows.extend(rrows.iter().map(|r| dot(r)));
                add_rotated_lorentz(prog,&rows)?;
            }
        },
    }
    Ok(())
}

/// Expressions for the variables of a binding under `subst`.
fn substitute(vars : &[Variable], subst : &HashMap<Variable,LinearExpr>) -> Result<Vec<LinearExpr>> {
    vars.iter()
        .map(|v| subst.get(v).cloned().ok_or_else(|| Error::invalid(format!("variable {} is not part of the graph",v))))
        .collect()
}

fn sum_exprs(vars : &[&[Variable]], dim : usize) -> Vec<LinearExpr> {
    (0..dim)
        .map(|i| {
            let mut e = LinearExpr::new();
            for v in vars.iter() { e.add_term(&v[i],1.0); }
            e
        })
        .collect()
}

fn sum_values(result : &MathematicalProgramResult, vars : &[&[Variable]], dim : usize) -> DVector<f64> {
    vars.iter().fold(DVector::zeros(dim),|acc,v| acc + result.get_solution_vec(v))
}

/// Slacks collected while building a program; their sum is the objective.
#[derive(Default)]
struct Objective {
    slacks : Vec<Variable>,
}

impl Objective {
    fn add_slack(& mut self, prog : & mut MathematicalProgram, ell : &Variable) -> Result<()> {
        prog.add_decision_variables(std::slice::from_ref(ell))?;
        self.slacks.push(ell.clone());
        Ok(())
    }

    fn finish(self, prog : & mut MathematicalProgram) -> Result<()> {
        if ! self.slacks.is_empty() {
            prog.add_linear_cost(DVector::from_element(self.slacks.len(),1.0),0.0,&self.slacks)?;
        }
        Ok(())
    }
}

impl GraphOfConvexSets {
    /// Edges that can not be on a path from `source` to `target`: edges into the source, out of
    /// the target, and edges whose tail is unreachable from the source or whose head can not
    /// reach the target.
    pub fn unusable_edges(&self, source : VertexId, target : VertexId) -> Result<BTreeSet<EdgeId>> {
        self.vertex(source)?;
        self.vertex(target)?;
        let inc = self.incidence();
        let reach = |start : VertexId, forward : bool| -> BTreeSet<VertexId> {
            let mut seen = BTreeSet::from([start]);
            let mut queue = VecDeque::from([start]);
            while let Some(v) = queue.pop_front() {
                let (outs,ins) = &inc[&v];
                for e in (if forward { outs } else { ins }).iter() {
                    let edge = &self.edges[e];
                    // paths never pass through the source or the target
                    if (forward && edge.u == target) || (! forward && edge.v == source) {
                        continue;
                    }
                    let next = if forward { edge.v } else { edge.u };
                    if seen.insert(next) { queue.push_back(next); }
                }
            }
            seen
        };
        let from_source = reach(source,true);
        let to_target = reach(target,false);
        Ok(self.edges.values()
            .filter(|e| e.v == source || e.u == target || ! from_source.contains(&e.u) || ! to_target.contains(&e.v))
            .map(|e| e.id)
            .collect())
    }

    /// Find a shortest path from `source` to `target`.
    ///
    /// Without `convex_relaxation` the mixed-integer program is solved. With it, the convex
    /// relaxation is solved and, if `max_rounded_paths > 0`, paths are drawn from the relaxed
    /// flow by random walks and re-solved with [GraphOfConvexSets::solve_convex_restriction];
    /// the best of these is returned. If no path can be drawn, the relaxed result is returned
    /// with [SolutionResult::IterationLimit].
    pub fn solve_shortest_path(&self, source : VertexId, target : VertexId, options : &GraphOfConvexSetsOptions) -> Result<MathematicalProgramResult> {
        let relax = options.convex_relaxation.unwrap_or(false);
        let max_paths = options.max_rounded_paths.unwrap_or(0);

        let result = self.solve_flow(source,target,relax,options)?;
        if ! relax || max_paths == 0 || ! result.is_success() {
            return Ok(result);
        }

        let paths = self.round_paths(source,target,&result,max_paths,options)?;
        info!(paths = paths.len(), relaxed_cost = result.get_optimal_cost(), "GCS: rounded paths");
        let mut rounding_options = options.clone();
        if let Some(o) = &options.rounding_solver_options {
            rounding_options.solver_options = o.clone();
        }
        let mut best : Option<MathematicalProgramResult> = None;
        for path in paths.iter() {
            let r = self.solve_convex_restriction(path,&rounding_options)?;
            debug!(edges = path.len(), status = %r.solution_result(), cost = r.get_optimal_cost(), "GCS: convex restriction");
            if r.is_success() && best.as_ref().map(|b| r.get_optimal_cost() < b.get_optimal_cost()).unwrap_or(true) {
                best = Some(r);
            }
        }
        match best {
            Some(r) => Ok(r),
            None => {
                warn!("GCS: rounding found no feasible path, returning the relaxed solution");
                let mut r = result;
                r.set_solution_result(SolutionResult::IterationLimit);
                r.set_solver_details(format!("rounding found no feasible path in {} trials; {}",options.max_rounding_trials,r.solver_details()));
                Ok(r)
            }
        }
    }

    /// Random walks from `source` along edges carrying relaxed flow, each step choosing an
    /// outgoing edge with probability proportional to its `phi`.
    fn round_paths(&self, source : VertexId, target : VertexId, relaxed : &MathematicalProgramResult, max_paths : usize, options : &GraphOfConvexSetsOptions) -> Result<Vec<Vec<EdgeId>>> {
        let inc = self.incidence();
        let mut rng = StdRng::seed_from_u64(options.rounding_seed);
        let mut paths : Vec<Vec<EdgeId>> = Vec::new();
        for _ in 0..options.max_rounding_trials {
            if paths.len() >= max_paths {
                break;
            }
            let mut visited = BTreeSet::from([source]);
            let mut current = source;
            let mut path = Vec::new();
            while current != target {
                let candidates : Vec<(EdgeId,f64)> = inc[&current].0.iter()
                    .map(|e| (*e,self.edges[e].get_solution_phi(relaxed)))
                    .filter(|(e,phi)| *phi > options.flow_tolerance && ! visited.contains(&self.edges[e].v))
                    .collect();
                let total : f64 = candidates.iter().map(|c| c.1).sum();
                if candidates.is_empty() || total <= 0.0 {
                    break;
                }
                let mut pick = rng.gen::<f64>() * total;
                let mut chosen = candidates[candidates.len()-1].0;
                for (e,phi) in candidates.iter() {
                    if pick < *phi { chosen = *e; break; }
                    pick -= phi;
                }
                path.push(chosen);
                current = self.edges[&chosen].v;
                visited.insert(current);
            }
            if current == target && ! paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Solve the mixed-integer program, or its convex relaxation.
    fn solve_flow(&self, source : VertexId, target : VertexId, relax : bool, options : &GraphOfConvexSetsOptions) -> Result<MathematicalProgramResult> {
        if source == target {
            return Err(Error::invalid("SolveShortestPath: the source and the target must differ"));
        }
        self.vertex(source)?;
        self.vertex(target)?;

        // edges left out of the program, all fixed to zero
        let mut excluded : BTreeSet<EdgeId> = self.edges.values()
            .filter(|e| e.v == source || e.u == target || e.phi_value == Some(false))
            .map(|e| e.id)
            .collect();
        if options.preprocessing.unwrap_or(false) {
            let unusable = self.unusable_edges(source,target)?;
            debug!(removed = unusable.len(), "GCS: preprocessing");
            excluded.extend(unusable);
        }

        let mut prog = MathematicalProgram::new();
        let mut objective = Objective::default();
        let mut phis : BTreeMap<EdgeId,Variable> = BTreeMap::new();

        for e in self.edges.values().filter(|e| ! excluded.contains(&e.id)) {
            let phi = if relax { Variable::continuous(e.phi.name()) } else { e.phi.clone() };
            prog.add_decision_variables(&[phi.clone()])?;
            let lb = if e.phi_value == Some(true) { 1.0 } else { 0.0 };
            prog.add_bounding_box_constraint(DVector::from_element(1,lb),DVector::from_element(1,1.0),&[phi.clone()])?;
            prog.add_decision_variables(&e.y)?;
            prog.add_decision_variables(&e.z)?;
            let phie = LinearExpr::from(&phi);
            let ye : Vec<LinearExpr> = e.y.iter().map(LinearExpr::from).collect();
            let ze : Vec<LinearExpr> = e.z.iter().map(LinearExpr::from).collect();
            self.vertices[&e.u].set.add_point_in_nonnegative_scaling_constraints_expr(& mut prog,&ye,&phie)?;
            self.vertices[&e.v].set.add_point_in_nonnegative_scaling_constraints_expr(& mut prog,&ze,&phie)?;

            let subst : HashMap<Variable,LinearExpr> = e.xu.iter().cloned().zip(ye.iter().cloned())
                .chain(e.xv.iter().cloned().zip(ze.iter().cloned()))
                .collect();
            for (ell,c) in e.costs.iter() {
                objective.add_slack(& mut prog,ell)?;
                add_perspective_cost(& mut prog,c.evaluator(),&substitute(c.variables(),&subst)?,&phie,ell)?;
            }
            for c in e.constraints.iter() {
                add_homogenized_constraint(& mut prog,c.evaluator(),&substitute(c.variables(),&subst)?,&phie)?;
            }
            phis.insert(e.id,phi);
        }

        let inc = self.incidence();
        let active = |ids : &[EdgeId]| -> Vec<EdgeId> { ids.iter().filter(|e| phis.contains_key(e)).cloned().collect() };
        let mut infeasible = None;
        for v in self.vertices.values() {
            let outs = active(&inc[&v.id].0);
            let ins = active(&inc[&v.id].1);
            let out_phi : Vec<Variable> = outs.iter().map(|e| phis[e].clone()).collect();
            let in_phi : Vec<Variable> = ins.iter().map(|e| phis[e].clone()).collect();
            let out_y : Vec<&[Variable]> = outs.iter().map(|e| self.edges[e].y.as_slice()).collect();
            let in_z : Vec<&[Variable]> = ins.iter().map(|e| self.edges[e].z.as_slice()).collect();
            let n = v.ambient_dimension();

            // flow
            let (xbar,phibar) = if v.id == source {
                if outs.is_empty() { infeasible = Some(format!("the source {} has no usable outgoing edge",v.name)); break; }
                prog.add_formula_constraint(&LinearExpr::sum(&out_phi).equal_to(1.0))?;
                (sum_exprs(&out_y,n),LinearExpr::constant(1.0))
            }
            else if v.id == target {
                if ins.is_empty() { infeasible = Some(format!("the target {} has no usable incoming edge",v.name)); break; }
                prog.add_formula_constraint(&LinearExpr::sum(&in_phi).equal_to(1.0))?;
                (sum_exprs(&in_z,n),LinearExpr::sum(&in_phi))
            }
            else {
                if ins.is_empty() && outs.is_empty() {
                    continue;
                }
                let flow = LinearExpr::sum(&in_phi) - LinearExpr::sum(&out_phi);
                prog.add_formula_constraint(&flow.equal_to(0.0))?;
                if ins.is_empty() {
                    continue;
                }
                prog.add_formula_constraint(&LinearExpr::sum(&in_phi).le(1.0))?;
                if ! outs.is_empty() {
                    let spatial : Vec<LinearExpr> = sum_exprs(&in_z,n).into_iter()
                        .zip(sum_exprs(&out_y,n))
                        .map(|(a,b)| a - b)
                        .collect();
                    if n > 0 { add_eq_zero(& mut prog,&spatial)?; }
                }
                (sum_exprs(&in_z,n),LinearExpr::sum(&in_phi))
            };

            // vertex costs and constraints on (x̄, φ̄)
            let subst : HashMap<Variable,LinearExpr> = v.x.iter().cloned().zip(xbar.into_iter()).collect();
            for (ell,c) in v.costs.iter() {
                objective.add_slack(& mut prog,ell)?;
                add_perspective_cost(& mut prog,c.evaluator(),&substitute(c.variables(),&subst)?,&phibar,ell)?;
            }
            for c in v.constraints.iter() {
                add_homogenized_constraint(& mut prog,c.evaluator(),&substitute(c.variables(),&subst)?,&phibar)?;
            }
        }
        if let Some(msg) = infeasible {
            info!("GCS: {}",msg);
            let mut r = MathematicalProgramResult::new(solver_id(options));
            r.set_solution_result(SolutionResult::InfeasibleConstraints);
            r.set_solver_details(msg);
            return Ok(r);
        }
        objective.finish(& mut prog)?;

        debug!(relax, vars = prog.num_vars(), constraints = prog.constraints().len(), "GCS: solving flow program");
        let mut result = solvers::solve_with(options.solver.as_deref(),&prog,&options.solver_options)?;
        info!(relax, status = %result.solution_result(), cost = result.get_optimal_cost(), "GCS: flow program solved");
        if ! result.is_success() {
            return Ok(result);
        }

        // phi of the graph edges, zeros for left out edges, and the vertex points
        for e in self.edges.values() {
            match phis.get(&e.id) {
                Some(phi) => {
                    let value = result.get_solution(phi);
                    result.set_value(&e.phi,value);
                },
                None => {
                    result.set_value(&e.phi,0.0);
                    result.set_values(&e.y,&DVector::zeros(e.y.len()));
                    result.set_values(&e.z,&DVector::zeros(e.z.len()));
                    for (ell,_) in e.costs.iter() { result.set_value(ell,0.0); }
                }
            }
        }
        for v in self.vertices.values() {
            let n = v.ambient_dimension();
            if v.id == source {
                let outs = active(&inc[&v.id].0);
                let out_y : Vec<&[Variable]> = outs.iter().map(|e| self.edges[e].y.as_slice()).collect();
                let x = sum_values(&result,&out_y,n);
                result.set_values(&v.x,&x);
                continue;
            }
            let ins = active(&inc[&v.id].1);
            let flow : f64 = ins.iter().map(|e| result.get_solution(&phis[e])).sum();
            if flow > options.flow_tolerance {
                let in_z : Vec<&[Variable]> = ins.iter().map(|e| self.edges[e].z.as_slice()).collect();
                let x = sum_values(&result,&in_z,n) / flow;
                result.set_values(&v.x,&x);
            }
            else {
                for (ell,_) in v.costs.iter() { result.remove_value(ell); }
            }
        }
        Ok(result)
    }

    /// Solve for the points of the vertices with the path fixed: the edges in `active_edges`
    /// are on, all others off.
    ///
    /// Vertices not touched by an active edge have no solution. Every edge reports `phi`, and
    /// `phi·xu`, `phi·xv`, which are the endpoint points for active edges and zero otherwise.
    pub fn solve_convex_restriction(&self, active_edges : &[EdgeId], options : &GraphOfConvexSetsOptions) -> Result<MathematicalProgramResult> {
        let active : BTreeSet<EdgeId> = active_edges.iter().cloned().collect();
        let mut vertices = BTreeSet::new();
        for id in active.iter() {
            let e = self.edge(*id)?;
            vertices.insert(e.u);
            vertices.insert(e.v);
        }

        let mut prog = MathematicalProgram::new();
        let mut objective = Objective::default();
        let one = LinearExpr::constant(1.0);
        for id in vertices.iter() {
            let v = &self.vertices[id];
            prog.add_decision_variables(&v.x)?;
            v.set.add_point_in_set_constraints(& mut prog,&v.x)?;
        }
        let add_terms = |prog : & mut MathematicalProgram, objective : & mut Objective, costs : &[(Variable,Binding<Cost>)], constraints : &[Binding<Constraint>]| -> Result<()> {
            for (ell,c) in costs.iter() {
                objective.add_slack(prog,ell)?;
                let x : Vec<LinearExpr> = c.variables().iter().map(LinearExpr::from).collect();
                add_perspective_cost(prog,c.evaluator(),&x,&one,ell)?;
            }
            for c in constraints.iter() {
                prog.add_constraint(c.clone())?;
            }
            Ok(())
        };
        for id in vertices.iter() {
            let v = &self.vertices[id];
            add_terms(& mut prog,& mut objective,&v.costs,&v.constraints)?;
        }
        for id in active.iter() {
            let e = &self.edges[id];
            add_terms(& mut prog,& mut objective,&e.costs,&e.constraints)?;
        }
        objective.finish(& mut prog)?;

        let mut result = solvers::solve_with(options.solver.as_deref(),&prog,&options.solver_options)?;
        debug!(edges = active.len(), status = %result.solution_result(), "GCS: convex restriction solved");
        if ! result.is_success() {
            return Ok(result);
        }
        for e in self.edges.values() {
            if active.contains(&e.id) {
                let xu = result.get_solution_vec(&e.xu);
                let xv = result.get_solution_vec(&e.xv);
                result.set_value(&e.phi,1.0);
                result.set_values(&e.y,&xu);
                result.set_values(&e.z,&xv);
            }
            else {
                result.set_value(&e.phi,0.0);
                result.set_values(&e.y,&DVector::zeros(e.y.len()));
                result.set_values(&e.z,&DVector::zeros(e.z.len()));
                for (ell,_) in e.costs.iter() { result.set_value(ell,0.0); }
            }
        }
        Ok(result)
    }
}

fn solver_id(options : &GraphOfConvexSetsOptions) -> SolverId {
    match &options.solver {
        Some(s) => s.solver_id(),
        None    => ClarabelSolver::id(),
    }
}
