//! Graphs of convex sets.
//!
//! A [GraphOfConvexSets] is a directed graph whose vertices carry a convex set and a point `x`
//! constrained to it, and whose edges carry a binary activation variable `phi`. Costs and
//! constraints can be attached to the point of a vertex, or to the pair of endpoint points
//! `(xu, xv)` of an edge. A shortest path problem picks a path from a source to a target
//! together with points in the sets on it that minimize the total cost.
//!
//! The graph is an arena: vertices and edges are owned by the graph and referred to by
//! [VertexId] and [EdgeId]. Solving never modifies the graph; the solution is returned as a
//! [MathematicalProgramResult] and read back through the query methods of [Vertex] and
//! [Edge].

mod solve;

use std::collections::{BTreeMap,HashSet};
use std::sync::Arc;

use nalgebra::DVector;

use crate::error::{Error,Result};
use crate::geometry::ConvexSet;
use crate::program::{Binding,Constraint,Cost,LinearExpr,LinearFormula,MathematicalProgramResult,Variable};
use crate::solvers::{SolverInterface,SolverOptions};
use crate::utils::{format_number,format_vector};

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct VertexId(usize);

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct EdgeId(usize);

impl VertexId { pub fn get_value(&self) -> usize { self.0 } }
impl EdgeId { pub fn get_value(&self) -> usize { self.0 } }

impl std::fmt::Display for VertexId {
    fn fmt(&self, f : & mut std::fmt::Formatter) -> std::fmt::Result { write!(f,"v{}",self.0) }
}
impl std::fmt::Display for EdgeId {
    fn fmt(&self, f : & mut std::fmt::Formatter) -> std::fmt::Result { write!(f,"e{}",self.0) }
}

/////////////////////////////////////////////////////////////////////
// Options

/// Parameters for [GraphOfConvexSets::solve_shortest_path] and
/// [GraphOfConvexSets::solve_convex_restriction].
///
/// The fields left `None` by default are filled in at solve time: no relaxation, no
/// preprocessing, and no rounded paths.
#[derive(Clone)]
pub struct GraphOfConvexSetsOptions {
    /// Solve the convex relaxation with `phi ∈ [0,1]` instead of the mixed-integer program.
    pub convex_relaxation : Option<bool>,
    /// Remove edges that can not be on any path from the source to the target.
    pub preprocessing : Option<bool>,
    /// With `convex_relaxation`, the number of distinct paths to extract from the relaxed flow
    /// and re-solve as convex restrictions.
    pub max_rounded_paths : Option<usize>,
    /// Bound on the random walks attempted while rounding.
    pub max_rounding_trials : usize,
    /// Edges with a relaxed `phi` at or below this are ignored when rounding, and vertices with
    /// less flow have no solution.
    pub flow_tolerance : f64,
    pub rounding_seed : u64,
    /// The backend; the default backend if `None`.
    pub solver : Option<Arc<dyn SolverInterface>>,
    pub solver_options : SolverOptions,
    /// Parameters for the convex restrictions solved while rounding; `solver_options` if `None`.
    pub rounding_solver_options : Option<SolverOptions>,
}

impl Default for GraphOfConvexSetsOptions {
    fn default() -> Self {
        GraphOfConvexSetsOptions{
            convex_relaxation : None,
            preprocessing : None,
            max_rounded_paths : None,
            max_rounding_trials : 100,
            flow_tolerance : 1e-5,
            rounding_seed : 0,
            solver : None,
            solver_options : SolverOptions::default(),
            rounding_solver_options : None,
        }
    }
}

impl std::fmt::Debug for GraphOfConvexSetsOptions {
    fn fmt(&self, f : & mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("GraphOfConvexSetsOptions")
            .field("convex_relaxation",&self.convex_relaxation)
            .field("preprocessing",&self.preprocessing)
            .field("max_rounded_paths",&self.max_rounded_paths)
            .field("max_rounding_trials",&self.max_rounding_trials)
            .field("flow_tolerance",&self.flow_tolerance)
            .field("rounding_seed",&self.rounding_seed)
            .field("solver",&self.solver.as_ref().map(|s| s.solver_id()))
            .field("solver_options",&self.solver_options)
            .field("rounding_solver_options",&self.rounding_solver_options)
            .finish()
    }
}

/////////////////////////////////////////////////////////////////////
// Vertex

/// A vertex: a convex set and a point `x` in it.
#[derive(Clone,Debug)]
pub struct Vertex {
    id          : VertexId,
    name        : String,
    set         : Box<dyn ConvexSet>,
    x           : Vec<Variable>,
    /// Each cost with its epigraph variable.
    costs       : Vec<(Variable,Binding<Cost>)>,
    constraints : Vec<Binding<Constraint>>,
}

impl Vertex {
    pub fn id(&self) -> VertexId { self.id }
    pub fn name(&self) -> &str { self.name.as_str() }
    pub fn ambient_dimension(&self) -> usize { self.x.len() }
    pub fn set(&self) -> &dyn ConvexSet { self.set.as_ref() }
    /// Placeholder variables for the point of the vertex.
    pub fn x(&self) -> &[Variable] { self.x.as_slice() }

    /// Add the cost `e(x)`.
    ///
    /// # Returns
    /// The slack variable carrying the value of the cost in a solution, and the cost binding.
    pub fn add_cost(& mut self, e : &LinearExpr) -> Result<(Variable,Binding<Cost>)> {
        self.add_cost_binding(e.to_cost()?)
    }

    /// Add a cost on a subset of `x`.
    pub fn add_cost_binding(& mut self, binding : Binding<Cost>) -> Result<(Variable,Binding<Cost>)> {
        check_scope(binding.variables(),&[&self.x],&self.name)?;
        let ell = Variable::continuous(format!("{}_ell{}",self.name,self.costs.len()).as_str());
        self.costs.push((ell.clone(),binding.clone()));
        Ok((ell,binding))
    }

    pub fn add_constraint(& mut self, f : &LinearFormula) -> Result<Binding<Constraint>> {
        self.add_constraint_binding(f.to_binding()?)
    }

    /// Add a constraint on a subset of `x`.
    pub fn add_constraint_binding(& mut self, binding : Binding<Constraint>) -> Result<Binding<Constraint>> {
        check_scope(binding.variables(),&[&self.x],&self.name)?;
        self.constraints.push(binding.clone());
        Ok(binding)
    }

    pub fn get_costs(&self) -> Vec<Binding<Cost>> { self.costs.iter().map(|(_,c)| c.clone()).collect() }
    pub fn get_constraints(&self) -> &[Binding<Constraint>] { self.constraints.as_slice() }

    /// The sum of the costs of the vertex in `result`; 0 for a vertex that is not on the path.
    pub fn get_solution_cost(&self, result : &MathematicalProgramResult) -> f64 {
        slack_sum(&self.costs,result)
    }

    /// The point of the vertex, or `None` if the vertex is not on the path.
    pub fn get_solution(&self, result : &MathematicalProgramResult) -> Option<DVector<f64>> {
        if self.x.iter().all(|v| result.has_solution(v)) {
            Some(result.get_solution_vec(&self.x))
        }
        else {
            None
        }
    }
}

/////////////////////////////////////////////////////////////////////
// Edge

/// A directed edge `u → v`.
#[derive(Clone,Debug)]
pub struct Edge {
    id          : EdgeId,
    name        : String,
    u           : VertexId,
    v           : VertexId,
    phi         : Variable,
    xu          : Vec<Variable>,
    xv          : Vec<Variable>,
    /// `phi·xu` and `phi·xv`
    y           : Vec<Variable>,
    z           : Vec<Variable>,
    costs       : Vec<(Variable,Binding<Cost>)>,
    constraints : Vec<Binding<Constraint>>,
    phi_value   : Option<bool>,
}

impl Edge {
    pub fn id(&self) -> EdgeId { self.id }
    pub fn name(&self) -> &str { self.name.as_str() }
    pub fn u(&self) -> VertexId { self.u }
    pub fn v(&self) -> VertexId { self.v }
    /// The binary activation variable.
    pub fn phi(&self) -> &Variable { &self.phi }
    /// The point of the tail vertex, the same variables as its [Vertex::x].
    pub fn xu(&self) -> &[Variable] { self.xu.as_slice() }
    /// The point of the head vertex.
    pub fn xv(&self) -> &[Variable] { self.xv.as_slice() }

    pub fn add_cost(& mut self, e : &LinearExpr) -> Result<(Variable,Binding<Cost>)> {
        self.add_cost_binding(e.to_cost()?)
    }

    /// Add a cost on a subset of `xu` and `xv`.
    pub fn add_cost_binding(& mut self, binding : Binding<Cost>) -> Result<(Variable,Binding<Cost>)> {
        check_scope(binding.variables(),&[&self.xu,&self.xv],&self.name)?;
        let ell = Variable::continuous(format!("{}_ell{}",self.name,self.costs.len()).as_str());
        self.costs.push((ell.clone(),binding.clone()));
        Ok((ell,binding))
    }

    pub fn add_constraint(& mut self, f : &LinearFormula) -> Result<Binding<Constraint>> {
        self.add_constraint_binding(f.to_binding()?)
    }

    /// Add a constraint on a subset of `xu` and `xv`.
    pub fn add_constraint_binding(& mut self, binding : Binding<Constraint>) -> Result<Binding<Constraint>> {
        check_scope(binding.variables(),&[&self.xu,&self.xv],&self.name)?;
        self.constraints.push(binding.clone());
        Ok(binding)
    }

    /// Force the edge on (`true`) or off (`false`) in shortest path solves.
    pub fn add_phi_constraint(& mut self, phi_value : bool) { self.phi_value = Some(phi_value); }
    pub fn clear_phi_constraints(& mut self) { self.phi_value = None; }
    pub fn phi_value(&self) -> Option<bool> { self.phi_value }

    pub fn get_costs(&self) -> Vec<Binding<Cost>> { self.costs.iter().map(|(_,c)| c.clone()).collect() }
    pub fn get_constraints(&self) -> &[Binding<Constraint>] { self.constraints.as_slice() }

    pub fn get_solution_cost(&self, result : &MathematicalProgramResult) -> f64 {
        slack_sum(&self.costs,result)
    }

    /// The value of `phi` in `result`.
    pub fn get_solution_phi(&self, result : &MathematicalProgramResult) -> f64 {
        if result.has_solution(&self.phi) { result.get_solution(&self.phi) } else { 0.0 }
    }

    /// `phi·xu` in `result`. For a relaxed solution this is the flow weighted point, and
    /// `get_solution_phi_xu / get_solution_phi` is the point of the tail on this edge.
    pub fn get_solution_phi_xu(&self, result : &MathematicalProgramResult) -> DVector<f64> {
        solution_or_zero(&self.y,result)
    }

    pub fn get_solution_phi_xv(&self, result : &MathematicalProgramResult) -> DVector<f64> {
        solution_or_zero(&self.z,result)
    }
}

fn slack_sum(costs : &[(Variable,Binding<Cost>)], result : &MathematicalProgramResult) -> f64 {
    costs.iter()
        .map(|(ell,_)| if result.has_solution(ell) { result.get_solution(ell) } else { 0.0 })
        .sum()
}

fn solution_or_zero(vars : &[Variable], result : &MathematicalProgramResult) -> DVector<f64> {
    DVector::from_iterator(vars.len(),vars.iter().map(|v| if result.has_solution(v) { result.get_solution(v) } else { 0.0 }))
}

/// Fail unless all `vars` are among `scopes`.
fn check_scope(vars : &[Variable], scopes : &[&Vec<Variable>], owner : &str) -> Result<()> {
    let allowed : HashSet<&Variable> = scopes.iter().flat_map(|s| s.iter()).collect();
    match vars.iter().find(|v| ! allowed.contains(v)) {
        Some(v) => Err(Error::invalid(format!("variable {} does not belong to {}",v,owner))),
        None    => Ok(())
    }
}

/////////////////////////////////////////////////////////////////////
// Graph

#[derive(Clone,Debug,Default)]
pub struct GraphOfConvexSets {
    vertices    : BTreeMap<VertexId,Vertex>,
    edges       : BTreeMap<EdgeId,Edge>,
    next_vertex : usize,
    next_edge   : usize,
}

impl GraphOfConvexSets {
    pub fn new() -> GraphOfConvexSets { GraphOfConvexSets::default() }

    /// Add a vertex owning `set`. An empty name is replaced by one made from the id.
    pub fn add_vertex(& mut self, set : Box<dyn ConvexSet>, name : &str) -> VertexId {
        let id = VertexId(self.next_vertex);
        self.next_vertex += 1;
        let name = if name.is_empty() { id.to_string() } else { name.to_string() };
        let x = Variable::continuous_vec(set.ambient_dimension(),format!("{}_x",name).as_str());
        self.vertices.insert(id,Vertex{ id, name, set, x, costs : Vec::new(), constraints : Vec::new() });
        id
    }

    /// Add an edge `u → v`. Both vertices must be in the graph and differ.
    pub fn add_edge(& mut self, u : VertexId, v : VertexId, name : &str) -> Result<EdgeId> {
        if u == v {
            return Err(Error::invalid(format!("AddEdge: self loop at vertex {}",u)));
        }
        let xu = self.vertex(u)?.x.clone();
        let xv = self.vertex(v)?.x.clone();
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        let name = if name.is_empty() { id.to_string() } else { name.to_string() };
        let phi = Variable::binary(format!("{}_phi",name).as_str());
        let y = Variable::continuous_vec(xu.len(),format!("{}_y",name).as_str());
        let z = Variable::continuous_vec(xv.len(),format!("{}_z",name).as_str());
        self.edges.insert(id,Edge{ id, name, u, v, phi, xu, xv, y, z, costs : Vec::new(), constraints : Vec::new(), phi_value : None });
        Ok(id)
    }

    /// Remove a vertex and all edges incident to it.
    pub fn remove_vertex(& mut self, id : VertexId) -> Result<()> {
        if self.vertices.remove(&id).is_none() {
            return Err(Error::invalid(format!("RemoveVertex: unknown vertex {}",id)));
        }
        self.edges.retain(|_,e| e.u != id && e.v != id);
        Ok(())
    }

    pub fn remove_edge(& mut self, id : EdgeId) -> Result<()> {
        match self.edges.remove(&id) {
            Some(_) => Ok(()),
            None    => Err(Error::invalid(format!("RemoveEdge: unknown edge {}",id)))
        }
    }

    pub fn vertex(&self, id : VertexId) -> Result<&Vertex> {
        self.vertices.get(&id).ok_or_else(|| Error::invalid(format!("unknown vertex {}",id)))
    }
    pub fn vertex_mut(& mut self, id : VertexId) -> Result<& mut Vertex> {
        self.vertices.get_mut(&id).ok_or_else(|| Error::invalid(format!("unknown vertex {}",id)))
    }
    pub fn edge(&self, id : EdgeId) -> Result<&Edge> {
        self.edges.get(&id).ok_or_else(|| Error::invalid(format!("unknown edge {}",id)))
    }
    pub fn edge_mut(& mut self, id : EdgeId) -> Result<& mut Edge> {
        self.edges.get_mut(&id).ok_or_else(|| Error::invalid(format!("unknown edge {}",id)))
    }

    /// Vertices in order of creation.
    pub fn vertices(&self) -> Vec<&Vertex> { self.vertices.values().collect() }
    /// Edges in order of creation.
    pub fn edges(&self) -> Vec<&Edge> { self.edges.values().collect() }

    pub fn clear_all_phi_constraints(& mut self) {
        for e in self.edges.values_mut() { e.clear_phi_constraints(); }
    }

    /// Render the graph in the Graphviz dot language, annotated with the values in `result` if
    /// given.
    ///
    /// # Arguments
    /// - `show_slacks` Also show `phi·xu` and `phi·xv` of every edge.
    /// - `precision` Digits after the decimal point.
    /// - `scientific` Use scientific notation.
    pub fn get_graphviz_string(&self, result : Option<&MathematicalProgramResult>, show_slacks : bool, precision : usize, scientific : bool) -> String {
        let mut out = String::from("digraph GraphOfConvexSets {\nlabelloc=t;\nnodesep=0;\n");
        for v in self.vertices.values() {
            let mut label = v.name.clone();
            if let Some(r) = result {
                if let Some(x) = v.get_solution(r) {
                    label.push_str(&format!("\nx = {}",format_vector(&x,precision,scientific)));
                }
                if ! v.costs.is_empty() {
                    label.push_str(&format!("\ncost = {}",format_number(v.get_solution_cost(r),precision,scientific)));
                }
            }
            out.push_str(&format!("{} [label=\"{}\"]\n",v.id.0,escape(&label)));
        }
        for e in self.edges.values() {
            let mut label = e.name.clone();
            if let Some(r) = result {
                label.push_str(&format!("\nϕ = {}",format_number(e.get_solution_phi(r),precision,scientific)));
                if ! e.costs.is_empty() {
                    label.push_str(&format!("\ncost = {}",format_number(e.get_solution_cost(r),precision,scientific)));
                }
                if show_slacks {
                    label.push_str(&format!("\nϕ xᵤ = {}",format_vector(&e.get_solution_phi_xu(r),precision,scientific)));
                    label.push_str(&format!("\nϕ xᵥ = {}",format_vector(&e.get_solution_phi_xv(r),precision,scientific)));
                }
            }
            out.push_str(&format!("{} -> {} [label=\"{}\"];\n",e.u.0,e.v.0,escape(&label)));
        }
        out.push_str("}\n");
        out
    }

    /// Out and in edges of every vertex.
    fn incidence(&self) -> BTreeMap<VertexId,(Vec<EdgeId>,Vec<EdgeId>)> {
        let mut inc : BTreeMap<VertexId,(Vec<EdgeId>,Vec<EdgeId>)> =
            self.vertices.keys().map(|&id| (id,(Vec::new(),Vec::new()))).collect();
        for e in self.edges.values() {
            if let Some(entry) = inc.get_mut(&e.u) { entry.0.push(e.id); }
            if let Some(entry) = inc.get_mut(&e.v) { entry.1.push(e.id); }
        }
        inc
    }
}

fn escape(label : &str) -> String {
    label.replace('"',"\\\"").replace('\n',"\\n")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{HPolyhedron,Point};

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    #[test]
    fn options() {
        let options = GraphOfConvexSetsOptions::default();
        assert!(options.convex_relaxation.is_none());
        assert!(options.preprocessing.is_none());
        assert!(options.max_rounded_paths.is_none());
        assert_eq!(options.max_rounding_trials,100);
        assert!(format!("{:?}",options).contains("convex_relaxation"));
    }

    #[test]
    fn build_and_remove() {
        let mut g = GraphOfConvexSets::new();
        let s = g.add_vertex(Box::new(Point::new(vec(&[0.1]))),"source");
        let t = g.add_vertex(Box::new(Point::new(vec(&[0.2]))),"target");
        let e0 = g.add_edge(s,t,"edge0").unwrap();
        let e1 = g.add_edge(s,t,"").unwrap();
        assert_eq!(g.vertices().len(),2);
        assert_eq!(g.edges().len(),2);
        assert_eq!(g.edge(e1).unwrap().name(),"e1");
        assert!(g.add_edge(s,s,"loop").is_err());
        assert!(g.add_edge(s,VertexId(17),"dangling").is_err());

        let v = g.vertex(s).unwrap();
        assert_eq!(v.ambient_dimension(),1);
        assert_eq!(v.name(),"source");
        assert_eq!(v.set().type_name(),"Point");
        let e = g.edge(e0).unwrap();
        assert_eq!(e.u(),s);
        assert_eq!(e.v(),t);
        assert_eq!(e.xu(),g.vertex(s).unwrap().x());
        assert_eq!(e.xv(),g.vertex(t).unwrap().x());

        g.remove_edge(e1).unwrap();
        assert_eq!(g.edges().len(),1);
        assert!(g.remove_edge(e1).is_err());
        g.remove_edge(e0).unwrap();
        assert_eq!(g.edges().len(),0);
        g.remove_vertex(s).unwrap();
        assert_eq!(g.vertices().len(),1);
        g.remove_vertex(t).unwrap();
        assert_eq!(g.vertices().len(),0);
    }

    #[test]
    fn remove_vertex_removes_edges() {
        let mut g = GraphOfConvexSets::new();
        let a = g.add_vertex(Box::new(HPolyhedron::make_unit_box(2)),"a");
        let b = g.add_vertex(Box::new(HPolyhedron::make_unit_box(2)),"b");
        let c = g.add_vertex(Box::new(HPolyhedron::make_unit_box(2)),"c");
        g.add_edge(a,b,"ab").unwrap();
        g.add_edge(b,c,"bc").unwrap();
        let ac = g.add_edge(a,c,"ac").unwrap();
        g.remove_vertex(b).unwrap();
        assert_eq!(g.edges().len(),1);
        assert_eq!(g.edges()[0].id(),ac);
    }

    #[test]
    fn costs_and_constraints() {
        let mut g = GraphOfConvexSets::new();
        let s = g.add_vertex(Box::new(Point::new(vec(&[0.1]))),"source");
        let t = g.add_vertex(Box::new(Point::new(vec(&[0.2]))),"target");
        let e = g.add_edge(s,t,"edge").unwrap();

        let xs = g.vertex(s).unwrap().x().to_vec();
        let xt = g.vertex(t).unwrap().x().to_vec();
        let v = g.vertex_mut(s).unwrap();
        let (_,binding) = v.add_cost(&(LinearExpr::from(&xs[0]) + 1.0)).unwrap();
        v.add_cost_binding(binding).unwrap();
        assert_eq!(v.get_costs().len(),2);
        let c = v.add_constraint(&LinearExpr::from(&xs[0]).le(1.0)).unwrap();
        v.add_constraint_binding(c).unwrap();
        assert_eq!(v.get_constraints().len(),2);
        assert!(v.add_cost(&LinearExpr::from(&xt[0])).is_err());

        let edge = g.edge_mut(e).unwrap();
        let (_,binding) = edge.add_cost(&(LinearExpr::from(&xs[0]) + 1.0)).unwrap();
        edge.add_cost_binding(binding).unwrap();
        assert_eq!(edge.get_costs().len(),2);
        let c = edge.add_constraint(&LinearExpr::from(&xs[0]).equal_to(LinearExpr::from(&xt[0]))).unwrap();
        edge.add_constraint_binding(c).unwrap();
        assert_eq!(edge.get_constraints().len(),2);
        assert!(edge.add_constraint(&LinearExpr::from(&Variable::continuous("w")).le(1.0)).is_err());

        edge.add_phi_constraint(false);
        assert_eq!(edge.phi_value(),Some(false));
        edge.clear_phi_constraints();
        assert_eq!(edge.phi_value(),None);
        g.edge_mut(e).unwrap().add_phi_constraint(true);
        g.clear_all_phi_constraints();
        assert_eq!(g.edge(e).unwrap().phi_value(),None);
    }

    #[test]
    fn graphviz_without_result() {
        let mut g = GraphOfConvexSets::new();
        let s = g.add_vertex(Box::new(Point::new(vec(&[0.1]))),"source");
        let t = g.add_vertex(Box::new(Point::new(vec(&[0.2]))),"target");
        g.add_edge(s,t,"edge0").unwrap();
        let dot = g.get_graphviz_string(None,false,3,false);
        assert!(dot.starts_with("digraph GraphOfConvexSets {"));
        assert!(dot.contains("0 [label=\"source\"]"));
        assert!(dot.contains("0 -> 1 [label=\"edge0\"];"));
    }
}
