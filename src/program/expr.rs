//! Affine scalar expressions over decision variables and the formulas built from them.
//!
//! A [LinearExpr] is a sparse sum `Σ aᵢ vᵢ + c`. Expressions are mainly used to state costs and
//! constraints on graph vertices and edges, and to homogenize constraints when sets are scaled.

use std::collections::HashMap;
use std::ops::{Add,AddAssign,Mul,Neg,Sub};

use nalgebra::{DMatrix,DVector};

use crate::error::{Error,Result};
use super::{Binding,Constraint,Cost,Variable};

/// An affine expression `Σ aᵢ vᵢ + c`.
///
/// Terms are kept in insertion order; a variable may appear more than once until
/// [LinearExpr::simplified] is called.
#[derive(Clone,Debug,Default)]
pub struct LinearExpr {
    terms    : Vec<(Variable,f64)>,
    constant : f64,
}

impl LinearExpr {
    pub fn new() -> LinearExpr { LinearExpr::default() }

    /// Create a constant expression.
    pub fn constant(c : f64) -> LinearExpr { LinearExpr{ terms : Vec::new(), constant : c } }

    /// Create the expression `coef * v`.
    pub fn term(v : &Variable, coef : f64) -> LinearExpr { LinearExpr{ terms : vec![(v.clone(),coef)], constant : 0.0 } }

    /// Create `Σ coefs[i] * vars[i] + c`.
    pub fn from_terms(vars : &[Variable], coefs : &[f64], c : f64) -> LinearExpr {
        LinearExpr{
            terms    : vars.iter().cloned().zip(coefs.iter().cloned()).collect(),
            constant : c
        }
    }

    /// Sum of the given variables.
    pub fn sum(vars : &[Variable]) -> LinearExpr {
        LinearExpr{ terms : vars.iter().map(|v| (v.clone(),1.0)).collect(), constant : 0.0 }
    }

    pub fn add_term(& mut self, v : &Variable, coef : f64) {
        self.terms.push((v.clone(),coef));
    }
    pub fn add_constant(& mut self, c : f64) { self.constant += c; }

    pub fn terms(&self) -> &[(Variable,f64)] { self.terms.as_slice() }
    pub fn constant_term(&self) -> f64 { self.constant }

    /// Iterate over the distinct variables of the expression in order of first appearance.
    pub fn variables(&self) -> impl Iterator<Item=&Variable> {
        let mut seen = std::collections::HashSet::new();
        self.terms.iter().filter_map(move |(v,_)| if seen.insert(v.id()) { Some(v) } else { None })
    }

    /// Return an equivalent expression where each variable appears once and zero coefficients
    /// are dropped.
    pub fn simplified(&self) -> LinearExpr {
        let mut index : HashMap<usize,usize> = HashMap::new();
        let mut terms : Vec<(Variable,f64)> = Vec::with_capacity(self.terms.len());
        for (v,c) in self.terms.iter() {
            if let Some(&i) = index.get(&v.id()) {
                terms[i].1 += c;
            }
            else {
                index.insert(v.id(),terms.len());
                terms.push((v.clone(),*c));
            }
        }
        terms.retain(|(_,c)| *c != 0.0);
        LinearExpr{ terms, constant : self.constant }
    }

    /// Evaluate the expression. Returns `None` if `value` does not know one of the variables.
    pub fn evaluate<F>(&self, value : F) -> Option<f64> where F : Fn(&Variable) -> Option<f64> {
        self.terms.iter().try_fold(self.constant, |acc,(v,c)| value(v).map(|x| acc + c * x))
    }

    /// Replace each variable by an expression and the constant term by `constant_factor * constant`.
    ///
    /// This is the substitution used to homogenize an affine map `f(x) = a x + c` into
    /// `a y + c t`. Variables without a substitution are kept.
    pub fn substitute(&self, subst : &HashMap<Variable,LinearExpr>, constant_factor : &LinearExpr) -> LinearExpr {
        let mut res = constant_factor.clone() * self.constant;
        for (v,c) in self.terms.iter() {
            match subst.get(v) {
                Some(e) => res += e.clone() * *c,
                None    => res.add_term(v,*c)
            }
        }
        res
    }

    pub fn le<E : Into<LinearExpr>>(self, rhs : E) -> LinearFormula { LinearFormula::new(self - rhs.into(), Relation::LessEqual) }
    pub fn ge<E : Into<LinearExpr>>(self, rhs : E) -> LinearFormula { LinearFormula::new(self - rhs.into(), Relation::GreaterEqual) }
    pub fn equal_to<E : Into<LinearExpr>>(self, rhs : E) -> LinearFormula { LinearFormula::new(self - rhs.into(), Relation::Equal) }

    /// Build a linear cost binding `aᵀ v + b` from the expression.
    pub fn to_cost(&self) -> Result<Binding<Cost>> {
        let (a,b,vars) = decompose(std::slice::from_ref(self));
        Binding::new(Cost::Linear{ a : a.row(0).transpose(), b : b[0] }, vars)
    }
}

impl From<f64> for LinearExpr { fn from(c : f64) -> LinearExpr { LinearExpr::constant(c) } }
impl From<Variable> for LinearExpr { fn from(v : Variable) -> LinearExpr { LinearExpr{ terms : vec![(v,1.0)], constant : 0.0 } } }
impl From<&Variable> for LinearExpr { fn from(v : &Variable) -> LinearExpr { LinearExpr::term(v,1.0) } }

impl AddAssign<LinearExpr> for LinearExpr {
    fn add_assign(& mut self, rhs : LinearExpr) {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}
impl Add<LinearExpr> for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs : LinearExpr) -> LinearExpr { self += rhs; self }
}
impl Add<f64> for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs : f64) -> LinearExpr { self.constant += rhs; self }
}
impl Add<&Variable> for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs : &Variable) -> LinearExpr { self.add_term(rhs,1.0); self }
}
impl Sub<LinearExpr> for LinearExpr {
    type Output = LinearExpr;
    fn sub(self, rhs : LinearExpr) -> LinearExpr { self + (-rhs) }
}
impl Sub<f64> for LinearExpr {
    type Output = LinearExpr;
    fn sub(mut self, rhs : f64) -> LinearExpr { self.constant -= rhs; self }
}
impl Sub<&Variable> for LinearExpr {
    type Output = LinearExpr;
    fn sub(mut self, rhs : &Variable) -> LinearExpr { self.add_term(rhs,-1.0); self }
}
impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;
    fn mul(mut self, rhs : f64) -> LinearExpr {
        self.terms.iter_mut().for_each(|(_,c)| *c *= rhs);
        self.constant *= rhs;
        self
    }
}
impl Neg for LinearExpr {
    type Output = LinearExpr;
    fn neg(self) -> LinearExpr { self * -1.0 }
}

impl std::fmt::Display for LinearExpr {
    fn fmt(&self, f : & mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let e = self.simplified();
        let mut first = true;
        for (v,c) in e.terms.iter() {
            if first { write!(f,"{} * {}",c,v)?; first = false; }
            else if *c < 0.0 { write!(f," - {} * {}",-c,v)?; }
            else { write!(f," + {} * {}",c,v)?; }
        }
        if first { write!(f,"{}",e.constant) }
        else if e.constant < 0.0 { write!(f," - {}",-e.constant) }
        else if e.constant > 0.0 { write!(f," + {}",e.constant) }
        else { Ok(()) }
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Relation {
    LessEqual,
    GreaterEqual,
    Equal,
}

/// A linear formula `expr ⋈ 0` where `⋈` is one of `≤`, `≥` or `=`.
#[derive(Clone,Debug)]
pub struct LinearFormula {
    expr     : LinearExpr,
    relation : Relation,
}

impl LinearFormula {
    pub fn new(expr : LinearExpr, relation : Relation) -> LinearFormula { LinearFormula{ expr, relation } }
    pub fn expr(&self) -> &LinearExpr { &self.expr }
    pub fn relation(&self) -> Relation { self.relation }

    /// Convert the formula into a constraint binding: a [Constraint::Linear] for inequalities and a
    /// [Constraint::LinearEquality] for equalities.
    ///
    /// Fails if the formula has no variables.
    pub fn to_binding(&self) -> Result<Binding<Constraint>> {
        let (a,b,vars) = decompose(std::slice::from_ref(&self.expr));
        if vars.is_empty() {
            return Err(Error::invalid(format!("formula {} has no decision variables",self.expr)));
        }
        let rhs = DVector::from_element(1,-b[0]);
        let con = match self.relation {
            Relation::Equal        => Constraint::LinearEquality{ a, b : rhs },
            Relation::LessEqual    => Constraint::Linear{ a, lb : DVector::from_element(1,f64::NEG_INFINITY), ub : rhs },
            Relation::GreaterEqual => Constraint::Linear{ a, lb : rhs, ub : DVector::from_element(1,f64::INFINITY) },
        };
        Binding::new(con,vars)
    }
}

/// Decompose a list of expressions into `(A, b, vars)` such that `exprs = A vars + b`.
///
/// The variables are listed in order of first appearance.
pub fn decompose(exprs : &[LinearExpr]) -> (DMatrix<f64>,DVector<f64>,Vec<Variable>) {
    let mut index : HashMap<usize,usize> = HashMap::new();
    let mut vars  : Vec<Variable> = Vec::new();
    for e in exprs.iter() {
        for (v,_) in e.terms.iter() {
            if ! index.contains_key(&v.id()) {
                index.insert(v.id(),vars.len());
                vars.push(v.clone());
            }
        }
    }
    let mut a = DMatrix::zeros(exprs.len(),vars.len());
    let mut b = DVector::zeros(exprs.len());
    for (i,e) in exprs.iter().enumerate() {
        for (v,c) in e.terms.iter() {
            a[(i,index[&v.id()])] += c;
        }
        b[i] = e.constant;
    }
    (a,b,vars)
}

/// Compose `A vars + b` into one expression per row.
pub fn compose(a : &DMatrix<f64>, b : &DVector<f64>, vars : &[Variable]) -> Vec<LinearExpr> {
    (0..a.nrows())
        .map(|i| {
            let mut e = LinearExpr::constant(b[i]);
            for (j,v) in vars.iter().enumerate() {
                if a[(i,j)] != 0.0 { e.add_term(v,a[(i,j)]); }
            }
            e
        })
        .collect()
}
