use std::any::Any;
use std::io::Write;
use std::path::Path;

use nalgebra::{DMatrix,DVector};
use tracing::debug;

use crate::error::{check_dimension,Error,Result};
use crate::program::{Binding,Constraint,LinearExpr,MathematicalProgram,Variable};
use super::{add_eq_zero,double_description,feasibility,membership_or_warn,ConvexSet,HPolyhedron};

/// The convex hull of a finite set of points, stored one per column.
#[derive(Clone,Debug,PartialEq)]
pub struct VPolytope {
    vertices : DMatrix<f64>,
}

impl Default for VPolytope {
    fn default() -> Self { VPolytope{ vertices : DMatrix::zeros(0,0) } }
}

impl VPolytope {
    /// The hull of the columns of `vertices`.
    pub fn new(vertices : DMatrix<f64>) -> VPolytope { VPolytope{ vertices } }

    /// Enumerate the vertices of a bounded polyhedron.
    pub fn from_hpolyhedron(h : &HPolyhedron) -> Result<VPolytope> {
        let v = double_description::vertices(h.A(),h.b())?;
        debug!("vertex enumeration: {} inequalities, {} vertices",h.A().nrows(),v.ncols());
        Ok(VPolytope{ vertices : v })
    }

    /// The box with corners `lb` and `ub`, as its `2ⁿ` vertices.
    pub fn make_box(lb : &DVector<f64>, ub : &DVector<f64>) -> Result<VPolytope> {
        check_dimension(lb.len(),ub.len())?;
        if lb.iter().zip(ub.iter()).any(|(l,u)| l > u) {
            return Err(Error::invalid("lower bounds must not exceed upper bounds"));
        }
        let n = lb.len();
        if n >= usize::BITS as usize {
            return Err(Error::invalid(format!("too many box dimensions: {}",n)));
        }
        let k = 1usize << n;
        let vertices = DMatrix::from_fn(n,k,|i,j| if (j >> i) & 1 == 1 { ub[i] } else { lb[i] });
        Ok(VPolytope{ vertices })
    }

    /// The box `[-1,1]ⁿ`.
    pub fn make_unit_box(dim : usize) -> Result<VPolytope> {
        VPolytope::make_box(&DVector::from_element(dim,-1.0),&DVector::from_element(dim,1.0))
    }

    pub fn vertices(&self) -> &DMatrix<f64> { &self.vertices }

    /// The polytope spanned by the vertices of the hull only. In 2-D they are in
    /// counter-clockwise order.
    pub fn get_minimal_representation(&self) -> Result<VPolytope> {
        let idx = double_description::minimal_indices(&self.vertices)?;
        Ok(VPolytope{ vertices : self.vertices.select_columns(idx.iter()) })
    }

    pub fn calc_volume(&self) -> Result<f64> {
        double_description::volume(&self.vertices)
    }

    /// Write the hull as a Wavefront OBJ file. Only 3-D polytopes can be written.
    pub fn write_obj<P : AsRef<Path>>(&self, filename : P) -> Result<()> {
        if self.ambient_dimension() != 3 {
            return Err(Error::invalid(format!("WriteObj requires a 3-dimensional VPolytope, got dimension {}",self.ambient_dimension())));
        }
        let minimal = self.get_minimal_representation()?;
        let faces = double_description::hull_faces_3d(minimal.vertices())?;

        let mut f = std::io::BufWriter::new(std::fs::File::create(filename)?);
        for v in minimal.vertices().column_iter() {
            writeln!(f,"v {} {} {}",v[0],v[1],v[2])?;
        }
        for face in faces.iter() {
            write!(f,"f")?;
            for i in face.iter() {
                write!(f," {}",i+1)?;
            }
            writeln!(f)?;
        }
        f.flush()?;
        Ok(())
    }
}

impl ConvexSet for VPolytope {
    fn ambient_dimension(&self) -> usize { self.vertices.nrows() }
    fn clone_box(&self) -> Box<dyn ConvexSet> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn type_name(&self) -> &'static str { "VPolytope" }

    fn do_point_in_set(&self, x : &DVector<f64>, tol : f64) -> bool {
        membership_or_warn(self.type_name(),self.do_try_point_in_set(x,tol))
    }

    /// Feasibility of `x = V λ`, `λ ≥ 0`, `Σ λ = 1` with the tolerance applied to the equality.
    fn do_try_point_in_set(&self, x : &DVector<f64>, tol : f64) -> Result<bool> {
        let (n,k) = self.vertices.shape();
        if k == 0 {
            return Ok(false);
        }
        let mut prog = MathematicalProgram::new();
        let lambda = prog.new_continuous_variables(k,"lambda");
        let mut a = DMatrix::zeros(n+1,k);
        a.view_mut((0,0),(n,k)).copy_from(&self.vertices);
        a.row_mut(n).fill(1.0);
        let mut lb = DVector::zeros(n+1);
        let mut ub = DVector::zeros(n+1);
        for i in 0..n {
            lb[i] = x[i] - tol;
            ub[i] = x[i] + tol;
        }
        lb[n] = 1.0;
        ub[n] = 1.0;
        prog.add_linear_constraint(a,lb,ub,&lambda)?;
        prog.add_bounding_box_constraint(DVector::zeros(k),DVector::from_element(k,f64::INFINITY),&lambda)?;
        feasibility(&prog)
    }

    fn do_add_point_in_set_constraints(&self, prog : & mut MathematicalProgram, x : &[Variable]) -> Result<(Vec<Variable>,Vec<Binding<Constraint>>)> {
        let (n,k) = self.vertices.shape();
        let lambda = prog.new_continuous_variables(k,"lambda");
        let c0 = prog.add_bounding_box_constraint(DVector::zeros(k),DVector::from_element(k,f64::INFINITY),&lambda)?;
        // x - V λ = 0, Σ λ = 1
        let mut a = DMatrix::zeros(n+1,n+k);
        a.view_mut((0,0),(n,n)).fill_with_identity();
        a.view_mut((0,n),(n,k)).copy_from(&(-&self.vertices));
        a.view_mut((n,n),(1,k)).fill(1.0);
        let mut b = DVector::zeros(n+1);
        b[n] = 1.0;
        let vars : Vec<Variable> = x.iter().chain(lambda.iter()).cloned().collect();
        let c1 = prog.add_linear_equality_constraint(a,b,&vars)?;
        Ok((lambda,vec![c0,c1]))
    }

    fn do_add_point_in_nonnegative_scaling_constraints(&self, prog : & mut MathematicalProgram, x : &[LinearExpr], t : &LinearExpr) -> Result<Vec<Binding<Constraint>>> {
        let (n,k) = self.vertices.shape();
        let lambda = prog.new_continuous_variables(k,"lambda");
        let c0 = prog.add_bounding_box_constraint(DVector::zeros(k),DVector::from_element(k,f64::INFINITY),&lambda)?;
        // x = V λ, Σ λ = t
        let mut rows = Vec::with_capacity(n+1);
        for i in 0..n {
            let mut e = x[i].clone();
            for (j,l) in lambda.iter().enumerate() {
                e.add_term(l,-self.vertices[(i,j)]);
            }
            rows.push(e);
        }
        rows.push(LinearExpr::sum(&lambda) - t.clone());
        Ok(vec![c0,add_eq_zero(prog,&rows)?])
    }

    fn do_is_empty(&self) -> Result<bool> { Ok(self.vertices.ncols() == 0) }
    fn do_is_bounded(&self) -> Result<bool> { Ok(true) }

    fn do_maybe_get_point(&self) -> Option<DVector<f64>> {
        let k = self.vertices.ncols();
        if k == 0 {
            return None;
        }
        let first = self.vertices.column(0).into_owned();
        if (1..k).all(|j| (self.vertices.column(j) - &first).amax() == 0.0) { Some(first) } else { None }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

    #[test]
    fn unit_box() {
        let v = VPolytope::make_unit_box(3).unwrap();
        assert_eq!(v.vertices().shape(),(3,8));
        assert!(v.point_in_set(&vec(&[0.9,-0.9,0.0]),1e-9));
        assert!(!v.point_in_set(&vec(&[1.1,0.0,0.0]),1e-9));
        assert!(!v.is_empty().unwrap());
        assert!(v.is_bounded().unwrap());
        assert!((v.calc_volume().unwrap() - 8.0).abs() < 1e-10);
    }

    #[test]
    fn unit_cube_volume() {
        let v = VPolytope::make_box(&vec(&[0.0,0.0,0.0]),&vec(&[1.0,1.0,1.0])).unwrap();
        assert!((v.calc_volume().unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn from_hpolyhedron() {
        let h = HPolyhedron::make_l1_ball(3).unwrap();
        let v = VPolytope::from_hpolyhedron(&h).unwrap();
        assert_eq!(v.vertices().ncols(),6);
        assert!((v.calc_volume().unwrap() - 4.0/3.0).abs() < 1e-9);
        let back = HPolyhedron::from_vpolytope(&v).unwrap();
        assert_eq!(back.A().nrows(),8);
        assert!(back.point_in_set(&vec(&[0.3,0.3,0.3]),1e-9));
        assert!(!back.point_in_set(&vec(&[0.4,0.4,0.3]),1e-9));
    }

    #[test]
    fn minimal_representation_2d() {
        let n = 400;
        let r = 2.0;
        let mut pts = DMatrix::zeros(2,n+2);
        for i in 0..n {
            let a = 2.0 * PI * i as f64 / n as f64;
            pts[(0,i)] = r * a.cos();
            pts[(1,i)] = r * a.sin();
        }
        // interior points
        pts[(0,n)] = 0.1;
        pts[(1,n+1)] = -0.3;
        let v = VPolytope::new(pts);
        let m = v.get_minimal_representation().unwrap();
        assert_eq!(m.vertices().ncols(),n);

        // counter-clockwise
        let w = m.vertices();
        for i in 0..n {
            let (a,b,c) = (i,(i+1)%n,(i+2)%n);
            let cross = (w[(0,b)]-w[(0,a)])*(w[(1,c)]-w[(1,a)]) - (w[(1,b)]-w[(1,a)])*(w[(0,c)]-w[(0,a)]);
            assert!(cross > 0.0);
        }
        let area = m.calc_volume().unwrap();
        assert!((area - v.calc_volume().unwrap()).abs() < 1e-10);
        let polygon = 0.5 * n as f64 * r * r * (2.0 * PI / n as f64).sin();
        assert!((area - polygon).abs() < 1e-9);
        assert!((area - PI * r * r).abs() < 1e-3);
    }

    #[test]
    fn minimal_representation_3d() {
        let mut pts = VPolytope::make_unit_box(3).unwrap().vertices().clone();
        pts = pts.insert_column(8,0.0);
        let v = VPolytope::new(pts);
        let m = v.get_minimal_representation().unwrap();
        assert_eq!(m.vertices().ncols(),8);
        assert!((m.calc_volume().unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn scaling_constraints() {
        let v = VPolytope::make_unit_box(2).unwrap();
        let mut prog = MathematicalProgram::new();
        let x = prog.new_continuous_variables(2,"x");
        let t = prog.new_continuous_variables(1,"t");
        let cons = v.add_point_in_nonnegative_scaling_constraints(& mut prog,&x,&t[0]).unwrap();
        assert_eq!(cons.len(),3);
        assert_eq!(prog.num_vars(),3+4);
    }

    #[test]
    fn singleton() {
        let v = VPolytope::new(DMatrix::from_column_slice(2,2,&[1.0,2.0, 1.0,2.0]));
        assert_eq!(v.maybe_get_point(),Some(vec(&[1.0,2.0])));
        assert_eq!(VPolytope::make_unit_box(2).unwrap().maybe_get_point(),None);
    }

    #[test]
    fn write_obj() {
        let v = VPolytope::make_unit_box(3).unwrap();
        let path = std::env::temp_dir().join(format!("convexsets-vpolytope-{}.obj",std::process::id()));
        v.write_obj(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(),8);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(),6);
        assert!(VPolytope::make_unit_box(2).unwrap().write_obj(&path).is_err());
    }
}
