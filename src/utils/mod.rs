use nalgebra::{DMatrix,DVector};

/// In-place prefix sum.
pub trait Cummulate {
    fn cummulate(& mut self);
}

impl<T> Cummulate for [T] where
    T : Copy+std::ops::AddAssign
{
    fn cummulate(& mut self) {
        if ! self.is_empty() {
            let v0 = self[0];
            self[1..].iter_mut().fold(v0,|c,v| { *v += c; *v });
        }
    }
}

////////////////////////////////////////////////////////////

/// Iterator over the chunks `data[ptr[i]..ptr[i+1]]`.
pub struct ChunksByPtr<'a,'b,T> {
    data : &'a [T],
    ptr  : std::iter::Zip<std::slice::Iter<'b,usize>,std::slice::Iter<'b,usize>>,
}

impl<'a,'b,T> Iterator for ChunksByPtr<'a,'b,T> {
    type Item = &'a [T];
    fn next(& mut self) -> Option<&'a [T]> {
        self.ptr.next().map(|(&b,&e)| &self.data[b..e])
    }
}

pub trait ChunksByPtrExt<T> {
    /// Split `self` into chunks delimited by consecutive entries of `ptr`. `ptr` must be
    /// non-decreasing and end no later than `self.len()`.
    fn chunks_ptr<'a,'b>(&'a self, ptr : &'b [usize]) -> ChunksByPtr<'a,'b,T>;
}

impl<T> ChunksByPtrExt<T> for [T] {
    fn chunks_ptr<'a,'b>(&'a self, ptr : &'b [usize]) -> ChunksByPtr<'a,'b,T> {
        let tail = if ptr.is_empty() { ptr } else { &ptr[1..] };
        ChunksByPtr{ data : self, ptr : ptr.iter().zip(tail.iter()) }
    }
}

////////////////////////////////////////////////////////////

/// Volume of the unit ball in `n` dimensions.
pub fn unit_ball_volume(n : usize) -> f64 {
    // V(n) = 2π/n V(n-2)
    let mut v = if n % 2 == 0 { 1.0 } else { 2.0 };
    let mut k = if n % 2 == 0 { 2 } else { 3 };
    while k <= n {
        v *= 2.0 * std::f64::consts::PI / k as f64;
        k += 2;
    }
    v
}

/// Orthonormal basis (as columns) of the null space of `a`.
pub fn null_space(a : &DMatrix<f64>, tol : f64) -> DMatrix<f64> {
    let n = a.ncols();
    if a.nrows() == 0 {
        return DMatrix::identity(n,n);
    }
    let ata = a.transpose() * a;
    let eig = ata.symmetric_eigen();
    let cols : Vec<DVector<f64>> = eig.eigenvalues.iter().enumerate()
        .filter(|(_,&l)| l.abs() <= tol*tol)
        .map(|(i,_)| eig.eigenvectors.column(i).into_owned())
        .collect();
    if cols.is_empty() { DMatrix::zeros(n,0) } else { DMatrix::from_columns(&cols) }
}

/// Format a vector as `[v0, v1, ...]` with `precision` digits.
pub fn format_vector(v : &DVector<f64>, precision : usize, scientific : bool) -> String {
    let items : Vec<String> = v.iter().map(|x| format_number(*x,precision,scientific)).collect();
    format!("[{}]",items.join(", "))
}

pub fn format_number(x : f64, precision : usize, scientific : bool) -> String {
    if scientific { format!("{:.*e}",precision,x) } else { format!("{:.*}",precision,x) }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ball_volumes() {
        assert!((unit_ball_volume(1) - 2.0).abs() < 1e-12);
        assert!((unit_ball_volume(2) - std::f64::consts::PI).abs() < 1e-12);
        assert!((unit_ball_volume(3) - 4.0/3.0*std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn chunks() {
        let data = [1,2,3,4,5];
        let ptr = [0usize,2,2,5];
        let c : Vec<&[i32]> = data.chunks_ptr(&ptr).collect();
        assert_eq!(c, vec![&data[0..2],&data[2..2],&data[2..5]]);
        let mut p = vec![1usize,0,2];
        p.cummulate();
        assert_eq!(p,vec![1,1,3]);
    }

    #[test]
    fn null_space_of_row() {
        let a = DMatrix::from_row_slice(1,3,&[0.0,0.0,1.0]);
        let ns = null_space(&a,1e-9);
        assert_eq!(ns.ncols(),2);
        assert!((&a * &ns).amax() < 1e-12);
    }
}
