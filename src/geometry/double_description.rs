//! Conversions between the vertex and halfspace representations of polytopes.
//!
//! Vertex enumeration uses the double description method on the homogenized cone
//! `{ (x,s) : A x - b s ≤ 0, s ≥ 0 }`. Facet enumeration uses the polar: the facets of the
//! hull of points `pᵢ` around an interior point are the vertices of `{ y : pᵢᵀ y ≤ 1 }`.
//! Two dimensional hulls use a monotone chain instead.
//!
//! Point sets are passed as matrices with one point per column.

use itertools::Itertools;
use nalgebra::{DMatrix,DVector};

use crate::error::{Error,Result};
use crate::utils::null_space;

const TOL : f64 = 1e-9;

struct Ray {
    r    : DVector<f64>,
    /// Sorted indices of the processed rows that are tight at `r`.
    zero : Vec<usize>,
}

fn intersect_sorted(a : &[usize], b : &[usize]) -> Vec<usize> {
    let (mut i,mut j) = (0,0);
    let mut res = Vec::new();
    while i < a.len() && j < b.len() {
        if a[i] < b[j] { i += 1; }
        else if a[i] > b[j] { j += 1; }
        else { res.push(a[i]); i += 1; j += 1; }
    }
    res
}

fn is_subset_sorted(a : &[usize], b : &[usize]) -> bool {
    let mut j = 0;
    for &x in a.iter() {
        while j < b.len() && b[j] < x { j += 1; }
        if j >= b.len() || b[j] != x { return false; }
        j += 1;
    }
    true
}

/// Extreme rays of the pointed cone `{ y : M y ≤ 0 }`.
///
/// Fails if the cone is not pointed, i.e. if `M` does not have full column rank.
pub fn extreme_rays(m : &DMatrix<f64>) -> Result<Vec<DVector<f64>>> {
    let d = m.ncols();
    // normalized rows, zero rows dropped
    let rows : Vec<DVector<f64>> = m.row_iter()
        .map(|r| r.transpose())
        .filter(|r| r.norm() > TOL)
        .map(|r| { let nrm = r.norm(); r / nrm })
        .collect();

    let mut basis : Vec<usize> = Vec::with_capacity(d);
    for (i,r) in rows.iter().enumerate() {
        if basis.len() == d { break; }
        let mut cand : Vec<DVector<f64>> = basis.iter().map(|&k| rows[k].clone()).collect();
        cand.push(r.clone());
        let mat = DMatrix::from_columns(&cand);
        if mat.rank(1e-10) == cand.len() {
            basis.push(i);
        }
    }
    if basis.len() < d {
        return Err(Error::invalid("the polyhedron is unbounded: its cone of directions is not pointed"));
    }

    let mb = DMatrix::from_rows(&basis.iter().map(|&k| rows[k].transpose()).collect::<Vec<_>>());
    let inv = mb.try_inverse().ok_or_else(|| Error::solver("singular basis in vertex enumeration"))?;
    let mut rays : Vec<Ray> = (0..d)
        .map(|k| {
            let r = -inv.column(k);
            let nrm = r.norm();
            let mut zero : Vec<usize> = basis.iter().enumerate().filter(|&(l,_)| l != k).map(|(_,&i)| i).collect();
            zero.sort();
            Ray{ r : r / nrm, zero }
        })
        .collect();

    for (i,h) in rows.iter().enumerate() {
        if basis.contains(&i) { continue; }
        let vals : Vec<f64> = rays.iter().map(|ray| h.dot(&ray.r)).collect();
        if vals.iter().all(|&v| v <= TOL) {
            for (ray,&v) in rays.iter_mut().zip(vals.iter()) {
                if v.abs() <= TOL { ray.zero.push(i); ray.zero.sort(); }
            }
            continue;
        }

        let plus  : Vec<usize> = (0..rays.len()).filter(|&k| vals[k] > TOL).collect();
        let minus : Vec<usize> = (0..rays.len()).filter(|&k| vals[k] < -TOL).collect();

        let mut next : Vec<Ray> = Vec::with_capacity(rays.len());
        for p in plus.iter() {
            for q in minus.iter() {
                let common = intersect_sorted(&rays[*p].zero,&rays[*q].zero);
                if common.len() + 2 < d { continue; }
                let adjacent = (0..rays.len())
                    .filter(|k| k != p && k != q)
                    .all(|k| ! is_subset_sorted(&common,&rays[k].zero));
                if adjacent {
                    let r = &rays[*q].r * vals[*p] - &rays[*p].r * vals[*q];
                    let nrm = r.norm();
                    if nrm > TOL {
                        let mut zero = common;
                        zero.push(i);
                        zero.sort();
                        next.push(Ray{ r : r / nrm, zero });
                    }
                }
            }
        }
        for (k,ray) in rays.into_iter().enumerate() {
            if vals[k] < -TOL {
                next.push(ray);
            }
            else if vals[k].abs() <= TOL {
                let mut ray = ray;
                ray.zero.push(i);
                ray.zero.sort();
                next.push(ray);
            }
        }
        rays = next;
    }

    Ok(rays.into_iter().map(|ray| ray.r).collect())
}

/// Drop points closer than `tol` to an earlier point; returns the indices kept.
pub fn unique_columns(points : &DMatrix<f64>, tol : f64) -> Vec<usize> {
    let mut kept : Vec<usize> = Vec::new();
    for j in 0..points.ncols() {
        if ! kept.iter().any(|&k| (points.column(j) - points.column(k)).amax() <= tol) {
            kept.push(j);
        }
    }
    kept
}

/// The vertices of the bounded polyhedron `{ x : A x ≤ b }`, one per column. An empty
/// polyhedron has no vertices.
pub fn vertices(a : &DMatrix<f64>, b : &DVector<f64>) -> Result<DMatrix<f64>> {
    let (m,n) = a.shape();
    let mut cone = DMatrix::zeros(m+1,n+1);
    cone.view_mut((0,0),(m,n)).copy_from(a);
    for i in 0..m { cone[(i,n)] = -b[i]; }
    cone[(m,n)] = -1.0;

    let rays = extreme_rays(&cone)?;
    let mut verts : Vec<DVector<f64>> = Vec::new();
    let mut recession = false;
    for r in rays.iter() {
        if r[n] > 1e-10 {
            verts.push(r.rows(0,n) / r[n]);
        }
        else {
            recession = true;
        }
    }
    if recession && ! verts.is_empty() {
        return Err(Error::invalid("the polyhedron is unbounded"));
    }
    if verts.is_empty() {
        return Ok(DMatrix::zeros(n,0));
    }
    let all = DMatrix::from_columns(&verts);
    let kept = unique_columns(&all,1e-9);
    Ok(all.select_columns(kept.iter()))
}

/// Indices of the 2-D convex hull vertices in counter-clockwise order, starting from the
/// lowest-leftmost point. Collinear points are dropped.
pub fn convex_hull_2d(points : &DMatrix<f64>) -> Vec<usize> {
    let idx : Vec<usize> = unique_columns(points,1e-12)
        .into_iter()
        .sorted_by(|&i,&j| points[(0,i)].total_cmp(&points[(0,j)]).then(points[(1,i)].total_cmp(&points[(1,j)])))
        .collect();
    if idx.len() <= 2 {
        return idx;
    }
    let cross = |o : usize, a : usize, b : usize| {
        (points[(0,a)] - points[(0,o)]) * (points[(1,b)] - points[(1,o)])
            - (points[(1,a)] - points[(1,o)]) * (points[(0,b)] - points[(0,o)])
    };
    let scale = points.amax().max(1.0);
    let eps = 1e-12 * scale * scale;

    let mut lower : Vec<usize> = Vec::new();
    for &p in idx.iter() {
        while lower.len() >= 2 && cross(lower[lower.len()-2],lower[lower.len()-1],p) <= eps { lower.pop(); }
        lower.push(p);
    }
    let mut upper : Vec<usize> = Vec::new();
    for &p in idx.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len()-2],upper[upper.len()-1],p) <= eps { upper.pop(); }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Orthonormal basis (columns) of the affine hull directions of `points`, and the centroid.
fn affine_hull(points : &DMatrix<f64>) -> (DMatrix<f64>,DVector<f64>) {
    let n = points.nrows();
    let k = points.ncols();
    let c = points.column_mean();
    let centered = DMatrix::from_fn(n,k,|i,j| points[(i,j)] - c[i]);
    let scale = centered.amax().max(1.0);
    let eig = (&centered * centered.transpose()).symmetric_eigen();
    let cols : Vec<DVector<f64>> = eig.eigenvalues.iter().enumerate()
        .filter(|(_,&l)| l > 1e-18 * scale * scale * (k as f64))
        .map(|(i,_)| eig.eigenvectors.column(i).into_owned())
        .collect();
    let basis = if cols.is_empty() { DMatrix::zeros(n,0) } else { DMatrix::from_columns(&cols) };
    (basis,c)
}

/// Facets `{ x : aᵢᵀ x ≤ bᵢ }` of the hull of full-dimensional points centered at the origin,
/// with unit `aᵢ`.
fn centered_facets(q : &DMatrix<f64>) -> Result<Vec<(DVector<f64>,f64)>> {
    let r = q.nrows();
    match r {
        1 => {
            let hi = q.row(0).max();
            let lo = q.row(0).min();
            Ok(vec![(DVector::from_element(1,1.0),hi),(DVector::from_element(1,-1.0),-lo)])
        },
        2 => {
            let hull = convex_hull_2d(q);
            let mut res = Vec::with_capacity(hull.len());
            for (&i,&j) in hull.iter().circular_tuple_windows() {
                let dx = q[(0,j)] - q[(0,i)];
                let dy = q[(1,j)] - q[(1,i)];
                let normal = DVector::from_vec(vec![dy,-dx]);
                let nrm = normal.norm();
                if nrm <= TOL { continue; }
                let normal = normal / nrm;
                let bi = normal[0] * q[(0,i)] + normal[1] * q[(1,i)];
                res.push((normal,bi));
            }
            Ok(res)
        },
        _ => {
            let polar = vertices(&q.transpose(),&DVector::from_element(q.ncols(),1.0))?;
            Ok(polar.column_iter()
                .map(|y| {
                    let nrm = y.norm();
                    (y / nrm, 1.0 / nrm)
                })
                .collect())
        }
    }
}

/// The halfspace representation `(A, b)` of the convex hull of `points`.
///
/// Lower dimensional hulls are described by their facets within the affine hull together with
/// pairs of opposite inequalities pinning the affine hull.
pub fn facets(points : &DMatrix<f64>) -> Result<(DMatrix<f64>,DVector<f64>)> {
    let n = points.nrows();
    if points.ncols() == 0 {
        return Err(Error::invalid("the convex hull of an empty point set has no facets"));
    }
    let (basis,c) = affine_hull(points);
    let r = basis.ncols();

    let mut rows : Vec<(DVector<f64>,f64)> = Vec::new();
    if r > 0 {
        let q = basis.transpose() * DMatrix::from_fn(n,points.ncols(),|i,j| points[(i,j)] - c[i]);
        for (ar,br) in centered_facets(&q)? {
            let a = &basis * ar;
            let b = br + a.dot(&c);
            rows.push((a,b));
        }
    }
    if r < n {
        let normals = null_space(&basis.transpose(),1e-9);
        for col in normals.column_iter() {
            let a = col.into_owned();
            let b = a.dot(&c);
            rows.push((a.clone(),b));
            rows.push((-a,-b));
        }
    }
    let a = DMatrix::from_fn(rows.len(),n,|i,j| rows[i].0[j]);
    let b = DVector::from_iterator(rows.len(),rows.iter().map(|r| r.1));
    Ok((a,b))
}

/// Indices of the points that are vertices of their convex hull. Duplicates and points in the
/// relative interior of a face are dropped. In 2-D the indices are in counter-clockwise order.
pub fn minimal_indices(points : &DMatrix<f64>) -> Result<Vec<usize>> {
    let n = points.nrows();
    let k = points.ncols();
    if k == 0 {
        return Ok(Vec::new());
    }
    let (basis,c) = affine_hull(points);
    let r = basis.ncols();
    if r == 0 {
        return Ok(vec![0]);
    }
    if r == 2 && n == 2 {
        // keep the orientation of the input coordinates
        return Ok(convex_hull_2d(points));
    }
    let q = basis.transpose() * DMatrix::from_fn(n,k,|i,j| points[(i,j)] - c[i]);
    match r {
        1 => {
            let lo = (0..k).min_by(|&i,&j| q[(0,i)].total_cmp(&q[(0,j)])).unwrap_or(0);
            let hi = (0..k).max_by(|&i,&j| q[(0,i)].total_cmp(&q[(0,j)])).unwrap_or(0);
            Ok(vec![lo,hi])
        },
        2 => Ok(convex_hull_2d(&q)),
        _ => {
            let fs = centered_facets(&q)?;
            let scale = q.amax().max(1.0);
            let mut res = Vec::new();
            for j in unique_columns(&q,1e-12 * scale) {
                let tight : Vec<DVector<f64>> = fs.iter()
                    .filter(|(a,b)| (a.dot(&q.column(j)) - b).abs() <= 1e-8 * scale)
                    .map(|(a,_)| a.clone())
                    .collect();
                if tight.len() >= r && DMatrix::from_columns(&tight).rank(1e-8) == r {
                    res.push(j);
                }
            }
            Ok(res)
        }
    }
}

/// Indices of the points on each facet of a full-dimensional 3-D hull, ordered
/// counter-clockwise as seen from outside.
pub fn hull_faces_3d(points : &DMatrix<f64>) -> Result<Vec<Vec<usize>>> {
    if points.nrows() != 3 {
        return Err(Error::invalid(format!("expected points in 3 dimensions, got {}",points.nrows())));
    }
    let (a,b) = facets(points)?;
    let scale = points.amax().max(1.0);
    let mut faces = Vec::with_capacity(a.nrows());
    for i in 0..a.nrows() {
        let normal = a.row(i).transpose();
        let on_face : Vec<usize> = (0..points.ncols())
            .filter(|&j| (normal.dot(&points.column(j)) - b[i]).abs() <= 1e-8 * scale)
            .collect();
        if on_face.len() < 3 { continue; }
        let center = on_face.iter().fold(DVector::zeros(3),|acc,&j| acc + points.column(j)) / on_face.len() as f64;
        let plane = null_space(&a.rows(i,1).into_owned(),1e-9);
        if plane.ncols() != 2 { continue; }
        // (u, v, normal) right handed
        let u = plane.column(0).into_owned();
        let v = nalgebra::Vector3::new(normal[0],normal[1],normal[2])
            .cross(&nalgebra::Vector3::new(u[0],u[1],u[2]));
        let v = DVector::from_column_slice(v.as_slice());
        let face : Vec<usize> = on_face.into_iter()
            .sorted_by(|&j,&l| {
                let pj = points.column(j) - &center;
                let pl = points.column(l) - &center;
                v.dot(&pj).atan2(u.dot(&pj)).total_cmp(&v.dot(&pl).atan2(u.dot(&pl)))
            })
            .collect();
        faces.push(face);
    }
    Ok(faces)
}

/// Volume of the convex hull of `points`; zero if the hull is not full dimensional.
///
/// Computed as `(1/n) Σ_F h_F vol(F)` with `h_F` the distance from an interior point to facet
/// `F`, recursing on the facets.
pub fn volume(points : &DMatrix<f64>) -> Result<f64> {
    let n = points.nrows();
    let k = points.ncols();
    if n == 0 || k == 0 {
        return Ok(0.0);
    }
    if n == 1 {
        return Ok(points.row(0).max() - points.row(0).min());
    }
    let (basis,c) = affine_hull(points);
    if basis.ncols() < n {
        return Ok(0.0);
    }
    if n == 2 {
        let hull = convex_hull_2d(points);
        let area2 : f64 = hull.iter().circular_tuple_windows()
            .map(|(&i,&j)| points[(0,i)] * points[(1,j)] - points[(0,j)] * points[(1,i)])
            .sum();
        return Ok(0.5 * area2.abs());
    }

    let (a,b) = facets(points)?;
    let scale = points.amax().max(1.0);
    let mut vol = 0.0;
    for i in 0..a.nrows() {
        let normal = a.row(i).transpose();
        let h = b[i] - normal.dot(&c);
        let on_face : Vec<usize> = (0..k)
            .filter(|&j| (normal.dot(&points.column(j)) - b[i]).abs() <= 1e-8 * scale)
            .collect();
        if on_face.len() < n { continue; }
        let plane = null_space(&a.rows(i,1).into_owned(),1e-9);
        let projected = plane.transpose() * points.select_columns(on_face.iter());
        vol += h * volume(&projected)? / n as f64;
    }
    Ok(vol)
}
