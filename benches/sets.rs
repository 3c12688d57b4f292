extern crate criterion;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::DVector;

use convexsets::*;

fn vec(v : &[f64]) -> DVector<f64> { DVector::from_column_slice(v) }

fn bench_inscribed_ellipsoid(c : & mut Criterion, n : usize) {
    let h = HPolyhedron::make_l1_ball(n).unwrap();
    c.bench_function(format!("mvie-l1-ball-{}",n).as_str(), |b| b.iter(|| h.maximum_volume_inscribed_ellipsoid().unwrap()));
}

fn bench_vertex_enumeration(c : & mut Criterion, n : usize) {
    let h = HPolyhedron::make_unit_box(n);
    c.bench_function(format!("vertices-box-{}",n).as_str(), |b| b.iter(|| VPolytope::from_hpolyhedron(&h).unwrap()));
}

fn bench_iris(c : & mut Criterion) {
    let domain = HPolyhedron::make_box(&vec(&[0.0,0.0]),&vec(&[4.0,2.0])).unwrap();
    let obstacles : Vec<Box<dyn ConvexSet>> = vec![
        Box::new(HPolyhedron::make_box(&vec(&[1.8,0.0]),&vec(&[2.2,1.2])).unwrap()),
        Box::new(Hyperellipsoid::make_hypersphere(0.3,vec(&[1.0,1.5])).unwrap()),
    ];
    c.bench_function("iris-room", |b| b.iter(|| iris(&obstacles,&vec(&[0.5,0.5]),&domain,&IrisOptions::default()).unwrap()));
}

fn bench_shortest_path(c : & mut Criterion, n : usize, relax : bool) {
    let mut g = GraphOfConvexSets::new();
    let mut prev = g.add_vertex(Box::new(Point::new(vec(&[0.0,0.0]))),"source");
    for i in 0..n {
        let upper = g.add_vertex(Box::new(HPolyhedron::make_box(&vec(&[i as f64,0.5]),&vec(&[i as f64+1.0,1.5])).unwrap()),"");
        let lower = g.add_vertex(Box::new(HPolyhedron::make_box(&vec(&[i as f64,-1.5]),&vec(&[i as f64+1.0,-0.5])).unwrap()),"");
        for v in [upper,lower] {
            let e = g.add_edge(prev,v,"").unwrap();
            let edge = g.edge_mut(e).unwrap();
            let step = LinearExpr::from(&edge.xv()[0]) - &edge.xu()[0];
            edge.add_cost(&step).unwrap();
        }
        prev = if i % 2 == 0 { upper } else { lower };
    }
    let target = g.add_vertex(Box::new(Point::new(vec(&[n as f64+1.0,0.0]))),"target");
    g.add_edge(prev,target,"").unwrap();
    let source = g.vertices()[0].id();

    let mut options = GraphOfConvexSetsOptions::default();
    options.convex_relaxation = Some(relax);
    options.max_rounded_paths = Some(if relax { 5 } else { 0 });
    c.bench_function(format!("gcs-chain-{}-{}",n,if relax {"relaxed"} else {"mip"}).as_str(),
                     |b| b.iter(|| g.solve_shortest_path(source,target,&options).unwrap()));
}

fn sets_benchmark(c : & mut Criterion) {
    bench_inscribed_ellipsoid(c,3);
    bench_inscribed_ellipsoid(c,6);
    bench_vertex_enumeration(c,4);
    bench_iris(c);
    bench_shortest_path(c,4,false);
    bench_shortest_path(c,4,true);
}

criterion_group!(benches, sets_benchmark);
criterion_main!(benches);
