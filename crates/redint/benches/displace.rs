use criterion::{Criterion, criterion_group, criterion_main};
use molecule::molecule;
use redint::{DVec, RedundantCoords, geom::Geom};

pub fn displace(c: &mut Criterion) {
    let mol = molecule![
        C 0.0 0.0 0.0
        O 0.0 0.0 1.43
        H 1.0276618553 0.0 -0.3633333333
        H -0.5138309277 0.8899812732 -0.3633333333
        H -0.5138309277 -0.8899812732 -0.3633333333
        H 0.4551953545 0.7884214814 1.7346124701
    ];
    let coords = RedundantCoords::new(&mol, &[[2, 0, 1, 5]]).unwrap();
    let geom = Geom::from(&mol);
    let mut dq = DVec::zeros(coords.len());
    dq[0] = 0.05;
    dq[5] = 0.02;

    c.bench_function("b_matrix", |b| {
        b.iter(|| coords.b_matrix(&geom));
    });

    c.bench_function("displace", |b| {
        b.iter(|| coords.displace(&geom, &dq).unwrap());
    });
}

criterion_group!(benches, displace);
criterion_main!(benches);
