use criterion::Criterion;
use ndarray::Array1;
use std::hint::black_box;
use transit_fit_test_util::{Injection, injected_system};

pub fn bench_light_curve(c: &mut Criterion) {
    const N: usize = 1000;

    // Cadences across the transit at t = 5
    let t = Array1::linspace(4.8, 5.2, N);
    let system = injected_system(&Injection::default());
    c.bench_function("Light curve: instantaneous", |b| {
        b.iter(|| system.light_curve_instantaneous(black_box(t.view())));
    });
    for supersample in [3, 7, 15] {
        let system = system.clone().with_supersample(supersample);
        c.bench_function(
            &format!("Light curve: {supersample} sub-exposures"),
            |b| {
                b.iter(|| system.light_curve(black_box(t.view()), 0.0204));
            },
        );
    }
}
