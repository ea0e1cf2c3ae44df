//! Dispatch benchmarks.
//!
//! Measures the three hot paths of a call:
//! - Resolution: scoring every overload of a wide overload set
//! - Method calls: receiver lookup plus argument conversion
//! - Surfacing: wrapping native results as host objects
//!
//! ```bash
//! cargo bench --bench dispatch_benchmarks
//! cargo bench --features profiling --bench dispatch_benchmarks
//! ```

use bindery::prelude::*;
use bindery::{DataType, IntKind, NativeFn, NativeKind, Parameter, ReturnSpec, Scope};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

#[derive(Clone)]
struct Particle {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

/// Register `count` overloads of `sum`, one per arity, each summing its ints.
fn wide_overload_set(runtime: &mut Runtime, count: usize) {
    for arity in 0..count {
        let params = (0..arity)
            .map(|i| Parameter::new(format!("arg{i}"), DataType::int(IntKind::I64)))
            .collect();
        let native = Native::raw(
            NativeKind::Function,
            "sum",
            Scope::Global,
            params,
            ReturnSpec::new(DataType::int(IntKind::I64)),
            NativeFn::new(|ctx: &mut CallContext<'_>| {
                let total = ctx.args().iter().filter_map(Dynamic::as_int).sum::<i64>();
                ctx.set_return(Dynamic::Int(total));
                Ok(())
            }),
        );
        runtime.register_native(native).unwrap();
    }
}

fn particle_runtime(config: RuntimeConfig) -> (Runtime, ClassId) {
    let mut runtime = Runtime::with_config(config);
    let class = runtime.bind_type::<Particle>("Particle").unwrap();
    runtime
        .register_native(Native::constructor(|x: f64, y: f64| Particle {
            x,
            y,
            vx: 1.0,
            vy: -1.0,
        }))
        .unwrap();
    runtime
        .register_native(Native::method_mut("step", |p: &mut Particle, dt: f64| {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
        }))
        .unwrap();
    runtime
        .register_native(Native::method("x", |p: &Particle| p.x))
        .unwrap();
    runtime
        .register_native(Native::method("spawn", |p: &Particle| {
            Owned(Particle {
                x: p.x,
                y: p.y,
                vx: p.vy,
                vy: p.vx,
            })
        }))
        .unwrap();
    (runtime, class)
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/resolution");

    for count in [1usize, 4, 16, 64] {
        let mut runtime = Runtime::new();
        wide_overload_set(&mut runtime, count);
        let args: Vec<Dynamic> = (0..count as i64 - 1).map(Dynamic::Int).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("overloads", count), &args, |b, args| {
            b.iter(|| black_box(runtime.call_function("sum", black_box(args)).unwrap()));
        });
    }

    let mut runtime = Runtime::new();
    runtime
        .register_native(Native::function("mix", |a: i64, b: i64| a + b))
        .unwrap();
    runtime
        .register_native(Native::function("mix", |a: f64, b: f64| a * b))
        .unwrap();
    runtime
        .register_native(Native::function("mix", |a: String, b: i64| a.repeat(b as usize)))
        .unwrap();
    let lossy = [Dynamic::Int(3), Dynamic::Float(2.5)];
    group.bench_function("mixed_lossy", |b| {
        b.iter(|| black_box(runtime.call_function("mix", black_box(&lossy)).unwrap()));
    });

    group.finish();
}

fn bench_method_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/methods");
    let (mut runtime, class) = particle_runtime(RuntimeConfig::default());
    let particle = runtime
        .instantiate(class, &[Dynamic::Float(0.0), Dynamic::Float(0.0)])
        .unwrap();

    group.bench_function("const_method", |b| {
        b.iter(|| black_box(runtime.call_method(particle, "x", &[]).unwrap()));
    });

    let dt = [Dynamic::Float(0.016)];
    group.bench_function("mut_method", |b| {
        b.iter(|| black_box(runtime.call_method(particle, "step", black_box(&dt)).unwrap()));
    });

    let int_dt = [Dynamic::Int(1)];
    group.bench_function("mut_method_int_to_float", |b| {
        b.iter(|| black_box(runtime.call_method(particle, "step", black_box(&int_dt)).unwrap()));
    });

    group.finish();
}

fn bench_surfacing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/surfacing");

    for mode in [TrackingMode::Off, TrackingMode::Owned, TrackingMode::All] {
        let (mut runtime, class) = particle_runtime(RuntimeConfig::new().with_tracking(mode));
        let parent = runtime
            .instantiate(class, &[Dynamic::Int(1), Dynamic::Int(2)])
            .unwrap();

        group.bench_function(BenchmarkId::new("spawn", format!("{mode:?}")), |b| {
            b.iter(|| {
                let child = runtime.call_method(parent, "spawn", &[]).unwrap();
                black_box(child);
                runtime.collect_garbage([parent]);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resolution,
    bench_method_calls,
    bench_surfacing
);
criterion_main!(benches);
