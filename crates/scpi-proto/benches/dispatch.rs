//! Benchmarks for statement parsing and tree dispatch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scpi_proto::{split_line, Discard, Dispatcher, ParamCell, Statement};

/// Common command
const COMMON: &str = "*ESR?";

/// Rooted query in long form
const LONG_QUERY: &str = ":SENSe:FREQuency:STARt?";

/// Several statements, relative paths and arguments
const COMPOUND: &str = ":SENS:FREQ:STAR 1e6;STOP 6e9;:SENS:SWE:POIN 1001;:SOUR:POW:LEV -10;*OPC?";

fn instrument() -> Dispatcher {
    let mut scpi = Dispatcher::new(Discard);
    let tree = scpi.tree_mut();

    let freq = tree.ensure_path("SENSe:FREQuency").unwrap();
    tree.add_double_parameter(freq, "STARt", ParamCell::new(1e6), true, true, None)
        .unwrap();
    tree.add_double_parameter(freq, "STOP", ParamCell::new(6e9), true, true, None)
        .unwrap();
    let sweep = tree.ensure_path("SENSe:SWEep").unwrap();
    tree.add_unsigned_int_parameter(sweep, "POINts", ParamCell::new(201), true, true, None)
        .unwrap();
    let power = tree.ensure_path("SOURce:POWer").unwrap();
    tree.add_double_parameter(power, "LEVel", ParamCell::new(-10.0), true, true, None)
        .unwrap();
    scpi
}

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Statement Parsing");

    group.bench_function("common", |b| {
        b.iter(|| black_box(Statement::parse(black_box(COMMON)).unwrap()))
    });

    group.bench_function("long_query", |b| {
        b.iter(|| black_box(Statement::parse(black_box(LONG_QUERY)).unwrap()))
    });

    group.bench_function("compound_line", |b| {
        b.iter(|| {
            for stmt in split_line(black_box(COMPOUND)) {
                black_box(Statement::parse(stmt).unwrap());
            }
        })
    });

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Dispatch");
    let mut scpi = instrument();

    group.bench_function("long_query", |b| {
        b.iter(|| {
            scpi.input(black_box(LONG_QUERY));
            scpi.process();
        })
    });

    group.bench_function("compound_line", |b| {
        b.iter(|| {
            scpi.input(black_box(COMPOUND));
            scpi.process();
        })
    });

    group.bench_function("command_list", |b| {
        b.iter(|| black_box(scpi.tree().command_list()))
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_dispatch);
criterion_main!(benches);
