//! Compile+execute benchmarks for the bytecode pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rill::parser::parse_source;
use rill::vm::{Compiler, Machine};

const FIB: &str = "
func fib(n) {
    if n < 2 { return n }
    return fib(n - 1) + fib(n - 2)
}
return fib(15)
";

const LOOP_SUM: &str = "
sum = 0
for i = 0; i < 10000; i = i + 1 {
    sum = sum + i
}
return sum
";

fn bench_compile(c: &mut Criterion) {
    let program = parse_source(FIB).unwrap();
    c.bench_function("compile_fib", |b| {
        b.iter(|| Compiler::compile(black_box(&program), "<bench>").unwrap())
    });
}

fn bench_execute(c: &mut Criterion) {
    let fib = Compiler::compile(&parse_source(FIB).unwrap(), "<bench>").unwrap();
    c.bench_function("execute_fib_15", |b| {
        b.iter(|| {
            let mut machine = Machine::with_capture();
            machine.execute(black_box(fib.clone()), None)
        })
    });

    let loop_sum = Compiler::compile(&parse_source(LOOP_SUM).unwrap(), "<bench>").unwrap();
    c.bench_function("execute_loop_sum", |b| {
        b.iter(|| {
            let mut machine = Machine::with_capture();
            machine.execute(black_box(loop_sum.clone()), None)
        })
    });
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
