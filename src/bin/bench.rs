//! VM and search benchmark binary.
//!
//! Measures VM execution time for representative straight-line programs and
//! the mutation/evaluation throughput of the search driver.
//! Run with: `cargo run --release --bin bench`

use std::fmt::Write;
use std::time::{Duration, Instant};

use evo::error;
use evo::evolution::config::EvoConfig;
use evo::evolution::driver::{Driver, StepOutcome};
use evo::evolution::fitness::{TestCase, boolean_curriculum};
use evo::evolution::mutator::Mutator;
use evo::utils::log::{Level, set_min_level, set_show_elapsed};
use evo::virtual_machine::assembler::assemble_source;
use evo::virtual_machine::program::Program;
use evo::virtual_machine::vm::{Halt, NoSensors, VM};

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Instructions dispatched by the last run.
    steps: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        if self.iterations == 0 {
            return Duration::ZERO;
        }
        self.total.div_f64(self.iterations as f64)
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let ns_per_step = if self.steps > 0 {
            format!("{:>8.1}", ns_per_op as f64 / self.steps as f64)
        } else {
            "       -".to_string()
        };
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>12} steps  {} ns/step",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            self.steps,
            ns_per_step,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> u64,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_steps = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_steps = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        steps: last_steps,
    }
}

/// Runs a program to completion on a reused VM, answering `in` with 1.
fn run_steps(vm: &mut VM, prog: &Program, input: &[u16], output: &mut Vec<u16>) -> u64 {
    vm.reset();
    vm.load_input(input);
    output.clear();
    let mut halt = vm
        .run(prog.code(), prog.len(), 0, output, &mut NoSensors)
        .expect("run");
    while let Halt::Suspended { .. } = halt {
        halt = vm
            .resume(prog.code(), prog.len(), 1, output, &mut NoSensors)
            .expect("resume");
    }
    vm.steps()
}

// ---------------------------------------------------------------------------
// Benchmark programs
// ---------------------------------------------------------------------------

/// Repeats `body` `n` times.
fn repeat(body: &str, n: usize) -> String {
    let mut src = String::with_capacity(body.len() * n);
    for _ in 0..n {
        src.push_str(body);
    }
    src
}

fn arithmetic_mix(n: usize) -> String {
    let mut src = String::from("set 1 r2\nset 2 r3\nset 3 r4\n");
    src.push_str(&repeat(
        "add r2 r5\nmul r4 r5\nsub r2 r6\ndiv r3 r6\nrem r4 r6\nshl r3 r2\nshr r4 r3\ninc r4\n",
        n,
    ));
    src
}

/// Half the branches are taken, each skipping one slot.
fn branch_heavy(n: usize) -> String {
    let mut src = String::from("set 1 r1\n");
    for i in 0..n {
        let _ = writeln!(
            src,
            "jumpz r0 b{i}\ninc r2\nb{i}: jumpn r0 c{i}\ninc r3\nc{i}: xor r1 r0"
        );
    }
    src
}

fn memory(n: usize) -> String {
    repeat("inc r1\nwrite r1 r1\nread r1 r2\necho r2\n", n)
}

fn suspend_resume(n: usize) -> String {
    repeat("in r0 r1\nadd r1 r2\n", n)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    set_min_level(Level::Warn);
    // Keep warnings aligned with the result table.
    set_show_elapsed(false);
    let min = Duration::from_secs(2);
    let config = EvoConfig::from_env().expect("config");

    println!("VM Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>12}  {:>10}",
        "benchmark", "iters", "avg time", "steps/run", "ns/step"
    );
    println!("  {}", "-".repeat(82));

    // Pre-assemble programs (assembly cost excluded from benchmark)
    let programs: [(&'static str, String); 4] = [
        ("arithmetic_mix(1K)", arithmetic_mix(1_000)),
        ("branch_heavy(1K)", branch_heavy(1_000)),
        ("memory(1K)", memory(1_000)),
        ("suspend_resume(1K)", suspend_resume(1_000)),
    ];

    let mut vm = VM::new(config.memory_size);
    let mut output = Vec::new();
    for &(name, ref src) in &programs {
        let prog = assemble_source(src).expect("asm");
        let r = bench(name, min, || {
            run_steps(&mut vm, &prog, &[3, 1, 4], &mut output)
        });
        r.print();
    }

    // Mutate + rollback, no evaluation
    let mut mutator = Mutator::new(config.mutation_speed, Some(1));
    for _ in 0..1_000 {
        mutator.mutate(config.registers());
    }
    let r = bench("mutate_rollback", min, || {
        mutator.mutate(config.registers());
        mutator.rollback();
        0
    });
    r.print();

    println!("\nSearch Benchmarks\n");

    let seeded = config.clone().with_seed(config.seed.unwrap_or(1));
    search(
        "echo",
        vec![
            TestCase::new(vec![0], vec![0]),
            TestCase::new(vec![1], vec![1]),
        ],
        &seeded,
    );
    search("boolean", boolean_curriculum(), &seeded);

    println!();
}

/// Runs one chunk-sized batch of steps for at least 2s and reports attempts/s.
fn search(name: &str, curriculum: Vec<TestCase>, config: &EvoConfig) {
    let cases = curriculum.len();
    let mut driver = Driver::new(curriculum, config.clone());
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        match driver.step_chunk() {
            Ok(StepOutcome::AllCasesSolved) => break,
            Ok(_) => {}
            Err(err) => {
                error!("{name} search failed: {err}");
                return;
            }
        }
    }
    let elapsed = start.elapsed();
    let stats = driver.stats();
    println!(
        "  {:<12} {:>10} attempts {:>12.0} attempts/s  solved {}/{}  slots {}",
        name,
        stats.attempts,
        stats.attempts as f64 / elapsed.as_secs_f64(),
        driver.current_case(),
        cases,
        driver.program().slots(),
    );
}
