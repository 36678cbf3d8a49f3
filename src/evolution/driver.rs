//! Hill-climbing search over a curriculum of test cases.
//!
//! The driver works through the curriculum in order. For the current case
//! `d` it mutates the program and re-scores cases `0..=d`:
//!
//! - a case scoring below its best so far rejects the edit (rolled back),
//! - a case scoring above its best records the new best and keeps the edit,
//! - if every case ties and every output contains its expected run, case
//!   `d` is solved and the search moves on to `d + 1`.
//!
//! Best scores are never lowered, so accepted programs never regress on a
//! case they already handled. Search runs in bounded chunks so a host can
//! interleave many drivers.

use crate::evolution::config::EvoConfig;
use crate::evolution::fitness::{TestCase, contains, lcs};
use crate::evolution::mutator::{Mutator, seeded_rng};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::{Program, ProgramImage};
use crate::virtual_machine::vm::{Halt, NoSensors, Sensors, VM};
use crate::{debug, info, warn};
use rand::Rng;
use rand::rngs::StdRng;

/// Value handed to a suspended `in` during evaluation.
const SEARCH_INPUT: u16 = 0;

/// Result of a call to [`Driver::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The attempt budget ran out before the current case was solved.
    StillSearching,
    /// The case with this index was solved; the next one is now current.
    CaseSolved(usize),
    /// Every case in the curriculum is solved.
    AllCasesSolved,
}

/// Counters over the lifetime of a driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Mutations tried.
    pub attempts: u64,
    /// Mutations kept, either improving or tying.
    pub accepted: u64,
    /// Mutations rolled back.
    pub rejected: u64,
    /// Mutations that raised a best score.
    pub improvements: u64,
}

/// Outcome of scoring one mutation.
enum Verdict {
    Rejected,
    Improved { case: usize, score: usize },
    Tied { solved: bool },
}

/// Search state for one evolving program.
pub struct Driver<S: Sensors = NoSensors, R: Rng = StdRng> {
    config: EvoConfig,
    curriculum: Vec<TestCase>,
    /// Best LCS seen per case; never decreases.
    best: Vec<usize>,
    /// Index of the case being solved.
    current: usize,
    mutator: Mutator<R>,
    vm: VM,
    output: Vec<u16>,
    sensors: S,
    stats: SearchStats,
}

impl Driver<NoSensors, StdRng> {
    /// Starts a search from an empty program.
    pub fn new(curriculum: Vec<TestCase>, config: EvoConfig) -> Self {
        let rng = seeded_rng(config.seed);
        Self::with_parts(curriculum, config, Program::new(), NoSensors, rng)
    }

    /// Resumes a search from a persisted program.
    pub fn with_program(
        curriculum: Vec<TestCase>,
        config: EvoConfig,
        image: &ProgramImage,
    ) -> Result<Self, VMError> {
        let program = image.to_program()?;
        info!(
            "Resuming search from program {} ({} slots)",
            image.fingerprint(),
            program.slots()
        );
        let rng = seeded_rng(config.seed);
        Ok(Self::with_parts(curriculum, config, program, NoSensors, rng))
    }
}

impl<S: Sensors, R: Rng> Driver<S, R> {
    /// Builds a driver from explicit parts.
    pub fn with_parts(
        curriculum: Vec<TestCase>,
        config: EvoConfig,
        program: Program,
        sensors: S,
        rng: R,
    ) -> Self {
        let cases = curriculum.len();
        if cases == 0 {
            warn!("Search created with an empty curriculum; nothing to solve");
        }
        Self {
            vm: VM::new(config.memory_size),
            mutator: Mutator::with_rng(program, rng, config.mutation_speed),
            config,
            curriculum,
            best: vec![0; cases],
            current: 0,
            output: Vec::new(),
            sensors,
            stats: SearchStats::default(),
        }
    }

    /// Runs up to `max_attempts` mutations on the current case.
    ///
    /// Returns as soon as a case is solved. VM errors can only come from a
    /// structurally broken starting program and are passed through.
    pub fn step(&mut self, max_attempts: u32) -> Result<StepOutcome, VMError> {
        if self.is_finished() {
            return Ok(StepOutcome::AllCasesSolved);
        }

        for _ in 0..max_attempts {
            self.mutator.mutate(self.config.registers());
            self.stats.attempts += 1;

            match self.evaluate()? {
                Verdict::Rejected => {
                    self.mutator.rollback();
                    self.stats.rejected += 1;
                }
                Verdict::Improved { case, score } => {
                    self.mutator.commit();
                    self.stats.accepted += 1;
                    self.stats.improvements += 1;
                    debug!(
                        "case {case} improved to {score}/{} after {} attempts",
                        self.curriculum[case].expected.len(),
                        self.stats.attempts
                    );
                }
                Verdict::Tied { solved } => {
                    self.mutator.commit();
                    self.stats.accepted += 1;
                    if solved {
                        return Ok(self.advance());
                    }
                }
            }
        }
        Ok(StepOutcome::StillSearching)
    }

    /// [`step`](Driver::step) with the configured chunk size.
    pub fn step_chunk(&mut self) -> Result<StepOutcome, VMError> {
        self.step(self.config.chunk_size)
    }

    /// Marks the current case solved and moves to the next one.
    fn advance(&mut self) -> StepOutcome {
        let solved = self.current;
        self.current += 1;
        let image = self.mutator.program().image();
        info!(
            "Solved case {}/{} after {} attempts: slots={} program={}",
            solved + 1,
            self.curriculum.len(),
            self.stats.attempts,
            self.mutator.program().slots(),
            image.fingerprint()
        );

        if self.is_finished() {
            info!("All {} cases solved", self.curriculum.len());
            StepOutcome::AllCasesSolved
        } else {
            StepOutcome::CaseSolved(solved)
        }
    }

    /// Scores cases `0..=current` against the mutated program.
    fn evaluate(&mut self) -> Result<Verdict, VMError> {
        let mut solved = true;
        for case in 0..=self.current {
            let score = self.run_case(case)?;
            let best = self.best[case];
            if score < best {
                return Ok(Verdict::Rejected);
            }
            if score > best {
                self.best[case] = score;
                return Ok(Verdict::Improved { case, score });
            }
            solved &= contains(&self.output, &self.curriculum[case].expected);
        }
        Ok(Verdict::Tied { solved })
    }

    /// Runs the program on one case, leaving its output in `self.output`.
    fn run_case(&mut self, case: usize) -> Result<usize, VMError> {
        let case = &self.curriculum[case];
        let program = self.mutator.program();

        self.output.clear();
        self.vm.reset();
        self.vm.load_input(&case.input);

        let mut halt = self.vm.run(
            program.code(),
            program.len(),
            0,
            &mut self.output,
            &mut self.sensors,
        )?;
        while let Halt::Suspended { .. } = halt {
            halt = self.vm.resume(
                program.code(),
                program.len(),
                SEARCH_INPUT,
                &mut self.output,
                &mut self.sensors,
            )?;
        }
        Ok(lcs(&self.output, &case.expected))
    }

    /// True once every case is solved.
    pub fn is_finished(&self) -> bool {
        self.current >= self.curriculum.len()
    }

    /// Index of the case being solved.
    pub fn current_case(&self) -> usize {
        self.current
    }

    /// Best score recorded for each case.
    pub fn best_scores(&self) -> &[usize] {
        &self.best
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn curriculum(&self) -> &[TestCase] {
        &self.curriculum
    }

    pub fn program(&self) -> &Program {
        self.mutator.program()
    }

    /// Snapshot of the current program for persistence.
    pub fn program_image(&self) -> ProgramImage {
        self.mutator.program().image()
    }

    pub fn config(&self) -> &EvoConfig {
        &self.config
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }
}

/// Runs `program` once on `input` with a fresh VM and returns its output.
///
/// Every `in` is answered with the same value the search uses.
pub fn execute(
    program: &Program,
    input: &[u16],
    memory_size: usize,
) -> Result<Vec<u16>, VMError> {
    let mut vm = VM::new(memory_size);
    vm.load_input(input);
    let mut output = Vec::new();
    let mut halt = vm.run(
        program.code(),
        program.len(),
        0,
        &mut output,
        &mut NoSensors,
    )?;
    while let Halt::Suspended { .. } = halt {
        halt = vm.resume(
            program.code(),
            program.len(),
            SEARCH_INPUT,
            &mut output,
            &mut NoSensors,
        )?;
    }
    Ok(output)
}
