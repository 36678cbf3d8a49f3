//! Fitness scoring.
//!
//! Two measures are used side by side. [`lcs`] is a graded similarity that
//! drives acceptance of mutations; [`contains`] is the strict pass test that
//! decides when a test case is solved.

use evo_derive::BinaryCodec;

/// One curriculum entry: memory contents to load and the output to produce.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct TestCase {
    pub input: Vec<u16>,
    pub expected: Vec<u16>,
}

impl TestCase {
    pub fn new(input: Vec<u16>, expected: Vec<u16>) -> Self {
        Self { input, expected }
    }
}

/// Length of the longest common subsequence of `a` and `b`.
///
/// Classic dynamic programming, keeping a single row of the table.
pub fn lcs(a: &[u16], b: &[u16]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut row = vec![0usize; b.len() + 1];
    for x in a {
        let mut diag = 0;
        for (j, y) in b.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if x == y {
                diag + 1
            } else {
                up.max(row[j])
            };
            diag = up;
        }
    }
    row[b.len()]
}

/// True if `expected` occurs as a contiguous run inside `output`.
///
/// An empty `expected` is contained in every output.
pub fn contains(output: &[u16], expected: &[u16]) -> bool {
    expected.is_empty() || output.windows(expected.len()).any(|w| w == expected)
}

/// Boolean operations curriculum.
///
/// The first input word selects the operation (0 = xor, 1 = or, 2 = and,
/// 3 = not), the rest are its operands.
pub fn boolean_curriculum() -> Vec<TestCase> {
    const TABLE: &[(&[u16], &[u16])] = &[
        (&[0, 0, 0], &[0]),
        (&[0, 1, 0], &[1]),
        (&[0, 0, 1], &[1]),
        (&[0, 1, 1], &[0]),
        (&[1, 0, 0], &[0]),
        (&[1, 1, 0], &[1]),
        (&[1, 0, 1], &[1]),
        (&[1, 1, 1], &[1]),
        (&[2, 0, 0], &[0]),
        (&[2, 1, 0], &[0]),
        (&[2, 0, 1], &[0]),
        (&[2, 1, 1], &[1]),
        (&[3, 0], &[1]),
        (&[3, 1], &[0]),
    ];
    TABLE
        .iter()
        .map(|(input, expected)| TestCase::new(input.to_vec(), expected.to_vec()))
        .collect()
}
