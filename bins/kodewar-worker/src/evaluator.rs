/// Test Evaluator - Positional Output Scoring
///
/// **Core Responsibility:**
/// Compare the sandbox's combined output against a submission's ordered
/// test cases and mark each one passed or failed.
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Knows nothing about Redis
/// - Pure function: (test cases, raw output) → per-case results
///
/// **Alignment Rules:**
/// - Output line N is compared against test case N
/// - Extra output lines beyond the test case list are ignored
/// - Test cases with no matching line fail with an empty `actual`
///
/// **Normalization Rules:**
/// - Trim trailing whitespace: YES (both sides, covers \r\n endings)
/// - Trim leading whitespace: NO (indentation is part of the answer)
/// - Case sensitivity: YES (exact match required)
use kodewar_common::types::{TestCase, TestCaseResult};

/// Normalize one line for comparison. Only the trailing edge is touched so
/// leading whitespace stays significant.
fn normalize_line(line: &str) -> &str {
    line.trim_end()
}

/// Evaluate combined sandbox output against the ordered test cases.
pub fn evaluate(test_cases: &[TestCase], output: &str) -> Vec<TestCaseResult> {
    let lines: Vec<&str> = output.lines().collect();

    test_cases
        .iter()
        .enumerate()
        .map(|(index, test_case)| {
            let actual = lines.get(index).map(|line| normalize_line(line));
            let passed = match actual {
                Some(line) => line == normalize_line(&test_case.expected),
                // Missing lines always fail, even against an empty expected.
                None => false,
            };

            TestCaseResult {
                input: test_case.input.clone(),
                expected: test_case.expected.clone(),
                actual: actual.unwrap_or("").to_string(),
                passed,
            }
        })
        .collect()
}
