//! Framework de testes do kernel
//!
//! Suítes de fumaça executadas no boot (feature `self_test`). Os mesmos
//! casos rodam nos testes de host, que exigem `failed == 0`.

use crate::debug::{logging, sink};

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Linha de log com nome textual (os macros só imprimem valores em hex).
fn log_named(prefix: &str, tag: &str, name: &str) {
    if cfg!(feature = "no_logs") {
        return;
    }
    sink::emit_str(prefix);
    sink::emit_str(tag);
    sink::emit_str(name);
    sink::emit_nl();
}

/// Executa suite de testes. Retorna `(passed, failed, skipped)`.
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    log_named(logging::P_INFO, "=== Executando suite: ", name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match (test.func)() {
            TestResult::Passed => {
                log_named(logging::P_INFO, "[PASS] ", test.name);
                passed += 1;
            }
            TestResult::Failed => {
                log_named(logging::P_ERROR, "[FAIL] ", test.name);
                failed += 1;
            }
            TestResult::Skipped => {
                log_named(logging::P_WARN, "[SKIP] ", test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!("Resultados: passed=", passed);
    if failed > 0 {
        crate::kerror!("Resultados: failed=", failed);
    }
    (passed, failed, skipped)
}
