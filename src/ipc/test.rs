//! Testes de IPC

use super::{MessageController, MessageHeader, MessagePool, ReceiveStatus, SendStatus};
use super::{HEADER_SIZE, MAX_MESSAGE_LENGTH};
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::sys::types::{Tid, TransactionId};

/// Casos de teste de IPC
const IPC_TESTS: &[TestCase] = &[
    TestCase::new("message_header_size", test_message_header_size),
    TestCase::new("round_trip", test_round_trip),
    TestCase::new("mailbox_overflow", test_mailbox_overflow),
];

/// Executa todos os testes de IPC
pub fn run_ipc_tests() -> (usize, usize, usize) {
    run_test_suite("IPC", IPC_TESTS)
}

/// Verifica tamanho do header de mensagem
fn test_message_header_size() -> TestResult {
    let size = core::mem::size_of::<MessageHeader>();

    if size != 8 + core::mem::size_of::<usize>() {
        crate::kerror!("(IPC) Tamanho de header inesperado=", size);
        return TestResult::Failed;
    }

    crate::ktrace!("(IPC) Tamanho do header=", size);
    TestResult::Passed
}

fn test_round_trip() -> TestResult {
    let ipc = MessageController::new(MessagePool::with_backing_size(16 * 1024, 4));
    let (a, b) = (Tid::new(1), Tid::new(2));

    if ipc.send(b, a, b"ping", TransactionId::new(7)) != SendStatus::Successful {
        return TestResult::Failed;
    }

    let mut buf = [0u8; 64];
    if ipc.receive(b, &mut buf, TransactionId::new(7)) != ReceiveStatus::Successful {
        return TestResult::Failed;
    }

    match MessageHeader::read_from(&buf) {
        Some(header) if &buf[HEADER_SIZE..header.total_size()] == b"ping" => TestResult::Passed,
        _ => TestResult::Failed,
    }
}

fn test_mailbox_overflow() -> TestResult {
    let ipc = MessageController::new(MessagePool::with_backing_size(128 * 1024, 4));
    let (a, b) = (Tid::new(1), Tid::new(2));
    let payload = [0xAAu8; MAX_MESSAGE_LENGTH];

    for _ in 0..32 {
        if ipc.send(b, a, &payload, TransactionId::NONE) != SendStatus::Successful {
            return TestResult::Failed;
        }
    }
    if ipc.send(b, a, &payload, TransactionId::NONE) != SendStatus::QueueFull {
        crate::kerror!("(IPC) 33a mensagem não foi rejeitada");
        return TestResult::Failed;
    }

    if ipc.pending(b) == 32 {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn ipc_self_tests_pass() {
        let (_, failed, _) = super::run_ipc_tests();
        assert_eq!(failed, 0);
    }
}
