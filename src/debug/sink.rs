//! Sink de debug (colaborador externo)
//!
//! O kernel registra um `DebugSink` no boot (serial, buffer de log, interface
//! de debug). Todas as chamadas são best-effort: o lock do sink só é
//! *tentado*, e uma linha é descartada se ele estiver ocupado.

use crate::sys::types::Tid;
use spin::Mutex;

/// Destino das linhas de log e das publicações de status.
pub trait DebugSink: Sync {
    /// Escreve um fragmento de texto (sem newline implícito).
    fn write_str(&self, s: &str);

    /// Publica mudança de estado de uma thread.
    fn publish_status(&self, _tid: Tid, _status: &'static str) {}

    /// Publica o identificador registrado de uma thread.
    fn publish_identifier(&self, _tid: Tid, _identifier: &str) {}
}

static SINK: Mutex<Option<&'static dyn DebugSink>> = Mutex::new(None);

/// Registra o sink global. Substitui o anterior.
pub fn set_sink(sink: &'static dyn DebugSink) {
    *SINK.lock() = Some(sink);
}

/// Remove o sink global (saída passa a ser descartada).
pub fn clear_sink() {
    *SINK.lock() = None;
}

#[inline]
fn current() -> Option<&'static dyn DebugSink> {
    SINK.try_lock().and_then(|guard| *guard)
}

/// Emite uma string crua.
pub fn emit_str(s: &str) {
    if let Some(sink) = current() {
        sink.write_str(s);
    }
}

/// Emite newline.
pub fn emit_nl() {
    emit_str("\n");
}

/// Emite valor em hexadecimal (`0x` + 16 dígitos), sem `core::fmt`.
pub fn emit_hex(value: u64) {
    let sink = match current() {
        Some(sink) => sink,
        None => return,
    };

    let mut buf = [0u8; 18];
    buf[0] = b'0';
    buf[1] = b'x';
    for i in 0..16 {
        let nibble = ((value >> ((15 - i) * 4)) & 0xF) as u8;
        buf[2 + i] = nibble_to_ascii(nibble);
    }

    if let Ok(text) = core::str::from_utf8(&buf) {
        sink.write_str(text);
    }
}

#[inline]
const fn nibble_to_ascii(nibble: u8) -> u8 {
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + (nibble - 10)
    }
}

/// Publicação best-effort de status de thread.
pub fn publish_status(tid: Tid, status: &'static str) {
    if let Some(sink) = current() {
        sink.publish_status(tid, status);
    }
}

/// Publicação best-effort de identificador de thread.
pub fn publish_identifier(tid: Tid, identifier: &str) {
    if let Some(sink) = current() {
        sink.publish_identifier(tid, identifier);
    }
}
