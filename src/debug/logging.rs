// =============================================================================
// TASKING LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Mesmo modelo do logging do kernel: filtragem em tempo de compilação via
// features do Cargo, sem core::fmt e sem alocação.
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada operação)
//
// FEATURES:
// - no_logs:   Remove 100% dos logs
// - log_error: Apenas ERROR, WARN, [OK]
// - log_info:  ERROR, WARN, INFO
// - log_debug: + DEBUG
// - log_trace: Todos os níveis (padrão)
//
// USO:
//   kinfo!("(Sched) Inicializando...");        // Apenas string
//   kinfo!("(Sched) TID=", tid.as_u32());      // String + hex
//
// O destino é o `DebugSink` registrado (ver `debug::sink`).
// =============================================================================

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";
pub const P_OK: &str = "\x1b[32m[OK]\x1b[0m ";

/// Corpo comum de todos os macros de nível.
#[doc(hidden)]
#[macro_export]
macro_rules! __klog_line {
    ($prefix:expr, $msg:expr) => {{
        $crate::debug::sink::emit_str($prefix);
        $crate::debug::sink::emit_str($msg);
        $crate::debug::sink::emit_nl();
    }};
    ($prefix:expr, $msg:expr, $val:expr) => {{
        $crate::debug::sink::emit_str($prefix);
        $crate::debug::sink::emit_str($msg);
        $crate::debug::sink::emit_hex($val as u64);
        $crate::debug::sink::emit_nl();
    }};
}

// =============================================================================
// ERROR / WARN - ativos exceto com no_logs
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($($arg:expr),+ $(,)?) => {
        $crate::__klog_line!($crate::debug::logging::P_ERROR, $($arg),+)
    };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($($arg:expr),+ $(,)?) => {
        $crate::__klog_line!($crate::debug::logging::P_WARN, $($arg),+)
    };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// INFO - ativo exceto com no_logs / log_error
// =============================================================================

#[cfg(not(any(feature = "no_logs", feature = "log_error")))]
#[macro_export]
macro_rules! kinfo {
    ($($arg:expr),+ $(,)?) => {
        $crate::__klog_line!($crate::debug::logging::P_INFO, $($arg),+)
    };
}

#[cfg(any(feature = "no_logs", feature = "log_error"))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// DEBUG - ativo com log_debug ou log_trace
// =============================================================================

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kdebug {
    ($($arg:expr),+ $(,)?) => {
        $crate::__klog_line!($crate::debug::logging::P_DEBUG, $($arg),+)
    };
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// TRACE - ativo apenas com log_trace
// =============================================================================

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($arg:expr),+ $(,)?) => {
        $crate::__klog_line!($crate::debug::logging::P_TRACE, $($arg),+)
    };
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// STATUS
// =============================================================================

/// kok! - Log de sucesso (prefixo verde [OK]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kok {
    ($msg:expr) => {
        $crate::__klog_line!($crate::debug::logging::P_OK, $msg)
    };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kok {
    ($($t:tt)*) => {{}};
}
