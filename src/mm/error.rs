//! Tipos de Erro do contrato de memória

/// Erros devolvidos pelo provedor de memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem memória física/virtual disponível
    OutOfMemory,
    /// Não foi possível reservar a região de stack
    StackUnavailable,
    /// Não foi possível criar ou copiar o espaço de endereçamento
    SpaceUnavailable,
    /// Tamanho inválido (zero ou muito grande)
    InvalidSize,
    /// Região não foi alocada por este alocador
    NotAllocated,
}

impl MmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem memória disponível",
            Self::StackUnavailable => "Stack indisponível",
            Self::SpaceUnavailable => "Espaço de endereçamento indisponível",
            Self::InvalidSize => "Tamanho inválido",
            Self::NotAllocated => "Região não alocada",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tipo Result específico para operações de memória
pub type MmResult<T> = Result<T, MmError>;
