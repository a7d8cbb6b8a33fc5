//! Parser da linha de comando do kernel.
//!
//! Parâmetros `chave=valor` ou flags (`chave`) separados por espaços, ex.:
//! `sched.cores=4 sched.tick_ms=10 debug`. Armazenamento em buffer fixo, sem
//! heap, para estar disponível antes do allocator.

/// Tamanho máximo da linha de comando
const CMDLINE_MAX_LEN: usize = 256;

pub struct CommandLine {
    buffer: [u8; CMDLINE_MAX_LEN],
    len: usize,
}

impl CommandLine {
    pub const fn empty() -> Self {
        Self {
            buffer: [0; CMDLINE_MAX_LEN],
            len: 0,
        }
    }

    /// Copia a linha fornecida pelo bootloader. Excesso é truncado.
    pub fn parse(args: &str) -> Self {
        let mut cmdline = Self::empty();
        let bytes = args.as_bytes();
        let mut len = core::cmp::min(bytes.len(), CMDLINE_MAX_LEN);
        // Não corta um caractere UTF-8 no meio
        while !args.is_char_boundary(len) {
            len -= 1;
        }
        cmdline.buffer[..len].copy_from_slice(&bytes[..len]);
        cmdline.len = len;

        if bytes.len() > CMDLINE_MAX_LEN {
            crate::kwarn!("(Cmdline) Linha truncada, tamanho=", bytes.len());
        }
        cmdline
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.len]).unwrap_or("")
    }

    /// Itera sobre os pares `(chave, valor)`. Flags têm valor `""`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.as_str()
            .split_ascii_whitespace()
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key, value),
                None => (token, ""),
            })
    }

    /// Verifica se uma flag ou parâmetro existe.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Obtém o valor de um parâmetro. A última ocorrência vence.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .last()
    }

    /// Valor numérico (decimal ou `0x` hexadecimal).
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        let value = self.get(key)?;
        match value.strip_prefix("0x") {
            Some(hex) => usize::from_str_radix(hex, 16).ok(),
            None => value.parse().ok(),
        }
    }
}
