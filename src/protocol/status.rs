use std::fmt;

/// Single-byte reply a receiver sends after every transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransferStatus {
    Failure = 0,
    Success = 1,
}

impl TransferStatus {
    /// Wire value
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Interpret a reply byte. Anything but `1` is a failure.
    pub fn from_byte(byte: u8) -> Self {
        if byte == TransferStatus::Success as u8 {
            TransferStatus::Success
        } else {
            TransferStatus::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == TransferStatus::Success
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Success => f.write_str("success"),
            TransferStatus::Failure => f.write_str("failure"),
        }
    }
}
