use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid format")]
    InvalidFormat,
    #[error("Value out of range")]
    ValueOutOfRange,
    #[error("Type mismatch")]
    TypeMismatch,
}

impl From<fxd::Error> for Error {
    #[inline]
    fn from(_src: fxd::Error) -> Self {
        Error::InvalidFormat
    }
}

impl From<std::num::ParseIntError> for Error {
    #[inline]
    fn from(_src: std::num::ParseIntError) -> Self {
        Error::InvalidFormat
    }
}

impl From<std::num::ParseFloatError> for Error {
    #[inline]
    fn from(_src: std::num::ParseFloatError) -> Self {
        Error::InvalidFormat
    }
}

impl From<std::num::TryFromIntError> for Error {
    #[inline]
    fn from(_src: std::num::TryFromIntError) -> Self {
        Error::ValueOutOfRange
    }
}
