use stager_api::StagerError;

pub type TransferResult<T> = Result<T, TransferError>;

/// Everything that can make an upload fail. Nothing is retried internally; the caller decides.
#[derive(Debug, Clone)]
pub enum TransferError {
    /// Creating a scratch buffer or device resource failed
    AllocationFailure(StagerError),
    /// A write or copy range does not fit in the scratch buffer
    CapacityOverflow {
        required: u64,
        available: u64,
    },
    /// Every pooled scratch buffer is locked and the pool may not grow
    NoScratchBufferAvailable {
        requested: u64,
    },
    /// Beginning, recording or ending a command buffer failed
    CommandRecordingFailure(StagerError),
    /// The queue rejected the submission or waiting for it failed
    SubmissionFailure(StagerError),
    /// The host data does not match the layout of the destination
    InvalidRegion {
        expected: u64,
        actual: u64,
    },
    /// The transfer manager has been terminated
    NotUsable,
    Other(StagerError),
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            TransferError::AllocationFailure(ref e) => Some(e),
            TransferError::CapacityOverflow { .. } => None,
            TransferError::NoScratchBufferAvailable { .. } => None,
            TransferError::CommandRecordingFailure(ref e) => Some(e),
            TransferError::SubmissionFailure(ref e) => Some(e),
            TransferError::InvalidRegion { .. } => None,
            TransferError::NotUsable => None,
            TransferError::Other(ref e) => Some(e),
        }
    }
}

impl core::fmt::Display for TransferError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            TransferError::AllocationFailure(ref e) => write!(fmt, "allocation failed: {}", e),
            TransferError::CapacityOverflow {
                required,
                available,
            } => write!(
                fmt,
                "scratch buffer overflow: {} bytes required, {} bytes available",
                required, available
            ),
            TransferError::NoScratchBufferAvailable { requested } => write!(
                fmt,
                "no scratch buffer available for a {} byte transfer",
                requested
            ),
            TransferError::CommandRecordingFailure(ref e) => {
                write!(fmt, "command recording failed: {}", e)
            }
            TransferError::SubmissionFailure(ref e) => write!(fmt, "submission failed: {}", e),
            TransferError::InvalidRegion { expected, actual } => write!(
                fmt,
                "invalid region: expected {} bytes, got {} bytes",
                expected, actual
            ),
            TransferError::NotUsable => write!(fmt, "transfer manager is not usable"),
            TransferError::Other(ref e) => e.fmt(fmt),
        }
    }
}

impl From<StagerError> for TransferError {
    fn from(error: StagerError) -> Self {
        TransferError::Other(error)
    }
}

impl From<&str> for TransferError {
    fn from(str: &str) -> Self {
        StagerError::StringError(str.to_string()).into()
    }
}

impl From<String> for TransferError {
    fn from(string: String) -> Self {
        StagerError::StringError(string).into()
    }
}
