use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no context set on the engine")]
    NoContext,

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("balance error: {0}")]
    Balance(#[from] BalanceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Balance-update failures raised by the world-state helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("balance not enough")]
    NotEnough,
}

/// Pre-execution rejection reasons set during prepare. Each maps to a
/// `status_str` on the FAIL receipt of the rejected transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error("invalid-signature")]
    InvalidSignature,

    #[error("invalid-gas-price")]
    InvalidGasPrice,

    #[error("invalid-gas-limit")]
    InvalidGasLimit,

    #[error("non-existent-account")]
    NonExistentAccount,

    #[error("incorrect-nonce")]
    IncorrectNonce,

    #[error("insufficient-balance-for-gas")]
    InsufficientBalanceForGas,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_error_tags() {
        assert_eq!(
            PrepareError::InsufficientBalanceForGas.to_string(),
            "insufficient-balance-for-gas"
        );
        assert_eq!(PrepareError::IncorrectNonce.to_string(), "incorrect-nonce");
    }

    #[test]
    fn test_balance_error_message() {
        assert_eq!(BalanceError::NotEnough.to_string(), "balance not enough");
    }
}
