use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid consensus config: {0}")]
    InvalidConfig(String),
}
