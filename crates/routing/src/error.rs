/// Invalid flow registry. Raised while loading definitions, never at runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("flow #{index} has an empty id")]
    EmptyFlowId { index: usize },

    #[error("duplicate flow id '{id}'")]
    DuplicateFlowId { id: String },

    #[error("flow '{flow}' has a keyword that is empty after normalization")]
    EmptyKeyword { flow: String },

    #[error("more than one catch-all flow: '{first}' and '{second}'")]
    DuplicateCatchAll { first: String, second: String },

    #[error("flow '{flow}' sets the pending flag to '{target}', which is not a registered flow")]
    UnknownContinuation { flow: String, target: String },

    #[error("flow '{flow}' nests branches deeper than {max}")]
    BranchTooDeep { flow: String, max: usize },

    #[error("pending-flag key must not be empty")]
    EmptyPendingKey,
}

pub type RegistryConfigError = Error;

pub type Result<T> = std::result::Result<T, Error>;
