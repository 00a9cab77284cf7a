use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError<E> {
    #[error("invocation failed: {0}")]
    Failed(E),
    /// The entry was removed or cleared without being completed.
    #[error("invocation abandoned")]
    Abandoned,
}

pub type InvocationResult<T, E> = Result<T, InvocationError<E>>;
