use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("this supervisor has already run its scenario")]
    AlreadyRun,

    #[error("failed to start the candidate thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to build the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
