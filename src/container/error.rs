#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id: `{0}`")]
    InvalidContainerID(String),
    #[error("invalid image id: `{0}`")]
    InvalidImageID(String),
}
pub type Result<T> = std::result::Result<T, Error>;
