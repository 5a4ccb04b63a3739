use crate::container::ContainerID;
use crate::digest::Sha256Digest;

#[derive(Debug, serde::Serialize)]
pub struct Health {
    pub runtime_available: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct Resolved {
    pub container_id: ContainerID,
}

#[derive(Debug, serde::Deserialize)]
pub struct HashParams {
    pub path: String,
}

#[derive(Debug, serde::Serialize)]
pub struct PathHash {
    pub path: String,
    pub sha256: Sha256Digest,
}

#[derive(Debug, serde::Serialize)]
pub struct Username {
    pub uid: u32,
    pub username: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}
