use std::path::{Path, PathBuf};
use std::{pin, task};

use hyper_util::rt::TokioIo;

/// A [`tower::Service`] that opens a fresh connection to a Unix domain socket
/// for every call, ignoring the requested URI.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl tower::Service<hyper::Uri> for UnixConnector {
    type Response = TokioIo<tokio::net::UnixStream>;

    type Error = std::io::Error;

    type Future = pin::Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: hyper::Uri) -> Self::Future {
        let path = self.path.clone();
        Box::pin(async move {
            log::trace!("Connecting to {}...", path.display());
            let stream = tokio::net::UnixStream::connect(&path).await?;
            log::trace!("Connected to {}.", path.display());

            Ok(TokioIo::new(stream))
        })
    }
}
