use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tower::ServiceExt;

use crate::container::ContainerID;
use crate::transport::UnixConnector;

use super::{
    ArchiveStream, ContainerDetail, ContainerRuntime, ContainerSummary, Error, ImageDetail,
    ImageSummary, ObjectKind, PathStat, Result, RuntimeKind,
};

/// Newest Engine API version whose responses this client decodes.
const MAX_API_VERSION: ApiVersion = ApiVersion {
    major: 1,
    minor: 47,
};
/// Response header of `/_ping` naming the daemon's own API version.
const API_VERSION_HEADER: &str = "api-version";
/// Response header carrying base64-encoded JSON stat info of an archived path.
const PATH_STAT_HEADER: &str = "x-docker-container-path-stat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ApiVersion {
    major: u32,
    minor: u32,
}

impl ApiVersion {
    fn parse(raw: &str) -> Option<Self> {
        let (major, minor) = raw.trim().split_once('.')?;
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

/// Returns the path prefix for requests to a daemon advertising `advertised`.
///
/// The older of the two versions wins. A daemon that advertises nothing
/// usable gets unversioned paths and answers in its own default version.
fn negotiate(advertised: Option<&str>) -> String {
    match advertised.and_then(ApiVersion::parse) {
        Some(version) => {
            let version = version.min(MAX_API_VERSION);
            format!("/v{}.{}", version.major, version.minor)
        }
        None => String::new(),
    }
}

/// [`ContainerRuntime`] backed by the Docker Engine API on a Unix socket.
///
/// Each request opens its own connection. The API version is negotiated
/// against `/_ping` on first use and shared by all clones.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    connector: UnixConnector,
    version: Arc<OnceCell<String>>,
}

impl DockerRuntime {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            connector: UnixConnector::new(socket_path),
            version: Arc::new(OnceCell::new()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        self.connector.path()
    }

    /// Path prefix of the negotiated API version. A failed negotiation is
    /// retried by the next call.
    async fn api_prefix(&self) -> Result<&str> {
        self.version
            .get_or_try_init(|| async {
                let response = self.send_raw(Method::GET, "/_ping").await?;
                let advertised = response
                    .headers()
                    .get(API_VERSION_HEADER)
                    .and_then(|value| value.to_str().ok());
                let prefix = negotiate(advertised);
                log::debug!(
                    "daemon advertises API version {advertised:?}, using prefix `{prefix}`"
                );
                Ok::<_, Error>(prefix)
            })
            .await
            .map(String::as_str)
    }

    async fn send(&self, method: Method, endpoint: &str) -> Result<Response<Incoming>> {
        let prefix = self.api_prefix().await?;
        self.send_raw(method, &format!("{prefix}{endpoint}")).await
    }

    async fn send_raw(&self, method: Method, endpoint: &str) -> Result<Response<Incoming>> {
        let request = Request::builder()
            .method(method)
            .uri(endpoint)
            .header(hyper::header::HOST, "docker")
            .body(Empty::<Bytes>::new())
            .map_err(|source| Error::Request {
                endpoint: endpoint.to_owned(),
                source,
            })?;

        let io = self
            .connector
            .clone()
            .oneshot(request.uri().clone())
            .await
            .map_err(|source| Error::Unavailable {
                path: self.socket_path().to_path_buf(),
                source,
            })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.to_owned(),
                source,
            })?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::debug!("runtime connection closed with error: {err}");
            }
        });

        log::trace!("{} {}", request.method(), endpoint);
        sender
            .send_request(request)
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.to_owned(),
                source,
            })
    }

    /// Sends a request and turns non-success statuses into errors.
    ///
    /// A 404 is reported as [`Error::NotFound`] for `(kind, id)`, unless the
    /// daemon says the owning `container` itself is missing.
    async fn send_checked(
        &self,
        method: Method,
        endpoint: &str,
        (kind, id): (ObjectKind, &str),
        container: Option<&ContainerID>,
    ) -> Result<Response<Incoming>> {
        let response = self.send(method, endpoint).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        let message = error_message(&body, status);

        if status == StatusCode::NOT_FOUND {
            let (kind, id) = match container {
                Some(container) if message.starts_with("No such container") => {
                    (ObjectKind::Container, container.as_str())
                }
                _ => (kind, id),
            };
            return Err(Error::NotFound {
                kind,
                id: id.to_owned(),
            });
        }

        Err(Error::Api {
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        kind: ObjectKind,
        id: &str,
    ) -> Result<T> {
        let response = self
            .send_checked(Method::GET, endpoint, (kind, id), None)
            .await?;
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.to_owned(),
                source,
            })?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            endpoint: endpoint.to_owned(),
            source,
        })
    }
}

impl ContainerRuntime for DockerRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Docker
    }

    async fn ping(&self) -> Result<()> {
        self.send_checked(Method::GET, "/_ping", (ObjectKind::Container, ""), None)
            .await
            .map(|_| ())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.get_json("/containers/json", ObjectKind::Container, "")
            .await
    }

    async fn inspect_container(&self, id: &ContainerID) -> Result<ContainerDetail> {
        self.get_json(
            &format!("/containers/{id}/json"),
            ObjectKind::Container,
            id.as_str(),
        )
        .await
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.get_json("/images/json", ObjectKind::Image, "").await
    }

    async fn inspect_image(&self, id: &str) -> Result<ImageDetail> {
        self.get_json(&format!("/images/{id}/json"), ObjectKind::Image, id)
            .await
    }

    async fn stat_path(&self, id: &ContainerID, path: &str) -> Result<PathStat> {
        let endpoint = archive_endpoint(id, path);
        match self
            .send_checked(Method::HEAD, &endpoint, (ObjectKind::Path, path), Some(id))
            .await
        {
            Ok(response) => path_stat_from_headers(response.headers(), path),
            // a HEAD 404 has no body naming what is missing
            Err(Error::NotFound {
                kind: ObjectKind::Path,
                id: missing,
            }) => {
                self.inspect_container(id).await?;
                Err(Error::NotFound {
                    kind: ObjectKind::Path,
                    id: missing,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn copy_from_container(
        &self,
        id: &ContainerID,
        path: &str,
    ) -> Result<(ArchiveStream, PathStat)> {
        let endpoint = archive_endpoint(id, path);
        let response = self
            .send_checked(Method::GET, &endpoint, (ObjectKind::Path, path), Some(id))
            .await?;

        let stat = path_stat_from_headers(response.headers(), path)?;
        let stream = response
            .into_body()
            .into_data_stream()
            .map_err(std::io::Error::other);

        Ok((Box::pin(stream), stat))
    }

    async fn start_container(&self, id: &ContainerID) -> Result<()> {
        let endpoint = format!("/containers/{id}/start");
        match self
            .send_checked(
                Method::POST,
                &endpoint,
                (ObjectKind::Container, id.as_str()),
                None,
            )
            .await
        {
            Ok(_) => Ok(()),
            // already started
            Err(Error::Api { status: 304, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

fn archive_endpoint(id: &ContainerID, path: &str) -> String {
    format!("/containers/{id}/archive?path={}", urlencoding::encode(path))
}

fn path_stat_from_headers(headers: &HeaderMap, path: &str) -> Result<PathStat> {
    headers
        .get(PATH_STAT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_path_stat)
        .ok_or_else(|| Error::PathStat {
            path: path.to_owned(),
        })
}

fn decode_path_stat(raw: &str) -> Option<PathStat> {
    let json = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .ok()?;
    serde_json::from_slice(&json).ok()
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

/// Extracts the daemon's error message, falling back to the raw body or the
/// status reason.
fn error_message(body: &[u8], status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.message;
    }

    let text = String::from_utf8_lossy(body).trim().to_owned();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_owned()
    } else {
        text
    }
}

/// Returns the default socket path of the Docker daemon.
pub(crate) fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/docker.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    /// Accepts one connection per entry of `responses`, records each request
    /// head and answers with the response verbatim.
    fn serve(listener: UnixListener, responses: Vec<String>) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
                requests.push(String::from_utf8(request).unwrap());
            }
            requests
        })
    }

    fn http_response(status: &str, headers: &[(&str, String)], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {status}\r\ncontent-length: {}\r\n", body.len());
        for (name, value) in headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        out.push_str(body);
        out
    }

    fn ping_response(version: &str) -> String {
        http_response("200 OK", &[("Api-Version", version.to_owned())], "OK")
    }

    fn socket() -> (tempfile::TempDir, PathBuf, UnixListener) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();
        (dir, path, listener)
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(negotiate(Some("1.52")), "/v1.47");
        assert_eq!(negotiate(Some("1.44")), "/v1.44");
        assert_eq!(negotiate(Some("2.0")), "/v1.47");
        assert_eq!(negotiate(Some("1.9")), "/v1.9");
        assert_eq!(negotiate(Some("latest")), "");
        assert_eq!(negotiate(None), "");
    }

    #[test]
    fn test_decode_path_stat() {
        let json = r#"{"name":"passwd","size":926,"mode":420,"mtime":"2024-01-01T00:00:00Z","linkTarget":""}"#;
        let raw = base64::engine::general_purpose::STANDARD.encode(json);

        let stat = decode_path_stat(&raw).unwrap();
        assert_eq!(stat.name, "passwd");
        assert_eq!(stat.size, 926);
        assert!(!stat.is_dir());
    }

    #[test]
    fn test_decode_path_stat_rejects_garbage() {
        assert!(decode_path_stat("not base64!").is_none());
        let raw = base64::engine::general_purpose::STANDARD.encode("not json");
        assert!(decode_path_stat(&raw).is_none());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(br#"{"message":"No such container: abc"}"#, StatusCode::NOT_FOUND),
            "No such container: abc"
        );
        assert_eq!(
            error_message(b"page not found\n", StatusCode::NOT_FOUND),
            "page not found"
        );
        assert_eq!(error_message(b"", StatusCode::NOT_FOUND), "Not Found");
    }

    #[test]
    fn test_archive_endpoint_encodes_path() {
        let id = ContainerID::new("abc").unwrap();
        assert_eq!(
            archive_endpoint(&id, "/etc/my file"),
            "/containers/abc/archive?path=%2Fetc%2Fmy%20file"
        );
    }

    #[tokio::test]
    async fn test_unreachable_socket_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = DockerRuntime::new(dir.path().join("docker.sock"));

        let err = runtime.ping().await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_inspect_container_over_socket() {
        let (_dir, path, listener) = socket();
        let body = r#"{"Id":"abc","Name":"/web","State":{"Pid":77,"Running":true}}"#;
        let server = serve(
            listener,
            vec![ping_response("1.52"), http_response("200 OK", &[], body)],
        );

        let runtime = DockerRuntime::new(&path);
        let detail = runtime
            .inspect_container(&ContainerID::new("abc").unwrap())
            .await
            .unwrap();
        assert_eq!(detail.id, "abc");
        assert_eq!(detail.state.pid, 77);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /_ping HTTP/1.1\r\n"));
        assert!(requests[1].starts_with("GET /v1.47/containers/abc/json HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_version_is_negotiated_once_per_client() {
        let (_dir, path, listener) = socket();
        let server = serve(
            listener,
            vec![
                ping_response("1.44"),
                http_response("200 OK", &[], "[]"),
                http_response("200 OK", &[], "[]"),
            ],
        );

        let runtime = DockerRuntime::new(&path);
        assert!(runtime.list_containers().await.unwrap().is_empty());
        assert!(runtime.clone().list_images().await.unwrap().is_empty());

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].starts_with("GET /v1.44/containers/json HTTP/1.1\r\n"));
        assert!(requests[2].starts_with("GET /v1.44/images/json HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_unadvertised_version_uses_unversioned_paths() {
        let (_dir, path, listener) = socket();
        let server = serve(
            listener,
            vec![
                http_response("200 OK", &[], "OK"),
                http_response("200 OK", &[], "[]"),
            ],
        );

        let runtime = DockerRuntime::new(&path);
        runtime.list_containers().await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests[1].starts_with("GET /containers/json HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_missing_container_is_not_found() {
        let (_dir, path, listener) = socket();
        let body = r#"{"message":"No such container: abc"}"#;
        let _server = serve(
            listener,
            vec![ping_response("1.47"), http_response("404 Not Found", &[], body)],
        );

        let runtime = DockerRuntime::new(&path);
        let err = runtime
            .inspect_container(&ContainerID::new("abc").unwrap())
            .await
            .unwrap_err();
        match err {
            Error::NotFound { kind, id } => {
                assert_eq!(kind, ObjectKind::Container);
                assert_eq!(id, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stat_path_of_missing_container_names_the_container() {
        let (_dir, path, listener) = socket();
        let body = r#"{"message":"No such container: abc"}"#;
        let server = serve(
            listener,
            vec![
                ping_response("1.47"),
                http_response("404 Not Found", &[], ""),
                http_response("404 Not Found", &[], body),
            ],
        );

        let runtime = DockerRuntime::new(&path);
        let err = runtime
            .stat_path(&ContainerID::new("abc").unwrap(), "/etc/passwd")
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::NotFound { kind: ObjectKind::Container, ref id } if id == "abc"),
            "got {err:?}"
        );

        let requests = server.await.unwrap();
        assert!(requests[1].starts_with("HEAD /v1.47/containers/abc/archive?path="));
        assert!(requests[2].starts_with("GET /v1.47/containers/abc/json "));
    }

    #[tokio::test]
    async fn test_stat_path_of_missing_path_names_the_path() {
        let (_dir, path, listener) = socket();
        let body = r#"{"Id":"abc","Name":"/web","State":{"Pid":77,"Running":true}}"#;
        let _server = serve(
            listener,
            vec![
                ping_response("1.47"),
                http_response("404 Not Found", &[], ""),
                http_response("200 OK", &[], body),
            ],
        );

        let runtime = DockerRuntime::new(&path);
        let err = runtime
            .stat_path(&ContainerID::new("abc").unwrap(), "/nope")
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::NotFound { kind: ObjectKind::Path, ref id } if id == "/nope"),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let (_dir, path, listener) = socket();
        let body = r#"{"message":"boom"}"#;
        let _server = serve(
            listener,
            vec![
                ping_response("1.47"),
                http_response("500 Internal Server Error", &[], body),
            ],
        );

        let runtime = DockerRuntime::new(&path);
        let err = runtime.list_containers().await.unwrap_err();
        match err {
            Error::Api {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_copy_from_container_streams_body() {
        let (_dir, path, listener) = socket();
        let stat = base64::engine::general_purpose::STANDARD.encode(
            r#"{"name":"hostname","size":4,"mode":420,"mtime":"","linkTarget":""}"#,
        );
        let _server = serve(
            listener,
            vec![
                ping_response("1.47"),
                http_response("200 OK", &[("X-Docker-Container-Path-Stat", stat)], "tar!"),
            ],
        );

        let runtime = DockerRuntime::new(&path);
        let (stream, stat) = runtime
            .copy_from_container(&ContainerID::new("abc").unwrap(), "/etc/hostname")
            .await
            .unwrap();
        assert_eq!(stat.name, "hostname");

        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"tar!");
    }
}
