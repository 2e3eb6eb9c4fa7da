//! Loopback HTTP server receiving the OAuth2 redirect.

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{DriveError, Result};

/// Parameters carried by the authorization server's redirect.
#[derive(Debug, PartialEq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Listens on an ephemeral loopback port until the browser is redirected
/// back with an authorization code.
pub struct LocalCallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LocalCallbackServer {
    /// Binds `127.0.0.1` on a port chosen by the OS.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        debug!("OAuth callback server listening on {}", addr);
        Ok(Self { listener, addr })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Serves connections until one request carries a `code` parameter.
    ///
    /// Requests without a code (favicon fetches) get a not-found page and the
    /// server keeps waiting. A provider-reported `error`, such as denied
    /// consent, ends the flow.
    pub async fn wait_for_callback(self) -> Result<CallbackParams> {
        let (tx, mut rx) = mpsc::channel::<std::result::Result<CallbackParams, String>>(1);

        loop {
            tokio::select! {
                Some(outcome) = rx.recv() => {
                    return match outcome {
                        Ok(params) => {
                            info!("Received OAuth callback with authorization code");
                            Ok(params)
                        }
                        Err(reason) => Err(DriveError::AuthenticationError(reason)),
                    };
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!("Callback connection from {}", peer);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Incoming>| {
                            let tx = tx.clone();
                            async move { Ok::<_, Infallible>(handle_request(req, &tx).await) }
                        });
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            warn!("Callback server connection error: {}", e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    tx: &mpsc::Sender<std::result::Result<CallbackParams, String>>,
) -> Response<Full<Bytes>> {
    let uri = req.uri().to_string();
    debug!("Callback server received request: {}", uri);

    match parse_callback(&uri) {
        Some(Ok(params)) => {
            let _ = tx.send(Ok(params)).await;
            html_response(StatusCode::OK, success_html())
        }
        Some(Err(reason)) => {
            let _ = tx.send(Err(reason)).await;
            html_response(
                StatusCode::BAD_REQUEST,
                error_html("Access to Google Drive was not granted"),
            )
        }
        None => html_response(
            StatusCode::NOT_FOUND,
            error_html("Missing authorization code in callback"),
        ),
    }
}

fn html_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// `Some(Ok)` for a code, `Some(Err)` for a provider-reported error, `None`
/// for anything else.
fn parse_callback(uri: &str) -> Option<std::result::Result<CallbackParams, String>> {
    let url = url::Url::parse(&format!("http://localhost{}", uri)).ok()?;
    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(format!("authorization server returned \"{}\"", error)));
    }

    Some(Ok(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    }))
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>drive_mirror - Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>Google Drive access was granted. You can close this window.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>drive_mirror - Authentication Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Error</h1>
    <p>{}</p>
</body>
</html>"#,
        message
    )
}
