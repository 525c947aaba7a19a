use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};

const CALLBACK_PATH: &str = "/oauth2callback";

/// Upper bound on the request head we are willing to read.
const MAX_REQUEST_BYTES: u64 = 8 * 1024;

/// How long a single connection may take to send its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "<html><body>\
     <h1>Authentication successful!</h1>\
     <p>You can close this window and return to the terminal.</p>\
     </body></html>";

/// One-shot local HTTP endpoint receiving the OAuth redirect.
///
/// Consumed by [`AuthorizationListener::await_code`]: once a terminal
/// redirect has been answered the socket is closed.
pub struct AuthorizationListener {
    listener: TcpListener,
}

impl AuthorizationListener {
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| Error::Network(format!("could not listen on port {port}: {e}")))?;
        tracing::debug!(port, "listening for OAuth callback");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Network(e.to_string()))
    }

    /// Wait for the redirect and return the authorization code.
    ///
    /// `expected_state` is compared to the `state` parameter when given.
    /// `timeout` of `None` waits until a redirect arrives or `cancel` fires.
    pub async fn await_code(
        self,
        expected_state: Option<&str>,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let wait = self.accept_callback(expected_state);

        tokio::select! {
            result = wait => result,
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = sleep_or_forever(timeout) => {
                Err(Error::Timeout(timeout.unwrap_or_default()))
            }
        }
    }

    async fn accept_callback(&self, expected_state: Option<&str>) -> Result<String> {
        // Browsers open speculative connections that may never send a request,
        // so every connection is read on its own task.
        let mut pending = JoinSet::new();

        loop {
            let (mut stream, target) = tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted.map_err(|e| {
                        Error::Network(format!("OAuth callback listener failed: {e}"))
                    })?;
                    tracing::debug!(%addr, "incoming connection");
                    pending.spawn(read_request(stream));
                    continue;
                }
                Some(joined) = pending.join_next() => match joined {
                    Ok((stream, Some(target))) => (stream, target),
                    _ => continue,
                },
            };

            // Ignore non-callback requests (favicon, etc.)
            if !is_callback(&target) {
                let resp = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
                let _ = stream.write_all(resp.as_bytes()).await;
                continue;
            }

            return match callback_outcome(&target, expected_state) {
                Ok(code) => {
                    send_html(&mut stream, 200, SUCCESS_PAGE).await;
                    Ok(code)
                }
                Err(reason) => {
                    let body = format!(
                        "<html><body><h1>Authentication failed</h1><p>{}</p></body></html>",
                        html_escape(&reason)
                    );
                    send_html(&mut stream, 400, &body).await;
                    Err(Error::AuthorizationDenied(reason))
                }
            };
        }
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// Read one request head, giving up on connections that stall.
async fn read_request(mut stream: TcpStream) -> (TcpStream, Option<String>) {
    let target = tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut stream))
        .await
        .unwrap_or_else(|_| {
            tracing::debug!("connection sent no request in time");
            None
        });
    (stream, target)
}

/// Read the request line and return its target (`/path?query`).
///
/// The rest of the head is drained so closing the socket does not reset
/// the response.
async fn read_request_target(stream: &mut TcpStream) -> Option<String> {
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_BYTES));

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    if !request_line.ends_with('\n') {
        return None;
    }

    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim_end().is_empty() => break,
            Ok(_) => {}
        }
    }

    request_line.split_whitespace().nth(1).map(str::to_string)
}

fn is_callback(target: &str) -> bool {
    target.starts_with(CALLBACK_PATH) || target.starts_with("/?")
}

/// Decide what a callback request means: the code, or why there is none.
fn callback_outcome(target: &str, expected_state: Option<&str>) -> std::result::Result<String, String> {
    let url = Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| format!("malformed callback URL: {e}"))?;
    let params: HashMap<_, _> = url.query_pairs().collect();

    if let Some(error) = params.get("error") {
        let desc = params
            .get("error_description")
            .map(|s| s.as_ref())
            .unwrap_or("no details");
        return Err(format!("{error}: {desc}"));
    }

    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        return Err("no authorization code received".into());
    };

    if let Some(expected) = expected_state {
        let received = params.get("state").map(|s| s.as_ref()).unwrap_or("");
        if received != expected {
            return Err("OAuth state mismatch".into());
        }
    }

    Ok(code.to_string())
}

async fn send_html(stream: &mut (impl AsyncWriteExt + Unpin), status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        _ => "Unknown",
    };
    let resp = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n\
         {body}",
        body.len()
    );
    let _ = stream.write_all(resp.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
