use anyhow::Context;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{
    ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, ORIGIN, PRAGMA, USER_AGENT,
};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The server admits only browser-looking clients; these headers are part
/// of its admission policy.
pub const BROWSER_ORIGIN: &str = "http://slither.io";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.141 Safari/537.36";

pub async fn connect(url: &str) -> anyhow::Result<WsStream> {
    let mut request = url.into_client_request().context("invalid server url")?;
    let headers = request.headers_mut();
    headers.insert(ORIGIN, HeaderValue::from_static(BROWSER_ORIGIN));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    let (stream, response) = connect_async(request)
        .await
        .context("websocket connect failed")?;
    tracing::info!(url, status = %response.status(), "connected");
    Ok(stream)
}

/// All sends funnel through one writer task so queued frames keep their
/// order on the wire while callers stay fire-and-forget.
pub fn spawn_writer(
    mut sink: SplitSink<WsStream, Message>,
) -> (mpsc::UnboundedSender<Vec<u8>>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Binary(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });
    (tx, task)
}
