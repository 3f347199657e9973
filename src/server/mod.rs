//! Preview server with live reload

use anyhow::{Context as _, Result};
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::commands::build::{self, BuildOptions};

/// Injected into served HTML; reloads on every rebuild and reconnects when
/// the server restarts
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function connect(delay) {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onopen = function() { delay = 250; };
    ws.onmessage = function(msg) {
        console.log('quire: ' + msg.data);
        location.reload();
    };
    ws.onclose = function() {
        setTimeout(function() { connect(Math.min(delay * 2, 5000)); }, delay);
    };
})(250);
</script>
"#;

struct ServerState {
    public_dir: PathBuf,
    /// Carries a one-line description of each rebuild
    rebuilds: broadcast::Sender<String>,
    live_reload: bool,
}

/// Start the preview server
///
/// Serves the public directory of a site that has already been built with
/// `options`. With `watch` on, content, layouts, static files and the
/// config are watched; every rebuild reloads connected browsers.
pub async fn start(
    base_dir: &Path,
    options: &BuildOptions,
    bind: &str,
    port: u16,
    watch: bool,
    open: bool,
) -> Result<()> {
    let quire = options.open(base_dir)?;

    let (rebuilds, _) = broadcast::channel::<String>(16);

    let state = Arc::new(ServerState {
        public_dir: quire.public_dir.clone(),
        rebuilds: rebuilds.clone(),
        live_reload: watch,
    });

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if bind == "localhost" { "127.0.0.1" } else { bind };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let url = format!("http://{}:{}/", bind, port);
    println!("Serving {} at {}", quire.config.title, url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        let base_dir = base_dir.to_path_buf();
        let options = options.clone();
        tokio::task::spawn_blocking(move || {
            let result = build::watch(&base_dir, &options, |summary| {
                println!("Rebuilt: {}", summary);
                // No receivers just means no browser is open
                let _ = rebuilds.send(summary.to_string());
            });
            if let Err(e) = result {
                tracing::error!("File watcher error: {:#}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let rebuilds = state.rebuilds.subscribe();
    ws.on_upgrade(move |socket| push_rebuilds(socket, rebuilds))
}

/// Forward rebuild notices to one browser until either side goes away
async fn push_rebuilds(mut socket: WebSocket, mut rebuilds: broadcast::Receiver<String>) {
    tracing::debug!("Live reload client connected");

    loop {
        let notice = tokio::select! {
            notice = rebuilds.recv() => notice,
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };

        let text = match notice {
            Ok(text) => text,
            // Several rebuilds were missed; one reload covers them all
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                format!("{} rebuilds", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Serves files from the public dir, injecting the live reload script into HTML
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let path = percent_decode_str(request.uri().path())
        .decode_utf8_lossy()
        .to_string();

    let Some(file_path) = resolve_file(&state.public_dir, &path) else {
        tracing::debug!("Not found: {}", path);
        return not_found(&state).await;
    };

    if is_html(&file_path) && state.live_reload {
        match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_live_reload(&content)).into_response(),
            Err(_) => not_found(&state).await,
        }
    } else {
        // Serve static file using tower-http
        let mut service = ServeDir::new(&state.public_dir).append_index_html_on_directories(true);
        match service.try_call(request).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        }
    }
}

/// The generated 404 page, or plain text when the site has none
async fn not_found(state: &ServerState) -> Response {
    match tokio::fs::read_to_string(state.public_dir.join("404.html")).await {
        Ok(content) => {
            let body = if state.live_reload {
                inject_live_reload(&content)
            } else {
                content
            };
            (StatusCode::NOT_FOUND, Html(body)).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// File under `public_dir` for a request path
///
/// Directories map to their `index.html`; `/about` also tries `about.html`.
/// Paths escaping the public dir resolve to nothing.
fn resolve_file(public_dir: &Path, path: &str) -> Option<PathBuf> {
    let clean_path = path.trim_start_matches('/');
    if Path::new(clean_path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let candidate = public_dir.join(clean_path);
    if candidate.is_dir() {
        let index = candidate.join("index.html");
        return index.is_file().then_some(index);
    }
    if candidate.is_file() {
        return Some(candidate);
    }

    let with_html = public_dir.join(format!("{}.html", clean_path.trim_end_matches('/')));
    with_html.is_file().then_some(with_html)
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "html" || ext == "htm")
        .unwrap_or(false)
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], LIVE_RELOAD_SCRIPT, &html[pos..]),
        // If no </body> tag, append to end
        None => format!("{}{}", html, LIVE_RELOAD_SCRIPT),
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
