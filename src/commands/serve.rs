use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

use crate::{
    ServeArgs,
    build::{BuildResult, Builder, FileWatcher, WatchEvent, WatchPaths},
    build::pipeline::stages::LIVE_RELOAD_PATH,
    config::{Config, StageConfig, base_path_from_config},
};

/// SSE handler for live reload notifications.
async fn live_reload_handler(
    State(tx): State<broadcast::Sender<()>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = tx.subscribe();
    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(_) => {
                    yield Ok(Event::default().event("reload").data("reload"));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Several rebuilds since the last send; one reload covers them
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn run(
    args: &ServeArgs,
    config: Config,
    config_path: PathBuf,
) -> Result<(), anyhow::Error> {
    let base_path = base_path_from_config(&config_path);

    // Create broadcast channel for live reload
    let (reload_tx, _) = broadcast::channel::<()>(16);

    // The first build must succeed; there is nothing to serve otherwise
    let result = do_build(&config, &base_path).await?;
    println!(
        "Built {} file(s) in {}ms",
        result.files,
        result.elapsed.as_millis()
    );

    let _watcher_handle = if args.no_watch {
        None
    } else {
        let builder = Builder::new(config.clone(), base_path.clone());
        let asset_dirs = config
            .stages()
            .iter()
            .filter_map(|stage| match stage {
                StageConfig::Assets(assets) => {
                    Some(canonical(&config.resolve_path(&base_path, &assets.source)))
                }
                _ => None,
            })
            .collect();
        let watch_paths = WatchPaths {
            source_dir: canonical(&builder.source_dir()),
            asset_dirs,
            config_path: canonical(&config_path),
            output_dir: canonical(&result.output_dir),
        };

        match FileWatcher::new(&config.dev.watch, &watch_paths) {
            Ok(watcher) => {
                println!("Watching {} for changes...", watch_paths.source_dir.display());
                let runtime = tokio::runtime::Handle::current();
                let watcher_reload_tx = reload_tx.clone();
                let mut rebuild_config = config.clone();

                Some(tokio::task::spawn_blocking(move || {
                    while let Some(event) = watcher.recv() {
                        let changed = match &event {
                            WatchEvent::FilesChanged(changes) => changes.len(),
                            WatchEvent::Error(e) => {
                                tracing::error!(error = %e, "file watcher error");
                                continue;
                            }
                        };
                        println!("\nDetected {} change(s), rebuilding...", changed);

                        if event.touches_config() {
                            match Config::load_from_file(&config_path) {
                                Ok(reloaded) => rebuild_config = reloaded,
                                Err(e) => {
                                    eprintln!("Config error, keeping the previous config: {e}");
                                }
                            }
                        }

                        match runtime.block_on(do_build(&rebuild_config, &base_path)) {
                            Ok(result) => {
                                println!(
                                    "Rebuilt {} file(s) in {}ms",
                                    result.files,
                                    result.elapsed.as_millis()
                                );
                                // Notify connected browsers to reload
                                let _ = watcher_reload_tx.send(());
                            }
                            Err(e) => {
                                eprintln!("Build error, still serving the previous build: {e:#}");
                            }
                        }
                    }
                }))
            }
            Err(e) => {
                eprintln!("Warning: Failed to start file watcher: {}", e);
                None
            }
        }
    };

    // Create the static file server
    let serve_dir = ServeDir::new(&result.output_dir).append_index_html_on_directories(true);

    // Build router with SSE endpoint for live reload
    let app = Router::new()
        .route(LIVE_RELOAD_PATH, get(live_reload_handler))
        .with_state(reload_tx)
        .fallback_service(serve_dir);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;

    let display_host = if args.bind == "0.0.0.0" {
        "localhost"
    } else {
        &args.bind
    };
    let url = format!("http://{}:{}", display_host, args.port);

    println!("\nServing site at {}", url);
    println!("Press Ctrl+C to stop\n");

    if args.open
        && let Err(e) = open::that(&url)
    {
        eprintln!("Failed to open browser: {}", e);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Canonicalize a path so it matches the paths in file events.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

async fn do_build(config: &Config, base_path: &Path) -> Result<BuildResult, anyhow::Error> {
    let builder = Builder::new(config.clone(), base_path.to_path_buf())
        .with_live_reload(config.dev.live_reload);
    Ok(builder.build().await?)
}
