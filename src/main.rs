//! Raid Relay - Binary Entry Point
//!
//! Wires the updater, the HTTP and TCP surfaces, the history log and the
//! map renderer around one update topic, then runs until a signal arrives
//! or a task fails.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use raid_relay::api::{self, ApiKeys, AppState};
use raid_relay::feed::TelegramChannel;
use raid_relay::history::HistoryLog;
use raid_relay::map::MapRenderer;
use raid_relay::persistence::StateStore;
use raid_relay::pubsub::{filter_all, Topic};
use raid_relay::tcp::TcpServer;
use raid_relay::types::{SharedState, Update};
use raid_relay::{AppError, Settings, Shutdown, Updater};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level())),
        )
        .with_target(true)
        .init();

    info!(
        name = raid_relay::NAME,
        version = raid_relay::VERSION,
        channel = %settings.telegram_channel,
        timezone = %settings.timezone,
        api_keys = settings.api_keys.len(),
        backlog_size = settings.backlog_size,
        http_port = settings.http_port,
        tcp_port = settings.tcp_port,
        data_dir = %settings.data_dir.display(),
        "settings loaded"
    );

    let store = StateStore::new(settings.state_path());
    let state: SharedState = Arc::new(RwLock::new(store.load()?));
    let updates: Arc<Topic<Update>> = Arc::new(Topic::new());
    let shutdown = Shutdown::new();
    let api_keys = ApiKeys::new(settings.api_keys.iter().cloned());

    let history = Arc::new(HistoryLog::open(settings.history_path())?);
    let map = Arc::new(MapRenderer::new(Arc::clone(&state)));

    // Collaborators subscribe before the updater starts so they see the backlog replay
    let history_events = updates.subscribe("history", filter_all).await;
    let map_events = updates
        .subscribe("mapgenerator", |u: &Update| u.matches_live(0))
        .await;

    let feed = TelegramChannel::new(settings.telegram_channel.clone(), shutdown.clone())?;
    let updater = Arc::new(Updater::new(
        feed,
        settings.timezone,
        settings.backlog_size,
        Arc::clone(&state),
        Arc::clone(&updates),
    ));

    let app_state = Arc::new(AppState::new(
        Arc::clone(&state),
        Arc::clone(&updates),
        api_keys.clone(),
        Arc::clone(&history),
        Arc::clone(&map),
        shutdown.clone(),
    ));
    let tcp_server = Arc::new(TcpServer::new(
        Arc::clone(&state),
        Arc::clone(&updates),
        api_keys,
        shutdown.clone(),
    ));

    let (errors, mut first_error) = mpsc::channel::<AppError>(8);
    let mut tasks = JoinSet::new();

    {
        let shutdown = shutdown.clone();
        spawn_task(&mut tasks, &errors, async move { updater.run(shutdown).await });
    }
    {
        let shutdown = shutdown.clone();
        spawn_task(&mut tasks, &errors, async move {
            history.run(history_events, shutdown).await
        });
    }
    {
        let shutdown = shutdown.clone();
        spawn_task(&mut tasks, &errors, async move {
            map.run(map_events, shutdown).await;
            Ok::<(), AppError>(())
        });
    }
    spawn_task(
        &mut tasks,
        &errors,
        api::serve(app_state, SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.http_port))),
    );
    spawn_task(
        &mut tasks,
        &errors,
        tcp_server.serve(SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.tcp_port))),
    );
    drop(errors);

    let failure = tokio::select! {
        _ = wait_for_signal() => {
            warn!("main: got signal, shutting down");
            None
        }
        Some(err) = first_error.recv() => {
            error!("main: {err}");
            warn!("main: child task crashed, shutting down");
            Some(err)
        }
    };

    shutdown.cancel();
    while tasks.join_next().await.is_some() {}
    while let Ok(err) = first_error.try_recv() {
        error!("main: {err}");
    }

    warn!(path = %store.path().display(), "main: saving state");
    let saved = store.save(&state.read());

    match (failure, saved) {
        (Some(err), _) => Err(err),
        (None, Err(err)) => Err(err.into()),
        (None, Ok(())) => {
            info!("main: bye");
            Ok(())
        }
    }
}

/// Run `task`, forwarding its error (if any) to the supervisor
fn spawn_task<F, E>(tasks: &mut JoinSet<()>, errors: &mpsc::Sender<AppError>, task: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    let errors = errors.clone();
    tasks.spawn(async move {
        if let Err(err) = task.await {
            let _ = errors.send(err.into()).await;
        }
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("main: install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
