//! Conversation runner
//!
//! Runs the conversation, publishes its report to the HTTP state and keeps
//! the process serving the finished conversation for a while.

use std::future::Future;
use std::time::Duration;

use voice_duet_agent::{EndReason, LifecycleController, Result, RunReport};

use crate::state::AppState;

/// Run to an end condition, store the report, then linger
///
/// After a finished run this waits for `linger` or `shutdown`, whichever
/// comes first, so `/api/conversation` can still be read. A cancelled run
/// or a zero `linger` returns at once.
pub async fn run_conversation<F>(
    controller: &LifecycleController,
    state: &AppState,
    shutdown: F,
    linger: Duration,
) -> Result<RunReport>
where
    F: Future<Output = ()>,
{
    let mut shutdown = std::pin::pin!(shutdown);

    let report = controller.run_until(shutdown.as_mut()).await?;
    state.set_report(report.clone());

    if report.end_reason != EndReason::Cancelled && !linger.is_zero() {
        tracing::info!(
            linger_secs = linger.as_secs(),
            "Conversation finished, serving it until shutdown"
        );
        tokio::select! {
            _ = shutdown => {}
            _ = tokio::time::sleep(linger) => {}
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    use voice_duet_agent::RunConfig;
    use voice_duet_config::Settings;
    use voice_duet_transport::SimulatedConnector;

    use crate::http::create_router;
    use crate::presentation::BroadcastSurface;

    fn controller(surface: Arc<BroadcastSurface>) -> LifecycleController {
        let mut config = RunConfig::from_settings(&Settings::default());
        config.max_turns = 2;
        config.inter_turn_delay = Duration::from_millis(1);
        config.ready_timeout = Duration::from_secs(1);
        config.run_timeout = Duration::from_secs(10);
        config.intro_duration = Duration::ZERO;
        let connector = SimulatedConnector::new().with_frame_interval(Duration::ZERO);
        LifecycleController::new(config, Arc::new(connector), surface)
    }

    fn app_state(controller: &LifecycleController, surface: Arc<BroadcastSurface>) -> AppState {
        AppState::new(Settings::default(), surface, controller.subscribe_phase())
    }

    async fn get_json(addr: std::net::SocketAddr, path: &str) -> serde_json::Value {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_report_served_after_run() {
        let surface = Arc::new(BroadcastSurface::new(64));
        let controller = controller(surface.clone());
        let state = app_state(&controller, surface);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shutdown = async {
            let _ = stop_rx.await;
        };

        let client = async {
            // the run lingers, so the finished report is reachable
            let mut body = serde_json::Value::Null;
            for _ in 0..200 {
                body = get_json(addr, "/api/conversation").await;
                if !body["report"].is_null() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let _ = stop_tx.send(());
            body
        };

        let (outcome, body) = tokio::join!(
            run_conversation(&controller, &state, shutdown, Duration::from_secs(30)),
            client
        );
        server.abort();

        let report = outcome.unwrap();
        assert_eq!(report.end_reason, EndReason::TurnLimit);
        assert_eq!(body["phase"], "closed");
        assert_eq!(body["report"]["end_reason"], "turn_limit");
        assert_eq!(body["report"]["turns_taken"], 2);
        assert_eq!(body["report"]["log"]["turns"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_linger_ends_without_shutdown() {
        let surface = Arc::new(BroadcastSurface::new(64));
        let controller = controller(surface.clone());
        let state = app_state(&controller, surface);

        let started = tokio::time::Instant::now();
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            run_conversation(&controller, &state, std::future::pending::<()>(), Duration::from_millis(200)),
        )
        .await
        .expect("linger did not end")
        .unwrap();

        assert_eq!(report.end_reason, EndReason::TurnLimit);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(state.report().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_run_does_not_linger() {
        let surface = Arc::new(BroadcastSurface::new(64));
        let controller = controller(surface.clone());
        let state = app_state(&controller, surface);

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            run_conversation(&controller, &state, async {}, Duration::from_secs(3600)),
        )
        .await
        .expect("cancelled run lingered")
        .unwrap();

        assert_eq!(report.end_reason, EndReason::Cancelled);
        assert_eq!(state.report().map(|r| r.end_reason), Some(EndReason::Cancelled));
    }
}
