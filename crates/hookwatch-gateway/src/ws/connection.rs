use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use hookwatch_history::Outbound;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::ws::message;

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    serve_viewer(sink, stream, state).await;
}

/// Per-viewer event loop, lives for the entire WS session.
///
/// The hub only ever `try_send`s into this viewer's queue; history replies
/// are assembled and every socket write happens here, so a stalled socket
/// slows down nobody else.
async fn serve_viewer<S, R, E>(mut sink: S, mut stream: R, state: Arc<AppState>)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let viewer_cfg = &state.config.viewer;
    let (tx, mut outbound) = mpsc::channel::<Outbound>(viewer_cfg.queue_capacity.max(1));
    let viewer = state.hub.connect(tx);

    // ping after the first interval, not right away
    let period = Duration::from_secs(viewer_cfg.heartbeat_secs.max(1));
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        message::handle(&state.hub, &viewer, text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(viewer = %viewer, size = data.len(), "binary frame ignored");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(viewer = %viewer, error = %e, "socket read failed");
                        break;
                    }
                }
            }

            item = outbound.recv() => {
                match item {
                    Some(item) => {
                        let text = match item.into_text() {
                            Ok(text) => text,
                            Err(e) => {
                                error!(viewer = %viewer, error = %e, "frame encoding failed, dropped");
                                continue;
                            }
                        };
                        if sink.send(Message::Text(text.as_ref().into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // hub dropped us (queue overflow); everything queued
                        // before that has been written
                        info!(viewer = %viewer, "viewer evicted, closing socket");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.disconnect(&viewer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Mutex;

    use futures_util::stream;
    use hookwatch_core::config::HookwatchConfig;
    use hookwatch_core::types::{Headers, WebhookRecord};
    use serde_json::{json, Value};

    type Log = Arc<Mutex<Vec<Message>>>;

    fn state(queue_capacity: usize) -> Arc<AppState> {
        let mut config = HookwatchConfig::default();
        config.ingest.echo_stdout = false;
        config.viewer.queue_capacity = queue_capacity;
        Arc::new(AppState::new(config))
    }

    fn record(n: u64) -> WebhookRecord {
        WebhookRecord::received("POST", Headers::new(), json!({ "n": n }), None)
    }

    /// Socket write half that keeps everything written to it.
    fn recording_sink(log: Log) -> impl Sink<Message, Error = Infallible> + Unpin {
        Box::pin(futures_util::sink::unfold(log, |log, msg: Message| async move {
            log.lock().unwrap().push(msg);
            Ok::<_, Infallible>(log)
        }))
    }

    /// Socket read half fed from a channel; dropping the sender ends it.
    fn scripted_stream(
        rx: mpsc::UnboundedReceiver<Message>,
    ) -> impl Stream<Item = Result<Message, Infallible>> + Unpin {
        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (Ok(msg), rx))
        }))
    }

    fn text(msg: &Message) -> Value {
        match msg {
            Message::Text(t) => serde_json::from_str(t.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    async fn wait_for_viewers(state: &AppState, n: usize) {
        while state.hub.viewer_count() != n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn evicted_viewer_drains_its_queue_then_gets_close() {
        let state = state(2);
        let log = Log::default();
        let task = tokio::spawn(serve_viewer(
            recording_sink(Arc::clone(&log)),
            stream::pending::<Result<Message, Infallible>>(),
            Arc::clone(&state),
        ));
        wait_for_viewers(&state, 1).await;

        // Two fit in the queue, the third overflows it.
        for n in 0..3 {
            state.hub.publish(record(n)).unwrap();
        }
        assert_eq!(state.hub.viewer_count(), 0);

        task.await.unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(text(&log[0])["payload"]["request"]["payload"]["n"], 0);
        assert_eq!(text(&log[1])["payload"]["request"]["payload"]["n"], 1);
        assert!(matches!(log[2], Message::Close(None)));
    }

    #[tokio::test]
    async fn get_history_is_answered_on_the_socket() {
        let state = state(8);
        state.hub.publish(record(7)).unwrap();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let log = Log::default();
        let task = tokio::spawn(serve_viewer(
            recording_sink(Arc::clone(&log)),
            scripted_stream(inbound_rx),
            Arc::clone(&state),
        ));
        wait_for_viewers(&state, 1).await;

        inbound_tx
            .send(Message::Text(r#"{"type":"event","event":"get_history"}"#.into()))
            .unwrap();
        while log.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        drop(inbound_tx);
        task.await.unwrap();
        assert_eq!(state.hub.viewer_count(), 0);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        let reply = text(&log[0]);
        assert_eq!(reply["event"], "history_data");
        assert_eq!(reply["payload"]["total_count"], 1);
        assert_eq!(reply["payload"]["requests"][0]["payload"]["n"], 7);
    }

    #[tokio::test]
    async fn close_frame_ends_the_session() {
        let state = state(8);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        inbound_tx.send(Message::Close(None)).unwrap();

        serve_viewer(
            recording_sink(Log::default()),
            scripted_stream(inbound_rx),
            Arc::clone(&state),
        )
        .await;

        assert_eq!(state.hub.viewer_count(), 0);
        state.hub.publish(record(1)).unwrap();
    }
}
