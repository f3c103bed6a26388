//! Manages the WebSocket connection lifecycle for a dialogue session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use jarvis_core::{ChannelPresenter, DialogueError, DialogueEvent, DialogueSession};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

type SharedSink<S> = Arc<Mutex<S>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Builds a dialogue session whose presentation events are forwarded to the
/// client, schedules the greeting, and then serves client messages until the
/// connection closes.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!("New WebSocket connection.");

    let (socket_tx, socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));

    if send_msg(&mut *socket_tx.lock().await, ServerMessage::Connected { session_id })
        .await
        .is_err()
    {
        error!("Failed to send Connected message to client.");
        return;
    }

    let (presenter, events) = ChannelPresenter::new();
    let mut session = DialogueSession::new(state.config.dialogue.clone(), Arc::new(presenter));
    if let Some(responder) = &state.responder {
        session = session.with_responder(responder.clone());
    }

    if let Err(e) = run_dialogue_session(Arc::new(session), socket_tx, socket_rx, events).await {
        error!(error = ?e, "Dialogue session terminated with error.");
    }
    info!("Dialogue session finished.");
}

/// The main event loop for an active WebSocket session.
///
/// Background tasks are torn down on every exit path, including send errors.
async fn run_dialogue_session<S, R>(
    session: Arc<DialogueSession>,
    socket_tx: SharedSink<S>,
    mut socket_rx: R,
    events: mpsc::UnboundedReceiver<DialogueEvent>,
) -> Result<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let forwarder = tokio::spawn(forward_events(events, socket_tx.clone()).in_current_span());

    let greeter = {
        let session = session.clone();
        let delay = session.config().greeting_delay;
        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = session.greet().await {
                    debug!(error = %e, "Greeting skipped");
                }
            }
            .in_current_span(),
        )
    };

    let mut turns = JoinSet::new();
    let result = loop {
        tokio::select! {
            msg_result = socket_rx.next() => {
                let Some(msg_result) = msg_result else { break Ok(()) };
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Submit { text }) => {
                            let session = session.clone();
                            turns.spawn(
                                async move {
                                    match session.submit(&text).await {
                                        Ok(()) => {}
                                        Err(DialogueError::Busy) => debug!("Submission dropped while busy."),
                                        Err(e) => debug!(error = %e, "Submission rejected."),
                                    }
                                }
                                .in_current_span(),
                            );
                        }
                        Ok(ClientMessage::Interrupt) => session.interrupt(),
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed client message.");
                            let reply = ServerMessage::Error { message: format!("Malformed message: {}", e) };
                            if let Err(e) = send_msg(&mut *socket_tx.lock().await, reply).await {
                                break Err(e);
                            }
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("Client sent close frame. Shutting down session.");
                        break Ok(());
                    }
                    Ok(Message::Binary(_)) => warn!("Ignoring binary message."),
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Err(e) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break Ok(());
                    }
                }
            },
            // Reap finished turns so the set does not grow without bound.
            Some(joined) = turns.join_next(), if !turns.is_empty() => {
                if let Err(e) = joined {
                    error!(error = ?e, "Turn task panicked.");
                }
            },
        }
    };

    // Clean up background tasks on exit.
    session.interrupt();
    turns.abort_all();
    greeter.abort();
    forwarder.abort();
    info!("WebSocket connection closed and dialogue session terminated.");
    result
}

/// Forwards presentation events to the client until either side closes.
async fn forward_events<S>(mut events: mpsc::UnboundedReceiver<DialogueEvent>, socket_tx: SharedSink<S>)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Some(event) = events.recv().await {
        let mut sink = socket_tx.lock().await;
        if let Err(e) = send_msg(&mut *sink, event.into()).await {
            debug!(error = %e, "Stopping event forwarding.");
            break;
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg<S>(socket_tx: &mut S, msg: ServerMessage) -> Result<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
