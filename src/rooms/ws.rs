use axum::{debug_handler, extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade}, response::Response};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::{auth::CurrentIdentity, db::RoomId, votes::{VoteCoordinator, VoteError}};

/// Streams the room's votes snapshot, then every event for that room. A
/// subscriber that falls behind gets a fresh snapshot in place of the events
/// it missed.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<RoomId>,
    State(coordinator): State<VoteCoordinator>,
    CurrentIdentity(identity): CurrentIdentity,

    ws: WebSocketUpgrade,
) -> Result<Response, VoteError> {
    // subscribe first so nothing committed after the snapshot is missed
    let mut rx = coordinator.subscribe();
    let snapshot = coordinator.room_votes(room_id, identity.as_ref()).await?;

    Ok(ws.on_upgrade(async move |stream| {
        let (mut sender, mut receiver) = stream.split();

        let mut broadcast_task = tokio::spawn(async move {
            if send_json(&mut sender, &snapshot).await.is_err() {
                return;
            }

            loop {
                match rx.recv().await {
                    Ok(event) if event.room_id() == room_id => {
                        if send_json(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%room_id, skipped, "room subscriber lagged, resending snapshot");
                        let Ok(snapshot) = coordinator.room_votes(room_id, identity.as_ref()).await else {
                            break;
                        };
                        if send_json(&mut sender, &snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                if let Message::Close(_) = msg {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut broadcast_task => recv_task.abort(),
            _ = &mut recv_task => broadcast_task.abort(),
        };
    }))
}

async fn send_json<T: Serialize>(sender: &mut SplitSink<WebSocket, Message>, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    sender.send(Message::Text(text.into())).await?;
    Ok(())
}
