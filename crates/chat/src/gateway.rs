use super::*;
use agora_auth::Member;
use agora_core::ID;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;

/// One received step of the connection loop. Disconnects are ordinary
/// values here, not exceptions, so the loop is a plain state machine.
enum Recv {
    Frame(String),
    Ignored,
    Closed,
    Error(String),
}

/// Per-connection WebSocket loop. The HTTP layer verifies the access
/// token and performs the upgrade; the gateway owns everything after:
/// join, presence announcements, backlog replay, the receive loop, and
/// teardown. A failing connection ends its own loop and nothing else.
pub struct Gateway<C> {
    registry: Arc<Registry>,
    storage: C,
}

impl<C> Gateway<C>
where
    C: ChatStorage,
{
    pub fn new(registry: Arc<Registry>, storage: C) -> Self {
        Self { registry, storage }
    }
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Drive one connection to completion. Unexpected errors are logged
    /// and resolved as a disconnect; the join-side no-op on a duplicate
    /// connection closes the new socket and keeps the old one.
    pub async fn run(
        &self,
        room: ID<Room>,
        user: ID<Member>,
        mut ws: actix_ws::Session,
        mut stream: actix_ws::MessageStream,
    ) {
        let (handle, mut queue) = unbounded_channel();
        if let Join::AlreadyPresent = self.registry.join(room, user, handle) {
            log::debug!("[gateway {}] user {} already connected", room, user);
            let _ = ws.close(None).await;
            return;
        }
        log::debug!("[gateway {}] user {} connected", room, user);
        if let Err(e) = self.serve(room, user, &mut ws, &mut stream, &mut queue).await {
            log::warn!("[gateway {}] user {}: {}", room, user, e);
        }
        self.registry.leave(room, user);
        self.registry.broadcast(room, &Frame::UserLeft(user).to_json());
        let _ = ws.close(None).await;
        log::debug!("[gateway {}] user {} disconnected", room, user);
    }

    async fn serve(
        &self,
        room: ID<Room>,
        user: ID<Member>,
        ws: &mut actix_ws::Session,
        stream: &mut actix_ws::MessageStream,
        queue: &mut UnboundedReceiver<String>,
    ) -> anyhow::Result<()> {
        use futures::StreamExt;
        // the newcomer first learns who is here, then the backlog, and
        // only then does the room learn about the newcomer
        for peer in self.registry.presence(room) {
            if peer != user {
                self.unicast(ws, &Frame::UserJoin(peer)).await?;
            }
        }
        for record in self.storage.backlog(room).await? {
            self.unicast(ws, &Frame::message(record.content())).await?;
        }
        self.registry.broadcast(
            room,
            &Frame::message(format!("Client #{} joined the chat", user)).to_json(),
        );
        self.registry
            .broadcast(room, &Frame::UserJoin(user).to_json());
        loop {
            tokio::select! {
                biased;
                queued = queue.recv() => match queued {
                    Some(json) => ws.text(json).await.map_err(|e| anyhow::anyhow!("{}", e))?,
                    None => return Ok(()),
                },
                received = stream.next() => match Self::classify(received) {
                    Recv::Frame(text) => self.accept(room, user, &text, ws).await?,
                    Recv::Ignored => continue,
                    Recv::Closed => return Ok(()),
                    Recv::Error(e) => anyhow::bail!("connection error: {}", e),
                },
            }
        }
    }

    /// Persist one inbound message, acknowledge it privately, and
    /// broadcast it to the room. A frame that fails to parse or persist
    /// ends the connection through the caller's error path.
    async fn accept(
        &self,
        room: ID<Room>,
        user: ID<Member>,
        text: &str,
        ws: &mut actix_ws::Session,
    ) -> anyhow::Result<()> {
        let Inbound { message } = serde_json::from_str(text)?;
        self.storage.append(room, user, &message).await?;
        self.unicast(ws, &Frame::message(format!("You wrote: {}", message)))
            .await?;
        self.registry.broadcast(
            room,
            &Frame::message(format!("Client #{} says: {}", user, message)).to_json(),
        );
        Ok(())
    }

    async fn unicast(&self, ws: &mut actix_ws::Session, frame: &Frame) -> anyhow::Result<()> {
        ws.text(frame.to_json())
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }

    fn classify(
        received: Option<Result<actix_ws::Message, actix_ws::ProtocolError>>,
    ) -> Recv {
        match received {
            Some(Ok(actix_ws::Message::Text(text))) => Recv::Frame(text.to_string()),
            Some(Ok(actix_ws::Message::Close(_))) => Recv::Closed,
            Some(Ok(_)) => Recv::Ignored,
            Some(Err(e)) => Recv::Error(e.to_string()),
            None => Recv::Closed,
        }
    }
}
