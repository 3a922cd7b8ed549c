//! Operation router and the login/move/chat handlers.
//!
//! A message is decoded twice: once as an [`Envelope`] to read the tag,
//! then as the typed request the tag selects. Anything the client got
//! wrong (bad JSON, unknown tag, missing login) is answered with an
//! `error` reply and the connection carries on. Only failures to write
//! to the client itself propagate.

use std::sync::Arc;

use gamechannel_protocol::{
    ChatRequest, Codec, Envelope, LoginRequest, MoveRequest, Operation, ProtocolError, RoomId,
    ServerMessage, timestamp_ms,
};
use gamechannel_room::Simulation;
use gamechannel_session::{Authenticator, Client, Credentials};
use serde::de::DeserializeOwned;

use crate::ChannelError;
use crate::server::ServerState;

/// Dispatches one complete message from `client`.
pub(crate) async fn route<A, S>(
    state: &ServerState<A, S>,
    client: &Arc<Client>,
    raw: &[u8],
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
{
    let envelope: Envelope = match state.codec.decode(raw) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(peer = %client.addr(), error = %e, "undecodable message");
            return reply(state, client, &ServerMessage::error(format!("invalid message: {e}")))
                .await;
        }
    };

    let Some(op) = Operation::from_tag(&envelope.op) else {
        tracing::debug!(peer = %client.addr(), op = %envelope.op, "unknown operation");
        return reply(
            state,
            client,
            &ServerMessage::error(format!("unknown operation {:?}", envelope.op)),
        )
        .await;
    };

    metrics::counter!(
        "gamechannel_messages_total",
        "op" => op.as_str(),
        "room" => room_label(client.room())
    )
    .increment(1);

    match op {
        Operation::Login => match decode::<LoginRequest, _, _>(state, raw) {
            Ok(req) => handle_login(state, client, req).await,
            Err(e) => reply_invalid(state, client, op, e).await,
        },
        Operation::Move => match decode::<MoveRequest, _, _>(state, raw) {
            Ok(req) => handle_move(state, client, req).await,
            Err(e) => reply_invalid(state, client, op, e).await,
        },
        Operation::Chat => match decode::<ChatRequest, _, _>(state, raw) {
            Ok(req) => handle_chat(state, client, req).await,
            Err(e) => reply_invalid(state, client, op, e).await,
        },
    }
}

/// Authenticates, records the identity, joins the requested room (the
/// lobby by default) and acknowledges with the resulting room.
async fn handle_login<A, S>(
    state: &ServerState<A, S>,
    client: &Arc<Client>,
    req: LoginRequest,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
{
    let creds = Credentials {
        username: &req.username,
        password: &req.password,
    };
    let identity = match state.auth.authenticate(creds).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(peer = %client.addr(), error = %e, "login rejected");
            return reply(state, client, &ServerMessage::error(e.to_string())).await;
        }
    };

    client.set_identity(identity.as_str());
    let room = req.room_id.unwrap_or(RoomId::LOBBY);
    state.rooms.join(client, room).await;
    tracing::info!(peer = %client.addr(), player = %identity, %room, "player logged in");

    reply(state, client, &ServerMessage::ack(room)).await
}

/// Moves the player and sends the new position to the whole room,
/// sender included.
///
/// The update is attributed to the logged-in identity. A `player_id` in
/// the request is ignored, so a client cannot speak for another player.
async fn handle_move<A, S>(
    state: &ServerState<A, S>,
    client: &Arc<Client>,
    req: MoveRequest,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
{
    let Some(player) = client.identity() else {
        return reply(state, client, &ServerMessage::error("login required")).await;
    };
    let Some(room) = enter_room(state, client, req.room_id).await else {
        return reply(state, client, &ServerMessage::error("not in a room")).await;
    };

    let pos = state.sim.advance(&player, req.dir);
    let update = ServerMessage::State {
        player_id: player,
        server_tick: u64::try_from(timestamp_ms()).unwrap_or_default(),
        pos,
        room_id: room,
    };
    let line = state.codec.encode_line(&update)?;
    state.rooms.broadcast(room, &line, None).await;
    Ok(())
}

/// Relays a chat line to everyone in the room except the sender.
///
/// As with moves, the sender is always the logged-in identity and any
/// `player_id` in the request is ignored.
async fn handle_chat<A, S>(
    state: &ServerState<A, S>,
    client: &Arc<Client>,
    req: ChatRequest,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
{
    let Some(player) = client.identity() else {
        return reply(state, client, &ServerMessage::error("login required")).await;
    };
    let Some(room) = enter_room(state, client, req.room_id).await else {
        return reply(state, client, &ServerMessage::error("not in a room")).await;
    };

    let msg = ServerMessage::Msg {
        player_id: player,
        text: req.text,
        ts: timestamp_ms(),
        room_id: room,
    };
    let line = state.codec.encode_line(&msg)?;
    state.rooms.broadcast(room, &line, Some(client.addr())).await;
    Ok(())
}

/// Switches to `requested` if given (a no-op when already there) and
/// returns the room the client is now in.
async fn enter_room<A, S>(
    state: &ServerState<A, S>,
    client: &Arc<Client>,
    requested: Option<RoomId>,
) -> Option<RoomId>
where
    A: Authenticator,
    S: Simulation,
{
    if let Some(room) = requested {
        state.rooms.join(client, room).await;
    }
    client.room()
}

fn decode<T, A, S>(state: &ServerState<A, S>, raw: &[u8]) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    A: Authenticator,
    S: Simulation,
{
    state.codec.decode(raw)
}

async fn reply_invalid<A, S>(
    state: &ServerState<A, S>,
    client: &Client,
    op: Operation,
    err: ProtocolError,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
{
    tracing::debug!(peer = %client.addr(), %op, error = %err, "invalid request");
    reply(state, client, &ServerMessage::error(format!("invalid {op} request: {err}"))).await
}

/// Writes one response line to the client.
async fn reply<A, S>(
    state: &ServerState<A, S>,
    client: &Client,
    msg: &ServerMessage,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
{
    let line = state.codec.encode_line(msg)?;
    client.sink().send(&line).await?;
    Ok(())
}

fn room_label(room: Option<RoomId>) -> String {
    room.map_or_else(|| "none".to_string(), |r| r.0.to_string())
}
