//! WebSocket upgrade + message loop.
//!
//! A socket runs at most one generation at a time. The generation runs in its own
//! task so the loop keeps reading: a `cancel` message, or the socket closing,
//! cancels the in-flight generation through its token.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::GenerationRequest;
use crate::error::GenerateError;
use crate::pipeline::Generator;
use crate::protocol::{ClientWsMessage, ErrorOut, GenerateOut, ServerWsMessage};
use crate::state::AppState;

/// Generation started on this socket and not yet reported back.
struct InFlight {
  generation_id: String,
  cancel: CancellationToken,
}

type Done = (String, ServerWsMessage);

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "teachgen_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "code": "internal", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "teachgen_backend", "WebSocket connected");
  let (done_tx, mut done_rx) = mpsc::channel::<Done>(4);
  let mut in_flight: Option<InFlight> = None;

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        let reply = match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "teachgen_backend", "WS received: {:?}", &incoming);
              handle_client_ws(incoming, &state, &mut in_flight, &done_tx)
            }
            Err(e) => Some(ServerWsMessage::error(ErrorOut { code: "invalid_message", message: format!("Invalid JSON: {}", e) })),
          },
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
            None
          }
          Message::Close(_) => break,
          _ => None,
        };
        if let Some(reply) = reply {
          if let Err(e) = send(&mut socket, &reply).await {
            error!(target: "teachgen_backend", error = %e, "WS send error");
            break;
          }
        }
      }
      Some((generation_id, reply)) = done_rx.recv() => {
        if in_flight.as_ref().is_some_and(|f| f.generation_id == generation_id) {
          in_flight = None;
        }
        if let Err(e) = send(&mut socket, &reply).await {
          error!(target: "teachgen_backend", error = %e, "WS send error");
          break;
        }
      }
    }
  }

  abandon_in_flight(&mut in_flight);
  info!(target: "teachgen_backend", "WebSocket disconnected");
}

/// Socket is gone: cancel whatever it still had running.
fn abandon_in_flight(in_flight: &mut Option<InFlight>) {
  if let Some(f) = in_flight.take() {
    info!(target: "generation", generation_id = %f.generation_id, "Socket closed; cancelling generation");
    f.cancel.cancel();
  }
}

fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  in_flight: &mut Option<InFlight>,
  done_tx: &mpsc::Sender<Done>,
) -> Option<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => Some(ServerWsMessage::Pong),

    ClientWsMessage::Generate { request } => {
      if let Some(f) = in_flight.as_ref() {
        return Some(ServerWsMessage::generation_error(
          f.generation_id.clone(),
          ErrorOut { code: "in_progress", message: format!("Generation {} is still running; cancel it first.", f.generation_id) },
        ));
      }
      let generator = match state.generator() {
        Ok(g) => g.clone(),
        Err(e) => return Some(ServerWsMessage::error(ErrorOut::from(&e))),
      };

      let generation_id = Uuid::new_v4().to_string();
      let module = request.module();
      let cancel = CancellationToken::new();
      *in_flight = Some(InFlight { generation_id: generation_id.clone(), cancel: cancel.clone() });
      info!(target: "generation", %generation_id, module = module.as_str(), "WS generation started");

      let tx = done_tx.clone();
      let id = generation_id.clone();
      tokio::spawn(async move {
        let reply = run_generation(&generator, &request, &id, &cancel).await;
        let _ = tx.send((id, reply)).await;
      });
      Some(ServerWsMessage::Started { generation_id, module })
    }

    ClientWsMessage::Cancel => {
      match in_flight.as_ref() {
        Some(f) => {
          info!(target: "generation", generation_id = %f.generation_id, "WS cancel requested");
          f.cancel.cancel();
        }
        None => debug!(target: "generation", "WS cancel with nothing in flight"),
      }
      None
    }
  }
}

async fn run_generation(
  generator: &Generator,
  request: &GenerationRequest,
  generation_id: &str,
  cancel: &CancellationToken,
) -> ServerWsMessage {
  match generator.generate(request, cancel).await {
    Ok(generation) => {
      info!(target: "generation", %generation_id, sections = generation.sections.len(), "WS generation served");
      ServerWsMessage::Generated(GenerateOut::new(generation_id.to_string(), request.module(), generation))
    }
    Err(GenerateError::Cancelled) => {
      info!(target: "generation", %generation_id, "WS generation cancelled");
      ServerWsMessage::Cancelled { generation_id: generation_id.to_string() }
    }
    Err(e) => {
      error!(target: "generation", %generation_id, code = e.code(), error = %e, "WS generation failed");
      ServerWsMessage::generation_error(generation_id, ErrorOut::from(&e))
    }
  }
}
