//! Per-connection lifecycle: registration handshake, then the unified
//! event loop multiplexing socket reads against the egress queue.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use ferric_proto::{is_valid_nick, IrcCodec, Message, Prefix, Reply};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::error::HandlerError;
use crate::handlers::{send_welcome_burst, Context, Dispatcher};
use crate::state::{Hub, Session, Uid};

/// Egress queue depth per connection; a full queue applies backpressure to
/// the handler that is fanning out.
const EGRESS_QUEUE_DEPTH: usize = 512;

type Transport = Framed<TcpStream, IrcCodec>;

/// Drive one client connection from accept to teardown.
pub async fn handle(
    hub: Arc<Hub>,
    dispatcher: Arc<Dispatcher>,
    stream: TcpStream,
    addr: SocketAddr,
) {
    let uid = hub.next_uid();
    let mut framed = Framed::new(stream, IrcCodec::new());
    debug!(uid = %uid, peer = %addr, "connection accepted");

    let Some(reg) = handshake(&hub, &dispatcher, &mut framed, &uid).await else {
        debug!(uid = %uid, "connection closed before registration");
        return;
    };

    let (tx, rx) = mpsc::channel(EGRESS_QUEUE_DEPTH);
    let session = Session::new(
        uid.clone(),
        reg.nick.clone(),
        reg.user,
        reg.realname,
        addr.ip().to_string(),
    );
    hub.attach(session, tx.clone());
    info!(uid = %uid, nick = %reg.nick, peer = %addr, "registered");

    {
        let ctx = Context {
            uid: &uid,
            nick: reg.nick.clone(),
            hub: &hub,
            sender: &tx,
            registered: true,
        };
        if send_welcome_burst(&ctx).await.is_err() {
            hub.disconnect(&uid, "Connection closed").await;
            return;
        }
    }

    let reason = event_loop(&hub, &dispatcher, &mut framed, &uid, &tx, rx).await;
    hub.disconnect(&uid, &reason).await;
}

/// What the handshake produced.
struct Registration {
    nick: String,
    user: String,
    realname: String,
}

/// Accumulated handshake state. Registration completes on the first
/// moment password, nickname and user identity are all present.
#[derive(Default)]
struct Handshake {
    pass_ok: bool,
    nick: Option<String>,
    user: Option<(String, String)>,
}

/// Run the registration state machine. Returns `None` when the connection
/// goes away first; any claimed nickname is released.
async fn handshake(
    hub: &Arc<Hub>,
    dispatcher: &Arc<Dispatcher>,
    framed: &mut Transport,
    uid: &Uid,
) -> Option<Registration> {
    let mut state = Handshake::default();
    let server = hub.info.name.clone();

    macro_rules! reply {
        ($msg:expr) => {
            if framed
                .send($msg.with_prefix(Prefix::Server(server.clone())))
                .await
                .is_err()
            {
                release_claim(hub, &state, uid);
                return None;
            }
        };
    }

    loop {
        let line = match framed.next().await {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                debug!(uid = %uid, error = %e, "read error during handshake");
                release_claim(hub, &state, uid);
                return None;
            }
            None => {
                release_claim(hub, &state, uid);
                return None;
            }
        };
        let Ok(msg) = Message::parse(&line) else {
            continue;
        };
        let target = state.nick.clone().unwrap_or_else(|| "*".to_string());

        match msg.command.as_str() {
            "PASS" => match msg.arg(0) {
                None | Some("") => reply!(Reply::err_needmoreparams(&target, "PASS")),
                Some(p) if p == hub.password => {
                    state.pass_ok = true;
                    let notice = Message::new(
                        "NOTICE",
                        vec!["Auth".to_string(), "Password accepted".to_string()],
                    );
                    reply!(notice);
                }
                Some(_) => reply!(Reply::err_passwdmismatch(&target)),
            },
            "NICK" => match msg.arg(0) {
                None => reply!(Reply::err_nonicknamegiven(&target)),
                Some(nick) if !is_valid_nick(nick) => {
                    reply!(Reply::err_erroneusnickname(&target, nick))
                }
                Some(nick) => {
                    if hub.claim_nick(nick, uid) {
                        if let Some(old) = state.nick.replace(nick.to_string()) {
                            if old != nick {
                                hub.release_nick(&old, uid);
                            }
                        }
                    } else {
                        reply!(Reply::err_nicknameinuse(&target, nick));
                    }
                }
            },
            "USER" => {
                if state.user.is_some() {
                    reply!(Reply::err_alreadyregistred(&target));
                } else if msg.params.len() < 4 {
                    reply!(Reply::err_needmoreparams(&target, "USER"));
                } else {
                    let username = msg.params[0].clone();
                    let realname = msg.params[3].trim_start_matches(':').to_string();
                    state.user = Some((username, realname));
                }
            }
            "CAP" => match msg.arg(0).map(str::to_ascii_uppercase).as_deref() {
                Some(sub) if sub == "LS" || sub == "LIST" => {
                    reply!(Message::new(
                        "CAP",
                        vec![target.clone(), sub.to_string(), String::new()],
                    ))
                }
                Some("REQ") => {
                    let requested = msg.arg(1).unwrap_or_default().to_string();
                    reply!(Message::new(
                        "CAP",
                        vec![target.clone(), "NAK".to_string(), requested],
                    ))
                }
                _ => {}
            },
            "PING" => match msg.arg(0) {
                None => reply!(Reply::err_noorigin(&target)),
                Some(token) => reply!(Message::new(
                    "PONG",
                    vec![server.clone(), token.to_string()],
                )),
            },
            "PONG" => {}
            "QUIT" => {
                release_claim(hub, &state, uid);
                return None;
            }
            verb => {
                // Known command that needs registration: 451. Anything
                // else from an unregistered peer is dropped silently.
                if dispatcher.registration_gate(verb) == Some(true) {
                    reply!(Reply::err_notregistered(&target));
                }
            }
        }

        if state.pass_ok {
            if let (Some(nick), Some((user, realname))) = (&state.nick, &state.user) {
                return Some(Registration {
                    nick: nick.clone(),
                    user: user.clone(),
                    realname: realname.clone(),
                });
            }
        }
    }
}

fn release_claim(hub: &Arc<Hub>, state: &Handshake, uid: &Uid) {
    if let Some(nick) = &state.nick {
        hub.release_nick(nick, uid);
    }
}

/// The registered-session event loop: socket reads are parsed and
/// dispatched; the egress queue is drained to the socket; either side
/// ending tears the connection down.
async fn event_loop(
    hub: &Arc<Hub>,
    dispatcher: &Arc<Dispatcher>,
    framed: &mut Transport,
    uid: &Uid,
    tx: &mpsc::Sender<Message>,
    mut rx: mpsc::Receiver<Message>,
) -> String {
    let server = hub.info.name.clone();
    let mut quit_reason: Option<String> = None;

    loop {
        tokio::select! {
            item = framed.next() => match item {
                Some(Ok(line)) => {
                    let dropped = framed.codec_mut().take_discarded();
                    if dropped > 0 {
                        warn!(uid = %uid, dropped, "input burst over cap; surplus discarded");
                    }
                    let msg = match Message::parse(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            debug!(uid = %uid, error = %e, line = %line, "invalid line");
                            continue;
                        }
                    };

                    let nick = match hub.session(uid) {
                        Some(session) => {
                            let mut s = session.write().await;
                            s.touch();
                            s.nick.clone()
                        }
                        None => break,
                    };
                    let mut ctx = Context {
                        uid,
                        nick,
                        hub,
                        sender: tx,
                        registered: true,
                    };

                    if let Err(e) = dispatcher.dispatch(&mut ctx, &msg).await {
                        match e {
                            HandlerError::Quit(reason) => {
                                let text = reason.unwrap_or_else(|| "Client Quit".to_string());
                                let error = Message::new(
                                    "ERROR",
                                    vec![format!("Closing Link: {} ({})", ctx.nick, text)],
                                );
                                let _ = framed.send(error).await;
                                quit_reason = Some(text);
                                break;
                            }
                            HandlerError::Send(_) => break,
                            other => {
                                if let Some(reply) = other.to_reply(&server, &ctx.nick, &msg.command) {
                                    if framed.send(reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    debug!(uid = %uid, error = %e, "read error");
                    break;
                }
                None => break,
            },

            out = rx.recv() => match out {
                Some(msg) => {
                    if framed.send(msg).await.is_err() {
                        break;
                    }
                }
                // Queue dropped: the hub already tore this session down.
                None => break,
            },
        }
    }

    quit_reason.unwrap_or_else(|| "Connection closed".to_string())
}
