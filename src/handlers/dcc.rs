//! The DCC command family: SEND, GET, ACCEPT, REJECT, LIST, CANCEL, STATUS.
//!
//! Feedback rides the IRC pipe as server NOTICEs; offers and pull requests
//! are CTCP-framed PRIVMSGs between the peers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ferric_proto::{Message, Reply, CTCP_DELIM};

use crate::dcc::format_size;
use crate::error::HandlerResult;
use crate::handlers::{Context, Handler};

pub struct DccHandler;

#[async_trait]
impl Handler for DccHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let sub = msg.arg(0).map(str::to_ascii_uppercase).unwrap_or_default();
        let rest: Vec<&str> = msg.params.iter().skip(1).map(String::as_str).collect();

        match sub.as_str() {
            "SEND" => send(ctx, &rest).await,
            "GET" | "ACCEPT" => get(ctx, &rest).await,
            "REJECT" => reject(ctx, &rest).await,
            "LIST" => list(ctx).await,
            "CANCEL" => cancel(ctx, &rest).await,
            "STATUS" => status(ctx).await,
            _ => {
                ctx.notice("Usage: DCC <SEND|GET|ACCEPT|REJECT|LIST|CANCEL|STATUS>")
                    .await
            }
        }
    }
}

/// `DCC SEND <nick> <filepath>`
async fn send(ctx: &mut Context<'_>, args: &[&str]) -> HandlerResult {
    let (Some(target_nick), Some(filepath)) = (args.first(), args.get(1)) else {
        return ctx.notice("Usage: DCC SEND <nickname> <filepath>").await;
    };

    let Some(receiver_uid) = ctx.hub.resolve_nick(target_nick) else {
        return ctx
            .send_reply(Reply::err_nosuchnick(&ctx.nick, target_nick))
            .await;
    };
    if receiver_uid == ctx.uid {
        return ctx.notice("Cannot send file to yourself").await;
    }

    // Basename only; sent files live under the transfer directory.
    let filename = match Path::new(filepath).file_name().and_then(|f| f.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return ctx
                .notice(&format!("File not found or inaccessible: {filepath}"))
                .await
        }
    };
    let path = PathBuf::from(&ctx.hub.dcc.config.send_root).join(&filename);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        _ => {
            return ctx
                .notice(&format!("File not found or inaccessible: {filepath}"))
                .await
        }
    };
    let filesize = metadata.len();
    if filesize == 0 {
        return ctx.notice("Cannot send empty file").await;
    }
    if filesize > ctx.hub.dcc.config.max_file_size {
        return ctx.notice("File too large (max 100MB)").await;
    }

    let uid = ctx.uid.to_string();
    match ctx
        .hub
        .dcc
        .create_send_transfer(ctx.hub, &uid, &receiver_uid, &filename, filesize)
        .await
    {
        Some(id) => {
            ctx.notice(&format!(
                "DCC SEND request sent to {target_nick} for file {filename} (ID: {id})"
            ))
            .await
        }
        None => ctx.notice("Failed to create DCC transfer").await,
    }
}

/// `DCC GET <id>` / `DCC ACCEPT <id>` / `DCC GET <nick> <filename>`
async fn get(ctx: &mut Context<'_>, args: &[&str]) -> HandlerResult {
    let Some(first) = args.first() else {
        return ctx
            .notice("Usage: DCC GET <transferId> or DCC GET <nickname> <filename>")
            .await;
    };

    let id = if let Some(filename) = args.get(1) {
        // Two-argument form: find the pending offer from that sender, or
        // relay a pull request to them.
        let sender_nick = first;
        let Some(sender_uid) = ctx.hub.resolve_nick(sender_nick) else {
            return ctx
                .send_reply(Reply::err_nosuchnick(&ctx.nick, sender_nick))
                .await;
        };
        match ctx
            .hub
            .dcc
            .find_pending(sender_nick, ctx.uid, filename)
            .await
        {
            Some(id) => id,
            None => {
                ctx.notice(&format!(
                    "Creating DCC GET request to {sender_nick} for file {filename}"
                ))
                .await?;
                if let Some(mask) = ctx.mask().await {
                    let request = Message::new(
                        "PRIVMSG",
                        vec![
                            sender_nick.to_string(),
                            format!("{CTCP_DELIM}DCC GET {filename}{CTCP_DELIM}"),
                        ],
                    )
                    .with_prefix(mask);
                    ctx.hub.send_to_uid(&sender_uid, request).await;
                }
                return ctx
                    .notice(&format!(
                        "DCC GET request sent to {sender_nick}. Waiting for response."
                    ))
                    .await;
            }
        }
    } else {
        first.to_string()
    };

    let uid = ctx.uid.to_string();
    if ctx.hub.dcc.accept_transfer(ctx.hub, &uid, &id).await {
        ctx.notice(&format!("DCC transfer accepted (ID: {id})")).await
    } else {
        ctx.notice("Failed to accept DCC transfer").await
    }
}

/// `DCC REJECT <id>`
async fn reject(ctx: &mut Context<'_>, args: &[&str]) -> HandlerResult {
    let Some(id) = args.first() else {
        return ctx.notice("Usage: DCC REJECT <transferId>").await;
    };
    let uid = ctx.uid.to_string();
    if ctx.hub.dcc.reject_transfer(ctx.hub, &uid, id).await {
        ctx.notice(&format!("DCC transfer rejected (ID: {id})")).await
    } else {
        ctx.notice("Failed to reject DCC transfer").await
    }
}

/// `DCC LIST` - one NOTICE per transfer this client participates in.
async fn list(ctx: &mut Context<'_>) -> HandlerResult {
    let transfers = ctx.hub.dcc.client_transfers(ctx.uid);
    if transfers.is_empty() {
        return ctx.notice("No active DCC transfers").await;
    }
    ctx.notice("=== DCC Transfer List ===").await?;
    for record in transfers {
        let line = {
            let t = record.read().await;
            let direction = t
                .direction_for(ctx.uid)
                .map(|d| d.as_str())
                .unwrap_or("SEND");
            format!(
                "[{}] {} {} ({}/{} bytes) [{:.1}%] Status: {}",
                t.id,
                direction,
                t.filename,
                t.bytes,
                t.filesize,
                t.progress(),
                t.status.as_str(),
            )
        };
        ctx.notice(&line).await?;
    }
    ctx.notice("=========================").await
}

/// `DCC CANCEL <id>` - sender or receiver only.
async fn cancel(ctx: &mut Context<'_>, args: &[&str]) -> HandlerResult {
    let Some(id) = args.first() else {
        return ctx.notice("Usage: DCC CANCEL <transferId>").await;
    };
    let Some(record) = ctx.hub.dcc.get(id) else {
        return ctx.notice("Transfer not found").await;
    };
    let authorized = {
        let t = record.read().await;
        !t.status.is_terminal() && t.direction_for(ctx.uid).is_some()
    };
    if !authorized {
        return ctx
            .notice("You are not authorized to cancel this transfer")
            .await;
    }
    ctx.hub.dcc.cancel_transfer(ctx.hub, id).await;
    ctx.notice(&format!("DCC transfer cancelled (ID: {id})")).await
}

/// `DCC STATUS` - aggregate counters.
async fn status(ctx: &mut Context<'_>) -> HandlerResult {
    let counters = ctx.hub.dcc.counters().await;
    ctx.notice("=== DCC Status ===").await?;
    ctx.notice(&format!("Active transfers: {}", counters.active))
        .await?;
    ctx.notice(&format!("Pending transfers: {}", counters.pending))
        .await?;
    ctx.notice(&format!("Completed transfers: {}", counters.completed))
        .await?;
    if counters.total_bytes > 0 {
        ctx.notice(&format!(
            "Total bytes transferred: {}",
            format_size(counters.total_bytes)
        ))
        .await?;
    }
    ctx.notice("==================").await
}
