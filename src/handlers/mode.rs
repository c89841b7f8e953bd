//! MODE - channel modes +i/+t/+k/+l/+o and the minimal user form.

use async_trait::async_trait;
use ferric_proto::{ChannelExt, Message, Reply};
use tracing::debug;

use crate::error::HandlerResult;
use crate::handlers::{Context, Handler};

pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(target) = msg.arg(0) else {
            return ctx
                .send_reply(Reply::err_needmoreparams(&ctx.nick, "MODE"))
                .await;
        };
        if target.is_channel_name() {
            channel_mode(ctx, msg, target).await
        } else {
            user_mode(ctx, msg, target).await
        }
    }
}

async fn channel_mode(ctx: &mut Context<'_>, msg: &Message, name: &str) -> HandlerResult {
    let Some(channel) = ctx.hub.channel(name) else {
        return ctx
            .send_reply(Reply::err_nosuchchannel(&ctx.nick, name))
            .await;
    };

    // View: MODE <chan> with no mode string.
    let Some(mode_string) = msg.arg(1) else {
        let (flags, mut params) = channel.read().await.modes.to_mode_line();
        let mut args = vec![ctx.nick.clone(), name.to_string(), flags];
        args.append(&mut params);
        return ctx.send_reply(Reply::RPL_CHANNELMODEIS.msg(args)).await;
    };

    // Modify: operator only.
    {
        let ch = channel.read().await;
        if !ch.is_member(ctx.uid) {
            drop(ch);
            return ctx
                .send_reply(Reply::err_notonchannel(&ctx.nick, name))
                .await;
        }
        if !ch.is_operator(&ctx.nick) {
            drop(ch);
            return ctx
                .send_reply(Reply::err_chanoprivsneeded(&ctx.nick, name))
                .await;
        }
    }

    let mut params = msg.params.iter().skip(2);
    let mut adding = true;
    let mut unknown_reported: Vec<char> = Vec::new();

    for flag in mode_string.chars() {
        match flag {
            '+' => adding = true,
            '-' => adding = false,
            'i' => {
                channel.write().await.modes.invite_only = adding;
                announce(ctx, name, adding, 'i', None).await?;
            }
            't' => {
                channel.write().await.modes.topic_restricted = adding;
                announce(ctx, name, adding, 't', None).await?;
            }
            'k' => {
                if adding {
                    let Some(key) = params.next() else {
                        ctx.send_reply(Reply::err_needmoreparams(&ctx.nick, "MODE"))
                            .await?;
                        continue;
                    };
                    channel.write().await.modes.key = Some(key.clone());
                    announce(ctx, name, true, 'k', Some(key.as_str())).await?;
                } else {
                    channel.write().await.modes.key = None;
                    announce(ctx, name, false, 'k', None).await?;
                }
            }
            'l' => {
                if adding {
                    let Some(limit) = params.next() else {
                        ctx.send_reply(Reply::err_needmoreparams(&ctx.nick, "MODE"))
                            .await?;
                        continue;
                    };
                    let parsed = limit.parse::<usize>().ok().filter(|n| *n > 0);
                    let Some(n) = parsed else {
                        ctx.send_reply(Reply::err_needmoreparams(&ctx.nick, "MODE"))
                            .await?;
                        continue;
                    };
                    channel.write().await.modes.limit = Some(n);
                    announce(ctx, name, true, 'l', Some(limit.as_str())).await?;
                } else {
                    channel.write().await.modes.limit = None;
                    announce(ctx, name, false, 'l', None).await?;
                }
            }
            'o' => {
                let Some(target_nick) = params.next() else {
                    ctx.send_reply(Reply::err_needmoreparams(&ctx.nick, "MODE"))
                        .await?;
                    continue;
                };
                let is_member = match ctx.hub.resolve_nick(target_nick) {
                    Some(uid) => channel.read().await.is_member(&uid),
                    None => false,
                };
                if !is_member {
                    ctx.send_reply(Reply::err_usernotinchannel(
                        &ctx.nick,
                        target_nick,
                        name,
                    ))
                    .await?;
                    continue;
                }
                {
                    let mut ch = channel.write().await;
                    if adding {
                        ch.operators.insert(target_nick.clone());
                    } else {
                        ch.operators.remove(target_nick);
                    }
                }
                announce(ctx, name, adding, 'o', Some(target_nick.as_str())).await?;
            }
            // Unknown flags are reported once each and do not abort the
            // rest of the sequence.
            other => {
                if !unknown_reported.contains(&other) {
                    unknown_reported.push(other);
                    ctx.send_reply(Reply::err_unknownmode(&ctx.nick, other, name))
                        .await?;
                }
            }
        }
    }
    Ok(())
}

/// Broadcast one MODE announcement for a successfully applied change.
async fn announce(
    ctx: &Context<'_>,
    name: &str,
    adding: bool,
    flag: char,
    param: Option<&str>,
) -> HandlerResult {
    let sign = if adding { '+' } else { '-' };
    let mut params = vec![name.to_string(), format!("{sign}{flag}")];
    if let Some(param) = param {
        params.push(param.to_string());
    }
    if let Some(mask) = ctx.mask().await {
        let mode = Message::new("MODE", params).with_prefix(mask);
        ctx.hub.broadcast_channel(name, mode, None).await;
    }
    debug!(channel = %name, by = %ctx.nick, change = %format!("{sign}{flag}"), "mode change");
    Ok(())
}

/// User MODE: view yields 221; no settable modes beyond the operator flag.
async fn user_mode(ctx: &mut Context<'_>, msg: &Message, target: &str) -> HandlerResult {
    if target != ctx.nick {
        return ctx.send_reply(Reply::err_usersdontmatch(&ctx.nick)).await;
    }
    let Some(mode_string) = msg.arg(1) else {
        let oper = match ctx.hub.session(ctx.uid) {
            Some(session) => session.read().await.oper,
            None => false,
        };
        let modes = if oper { "+o" } else { "+" };
        return ctx
            .send_reply(Reply::RPL_UMODEIS.msg(vec![ctx.nick.clone(), modes.to_string()]))
            .await;
    };
    for flag in mode_string.chars() {
        match flag {
            '+' | '-' | 'o' => {} // the operator flag is not self-settable
            _ => {
                return ctx.send_reply(Reply::err_umodeunknownflag(&ctx.nick)).await;
            }
        }
    }
    Ok(())
}
