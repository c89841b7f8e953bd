//! Channel semantics over real sockets: create/join, keys, topic
//! restriction, mode changes, and message fan-out.

mod common;

use common::TestServer;

#[tokio::test]
async fn join_creates_channel_with_creator_as_operator() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");

    alice.send("JOIN #room").await.unwrap();
    let messages = alice.recv_until(|m| m.command == "366").await.expect("join cycle");

    let join = messages.iter().find(|m| m.command == "JOIN").expect("JOIN echo");
    assert_eq!(join.params[0], "#room");
    assert_eq!(join.prefix.as_ref().and_then(|p| p.nick()), Some("alice"));

    assert!(
        messages.iter().any(|m| m.command == "331"),
        "fresh channel has no topic"
    );
    let names = messages.iter().find(|m| m.command == "353").expect("names");
    assert!(
        names.params.last().unwrap().contains("@alice"),
        "creator is operator in NAMES: {:?}",
        names.params
    );
}

#[tokio::test]
async fn channel_key_gates_join() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");

    alice.send("MODE #room +k secret").await.unwrap();
    alice
        .recv_until(|m| m.command == "MODE" && m.params.get(1).map(String::as_str) == Some("+k"))
        .await
        .expect("mode broadcast");

    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");

    // Without the key: 475.
    bob.send("JOIN #room").await.unwrap();
    let denied = bob.recv_until(|m| m.command == "475").await.expect("475");
    assert_eq!(denied.last().unwrap().params[1], "#room");

    // Wrong key: 475.
    bob.send("JOIN #room hunter2").await.unwrap();
    bob.recv_until(|m| m.command == "475").await.expect("475 again");

    // Correct key: join succeeds and alice sees the broadcast.
    bob.join("#room", Some("secret")).await.expect("keyed join");
    let seen = alice.recv_until(|m| m.command == "JOIN").await.expect("broadcast");
    assert_eq!(
        seen.last().unwrap().prefix.as_ref().and_then(|p| p.nick()),
        Some("bob")
    );
}

#[tokio::test]
async fn user_limit_boundary() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");
    alice.send("MODE #room +l 2").await.unwrap();
    alice
        .recv_until(|m| m.command == "MODE")
        .await
        .expect("mode broadcast");

    // Second join fills the channel to the limit.
    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");
    bob.join("#room", None).await.expect("join at limit");

    // Third is rejected with 471.
    let mut carol = server.connect().await.expect("connect");
    carol.register("carol").await.expect("register");
    carol.send("JOIN #room").await.unwrap();
    let denied = carol.recv_until(|m| m.command == "471").await.expect("471");
    assert_eq!(denied.last().unwrap().params[1], "#room");
}

#[tokio::test]
async fn invite_only_flow() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");
    alice.send("MODE #room +i").await.unwrap();
    alice.recv_until(|m| m.command == "MODE").await.expect("mode");

    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");
    bob.send("JOIN #room").await.unwrap();
    bob.recv_until(|m| m.command == "473").await.expect("473");

    alice.send("INVITE bob #room").await.unwrap();
    alice.recv_until(|m| m.command == "341").await.expect("341 to inviter");
    bob.recv_until(|m| m.command == "INVITE").await.expect("INVITE delivered");

    bob.join("#room", None).await.expect("invited join");

    // The invitation was consumed: parting and rejoining is denied again.
    bob.send("PART #room").await.unwrap();
    bob.recv_until(|m| m.command == "PART").await.expect("part echo");
    bob.send("JOIN #room").await.unwrap();
    bob.recv_until(|m| m.command == "473").await.expect("invite consumed");
}

#[tokio::test]
async fn topic_restriction_and_operator_grant() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");

    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");
    bob.join("#room", None).await.expect("join");
    alice.recv_until(|m| m.command == "JOIN").await.expect("bob joined");

    // Channels default to +t: non-operator topic set is refused.
    bob.send("TOPIC #room :hello").await.unwrap();
    let denied = bob.recv_until(|m| m.command == "482").await.expect("482");
    assert_eq!(denied.last().unwrap().params[1], "#room");

    // After +o bob, the topic set succeeds and everyone sees it.
    alice.send("MODE #room +o bob").await.unwrap();
    bob.recv_until(|m| m.command == "MODE").await.expect("mode broadcast");

    bob.send("TOPIC #room :hello").await.unwrap();
    let topic = alice.recv_until(|m| m.command == "TOPIC").await.expect("topic broadcast");
    let topic = topic.last().unwrap();
    assert_eq!(topic.params, vec!["#room", "hello"]);
    bob.recv_until(|m| m.command == "TOPIC").await.expect("setter copy");
}

#[tokio::test]
async fn privmsg_to_channel_excludes_sender() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");

    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");
    bob.join("#room", None).await.expect("join");
    alice.recv_until(|m| m.command == "JOIN").await.expect("bob joined");

    alice.send("PRIVMSG #room :hi").await.unwrap();

    let received = bob.recv_until(|m| m.command == "PRIVMSG").await.expect("delivery");
    let msg = received.last().unwrap();
    assert_eq!(msg.prefix.as_ref().and_then(|p| p.nick()), Some("alice"));
    assert_eq!(msg.params, vec!["#room", "hi"]);

    // The sender gets no echo: the next thing alice sees is her PONG.
    alice.send("PING sentinel").await.unwrap();
    let next = alice.recv().await.expect("pong");
    assert_eq!(next.command, "PONG", "sender received her own PRIVMSG");
}

#[tokio::test]
async fn kick_requires_operator_and_removes_member() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");

    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");
    bob.join("#room", None).await.expect("join");
    alice.recv_until(|m| m.command == "JOIN").await.expect("bob joined");

    // Non-operator kick is refused.
    bob.send("KICK #room alice :bye").await.unwrap();
    bob.recv_until(|m| m.command == "482").await.expect("482");

    // Operator kick is broadcast and removes the member.
    alice.send("KICK #room bob :misbehaving").await.unwrap();
    let kicked = bob.recv_until(|m| m.command == "KICK").await.expect("kick seen");
    assert_eq!(
        kicked.last().unwrap().params,
        vec!["#room", "bob", "misbehaving"]
    );

    // Bob is out: messaging the channel now fails with 404.
    bob.send("PRIVMSG #room :still here?").await.unwrap();
    bob.recv_until(|m| m.command == "404").await.expect("404");
}

#[tokio::test]
async fn away_is_echoed_to_privmsg_sender() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");

    bob.send("AWAY :gone fishing").await.unwrap();
    bob.recv_until(|m| m.command == "306").await.expect("306");

    alice.send("PRIVMSG bob :you there?").await.unwrap();
    let replies = alice.recv_until(|m| m.command == "301").await.expect("301");
    let away = replies.last().unwrap();
    assert_eq!(away.params[1], "bob");
    assert_eq!(away.params[2], "gone fishing");

    bob.recv_until(|m| m.command == "PRIVMSG").await.expect("still delivered");
}
