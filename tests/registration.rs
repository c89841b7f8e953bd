//! Registration handshake and nickname collision behavior over real
//! sockets.

mod common;

use common::{TestServer, PASSWORD};

#[tokio::test]
async fn registration_emits_welcome_burst() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = server.connect().await.expect("connect");

    alice.send(&format!("PASS {PASSWORD}")).await.unwrap();
    alice.send("NICK alice").await.unwrap();
    alice.send("USER alice 0 * :Alice").await.unwrap();

    let messages = alice
        .recv_until(|m| m.command == "004")
        .await
        .expect("welcome burst");

    let welcome = messages
        .iter()
        .find(|m| m.command == "001")
        .expect("001 present");
    assert_eq!(welcome.params[0], "alice");
    assert!(
        welcome.params[1].starts_with("Welcome to the Internet Relay Network alice!alice@"),
        "unexpected 001 text: {:?}",
        welcome.params[1]
    );

    for code in ["002", "003", "004"] {
        assert!(
            messages.iter().any(|m| m.command == code),
            "missing {code}"
        );
    }
}

#[tokio::test]
async fn wrong_password_yields_464_and_blocks_registration() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    client.send("PASS wrongpw").await.unwrap();
    let msg = client
        .recv_until(|m| m.command == "464")
        .await
        .expect("464 reply");
    assert_eq!(msg.last().unwrap().command, "464");

    // Identity alone must not register without an accepted password.
    client.send("NICK mallory").await.unwrap();
    client.send("USER mallory 0 * :Mallory").await.unwrap();
    client.send("JOIN #room").await.unwrap();
    let reply = client
        .recv_until(|m| m.command == "451")
        .await
        .expect("451 for premature JOIN");
    assert_eq!(reply.last().unwrap().command, "451");
}

#[tokio::test]
async fn nick_collision_yields_433_and_second_session_stays_unregistered() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut first = server.connect().await.expect("connect");
    first.register("bob").await.expect("first bob registers");

    let mut second = server.connect().await.expect("connect");
    second.send(&format!("PASS {PASSWORD}")).await.unwrap();
    second.send("NICK bob").await.unwrap();

    let replies = second.recv_until(|m| m.command == "433").await.expect("433");
    let collision = replies.last().unwrap();
    assert_eq!(collision.params[0], "*");
    assert_eq!(collision.params[1], "bob");
    assert_eq!(collision.params[2], "Nickname is already in use");

    // Still unregistered: a post-registration verb draws 451.
    second.send("USER bob 0 * :Bob").await.unwrap();
    second.send("JOIN #room").await.unwrap();
    let reply = second.recv_until(|m| m.command == "451").await.expect("451");
    assert_eq!(reply.last().unwrap().command, "451");
}

#[tokio::test]
async fn nick_change_updates_index_and_broadcasts_once() {
    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    alice.join("#room", None).await.expect("join");

    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");
    bob.join("#room", None).await.expect("join");
    // Alice sees bob's JOIN.
    alice
        .recv_until(|m| m.command == "JOIN")
        .await
        .expect("join broadcast");

    alice.send("NICK alicia").await.unwrap();

    let seen_by_alice = alice
        .recv_until(|m| m.command == "NICK")
        .await
        .expect("self copy");
    let nick_msg = seen_by_alice.last().unwrap();
    assert_eq!(nick_msg.params[0], "alicia");
    assert_eq!(
        nick_msg.prefix.as_ref().and_then(|p| p.nick()),
        Some("alice")
    );

    let seen_by_bob = bob
        .recv_until(|m| m.command == "NICK")
        .await
        .expect("peer copy");
    assert_eq!(seen_by_bob.last().unwrap().params[0], "alicia");

    // The old nickname is free again.
    let mut carol = server.connect().await.expect("connect");
    carol.register("alice").await.expect("old nick reusable");
}

#[tokio::test]
async fn cap_stub_advertises_empty_set() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    client.send("CAP LS 302").await.unwrap();
    let reply = client
        .recv_until(|m| m.command == "CAP")
        .await
        .expect("CAP LS reply");
    let cap = reply.last().unwrap();
    assert_eq!(cap.params[1], "LS");
    assert_eq!(cap.params[2], "");

    client.send("CAP REQ :multi-prefix").await.unwrap();
    let reply = client
        .recv_until(|m| m.command == "CAP" && m.params[1] == "NAK")
        .await
        .expect("CAP NAK reply");
    assert_eq!(reply.last().unwrap().params[2], "multi-prefix");
}
