//! End-to-end DCC SEND/GET exchange between two clients.
//!
//! The transfer directories are relative to the process working
//! directory, so each test pins the cwd to its own scratch directory and
//! the tests serialize on a lock (cwd is process-global).

mod common;

use std::sync::Mutex;
use std::time::Duration;

use common::TestServer;
use ferric_proto::DccSendOffer;

static CWD_LOCK: Mutex<()> = Mutex::new(());

const FILE_SIZE: usize = 1000;

fn enter_scratch_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ferricd-dcc-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("dcc_transfers")).expect("scratch dir");
    std::env::set_current_dir(&dir).expect("chdir");
    dir
}

#[tokio::test]
async fn dcc_send_offer_accept_and_transfer() {
    let _guard = CWD_LOCK.lock().expect("cwd lock");
    let scratch = enter_scratch_dir("xfer");
    let payload: Vec<u8> = (0..FILE_SIZE).map(|i| (i % 251) as u8).collect();
    std::fs::write(scratch.join("dcc_transfers/test.txt"), &payload).expect("seed file");

    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");

    // Offer: alice announces, bob receives the CTCP SEND offer.
    alice
        .send("DCC SEND bob ./dcc_transfers/test.txt")
        .await
        .unwrap();
    let confirmation = alice
        .recv_until(|m| {
            m.command == "NOTICE" && m.params[1].starts_with("DCC SEND request sent to bob")
        })
        .await
        .expect("sender confirmation");
    assert!(confirmation.last().unwrap().params[1].contains("test.txt"));

    let offer_msg = bob
        .recv_until(|m| m.command == "PRIVMSG" && m.params[1].contains("DCC SEND"))
        .await
        .expect("offer delivered");
    let offer = DccSendOffer::parse(&offer_msg.last().unwrap().params[1]).expect("parseable offer");
    assert_eq!(offer.filename, "test.txt");
    assert_eq!(offer.filesize, FILE_SIZE as u64);
    assert!(
        (5000..=5100).contains(&offer.port),
        "port {} outside pool",
        offer.port
    );

    // Accept: the exchange runs and both peers hear about completion.
    bob.send(&format!("DCC GET {}", offer.id)).await.unwrap();

    let done = bob
        .recv_until(|m| {
            m.command == "NOTICE" && m.params[1].starts_with("DCC GET completed: test.txt")
        })
        .await
        .expect("receiver completion");
    assert!(
        done.last().unwrap().params[1].contains("1000 B"),
        "completion names the size: {:?}",
        done.last().unwrap().params[1]
    );

    alice
        .recv_until(|m| {
            m.command == "NOTICE" && m.params[1].starts_with("DCC SEND completed: test.txt")
        })
        .await
        .expect("sender completion");

    // The bytes landed intact under the receive directory.
    let received = scratch.join("dcc_transfers/received/test.txt");
    let mut written = Vec::new();
    for _ in 0..50 {
        written = std::fs::read(&received).unwrap_or_default();
        if written.len() == FILE_SIZE {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(written, payload, "received file differs from source");
}

#[tokio::test]
async fn dcc_reject_notifies_sender() {
    let _guard = CWD_LOCK.lock().expect("cwd lock");
    let scratch = enter_scratch_dir("reject");
    std::fs::write(scratch.join("dcc_transfers/unwanted.bin"), vec![7u8; 64])
        .expect("seed file");

    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");

    alice
        .send("DCC SEND bob ./dcc_transfers/unwanted.bin")
        .await
        .unwrap();
    let offer_msg = bob
        .recv_until(|m| m.command == "PRIVMSG" && m.params[1].contains("DCC SEND"))
        .await
        .expect("offer delivered");
    let offer = DccSendOffer::parse(&offer_msg.last().unwrap().params[1]).expect("offer");

    bob.send(&format!("DCC REJECT {}", offer.id)).await.unwrap();
    bob.recv_until(|m| {
        m.command == "NOTICE" && m.params[1].contains("DCC transfer rejected")
    })
    .await
    .expect("receiver confirmation");

    alice
        .recv_until(|m| {
            m.command == "NOTICE"
                && m.params[1].contains("DCC SEND rejected by bob for file unwanted.bin")
        })
        .await
        .expect("sender notified");
}

#[tokio::test]
async fn dcc_send_to_missing_file_fails_cleanly() {
    let _guard = CWD_LOCK.lock().expect("cwd lock");
    enter_scratch_dir("missing");

    let server = TestServer::spawn().await.expect("spawn server");

    let mut alice = server.connect().await.expect("connect");
    alice.register("alice").await.expect("register");
    let mut bob = server.connect().await.expect("connect");
    bob.register("bob").await.expect("register");

    alice
        .send("DCC SEND bob ./dcc_transfers/no-such-file.bin")
        .await
        .unwrap();
    alice
        .recv_until(|m| {
            m.command == "NOTICE" && m.params[1].starts_with("File not found or inaccessible")
        })
        .await
        .expect("clean failure notice");
}
