//! TCP line protocol over real loopback sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use raid_relay::api::ApiKeys;
use raid_relay::pubsub::Topic;
use raid_relay::tcp::{TcpServer, TcpServerError, PING_INTERVAL};
use raid_relay::types::{CanonicalState, SharedState, Update, REGION_COUNT};
use raid_relay::Shutdown;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    addr: SocketAddr,
    state: SharedState,
    updates: Arc<Topic<Update>>,
    shutdown: Shutdown,
    server: JoinHandle<Result<(), TcpServerError>>,
}

impl Harness {
    async fn start() -> Self {
        let state: SharedState = Arc::new(RwLock::new(CanonicalState::default()));
        state.write().regions[8].alert = true;

        let updates: Arc<Topic<Update>> = Arc::new(Topic::new());
        let shutdown = Shutdown::new();
        let server = Arc::new(TcpServer::new(
            Arc::clone(&state),
            Arc::clone(&updates),
            ApiKeys::new(["secret"]),
            shutdown.clone(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(server.run(listener));

        Self {
            addr,
            state,
            updates,
            shutdown,
            server,
        }
    }

    async fn connect(&self, auth: Option<&str>) -> Client {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        let (read, mut write) = stream.into_split();
        if let Some(auth) = auth {
            write.write_all(auth.as_bytes()).await.unwrap();
        }
        Client {
            lines: BufReader::new(read),
            _write: write,
        }
    }

    /// Wait until `count` connections have subscribed to the topic
    async fn wait_for_subscribers(&self, count: usize) {
        for _ in 0..100 {
            if self.updates.subscriber_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscribers never reached {count}");
    }

    async fn publish(&self, region_id: u32, alert: bool, is_fresh: bool) {
        let region = {
            let mut state = self.state.write();
            let region = state
                .regions
                .iter_mut()
                .find(|r| r.id == region_id)
                .unwrap();
            region.alert = alert;
            region.clone()
        };
        self.updates.broadcast(Update::new(is_fresh, region)).await;
    }

    async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(READ_TIMEOUT, self.server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

struct Client {
    lines: BufReader<OwnedReadHalf>,
    _write: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    /// Next line without its terminator, `None` on EOF
    async fn line(&mut self) -> Option<String> {
        self.line_within(READ_TIMEOUT).await
    }

    async fn line_within(&mut self, wait: Duration) -> Option<String> {
        let mut line = String::new();
        let n = tokio::time::timeout(wait, self.lines.read_line(&mut line))
            .await
            .expect("read timed out")
            .unwrap();
        (n > 0).then(|| line.trim_end().to_string())
    }
}

#[tokio::test]
async fn test_auth_timeout() {
    let harness = Harness::start().await;
    let mut client = harness.connect(None).await;

    assert_eq!(client.line().await.as_deref(), Some("a:timeout"));
    assert_eq!(client.line().await, None);

    harness.stop().await;
}

#[tokio::test]
async fn test_wrong_api_key() {
    let harness = Harness::start().await;
    let mut client = harness.connect(Some("nope\n")).await;

    assert_eq!(client.line().await.as_deref(), Some("a:wrong_api_key"));
    assert_eq!(client.line().await, None);

    // The server keeps serving other clients
    let mut other = harness.connect(Some("secret,9\n")).await;
    assert_eq!(other.line().await.as_deref(), Some("a:ok"));

    harness.stop().await;
}

#[tokio::test]
async fn test_initial_states_for_all_regions() {
    let harness = Harness::start().await;
    let mut client = harness.connect(Some("secret\n")).await;

    assert_eq!(client.line().await.as_deref(), Some("a:ok"));
    let mut states = Vec::new();
    for _ in 0..REGION_COUNT {
        states.push(client.line().await.unwrap());
    }
    assert_eq!(states[0], "s:1=0");
    assert_eq!(states[8], "s:9=1");
    assert_eq!(states[24], "s:25=0");

    harness.stop().await;
    assert_eq!(client.line().await, None);
}

#[tokio::test]
async fn test_live_updates_for_one_region() {
    let harness = Harness::start().await;
    let mut client = harness.connect(Some("secret,9\r\n")).await;

    assert_eq!(client.line().await.as_deref(), Some("a:ok"));
    assert_eq!(client.line().await.as_deref(), Some("s:9=1"));
    harness.wait_for_subscribers(1).await;

    // Other regions and replayed events are filtered out
    harness.publish(3, true, true).await;
    harness.publish(9, true, false).await;
    harness.publish(9, false, true).await;

    assert_eq!(client.line().await.as_deref(), Some("s:9=0"));

    let updates = Arc::clone(&harness.updates);
    harness.stop().await;
    assert_eq!(client.line().await, None);
    assert_eq!(updates.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_live_updates_for_all_regions() {
    let harness = Harness::start().await;
    let mut client = harness.connect(Some("secret\n")).await;

    assert_eq!(client.line().await.as_deref(), Some("a:ok"));
    for _ in 0..REGION_COUNT {
        client.line().await.unwrap();
    }
    harness.wait_for_subscribers(1).await;

    harness.publish(3, true, false).await;
    harness.publish(9, false, true).await;
    harness.publish(25, true, true).await;

    assert_eq!(client.line().await.as_deref(), Some("s:9=0"));
    assert_eq!(client.line().await.as_deref(), Some("s:25=1"));

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_ping_after_quiet_interval() {
    let harness = Harness::start().await;
    let mut client = harness.connect(Some("secret,9\n")).await;

    assert_eq!(client.line().await.as_deref(), Some("a:ok"));
    assert_eq!(client.line().await.as_deref(), Some("s:9=1"));

    let started = tokio::time::Instant::now();
    let ping = client
        .line_within(PING_INTERVAL + Duration::from_secs(5))
        .await
        .unwrap();
    // The server's timer starts just before the last state line is read
    assert!(started.elapsed() >= PING_INTERVAL - Duration::from_secs(1));

    let nonce: u32 = ping.strip_prefix("p:").unwrap().parse().unwrap();
    assert!(nonce < 10000);

    harness.stop().await;
}
