// Starts one arena server per test binary and hands out its WebSocket endpoint.
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Ensure the test server is running and return the `/bump/` WebSocket URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published = Arc::new(OnceLock::<String>::new());
        let published_thread = Arc::clone(&published);
        // The server gets its own thread and runtime so it outlives each `#[tokio::test]`.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_thread.set(addr.to_string());
                bump_server::run(listener).await.expect("server failed");
            });
        });
        wait_until_accepting(published);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_until_accepting(published: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(format!("ws://{addr}/bump/"));

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}
