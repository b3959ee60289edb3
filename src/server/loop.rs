// Server loop module
// Accepts connections until a shutdown is requested

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use super::connection::{accept_connection, ConnectionSettings};
use crate::handler::Dispatcher;
use crate::logger;

/// Run the accept loop.
///
/// Returns once `shutdown` is notified; the listener is dropped on return so
/// no new connections are taken while in-flight ones finish. Every accepted
/// connection holds a clone of `drain`, which the caller flips to close them.
pub async fn start_server_loop(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    settings: ConnectionSettings,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
    drain: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &dispatcher,
                            settings,
                            &active_connections,
                            &drain,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::{create_listener, wait_for_drain};
    use http_body_util::{BodyExt, Empty};
    use hyper::body::Bytes;
    use hyper::{Request, StatusCode};
    use hyper_util::rt::TokioIo;
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;

    struct TestServer {
        addr: SocketAddr,
        counter: Arc<AtomicUsize>,
        shutdown: Arc<Notify>,
        drain: watch::Sender<bool>,
        handle: JoinHandle<()>,
    }

    fn spawn_server(toml: &str) -> TestServer {
        let cfg = Config::from_toml(toml);
        let listener = create_listener(cfg.get_socket_addr().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());
        let (drain, drain_rx) = watch::channel(false);

        let handle = tokio::spawn(start_server_loop(
            listener,
            Arc::new(Dispatcher::new(&cfg).unwrap()),
            ConnectionSettings::from_config(&cfg),
            Arc::clone(&counter),
            Arc::clone(&shutdown),
            drain_rx,
        ));

        TestServer {
            addr,
            counter,
            shutdown,
            drain,
            handle,
        }
    }

    impl TestServer {
        async fn stop(self) -> usize {
            self.shutdown.notify_one();
            tokio::time::timeout(Duration::from_secs(5), self.handle)
                .await
                .unwrap()
                .unwrap();
            self.drain.send_replace(true);
            wait_for_drain(&self.counter, Duration::from_secs(5)).await
        }
    }

    #[tokio::test]
    async fn test_serves_http_and_stops_on_shutdown() {
        let server = spawn_server(
            "[server]\nport = 0\n[logging]\naccess_log = false\n[performance]\nkeep_alive_timeout = 0\n",
        );

        let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(b"GET /delay?time=0 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.to_ascii_lowercase().contains("access-control-allow-origin: *"));
        assert!(raw.contains("\"delay_time\":0"));

        let counter = Arc::clone(&server.counter);
        assert_eq!(server.stop().await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keep_alive_connection_serves_consecutive_max_delays() {
        // Request bound is 1s of I/O plus the 2s ceiling; two requests take 4s
        let server = spawn_server(
            "[server]\nport = 0\n[logging]\naccess_log = false\n\
             [performance]\nread_timeout = 1\nwrite_timeout = 1\n\
             [delay]\nmax_seconds = 2\n",
        );

        let stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        let client = tokio::spawn(conn);

        for _ in 0..2 {
            let req = Request::get("/delay?time=2")
                .header(hyper::header::HOST, "localhost")
                .body(Empty::<Bytes>::new())
                .unwrap();
            let resp = sender.send_request(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["delay_time"], 2);
        }

        drop(sender);
        let _ = client.await;
        assert_eq!(server.stop().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_keep_alive_connections() {
        let server = spawn_server("[server]\nport = 0\n[logging]\naccess_log = false\n");

        let stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        let client = tokio::spawn(conn);

        let req = Request::get("/")
            .header(hyper::header::HOST, "localhost")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = sender.send_request(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.into_body().collect().await.unwrap();
        assert_eq!(server.counter.load(Ordering::SeqCst), 1);

        let started = tokio::time::Instant::now();
        assert_eq!(server.stop().await, 0);
        assert!(started.elapsed() < Duration::from_secs(2));

        // The server hung up, so the client side of the connection ends too
        let closed = tokio::time::timeout(Duration::from_secs(2), client).await;
        assert!(closed.is_ok());
    }
}
