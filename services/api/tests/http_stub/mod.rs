use std::io::Read;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// What the stub does with one request.
pub enum Reply {
    Json(u16, Value),
    /// Keep the connection open and never answer.
    Hang,
}

/// A local JSON server standing in for a model provider.
pub struct HttpStub {
    pub base_url: String,
    paths: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HttpStub {
    /// `responder` decides the reply for each request path and JSON body.
    pub fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start http stub server");
        let base_url = format!("http://{}", server.server_addr());
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = paths.clone();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            // Hung requests are held here until shutdown.
            let mut held = Vec::new();
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                seen.lock().unwrap().push(path.clone());

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

                match responder(&path, &parsed) {
                    Reply::Json(status, reply) => {
                        let header = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"application/json"[..],
                        )
                        .expect("content-type header");
                        let _ = request.respond(
                            tiny_http::Response::from_string(reply.to_string())
                                .with_status_code(status)
                                .with_header(header),
                        );
                    }
                    Reply::Hang => held.push(request),
                }
            }
            drop(held);
        });

        Self {
            base_url,
            paths,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
