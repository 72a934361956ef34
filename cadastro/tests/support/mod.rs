// Stub API server for the integration tests, bound to an ephemeral port per test.
#![allow(dead_code)]

use cadastro::notice::RecordingNotifier;
use cadastro::storage::MemoryStore;
use cadastro::{ApiClient, ClientConfig, Console, Session};
use rouille::{Request, Response};
use serde_json::json;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub const GOOD_TOKEN: &str = "tok123";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn start<F>(handler: F) -> StubServer
    where
        F: Fn(&Recorded) -> Response + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(vec![]));
        let log = requests.clone();
        let server = rouille::Server::new("127.0.0.1:0", move |request: &Request| {
            let mut body = String::new();
            if let Some(mut data) = request.data() {
                data.read_to_string(&mut body).unwrap();
            }
            let recorded = Recorded {
                method: request.method().to_string(),
                path: request.url(),
                authorization: request.header("Authorization").map(|s| s.to_string()),
                body,
            };
            log.lock().unwrap().push(recorded.clone());
            handler(&recorded)
        })
        .expect("bind stub server");
        let url = format!("http://{}", server.server_addr());
        let (handle, stop) = server.stoppable();
        StubServer {
            url,
            requests,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// The happy-path API: accepts `op`/`secret`, serves a couple of records per list, and
    /// answers 401 to anything without the good bearer token.
    pub fn fake_api() -> StubServer {
        StubServer::start(fake_api_handler)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn unauthorized() -> Response {
    Response::json(&json!({"detail": "Could not validate credentials"})).with_status_code(401)
}

pub fn fake_api_handler(req: &Recorded) -> Response {
    if req.method == "POST" && req.path == "/token/" {
        if req.body.contains("username=op") && req.body.contains("password=secret") {
            return Response::json(&json!({"access_token": GOOD_TOKEN, "token_type": "bearer"}));
        }
        return Response::json(&json!({"detail": "Incorrect username or password"}))
            .with_status_code(401);
    }
    if req.authorization.as_deref() != Some("Bearer tok123") {
        return unauthorized();
    }
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/usuarios/ativos/") => {
            Response::json(&json!([{"id": 1, "nome": "Ana", "email": "ana@example.com"}]))
        }
        ("GET", "/usuarios/inativos/") => {
            Response::json(&json!([{"id": 2, "nome": "Bruno", "email": "bruno@example.com"}]))
        }
        ("GET", "/tipos/ativos/") => {
            Response::json(&json!([{"id": 1, "name": "Telefone", "descricao": "Fixo ou celular"}]))
        }
        ("GET", "/tipos/inativos/") => Response::json(&json!([])),
        ("GET", "/contatos/ativos/") => Response::json(&json!([
            {"id": 1, "idtipo": 1, "idusuario": 1, "nome": "Celular", "valor": "11 99999-0000"},
            {"id": 2, "idtipo": 1, "idusuario": 2, "nome": "Casa", "valor": "11 3333-0000"},
        ])),
        ("GET", "/contatos/inativos/") => Response::json(&json!([])),
        ("POST", "/usuario/") | ("POST", "/tipo/") | ("POST", "/contato/") => {
            Response::json(&json!({"id": 99})).with_status_code(201)
        }
        ("PUT", path) if path.ends_with("/status/") => Response::json(&json!({"ok": true})),
        _ => Response::empty_404(),
    }
}

/// A server that answers every request with a 401 whose body is cut off mid-way, so the client
/// fails while reading it. Serves until the test process exits.
pub fn truncated_unauthorized() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind raw server");
    let url = format!("http://{}", listener.local_addr().unwrap());
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(
                b"HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"detail\"",
            );
        }
    });
    url
}

pub struct Harness {
    pub console: Console,
    pub store: Arc<MemoryStore>,
    pub notices: RecordingNotifier,
}

/// A console pointed at `server`, with an in-memory credential store seeded with `credential`.
pub fn console(server: &StubServer, credential: Option<&str>) -> Harness {
    console_at(&server.url, credential)
}

pub fn console_at(url: &str, credential: Option<&str>) -> Harness {
    let store = Arc::new(match credential {
        Some(c) => MemoryStore::with_credential(c),
        None => MemoryStore::new(),
    });
    let notices = RecordingNotifier::new();
    let session = Session::startup(Box::new(store.clone()), Arc::new(notices.clone())).unwrap();
    let client = ApiClient::new(ClientConfig::new(url), session).unwrap();
    Harness {
        console: Console::from_client(client),
        store,
        notices,
    }
}
