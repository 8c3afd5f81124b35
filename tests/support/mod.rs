//! In-process stand-in for the Gitea REST API.
//!
//! Only what the tests touch is implemented: admin user CRUD, version,
//! unadopted repositories, a header echo and a deliberately slow route.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

pub const TOKEN: &str = "secret-token";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct State {
    users: BTreeMap<String, Value>,
    next_id: u64,
    requests: Vec<Recorded>,
}

pub struct FakeGitea {
    pub base_url: String,
    state: Arc<Mutex<State>>,
}

impl FakeGitea {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let state = Arc::new(Mutex::new(State::default()));
        let shared = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let state = shared.clone();
                thread::spawn(move || serve(stream, &state));
            }
        });
        Self { base_url, state }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }
}

/// Base URL of a port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

fn serve(stream: TcpStream, state: &Mutex<State>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).expect("read body");

    let recorded = Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let reply = route(&recorded, state);
    state.lock().unwrap().requests.push(recorded);
    write_reply(stream, reply);
}

struct Reply {
    status: u16,
    content_type: &'static str,
    extra_headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            extra_headers: Vec::new(),
            body: value.to_string(),
        }
    }

    fn text(status: u16, text: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            extra_headers: Vec::new(),
            body: text.to_string(),
        }
    }

    fn empty(status: u16) -> Self {
        Self::text(status, "")
    }
}

fn route(req: &Recorded, state: &Mutex<State>) -> Reply {
    let path = req.target.split('?').next().unwrap_or_default();
    let Some(rest) = path.strip_prefix("/api/v1/") else {
        return Reply::text(404, "404 page not found");
    };
    let expected = format!("token {TOKEN}");
    let authorized = req.header("authorization") == Some(expected.as_str());
    let segments: Vec<&str> = rest.split('/').collect();

    match (req.method.as_str(), segments.as_slice()) {
        ("GET", ["version"]) => Reply::json(200, &json!({"version": "1.21.0"})),
        ("GET", ["echo"]) => {
            let query = req.target.split_once('?').map(|(_, q)| q).unwrap_or_default();
            let mut reply = Reply::json(200, &json!({"query": query}));
            reply.extra_headers.push(("X-Multi", "a".to_string()));
            reply.extra_headers.push(("X-Multi", "b".to_string()));
            reply
        }
        ("GET", ["slow"]) => {
            thread::sleep(Duration::from_secs(2));
            Reply::json(200, &json!({}))
        }
        (_, ["admin", ..]) if !authorized => {
            Reply::json(401, &json!({"message": "token is required"}))
        }
        ("GET", ["admin", "users"]) => {
            let users: Vec<Value> = state.lock().unwrap().users.values().cloned().collect();
            Reply::json(200, &Value::Array(users))
        }
        ("POST", ["admin", "users"]) => {
            let body = req.json();
            let login = body["username"].as_str().unwrap_or_default().to_string();
            let mut state = state.lock().unwrap();
            if state.users.contains_key(&login) {
                let message = format!("user already exists [name: {login}]");
                return Reply::json(422, &json!({ "message": message }));
            }
            state.next_id += 1;
            let user = json!({
                "id": state.next_id,
                "login": login,
                "email": body["email"],
                "active": true
            });
            state.users.insert(login, user.clone());
            Reply::json(201, &user)
        }
        ("PATCH", ["admin", "users", name]) => {
            let mut state = state.lock().unwrap();
            let Some(user) = state.users.get_mut(*name) else {
                return Reply::json(404, &json!({"message": "user does not exist"}));
            };
            if let (Some(user), Some(edit)) = (user.as_object_mut(), req.json().as_object()) {
                for (k, v) in edit {
                    user.insert(k.clone(), v.clone());
                }
            }
            Reply::json(200, user)
        }
        ("DELETE", ["admin", "users", name]) => {
            if state.lock().unwrap().users.remove(*name).is_some() {
                Reply::empty(204)
            } else {
                Reply::json(404, &json!({"message": "user does not exist"}))
            }
        }
        ("GET", ["admin", "unadopted"]) => Reply::json(200, &json!(["org/lost-repo"])),
        ("POST", ["admin", "unadopted"]) => Reply::empty(204),
        ("DELETE", ["admin", "unadopted", _, _]) => Reply::empty(204),
        ("GET", ["users", name]) => match state.lock().unwrap().users.get(*name) {
            Some(user) => Reply::json(200, user),
            None => Reply::json(404, &json!({"message": "user does not exist"})),
        },
        ("PATCH", ["repos", _, _]) => Reply::json(200, &req.json()),
        _ => Reply::text(404, "404 page not found"),
    }
}

fn write_reply(mut stream: TcpStream, reply: Reply) {
    let reason = match reply.status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        _ => "Unknown",
    };
    let mut head = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Type: {}\r\nConnection: close\r\n",
        reply.status, reply.content_type
    );
    for (k, v) in &reply.extra_headers {
        head.push_str(&format!("{k}: {v}\r\n"));
    }
    if reply.status != 204 {
        head.push_str(&format!("Content-Length: {}\r\n", reply.body.len()));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    if reply.status != 204 {
        let _ = stream.write_all(reply.body.as_bytes());
    }
    let _ = stream.flush();
}
