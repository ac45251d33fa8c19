//! Legacy HTTP+SSE transport against a small in-process server.
//!
//! The server keeps the `GET /sse` stream open, announces a relative
//! `endpoint`, answers POSTed requests as `message` events and ends the
//! stream when asked to call the `hang` tool.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use toolgate_core::{
    GatewaySettings, ServerConfig, ToolArguments, ToolTransport, TransportConnector,
    TransportError,
};
use toolgate_mcp::McpConnector;

const ENDPOINT: &str = "/messages?session=abc";

struct Request {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct LegacyServer {
    events: Mutex<Option<mpsc::UnboundedSender<String>>>,
    authorizations: Mutex<Vec<Option<String>>>,
    methods: Mutex<Vec<String>>,
}

impl LegacyServer {
    fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    fn authorizations(&self) -> Vec<Option<String>> {
        self.authorizations.lock().unwrap().clone()
    }

    /// The event to push on the stream for this POST, if any.
    fn answer(&self, request: &Request) -> Option<String> {
        let message: Value = serde_json::from_slice(&request.body).ok()?;
        let method = message["method"].as_str()?.to_string();
        self.methods.lock().unwrap().push(method.clone());
        let id = message.get("id")?.clone();

        let result = match method.as_str() {
            "initialize" => json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "legacy", "version": "1.0.0"}
            }),
            "tools/list" => json!({
                "tools": [{"name": "lookup", "description": "Look things up"}]
            }),
            "tools/call" if message["params"]["name"] == "hang" => {
                // Dropping the sender ends the event stream
                self.events.lock().unwrap().take();
                return None;
            }
            "tools/call" => {
                let query = message["params"]["arguments"]["q"]
                    .as_str()
                    .unwrap_or_default();
                json!({"content": [{"type": "text", "text": format!("looked up {query}")}]})
            }
            _ => return None,
        };

        let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
        Some(format!("event: message\ndata: {response}\n\n"))
    }

    fn push(&self, event: String) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Request> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed.split_once(':')?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await.ok()?;

    Some(Request {
        method,
        target,
        headers,
        body,
    })
}

async fn serve_connection(stream: TcpStream, server: Arc<LegacyServer>) {
    let mut reader = BufReader::new(stream);
    while let Some(request) = read_request(&mut reader).await {
        server
            .authorizations
            .lock()
            .unwrap()
            .push(request.header("authorization").map(ToString::to_string));

        match (request.method.as_str(), request.target.as_str()) {
            ("GET", "/sse") => {
                let (tx, mut rx) = mpsc::unbounded_channel();
                *server.events.lock().unwrap() = Some(tx);

                // No content-length: the body runs until the socket closes
                let stream = reader.get_mut();
                let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\n\r\n";
                let endpoint = format!(": hello\n\nevent: endpoint\ndata: {ENDPOINT}\n\n");
                if stream.write_all(head.as_bytes()).await.is_err()
                    || stream.write_all(endpoint.as_bytes()).await.is_err()
                {
                    return;
                }
                while let Some(event) = rx.recv().await {
                    if stream.write_all(event.as_bytes()).await.is_err() {
                        return;
                    }
                }
                return;
            }
            ("POST", ENDPOINT) => {
                let event = server.answer(&request);
                let accepted = b"HTTP/1.1 202 Accepted\r\ncontent-length: 0\r\n\r\n";
                if reader.get_mut().write_all(accepted).await.is_err() {
                    return;
                }
                if let Some(event) = event {
                    server.push(event);
                }
            }
            _ => {
                let missing = b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n";
                if reader.get_mut().write_all(missing).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn spawn_server() -> (String, Arc<LegacyServer>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = Arc::new(LegacyServer::default());

    let accepting = Arc::clone(&server);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, Arc::clone(&accepting)));
        }
    });

    (url, server)
}

fn settings() -> GatewaySettings {
    GatewaySettings {
        handshake_timeout_secs: Some(5),
        ..GatewaySettings::with_defaults()
    }
}

async fn connect(config: &ServerConfig) -> Arc<dyn ToolTransport> {
    match McpConnector::new(&settings()).connect(config).await {
        Ok(transport) => transport,
        Err(e) => panic!("handshake failed: {e}"),
    }
}

#[tokio::test]
async fn sse_session_round_trip() {
    let (url, server) = spawn_server().await;
    let config =
        ServerConfig::remote_sse("legacy", "Legacy", format!("{url}/sse")).with_bearer_token("secret");
    let transport = connect(&config).await;

    let tools = transport.list_tools().await.expect("list tools");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "lookup");
    assert_eq!(tools[0].description.as_deref(), Some("Look things up"));

    let mut arguments = ToolArguments::new();
    arguments.insert("q".to_string(), json!("rust"));
    let result = transport
        .call_tool("lookup", arguments)
        .await
        .expect("call tool");
    assert!(result.success);
    assert_eq!(result.data.unwrap()[0]["text"], "looked up rust");

    assert_eq!(
        server.methods(),
        vec![
            "initialize",
            "notifications/initialized",
            "tools/list",
            "tools/call"
        ]
    );
    let authorizations = server.authorizations();
    assert_eq!(authorizations.len(), 5);
    assert!(
        authorizations
            .iter()
            .all(|a| a.as_deref() == Some("Bearer secret"))
    );

    transport.close().await;
}

#[tokio::test]
async fn sse_stream_end_fails_in_flight_call() {
    let (url, _server) = spawn_server().await;
    let config = ServerConfig::remote_sse("legacy", "Legacy", format!("{url}/sse"));
    let transport = connect(&config).await;

    let err = transport
        .call_tool("hang", ToolArguments::new())
        .await
        .expect_err("stream ended before the response");
    assert!(matches!(err, TransportError::Closed));

    assert!(matches!(
        transport.list_tools().await,
        Err(TransportError::Closed)
    ));
}
