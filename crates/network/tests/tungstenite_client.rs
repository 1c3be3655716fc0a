// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! End-to-end tests of the realtime client over real sockets against an in-process
//! `tokio-tungstenite` server.

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use psichat_network::{
    RealtimeClient, RealtimeConfig, RealtimeError,
    mode::ConnectionState,
    websocket::{SessionId, UserId},
};
use rstest::rstest;
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

struct TestServer {
    url: String,
    accepted: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

/// Starts a server running `on_socket` for every accepted connection, with its index.
async fn start_server<F, Fut>(on_socket: F) -> TestServer
where
    F: Fn(WebSocketStream<TcpStream>, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));
    let paths = Arc::new(Mutex::new(Vec::new()));

    let server_accepted = accepted.clone();
    let server_paths = paths.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let paths = server_paths.clone();
            let callback = move |request: &Request, response: Response| {
                paths.lock().unwrap().push(request.uri().to_string());
                Ok(response)
            };
            if let Ok(ws) = accept_hdr_async(stream, callback).await {
                let index = server_accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(on_socket(ws, index));
            }
        }
    });

    TestServer {
        url,
        accepted,
        paths,
    }
}

async fn echo(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(message)) = ws.next().await {
        if message.is_close() {
            break;
        }
        if message.is_text() && ws.send(message).await.is_err() {
            break;
        }
    }
}

async fn close_normally(mut ws: WebSocketStream<TcpStream>) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "bye".into(),
    };
    _ = ws.close(Some(frame)).await;
    while ws.next().await.is_some() {}
}

fn config(url: &str) -> RealtimeConfig {
    RealtimeConfig {
        base_url: url.to_string(),
        connect_timeout_ms: 2_000,
        reconnect_delay_ms: 50,
        max_reconnect_attempts: 5,
    }
}

async fn wait_for(condition: impl Fn() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[rstest]
#[tokio::test]
async fn test_round_trip_through_echo_server() {
    let server = start_server(|ws, _| echo(ws)).await;
    let client = RealtimeClient::with_default_connector(config(&server.url));
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.subscribe("tutor_chat_message", move |payload| {
        _ = tx.send(payload.clone());
    });

    client
        .connect_as_tutor_for_session(SessionId::new(7), UserId::new(42), "tok")
        .await
        .unwrap();
    client.send_tutor_chat_message(SessionId::new(7), "hello");

    let echoed: Value = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        echoed,
        json!({"type": "tutor_chat_message", "session_id": 7, "content": "hello"})
    );
    assert_eq!(
        *server.paths.lock().unwrap(),
        vec!["/ws/tutor-chat/7?token=tok".to_string()]
    );

    client.disconnect().await;
    assert!(!client.is_connected());
}

#[rstest]
#[tokio::test]
async fn test_handshake_rejection_is_authentication_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let callback = |_request: &Request, _response: Response| {
                let rejection: ErrorResponse = tokio_tungstenite::tungstenite::http::Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .body(Some("invalid token".to_string()))
                    .unwrap();
                Err(rejection)
            };
            _ = accept_hdr_async(stream, callback).await;
        }
    });
    let client = RealtimeClient::with_default_connector(config(&url));

    let result = client.connect_as_user(UserId::new(1), "bad").await;

    assert!(
        matches!(result, Err(RealtimeError::AuthenticationRejected { .. })),
        "unexpected result {result:?}"
    );
    assert_eq!(client.connection_state(), ConnectionState::Failed);
}

#[rstest]
#[tokio::test]
async fn test_server_normal_close_is_not_retried() {
    let server = start_server(|ws, _| close_normally(ws)).await;
    let client = RealtimeClient::with_default_connector(config(&server.url));

    client.connect_as_user(UserId::new(1), "tok").await.unwrap();

    assert!(wait_for(|| client.connection_state() == ConnectionState::Idle).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.accepted.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected());
}

#[rstest]
#[tokio::test]
async fn test_dropped_connection_is_reestablished() {
    let server = start_server(|ws, index| async move {
        if index == 0 {
            drop(ws);
        } else {
            echo(ws).await;
        }
    })
    .await;
    let client = RealtimeClient::with_default_connector(config(&server.url));

    client.connect_as_user(UserId::new(1), "tok").await.unwrap();

    let accepted = server.accepted.clone();
    assert!(wait_for(|| accepted.load(Ordering::SeqCst) >= 2).await);
    assert!(wait_for(|| client.is_connected()).await);
    assert_eq!(
        *server.paths.lock().unwrap(),
        vec!["/ws/1?token=tok".to_string(), "/ws/1?token=tok".to_string()]
    );
}
