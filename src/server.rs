//! Webhook server: the accept loop answers every request immediately and
//! defers dispatch work to a worker thread over an mpsc queue, so a slow
//! model call never stalls ingestion of the next delivery.

use std::io::{self, Read};
use std::sync::mpsc;
use std::thread;

use tiny_http::{Method, Response, Server};

use crate::catalog::PersonaCatalog;
use crate::config::BotConfig;
use crate::dispatch::Dispatcher;
use crate::events::callback_ack_id;
use crate::gateway::CompletionGateway;
use crate::telegram::TelegramSink;

pub(crate) fn parse_json_body(request: &mut tiny_http::Request) -> Result<serde_json::Value, String> {
    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .map_err(|e| format!("read body: {e}"))?;
    if body.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(&body).map_err(|e| format!("json: {e}"))
}

fn respond_json(request: tiny_http::Request, body: &str) {
    let mut response = Response::from_string(body);
    if let Ok(header) = tiny_http::Header::from_bytes("Content-Type", "application/json") {
        response.add_header(header);
    }
    let _ = request.respond(response);
}

/// Consume queued payloads and run the dispatcher on each. A panicking
/// dispatch is logged and the worker keeps draining.
fn run_dispatch_worker<G>(
    rx: mpsc::Receiver<serde_json::Value>,
    catalog: PersonaCatalog,
    config: BotConfig,
    gateway: G,
    sink: TelegramSink,
) where
    G: CompletionGateway,
{
    for payload in rx {
        if let Some(callback_id) = callback_ack_id(&payload) {
            sink.answer_callback(&callback_id);
        }
        let dispatcher = Dispatcher {
            catalog: &catalog,
            db_path: &config.db_path,
            gateway: &gateway,
        };
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatcher.handle_update(&payload)
        }));
        match outcome {
            Ok(Some(msg)) => sink.deliver(&msg),
            Ok(None) => {}
            Err(panic_info) => {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "dispatch panicked".to_string()
                };
                eprintln!("[server] dispatch crashed: {msg}");
            }
        }
    }
}

pub(crate) fn run_server<G>(
    bind: &str,
    port: u16,
    config: BotConfig,
    catalog: PersonaCatalog,
    gateway: G,
    sink: TelegramSink,
) -> Result<(), Box<dyn std::error::Error>>
where
    G: CompletionGateway + Send + 'static,
{
    let addr = format!("{bind}:{port}");
    let server = Server::http(&addr)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("server: {e}")))?;
    eprintln!("[server] webhook server listening on http://{addr}");
    if !sink.is_configured() {
        eprintln!("[server] TELEGRAM_TOKEN not set, outbound messages will be dropped");
    }

    let (tx, rx) = mpsc::channel::<serde_json::Value>();
    let worker = thread::spawn(move || {
        run_dispatch_worker(rx, catalog, config, gateway, sink);
    });

    for mut request in server.incoming_requests() {
        let url = request.url().to_string();
        if *request.method() == Method::Post && url == "/webhook" {
            match parse_json_body(&mut request) {
                Ok(payload) => {
                    if tx.send(payload).is_err() {
                        eprintln!("[server] dispatch worker is gone, dropping update");
                    }
                }
                Err(err) => {
                    eprintln!("[server] unreadable webhook body: {err}");
                }
            }
            respond_json(request, "{\"ok\":true}");
        } else if *request.method() == Method::Get && url == "/health" {
            respond_json(request, "{\"status\":\"ok\"}");
        } else {
            let _ = request.respond(Response::from_string("ok"));
        }
    }

    drop(tx);
    let _ = worker.join();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PersonaCatalog, builtin_personas};
    use crate::store::BotDb;
    use serde_json::json;

    struct NullGateway;

    impl CompletionGateway for NullGateway {
        fn complete(&self, _system_prompt: &str, _user_text: &str) -> String {
            "ответ".to_string()
        }
    }

    #[test]
    fn worker_drains_queue_and_exits_when_sender_drops() {
        let dir = std::env::temp_dir().join("personabot_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("test_{}_worker.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let db = BotDb::open_or_create(&path).unwrap();
        db.seed_builtins(&builtin_personas()).unwrap();
        let catalog = PersonaCatalog::load(&db).unwrap();
        drop(db);

        let config = BotConfig {
            db_path: path.clone(),
            base_url: None,
            admin_ids: Vec::new(),
        };
        let (tx, rx) = mpsc::channel();
        tx.send(json!({
            "callback_query": {"id": "cb", "data": "set:temur", "message": {"chat": {"id": 9}}}
        }))
        .unwrap();
        tx.send(json!({"unknown": "shape"})).unwrap();
        drop(tx);

        // Sink built in a test environment without TELEGRAM_TOKEN: the
        // worker still applies state changes, deliveries are dropped.
        run_dispatch_worker(rx, catalog, config, NullGateway, TelegramSink::from_env());

        let db = BotDb::open_or_create(&path).unwrap();
        assert_eq!(db.get_active(9).unwrap(), Some("temur".to_string()));

        std::fs::remove_file(&path).ok();
    }
}
