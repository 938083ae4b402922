#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::thread;

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).expect("read should succeed");
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Accepts one connection, answers it with `response` and returns the raw request.
pub fn serve_once(response: String) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        let request = read_request(&mut stream);
        stream
            .write_all(response.as_bytes())
            .expect("write should succeed");
        request
    });
    (format!("http://{addr}"), handle)
}

pub fn delta(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
    )
}

pub fn sse_response(body: &str) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}")
}

pub fn hi_there_response() -> String {
    sse_response(&format!(
        "{}{}{}data: [DONE]\n\n",
        delta("Hi"),
        delta(" there"),
        delta("!")
    ))
}

/// One-shot `deep-chat <prompt>` against `base_url` with a clean model environment.
pub fn one_shot_command(base_url: &str, prompt: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_deep-chat"));
    cmd.arg(prompt)
        .env("MODEL_PROVIDER", "deepseek")
        .env("MODEL_BASE_URL", base_url)
        .env("DEEPSEEK_API_KEY", "sk-integration")
        .env("RUST_LOG", "off")
        .env("LOG_OUTPUT", "stderr")
        .env_remove("LOG_FORMAT")
        .env_remove("LOG_FILE_PATH")
        .env_remove("MODEL")
        .env_remove("MODEL_TEMPERATURE")
        .env_remove("MODEL_MAX_TOKENS")
        .env_remove("SYSTEM_PROMPT")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy");
    cmd
}
