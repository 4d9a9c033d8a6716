//! One-shot prompt command: send, print, exit.

use std::error::Error;
use std::io::{self, Write};

use tracing::debug;

use crate::api::{ChatMessage, ChatRequest, Role};
use crate::auth::TokenIssuer;
use crate::core::chat_stream::{ChatClient, ClientConfig, StreamEvent};
use crate::core::config::{resolve_session, Config};

pub async fn run_say(
    prompt: Vec<String>,
    model: Option<String>,
    system: Option<String>,
    base_url: Option<String>,
    no_stream: bool,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: glint <prompt>");
        std::process::exit(2);
    }

    let config = Config::load()?;
    let session = resolve_session(&config, model.as_deref(), base_url.as_deref())?;

    let issuer = match TokenIssuer::new(&session.api_key) {
        Ok(issuer) => issuer,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    let client = ChatClient::new(ClientConfig {
        base_url: session.base_url,
        token: issuer.issue(),
        http: None,
    });

    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(ChatMessage::new(Role::System, system));
    }
    messages.push(ChatMessage::new(Role::User, prompt));

    let request = ChatRequest {
        model: session.model,
        messages,
        stream: false,
    };

    if no_stream {
        let response = client.complete(request).await?;
        match response.first_content() {
            Some(content) => println!("{content}"),
            None => println!("(no content)"),
        }
        debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            total_tokens = response.usage.total_tokens,
            "token usage"
        );
        return Ok(());
    }

    let mut rx = client.stream(request);
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Fragment(content) => {
                print!("{content}");
                io::stdout().flush()?;
            }
            StreamEvent::Malformed(detail) => {
                eprintln!("warning: skipped undecodable stream line: {detail}");
            }
            StreamEvent::Failed(err) => {
                eprintln!("\nError: {err}");
                std::process::exit(1);
            }
            StreamEvent::Done => break,
        }
    }
    println!();

    Ok(())
}
