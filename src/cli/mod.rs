//! Command-line interface parsing and handling.

pub mod say;

use std::error::Error;

use clap::Parser;

#[derive(Parser)]
#[command(name = "glint")]
#[command(about = "Send a prompt to a GLM chat endpoint and print the reply")]
#[command(
    long_about = "Glint sends one prompt to a GLM chat-completions endpoint and prints \
the reply, streamed incrementally by default.\n\n\
Environment Variables:\n\
  GLINT_API_KEY     Your GLM API key, \"<id>.<secret>\" (required)\n\
  GLINT_BASE_URL    Custom API base URL (optional)\n\
  GLINT_LOG         Log filter for diagnostics on stderr (optional)"
)]
pub struct Args {
    /// Prompt to send; multiple words are joined with spaces
    #[arg(value_name = "PROMPT", required = true)]
    pub prompt: Vec<String>,

    /// Model to use for the request
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// System message sent ahead of the prompt
    #[arg(short = 's', long)]
    pub system: Option<String>,

    /// Base URL of the chat API
    #[arg(short = 'u', long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Wait for the complete response instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    say::run_say(
        args.prompt,
        args.model,
        args.system,
        args.base_url,
        args.no_stream,
    )
    .await
}
