use anyhow::{Context, Result};
use colored::Colorize;
use std::future::Future;
use std::io::{self, Write};
use tracing::{debug, warn};

use crate::completion::CompletionService;
use crate::config::Config;
use crate::editor::LineEditor;
use crate::error::TurnError;
use crate::model::{Message, Transcript};
use crate::turn::TurnProcessor;

pub const QUIT_SENTINELS: [&str; 2] = ["quit", "q"];
pub const SHELL_COMMANDS: [&str; 2] = ["/history", "/retry"];
pub const FAREWELL: &str = "agent: Goodbye!";
const REPLY_LABEL: &str = "agent: ";

/// Source of submitted input blocks. `None` means the input is closed.
pub trait InputSource {
    fn read_block(&mut self) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Prompting,
    Terminated,
}

#[derive(Debug, PartialEq, Eq)]
enum ShellInput<'a> {
    Quit,
    History,
    Retry,
    Message(&'a str),
}

fn classify(raw: &str) -> ShellInput<'_> {
    let text = raw.trim();
    if QUIT_SENTINELS
        .iter()
        .any(|sentinel| text.eq_ignore_ascii_case(sentinel))
    {
        ShellInput::Quit
    } else if text.eq_ignore_ascii_case("/history") {
        ShellInput::History
    } else if text.eq_ignore_ascii_case("/retry") {
        ShellInput::Retry
    } else {
        ShellInput::Message(text)
    }
}

pub async fn run_repl<S: CompletionService>(
    processor: &TurnProcessor<S>,
    transcript: &mut Transcript,
    cfg: &Config,
) -> Result<()> {
    let mut input = LineEditor::new(cfg)?;
    let mut out = io::stdout();
    let mut err_out = io::stderr();

    print_banner(&mut out, cfg).context("Failed to write banner")?;
    run_shell(
        processor,
        transcript,
        &mut input,
        &mut out,
        &mut err_out,
        interrupt_signal,
    )
    .await
}

/// Prompts until a quit sentinel or the end of input.
///
/// Replies go to `out`; failed turns are reported on `err_out`.
pub async fn run_shell<S, I, W, E, F, C>(
    processor: &TurnProcessor<S>,
    transcript: &mut Transcript,
    input: &mut I,
    out: &mut W,
    err_out: &mut E,
    mut interrupt: F,
) -> Result<()>
where
    S: CompletionService,
    I: InputSource,
    W: Write,
    E: Write,
    F: FnMut() -> C,
    C: Future<Output = ()>,
{
    let mut state = ShellState::Prompting;
    while state == ShellState::Prompting {
        state = match input.read_block()? {
            Some(raw) => step(processor, transcript, &raw, out, err_out, interrupt()).await?,
            None => {
                debug!("input closed");
                writeln!(out).context("Failed to write farewell")?;
                farewell(out)?
            }
        };
    }
    Ok(())
}

/// Handles one submitted block and returns the next state.
pub async fn step<S, W, E, C>(
    processor: &TurnProcessor<S>,
    transcript: &mut Transcript,
    raw: &str,
    out: &mut W,
    err_out: &mut E,
    cancel: C,
) -> Result<ShellState>
where
    S: CompletionService,
    W: Write,
    E: Write,
    C: Future<Output = ()>,
{
    let (labelled, outcome) = match classify(raw) {
        ShellInput::Quit => return farewell(out),
        ShellInput::History => {
            print_history(out, transcript.snapshot()).context("Failed to print history")?;
            return Ok(ShellState::Prompting);
        }
        ShellInput::Retry => {
            let labelled = transcript.has_dangling_user();
            if labelled {
                write_label(out)?;
            }
            (labelled, processor.retry(transcript, out, cancel).await)
        }
        ShellInput::Message(text) => {
            write_label(out)?;
            (true, processor.submit(transcript, text, out, cancel).await)
        }
    };

    match outcome {
        Ok(_) => {}
        Err(TurnError::Output(err)) => {
            return Err(err).context("Failed to write reply to the terminal");
        }
        Err(err) => {
            // End the partial reply line before the report.
            if labelled {
                writeln!(out).context("Failed to write reply to the terminal")?;
                out.flush().context("Failed to flush stdout")?;
            }
            report_turn_error(err_out, transcript, &err)?;
        }
    }
    Ok(ShellState::Prompting)
}

fn farewell<W: Write>(out: &mut W) -> Result<ShellState> {
    writeln!(out, "{FAREWELL}").context("Failed to write farewell")?;
    out.flush().context("Failed to flush stdout")?;
    Ok(ShellState::Terminated)
}

fn write_label<W: Write>(out: &mut W) -> Result<()> {
    write!(out, "{}", REPLY_LABEL.blue().bold()).context("Failed to write reply label")?;
    out.flush().context("Failed to flush stdout")
}

fn report_turn_error<W: Write>(out: &mut W, transcript: &Transcript, err: &TurnError) -> Result<()> {
    debug!(error = %err, dangling_user = transcript.has_dangling_user(), "reporting failed turn");
    writeln!(out, "{} {}", "error:".red().bold(), err)?;
    if transcript.has_dangling_user() {
        writeln!(
            out,
            "{}",
            "(your last message is still pending; type /retry to resend it)".bright_black()
        )?;
    }
    out.flush().context("Failed to flush stderr")
}

fn print_history<W: Write>(out: &mut W, history: &[Message]) -> io::Result<()> {
    for (idx, msg) in history.iter().enumerate() {
        writeln!(out, "[{}] {}: {}", idx, msg.role.as_str(), msg.content)?;
    }
    writeln!(out)
}

fn print_banner<W: Write>(out: &mut W, cfg: &Config) -> io::Result<()> {
    writeln!(
        out,
        "{}",
        "===================Welcome to the deep-chat AI agent===================="
            .blue()
            .bold()
    )?;
    writeln!(out, "model: {}", cfg.model)?;
    writeln!(
        out,
        "{}",
        "Type \"q\" to quit, \"esc + enter\" to send, \"enter\" for a new line. \
         /history shows the conversation, /retry resends an unanswered message."
            .on_red()
            .bold()
    )?;
    writeln!(out)
}

pub(crate) async fn interrupt_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; replies cannot be cancelled");
        std::future::pending::<()>().await;
    }
}
