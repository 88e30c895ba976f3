//! Line-oriented terminal front end for a [`Session`].
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/link <url>` | ingest a folder (a bare URL works too before the first folder) |
//! | `/notes`, `/questions` | print the generated study material |
//! | `/history` | print the transcript |
//! | `/reset` | clear the conversation, keep the corpus |
//! | `/help` | list commands |
//! | `/quit` | exit |
//! | anything else | ask a question; the answer streams as it arrives |

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::session::{Session, SessionState};

const HELP: &str = "\
Commands:
  /link <url>   load a folder of notes
  /notes        show the generated notes
  /questions    show the generated questions
  /history      show the conversation so far
  /reset        start a new conversation on the same notes
  /quit         exit
Anything else is sent as a question.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Link(String),
    Notes,
    Questions,
    History,
    Reset,
    Help,
    Quit,
    Chat(String),
    Unknown(String),
    Blank,
}

/// Classify one input line. A bare URL counts as a link only while no
/// folder has been loaded, so later URLs can still be asked about.
pub fn parse_command(line: &str, state: SessionState) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Blank;
    }
    if let Some(rest) = line.strip_prefix('/') {
        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        return match name {
            "link" => Command::Link(arg.trim().to_string()),
            "notes" => Command::Notes,
            "questions" => Command::Questions,
            "history" => Command::History,
            "reset" => Command::Reset,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        };
    }
    if state == SessionState::Empty && looks_like_url(line) {
        return Command::Link(line.to_string());
    }
    Command::Chat(line.to_string())
}

fn looks_like_url(line: &str) -> bool {
    (line.starts_with("http://") || line.starts_with("https://"))
        && !line.contains(char::is_whitespace)
}

/// Read commands from `input` until `/quit` or end of input.
pub async fn run<R, W>(session: &mut Session, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if let Some(welcome) = session.history().first() {
        writeln!(out, "{}", welcome.text)?;
    }
    writeln!(out, "Type /help for commands.")?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match parse_command(&line, session.state()) {
            Command::Blank => {}
            Command::Quit => break,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Unknown(name) => {
                writeln!(out, "Unknown command /{}. Type /help for commands.", name)?
            }
            Command::Link(url) => load_folder(session, &url, out).await?,
            Command::Notes => print_material(out, "Notes", &session.study_material().notes)?,
            Command::Questions => {
                print_material(out, "Questions", &session.study_material().questions)?
            }
            Command::History => {
                for message in session.history() {
                    writeln!(out, "{}: {}", message.role.label(), message.text)?;
                }
            }
            Command::Reset => {
                if session.state() == SessionState::Empty {
                    writeln!(out, "Nothing to reset; load a folder first.")?;
                } else {
                    session.reset();
                    writeln!(out, "Conversation cleared.")?;
                }
            }
            Command::Chat(text) => chat(session, &text, out).await?,
        }
    }
    Ok(())
}

async fn load_folder<W: Write>(session: &mut Session, url: &str, out: &mut W) -> Result<()> {
    writeln!(out, "Loading folder...")?;
    out.flush()?;
    match session.submit_link(url).await {
        Ok(report) => {
            writeln!(
                out,
                "Loaded {} document(s) from folder {} ({} chunks indexed).",
                report.documents, report.folder, report.chunks
            )?;
            let material = session.study_material();
            if !material.notes.is_empty() {
                print_material(out, "Notes", &material.notes)?;
                print_material(out, "Questions", &material.questions)?;
            }
        }
        Err(e) => writeln!(out, "error: {}", e)?,
    }
    Ok(())
}

async fn chat<W: Write>(session: &mut Session, text: &str, out: &mut W) -> Result<()> {
    let mut turn = match session.begin_turn(text).await {
        Ok(turn) => turn,
        Err(e) => {
            writeln!(out, "error: {}", e)?;
            return Ok(());
        }
    };
    loop {
        match turn.next_fragment().await {
            Ok(Some(fragment)) => {
                write!(out, "{}", fragment)?;
                out.flush()?;
            }
            Ok(None) => {
                writeln!(out)?;
                break;
            }
            Err(e) => {
                writeln!(out)?;
                writeln!(out, "error: {}", e)?;
                break;
            }
        }
    }
    Ok(())
}

fn print_material<W: Write>(out: &mut W, title: &str, body: &str) -> Result<()> {
    if body.is_empty() {
        writeln!(out, "No {} yet. Load a folder with /link <url>.", title.to_lowercase())?;
        return Ok(());
    }
    writeln!(out, "── {} ──", title)?;
    writeln!(out, "{}", body.trim_end())?;
    Ok(())
}
