use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  camera on|off     start or stop the camera
  detect            capture a frame and find music for it
  upload <path>     detect from an image file
  play              play/pause the current preview
  next | prev       move through the playlist
  select <n>        jump to track n (1-based)
  seek <percent>    scrub the current preview
  volume <percent>  set the volume
  mute              mute/unmute
  embed             show/hide the embedded player
  list | status     show the playlist or the current state
  token <value>     store a session token
  logout            forget the session token
  theme             switch between light and dark
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CameraOn,
    CameraOff,
    Detect,
    Upload(PathBuf),
    PlayPause,
    Next,
    Previous,
    Select(usize),
    Seek(f32),
    Volume(f32),
    Mute,
    Embed,
    List,
    Status,
    Token(String),
    Logout,
    Theme,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match (word.to_lowercase().as_str(), rest) {
        ("camera", "on") | ("start", "") => Command::CameraOn,
        ("camera", "off") | ("stop", "") => Command::CameraOff,
        ("detect", "") | ("capture", "") => Command::Detect,
        ("upload", path) if !path.is_empty() => Command::Upload(PathBuf::from(path)),
        ("play", "") | ("pause", "") | ("p", "") => Command::PlayPause,
        ("next", "") | ("n", "") => Command::Next,
        ("prev", "") | ("previous", "") => Command::Previous,
        ("select", n) => {
            let n: usize = n
                .parse()
                .with_context(|| format!("Invalid track number: {:?}", n))?;
            if n == 0 {
                return Err(anyhow::anyhow!("Track numbers start at 1"));
            }
            Command::Select(n - 1)
        }
        ("seek", pct) => Command::Seek(parse_percent(pct)?),
        ("volume", pct) | ("vol", pct) => Command::Volume(parse_percent(pct)?),
        ("mute", "") => Command::Mute,
        ("embed", "") => Command::Embed,
        ("list", "") | ("ls", "") => Command::List,
        ("status", "") => Command::Status,
        ("token", token) if !token.is_empty() => Command::Token(token.to_string()),
        ("logout", "") => Command::Logout,
        ("theme", "") => Command::Theme,
        ("help", "") | ("?", "") => Command::Help,
        ("quit", "") | ("exit", "") | ("q", "") => Command::Quit,
        _ => return Err(anyhow::anyhow!("Unknown command: {} (try 'help')", line)),
    };

    Ok(Some(command))
}

fn parse_percent(value: &str) -> Result<f32> {
    let number = value.trim_end_matches('%');
    let pct: f32 = number
        .parse()
        .with_context(|| format!("Invalid percentage: {:?}", value))?;
    if !(0.0..=100.0).contains(&pct) {
        return Err(anyhow::anyhow!("Percentage must be between 0 and 100"));
    }
    Ok(pct / 100.0)
}

/// Read commands from stdin and forward them until EOF.
///
/// EOF does not quit: without a terminal the app keeps running until Ctrl+C.
pub async fn read_commands(tx: mpsc::Sender<Command>) -> Result<()> {
    forward_commands(BufReader::new(tokio::io::stdin()), tx).await
}

async fn forward_commands<R: AsyncBufRead + Unpin>(
    reader: R,
    tx: mpsc::Sender<Command>,
) -> Result<()> {
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_command(&line) {
            Ok(Some(command)) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }
    }

    tracing::debug!("stdin closed, waiting for Ctrl+C");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_commands() {
        assert_eq!(parse_command("play").unwrap(), Some(Command::PlayPause));
        assert_eq!(parse_command("  NEXT ").unwrap(), Some(Command::Next));
        assert_eq!(parse_command("select 3").unwrap(), Some(Command::Select(2)));
        assert_eq!(parse_command("seek 50%").unwrap(), Some(Command::Seek(0.5)));
        assert_eq!(parse_command("volume 0").unwrap(), Some(Command::Volume(0.0)));
    }

    #[test]
    fn test_parse_upload_keeps_spaces() {
        assert_eq!(
            parse_command("upload /tmp/my face.png").unwrap(),
            Some(Command::Upload(PathBuf::from("/tmp/my face.png")))
        );
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[tokio::test]
    async fn test_forward_skips_bad_lines_and_stops_at_eof() {
        let (tx, mut rx) = mpsc::channel(8);
        forward_commands(&b"next\ndance\n\nselect 2\n"[..], tx)
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(Command::Next));
        assert_eq!(rx.recv().await, Some(Command::Select(1)));
        // No Quit is synthesized at EOF; the channel just closes.
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_command("select 0").is_err());
        assert!(parse_command("select two").is_err());
        assert!(parse_command("seek 150").is_err());
        assert!(parse_command("upload").is_err());
        assert!(parse_command("dance").is_err());
    }
}
