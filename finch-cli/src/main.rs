//! Thin command-line client for a running `finch-server`. Connects over a
//! WebSocket, sends a single control update and/or an SLM image upload, and
//! exits — it does not stay connected to watch the resulting frame stream.

use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use clap::Parser;
use finch_protocol::{ClientMessage, ControlValue, ValueWrapper};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid argument: {0}")]
    Usage(String),
    #[error("connection to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("sending message failed: {0}")]
    Send(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("reading image file failed: {0}")]
    ImageFile(#[from] std::io::Error),
}

impl CliError {
    /// Usage errors exit 1, everything that happens after the arguments
    /// parsed successfully (connect, send, I/O) exits 2.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 1,
            _ => 2,
        }
    }
}

/// Send one-shot control updates or an SLM image to a finch-server instance.
#[derive(Debug, Parser)]
#[command(author, version, about = "One-shot control client for finch-server")]
struct CliArgs {
    /// WebSocket URL of the running finch-server.
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws")]
    url: String,

    /// Control assignments as name=value, e.g. gain=2.5 exposure_us=4000
    #[arg(value_parser = parse_key_val)]
    controls: Vec<(String, String)>,

    /// Path to an image file to upload to the SLM display, base64-encoded.
    #[arg(long)]
    image: Option<PathBuf>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    if name.is_empty() {
        return Err(format!("empty control name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// A bare control value on the command line is just text; guess the
/// narrowest `ControlValue` variant it parses as rather than always
/// sending a string.
fn parse_control_value(raw: &str) -> ControlValue {
    if let Ok(v) = raw.parse::<i64>() {
        ControlValue::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        ControlValue::Float(v)
    } else if let Ok(v) = raw.parse::<bool>() {
        ControlValue::Boolean(v)
    } else {
        ControlValue::Text(raw.to_string())
    }
}

fn build_message(args: &CliArgs) -> Result<ClientMessage, CliError> {
    if args.controls.is_empty() && args.image.is_none() {
        return Err(CliError::Usage(
            "nothing to do: pass at least one name=value control or --image".to_string(),
        ));
    }

    let mut msg = ClientMessage::default();

    if !args.controls.is_empty() {
        let mut set_control = std::collections::BTreeMap::new();
        for (name, raw) in &args.controls {
            set_control.insert(name.clone(), parse_control_value(raw));
        }
        msg.set_control = Some(set_control);
    }

    if let Some(path) = &args.image {
        let bytes = std::fs::read(path)?;
        let encoded = general_purpose::STANDARD.encode(bytes);
        msg.slm_image = Some(finch_protocol::SlmImage::Base64(encoded));
    }

    Ok(msg)
}

async fn send_once(url: &str, msg: &ClientMessage) -> Result<(), CliError> {
    let (mut socket, _response) =
        tokio_tungstenite::connect_async(url)
            .await
            .map_err(|source| CliError::Connect {
                url: url.to_string(),
                source,
            })?;

    let text = serde_json::to_string(msg).expect("ClientMessage always serializes");
    socket.send(WsMessage::Text(text.into())).await?;
    SinkExt::close(&mut socket).await?;
    while socket.next().await.is_some() {
        // Drain any closing handshake frames so the server-side close
        // completes cleanly instead of looking like a dropped connection.
    }
    Ok(())
}

async fn run(args: CliArgs) -> Result<(), CliError> {
    let msg = build_message(&args)?;
    send_once(&args.url, &msg).await?;
    info!("sent {} control(s) to {}", args.controls.len(), args.url);
    Ok(())
}

fn main() {
    let _guard = env_tracing_logger::init();
    let args = CliArgs::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    if let Err(e) = runtime.block_on(run(args)) {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
}

// Unused in the default build but documents the intended meaning of the
// `ValueWrapper` import for anyone extending this client to echo the
// server's own wrapped-value wire shape in a future command.
#[allow(dead_code)]
fn _assert_value_wrapper_shape(v: ValueWrapper<bool>) -> bool {
    v.value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_key_value_pair() {
        assert_eq!(
            parse_key_val("gain=2.5").unwrap(),
            ("gain".to_string(), "2.5".to_string())
        );
    }

    #[test]
    fn rejects_pair_without_equals() {
        assert!(parse_key_val("gain").is_err());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(parse_key_val("=2.5").is_err());
    }

    #[test]
    fn control_value_guesses_narrowest_type() {
        assert_eq!(parse_control_value("4000"), ControlValue::Integer(4000));
        assert_eq!(parse_control_value("2.5"), ControlValue::Float(2.5));
        assert_eq!(parse_control_value("true"), ControlValue::Boolean(true));
        assert_eq!(
            parse_control_value("auto"),
            ControlValue::Text("auto".to_string())
        );
    }

    #[test]
    fn build_message_rejects_empty_invocation() {
        let args = CliArgs {
            url: "ws://localhost:8000/ws".to_string(),
            controls: vec![],
            image: None,
        };
        let err = build_message(&args).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn build_message_sets_control_map() {
        let args = CliArgs {
            url: "ws://localhost:8000/ws".to_string(),
            controls: vec![("gain".to_string(), "3.0".to_string())],
            image: None,
        };
        let msg = build_message(&args).unwrap();
        let controls = msg.set_control.unwrap();
        assert_eq!(controls.get("gain"), Some(&ControlValue::Float(3.0)));
    }
}
