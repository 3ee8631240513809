//! Transform model hosted in an external process.
//!
//! The bridge is spawned once per run and spoken to over JSON lines on
//! stdin/stdout:
//!
//! ```text
//! <- {"type":"ready"}
//! -> {"type":"transform","id":"req-1","text":"..."}
//! <- {"type":"result","id":"req-1","text":"..."}     (or {"type":"error","id":..,"error":..})
//! -> {"type":"shutdown"}
//! ```
//!
//! The model name is passed to the process in `FOLIO_MODEL`. Requests block
//! until the bridge answers; there is no timeout.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{info, warn};

use folio_shared::{FolioError, Result};

use crate::UnitModel;

/// How to launch the bridge process.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Executable (e.g., "python3").
    pub command: String,
    /// Arguments (e.g., the bridge script path).
    pub args: Vec<String>,
    /// Working directory for the subprocess.
    pub working_dir: String,
    /// Model identifier, exported as `FOLIO_MODEL`.
    pub model: String,
}

/// Request message sent to the bridge.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestMessage<'a> {
    Transform { id: String, text: &'a str },
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseMessage {
    Ready,
    Result { id: String, text: String },
    Error { id: String, error: String },
}

/// Handle to the spawned bridge subprocess.
pub struct BridgeModel {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
}

impl BridgeModel {
    /// Spawn the bridge and wait for its ready message.
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        info!(cmd = %config.command, args = ?config.args, model = %config.model, "spawning transform bridge");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .current_dir(&config.working_dir)
            .env("FOLIO_MODEL", &config.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Bridge logs go to parent stderr
            .spawn()
            .map_err(|e| {
                FolioError::Transform(format!(
                    "failed to spawn bridge: {e}. Is `{}` installed?",
                    config.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FolioError::Transform("failed to capture bridge stdin".into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FolioError::Transform("failed to capture bridge stdout".into()))?;

        let mut handle = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
        };

        handle.wait_for_ready()?;
        Ok(handle)
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| FolioError::Transform(format!("bridge read error: {e}")))?;

        if line.is_empty() {
            return Err(FolioError::Transform(
                "bridge closed stdout unexpectedly".into(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            let preview: String = line.chars().take(200).collect();
            FolioError::Transform(format!("invalid bridge message: {e} (got: {preview})"))
        })
    }

    fn send(&mut self, request: &RequestMessage<'_>) -> Result<()> {
        let json = serde_json::to_string(request)
            .map_err(|e| FolioError::Transform(format!("failed to serialize request: {e}")))?;

        writeln!(self.stdin, "{json}").map_err(|e| {
            FolioError::Transform(format!("failed to write to bridge stdin: {e}"))
        })?;
        self.stdin
            .flush()
            .map_err(|e| FolioError::Transform(format!("failed to flush bridge stdin: {e}")))
    }

    fn wait_for_ready(&mut self) -> Result<()> {
        match self.read_message()? {
            ResponseMessage::Ready => {
                info!("bridge is ready");
                Ok(())
            }
            other => Err(FolioError::Transform(format!(
                "expected ready message, got: {other:?}"
            ))),
        }
    }

    /// Send shutdown and wait for the bridge to exit.
    pub fn shutdown(mut self) -> Result<()> {
        if let Err(e) = self.send(&RequestMessage::Shutdown) {
            warn!(error = %e, "could not send shutdown to bridge");
        }

        match self.child.wait() {
            Ok(status) => {
                info!(?status, "bridge exited");
                Ok(())
            }
            Err(e) => {
                warn!("bridge wait error: {e}");
                Ok(())
            }
        }
    }
}

impl UnitModel for BridgeModel {
    fn transform_unit(&mut self, text: &str) -> Result<String> {
        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        self.send(&RequestMessage::Transform {
            id: id.clone(),
            text,
        })?;

        match self.read_message()? {
            ResponseMessage::Result { id: resp_id, text } if resp_id == id => Ok(text),
            ResponseMessage::Result { id: resp_id, .. } => Err(FolioError::Transform(format!(
                "bridge answered {resp_id} while {id} was pending"
            ))),
            ResponseMessage::Error { id: resp_id, error } => Err(FolioError::Transform(format!(
                "bridge failed {resp_id}: {error}"
            ))),
            ResponseMessage::Ready => Err(FolioError::Transform(
                "unexpected ready message during transform".into(),
            )),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{SentenceChunked, TransformPort};

    /// Bridge that answers every request with the request number.
    const COUNTING_BRIDGE: &str = r#"
echo '{"type":"ready"}'
n=0
while read -r line; do
  case "$line" in
    *'"shutdown"'*) exit 0 ;;
  esac
  n=$((n+1))
  echo "{\"type\":\"result\",\"id\":\"req-$n\",\"text\":\"$FOLIO_MODEL-$n\"}"
done
"#;

    fn sh_bridge(script: &str) -> BridgeConfig {
        BridgeConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_dir: ".".into(),
            model: "stub".into(),
        }
    }

    #[test]
    fn request_response_roundtrip() {
        let mut bridge = BridgeModel::spawn(&sh_bridge(COUNTING_BRIDGE)).unwrap();
        assert_eq!(bridge.transform_unit("hello").unwrap(), "stub-1");
        assert_eq!(bridge.transform_unit("world").unwrap(), "stub-2");
        bridge.shutdown().unwrap();
    }

    #[test]
    fn sentence_splitting_over_bridge() {
        let bridge = BridgeModel::spawn(&sh_bridge(COUNTING_BRIDGE)).unwrap();
        let mut port = SentenceChunked::new(bridge);
        let out = port.transform("one two. three four", 4).unwrap();
        assert_eq!(out, "stub-1");
        let out = port.transform("one two. three four", 1).unwrap();
        assert_eq!(out, "stub-2 stub-3");
        port.into_inner().shutdown().unwrap();
    }

    #[test]
    fn error_reply_is_a_transform_error() {
        let script = r#"
echo '{"type":"ready"}'
read -r line
echo '{"type":"error","id":"req-1","error":"model exploded"}'
"#;
        let mut bridge = BridgeModel::spawn(&sh_bridge(script)).unwrap();
        let err = bridge.transform_unit("x").unwrap_err();
        assert!(err.to_string().contains("model exploded"));
    }

    #[test]
    fn mismatched_id_is_rejected() {
        let script = r#"
echo '{"type":"ready"}'
read -r line
echo '{"type":"result","id":"req-9","text":"late"}'
"#;
        let mut bridge = BridgeModel::spawn(&sh_bridge(script)).unwrap();
        let err = bridge.transform_unit("x").unwrap_err();
        assert!(err.to_string().contains("req-9"));
    }

    #[test]
    fn closed_stdout_is_reported() {
        let script = r#"echo '{"type":"ready"}'"#;
        let mut bridge = BridgeModel::spawn(&sh_bridge(script)).unwrap();
        let err = bridge.transform_unit("x").unwrap_err();
        assert!(matches!(err, FolioError::Transform(_)));
    }

    #[test]
    fn missing_ready_fails_spawn() {
        let script = r#"echo '{"type":"result","id":"req-0","text":""}'"#;
        assert!(BridgeModel::spawn(&sh_bridge(script)).is_err());
    }

    #[test]
    fn missing_executable_fails_spawn() {
        let config = BridgeConfig {
            command: "folio-no-such-bridge-binary".into(),
            args: vec![],
            working_dir: ".".into(),
            model: "stub".into(),
        };
        let err = BridgeModel::spawn(&config).err().unwrap();
        assert!(err.to_string().contains("failed to spawn bridge"));
    }
}
