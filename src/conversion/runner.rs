//! Launching the transcode script and reading its output.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use vidladder_common::{Error, Result};
use vidladder_progress::OutputStream;

use crate::config::TranscodeConfig;

/// Longest line kept from the transcoder before the stream is abandoned.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Lines buffered between the stream readers and the pipeline.
const LINE_QUEUE: usize = 1024;

/// Runs `<shell> <script> <input> <output_dir>`.
#[derive(Debug, Clone)]
pub struct TranscodeRunner {
    shell: String,
    script: PathBuf,
}

impl TranscodeRunner {
    pub fn new(shell: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            script: script.into(),
        }
    }

    pub fn from_config(config: &TranscodeConfig) -> Self {
        Self::new(config.shell.clone(), config.script.clone())
    }

    /// Make sure the script exists, adding the executable bit if it is missing.
    pub fn check(&self) -> Result<()> {
        let metadata = std::fs::metadata(&self.script).map_err(|_| {
            Error::launch(format!(
                "Transcode script not found: {}",
                self.script.display()
            ))
        })?;

        if !metadata.is_file() {
            return Err(Error::launch(format!(
                "Transcode script is not a file: {}",
                self.script.display()
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = metadata.permissions();
            if perms.mode() & 0o111 == 0 {
                perms.set_mode(perms.mode() | 0o755);
                std::fs::set_permissions(&self.script, perms).map_err(|e| {
                    Error::launch(format!(
                        "Cannot make {} executable: {}",
                        self.script.display(),
                        e
                    ))
                })?;
                tracing::debug!("Marked {:?} executable", self.script);
            }
        }

        Ok(())
    }

    /// Start the script with both output streams piped.
    pub fn spawn(&self, input: &Path, output_dir: &Path) -> Result<Child> {
        tracing::debug!(
            "Running: {} {} {} {}",
            self.shell,
            self.script.display(),
            input.display(),
            output_dir.display()
        );

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.script)
            .arg(input)
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own group, so terminate() also reaches the ffmpeg the script runs
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn()
            .map_err(|e| Error::spawn(format!("{}: {}", self.shell, e)))
    }
}

/// Read both output streams of `child` line by line into one channel.
///
/// The channel closes once both streams reach end of file.
pub fn pump_output(child: &mut Child) -> mpsc::Receiver<(OutputStream, String)> {
    let (tx, rx) = mpsc::channel(LINE_QUEUE);

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_lines(stdout, OutputStream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_lines(stderr, OutputStream::Stderr, tx));
    }

    rx
}

async fn read_lines<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<(OutputStream, String)>)
where
    R: AsyncRead + Unpin,
{
    // ffmpeg redraws its status line with bare carriage returns
    let codec = AnyDelimiterCodec::new_with_max_length(
        b"\r\n".to_vec(),
        b"\n".to_vec(),
        MAX_LINE_BYTES,
    );
    let mut frames = FramedRead::new(reader, codec);

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(chunk) => {
                let line = String::from_utf8_lossy(&chunk);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.send((stream, line.to_string())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Stopped reading transcoder {:?}: {}", stream, e);
                break;
            }
        }
    }
}

/// Ask the transcoder to stop. Sends one SIGTERM to its process group on unix.
pub fn terminate(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            // Already reaped
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|_| Error::internal("pid out of range"))?;
        killpg(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| Error::Io(e.into()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        child.start_kill().map_err(Error::from)
    }
}
