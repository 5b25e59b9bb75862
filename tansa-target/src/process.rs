//! プロセス制御機能

use crate::transport::{Transport, TransportError};
use crate::Result;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

/// 一度の read で読み込む最大バイト数
const READ_CHUNK_SIZE: usize = 4096;

/// 起動するコマンドライン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandLine {
    /// 実行ファイルを指定してコマンドラインを作成する
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// 引数を1つ追加する
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 引数をまとめて追加する
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 作業ディレクトリを設定する
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// 実行ファイルのパスを取得する
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// 引数を取得する
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// 表示用の文字列を作る
    pub fn display(&self) -> String {
        let mut s = self.program.display().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }
}

/// デバッグ対象の子プロセス
///
/// 標準入出力をパイプで接続し、すべてノンブロッキングにして起動します。
/// 標準エラー出力は標準出力とは別のストリームとして読み出します。
pub struct ChildProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    /// パイプが一杯で書き込めなかった入力
    pending_input: Vec<u8>,
    exited: bool,
}

impl ChildProcess {
    /// 子プロセスを起動する
    pub fn spawn(command_line: &CommandLine) -> Result<Self> {
        let mut command = Command::new(command_line.program());
        command
            .args(command_line.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command_line.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            program: command_line.program().display().to_string(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        if let Some(input) = &stdin {
            set_nonblocking(input)?;
        }
        if let Some(out) = &stdout {
            set_nonblocking(out)?;
        }
        if let Some(err) = &stderr {
            set_nonblocking(err)?;
        }

        debug!("Spawned '{}' (pid {})", command_line.display(), child.id());

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            pending_input: Vec::new(),
            exited: false,
        })
    }

    /// 書き込み待ちの入力バイト数
    pub fn pending_input(&self) -> usize {
        self.pending_input.len()
    }

    /// 溜まっている入力をパイプが受け付けるだけ書き込む
    fn flush_input(&mut self) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            self.pending_input.clear();
            return Ok(());
        };

        while !self.pending_input.is_empty() {
            match stdin.write(&self.pending_input) {
                Ok(0) => break,
                Ok(n) => {
                    self.pending_input.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    if e.kind() == ErrorKind::BrokenPipe {
                        // 子プロセスが入力側を閉じた
                        self.stdin = None;
                        self.pending_input.clear();
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

impl Transport for ChildProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Child {} exited: {}", self.child.id(), status);
                self.exited = true;
                false
            }
            Err(e) => {
                warn!("Failed to query child {}: {}", self.child.id(), e);
                self.exited = true;
                false
            }
        }
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        // 子プロセスが読んで空いた分だけ、残りの入力を送る
        if let Err(e) = self.flush_input() {
            debug!("Dropping pending input: {:#}", e);
        }

        let mut bytes = Vec::new();
        if let Some(out) = self.stdout.as_mut() {
            if drain(out, &mut bytes)? {
                self.stdout = None;
            }
        }
        Ok(bytes)
    }

    fn read_stderr(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        if let Some(err) = self.stderr.as_mut() {
            if drain(err, &mut bytes)? {
                self.stderr = None;
            }
        }
        Ok(bytes)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.stdin.is_none() {
            return Err(TransportError::InputClosed.into());
        }
        self.pending_input.extend_from_slice(bytes);
        self.flush_input()
    }

    fn terminate(&mut self) -> Result<()> {
        if self.exited {
            return Ok(());
        }
        let pid = Pid::from_raw(self.child.id() as i32);
        debug!("Sending SIGTERM to {}", pid);
        kill(pid, Signal::SIGTERM)?;
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        if self.exited {
            return Ok(());
        }
        debug!("Sending SIGKILL to {}", self.child.id());
        if let Err(e) = self.child.kill() {
            debug!("kill failed (already gone?): {}", e);
        }
        // ゾンビを残さないように回収を試みる
        if let Ok(Some(_)) = self.child.try_wait() {
            self.exited = true;
        }
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if !self.exited {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// ファイルディスクリプタをノンブロッキングにする
fn set_nonblocking<F: AsRawFd>(fd: &F) -> Result<()> {
    let raw = fd.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(raw, FcntlArg::F_GETFL)?);
    fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// 読み取り可能なデータをすべて読み出す
///
/// EOFに達した場合はtrueを返します。
fn drain<R: Read>(reader: &mut R, out: &mut Vec<u8>) -> Result<bool> {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(true),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_display() {
        let cmd = CommandLine::new("/usr/bin/interp").arg("-d").args(["main.p", "42"]);
        assert_eq!(cmd.display(), "/usr/bin/interp -d main.p 42");
        assert_eq!(cmd.arguments(), &["-d", "main.p", "42"]);
    }

    #[test]
    fn test_spawn_missing_program() {
        let cmd = CommandLine::new("/nonexistent/tansa-test-program");
        let err = ChildProcess::spawn(&cmd).err().expect("spawn should fail");
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[test]
    fn test_drain_reports_eof() {
        let mut data: &[u8] = b"hello";
        let mut out = Vec::new();
        assert!(drain(&mut data, &mut out).unwrap());
        assert_eq!(out, b"hello");
    }
}
