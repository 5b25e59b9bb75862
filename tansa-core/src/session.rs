//! デバッグセッションの制御
//!
//! 子プロセス1つ分のセッション状態と、セッションをまたいで残る
//! ブレークポイント・ウォッチの同期器をまとめて管理します。
//! ホストのイベントループが [`SessionController::poll`] を繰り返し呼び出して駆動します。

use crate::breakpoint::{BreakpointLocation, BreakpointSynchronizer};
use crate::command::DebugCommand;
use crate::config::SessionConfig;
use crate::demux::StreamDemultiplexer;
use crate::editor::{locate_document, locate_or_open, DocId, Editor, MarkerKind};
use crate::errors::SessionError;
use crate::event::{HoverPosition, SessionEvent};
use crate::watch::{WatchEntry, WatchSynchronizer};
use crate::Result;
use regex::Regex;
use std::sync::LazyLock;
use tansa_target::Transport;
use tracing::{debug, info, warn};

/// ホバー位置から評価する式として切り出す文字列
static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*").expect("identifier pattern is a valid regex")
});

/// セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotRunning,
    Launching,
    Running,
    PausedAtPrompt,
    Terminated,
}

/// 起動モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// 通常実行（フレームを探さない）
    Run,
    /// デバッグ実行
    Debug,
}

/// 実行中の子プロセス1つ分のセッション
pub struct DebugSession {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) demux: StreamDemultiplexer,
    /// 最後に受け取った file フレームのパス
    pub(crate) current_file: String,
    /// 0始まりの現在行
    pub(crate) current_line: usize,
    /// 実行位置マーカーを置いた場所
    pub(crate) execution_marker: Option<(String, usize)>,
    mode: LaunchMode,
}

impl DebugSession {
    fn new(transport: Box<dyn Transport>, config: &SessionConfig, mode: LaunchMode) -> Self {
        Self {
            transport,
            demux: StreamDemultiplexer::new(config, mode == LaunchMode::Debug),
            current_file: String::new(),
            current_line: 0,
            execution_marker: None,
            mode,
        }
    }

    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }
}

/// セッションコントローラ
pub struct SessionController {
    pub(crate) config: SessionConfig,
    pub(crate) state: SessionState,
    /// 同時に存在するセッションは高々1つ
    pub(crate) session: Option<DebugSession>,
    pub(crate) breakpoints: BreakpointSynchronizer,
    pub(crate) watches: WatchSynchronizer,
    /// 今のプロンプトでブレークポイントのコマンドを送ったか
    pub(crate) breakpoint_sent: bool,
    /// 最後に評価を依頼した位置
    pub(crate) hover: Option<HoverPosition>,
    pub(crate) events: Vec<SessionEvent>,
}

impl SessionController {
    /// 新しいコントローラを作成する
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::NotRunning,
            session: None,
            breakpoints: BreakpointSynchronizer::new(),
            watches: WatchSynchronizer::new(),
            breakpoint_sent: false,
            hover: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 実行中のセッション
    pub fn session(&self) -> Option<&DebugSession> {
        self.session.as_ref()
    }

    /// ポーリングを続ける必要があるか
    ///
    /// 子プロセスが生きている間だけtrue。
    pub fn wants_poll(&self) -> bool {
        self.session.is_some()
    }

    /// 溜まったイベントを取り出す
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// 子プロセスを起動してセッションを開始する
    ///
    /// 起動に失敗した場合はステータスメッセージを1つ出し、セッションは作られない。
    pub fn launch<T, F>(&mut self, mode: LaunchMode, spawn: F) -> Result<()>
    where
        T: Transport + 'static,
        F: FnOnce() -> Result<T>,
    {
        if self.session.is_some() {
            return Err(SessionError::AlreadyRunning.into());
        }

        self.state = SessionState::Launching;
        let transport = match spawn() {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Spawn failed: {:#}", e);
                self.state = SessionState::NotRunning;
                let error = SessionError::SpawnFailed(format!("{:#}", e));
                self.events.push(SessionEvent::Status(error.to_string()));
                return Err(error.into());
            }
        };

        info!("Session started ({:?}, pid {:?})", mode, transport.pid());
        self.session = Some(DebugSession::new(Box::new(transport), &self.config, mode));
        self.state = SessionState::Running;
        self.hover = None;
        self.breakpoint_sent = false;

        if mode == LaunchMode::Debug {
            // 新しいデバッガは何も知らないので、最初のプロンプトから全部送り直す
            self.breakpoints.invalidate();
            self.watches.clear_values();
            self.watches.rearm();
        }
        Ok(())
    }

    /// 1回分のポーリング
    ///
    /// 読み取り可能な出力をすべて処理し、プロセスの生存を確認する。
    /// ブロックしない。
    pub fn poll<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let bytes = match session.transport.read_available() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read from child: {:#}", e);
                Vec::new()
            }
        };
        let errors = match session.transport.read_stderr() {
            Ok(errors) => errors,
            Err(e) => {
                warn!("Failed to read stderr of child: {:#}", e);
                Vec::new()
            }
        };
        self.process_output(editor, &bytes);
        self.push_stderr(&errors);

        let alive = match self.session.as_mut() {
            Some(session) => session.transport.is_alive(),
            None => return,
        };
        if !alive {
            // 終了直前の出力を拾えるだけ拾う
            if let Some(session) = self.session.as_mut() {
                let rest = session.transport.read_available().unwrap_or_default();
                let errors = session.transport.read_stderr().unwrap_or_default();
                self.process_output(editor, &rest);
                self.push_stderr(&errors);
            }
            info!("Child process is gone");
            self.finish(editor);
        }
    }

    /// セッションを強制終了する
    ///
    /// SIGTERM の成否にかかわらず SIGKILL も送る。同期待ちは破棄される。
    pub fn abort<E: Editor + ?Sized>(&mut self, editor: &mut E) -> Result<()> {
        let session = self.session.as_mut().ok_or(SessionError::NotRunning)?;

        if let Err(e) = session.transport.terminate() {
            debug!("terminate failed: {:#}", e);
        }
        if let Err(e) = session.transport.kill() {
            debug!("kill failed: {:#}", e);
        }
        info!("Session aborted");
        self.finish(editor);
        Ok(())
    }

    /// 実行継続
    pub fn continue_execution<E: Editor + ?Sized>(&mut self, editor: &mut E) -> Result<()> {
        self.step(editor, DebugCommand::Continue)
    }

    /// ステップイン
    pub fn step_into<E: Editor + ?Sized>(&mut self, editor: &mut E) -> Result<()> {
        self.step(editor, DebugCommand::StepInto)
    }

    /// ステップオーバー
    pub fn step_over<E: Editor + ?Sized>(&mut self, editor: &mut E) -> Result<()> {
        self.step(editor, DebugCommand::StepOver)
    }

    /// 現在の関数から抜けるまで実行
    pub fn step_out<E: Editor + ?Sized>(&mut self, editor: &mut E) -> Result<()> {
        self.step(editor, DebugCommand::StepOut)
    }

    /// 指定行まで実行（`line` は1始まり）
    pub fn run_to_line<E: Editor + ?Sized>(&mut self, editor: &mut E, line: usize) -> Result<()> {
        self.step(editor, DebugCommand::RunToLine(line))
    }

    /// カーソル位置の行まで実行
    pub fn run_to_cursor<E: Editor + ?Sized>(
        &mut self,
        editor: &mut E,
        doc: DocId,
        position: usize,
    ) -> Result<()> {
        let line = editor.line_from_position(doc, position);
        self.run_to_line(editor, line + 1)
    }

    /// 式を評価する
    ///
    /// 結果は `loc` / `glb` フレームで返り、`hover` の位置にポップアップとして通知される。
    pub fn evaluate(&mut self, expr: &str, hover: Option<HoverPosition>) -> Result<()> {
        self.require_paused()?;
        self.hover = hover;
        self.write_command(&DebugCommand::Evaluate(expr.trim().to_string()))
    }

    /// 位置にある識別子を評価する
    ///
    /// 評価した式を返す。識別子がなければ何も送らずに `None`。
    pub fn evaluate_at<E: Editor + ?Sized>(
        &mut self,
        editor: &E,
        doc: DocId,
        position: usize,
    ) -> Result<Option<String>> {
        self.require_paused()?;

        let line = editor.line_from_position(doc, position);
        let Some(text) = editor.line_text(doc, line) else {
            return Ok(None);
        };
        let column = position.saturating_sub(editor.position_from_line(doc, line));
        let Some(expr) = identifier_at(&text, column) else {
            return Ok(None);
        };

        self.evaluate(&expr, Some(HoverPosition { doc, position }))?;
        Ok(Some(expr))
    }

    /// 子プロセスの標準入力にテキストを送る
    pub fn send_input(&mut self, text: &str) -> Result<()> {
        let session = self.session.as_mut().ok_or(SessionError::NotRunning)?;
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(b'\r');
        session.transport.write(&bytes)
    }

    /// 行のブレークポイントを切り替える
    ///
    /// 停止中で、このプロンプトでまだ何も送っていなければ、次のプロンプトを待たずに同期を始める。
    pub fn toggle_breakpoint<E: Editor + ?Sized>(
        &mut self,
        editor: &mut E,
        doc: DocId,
        line: usize,
    ) -> bool {
        let enabled = self.breakpoints.toggle(editor, doc, line);
        self.kick_breakpoints(&*editor);
        enabled
    }

    /// パスと行を指定してブレークポイントを切り替える
    ///
    /// ドキュメントが開いていなければ開く。
    pub fn toggle_breakpoint_at<E: Editor + ?Sized>(
        &mut self,
        editor: &mut E,
        path: &str,
        line: usize,
    ) -> Option<bool> {
        let doc = locate_or_open(editor, path)?;
        Some(self.toggle_breakpoint(editor, doc, line))
    }

    /// すべてのブレークポイントを消す
    pub fn clear_breakpoints<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        self.breakpoints.clear_all(editor);
        self.kick_breakpoints(&*editor);
    }

    /// ドキュメントが開かれた・閉じられたことを知らせる
    pub fn documents_changed(&mut self) {
        self.breakpoints.invalidate();
    }

    /// 表示用のブレークポイント一覧
    pub fn breakpoints<E: Editor + ?Sized>(&mut self, editor: &E) -> &[BreakpointLocation] {
        self.breakpoints.list(editor)
    }

    /// ウォッチテーブル
    pub fn watches(&self) -> &[WatchEntry] {
        self.watches.rows()
    }

    /// ウォッチ式を追加し、行インデックスを返す
    pub fn add_watch(&mut self, name: &str) -> usize {
        let row = self.watches.add(name);
        self.events.push(SessionEvent::WatchTableChanged);
        row
    }

    /// ウォッチ式を編集する
    pub fn edit_watch(&mut self, row: usize, name: &str) {
        self.watches.edit(row, name);
        self.events.push(SessionEvent::WatchTableChanged);
    }

    /// ウォッチ式を削除する
    pub fn delete_watch(&mut self, row: usize) -> bool {
        let deleted = self.watches.delete(row);
        if deleted {
            self.events.push(SessionEvent::WatchTableChanged);
        }
        deleted
    }

    /// 出力バイト列を分離し、フレームを到着順に処理する
    pub(crate) fn process_output<E: Editor + ?Sized>(&mut self, editor: &mut E, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let out = session.demux.feed(bytes);

        for frame in &out.frames {
            self.dispatch(editor, frame);
        }
        if !out.text.is_empty() {
            self.events.push(SessionEvent::Terminal(out.text_lossy()));
        }
    }

    /// 標準エラー出力はフレームを探さずに端末へ流す
    fn push_stderr(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.events
                .push(SessionEvent::Terminal(String::from_utf8_lossy(bytes).into_owned()));
        }
    }

    /// 実行位置を動かすコマンドを送る
    fn step<E: Editor + ?Sized>(&mut self, editor: &mut E, command: DebugCommand) -> Result<()> {
        debug_assert!(command.resumes_execution());
        self.require_paused()?;
        self.remove_execution_marker(editor);
        self.write_command(&command)?;
        self.state = SessionState::Running;
        Ok(())
    }

    /// デバッグセッションがプロンプトで停止していることを確認する
    fn require_paused(&self) -> Result<()> {
        let session = self.session.as_ref().ok_or(SessionError::NotRunning)?;
        if session.mode != LaunchMode::Debug {
            return Err(SessionError::NotDebugging.into());
        }
        if self.state != SessionState::PausedAtPrompt {
            return Err(SessionError::NotPaused.into());
        }
        Ok(())
    }

    /// コマンドを書き込む
    pub(crate) fn write_command(&mut self, command: &DebugCommand) -> Result<()> {
        let session = self.session.as_mut().ok_or(SessionError::NotRunning)?;
        debug!("-> {}", command);
        session.transport.write(&command.to_wire())
    }

    /// 同期器のコマンドを送る（失敗は次のポーリングの生存確認に任せる）
    pub(crate) fn send_sync(&mut self, command: DebugCommand) {
        if let Err(e) = self.write_command(&command) {
            warn!("Failed to send '{}': {:#}", command, e);
        }
    }

    /// 停止中ならブレークポイントの同期を1つ進める
    ///
    /// 1回のプロンプトで送るのは1コマンドまで。残りは次のプロンプトを待つ。
    pub(crate) fn kick_breakpoints<E: Editor + ?Sized>(&mut self, editor: &E) {
        if self.state != SessionState::PausedAtPrompt || self.breakpoint_sent {
            return;
        }
        if let Some(command) = self.breakpoints.next_command(editor) {
            self.breakpoint_sent = true;
            self.send_sync(command);
        }
    }

    /// 現在位置に実行位置マーカーを置く
    pub(crate) fn place_execution_marker<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        self.remove_execution_marker(editor);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let path = session.current_file.clone();
        let line = session.current_line;
        if let Some(doc) = locate_or_open(editor, &path) {
            editor.add_marker(doc, line, MarkerKind::CurrentLine);
            session.execution_marker = Some((path, line));
        }
    }

    /// 実行位置マーカーを外す（ドキュメントが開いていなければ何もしない）
    fn remove_execution_marker<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some((path, line)) = session.execution_marker.take() {
            if let Some(doc) = locate_document(&*editor, &path) {
                editor.remove_marker(doc, line, MarkerKind::CurrentLine);
            }
        }
    }

    /// セッション終了の後始末
    fn finish<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        self.remove_execution_marker(editor);
        self.session = None;
        self.state = SessionState::Terminated;
        self.hover = None;
        self.watches.clear_pending();
        self.events.push(SessionEvent::Terminated);
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// 行テキストの `column` 文字目を含む識別子を探す
fn identifier_at(text: &str, column: usize) -> Option<String> {
    // 文字単位の列をバイトオフセットに直す
    let offset = text
        .char_indices()
        .nth(column)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    IDENTIFIER_PATTERN
        .find_iter(text)
        .find(|m| m.start() <= offset && offset < m.end())
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}
