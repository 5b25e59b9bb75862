//! フレームの適用
//!
//! パース済みのフレームをセッション状態に反映します。
//! フレームは1つずつ完全に処理され、その間デマルチプレクサは止まっています。

use crate::editor::{locate_or_open, Editor};
use crate::event::{SessionEvent, ValueScope};
use crate::frame::Frame;
use crate::session::{SessionController, SessionState};
use tracing::{debug, warn};

impl SessionController {
    /// フレーム本体をパースして適用する
    ///
    /// 解釈できないフレームはログに残して捨てる。
    pub(crate) fn dispatch<E: Editor + ?Sized>(&mut self, editor: &mut E, raw: &str) {
        match Frame::parse(raw, &self.config.prompt) {
            Ok(frame) => self.apply_frame(editor, frame),
            Err(e) => warn!("Ignoring frame {:?}: {}", raw, e),
        }
    }

    fn apply_frame<E: Editor + ?Sized>(&mut self, editor: &mut E, frame: Frame) {
        debug!("<- {:?}", frame);

        match frame {
            Frame::File(path) => {
                if let Some(session) = self.session.as_mut() {
                    session.current_file = path;
                }
            }
            Frame::Watch { row, name, value } => {
                if let Some(row) = self.watches.apply_update(row, &name, &value) {
                    self.events.push(SessionEvent::WatchUpdated { row });
                }
            }
            Frame::LocalValue(text) => self.show_value(ValueScope::Local, text),
            Frame::GlobalValue(text) => self.show_value(ValueScope::Global, text),
            Frame::Info(text) => self.events.push(SessionEvent::Status(text)),
            Frame::LineNumber(line) => self.on_line_number(editor, line),
            Frame::Prompt => self.on_prompt(editor),
        }
    }

    fn show_value(&mut self, scope: ValueScope, text: String) {
        self.events.push(SessionEvent::ValuePopup {
            scope,
            text,
            hover: self.hover,
        });
    }

    /// 新しい行番号を受け取った
    ///
    /// プロセスはまだ停止していないので、実行位置マーカーは次のプロンプトで置く。
    fn on_line_number<E: Editor + ?Sized>(&mut self, editor: &mut E, line: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.current_line = line.saturating_sub(1);

        let path = session.current_file.clone();
        let line = session.current_line;
        if let Some(doc) = locate_or_open(editor, &path) {
            editor.scroll_to_line(doc, line);
        }
        self.events.push(SessionEvent::Navigate { path, line });
    }

    /// プロンプトに到達した
    ///
    /// 前のコマンドが消費された唯一の合図なので、ここで同期を1つずつ進める。
    fn on_prompt<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        self.state = SessionState::PausedAtPrompt;
        self.place_execution_marker(editor);

        if let Some(command) = self.watches.next_command() {
            self.send_sync(command);
        }
        if !self.watches.has_pending() && self.watches.normalize_trailing_blank() {
            self.events.push(SessionEvent::WatchTableChanged);
        }

        self.breakpoint_sent = false;
        self.kick_breakpoints(&*editor);

        if let Some(session) = self.session.as_ref() {
            self.events.push(SessionEvent::Paused {
                path: session.current_file.clone(),
                line: session.current_line,
            });
        }
    }
}
