//! ブレークポイント同期
//!
//! ブレークポイントはエディタのマーカーから導出される。
//! デバッガ側とは確認応答のない一方向のコマンドでしか同期できないため、
//! プロンプト1回につき1コマンドずつ送り、
//! 変更後は「全解除」に続いて全件を先頭から送り直す。

use crate::command::DebugCommand;
use crate::editor::{DocId, Editor, MarkerKind};
use tracing::debug;

/// ブレークポイントの位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointLocation {
    /// ドキュメントのファイルパス
    pub file: String,
    /// 0始まりの行
    pub line: usize,
}

impl BreakpointLocation {
    /// 設定コマンド（ワイヤ上の行番号は1始まり）
    pub fn to_command(&self) -> DebugCommand {
        DebugCommand::Break {
            file: self.file.clone(),
            line: self.line + 1,
        }
    }
}

/// ブレークポイント同期器
#[derive(Debug, Default)]
pub struct BreakpointSynchronizer {
    /// マーカーから導出した一覧
    breakpoints: Vec<BreakpointLocation>,
    /// 送信済みの件数
    sent: usize,
    /// 前回の全件送信以降に変更があったか
    dirty: bool,
    /// 一覧が最新か
    built: bool,
}

impl BreakpointSynchronizer {
    /// 新しい同期器を作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 変更があったことを記録する
    ///
    /// 次の送信機会は「全解除」から始まる。
    pub fn invalidate(&mut self) {
        self.dirty = true;
        self.built = false;
        self.sent = 0;
    }

    /// 未送信の変更があるか
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 必要なら一覧を作り直す
    ///
    /// ドキュメントを開いた順、ドキュメント内は行の昇順に並ぶ。
    pub fn rebuild<E: Editor + ?Sized>(&mut self, editor: &E) {
        if self.built {
            return;
        }

        self.breakpoints = editor
            .documents()
            .into_iter()
            .filter_map(|doc| editor.path(doc).map(|path| (doc, path)))
            .flat_map(|(doc, path)| {
                editor
                    .markers(doc, MarkerKind::Breakpoint)
                    .into_iter()
                    .map(move |line| BreakpointLocation {
                        file: path.clone(),
                        line,
                    })
            })
            .collect();
        self.built = true;
        debug!("Rebuilt breakpoint list: {} entries", self.breakpoints.len());
    }

    /// 現在のブレークポイント一覧
    pub fn list<E: Editor + ?Sized>(&mut self, editor: &E) -> &[BreakpointLocation] {
        self.rebuild(editor);
        &self.breakpoints
    }

    /// 送るべきコマンドが残っているか
    pub fn has_pending<E: Editor + ?Sized>(&mut self, editor: &E) -> bool {
        self.rebuild(editor);
        self.dirty || self.sent < self.breakpoints.len()
    }

    /// 次に送るコマンドを1つ取り出す
    pub fn next_command<E: Editor + ?Sized>(&mut self, editor: &E) -> Option<DebugCommand> {
        self.rebuild(editor);

        if self.dirty {
            self.dirty = false;
            self.sent = 0;
            return Some(DebugCommand::ClearBreakpoints);
        }

        let location = self.breakpoints.get(self.sent)?;
        self.sent += 1;
        Some(location.to_command())
    }

    /// 行のブレークポイントを切り替える
    ///
    /// 切り替え後に設定されていればtrueを返す。
    pub fn toggle<E: Editor + ?Sized>(&mut self, editor: &mut E, doc: DocId, line: usize) -> bool {
        let enabled = !editor.has_marker(doc, line, MarkerKind::Breakpoint);
        if enabled {
            editor.add_marker(doc, line, MarkerKind::Breakpoint);
        } else {
            editor.remove_marker(doc, line, MarkerKind::Breakpoint);
        }
        self.invalidate();
        enabled
    }

    /// 開いている全ドキュメントのブレークポイントを消す
    pub fn clear_all<E: Editor + ?Sized>(&mut self, editor: &mut E) {
        for doc in editor.documents() {
            for line in editor.markers(doc, MarkerKind::Breakpoint) {
                editor.remove_marker(doc, line, MarkerKind::Breakpoint);
            }
        }
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::MemoryEditor;

    fn drain<E: Editor>(sync: &mut BreakpointSynchronizer, editor: &E) -> Vec<String> {
        std::iter::from_fn(|| sync.next_command(editor))
            .map(|cmd| cmd.to_string())
            .collect()
    }

    #[test]
    fn test_stable_scan_order() {
        let mut editor = MemoryEditor::new();
        let a = editor.open_with_text("A", "");
        let b = editor.open_with_text("B", "");
        let mut sync = BreakpointSynchronizer::new();

        sync.toggle(&mut editor, b, 9);
        sync.toggle(&mut editor, a, 5);
        sync.toggle(&mut editor, a, 2);

        let lines: Vec<_> = sync
            .list(&editor)
            .iter()
            .map(|bp| (bp.file.as_str(), bp.line))
            .collect();
        assert_eq!(lines, vec![("A", 2), ("A", 5), ("B", 9)]);
    }

    #[test]
    fn test_dirty_resync_takes_n_plus_one_steps() {
        let mut editor = MemoryEditor::new();
        let a = editor.open_with_text("A", "");
        let b = editor.open_with_text("B", "");
        let mut sync = BreakpointSynchronizer::new();
        sync.toggle(&mut editor, a, 2);
        sync.toggle(&mut editor, b, 9);

        assert!(sync.has_pending(&editor));
        assert_eq!(drain(&mut sync, &editor), vec!["cbreak *", "break A:3", "break B:10"]);
        assert!(!sync.has_pending(&editor));
        assert_eq!(sync.next_command(&editor), None);
    }

    #[test]
    fn test_change_midway_restarts_from_clear() {
        let mut editor = MemoryEditor::new();
        let a = editor.open_with_text("A", "");
        let mut sync = BreakpointSynchronizer::new();
        sync.toggle(&mut editor, a, 0);
        sync.toggle(&mut editor, a, 1);

        assert_eq!(sync.next_command(&editor), Some(DebugCommand::ClearBreakpoints));
        assert!(sync.next_command(&editor).is_some());

        // 途中で1件外す
        assert!(!sync.toggle(&mut editor, a, 0));
        assert_eq!(drain(&mut sync, &editor), vec!["cbreak *", "break A:2"]);
    }

    #[test]
    fn test_clear_all() {
        let mut editor = MemoryEditor::new();
        let a = editor.open_with_text("A", "");
        let b = editor.open_with_text("B", "");
        let mut sync = BreakpointSynchronizer::new();
        sync.toggle(&mut editor, a, 0);
        sync.toggle(&mut editor, b, 4);
        drain(&mut sync, &editor);

        sync.clear_all(&mut editor);
        assert_eq!(editor.marker_count(MarkerKind::Breakpoint), 0);
        assert_eq!(drain(&mut sync, &editor), vec!["cbreak *"]);
    }

    #[test]
    fn test_clean_synchronizer_has_nothing_pending() {
        let editor = MemoryEditor::new();
        let mut sync = BreakpointSynchronizer::new();
        assert!(!sync.has_pending(&editor));
        assert_eq!(sync.next_command(&editor), None);
    }
}
