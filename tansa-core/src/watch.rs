//! ウォッチ式テーブルと同期
//!
//! ユーザーが編集・削除した行を FIFO に積み、プロンプト1回につき1行ずつ
//! デバッガへ送る。テーブルの末尾には常に空行（新しいウォッチの入力欄）を1つだけ置く。

use crate::command::DebugCommand;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// ウォッチ式の1行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchEntry {
    pub name: String,
    pub value: String,
}

impl WatchEntry {
    fn is_blank(&self) -> bool {
        self.name.is_empty()
    }
}

/// ウォッチ同期器
#[derive(Debug)]
pub struct WatchSynchronizer {
    rows: Vec<WatchEntry>,
    /// 同期待ちの行インデックス（0始まり）
    pending: VecDeque<usize>,
}

impl WatchSynchronizer {
    /// 空行1つだけのテーブルを作成する
    pub fn new() -> Self {
        Self {
            rows: vec![WatchEntry::default()],
            pending: VecDeque::new(),
        }
    }

    /// テーブルの全行
    pub fn rows(&self) -> &[WatchEntry] {
        &self.rows
    }

    /// 同期待ちの行インデックス
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 行の式を編集する
    ///
    /// 行が存在しなければ空行で埋めて作る。値は次の更新まで空になる。
    pub fn edit(&mut self, row: usize, name: &str) {
        self.ensure_row(row);
        let entry = &mut self.rows[row];
        entry.name = name.trim().to_string();
        entry.value.clear();
        self.pending.push_back(row);
    }

    /// 末尾の空行に式を追加し、その行インデックスを返す
    pub fn add(&mut self, name: &str) -> usize {
        let row = match self.rows.last() {
            Some(last) if last.is_blank() => self.rows.len() - 1,
            _ => self.rows.len(),
        };
        self.edit(row, name);
        row
    }

    /// 行を削除する
    ///
    /// 行そのものは残して名前を消し、解除コマンドが送られるように積む。
    pub fn delete(&mut self, row: usize) -> bool {
        let Some(entry) = self.rows.get_mut(row) else {
            return false;
        };
        entry.name.clear();
        entry.value.clear();
        self.pending.push_back(row);
        true
    }

    /// デバッガから届いた値を反映し、更新した行インデックスを返す
    ///
    /// `row` は1始まり。既存の行か末尾の次の行だけを受け付け、それ以外は `None`。
    pub fn apply_update(&mut self, row: usize, name: &str, value: &str) -> Option<usize> {
        let index = row.checked_sub(1)?;
        if index > self.rows.len() {
            warn!(
                "Ignoring watch update for row {} (table has {} rows)",
                row,
                self.rows.len()
            );
            return None;
        }
        let entry = WatchEntry {
            name: name.to_string(),
            value: value.to_string(),
        };
        if index == self.rows.len() {
            self.rows.push(entry);
        } else {
            self.rows[index] = entry;
        }
        Some(index)
    }

    /// 次に送るコマンドを1つ取り出す
    pub fn next_command(&mut self) -> Option<DebugCommand> {
        let row = self.pending.pop_front()?;
        let name = self.rows.get(row).map(|e| e.name.as_str()).unwrap_or("");
        debug!("Synchronizing watch row {}", row);
        if name.is_empty() {
            Some(DebugCommand::ClearWatch { row: row + 1 })
        } else {
            Some(DebugCommand::SetWatch {
                row: row + 1,
                name: name.to_string(),
            })
        }
    }

    /// 末尾の空行がちょうど1つになるように整える
    ///
    /// テーブルを変更した場合はtrueを返す。
    pub fn normalize_trailing_blank(&mut self) -> bool {
        let mut changed = false;
        while self.rows.len() >= 2
            && self.rows[self.rows.len() - 1].is_blank()
            && self.rows[self.rows.len() - 2].is_blank()
        {
            self.rows.pop();
            changed = true;
        }
        if !self.rows.last().is_some_and(WatchEntry::is_blank) {
            self.rows.push(WatchEntry::default());
            changed = true;
        }
        changed
    }

    /// 同期待ちを破棄する
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// 名前のある全行を同期待ちに積み直す（新しいデバッガに教えるため）
    pub fn rearm(&mut self) {
        self.pending = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_blank())
            .map(|(row, _)| row)
            .collect();
    }

    /// 全行の値を消す
    pub fn clear_values(&mut self) {
        for entry in &mut self.rows {
            entry.value.clear();
        }
    }

    fn ensure_row(&mut self, row: usize) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, WatchEntry::default());
        }
    }
}

impl Default for WatchSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut watches = WatchSynchronizer::new();
        watches.edit(2, "c");
        watches.edit(0, "a");
        watches.edit(5, "f");

        assert_eq!(watches.next_command().unwrap().to_string(), "w 3 c");
        assert_eq!(watches.next_command().unwrap().to_string(), "w 1 a");
        assert_eq!(watches.next_command().unwrap().to_string(), "w 6 f");
        assert_eq!(watches.next_command(), None);
    }

    #[test]
    fn test_delete_sends_clear() {
        let mut watches = WatchSynchronizer::new();
        let row = watches.add("total");
        assert_eq!(row, 0);
        watches.next_command();

        assert!(watches.delete(row));
        assert!(!watches.delete(17));
        assert_eq!(watches.next_command(), Some(DebugCommand::ClearWatch { row: 1 }));
    }

    #[test]
    fn test_normalize_trailing_blank() {
        let mut watches = WatchSynchronizer::new();
        watches.add("x");
        assert!(watches.normalize_trailing_blank());
        assert_eq!(watches.rows().len(), 2);
        assert!(!watches.normalize_trailing_blank());

        watches.edit(4, "y");
        watches.delete(4);
        assert!(watches.normalize_trailing_blank());
        assert_eq!(watches.rows().len(), 2);
        assert_eq!(watches.rows()[0].name, "x");
        assert!(watches.rows()[1].name.is_empty());
    }

    #[test]
    fn test_apply_update() {
        let mut watches = WatchSynchronizer::new();
        // 末尾の次の行への更新は追加になる
        assert_eq!(watches.apply_update(2, "n", "3"), Some(1));
        assert_eq!(watches.rows().len(), 2);
        assert_eq!(watches.apply_update(1, "m", "hello world"), Some(0));
        assert_eq!(
            watches.rows()[0],
            WatchEntry {
                name: "m".to_string(),
                value: "hello world".to_string()
            }
        );
    }

    #[test]
    fn test_apply_update_outside_table_is_ignored() {
        let mut watches = WatchSynchronizer::new();
        assert_eq!(watches.apply_update(3, "far", "1"), None);
        assert_eq!(watches.apply_update(usize::MAX, "huge", "1"), None);
        assert_eq!(watches.apply_update(0, "zero", "1"), None);
        assert_eq!(watches.rows(), &[WatchEntry::default()]);
    }

    #[test]
    fn test_rearm() {
        let mut watches = WatchSynchronizer::new();
        watches.edit(0, "a");
        watches.edit(2, "b");
        watches.clear_pending();
        assert!(!watches.has_pending());

        watches.rearm();
        assert_eq!(watches.pending().collect::<Vec<_>>(), vec![0, 2]);
    }
}
