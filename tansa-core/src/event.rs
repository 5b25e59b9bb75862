//! UI層へ通知するイベント

use crate::editor::DocId;

/// 値ポップアップの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueScope {
    Local,
    Global,
}

/// ホバー位置（評価を依頼した場所）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverPosition {
    pub doc: DocId,
    pub position: usize,
}

/// セッションイベント
///
/// 1回のポーリングで発生したものが発生順に溜まり、ホストが取り出して表示する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 端末に追記するテキスト
    Terminal(String),
    /// 一時的なステータスメッセージ
    Status(String),
    /// ウォッチ行が更新された（0始まり）
    WatchUpdated { row: usize },
    /// ウォッチテーブルの行構成が変わった
    WatchTableChanged,
    /// 評価結果のポップアップ
    ValuePopup {
        scope: ValueScope,
        text: String,
        hover: Option<HoverPosition>,
    },
    /// ファイルの行へ移動した（0始まり）
    Navigate { path: String, line: usize },
    /// プロンプトで停止した（0始まり）
    Paused { path: String, line: usize },
    /// プロセスが終了した
    Terminated,
}
