//! エディタ（ドキュメントとマーカー）とのインターフェース
//!
//! セッションはエディタの実装を知らず、[`Editor`] トレイトを通してのみ
//! 開いているドキュメントのマーカーを操作します。

use std::collections::BTreeSet;
use std::path::Path;

/// 開いているドキュメントのハンドル
pub type DocId = usize;

/// 行マーカーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKind {
    /// ブレークポイント
    Breakpoint,
    /// 現在の実行位置
    CurrentLine,
    /// ブックマーク
    Bookmark,
}

/// エディタ
///
/// 行番号はすべて0始まり。位置（position）はドキュメント先頭からの文字オフセット。
pub trait Editor {
    /// 開いているドキュメントを開いた順に列挙する
    fn documents(&self) -> Vec<DocId>;

    /// ドキュメントのファイルパス
    fn path(&self, doc: DocId) -> Option<String>;

    /// パスが完全に一致するドキュメントを探す
    fn find_by_path(&self, path: &str) -> Option<DocId>;

    /// ファイル名（ディレクトリを除いた部分）が一致するドキュメントを探す
    fn find_by_base_name(&self, name: &str) -> Option<DocId>;

    /// ドキュメントを開く（なければ作る）
    fn open_or_create(&mut self, path: &str) -> DocId;

    /// 位置を含む行
    fn line_from_position(&self, doc: DocId, position: usize) -> usize;

    /// 行の先頭位置
    fn position_from_line(&self, doc: DocId, line: usize) -> usize;

    /// 行のテキスト（改行を含まない）
    fn line_text(&self, doc: DocId, line: usize) -> Option<String>;

    fn add_marker(&mut self, doc: DocId, line: usize, kind: MarkerKind);

    fn remove_marker(&mut self, doc: DocId, line: usize, kind: MarkerKind);

    fn has_marker(&self, doc: DocId, line: usize, kind: MarkerKind) -> bool {
        self.markers(doc, kind).contains(&line)
    }

    /// 指定種類のマーカーがある行を昇順で列挙する
    fn markers(&self, doc: DocId, kind: MarkerKind) -> Vec<usize>;

    /// 行が見えるようにスクロールする
    fn scroll_to_line(&mut self, doc: DocId, line: usize);
}

/// パスの最後の要素
pub fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// パスに対応する開いているドキュメントを探す
///
/// 完全一致を優先し、なければファイル名で照合する。
pub fn locate_document<E: Editor + ?Sized>(editor: &E, path: &str) -> Option<DocId> {
    if path.is_empty() {
        return None;
    }
    editor
        .find_by_path(path)
        .or_else(|| editor.find_by_base_name(base_name(path)))
}

/// パスに対応するドキュメントを探し、なければ開く
pub fn locate_or_open<E: Editor + ?Sized>(editor: &mut E, path: &str) -> Option<DocId> {
    if path.is_empty() {
        return None;
    }
    match locate_document(editor, path) {
        Some(doc) => Some(doc),
        None => Some(editor.open_or_create(path)),
    }
}

/// メモリ上のドキュメント
#[derive(Debug, Clone)]
struct Document {
    path: String,
    lines: Vec<String>,
    breakpoints: BTreeSet<usize>,
    current: BTreeSet<usize>,
    bookmarks: BTreeSet<usize>,
    scrolled_to: Option<usize>,
}

impl Document {
    fn new(path: &str, text: &str) -> Self {
        Self {
            path: path.to_string(),
            lines: text.lines().map(str::to_string).collect(),
            breakpoints: BTreeSet::new(),
            current: BTreeSet::new(),
            bookmarks: BTreeSet::new(),
            scrolled_to: None,
        }
    }

    fn marker_set(&self, kind: MarkerKind) -> &BTreeSet<usize> {
        match kind {
            MarkerKind::Breakpoint => &self.breakpoints,
            MarkerKind::CurrentLine => &self.current,
            MarkerKind::Bookmark => &self.bookmarks,
        }
    }

    fn marker_set_mut(&mut self, kind: MarkerKind) -> &mut BTreeSet<usize> {
        match kind {
            MarkerKind::Breakpoint => &mut self.breakpoints,
            MarkerKind::CurrentLine => &mut self.current,
            MarkerKind::Bookmark => &mut self.bookmarks,
        }
    }
}

/// メモリ上のエディタ
///
/// CLIとテストで使う。`open_or_create` はファイルが存在すれば内容を読み込む。
#[derive(Debug, Default)]
pub struct MemoryEditor {
    documents: Vec<Option<Document>>,
}

impl MemoryEditor {
    /// 空のエディタを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// テキストを指定してドキュメントを開く
    pub fn open_with_text(&mut self, path: &str, text: &str) -> DocId {
        self.documents.push(Some(Document::new(path, text)));
        self.documents.len() - 1
    }

    /// ドキュメントを閉じる
    ///
    /// 閉じたドキュメントのマーカーは失われる。
    pub fn close(&mut self, doc: DocId) {
        if let Some(slot) = self.documents.get_mut(doc) {
            *slot = None;
        }
    }

    /// 最後にスクロールした行
    pub fn scrolled_to(&self, doc: DocId) -> Option<usize> {
        self.doc(doc).and_then(|d| d.scrolled_to)
    }

    /// 全ドキュメントの指定種類のマーカーを数える
    pub fn marker_count(&self, kind: MarkerKind) -> usize {
        self.documents
            .iter()
            .flatten()
            .map(|d| d.marker_set(kind).len())
            .sum()
    }

    fn doc(&self, doc: DocId) -> Option<&Document> {
        self.documents.get(doc).and_then(Option::as_ref)
    }

    fn doc_mut(&mut self, doc: DocId) -> Option<&mut Document> {
        self.documents.get_mut(doc).and_then(Option::as_mut)
    }
}

impl Editor for MemoryEditor {
    fn documents(&self) -> Vec<DocId> {
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(id, _)| id)
            .collect()
    }

    fn path(&self, doc: DocId) -> Option<String> {
        self.doc(doc).map(|d| d.path.clone())
    }

    fn find_by_path(&self, path: &str) -> Option<DocId> {
        self.documents
            .iter()
            .position(|d| d.as_ref().is_some_and(|d| d.path == path))
    }

    fn find_by_base_name(&self, name: &str) -> Option<DocId> {
        self.documents
            .iter()
            .position(|d| d.as_ref().is_some_and(|d| base_name(&d.path) == name))
    }

    fn open_or_create(&mut self, path: &str) -> DocId {
        if let Some(doc) = self.find_by_path(path) {
            return doc;
        }
        let text = std::fs::read_to_string(path).unwrap_or_default();
        self.open_with_text(path, &text)
    }

    fn line_from_position(&self, doc: DocId, position: usize) -> usize {
        let Some(d) = self.doc(doc) else {
            return 0;
        };
        let mut start = 0;
        for (line, text) in d.lines.iter().enumerate() {
            let end = start + text.chars().count();
            if position <= end {
                return line;
            }
            // 改行の1文字分
            start = end + 1;
        }
        d.lines.len().saturating_sub(1)
    }

    fn position_from_line(&self, doc: DocId, line: usize) -> usize {
        self.doc(doc)
            .map(|d| {
                d.lines
                    .iter()
                    .take(line)
                    .map(|text| text.chars().count() + 1)
                    .sum()
            })
            .unwrap_or(0)
    }

    fn line_text(&self, doc: DocId, line: usize) -> Option<String> {
        self.doc(doc).and_then(|d| d.lines.get(line).cloned())
    }

    fn add_marker(&mut self, doc: DocId, line: usize, kind: MarkerKind) {
        if let Some(d) = self.doc_mut(doc) {
            d.marker_set_mut(kind).insert(line);
        }
    }

    fn remove_marker(&mut self, doc: DocId, line: usize, kind: MarkerKind) {
        if let Some(d) = self.doc_mut(doc) {
            d.marker_set_mut(kind).remove(&line);
        }
    }

    fn markers(&self, doc: DocId, kind: MarkerKind) -> Vec<usize> {
        self.doc(doc)
            .map(|d| d.marker_set(kind).iter().copied().collect())
            .unwrap_or_default()
    }

    fn scroll_to_line(&mut self, doc: DocId, line: usize) {
        if let Some(d) = self.doc_mut(doc) {
            d.scrolled_to = Some(line);
        }
    }
}
