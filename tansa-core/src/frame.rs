//! 帯域外フレームのパース
//!
//! デマルチプレクサが切り出したフレーム本体（プレフィックスと改行を除いた部分）を
//! 型付きの [`Frame`] に変換します。パースは純粋関数で、状態を持ちません。

/// 帯域外フレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 現在のソースファイル: `file<path>`
    File(String),
    /// ウォッチ値の更新: `watch<row> <name> <value...>`
    ///
    /// `row` はデバッガ側の1始まりの行番号
    Watch {
        row: usize,
        name: String,
        value: String,
    },
    /// ローカル変数の評価結果: `loc<tab><text>`
    LocalValue(String),
    /// グローバル変数の評価結果: `glb<tab><text>`
    GlobalValue(String),
    /// ステータスメッセージ: `info<text>`
    Info(String),
    /// プロンプト（デバッガが入力待ちになった）
    Prompt,
    /// 現在の行番号（1始まり）
    LineNumber(usize),
}

/// フレームのパースエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame verb '{0}'")]
    UnknownVerb(String),
    #[error("invalid line number '{0}'")]
    InvalidLineNumber(String),
    #[error("invalid watch row '{0}'")]
    InvalidWatchRow(String),
    #[error("watch frame without a name")]
    MissingWatchName,
}

impl Frame {
    /// フレーム本体をパースする
    ///
    /// # Arguments
    /// * `raw` - プレフィックスを除いたフレーム本体
    /// * `prompt` - プロンプトフレームとして扱うリテラル
    pub fn parse(raw: &str, prompt: &str) -> Result<Self, FrameError> {
        if raw == prompt {
            return Ok(Frame::Prompt);
        }

        // 子プロセスが CRLF を出す場合に備えて行末の CR を落とす
        let body = raw.strip_suffix('\r').unwrap_or(raw);
        if body.trim().is_empty() {
            return Err(FrameError::Empty);
        }

        if let Some(rest) = body.strip_prefix("file") {
            return Ok(Frame::File(rest.trim().to_string()));
        }
        if let Some(rest) = body.strip_prefix("watch") {
            return parse_watch(rest);
        }
        if let Some(rest) = body.strip_prefix("loc") {
            return Ok(Frame::LocalValue(text_after_tab(rest)));
        }
        if let Some(rest) = body.strip_prefix("glb") {
            return Ok(Frame::GlobalValue(text_after_tab(rest)));
        }
        if let Some(rest) = body.strip_prefix("info") {
            return Ok(Frame::Info(rest.trim().to_string()));
        }

        let token = body.trim();
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token
                .parse::<usize>()
                .map(Frame::LineNumber)
                .map_err(|_| FrameError::InvalidLineNumber(token.to_string()));
        }

        let verb = token.split_whitespace().next().unwrap_or(token);
        Err(FrameError::UnknownVerb(verb.to_string()))
    }
}

fn parse_watch(rest: &str) -> Result<Frame, FrameError> {
    let mut tokens = rest.split_whitespace();

    let row_token = tokens.next().unwrap_or("");
    let row = match row_token.parse::<usize>() {
        Ok(row) if row > 0 => row,
        _ => return Err(FrameError::InvalidWatchRow(row_token.to_string())),
    };

    let name = tokens.next().ok_or(FrameError::MissingWatchName)?.to_string();
    let value = tokens.collect::<Vec<_>>().join(" ");

    Ok(Frame::Watch { row, name, value })
}

/// 最初のタブ以降のテキストを取り出す
///
/// タブがなければ先頭の空白を除いた全体を返す
fn text_after_tab(rest: &str) -> String {
    match rest.split_once('\t') {
        Some((_, text)) => text.to_string(),
        None => rest.trim_start().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "dbg> ";

    #[test]
    fn test_parse_prompt() {
        assert_eq!(Frame::parse("dbg> ", PROMPT), Ok(Frame::Prompt));
        // 末尾の空白が欠けたものはプロンプトではない
        assert!(Frame::parse("dbg>", PROMPT).is_err());
    }

    #[test]
    fn test_parse_file() {
        assert_eq!(
            Frame::parse("file /src/main.p ", PROMPT),
            Ok(Frame::File("/src/main.p".to_string()))
        );
        assert_eq!(
            Frame::parse("file/src/main.p\r", PROMPT),
            Ok(Frame::File("/src/main.p".to_string()))
        );
    }

    #[test]
    fn test_parse_watch() {
        assert_eq!(
            Frame::parse("watch3 total   12 items  left", PROMPT),
            Ok(Frame::Watch {
                row: 3,
                name: "total".to_string(),
                value: "12 items left".to_string(),
            })
        );
        assert_eq!(
            Frame::parse("watch 1 x", PROMPT),
            Ok(Frame::Watch {
                row: 1,
                name: "x".to_string(),
                value: String::new(),
            })
        );
    }

    #[test]
    fn test_parse_watch_invalid() {
        assert_eq!(
            Frame::parse("watch0 x 1", PROMPT),
            Err(FrameError::InvalidWatchRow("0".to_string()))
        );
        assert_eq!(
            Frame::parse("watchx 1", PROMPT),
            Err(FrameError::InvalidWatchRow("x".to_string()))
        );
        assert_eq!(Frame::parse("watch 2", PROMPT), Err(FrameError::MissingWatchName));
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            Frame::parse("loc\tcount = 3", PROMPT),
            Ok(Frame::LocalValue("count = 3".to_string()))
        );
        assert_eq!(
            Frame::parse("glb x\tname = \"a\tb\"", PROMPT),
            Ok(Frame::GlobalValue("name = \"a\tb\"".to_string()))
        );
        assert_eq!(
            Frame::parse("info breakpoint set", PROMPT),
            Ok(Frame::Info("breakpoint set".to_string()))
        );
    }

    #[test]
    fn test_parse_line_number() {
        assert_eq!(Frame::parse("42", PROMPT), Ok(Frame::LineNumber(42)));
        assert_eq!(Frame::parse(" 7\r", PROMPT), Ok(Frame::LineNumber(7)));
        assert!(matches!(
            Frame::parse("99999999999999999999999999", PROMPT),
            Err(FrameError::InvalidLineNumber(_))
        ));
    }

    #[test]
    fn test_unknown_verb_is_not_a_line_number() {
        assert_eq!(
            Frame::parse("bogus 12", PROMPT),
            Err(FrameError::UnknownVerb("bogus".to_string()))
        );
        assert_eq!(Frame::parse("  ", PROMPT), Err(FrameError::Empty));
        assert_eq!(Frame::parse("12a", PROMPT), Err(FrameError::UnknownVerb("12a".to_string())));
    }
}
