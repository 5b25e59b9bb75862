//! デバッガへ送るコマンド

use std::fmt;

/// 各コマンドの終端
pub const COMMAND_TERMINATOR: char = '\r';

/// デバッガコマンド
///
/// 行番号と行インデックスはすべて1始まりでワイヤに載る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugCommand {
    /// 実行継続: `g`
    Continue,
    /// 指定行まで実行: `g <line>`
    RunToLine(usize),
    /// 現在の関数から抜けるまで実行: `g func`
    StepOut,
    /// ステップイン: `s`
    StepInto,
    /// ステップオーバー: `n`
    StepOver,
    /// 式の評価: `d <expr>`
    Evaluate(String),
    /// ウォッチ式の設定: `w <row> <name>`
    SetWatch { row: usize, name: String },
    /// ウォッチ式の解除: `cw <row>`
    ClearWatch { row: usize },
    /// ブレークポイント設定: `break <file>:<line>`
    Break { file: String, line: usize },
    /// 全ブレークポイント解除: `cbreak *`
    ClearBreakpoints,
}

impl DebugCommand {
    /// 実行位置を動かすコマンドか
    ///
    /// これらを送るとセッションは実行中に戻る。
    pub fn resumes_execution(&self) -> bool {
        matches!(
            self,
            DebugCommand::Continue
                | DebugCommand::RunToLine(_)
                | DebugCommand::StepOut
                | DebugCommand::StepInto
                | DebugCommand::StepOver
        )
    }

    /// 終端付きのワイヤ表現
    pub fn to_wire(&self) -> Vec<u8> {
        let mut text = self.to_string();
        text.push(COMMAND_TERMINATOR);
        text.into_bytes()
    }
}

impl fmt::Display for DebugCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugCommand::Continue => write!(f, "g"),
            DebugCommand::RunToLine(line) => write!(f, "g {}", line),
            DebugCommand::StepOut => write!(f, "g func"),
            DebugCommand::StepInto => write!(f, "s"),
            DebugCommand::StepOver => write!(f, "n"),
            DebugCommand::Evaluate(expr) => write!(f, "d {}", expr),
            DebugCommand::SetWatch { row, name } => write!(f, "w {} {}", row, name),
            DebugCommand::ClearWatch { row } => write!(f, "cw {}", row),
            DebugCommand::Break { file, line } => write!(f, "break {}:{}", file, line),
            DebugCommand::ClearBreakpoints => write!(f, "cbreak *"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(DebugCommand::Continue.to_wire(), b"g\r");
        assert_eq!(DebugCommand::RunToLine(42).to_wire(), b"g 42\r");
        assert_eq!(DebugCommand::StepOut.to_wire(), b"g func\r");
        assert_eq!(DebugCommand::StepInto.to_string(), "s");
        assert_eq!(DebugCommand::StepOver.to_string(), "n");
        assert_eq!(DebugCommand::Evaluate("a.b".into()).to_string(), "d a.b");
        assert_eq!(
            DebugCommand::SetWatch { row: 3, name: "x".into() }.to_string(),
            "w 3 x"
        );
        assert_eq!(DebugCommand::ClearWatch { row: 1 }.to_string(), "cw 1");
        assert_eq!(
            DebugCommand::Break { file: "A".into(), line: 3 }.to_string(),
            "break A:3"
        );
        assert_eq!(DebugCommand::ClearBreakpoints.to_wire(), b"cbreak *\r");
    }

    #[test]
    fn test_resumes_execution() {
        assert!(DebugCommand::StepOver.resumes_execution());
        assert!(DebugCommand::RunToLine(1).resumes_execution());
        assert!(!DebugCommand::ClearBreakpoints.resumes_execution());
        assert!(!DebugCommand::Evaluate("x".into()).resumes_execution());
    }
}
