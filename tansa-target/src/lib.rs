//! Tansa ターゲットプロセス制御
//!
//! このクレートは、デバッグ対象の子プロセスを制御するための低レベル機能を提供します。
//! 子プロセスの起動、ノンブロッキングな標準入出力の読み書き、生存確認、
//! 終了シグナルの送信などを行います。

pub mod process;
pub mod transport;

pub use process::{ChildProcess, CommandLine};
pub use transport::{Transport, TransportError};

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;
