//! 子プロセスとのバイトストリーム通信の抽象化

use crate::Result;

/// トランスポート層のエラー
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 子プロセスの起動に失敗した
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 子プロセスの標準入力が閉じられている
    #[error("standard input of the child process is closed")]
    InputClosed,
}

/// デバッグ対象プロセスとのバイトストリーム
///
/// セッション層はこのトレイトを通してのみ子プロセスに触れます。
/// どのメソッドもブロックしてはいけません。
pub trait Transport {
    /// プロセスIDを取得する
    fn pid(&self) -> Option<u32>;

    /// プロセスがまだ生きているか確認する
    fn is_alive(&mut self) -> bool;

    /// 標準出力から現在読み取り可能なバイトをすべて読み出す
    ///
    /// データがなければ空のベクタを返します。
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// 標準エラー出力から現在読み取り可能なバイトをすべて読み出す
    ///
    /// 帯域外フレームは標準出力にしか流れないので、こちらは端末テキストとしてだけ扱われます。
    fn read_stderr(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// バイト列を書き込む
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// 終了シグナル（SIGTERM）を送る
    fn terminate(&mut self) -> Result<()>;

    /// 強制終了（SIGKILL）する
    fn kill(&mut self) -> Result<()>;
}
