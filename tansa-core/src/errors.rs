//! セッション操作のエラー

/// セッションコントローラの操作が受け付けられない理由
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// 実行中のセッションがない
    #[error("No session is running")]
    NotRunning,
    /// 既にセッションが動いている
    #[error("A session is already running")]
    AlreadyRunning,
    /// デバッグモードで起動されていない
    #[error("The session was not started in debug mode")]
    NotDebugging,
    /// プロンプトで停止していない
    #[error("The debugger is not waiting at a prompt")]
    NotPaused,
    /// 子プロセスの起動に失敗した
    #[error("Failed to start program: {0}")]
    SpawnFailed(String),
}
