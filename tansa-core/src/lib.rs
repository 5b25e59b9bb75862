//! Tansa デバッグセッションのコア機能
//!
//! このクレートは、外部のデバッガを子プロセスとして動かすためのプロトコルエンジンを提供します。
//! 子プロセスの出力を端末テキストと帯域外フレームに分離し、
//! エディタ上のブレークポイントとウォッチ式をプロンプトごとに1コマンドずつデバッガと同期します。

pub mod breakpoint;
pub mod command;
pub mod config;
pub mod demux;
pub mod dispatcher;
pub mod editor;
pub mod errors;
pub mod event;
pub mod frame;
pub mod session;
pub mod watch;

pub use breakpoint::{BreakpointLocation, BreakpointSynchronizer};
pub use command::DebugCommand;
pub use config::SessionConfig;
pub use demux::{Demuxed, StreamDemultiplexer};
pub use editor::{locate_document, locate_or_open, DocId, Editor, MarkerKind, MemoryEditor};
pub use errors::SessionError;
pub use event::{HoverPosition, SessionEvent, ValueScope};
pub use frame::{Frame, FrameError};
pub use session::{DebugSession, LaunchMode, SessionController, SessionState};
pub use watch::{WatchEntry, WatchSynchronizer};

// 他のクレートから使用するために再エクスポート
pub use tansa_target::{ChildProcess, CommandLine, Transport};

/// コアの結果型
pub type Result<T> = anyhow::Result<T>;
