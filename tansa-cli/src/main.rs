//! Tansa CLI - コマンドラインインターフェース
//!
//! スクリプト言語のデバッガを子プロセスとして動かすフロントエンド

mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, sleep};
use std::time::Duration;
use tansa_core::{
    ChildProcess, CommandLine, Editor, LaunchMode, MemoryEditor, SessionConfig, SessionController,
    SessionEvent, SessionState, ValueScope,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// プロンプト到達後、出力が止まったとみなすまでの空ポーリング回数
const SETTLE_TICKS: u32 = 3;

/// 実行中のプログラムが入力待ちとみなすまでの空ポーリング回数
const RUNNING_SETTLE_TICKS: u32 = 25;

/// Tansa - Debug session driver
#[derive(Parser)]
#[command(name = "tansa")]
#[command(version = "0.1.0")]
#[command(about = "Drive a script debugger as a child process", long_about = None)]
struct Cli {
    /// Interval between poll ticks in milliseconds
    #[arg(long, global = true, default_value_t = 20)]
    poll_interval_ms: u64,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: LaunchCommand,
}

#[derive(Subcommand)]
enum LaunchCommand {
    /// Run a program without debugging
    Run {
        /// Path to the program
        program: String,

        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a program under the debugger
    Debug {
        /// Path to the program
        program: String,

        /// Extra argument that asks the program for symbolic debug output
        #[arg(long)]
        debug_arg: Option<String>,

        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// ホストのイベントループ
pub(crate) struct Host {
    pub controller: SessionController,
    pub editor: MemoryEditor,
    pub interval: Duration,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut host = Host {
        controller: SessionController::new(SessionConfig::default()),
        editor: MemoryEditor::new(),
        interval: Duration::from_millis(cli.poll_interval_ms),
    };

    match cli.command {
        LaunchCommand::Run { program, args } => {
            let command_line = CommandLine::new(&program).args(args);
            launch(&mut host, LaunchMode::Run, &command_line)?;
            let input = spawn_stdin_reader();
            host.pump_until_exit(&input);
        }
        LaunchCommand::Debug {
            program,
            debug_arg,
            args,
        } => {
            let mut command_line = CommandLine::new(&program);
            if let Some(arg) = debug_arg {
                command_line = command_line.arg(arg);
            }
            let command_line = command_line.args(args);
            launch(&mut host, LaunchMode::Debug, &command_line)?;
            repl::run_repl(&mut host)?;
        }
    }

    Ok(())
}

/// ログ出力を初期化する（標準エラー出力へ）
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 端末の入力を1行ずつ受け取るスレッドを起動する
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin reader finished");
    });
    rx
}

/// 子プロセスを起動する
fn launch(host: &mut Host, mode: LaunchMode, command_line: &CommandLine) -> Result<()> {
    info!("Launching {:?}: {}", mode, command_line.display());
    println!("Starting: {}", command_line.display());
    let result = host
        .controller
        .launch(mode, || ChildProcess::spawn(command_line));
    // 起動失敗のメッセージもイベントとして届く
    host.print_events();
    result
}

impl Host {
    /// プロセスが終了するまで出力を流し続け、端末の入力をプログラムへ送る
    pub fn pump_until_exit(&mut self, input: &Receiver<String>) {
        while self.controller.wants_poll() {
            self.forward_input(input);
            self.tick();
            sleep(self.interval);
        }
    }

    /// 出力が落ち着くか、プロセスが終了するまでポーリングする
    ///
    /// プロンプトで停止していれば短く、実行中なら入力待ちとみなせるまで長めに待つ。
    pub fn pump_until_idle(&mut self) {
        let mut quiet = 0;
        while self.controller.wants_poll() {
            let had_events = self.tick();
            quiet = if had_events { 0 } else { quiet + 1 };
            let limit = match self.controller.state() {
                SessionState::PausedAtPrompt => SETTLE_TICKS,
                _ => RUNNING_SETTLE_TICKS,
            };
            if quiet >= limit {
                break;
            }
            sleep(self.interval);
        }
    }

    /// 届いている端末の入力をすべてプログラムへ送る
    fn forward_input(&mut self, input: &Receiver<String>) {
        while let Ok(line) = input.try_recv() {
            self.send_input(&line);
        }
    }

    /// 1行をプログラムの入力として送る
    pub fn send_input(&mut self, line: &str) {
        if let Err(e) = self.controller.send_input(line) {
            warn!("Failed to forward input: {:#}", e);
        }
    }

    /// 1回ポーリングしてイベントを表示する
    fn tick(&mut self) -> bool {
        self.controller.poll(&mut self.editor);
        self.print_events()
    }

    /// 溜まったイベントを表示し、何かあればtrueを返す
    pub fn print_events(&mut self) -> bool {
        let events = self.controller.take_events();
        let any = !events.is_empty();

        for event in events {
            match event {
                SessionEvent::Terminal(text) => {
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                SessionEvent::Status(message) => println!("[info] {}", message),
                SessionEvent::WatchUpdated { row } => {
                    if let Some(entry) = self.controller.watches().get(row) {
                        println!("[watch {}] {} = {}", row + 1, entry.name, entry.value);
                    }
                }
                SessionEvent::ValuePopup { scope, text, .. } => {
                    let scope = match scope {
                        ValueScope::Local => "local",
                        ValueScope::Global => "global",
                    };
                    println!("({}) {}", scope, text);
                }
                SessionEvent::Paused { path, line } => {
                    println!();
                    println!("Stopped at {}:{}", path, line + 1);
                    self.print_source_line(&path, line);
                }
                SessionEvent::Terminated => {
                    println!();
                    println!("Program terminated");
                }
                SessionEvent::Navigate { .. } | SessionEvent::WatchTableChanged => {}
            }
        }

        any
    }

    /// ソースの1行を表示する
    pub fn print_source_line(&self, path: &str, line: usize) {
        let Some(doc) = tansa_core::locate_document(&self.editor, path) else {
            return;
        };
        if let Some(text) = self.editor.line_text(doc, line) {
            println!("{:>5} => {}", line + 1, text);
        }
    }
}
