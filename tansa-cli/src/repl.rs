//! REPLコマンドの解析と実行

use crate::Host;
use anyhow::Result;
use regex::Regex;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::LazyLock;
use tansa_core::{locate_document, Editor, MemoryEditor, SessionController, SessionState};

/// 前後に表示するソース行数
const LIST_CONTEXT: usize = 5;

/// 停止中のプロンプト
const PROMPT: &str = "(tansa) ";

/// 実行中のプロンプト（入力はプログラムへ送られる）
const RUNNING_PROMPT: &str = "(tansa:running) ";

/// `<file>:<line>` 形式（Windows のドライブレターを含むパスは最後のコロンで区切る）
static LOCATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+):(\d+)$").expect("location pattern is a valid regex"));

/// REPLコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// 実行継続
    Continue,
    /// ステップイン
    Step,
    /// ステップオーバー
    Next,
    /// 現在の関数から抜けるまで実行
    Finish,
    /// 指定行（1始まり）まで実行
    Until(usize),
    /// ブレークポイントの切り替え（行は1始まり）
    Break { file: String, line: usize },
    /// 全ブレークポイント削除
    Delete,
    /// ブレークポイント一覧
    Breakpoints,
    /// ウォッチ式の追加
    Watch(String),
    /// ウォッチ式の削除（行は1始まり）
    Unwatch(usize),
    /// ウォッチ式一覧
    Watches,
    /// 式の評価
    Print(String),
    /// プログラムへの入力
    Input(String),
    /// 現在位置のソース表示
    List,
    /// プロセスの強制終了
    Kill,
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl ReplCommand {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };

        match head {
            "continue" | "c" => Some(ReplCommand::Continue),
            "step" | "s" => Some(ReplCommand::Step),
            "next" | "n" => Some(ReplCommand::Next),
            "finish" | "f" => Some(ReplCommand::Finish),
            "until" | "u" => rest.parse().ok().map(ReplCommand::Until),
            "break" | "b" => {
                let (file, line) = parse_location(rest)?;
                Some(ReplCommand::Break { file, line })
            }
            "delete" => Some(ReplCommand::Delete),
            "breakpoints" | "bl" => Some(ReplCommand::Breakpoints),
            "watch" | "w" if !rest.is_empty() => Some(ReplCommand::Watch(rest.to_string())),
            "unwatch" => rest.parse().ok().map(ReplCommand::Unwatch),
            "watches" => Some(ReplCommand::Watches),
            "print" | "p" if !rest.is_empty() => Some(ReplCommand::Print(rest.to_string())),
            "input" => Some(ReplCommand::Input(rest.to_string())),
            "list" | "l" => Some(ReplCommand::List),
            "kill" => Some(ReplCommand::Kill),
            "help" | "h" | "?" => Some(ReplCommand::Help),
            "quit" | "q" | "exit" => Some(ReplCommand::Quit),
            _ => None,
        }
    }
}

/// `<file>:<line>` をパースする
fn parse_location(s: &str) -> Option<(String, usize)> {
    let caps = LOCATION_PATTERN.captures(s)?;
    let line = caps[2].parse::<usize>().ok().filter(|&line| line > 0)?;
    Some((caps[1].to_string(), line))
}

/// REPLループを実行する
pub fn run_repl(host: &mut Host) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        host.pump_until_idle();
        if !host.controller.wants_poll() {
            break;
        }

        // 実行中に打った行はそのままプログラムの入力になる
        let running = host.controller.state() == SessionState::Running;
        let readline = rl.readline(if running { RUNNING_PROMPT } else { PROMPT });
        match readline {
            Ok(line) if running => host.send_input(&line),
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match ReplCommand::parse(line) {
                    Some(ReplCommand::Quit) => {
                        abort_if_running(host);
                        break;
                    }
                    Some(command) => {
                        if let Err(e) = handle_command(host, command) {
                            eprintln!("Error: {}", e);
                        }
                    }
                    None => {
                        println!("Unknown command: {}", line);
                        println!("Type 'help' for available commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                abort_if_running(host);
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                abort_if_running(host);
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                abort_if_running(host);
                break;
            }
        }
    }

    Ok(())
}

fn abort_if_running(host: &mut Host) {
    if host.controller.wants_poll() {
        if let Err(e) = host.controller.abort(&mut host.editor) {
            eprintln!("Error: {}", e);
        }
        host.print_events();
    }
}

fn handle_command(host: &mut Host, command: ReplCommand) -> Result<()> {
    let Host {
        controller, editor, ..
    } = host;

    match command {
        ReplCommand::Continue => controller.continue_execution(editor)?,
        ReplCommand::Step => controller.step_into(editor)?,
        ReplCommand::Next => controller.step_over(editor)?,
        ReplCommand::Finish => controller.step_out(editor)?,
        ReplCommand::Until(line) => controller.run_to_line(editor, line)?,
        ReplCommand::Break { file, line } => {
            match controller.toggle_breakpoint_at(editor, &file, line - 1) {
                Some(true) => println!("Breakpoint set at {}:{}", file, line),
                Some(false) => println!("Breakpoint removed at {}:{}", file, line),
                None => println!("Invalid breakpoint location: {}:{}", file, line),
            }
        }
        ReplCommand::Delete => {
            controller.clear_breakpoints(editor);
            println!("All breakpoints deleted");
        }
        ReplCommand::Breakpoints => {
            let breakpoints = controller.breakpoints(&*editor);
            if breakpoints.is_empty() {
                println!("No breakpoints");
            }
            for (i, bp) in breakpoints.iter().enumerate() {
                println!("  {}. {}:{}", i + 1, bp.file, bp.line + 1);
            }
        }
        ReplCommand::Watch(expr) => {
            let row = controller.add_watch(&expr);
            println!("Watch {} added: {}", row + 1, expr);
        }
        ReplCommand::Unwatch(row) => {
            if row == 0 || !controller.delete_watch(row - 1) {
                println!("No watch at row {}", row);
            }
        }
        ReplCommand::Watches => print_watches(controller),
        ReplCommand::Print(expr) => controller.evaluate(&expr, None)?,
        ReplCommand::Input(text) => controller.send_input(&text)?,
        ReplCommand::List => print_listing(controller, editor),
        ReplCommand::Kill => controller.abort(editor)?,
        ReplCommand::Help => print_help(),
        ReplCommand::Quit => {}
    }

    host.print_events();
    Ok(())
}

fn print_watches(controller: &SessionController) {
    let rows: Vec<_> = controller
        .watches()
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.name.is_empty())
        .collect();

    if rows.is_empty() {
        println!("No watches");
        return;
    }
    for (row, entry) in rows {
        println!("  {}. {} = {}", row + 1, entry.name, entry.value);
    }
}

/// 現在位置の前後を表示する
fn print_listing(controller: &SessionController, editor: &MemoryEditor) {
    let Some(session) = controller.session() else {
        println!("No session is running");
        return;
    };
    let path = session.current_file();
    let current = session.current_line();
    let Some(doc) = locate_document(editor, path) else {
        println!("Source not available: {}", path);
        return;
    };

    let start = current.saturating_sub(LIST_CONTEXT);
    for line in start..=current + LIST_CONTEXT {
        let Some(text) = editor.line_text(doc, line) else {
            break;
        };
        let mark = if line == current { "=>" } else { "  " };
        println!("{:>5} {} {}", line + 1, mark, text);
    }
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help              - Show this help message");
    println!("  quit/exit/q       - Kill the program and exit");
    println!();
    println!("Execution:");
    println!("  continue (c)      - Continue execution");
    println!("  step (s)          - Step into");
    println!("  next (n)          - Step over");
    println!("  finish (f)        - Run until the current function returns");
    println!("  until (u) <line>  - Run to a line in the current file");
    println!("  input <text>      - Send a line to the program's input");
    println!("                      (at the running prompt every line goes to the program)");
    println!("  kill              - Terminate the program");
    println!();
    println!("Breakpoints and watches:");
    println!("  break (b) <file>:<line> - Toggle a breakpoint");
    println!("  delete            - Delete all breakpoints");
    println!("  breakpoints (bl)  - List breakpoints");
    println!("  watch (w) <expr>  - Add a watch expression");
    println!("  unwatch <row>     - Remove a watch expression");
    println!("  watches           - List watch expressions");
    println!("  print (p) <expr>  - Evaluate an expression");
    println!("  list (l)          - Show source around the current line");
    println!();
    println!("Examples:");
    println!("  break main.p:12");
    println!("  watch total");
    println!("  until 40");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ReplCommand::parse("continue"), Some(ReplCommand::Continue));
        assert_eq!(ReplCommand::parse("c"), Some(ReplCommand::Continue));
        assert_eq!(ReplCommand::parse("finish"), Some(ReplCommand::Finish));
        assert_eq!(ReplCommand::parse("u 40"), Some(ReplCommand::Until(40)));
        assert_eq!(ReplCommand::parse("until"), None);
        assert_eq!(ReplCommand::parse("quit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("frobnicate"), None);
    }

    #[test]
    fn test_parse_break_location() {
        assert_eq!(
            ReplCommand::parse("break src/main.p:12"),
            Some(ReplCommand::Break {
                file: "src/main.p".to_string(),
                line: 12
            })
        );
        // Windows 形式のパスは最後のコロンで区切る
        assert_eq!(
            ReplCommand::parse("b C:\\work\\a.p:3"),
            Some(ReplCommand::Break {
                file: "C:\\work\\a.p".to_string(),
                line: 3
            })
        );
        assert_eq!(ReplCommand::parse("break main.p"), None);
        assert_eq!(ReplCommand::parse("break main.p:0"), None);
    }

    #[test]
    fn test_parse_watch_and_print() {
        assert_eq!(
            ReplCommand::parse("watch  a.b + 1 "),
            Some(ReplCommand::Watch("a.b + 1".to_string()))
        );
        assert_eq!(ReplCommand::parse("w"), None);
        assert_eq!(ReplCommand::parse("unwatch 2"), Some(ReplCommand::Unwatch(2)));
        assert_eq!(ReplCommand::parse("p x"), Some(ReplCommand::Print("x".to_string())));
        assert_eq!(ReplCommand::parse("input"), Some(ReplCommand::Input(String::new())));
    }
}
