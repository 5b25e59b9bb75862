//! 実際の子プロセスを使ったトランスポートのテスト

use std::thread::sleep;
use std::time::{Duration, Instant};
use tansa_target::{ChildProcess, CommandLine, Transport};

/// 条件を満たすまで出力を読み続ける
fn read_until<F>(process: &mut ChildProcess, timeout: Duration, mut done: F) -> Vec<u8>
where
    F: FnMut(&[u8]) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut output = Vec::new();
    while Instant::now() < deadline {
        output.extend(process.read_available().unwrap());
        if done(&output) {
            break;
        }
        sleep(Duration::from_millis(10));
    }
    output
}

#[test]
fn test_echo_roundtrip() {
    let cmd = CommandLine::new("/bin/cat");
    let mut process = ChildProcess::spawn(&cmd).expect("Failed to spawn cat");
    assert!(process.is_alive());

    // 何も書いていないので読み取りはブロックせずに空を返す
    assert!(process.read_available().unwrap().is_empty());

    process.write(b"hello tansa\n").unwrap();
    let output = read_until(&mut process, Duration::from_secs(5), |out| {
        out.ends_with(b"hello tansa\n")
    });
    assert_eq!(output, b"hello tansa\n");

    process.terminate().unwrap();
    process.kill().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while process.is_alive() && Instant::now() < deadline {
        sleep(Duration::from_millis(10));
    }
    assert!(!process.is_alive());
}

#[test]
fn test_exit_is_observed_by_polling() {
    let cmd = CommandLine::new("/bin/sh").args(["-c", "printf done; printf err >&2"]);
    let mut process = ChildProcess::spawn(&cmd).expect("Failed to spawn sh");

    let output = read_until(&mut process, Duration::from_secs(5), |out| out == b"done");
    assert_eq!(output, b"done");

    // 標準エラー出力は別に読み出され、標準出力には混ざらない
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut errors = Vec::new();
    while errors != b"err" && Instant::now() < deadline {
        errors.extend(process.read_stderr().unwrap());
        sleep(Duration::from_millis(10));
    }
    assert_eq!(errors, b"err");

    let deadline = Instant::now() + Duration::from_secs(5);
    while process.is_alive() && Instant::now() < deadline {
        sleep(Duration::from_millis(10));
    }
    assert!(!process.is_alive());

    // 終了後の terminate / kill はエラーにならない
    process.terminate().unwrap();
    process.kill().unwrap();
}

#[test]
fn test_large_write_does_not_block() {
    let cmd = CommandLine::new("/bin/cat");
    let mut process = ChildProcess::spawn(&cmd).expect("Failed to spawn cat");

    // パイプの容量を大きく超える入力でも write はすぐに戻る
    let input = vec![b'x'; 1 << 20];
    process.write(&input).unwrap();
    assert!(process.pending_input() > 0);

    let output = read_until(&mut process, Duration::from_secs(10), |out| {
        out.len() >= input.len()
    });
    assert_eq!(output.len(), input.len());
    assert_eq!(process.pending_input(), 0);

    process.kill().unwrap();
}
