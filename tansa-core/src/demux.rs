//! 出力ストリームの分離
//!
//! 子プロセスの出力バイト列を、端末に表示するプレーンテキストと
//! エスケーププレフィックスで始まる帯域外フレームに分離します。
//! 状態（プレフィックスの一致数とフレームバッファ）はチャンクをまたいで保持されるので、
//! バイト列がどこで分割されて届いても結果は変わりません。

use crate::config::SessionConfig;

/// バックスペース
const BACKSPACE: u8 = 0x08;

/// フレーム本体の最大長（超えたらフレームではなかったとみなす）
pub const MAX_FRAME_LEN: usize = 4096;

/// 1回の `feed` の結果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Demuxed {
    /// 端末に表示するテキスト
    pub text: Vec<u8>,
    /// 完結したフレーム本体（到着順）
    pub frames: Vec<String>,
}

impl Demuxed {
    /// テキストをUTF-8として取り出す（不正なバイトは置換文字になる）
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

/// ストリームデマルチプレクサ
pub struct StreamDemultiplexer {
    prefix: [u8; 3],
    prompt: Vec<u8>,
    /// falseの場合はフレームを探さない（通常実行）
    enabled: bool,
    /// プレフィックスと一致したバイト数
    holdback: usize,
    /// フレーム本体を読み込み中か
    in_frame: bool,
    frame: Vec<u8>,
}

impl StreamDemultiplexer {
    /// 新しいデマルチプレクサを作成する
    pub fn new(config: &SessionConfig, enabled: bool) -> Self {
        Self {
            prefix: config.frame_prefix,
            prompt: config.prompt.as_bytes().to_vec(),
            enabled,
            holdback: 0,
            in_frame: false,
            frame: Vec::new(),
        }
    }

    /// フレーム検出が有効か
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 保留中のプレフィックスのバイト数
    pub fn holdback(&self) -> usize {
        self.holdback
    }

    /// 読み込み途中のフレームがあるか
    pub fn has_partial_frame(&self) -> bool {
        self.in_frame
    }

    /// バイト列を処理する
    pub fn feed(&mut self, chunk: &[u8]) -> Demuxed {
        let mut out = Demuxed::default();

        for &byte in chunk {
            if !self.enabled {
                push_text(&mut out.text, byte);
                continue;
            }

            if self.in_frame {
                self.accumulate(byte, &mut out);
                continue;
            }

            if byte == self.prefix[self.holdback] {
                self.holdback += 1;
                if self.holdback == self.prefix.len() {
                    self.in_frame = true;
                    self.frame.clear();
                }
                continue;
            }

            // 一致しかけていたバイトはテキストとしてそのまま戻す
            out.text.extend_from_slice(&self.prefix[..self.holdback]);
            self.holdback = 0;
            push_text(&mut out.text, byte);
        }

        out
    }

    /// フレーム本体にバイトを追加し、完結したら取り出す
    ///
    /// 改行のないまま最大長を超えたら、プレフィックスごとテキストとして戻す。
    fn accumulate(&mut self, byte: u8, out: &mut Demuxed) {
        if byte != b'\n' {
            self.frame.push(byte);
            if self.frame.len() > MAX_FRAME_LEN {
                out.text.extend_from_slice(&self.prefix);
                for &b in &self.frame {
                    push_text(&mut out.text, b);
                }
                self.reset_frame();
                return;
            }
            if self.frame != self.prompt {
                return;
            }
        }

        out.frames.push(String::from_utf8_lossy(&self.frame).into_owned());
        self.reset_frame();
    }

    fn reset_frame(&mut self) {
        self.frame.clear();
        self.in_frame = false;
        self.holdback = 0;
    }
}

/// テキストにバイトを追加する（バックスペースは直前の1文字を消す）
fn push_text(text: &mut Vec<u8>, byte: u8) {
    if byte != BACKSPACE {
        text.push(byte);
        return;
    }

    // UTF-8の継続バイトごと1文字分を取り除く
    while let Some(last) = text.pop() {
        if last & 0xC0 != 0x80 {
            break;
        }
    }
}
