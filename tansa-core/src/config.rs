//! セッション設定

/// フレームの開始を示すエスケーププレフィックスの既定値（ESC ] >）
pub const DEFAULT_FRAME_PREFIX: [u8; 3] = [0x1b, b']', b'>'];

/// プロンプトフレームの既定値
pub const DEFAULT_PROMPT: &str = "dbg> ";

/// デバッグセッションの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// 帯域外フレームのプレフィックス
    pub frame_prefix: [u8; 3],
    /// 改行なしで完結するプロンプトフレーム
    pub prompt: String,
}

impl SessionConfig {
    /// プロンプト文字列を差し替える
    ///
    /// 空文字列は無視して既定値を保ちます。
    pub fn with_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.prompt = prompt;
        }
        self
    }

    /// プレフィックスを差し替える
    pub fn with_frame_prefix(mut self, prefix: [u8; 3]) -> Self {
        self.frame_prefix = prefix;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_prefix: DEFAULT_FRAME_PREFIX,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prompt_is_ignored() {
        let config = SessionConfig::default().with_prompt("");
        assert_eq!(config.prompt, DEFAULT_PROMPT);

        let config = SessionConfig::default().with_prompt("(p) ");
        assert_eq!(config.prompt, "(p) ");
    }
}
