//! 隐私过滤：查询离开进程前的匿名化
//!
//! 分级：off 原样透传；standard 遮蔽邮箱与长数字串（电话、卡号、证件号）；
//! strict 额外遮蔽 URL 与 @handle。Anonymizer 是可替换的能力，循环只依赖 trait。

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// 隐私级别（对应配置 [privacy] level）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Off,
    #[default]
    Standard,
    Strict,
}

/// 匿名化函数
pub trait Anonymizer: Send + Sync {
    fn anonymize(&self, text: &str) -> String;
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static DIGITS_RE: OnceLock<Regex> = OnceLock::new();
static URL_RE: OnceLock<Regex> = OnceLock::new();
static HANDLE_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap())
}

/// 7 位以上的数字串，允许中间出现空格或连字符
fn digits_re() -> &'static Regex {
    DIGITS_RE.get_or_init(|| Regex::new(r"\+?\d(?:[ -]?\d){6,}").unwrap())
}

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

fn handle_re() -> &'static Regex {
    HANDLE_RE.get_or_init(|| Regex::new(r"(^|\s)@[A-Za-z0-9_]{2,}").unwrap())
}

/// 基于正则的分级遮蔽
#[derive(Debug, Clone, Copy)]
pub struct MaskingAnonymizer {
    level: PrivacyLevel,
}

impl MaskingAnonymizer {
    pub fn new(level: PrivacyLevel) -> Self {
        Self { level }
    }
}

impl Anonymizer for MaskingAnonymizer {
    fn anonymize(&self, text: &str) -> String {
        if self.level == PrivacyLevel::Off {
            return text.to_string();
        }
        let mut out = text.to_string();
        if self.level == PrivacyLevel::Strict {
            out = url_re().replace_all(&out, "[url]").into_owned();
            out = handle_re().replace_all(&out, "${1}[handle]").into_owned();
        }
        // 邮箱先于数字串处理，避免邮箱中的数字被单独遮蔽
        out = email_re().replace_all(&out, "[email]").into_owned();
        out = digits_re().replace_all(&out, "[number]").into_owned();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_passes_through() {
        let a = MaskingAnonymizer::new(PrivacyLevel::Off);
        assert_eq!(a.anonymize("mail bob@example.com"), "mail bob@example.com");
    }

    #[test]
    fn test_standard_masks_email_and_numbers() {
        let a = MaskingAnonymizer::new(PrivacyLevel::Standard);
        assert_eq!(
            a.anonymize("who owns bob@example.com or +1 555-123-4567"),
            "who owns [email] or [number]"
        );
        // 短数字（年份等）保留
        assert_eq!(a.anonymize("rust 2024 edition"), "rust 2024 edition");
        // standard 不动 URL
        assert_eq!(a.anonymize("see https://docs.rs"), "see https://docs.rs");
    }

    #[test]
    fn test_strict_masks_urls_and_handles() {
        let a = MaskingAnonymizer::new(PrivacyLevel::Strict);
        assert_eq!(
            a.anonymize("@alice shared https://a.example/x?id=1"),
            "[handle] shared [url]"
        );
    }

    #[test]
    fn test_level_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: PrivacyLevel,
        }
        let w: Wrapper = serde_json::from_str(r#"{"level": "strict"}"#).unwrap();
        assert_eq!(w.level, PrivacyLevel::Strict);
    }
}
