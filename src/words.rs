//! 中英文混合词数统计
//! 两个汉字按一个"词"的阅读量计算，用于决定每段挖 1 个还是 2 个空。

use once_cell::sync::Lazy;
use regex::Regex;

static PUNCT_AND_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[，。！？、；：\u{201c}\u{201d}\u{2018}\u{2019}（）【】《》\\s]+").unwrap());

/// 判断是否为 CJK 汉字（基本区）
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// 统计词数：汉字两个记一词（向上取整），英文按空白分词。
/// 含汉字的 token 不重复计入英文词。
pub fn count_words(text: &str) -> usize {
    let cleaned = PUNCT_AND_SPACE.replace_all(text, " ");
    let cjk_count = cleaned.chars().filter(|c| is_cjk(*c)).count();
    let latin_words = cleaned
        .split_whitespace()
        .filter(|w| !w.is_empty() && !w.chars().any(is_cjk))
        .count();
    cjk_count.div_ceil(2) + latin_words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("，。！？"), 0);
    }

    #[test]
    fn test_pure_chinese() {
        // 22 个汉字 -> ceil(22/2) = 11
        let text = "区块链是一种分布式账本技术，广泛应用于金融领域。";
        assert_eq!(count_words(text), 11);
    }

    #[test]
    fn test_pure_english() {
        assert_eq!(count_words("The quick brown fox jumps"), 5);
    }

    #[test]
    fn test_mixed_text() {
        // 汉字：是语言 -> 2 词；英文：Rust systems programming -> 3 词
        assert_eq!(count_words("Rust 是 systems programming 语言。"), 5);
    }

    #[test]
    fn test_token_with_cjk_not_counted_as_english() {
        // "Rust语言" 含汉字，整个 token 不计入英文词
        assert_eq!(count_words("Rust语言"), 1);
    }
}
