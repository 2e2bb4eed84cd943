use std::sync::LazyLock;

use regex::Regex;

use super::CodeBlock;

/// Language tag used when the opening fence has none.
pub const DEFAULT_LANGUAGE: &str = "text";

/// Opening fence with an optional word-character tag, then the shortest run
/// of text up to the next fence.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(\w+)?\n(.*?)```")
        .unwrap_or_else(|e| panic!("invalid fence regex: {e}"))
});

/// Extracts fenced code blocks from completed response text.
///
/// Matches are non-overlapping and scanned left to right; each block closes
/// at the nearest following fence. A fence left open at the end of input
/// produces nothing. Output order is appearance order.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCE_RE
        .captures_iter(text)
        .map(|caps| {
            let language = caps
                .get(1)
                .map_or(DEFAULT_LANGUAGE, |m| m.as_str())
                .to_string();
            let content = caps.get(2).map_or("", |m| m.as_str()).to_string();
            CodeBlock { language, content }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tagged_block() {
        let blocks = extract_code_blocks("Here:\n```js\nconsole.log(1)\n```\nDone");
        assert_eq!(blocks, vec![CodeBlock::new("js", "console.log(1)\n")]);
    }

    #[test]
    fn test_missing_tag_defaults_to_text() {
        let blocks = extract_code_blocks("```\nplain\n```");
        assert_eq!(blocks, vec![CodeBlock::new("text", "plain\n")]);
    }

    #[test]
    fn test_unterminated_trailing_block_is_dropped() {
        let text = "```py\nprint(1)\n```\nthen\n```rust\nfn main() {";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks, vec![CodeBlock::new("py", "print(1)\n")]);
    }

    #[test]
    fn test_blocks_close_at_nearest_fence() {
        let text = "```a\none\n```\nmiddle\n```b\ntwo\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(
            blocks,
            vec![CodeBlock::new("a", "one\n"), CodeBlock::new("b", "two\n")]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_code_blocks("").is_empty());
        assert!(extract_code_blocks("no fences at all").is_empty());
    }

    #[test]
    fn test_empty_block() {
        let blocks = extract_code_blocks("```sh\n```");
        assert_eq!(blocks, vec![CodeBlock::new("sh", "")]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "intro\n```python\nimport plotly.express as px\n```\n```\nraw\n```\n```json\n{";
        let first = extract_code_blocks(text);
        let second = extract_code_blocks(text);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
