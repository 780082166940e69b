//! Code fence sizing
//!
//! One fence is chosen per render, long enough that no backtick run inside
//! any fenced content can close a block early.

/// Shortest fence ever emitted
pub const MIN_FENCE_LEN: usize = 5;

const FENCE_CHAR: char = '`';

/// Length of the longest run of consecutive backticks in `content`
pub fn longest_backtick_run(content: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == FENCE_CHAR {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Fence length for a set of contents: one past the longest backtick run,
/// never below [`MIN_FENCE_LEN`].
pub fn fence_len<'a, I>(contents: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let longest = contents.into_iter().map(longest_backtick_run).max().unwrap_or(0);
    (longest + 1).max(MIN_FENCE_LEN)
}

/// The fence string for a set of contents
pub fn fence_for<'a, I>(contents: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    FENCE_CHAR.to_string().repeat(fence_len(contents))
}
