// ABOUTME: POSIX shell quoting for paths and values placed into remote commands.
// ABOUTME: Every interpolated path goes through shell_quote before reaching a remote shell.

/// Wrap `value` in single quotes, escaping embedded single quotes.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}
