//! Shell quoting for command lines sent to a target host.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments into one command line.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tokens_pass_through_unquoted() {
        assert_eq!(quote_arg("fastlane"), "fastlane");
        assert_eq!(quote_arg("origin/release-2026.09"), "origin/release-2026.09");
        assert_eq!(quote_arg("REL-1383-16"), "REL-1383-16");
    }

    #[test]
    fn lane_options_with_metacharacters_get_quoted() {
        assert_eq!(quote_arg("scheme:App (AdHoc)"), "'scheme:App (AdHoc)'");
        assert_eq!(
            quote_arg("changelog:fixed the 'login' crash"),
            "'changelog:fixed the '\\''login'\\'' crash'"
        );
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn tag_command_line_quotes_only_the_message() {
        let cmd = vec![
            "git".to_string(),
            "tag".to_string(),
            "-a".to_string(),
            "REL-1383-16".to_string(),
            "-m".to_string(),
            "release 1383 build 16".to_string(),
        ];
        assert_eq!(
            quote_args(&cmd),
            "git tag -a REL-1383-16 -m 'release 1383 build 16'"
        );
    }

    #[test]
    fn work_dir_paths_are_always_quoted() {
        assert_eq!(
            quote_path("/tmp/stagehand-1f3a"),
            "'/tmp/stagehand-1f3a'"
        );
        assert_eq!(quote_path("/srv/o'brien"), "'/srv/o'\\''brien'");
    }
}
