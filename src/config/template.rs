//! `:placeholder` substitution, `~` expansion and shell quoting for paths and commands.

/// Replace `:key` placeholders in `template` with their values.
///
/// Substitution is a single left-to-right pass, so inserted values are never
/// scanned again. When keys share a prefix the longest key wins
/// (`:username` is not read as `:user` followed by `name`). Unknown
/// placeholders are left untouched.
///
/// # Examples
///
/// ```
/// use rsync_runner::config::template::insert;
///
/// let out = insert("~/:config-stem/:task-name/", [("config-stem", "rsync"), ("task-name", "www")]);
/// assert_eq!(out, "~/rsync/www/");
/// ```
#[must_use]
pub fn insert<'a>(template: &str, vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut vars: Vec<(&str, &str)> = vars.into_iter().filter(|(k, _)| !k.is_empty()).collect();
    vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(':') {
        let (before, from_colon) = rest.split_at(pos);
        out.push_str(before);
        let after = from_colon.get(1..).unwrap_or_default();
        if let Some((key, value)) = vars.iter().find(|(key, _)| after.starts_with(key)) {
            out.push_str(value);
            rest = after.get(key.len()..).unwrap_or_default();
        } else {
            out.push(':');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Expand a leading `~` (alone or followed by `/`) to `home`.
#[must_use]
pub fn expand_leading_tilde(path: &str, home: &str) -> String {
    if path == "~" {
        return home.to_string();
    }
    path.strip_prefix("~/").map_or_else(
        || path.to_string(),
        |rest| format!("{}/{rest}", home.trim_end_matches('/')),
    )
}

/// Expand every `~` that starts a word of a shell command line.
///
/// A tilde starts a word when it is at the beginning of the command or
/// follows whitespace, `=`, or a quote, and it must be followed by `/`,
/// whitespace, a quote, or the end of the command. `~user` forms are left
/// for the shell.
#[must_use]
pub fn expand_tilde_words(command: &str, home: &str) -> String {
    let home = home.trim_end_matches('/');
    let mut out = String::with_capacity(command.len());
    let mut prev: Option<char> = None;
    let mut chars = command.chars().peekable();
    while let Some(c) = chars.next() {
        let starts_word = prev.is_none_or(|p| p.is_whitespace() || matches!(p, '=' | '\'' | '"'));
        let ends_word = chars
            .peek()
            .is_none_or(|n| *n == '/' || n.is_whitespace() || matches!(n, '\'' | '"'));
        if c == '~' && starts_word && ends_word {
            out.push_str(home);
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// Quote `word` for a POSIX shell with single quotes.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Quote a path for a shell command, keeping a leading `~/` unquoted so the
/// shell that runs the command (local or remote) still expands it.
#[must_use]
pub fn quote_path(path: &str) -> String {
    if path == "~" {
        return path.to_string();
    }
    path.strip_prefix("~/")
        .map_or_else(|| shell_quote(path), |rest| format!("~/{}", shell_quote(rest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_known_keys() {
        let out = insert(
            "mysqldump -h:host -u:username :database",
            [("host", "db1"), ("username", "root"), ("database", "shop")],
        );
        assert_eq!(out, "mysqldump -hdb1 -uroot shop");
    }

    #[test]
    fn insert_prefers_longest_key() {
        let out = insert(":username/:user", [("user", "u"), ("username", "long")]);
        assert_eq!(out, "long/u");
    }

    #[test]
    fn insert_leaves_unknown_placeholders() {
        assert_eq!(insert("scp a nas:/tmp :x", [("host", "h")]), "scp a nas:/tmp :x");
    }

    #[test]
    fn insert_does_not_rescan_values() {
        assert_eq!(insert(":a", [("a", ":b"), ("b", "no")]), ":b");
    }

    #[test]
    fn insert_handles_trailing_colon_and_multibyte() {
        assert_eq!(insert("é:", [("a", "b")]), "é:");
    }

    #[test]
    fn leading_tilde_expansion() {
        assert_eq!(expand_leading_tilde("~", "/home/u"), "/home/u");
        assert_eq!(expand_leading_tilde("~/b", "/home/u"), "/home/u/b");
        assert_eq!(expand_leading_tilde("~/b", "/home/u/"), "/home/u/b");
        assert_eq!(expand_leading_tilde("/a/~/b", "/home/u"), "/a/~/b");
        assert_eq!(expand_leading_tilde("~other/b", "/home/u"), "~other/b");
    }

    #[test]
    fn tilde_words_in_commands() {
        assert_eq!(
            expand_tilde_words("tar czf ~/a.tgz ~/src --file=~/x", "/home/u"),
            "tar czf /home/u/a.tgz /home/u/src --file=/home/u/x"
        );
        assert_eq!(expand_tilde_words("cd ~", "/home/u"), "cd /home/u");
        assert_eq!(
            expand_tilde_words("echo a~b ~root", "/home/u"),
            "echo a~b ~root"
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(quote_path("/var/www"), "'/var/www'");
        assert_eq!(quote_path("~/backups/www/"), "~/'backups/www/'");
        assert_eq!(quote_path("~"), "~");
    }
}
