//! Byte-level SQL scanner for counting `?` input placeholders.
//!
//! Placeholders inside string literals and comments do not bind host
//! variables, so the scanner tracks quoting and comment state rather than
//! matching on raw bytes. Informix accepts `--` line comments plus both
//! `{ ... }` and `/* ... */` block comments.

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BraceComment,
    BlockComment,
}

pub(crate) fn count_placeholders(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut count = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        match state {
            State::Normal => match bytes[idx] {
                b'?' => count += 1,
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'{' => state = State::BraceComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    idx += 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if bytes[idx] == b'\'' {
                    // doubled quote is an escaped quote, not a terminator
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if bytes[idx] == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if bytes[idx] == b'\n' {
                    state = State::Normal;
                }
            }
            State::BraceComment => {
                if bytes[idx] == b'}' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::count_placeholders;

    #[test]
    fn counts_bare_placeholders() {
        assert_eq!(count_placeholders("select * from t where id < ?"), 1);
        assert_eq!(
            count_placeholders("insert into t( a, b ) values( ?, ? );"),
            2
        );
        assert_eq!(count_placeholders("select count(*) from t"), 0);
    }

    #[test]
    fn ignores_placeholders_in_string_literals() {
        assert_eq!(count_placeholders("select '?' from t where id < ?"), 1);
        assert_eq!(count_placeholders("select 'it''s a ?' from t"), 0);
        assert_eq!(count_placeholders(r#"select "a?b" from t where x = ?"#), 1);
    }

    #[test]
    fn ignores_placeholders_in_comments() {
        assert_eq!(count_placeholders("select 1 -- really? \nfrom t"), 0);
        assert_eq!(count_placeholders("select ? { a ? in braces } from t"), 1);
        assert_eq!(count_placeholders("select /* what? */ ? from t"), 1);
    }
}
