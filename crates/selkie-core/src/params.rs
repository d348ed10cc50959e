//! URL-hash argument grammar.
//!
//! State is carried in fragments like `#doc=news/42&focus=T1~T3,T5`: `&`
//! separates keys, `,` separates list items and `~` separates the fields of
//! one item. All-digit tokens decode as integers.

use std::fmt::Write as _;

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgToken {
    Int(i64),
    Str(String),
}

impl ArgToken {
    fn parse(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse::<i64>() {
                return ArgToken::Int(n);
            }
        }
        ArgToken::Str(s.to_string())
    }

    fn write_to(&self, out: &mut String) {
        match self {
            ArgToken::Int(n) => {
                let _ = write!(out, "{n}");
            }
            ArgToken::Str(s) => out.push_str(s),
        }
    }
}

pub type UrlArgs = IndexMap<String, Vec<Vec<ArgToken>>>;

/// Decodes a fragment string (without the leading `#`) into argument lists.
pub fn deparam(fragment: &str) -> UrlArgs {
    let mut args = UrlArgs::default();
    if fragment.is_empty() {
        return args;
    }
    for pair in fragment.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let items = if value.is_empty() {
            Vec::new()
        } else {
            value
                .split(',')
                .map(|item| item.split('~').map(ArgToken::parse).collect())
                .collect()
        };
        args.insert(key.to_string(), items);
    }
    args
}

/// Encodes argument lists back into a fragment string. Inverse of [`deparam`]
/// for arguments produced by it.
pub fn param(args: &UrlArgs) -> String {
    let mut out = String::new();
    for (key, items) in args {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            for (j, token) in item.iter().enumerate() {
                if j > 0 {
                    out.push('~');
                }
                token.write_to(&mut out);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lists_and_sublists() {
        let args = deparam("doc=news/42&focus=T1~T3,T5");
        assert_eq!(args["doc"], vec![vec![ArgToken::Str("news/42".into())]]);
        assert_eq!(
            args["focus"],
            vec![
                vec![ArgToken::Str("T1".into()), ArgToken::Str("T3".into())],
                vec![ArgToken::Str("T5".into())],
            ]
        );
    }

    #[test]
    fn digit_tokens_decode_as_integers() {
        let args = deparam("match=3~12,4~7");
        assert_eq!(
            args["match"],
            vec![
                vec![ArgToken::Int(3), ArgToken::Int(12)],
                vec![ArgToken::Int(4), ArgToken::Int(7)],
            ]
        );
    }

    #[test]
    fn param_round_trips() {
        for fragment in ["doc=a&focus=T1~T3,T5", "match=3~12", "empty="] {
            assert_eq!(param(&deparam(fragment)), fragment);
        }
    }
}
