//! Static stopword table, compile-time-frozen and read-only at runtime.
//!
//! Union of (a) common English stopwords and (b) keywords from mainstream
//! languages (Go, Python, JS/TS, Java/C#, C/C++, Rust, PHP, Ruby) plus very
//! short source-code noise tokens.

use std::collections::HashSet;
use std::sync::OnceLock;

const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "you", "your", "yours", "yourself", "yourselves",
];

const GO: &[&str] = &[
    "func", "package", "import", "var", "const", "type", "struct", "interface", "map", "chan",
    "goroutine", "defer", "select", "range", "fallthrough", "go",
];

const PYTHON: &[&str] = &[
    "def", "elif", "lambda", "yield", "import", "from", "as", "with", "pass", "raise", "except",
    "finally", "try", "global", "nonlocal", "class", "self", "none", "true", "false",
];

const JS_TS: &[&str] = &[
    "function", "var", "let", "const", "export", "import", "default", "async", "await", "yield",
    "typeof", "instanceof", "new", "this", "extends", "implements", "interface", "type",
    "namespace", "undefined", "null",
];

const JAVA_CSHARP: &[&str] = &[
    "public", "private", "protected", "static", "final", "abstract", "class", "interface",
    "extends", "implements", "void", "new", "this", "super", "namespace", "using", "override",
    "virtual", "sealed", "readonly", "async",
];

const C_CPP: &[&str] = &[
    "int", "char", "float", "double", "void", "struct", "union", "typedef", "sizeof", "static",
    "extern", "const", "volatile", "include", "define", "ifdef", "ifndef", "endif", "namespace",
    "template", "typename", "public", "private", "protected", "virtual",
];

const RUST: &[&str] = &[
    "fn", "let", "mut", "impl", "trait", "struct", "enum", "match", "use", "mod", "pub", "crate",
    "self", "super", "dyn", "where", "async", "await", "unsafe", "move", "ref",
];

const PHP: &[&str] = &[
    "echo", "function", "public", "private", "protected", "class", "namespace", "use", "require",
    "require_once", "include", "include_once", "endif", "endforeach", "endwhile", "array",
];

const RUBY: &[&str] = &[
    "def", "end", "module", "require", "require_relative", "attr_accessor", "attr_reader",
    "attr_writer", "yield", "puts", "nil", "elsif", "unless", "begin", "rescue", "ensure",
];

const SOURCE_NOISE: &[&str] = &[
    "id", "err", "val", "arg", "ctx", "fmt", "str", "len", "idx", "tmp", "res", "obj", "ret",
    "buf", "cfg", "env", "req", "ok",
];

fn table() -> &'static HashSet<&'static str> {
    static TABLE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut set = HashSet::new();
        for list in [
            ENGLISH,
            GO,
            PYTHON,
            JS_TS,
            JAVA_CSHARP,
            C_CPP,
            RUST,
            PHP,
            RUBY,
            SOURCE_NOISE,
        ] {
            set.extend(list.iter().copied());
        }
        set
    })
}

/// True if `token` (already lowercased) is a stopword.
pub fn is_stopword(token: &str) -> bool {
    table().contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_stopwords_from_each_source_list() {
        for word in ["the", "func", "def", "const", "public", "int", "fn", "echo", "end", "ctx"] {
            assert!(is_stopword(word), "{word} should be a stopword");
        }
    }

    #[test]
    fn does_not_flag_ordinary_content_words() {
        for word in ["quick", "brown", "fox", "search", "invoice", "mneme"] {
            assert!(!is_stopword(word), "{word} should not be a stopword");
        }
    }

    #[test]
    fn table_is_populated_once_and_reused() {
        let a = table() as *const _;
        let b = table() as *const _;
        assert_eq!(a, b);
    }
}
