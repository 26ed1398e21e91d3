//! Declarative tables driving query understanding.

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "this", "that",
    "these", "those",
];

/// Generic programming terms kept as keywords regardless of length.
pub const COMMON_TERMS: &[&str] = &[
    "function", "class", "method", "variable", "constant", "import", "export", "module",
    "package", "library", "framework", "api", "algorithm", "sorting", "searching",
    "recursion", "iteration", "loop", "condition", "exception", "error", "debug", "test",
    "unit", "integration", "database", "query", "sql", "http", "rest", "graphql",
    "authentication", "authorization", "encryption", "security", "performance",
    "optimization", "cache", "memory", "cpu", "thread", "process", "async", "await",
    "promise", "callback", "event", "listener", "middleware", "router", "controller",
    "model", "view", "template", "component", "service", "repository",
];

/// Language keyword sets folded into the keyword vocabulary.
pub const LANGUAGE_VOCABULARY: &[(&str, &[&str])] = &[
    (
        "python",
        &[
            "def", "class", "import", "from", "as", "if", "else", "elif", "for", "while",
            "try", "except", "finally", "with", "lambda", "yield", "async", "await",
        ],
    ),
    (
        "javascript",
        &[
            "function", "const", "let", "var", "if", "else", "for", "while", "try", "catch",
            "finally", "async", "await", "export", "import", "class", "extends", "super",
        ],
    ),
    (
        "typescript",
        &[
            "interface", "type", "enum", "namespace", "module", "declare", "function", "const",
            "let", "var", "if", "else", "for", "while", "try", "catch", "finally", "async",
            "await", "export", "import", "class", "extends", "super",
        ],
    ),
    (
        "java",
        &[
            "public", "private", "protected", "static", "final", "class", "interface",
            "extends", "implements", "import", "package", "try", "catch", "finally", "throw",
            "throws", "new", "this", "super",
        ],
    ),
    (
        "cpp",
        &[
            "class", "struct", "enum", "namespace", "template", "typename", "const", "static",
            "virtual", "public", "private", "protected", "friend", "inline", "explicit",
            "operator", "new", "delete", "this", "super",
        ],
    ),
];

/// Languages recognized in queries, with the keywords offered as suggestions.
pub const QUERY_LANGUAGES: &[(&str, &[&str])] = &[
    ("python", &["def", "class", "import", "from", "if", "for", "while", "try", "except"]),
    ("javascript", &["function", "const", "let", "var", "if", "for", "while", "try", "catch"]),
    ("typescript", &["function", "const", "let", "var", "interface", "type", "class"]),
    ("java", &["public", "private", "class", "interface", "method", "static"]),
    ("cpp", &["class", "struct", "template", "namespace", "public", "private"]),
    ("go", &["func", "type", "struct", "interface", "package", "import"]),
    ("rust", &["fn", "struct", "enum", "impl", "trait", "mod"]),
];

/// Synonym table; expansion visits keys in this order.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("sort", &["sorting", "order", "arrange"]),
    ("search", &["finding", "lookup", "query"]),
    ("function", &["method", "procedure", "routine"]),
    ("class", &["type", "object", "struct"]),
    ("error", &["exception", "bug", "issue", "problem"]),
    ("api", &["endpoint", "service", "interface"]),
    ("database", &["db", "storage", "repository"]),
    ("authentication", &["auth", "login", "security"]),
    ("performance", &["speed", "efficiency", "optimization"]),
    ("test", &["testing", "unit test", "integration test"]),
    ("algorithm", &["algo", "procedure", "method"]),
    ("data structure", &["ds", "container", "collection"]),
    ("recursion", &["recursive", "recursively"]),
    ("iteration", &["loop", "iterate", "for loop"]),
    ("async", &["asynchronous", "non-blocking"]),
    ("cache", &["caching", "memoization"]),
    ("middleware", &["interceptor", "filter"]),
    ("template", &["template", "view", "component"]),
];

/// Most expansion terms appended to one query.
pub const MAX_EXPANSION_TERMS: usize = 5;

pub const FRAMEWORKS: &[(&str, &str)] = &[
    ("react", "frontend"),
    ("vue", "frontend"),
    ("angular", "frontend"),
    ("django", "backend"),
    ("flask", "backend"),
    ("express", "backend"),
    ("spring", "backend"),
    ("tensorflow", "machine_learning"),
    ("pytorch", "machine_learning"),
    ("scikit", "machine_learning"),
    ("pandas", "data_analysis"),
    ("numpy", "data_analysis"),
    ("matplotlib", "data_visualization"),
];

pub const DOMAINS: &[(&str, &[&str])] = &[
    ("web", &["web", "http", "html", "css", "javascript"]),
    ("mobile", &["mobile", "ios", "android", "react native"]),
    ("data", &["data", "database", "sql", "nosql", "analytics"]),
    ("ai", &["ai", "machine learning", "ml", "neural", "deep learning"]),
    ("security", &["security", "cryptography", "encryption", "authentication"]),
    ("devops", &["devops", "docker", "kubernetes", "ci/cd", "deployment"]),
];

/// Common search phrases offered as completions.
pub const SUGGESTION_PHRASES: &[&str] = &[
    "sorting algorithm",
    "binary search",
    "quick sort",
    "merge sort",
    "bubble sort",
    "function definition",
    "class constructor",
    "error handling",
    "try catch",
    "async await",
    "promise handling",
    "database query",
    "api endpoint",
    "authentication",
    "unit test",
    "integration test",
    "data structure",
    "linked list",
    "binary tree",
    "hash table",
    "stack implementation",
    "queue implementation",
    "recursive function",
    "iterative solution",
    "design pattern",
    "singleton pattern",
    "factory pattern",
    "observer pattern",
    "middleware function",
    "route handler",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Whether `word` belongs to the programming vocabulary.
pub fn is_programming_term(word: &str) -> bool {
    COMMON_TERMS.contains(&word)
        || LANGUAGE_VOCABULARY
            .iter()
            .any(|(_, words)| words.contains(&word))
}
