use std::fmt::Display;

/// Extra command-line content appended after the positional arguments of a
/// `bunker-convert` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtraArgs {
    #[default]
    Empty,
    /// Flag/value pairs, emitted in insertion order.
    Pairs(Vec<(String, String)>),
    /// Pre-formatted tokens, emitted verbatim.
    Tokens(Vec<String>),
}

impl ExtraArgs {
    pub fn pairs<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Display,
    {
        ExtraArgs::Pairs(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.to_string()))
                .collect(),
        )
    }

    pub fn tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        ExtraArgs::Tokens(tokens.into_iter().map(|t| t.to_string()).collect())
    }

    /// Appends a flag/value pair. An `Empty` value becomes `Pairs`; a `Tokens`
    /// value receives the already-normalized flag and value as two tokens.
    pub fn with_pair(self, key: impl Into<String>, value: impl Display) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self {
            ExtraArgs::Empty => ExtraArgs::Pairs(vec![(key, value)]),
            ExtraArgs::Pairs(mut pairs) => {
                pairs.push((key, value));
                ExtraArgs::Pairs(pairs)
            }
            ExtraArgs::Tokens(mut tokens) => {
                tokens.push(flag_token(&key));
                tokens.push(value);
                ExtraArgs::Tokens(tokens)
            }
        }
    }

    /// Appends a raw token. A `Pairs` value is flattened first so that the
    /// emitted order is unchanged.
    pub fn with_token(self, token: impl Display) -> Self {
        let mut tokens = match self {
            ExtraArgs::Empty => Vec::new(),
            ExtraArgs::Tokens(tokens) => tokens,
            pairs @ ExtraArgs::Pairs(_) => build_args(&pairs),
        };
        tokens.push(token.to_string());
        ExtraArgs::Tokens(tokens)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtraArgs::Empty => true,
            ExtraArgs::Pairs(pairs) => pairs.is_empty(),
            ExtraArgs::Tokens(tokens) => tokens.is_empty(),
        }
    }
}

impl<T: Into<ExtraArgs>> From<Option<T>> for ExtraArgs {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<Vec<String>> for ExtraArgs {
    fn from(tokens: Vec<String>) -> Self {
        ExtraArgs::Tokens(tokens)
    }
}

impl From<&[&str]> for ExtraArgs {
    fn from(tokens: &[&str]) -> Self {
        ExtraArgs::tokens(tokens.iter())
    }
}

impl From<Vec<(String, String)>> for ExtraArgs {
    fn from(pairs: Vec<(String, String)>) -> Self {
        ExtraArgs::Pairs(pairs)
    }
}

impl From<&[(&str, &str)]> for ExtraArgs {
    fn from(pairs: &[(&str, &str)]) -> Self {
        ExtraArgs::pairs(pairs.iter().copied())
    }
}

/// Keys that already carry a dash are passed through untouched.
pub fn flag_token(key: &str) -> String {
    if key.starts_with('-') {
        key.to_string()
    } else {
        format!("--{key}")
    }
}

pub fn build_args(extra: &ExtraArgs) -> Vec<String> {
    match extra {
        ExtraArgs::Empty => Vec::new(),
        ExtraArgs::Pairs(pairs) => {
            let mut result = Vec::with_capacity(pairs.len() * 2);
            for (key, value) in pairs {
                result.push(flag_token(key));
                result.push(value.clone());
            }
            result
        }
        ExtraArgs::Tokens(tokens) => tokens.clone(),
    }
}
