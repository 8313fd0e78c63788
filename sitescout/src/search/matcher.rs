use regex::bytes::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::{EncodingMode, ScoutConfig};
use crate::errors::{ScoutError, ScoutResult, SearchError};

/// How the search term is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// The term is a regular expression
    #[default]
    Regex,
    /// The term is matched verbatim, like `grep -F`
    Literal,
}

/// Options applied when compiling the search term
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    pub strategy: MatchStrategy,
    pub case_insensitive: bool,
    pub encoding_mode: EncodingMode,
}

impl MatchOptions {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            strategy: if config.literal {
                MatchStrategy::Literal
            } else {
                MatchStrategy::Regex
            },
            case_insensitive: config.case_insensitive,
            encoding_mode: config.encoding_mode,
        }
    }
}

/// A search term compiled once and shared by every task
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
    encoding_mode: EncodingMode,
}

impl PatternMatcher {
    /// Compiles `pattern`; a bad pattern is fatal for the run
    pub fn new(pattern: &str, options: MatchOptions) -> ScoutResult<Self> {
        let source = match options.strategy {
            MatchStrategy::Literal => regex::escape(pattern),
            MatchStrategy::Regex => pattern.to_string(),
        };
        debug!("Compiling pattern '{}' as {:?}", pattern, options.strategy);

        let regex = RegexBuilder::new(&source)
            .case_insensitive(options.case_insensitive)
            .build()
            .map_err(|e| ScoutError::invalid_pattern(e.to_string()))?;

        Ok(Self {
            regex,
            encoding_mode: options.encoding_mode,
        })
    }

    /// Reports whether the pattern occurs anywhere in `payload`
    pub fn is_match(&self, payload: &[u8]) -> Result<bool, SearchError> {
        if self.encoding_mode == EncodingMode::FailFast {
            std::str::from_utf8(payload).map_err(|e| SearchError::Encoding(e.to_string()))?;
        }
        Ok(self.regex.is_match(payload))
    }
}
