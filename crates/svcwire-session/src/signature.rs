use std::fmt;
use std::str::FromStr;

use svcwire_frame::{format_tags, Message, TypeTag};

use crate::error::{InvalidSignature, Result, SessionError};

/// Separator between a method name and its argument list.
const NAME_SEPARATOR: &str = "::";

/// A method name plus the ordered argument types, written `name::(codes)`.
///
/// `reply::(s)` names method `reply` taking one string; `ping::()` takes
/// nothing. Codes come from the [`TypeTag`] registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    args: Vec<TypeTag>,
}

impl Signature {
    /// Build a signature from parts, validating the method name.
    pub fn new(
        name: impl Into<String>,
        args: impl IntoIterator<Item = TypeTag>,
    ) -> std::result::Result<Self, InvalidSignature> {
        let name = name.into();
        let args: Vec<TypeTag> = args.into_iter().collect();
        if let Err(reason) = validate_name(&name) {
            return Err(InvalidSignature {
                text: format!("{name}{NAME_SEPARATOR}({})", format_tags(&args)),
                reason,
            });
        }
        Ok(Self { name, args })
    }

    /// Parse `name::(codes)`.
    pub fn parse(text: &str) -> std::result::Result<Self, InvalidSignature> {
        let invalid = |reason: String| InvalidSignature {
            text: text.to_string(),
            reason,
        };

        let (name, rest) = text
            .split_once(NAME_SEPARATOR)
            .ok_or_else(|| invalid(format!("missing '{NAME_SEPARATOR}' separator")))?;
        validate_name(name).map_err(invalid)?;

        let codes = rest
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| invalid("argument list must be wrapped in '(' and ')'".to_string()))?;

        let args = codes
            .chars()
            .map(|code| {
                TypeTag::from_code(code)
                    .ok_or_else(|| invalid(format!("unknown type code '{code}'")))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeTag] {
        &self.args
    }

    /// The argument codes as written inside the parentheses.
    pub fn arg_codes(&self) -> String {
        format_tags(&self.args)
    }

    /// True when the message holds exactly the argument types, in order.
    pub fn matches(&self, message: &Message) -> bool {
        message.len() == self.args.len()
            && message
                .iter()
                .zip(&self.args)
                .all(|(value, tag)| value.tag() == *tag)
    }

    /// Like [`Signature::matches`], reporting the mismatch as an error.
    pub fn check(&self, message: &Message) -> Result<()> {
        if self.matches(message) {
            return Ok(());
        }
        Err(SessionError::SignatureMismatch {
            signature: self.to_string(),
            expected: self.arg_codes(),
            found: format_tags(&message.tags()),
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{NAME_SEPARATOR}({})", self.name, self.arg_codes())
    }
}

impl FromStr for Signature {
    type Err = InvalidSignature;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("method name is empty".to_string()),
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            return Err(format!("method name cannot start with '{first}'"));
        }
        Some(_) => {}
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!("method name contains '{bad}'"));
    }
    Ok(())
}
