//! Grammar tokens
//!
//! A grammar is a tree of [`Token`]s. Each token has a name, an optional
//! [`Encoding`] override, and a [`TokenKind`] that determines how it
//! parses. Tokens are immutable shared handles; two tokens are equal only
//! if they are the same token, which is how values and graphs remember the
//! token that produced them.
//!
//! # Parsing
//!
//! [`Token::parse`] takes a scope, an [`Environment`] and an encoding, and
//! returns a [`ParseResult`]. A grammar mismatch is an unsuccessful result
//! carrying the environment that was passed in. Fatal errors, such as a
//! count expression that does not yield exactly one value, are returned as
//! `Err` and are never turned into mismatches.
//!
//! Parsing keeps its own stack instead of recursing, so a grammar that
//! refers back to itself may nest as deeply as its input.
//!
//! The name of a token extends the scope for everything it parses, so a
//! `Def` named `size` inside a `Seq` named `header` records its value as
//! `header.size`.
//!
//! # Kinds
//!
//! | kind  | parses |
//! |-------|--------|
//! | `Def` | a value of `size` bytes, optionally checked by a predicate |
//! | `Seq` | each token in order |
//! | `Cho` | the first alternative that matches |
//! | `Rep` | its token as often as it matches, possibly never |
//! | `RepN`| its token exactly `count` times |
//! | `While` | its token for as long as a predicate holds |
//! | `Opt` | its token, or nothing |
//! | `Pre` | its token, if a predicate holds beforehand |
//! | `Post`| its token, if a predicate holds afterwards |
//! | `Sub` | its token at another address, without moving the cursor |
//! | `Tie` | its token over bytes computed by an expression |
//! | `Nod` | nothing, skipping `size` bytes |
//! | `Ref` | the token named by a reference, found in the graph |

mod parse;

use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::data::environment::{Environment, ParseResult};
use crate::encoding::Encoding;
use crate::error::{ConstructionError, MetalResult};
use crate::expression::value::ValueExpression;
use crate::expression::Expression;

/// Parsing behavior of a [`Token`].
#[derive(Clone, Debug)]
pub enum TokenKind {
    Def {
        size: ValueExpression,
        predicate: Option<Expression>,
    },
    Seq(Vec<Token>),
    Cho(Vec<Token>),
    Rep(Token),
    RepN {
        token: Token,
        count: ValueExpression,
    },
    While {
        token: Token,
        predicate: Expression,
    },
    Opt(Token),
    Pre {
        token: Token,
        predicate: Expression,
    },
    Post {
        token: Token,
        predicate: Expression,
    },
    Sub {
        token: Token,
        address: ValueExpression,
    },
    Tie {
        token: Token,
        data: ValueExpression,
    },
    Nod {
        size: ValueExpression,
    },
    Ref {
        reference: String,
    },
}

impl TokenKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Def { .. } => "Def",
            TokenKind::Seq(_) => "Seq",
            TokenKind::Cho(_) => "Cho",
            TokenKind::Rep(_) => "Rep",
            TokenKind::RepN { .. } => "RepN",
            TokenKind::While { .. } => "While",
            TokenKind::Opt(_) => "Opt",
            TokenKind::Pre { .. } => "Pre",
            TokenKind::Post { .. } => "Post",
            TokenKind::Sub { .. } => "Sub",
            TokenKind::Tie { .. } => "Tie",
            TokenKind::Nod { .. } => "Nod",
            TokenKind::Ref { .. } => "TokenRef",
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConstructionError> {
        let label = self.label();
        match self {
            TokenKind::Seq(tokens) | TokenKind::Cho(tokens) if tokens.len() < 2 => {
                Err(ConstructionError::TooFewTokens {
                    kind: label,
                    minimum: 2,
                    actual: tokens.len(),
                })
            }
            TokenKind::Def { .. } if name.is_empty() => Err(ConstructionError::EmptyName { kind: label }),
            TokenKind::Ref { reference } if reference.is_empty() => {
                Err(ConstructionError::EmptyName { kind: label })
            }
            _ => Ok(()),
        }
    }
}

struct TokenInner {
    name: String,
    encoding: Option<Encoding>,
    kind: TokenKind,
}

/// Shared handle to an immutable grammar node.
#[derive(Clone)]
pub struct Token(Arc<TokenInner>);

impl Token {
    /// Creates a token after checking that `kind` is well-formed.
    ///
    /// # Errors
    ///
    /// Fails if a `Seq` or `Cho` has fewer than two tokens, or if a `Def`
    /// or `Ref` is given an empty name.
    pub fn new(name: impl Into<String>, kind: TokenKind, encoding: Option<Encoding>) -> MetalResult<Self> {
        let name = name.into();
        if let Err(err) = kind.validate(&name) {
            log::debug!("rejected {} token '{name}': {err}", kind.label());
            return Err(err.into());
        }
        Ok(Self(Arc::new(TokenInner { name, encoding, kind })))
    }

    fn infallible(name: impl Into<String>, kind: TokenKind) -> Self {
        Self(Arc::new(TokenInner {
            name: name.into(),
            encoding: None,
            kind,
        }))
    }

    /// Value of `size` bytes.
    pub fn def(name: impl Into<String>, size: ValueExpression) -> MetalResult<Self> {
        Self::new(name, TokenKind::Def { size, predicate: None }, None)
    }

    /// Value of `size` bytes that must satisfy `predicate`.
    pub fn def_with(name: impl Into<String>, size: ValueExpression, predicate: Expression) -> MetalResult<Self> {
        Self::new(
            name,
            TokenKind::Def {
                size,
                predicate: Some(predicate),
            },
            None,
        )
    }

    pub fn seq(name: impl Into<String>, tokens: impl Into<Vec<Token>>) -> MetalResult<Self> {
        Self::new(name, TokenKind::Seq(tokens.into()), None)
    }

    pub fn cho(name: impl Into<String>, tokens: impl Into<Vec<Token>>) -> MetalResult<Self> {
        Self::new(name, TokenKind::Cho(tokens.into()), None)
    }

    /// Token parsed again and again; matching zero times also succeeds.
    #[must_use]
    pub fn rep(name: impl Into<String>, token: Token) -> Self {
        Self::infallible(name, TokenKind::Rep(token))
    }

    #[must_use]
    pub fn repn(name: impl Into<String>, token: Token, count: ValueExpression) -> Self {
        Self::infallible(name, TokenKind::RepN { token, count })
    }

    /// `token` parsed for as long as `predicate` holds. The predicate is
    /// checked before every iteration, the first one included, and the
    /// loop itself never fails.
    #[must_use]
    pub fn whl(name: impl Into<String>, token: Token, predicate: Expression) -> Self {
        Self::infallible(name, TokenKind::While { token, predicate })
    }

    #[must_use]
    pub fn opt(name: impl Into<String>, token: Token) -> Self {
        Self::infallible(name, TokenKind::Opt(token))
    }

    #[must_use]
    pub fn pre(name: impl Into<String>, token: Token, predicate: Expression) -> Self {
        Self::infallible(name, TokenKind::Pre { token, predicate })
    }

    #[must_use]
    pub fn post(name: impl Into<String>, token: Token, predicate: Expression) -> Self {
        Self::infallible(name, TokenKind::Post { token, predicate })
    }

    /// `token` parsed at the absolute offset `address`.
    #[must_use]
    pub fn sub(name: impl Into<String>, token: Token, address: ValueExpression) -> Self {
        Self::infallible(name, TokenKind::Sub { token, address })
    }

    /// `token` parsed over each value `data` evaluates to.
    #[must_use]
    pub fn tie(name: impl Into<String>, token: Token, data: ValueExpression) -> Self {
        Self::infallible(name, TokenKind::Tie { token, data })
    }

    /// Skips `size` bytes without recording them.
    #[must_use]
    pub fn nod(name: impl Into<String>, size: ValueExpression) -> Self {
        Self::infallible(name, TokenKind::Nod { size })
    }

    /// Parses the token called `reference`, looked up in the graph at
    /// parse time.
    pub fn reference(name: impl Into<String>, reference: impl Into<String>) -> MetalResult<Self> {
        Self::new(
            name,
            TokenKind::Ref {
                reference: reference.into(),
            },
            None,
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Encoding override of this token, if any.
    #[must_use]
    pub fn encoding(&self) -> Option<&Encoding> {
        self.0.encoding.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> &TokenKind {
        &self.0.kind
    }

    /// Parses this token within `scope`, starting from `environment`.
    ///
    /// The token's own encoding, if it has one, replaces `encoding` for
    /// itself and everything it parses.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions; a mismatch is an
    /// unsuccessful [`ParseResult`].
    pub fn parse(&self, scope: &str, environment: &Environment, encoding: &Encoding) -> MetalResult<ParseResult> {
        parse::run(self, scope, environment, encoding)
    }

    /// Parses this token from the start of `environment`, returning the
    /// resulting environment if it matched.
    pub fn parse_environment(&self, environment: &Environment, encoding: &Encoding) -> MetalResult<Option<Environment>> {
        Ok(self.parse("", environment, encoding)?.into_success())
    }
}

/// Joins an enclosing scope and a name with the scope separator.
#[must_use]
pub fn make_scope(scope: &str, name: &str) -> String {
    match (scope.is_empty(), name.is_empty()) {
        (true, _) => name.to_owned(),
        (false, true) => scope.to_owned(),
        (false, false) => format!("{scope}{}{name}", crate::data::value::SEPARATOR),
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.0.kind.label(), self.0.name)
    }
}

#[cfg(test)]
mod construction {
    use super::*;
    use crate::error::MetalError;

    #[test]
    fn validates_arguments() {
        let a = Token::def("a", ValueExpression::con_int(1)).unwrap();
        assert!(matches!(
            Token::cho("", vec![a.clone()]),
            Err(MetalError::Construction(ConstructionError::TooFewTokens {
                minimum: 2,
                actual: 1,
                ..
            }))
        ));
        assert!(Token::seq("", Vec::new()).is_err());
        assert!(Token::seq("", vec![a.clone(), a.clone()]).is_ok());
        assert!(matches!(
            Token::def("", ValueExpression::con_int(1)),
            Err(MetalError::Construction(ConstructionError::EmptyName { kind: "Def" }))
        ));
        assert!(Token::reference("r", "").is_err());
    }

    #[test]
    fn identity_equality() {
        let a = Token::def("a", ValueExpression::con_int(1)).unwrap();
        let b = Token::def("a", ValueExpression::con_int(1)).unwrap();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(format!("{a:?}"), "Def(a)");
    }

    #[test]
    fn scopes() {
        assert_eq!(make_scope("", "a"), "a");
        assert_eq!(make_scope("a", ""), "a");
        assert_eq!(make_scope("a", "b"), "a.b");
        assert_eq!(make_scope("", ""), "");
    }
}
