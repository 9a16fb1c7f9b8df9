//! Module: db::method
//! Responsibility: method-name grammar, parsed once at repository build.
//! Does not own: argument binding or execution; both happen per call
//! against the immutable template produced here.

use crate::{
    db::predicate::{CompareOp, FieldPath, Operand, PathResolveError, Predicate},
    model::EntityModel,
};
use thiserror::Error as ThisError;

///
/// Verb
/// Leading verb of a derivable method name.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    Find,
    Count,
    Delete,
    Exists,
}

impl Verb {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "find" => Some(Self::Find),
            "count" => Some(Self::Count),
            "delete" => Some(Self::Delete),
            "exists" => Some(Self::Exists),
            _ => None,
        }
    }
}

///
/// ShapeHint
///
/// Recognized result-shape word in the descriptor section of a method
/// name (`find_slice_by_...`). Unrecognized descriptor words are free
/// text and ignored; a recognized word must agree with the method's
/// declared return shape, which the repository builder enforces.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShapeHint {
    One,
    Optional,
    Multi,
    Page,
    Slice,
    List,
}

impl ShapeHint {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "one" => Some(Self::One),
            "optional" => Some(Self::Optional),
            "multi" => Some(Self::Multi),
            "page" => Some(Self::Page),
            "slice" => Some(Self::Slice),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

///
/// ParsedMethod
///
/// Output of the name grammar: verb, optional shape hint, and a
/// predicate template whose leaves are positional parameter slots in
/// declaration order. `arity` is the number of slots.
///

#[derive(Debug)]
pub struct ParsedMethod {
    pub verb: Verb,
    pub shape_hint: Option<ShapeHint>,
    pub predicate: Predicate,
    pub arity: usize,
}

///
/// MethodParseError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum MethodParseError {
    #[error("method '{name}' does not start with find/count/delete/exists")]
    UnknownVerb { name: &'static str },

    #[error("method '{name}' has no 'by' clause and no query body")]
    MissingByClause { name: &'static str },

    #[error("method '{name}' has an empty predicate segment")]
    EmptySegment { name: &'static str },

    #[error("method '{name}': {source}")]
    UnresolvedPath {
        name: &'static str,
        source: PathResolveError,
    },
}

/// Parse a snake_case method name into a predicate template.
///
/// Grammar: `verb[_descriptor...]_by_segment((_and_|_or_)segment)*` with
/// `and` binding tighter than `or`. Segment operators: bare (equals),
/// `_greater_than`, `_less_than`, `_in`, `_not`. Property paths resolve
/// against `model`, traversing at most one relation hop.
pub fn parse_method(
    name: &'static str,
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
) -> Result<ParsedMethod, MethodParseError> {
    let tokens = tokenize(name);
    let Some((first, rest)) = tokens.split_first() else {
        return Err(MethodParseError::UnknownVerb { name });
    };
    let Some(verb) = Verb::from_token(first.text(name)) else {
        return Err(MethodParseError::UnknownVerb { name });
    };

    let Some(by_offset) = rest.iter().position(|tok| tok.text(name) == "by") else {
        return Err(MethodParseError::MissingByClause { name });
    };

    let shape_hint = rest[..by_offset]
        .iter()
        .find_map(|tok| ShapeHint::from_token(tok.text(name)));

    let clause = &rest[by_offset + 1..];
    if clause.is_empty() {
        return Err(MethodParseError::EmptySegment { name });
    }

    let mut slot = 0;
    let mut or_groups: Vec<Vec<Predicate>> = vec![Vec::new()];
    for segment in split_segments(name, clause)? {
        match segment {
            Segment::Connector(Connector::And) => {}
            Segment::Connector(Connector::Or) => or_groups.push(Vec::new()),
            Segment::Leaf(tokens) => {
                let leaf = parse_leaf(name, tokens, model, lookup, slot)?;
                slot += 1;
                or_groups
                    .last_mut()
                    .expect("group list is never empty")
                    .push(leaf);
            }
        }
    }

    let mut alternatives: Vec<Predicate> = Vec::with_capacity(or_groups.len());
    for group in or_groups {
        if group.is_empty() {
            return Err(MethodParseError::EmptySegment { name });
        }
        alternatives.push(collapse(group, true));
    }
    let predicate = collapse(alternatives, false);

    Ok(ParsedMethod {
        verb,
        shape_hint,
        predicate,
        arity: slot,
    })
}

// ------------------------------------------------------------------
// Tokenization
// ------------------------------------------------------------------

/// Byte range of one `_`-delimited token inside the method name.
#[derive(Clone, Copy, Debug)]
struct Token {
    start: usize,
    end: usize,
}

impl Token {
    fn text(self, name: &'static str) -> &'static str {
        &name[self.start..self.end]
    }
}

fn tokenize(name: &'static str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (idx, byte) in name.bytes().enumerate() {
        if byte == b'_' {
            if idx > start {
                tokens.push(Token { start, end: idx });
            }
            start = idx + 1;
        }
    }
    if name.len() > start {
        tokens.push(Token {
            start,
            end: name.len(),
        });
    }
    tokens
}

/// Contiguous token run as one `&'static str` slice of the method name.
fn join(name: &'static str, tokens: &[Token]) -> &'static str {
    let first = tokens.first().expect("join requires at least one token");
    let last = tokens.last().expect("join requires at least one token");
    &name[first.start..last.end]
}

// ------------------------------------------------------------------
// Segments
// ------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Connector {
    And,
    Or,
}

enum Segment<'a> {
    Leaf(&'a [Token]),
    Connector(Connector),
}

/// Split the clause into leaves separated by `and`/`or` connector tokens.
///
/// Connector words are only recognized as whole tokens, so fields whose
/// names happen to contain them are unaffected.
fn split_segments<'a>(
    name: &'static str,
    clause: &'a [Token],
) -> Result<Vec<Segment<'a>>, MethodParseError> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for (idx, token) in clause.iter().enumerate() {
        let connector = match token.text(name) {
            "and" => Some(Connector::And),
            "or" => Some(Connector::Or),
            _ => None,
        };
        if let Some(connector) = connector {
            if cursor == idx {
                return Err(MethodParseError::EmptySegment { name });
            }
            segments.push(Segment::Leaf(&clause[cursor..idx]));
            segments.push(Segment::Connector(connector));
            cursor = idx + 1;
        }
    }

    if cursor == clause.len() {
        return Err(MethodParseError::EmptySegment { name });
    }
    segments.push(Segment::Leaf(&clause[cursor..]));

    Ok(segments)
}

/// Strip a trailing operator suffix and resolve the remaining tokens as
/// a property path bound to the next positional slot.
fn parse_leaf(
    name: &'static str,
    tokens: &[Token],
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
    slot: usize,
) -> Result<Predicate, MethodParseError> {
    let texts: Vec<&str> = tokens.iter().map(|tok| tok.text(name)).collect();

    let (op, path_tokens) = match texts.as_slice() {
        [head @ .., "greater", "than"] if !head.is_empty() => {
            (CompareOp::Gt, &tokens[..tokens.len() - 2])
        }
        [head @ .., "less", "than"] if !head.is_empty() => {
            (CompareOp::Lt, &tokens[..tokens.len() - 2])
        }
        [head @ .., "in"] if !head.is_empty() => (CompareOp::In, &tokens[..tokens.len() - 1]),
        [head @ .., "not"] if !head.is_empty() => (CompareOp::Ne, &tokens[..tokens.len() - 1]),
        _ => (CompareOp::Eq, tokens),
    };

    let raw = join(name, path_tokens);
    let path = FieldPath::resolve(raw, model, lookup)
        .map_err(|source| MethodParseError::UnresolvedPath { name, source })?;

    Ok(Predicate::compare(path, op, Operand::Positional(slot)))
}

fn collapse(mut children: Vec<Predicate>, conjunction: bool) -> Predicate {
    if children.len() == 1 {
        children.pop().expect("non-empty by construction")
    } else if conjunction {
        Predicate::And(children)
    } else {
        Predicate::Or(children)
    }
}
