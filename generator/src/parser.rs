// Parser for textual LLVM IR modules.
//
// Builds the top-level items of a module from the token stream: the module
// header lines the loader cares about, function signatures with typed
// parameters, body lines classified as labels, calls, debug records or
// other instructions, and numbered metadata nodes with their fields. Lines
// the grammar does not model are recognised and discarded. Uses chumsky
// combinators.
//
// Preconditions: input is a token stream from `lexer::lex()`.
// Postconditions: returns the item list plus any parse errors (non-fatal).
//                 A function header that is not `... @name(params) ...`
//                 yields an item whose `signature` is `None`.
// Failure modes: lex errors and syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ir::{FieldValue, Instruction, MetadataField, MetadataNode, Operand, Param};
use crate::lexer::Token;
use crate::types::IrType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Define,
    Declare,
}

/// `@name(params)` from a function header.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub variadic: bool,
}

/// One line of a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyLine {
    Label(String),
    Instruction(Instruction),
}

/// A top-level entity of an IR module.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    SourceFilename(String),
    TargetTriple(String),
    /// `define`/`declare`. `span` covers the header after the keyword;
    /// `body` is `None` for declarations.
    Function {
        kind: FunctionKind,
        signature: Option<Signature>,
        span: SimpleSpan,
        body: Option<Vec<BodyLine>>,
    },
    /// `!N = [distinct] <node>`.
    Metadata(MetadataNode),
    /// Any other top-level line (attributes, globals, named metadata, ...).
    Other,
}

/// Result of parsing: items plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub items: Option<Vec<Item>>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an IR module. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = module_parser();
    let (items, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        items,
        errors: all_errors,
    }
}

// ── Main parser builder ──
//
// Every top-level entity and instruction is one line, so each rule that
// models part of a line ends by skipping the rest of it, and each line kind
// has a catch-all fallback. Only tokens on the current line are consumed.

fn module_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Vec<Item>, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let newlines = just(Token::Newline).repeated();

    // Any token on the current line.
    let token = any().filter(|t: &Token| *t != Token::Newline);
    let rest_of_line = token.clone().repeated();
    let line = token.clone().repeated().at_least(1);

    let word = |w: &str| just(Token::Word(w.to_string())).ignored();
    let string = select! { Token::StringLit(s) => s };
    let count = select! { Token::Int(n) => n }.try_map(|n: String, span| {
        n.parse::<u64>()
            .map_err(|_| Rich::custom(span, format!("expected a count, found `{n}`")))
    });

    // A list entry ends at a top-level `,` or the closing `)`.
    let list_end = choice((just(Token::Comma), just(Token::RParen))).rewind();

    // ── Types ──

    let addr_space = word("addrspace")
        .ignore_then(
            count
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .try_map(|space, span| {
            u32::try_from(space).map_err(|_| Rich::custom(span, "address space out of range"))
        });

    let ty = recursive(|ty| {
        let int_type = select! { Token::IntType(bits) => IrType::Int(bits) };
        let named = select! { Token::LocalIdent(name) => IrType::Named(name) };
        let ptr = word("ptr")
            .ignore_then(addr_space.clone().or_not())
            .map(|space| IrType::Ptr {
                addr_space: space.unwrap_or(0),
            });
        let keyword = select! { Token::Word(w) => w }.try_map(|w, span| {
            IrType::from_keyword(&w)
                .ok_or_else(|| Rich::custom(span, format!("expected a type, found `{w}`")))
        });

        let fields = ty
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>();
        let structure = fields
            .clone()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(|fields| IrType::Struct {
                fields,
                packed: false,
            });
        let packed = fields
            .delimited_by(
                just(Token::Lt).then(just(Token::LBrace)),
                just(Token::RBrace).then(just(Token::Gt)),
            )
            .map(|fields| IrType::Struct {
                fields,
                packed: true,
            });
        let array = count
            .clone()
            .then_ignore(word("x"))
            .then(ty.clone())
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|(len, elem)| IrType::Array {
                len,
                elem: Box::new(elem),
            });
        let vector = word("vscale")
            .then(word("x"))
            .or_not()
            .map(|vscale| vscale.is_some())
            .then(count.clone())
            .then_ignore(word("x"))
            .then(ty.clone())
            .delimited_by(just(Token::Lt), just(Token::Gt))
            .map(|((scalable, len), elem)| IrType::Vector {
                len,
                scalable,
                elem: Box::new(elem),
            });

        let base = choice((int_type, ptr, named, structure, packed, array, vector, keyword));

        // Legacy typed pointers (`i8*`, `i32 addrspace(1)*`) and function
        // types (`i32 (i8*, ...)`) trail the base type. `Some` is a pointer
        // in that address space.
        let suffix = choice((
            just(Token::Star).to(Some(0)),
            addr_space.clone().then_ignore(just(Token::Star)).map(Some),
            choice((ty.ignored(), just(Token::Ellipsis).ignored()))
                .separated_by(just(Token::Comma))
                .collect::<Vec<()>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .to(None),
        ));

        base.foldl(suffix.repeated(), |_, suffix| match suffix {
            Some(addr_space) => IrType::Ptr { addr_space },
            None => IrType::Function,
        })
    });

    // ── Operand token trees ──
    //
    // A value is a run of trees; a tree is one plain token or a bracketed
    // group, so commas inside `(...)`, `[...]`, `{...}` and `<...>` do not
    // split the enclosing list.

    let tree = recursive(|tree| {
        let inner = choice((tree, just(Token::Comma).map(|comma| vec![comma])))
            .repeated()
            .collect::<Vec<Vec<Token>>>();
        let group = |open: Token, close: Token| {
            just(open)
                .then(inner.clone())
                .then(just(close))
                .map(|((open, inner), close)| {
                    let mut tokens = vec![open];
                    tokens.extend(inner.into_iter().flatten());
                    tokens.push(close);
                    tokens
                })
        };
        choice((
            any()
                .filter(|t: &Token| !is_structural(t))
                .map(|t| vec![t]),
            group(Token::LParen, Token::RParen),
            group(Token::LBracket, Token::RBracket),
            group(Token::LBrace, Token::RBrace),
            group(Token::Lt, Token::Gt),
        ))
    });

    let value_text = tree
        .clone()
        .repeated()
        .at_least(1)
        .collect::<Vec<Vec<Token>>>()
        .map(|trees| render(trees.iter().flatten()));

    // ── Function headers ──

    // Attribute payloads such as `byval(%struct.S)` or `initializes((0, 8))`.
    let payload = recursive(|payload| {
        choice((
            any()
                .filter(|t: &Token| !matches!(t, Token::LParen | Token::RParen | Token::Newline))
                .ignored(),
            payload.delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .repeated()
    });

    let param_attr = choice((
        select! { Token::Word(w) => w }
            .then_ignore(
                payload
                    .delimited_by(just(Token::LParen), just(Token::RParen))
                    .or_not(),
            )
            .map(Some),
        // `align 8`, `"key"="value"`.
        select! {
            Token::Int(_) => None,
            Token::StringLit(_) => None,
            Token::Equals => None,
        },
    ));

    let param = ty
        .clone()
        .then(param_attr.repeated().collect::<Vec<_>>())
        .then(select! { Token::LocalIdent(name) => name }.or_not())
        .map_with(|((ty, attrs), name), e| Param {
            ty,
            attrs: attrs.into_iter().flatten().collect(),
            name,
            span: e.span(),
        });

    // `None` marks the `...` of a variadic function.
    let params = choice((just(Token::Ellipsis).to(None), param.map(Some)))
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map(|entries| {
            let variadic = entries.iter().any(Option::is_none);
            (entries.into_iter().flatten().collect::<Vec<_>>(), variadic)
        });

    // Linkage, return attributes and the return type precede the first
    // `@name(`; everything after the parameter list is skipped.
    let global = select! { Token::GlobalIdent(name) => name };
    let signature = token
        .clone()
        .and_is(global.clone().then(just(Token::LParen)).not())
        .repeated()
        .ignore_then(global)
        .then(params)
        .then_ignore(rest_of_line.clone())
        .map(|(name, (params, variadic))| Signature {
            name,
            params,
            variadic,
        });

    let header = choice((signature.map(Some), line.clone().to(None)))
        .map_with(|signature, e| (signature, e.span()));

    // ── Instructions ──

    let metadata_type = word("metadata").or_not();
    let operand = choice((
        metadata_type
            .clone()
            .ignore_then(select! { Token::MetadataRef(id) => Operand::MetadataRef(id) })
            .then_ignore(list_end.clone()),
        metadata_type
            .clone()
            .ignore_then(select! { Token::MetadataName(kind) => Operand::InlineMetadata(kind) })
            .then_ignore(tree.clone().repeated()),
        metadata_type
            .ignore_then(just(Token::Bang))
            .then_ignore(tree.clone().repeated())
            .to(Operand::InlineMetadata("!".to_string())),
        value_text.clone().map(Operand::Value),
    ));
    let operands = operand
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let label = choice((string.clone(), token.clone().map(|t| t.to_string())))
        .then_ignore(just(Token::Colon))
        .then_ignore(just(Token::Newline).rewind())
        .map(BodyLine::Label);

    let record = select! { Token::DbgRecord(kind) => kind }
        .then(operands.clone().or_not())
        .then_ignore(rest_of_line.clone())
        .map_with(|(kind, operands), e| {
            BodyLine::Instruction(Instruction::DebugRecord {
                kind,
                operands: operands.unwrap_or_default(),
                span: e.span(),
            })
        });

    // `[%x =] [tail] call <attrs, type> @callee(args) [, !dbg !N]`.
    // Indirect calls have no callee name.
    let callee = select! {
        Token::GlobalIdent(name) => Some(name),
        Token::LocalIdent(_) => None,
    };
    let call = token
        .clone()
        .and_is(just(Token::Call).not())
        .repeated()
        .ignore_then(just(Token::Call))
        .ignore_then(
            token
                .clone()
                .and_is(callee.clone().then(just(Token::LParen)).not())
                .repeated(),
        )
        .ignore_then(callee)
        .then(operands.or_not())
        .then_ignore(rest_of_line.clone())
        .map_with(|(callee, args), e| {
            BodyLine::Instruction(Instruction::Call {
                callee,
                args: args.unwrap_or_default(),
                span: e.span(),
            })
        });

    // `%x = opcode ...` or `opcode ...`
    let other_instruction = token
        .clone()
        .then(just(Token::Equals))
        .or_not()
        .ignore_then(token.clone().map(|t| t.to_string()))
        .then_ignore(rest_of_line.clone())
        .map_with(|opcode, e| {
            BodyLine::Instruction(Instruction::Other {
                opcode,
                span: e.span(),
            })
        });

    // ── Functions ──
    //
    // A body line is any line that does not start with `}`; the first such
    // line closes the body.

    let body_line = token
        .clone()
        .filter(|t: &Token| *t != Token::RBrace)
        .rewind()
        .ignore_then(choice((label, record, call, other_instruction)));

    let body = just(Token::Newline)
        .repeated()
        .at_least(1)
        .ignore_then(body_line)
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(just(Token::Newline).repeated().at_least(1))
        .then_ignore(just(Token::RBrace));

    let define = just(Token::Define)
        .ignore_then(header.clone())
        .then(body)
        .map(|((signature, span), body)| Item::Function {
            kind: FunctionKind::Define,
            signature,
            span,
            body: Some(body),
        });

    let declare = just(Token::Declare)
        .ignore_then(header)
        .map(|(signature, span)| Item::Function {
            kind: FunctionKind::Declare,
            signature,
            span,
            body: None,
        });

    // ── Metadata ──

    // Field names that collide with keywords, e.g. `target:`, are spelled
    // back as words.
    let field_name = select! {
        Token::Word(w) => w,
        Token::Target => "target".to_string(),
        Token::Triple => "triple".to_string(),
        Token::Call => "call".to_string(),
        Token::Distinct => "distinct".to_string(),
    };
    let field_value = choice((
        select! {
            Token::StringLit(s) => FieldValue::Str(s),
            Token::Int(n) => FieldValue::Int(n),
            Token::MetadataRef(id) => FieldValue::Ref(id),
        }
        .then_ignore(list_end),
        value_text.map(FieldValue::Other),
    ));
    let field = field_name
        .then_ignore(just(Token::Colon))
        .then(field_value)
        .map(|(name, value)| Some(MetadataField { name, value }));
    // Positional operands such as `!DIExpression(DW_OP_deref)` carry no name.
    let node_entry = choice((field, tree.repeated().at_least(1).to(None)));

    let specialized = select! { Token::MetadataName(kind) => kind }
        .then(
            node_entry
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(rest_of_line)
        .map(|(kind, entries)| {
            (
                Some(kind),
                entries.into_iter().flatten().collect::<Vec<_>>(),
            )
        });

    // Tuples (`!{...}`) and anything else keep no kind or fields.
    let node = choice((specialized, line.clone().to((None, Vec::new()))))
        .map_with(|(kind, fields), e| (kind, fields, e.span()));

    let metadata = select! { Token::MetadataRef(id) => id }
        .then_ignore(just(Token::Equals))
        .then(just(Token::Distinct).or_not().map(|d| d.is_some()))
        .then(node)
        .map(|((id, distinct), (kind, fields, span))| {
            Item::Metadata(MetadataNode {
                id,
                distinct,
                kind,
                fields,
                span,
            })
        });

    // ── Header lines ──

    let source_filename = just(Token::SourceFilename)
        .ignore_then(just(Token::Equals))
        .ignore_then(string.clone())
        .map(Item::SourceFilename);

    let target_triple = just(Token::Target)
        .ignore_then(just(Token::Triple))
        .ignore_then(just(Token::Equals))
        .ignore_then(string)
        .map(Item::TargetTriple);

    let other = line.to(Item::Other);

    let item = choice((
        source_filename,
        target_triple,
        define,
        declare,
        metadata,
        other,
    ));

    newlines
        .clone()
        .ignore_then(item.then_ignore(newlines).repeated().collect::<Vec<_>>())
        .then_ignore(end())
}

/// Brackets, commas and newlines: the tokens that shape an operand list.
fn is_structural(t: &Token) -> bool {
    matches!(
        t,
        Token::LParen
            | Token::RParen
            | Token::LBracket
            | Token::RBracket
            | Token::LBrace
            | Token::RBrace
            | Token::Lt
            | Token::Gt
            | Token::Comma
            | Token::Newline
    )
}

/// Source-like text of a token run, one space between tokens.
fn render<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> String {
    tokens
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ──
