// Dotflow
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use super::ast::{Attr, Expr, FnDef, Module, Param, Stmt};
use super::token::{Token, tokenize};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("parse error at token {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

fn err<T>(message: impl Into<String>, position: usize) -> Result<T, ParseError> {
    Err(ParseError { message: message.into(), position })
}

/// Parse a whole script.
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source);
    let mut current = 0;
    let mut items = Vec::new();
    while tokens[current] != Token::Eof {
        items.push(parse_statement(&tokens, &mut current)?);
    }
    Ok(Module { items })
}

fn peek<'a>(tokens: &'a [Token], current: usize) -> &'a Token {
    tokens.get(current).unwrap_or(&Token::Eof)
}

fn expect(tokens: &[Token], current: &mut usize, want: &Token) -> Result<(), ParseError> {
    if peek(tokens, *current) == want {
        *current += 1;
        Ok(())
    } else {
        err(
            format!("expected {:?}, found {:?}", want, peek(tokens, *current)),
            *current,
        )
    }
}

fn expect_ident(tokens: &[Token], current: &mut usize) -> Result<String, ParseError> {
    match peek(tokens, *current) {
        Token::Ident(name) => {
            let name = name.clone();
            *current += 1;
            Ok(name)
        }
        other => err(format!("expected identifier, found {other:?}"), *current),
    }
}

fn parse_dotted(tokens: &[Token], current: &mut usize) -> Result<Vec<String>, ParseError> {
    let mut segs = vec![expect_ident(tokens, current)?];
    while peek(tokens, *current) == &Token::Dot {
        *current += 1;
        segs.push(expect_ident(tokens, current)?);
    }
    Ok(segs)
}

pub fn parse_statement(tokens: &[Token], current: &mut usize) -> Result<Stmt, ParseError> {
    match peek(tokens, *current) {
        Token::Import => {
            *current += 1;
            let module = parse_dotted(tokens, current)?.join(".");
            let alias = if peek(tokens, *current) == &Token::As {
                *current += 1;
                Some(expect_ident(tokens, current)?)
            } else {
                None
            };
            Ok(Stmt::Import { module, alias })
        }
        Token::From => {
            *current += 1;
            let module = parse_dotted(tokens, current)?.join(".");
            expect(tokens, current, &Token::Import)?;
            if peek(tokens, *current) == &Token::Star {
                *current += 1;
                return Ok(Stmt::FromImport { module, names: Vec::new(), star: true });
            }
            let mut names = vec![expect_ident(tokens, current)?];
            while peek(tokens, *current) == &Token::Comma {
                *current += 1;
                names.push(expect_ident(tokens, current)?);
            }
            Ok(Stmt::FromImport { module, names, star: false })
        }
        Token::Let => {
            *current += 1;
            let name = expect_ident(tokens, current)?;
            expect(tokens, current, &Token::Assign)?;
            let value = parse_expr(tokens, current)?;
            Ok(Stmt::Let { name, value })
        }
        Token::AttrStart | Token::Fn => parse_function(tokens, current).map(Stmt::Fn),
        Token::If => parse_if(tokens, current),
        Token::For => {
            *current += 1;
            let var = expect_ident(tokens, current)?;
            expect(tokens, current, &Token::In)?;
            let iter = parse_expr(tokens, current)?;
            let body = parse_block(tokens, current)?;
            Ok(Stmt::For { var, iter, body })
        }
        Token::Return => {
            *current += 1;
            if starts_expr(peek(tokens, *current)) {
                Ok(Stmt::Return(Some(parse_expr(tokens, current)?)))
            } else {
                Ok(Stmt::Return(None))
            }
        }
        Token::Ident(_) => {
            // Either `a.b = expr` or an expression statement.
            let mark = *current;
            let segs = parse_dotted(tokens, current)?;
            if peek(tokens, *current) == &Token::Assign {
                *current += 1;
                let value = parse_expr(tokens, current)?;
                Ok(Stmt::Assign { target: segs, value })
            } else {
                *current = mark;
                Ok(Stmt::Expr(parse_expr(tokens, current)?))
            }
        }
        _ => Ok(Stmt::Expr(parse_expr(tokens, current)?)),
    }
}

fn starts_expr(token: &Token) -> bool {
    matches!(
        token,
        Token::Ident(_)
            | Token::Str(_)
            | Token::Number(_)
            | Token::True
            | Token::False
            | Token::LParen
            | Token::LBracket
            | Token::Pipe
    )
}

fn parse_if(tokens: &[Token], current: &mut usize) -> Result<Stmt, ParseError> {
    expect(tokens, current, &Token::If)?;
    let cond = parse_expr(tokens, current)?;
    let then_body = parse_block(tokens, current)?;
    let else_body = if peek(tokens, *current) == &Token::Else {
        *current += 1;
        if peek(tokens, *current) == &Token::If {
            vec![parse_if(tokens, current)?]
        } else {
            parse_block(tokens, current)?
        }
    } else {
        Vec::new()
    };
    Ok(Stmt::If { cond, then_body, else_body })
}

fn parse_function(tokens: &[Token], current: &mut usize) -> Result<FnDef, ParseError> {
    let mut attrs = Vec::new();
    while peek(tokens, *current) == &Token::AttrStart {
        *current += 1;
        let name = expect_ident(tokens, current)?;
        let mut args = Vec::new();
        if peek(tokens, *current) == &Token::LParen {
            *current += 1;
            if peek(tokens, *current) != &Token::RParen {
                args.push(parse_expr(tokens, current)?);
                while peek(tokens, *current) == &Token::Comma {
                    *current += 1;
                    args.push(parse_expr(tokens, current)?);
                }
            }
            expect(tokens, current, &Token::RParen)?;
        }
        expect(tokens, current, &Token::RBracket)?;
        attrs.push(Attr { name, args });
    }

    expect(tokens, current, &Token::Fn)?;
    let name = expect_ident(tokens, current)?;
    expect(tokens, current, &Token::LParen)?;
    let mut params = Vec::new();
    while peek(tokens, *current) != &Token::RParen {
        let pname = expect_ident(tokens, current)?;
        let default = if peek(tokens, *current) == &Token::Assign {
            *current += 1;
            Some(parse_expr(tokens, current)?)
        } else {
            None
        };
        params.push(Param { name: pname, default });
        if peek(tokens, *current) == &Token::Comma {
            *current += 1;
        } else {
            break;
        }
    }
    expect(tokens, current, &Token::RParen)?;
    let body = parse_block(tokens, current)?;
    Ok(FnDef { name, params, attrs, body })
}

fn parse_block(tokens: &[Token], current: &mut usize) -> Result<Vec<Stmt>, ParseError> {
    expect(tokens, current, &Token::LBrace)?;
    let mut stmts = Vec::new();
    while peek(tokens, *current) != &Token::RBrace {
        if peek(tokens, *current) == &Token::Eof {
            return err("unterminated block", *current);
        }
        stmts.push(parse_statement(tokens, current)?);
    }
    *current += 1;
    Ok(stmts)
}

fn parse_expr(tokens: &[Token], current: &mut usize) -> Result<Expr, ParseError> {
    parse_comparison(tokens, current)
}

fn parse_comparison(tokens: &[Token], current: &mut usize) -> Result<Expr, ParseError> {
    let left = parse_additive(tokens, current)?;
    let op = match peek(tokens, *current) {
        Token::EqEq => "==",
        Token::NotEq => "!=",
        Token::Lt => "<",
        Token::Gt => ">",
        Token::Le => "<=",
        Token::Ge => ">=",
        _ => return Ok(left),
    };
    *current += 1;
    let right = parse_additive(tokens, current)?;
    Ok(Expr::Binary { op: op.to_string(), left: Box::new(left), right: Box::new(right) })
}

fn parse_additive(tokens: &[Token], current: &mut usize) -> Result<Expr, ParseError> {
    let mut left = parse_multiplicative(tokens, current)?;
    loop {
        let op = match peek(tokens, *current) {
            Token::Plus => "+",
            Token::Minus => "-",
            _ => return Ok(left),
        };
        *current += 1;
        let right = parse_multiplicative(tokens, current)?;
        left = Expr::Binary { op: op.to_string(), left: Box::new(left), right: Box::new(right) };
    }
}

fn parse_multiplicative(tokens: &[Token], current: &mut usize) -> Result<Expr, ParseError> {
    let mut left = parse_postfix(tokens, current)?;
    loop {
        let op = match peek(tokens, *current) {
            Token::Star => "*",
            Token::Slash => "/",
            _ => return Ok(left),
        };
        *current += 1;
        let right = parse_postfix(tokens, current)?;
        left = Expr::Binary { op: op.to_string(), left: Box::new(left), right: Box::new(right) };
    }
}

fn parse_postfix(tokens: &[Token], current: &mut usize) -> Result<Expr, ParseError> {
    let mut expr = parse_primary(tokens, current)?;
    while peek(tokens, *current) == &Token::LParen {
        *current += 1;
        let mut args = Vec::new();
        if peek(tokens, *current) != &Token::RParen {
            args.push(parse_expr(tokens, current)?);
            while peek(tokens, *current) == &Token::Comma {
                *current += 1;
                args.push(parse_expr(tokens, current)?);
            }
        }
        expect(tokens, current, &Token::RParen)?;
        expr = Expr::Call { callee: Box::new(expr), args };
    }
    Ok(expr)
}

fn parse_primary(tokens: &[Token], current: &mut usize) -> Result<Expr, ParseError> {
    match peek(tokens, *current).clone() {
        Token::Number(n) => {
            *current += 1;
            Ok(Expr::Number(n))
        }
        Token::Str(s) => {
            *current += 1;
            Ok(Expr::Str(s))
        }
        Token::True => {
            *current += 1;
            Ok(Expr::Bool(true))
        }
        Token::False => {
            *current += 1;
            Ok(Expr::Bool(false))
        }
        Token::Ident(_) => Ok(Expr::Name(parse_dotted(tokens, current)?)),
        Token::Pipe => {
            *current += 1;
            let mut params = Vec::new();
            while peek(tokens, *current) != &Token::Pipe {
                params.push(expect_ident(tokens, current)?);
                if peek(tokens, *current) == &Token::Comma {
                    *current += 1;
                }
            }
            *current += 1;
            let body = parse_expr(tokens, current)?;
            Ok(Expr::Lambda { params, body: Box::new(body) })
        }
        Token::LParen => {
            *current += 1;
            if peek(tokens, *current) == &Token::RParen {
                *current += 1;
                return Ok(Expr::Tuple(Vec::new()));
            }
            let first = parse_expr(tokens, current)?;
            if peek(tokens, *current) == &Token::Comma {
                let mut items = vec![first];
                while peek(tokens, *current) == &Token::Comma {
                    *current += 1;
                    if peek(tokens, *current) == &Token::RParen {
                        break;
                    }
                    items.push(parse_expr(tokens, current)?);
                }
                expect(tokens, current, &Token::RParen)?;
                Ok(Expr::Tuple(items))
            } else {
                expect(tokens, current, &Token::RParen)?;
                Ok(first)
            }
        }
        Token::LBracket => {
            *current += 1;
            let mut items = Vec::new();
            while peek(tokens, *current) != &Token::RBracket {
                items.push(parse_expr(tokens, current)?);
                if peek(tokens, *current) == &Token::Comma {
                    *current += 1;
                }
            }
            *current += 1;
            Ok(Expr::List(items))
        }
        other => err(format!("unexpected token {other:?}"), *current),
    }
}
