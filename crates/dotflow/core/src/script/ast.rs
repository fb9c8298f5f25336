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

//! Script AST.
//!
//! Nodes derive `Serialize` because structural fingerprints are computed
//! from the serialized form of function bodies.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub items: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// `import a.b` / `import a.b as x`
    Import { module: String, alias: Option<String> },
    /// `from a.b import x, y` / `from a.b import *`
    FromImport { module: String, names: Vec<String>, star: bool },
    /// `let name = expr`
    Let { name: String, value: Expr },
    /// `a.b = expr` on an already-bound name
    Assign { target: Vec<String>, value: Expr },
    Expr(Expr),
    If { cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt> },
    For { var: String, iter: Expr, body: Vec<Stmt> },
    Return(Option<Expr>),
    Fn(FnDef),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub attrs: Vec<Attr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

/// A `#[name]` or `#[name(args)]` marker on a function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attr {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// A possibly dotted name, one segment per element.
    Name(Vec<String>),
    Str(String),
    Number(f64),
    Bool(bool),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Lambda { params: Vec<String>, body: Box<Expr> },
    Binary { op: String, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    /// String literals occurring in this expression, flattening tuples and
    /// lists. This is how declared metadata values are read: a single string
    /// or a tuple/list of strings.
    pub fn string_values(&self) -> Vec<String> {
        match self {
            Expr::Str(s) => vec![s.clone()],
            Expr::Tuple(items) | Expr::List(items) => {
                items.iter().flat_map(Expr::string_values).collect()
            }
            _ => Vec::new(),
        }
    }

    /// True if a lambda occurs anywhere in this expression.
    pub fn contains_lambda(&self) -> bool {
        match self {
            Expr::Lambda { .. } => true,
            Expr::Tuple(items) | Expr::List(items) => items.iter().any(Expr::contains_lambda),
            Expr::Call { callee, args } => {
                callee.contains_lambda() || args.iter().any(Expr::contains_lambda)
            }
            Expr::Binary { left, right, .. } => left.contains_lambda() || right.contains_lambda(),
            _ => false,
        }
    }
}

impl Module {
    /// Function definitions at module top level, in order.
    pub fn functions(&self) -> impl Iterator<Item = &FnDef> {
        self.items.iter().filter_map(|s| match s {
            Stmt::Fn(def) => Some(def),
            _ => None,
        })
    }
}
