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

//! `.flow` script front end.
//!
//! The engine never executes scripts itself; it only needs their structure:
//! imports, top-level bindings, function definitions with their parameter
//! defaults and attributes, and the names each scope mentions. The parser
//! here produces exactly that and nothing more.

pub mod ast;
pub mod parser;
pub mod token;

pub use ast::{Attr, Expr, FnDef, Module, Param, Stmt};
pub use parser::{ParseError, parse_module};
pub use token::{Token, tokenize};
