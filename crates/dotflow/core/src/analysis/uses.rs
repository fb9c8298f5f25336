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

use crate::script::{Expr, Module, Stmt};
use std::collections::BTreeMap;

/// Scope key for names mentioned at module top level.
pub const MODULE_SCOPE: &str = "__module__";

/// Name usage of one module, keyed by scope.
///
/// `scope_mentions` maps a scope (a function name, or [`MODULE_SCOPE`]) to
/// the dotted names it mentions, each rewritten one level through local
/// bindings: after `let t = csv`, a mention of `t.load` is recorded as
/// `csv.load`. Import aliases are left alone here and resolved to qualified
/// names during full resolution. `imports` maps a scope to its import
/// bindings, local alias to qualified name; a star import binds the key
/// `m.*`. `name_defs` holds the module-level interpretation of every bound
/// name.
#[derive(Debug, Default, Clone)]
pub struct UsesInfo {
    pub scope_mentions: BTreeMap<String, Vec<String>>,
    pub imports: BTreeMap<String, BTreeMap<String, String>>,
    pub name_defs: BTreeMap<String, Vec<String>>,
}

pub fn collect_uses(module: &Module) -> UsesInfo {
    let mut info = UsesInfo::default();
    let mut defs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    walk_block(&module.items, &mut defs, &mut info, MODULE_SCOPE);
    info.name_defs = defs;
    info
}

type Defs = BTreeMap<String, Vec<String>>;

/// Mentions are recorded in statement order, with function bodies analyzed
/// after the plain statements of their block so sibling bindings are in
/// scope regardless of definition order.
fn walk_block(stmts: &[Stmt], defs: &mut Defs, info: &mut UsesInfo, scope: &str) {
    let (fns, plain): (Vec<&Stmt>, Vec<&Stmt>) =
        stmts.iter().partition(|s| matches!(s, Stmt::Fn(_)));
    for stmt in plain.into_iter().chain(fns) {
        walk_stmt(stmt, defs, info, scope);
    }
}

fn walk_stmt(stmt: &Stmt, defs: &mut Defs, info: &mut UsesInfo, scope: &str) {
    match stmt {
        Stmt::Import { module, alias } => {
            let local = alias.clone().unwrap_or_else(|| module.clone());
            defs.insert(local.clone(), vec![local.clone()]);
            info.imports.entry(scope.to_string()).or_default().insert(local, module.clone());
        }
        Stmt::FromImport { module, names, star } => {
            let scope_imports = info.imports.entry(scope.to_string()).or_default();
            if *star {
                let key = format!("{module}.*");
                defs.insert(key.clone(), vec![key.clone()]);
                scope_imports.insert(key.clone(), key);
            } else {
                for name in names {
                    defs.insert(name.clone(), vec![name.clone()]);
                    scope_imports.insert(name.clone(), format!("{module}.{name}"));
                }
            }
        }
        Stmt::Let { name, value } => {
            walk_expr(value, defs, info, scope);
            bind(name, value, defs, scope);
        }
        Stmt::Assign { target, value } => {
            walk_expr(value, defs, info, scope);
            if target.len() == 1 {
                bind(&target[0], value, defs, scope);
            } else {
                mention(target, defs, info, scope);
            }
        }
        Stmt::Expr(e) => walk_expr(e, defs, info, scope),
        Stmt::If { cond, then_body, else_body } => {
            walk_expr(cond, defs, info, scope);
            // Conditional definitions accumulate rather than replace.
            let mut branch_defs = defs.clone();
            walk_block(then_body, &mut branch_defs, info, scope);
            walk_block(else_body, &mut branch_defs, info, scope);
            for (name, interps) in branch_defs {
                let slot = defs.entry(name).or_default();
                for i in interps {
                    if !slot.contains(&i) {
                        slot.push(i);
                    }
                }
            }
        }
        Stmt::For { var, iter, body } => {
            walk_expr(iter, defs, info, scope);
            walk_block(body, defs, info, scope);
            drop_headed_by(info, scope, std::slice::from_ref(var));
        }
        Stmt::Return(value) => {
            if let Some(e) = value {
                walk_expr(e, defs, info, scope);
            }
        }
        Stmt::Fn(def) => {
            let mut inner_defs = defs.clone();
            let mut inner = UsesInfo::default();
            for param in &def.params {
                if let Some(default) = &param.default {
                    walk_expr(default, &mut inner_defs, &mut inner, &def.name);
                }
            }
            walk_block(&def.body, &mut inner_defs, &mut inner, &def.name);

            for (sc, imports) in inner.imports {
                info.imports.entry(sc).or_default().extend(imports);
            }
            let params: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
            let inner_scopes: Vec<&String> = inner.scope_mentions.keys().collect();
            let target = info.scope_mentions.entry(def.name.clone()).or_default();
            for mentions in inner.scope_mentions.values() {
                for g in mentions {
                    let head = g.split('.').next().unwrap_or(g);
                    if !params.contains(&head)
                        && !inner_scopes.iter().any(|s| s.as_str() == g)
                        && !target.contains(g)
                    {
                        target.push(g.clone());
                    }
                }
            }
        }
    }
}

fn bind(name: &str, value: &Expr, defs: &mut Defs, scope: &str) {
    let interp = match value {
        Expr::Name(segs) => interpret(segs, defs),
        _ => Vec::new(),
    };
    if interp.is_empty() && scope == MODULE_SCOPE {
        defs.insert(name.to_string(), vec![name.to_string()]);
    } else {
        defs.insert(name.to_string(), interp);
    }
}

fn walk_expr(expr: &Expr, defs: &mut Defs, info: &mut UsesInfo, scope: &str) {
    match expr {
        Expr::Name(segs) => mention(segs, defs, info, scope),
        Expr::Str(_) | Expr::Number(_) | Expr::Bool(_) => {}
        Expr::Tuple(items) | Expr::List(items) => {
            for item in items {
                walk_expr(item, defs, info, scope);
            }
        }
        Expr::Call { callee, args } => {
            walk_expr(callee, defs, info, scope);
            for arg in args {
                walk_expr(arg, defs, info, scope);
            }
        }
        Expr::Lambda { params, body } => {
            walk_expr(body, defs, info, scope);
            let params: Vec<&str> = params.iter().map(String::as_str).collect();
            if let Some(mentions) = info.scope_mentions.get_mut(scope) {
                mentions.retain(|g| {
                    let head = g.split('.').next().unwrap_or(g);
                    !params.contains(&head)
                });
            }
        }
        Expr::Binary { left, right, .. } => {
            walk_expr(left, defs, info, scope);
            walk_expr(right, defs, info, scope);
        }
    }
}

fn mention(segs: &[String], defs: &Defs, info: &mut UsesInfo, scope: &str) {
    let slot = info.scope_mentions.entry(scope.to_string()).or_default();
    for name in interpret(segs, defs) {
        if !slot.contains(&name) {
            slot.push(name);
        }
    }
}

/// Real name(s) of a dotted chain, rewriting its head through current
/// bindings. An unbound head names itself.
fn interpret(segs: &[String], defs: &Defs) -> Vec<String> {
    let Some(head) = segs.first() else { return Vec::new() };
    match defs.get(head) {
        Some(interps) => {
            if segs.len() > 1 {
                let rest = segs[1..].join(".");
                interps.iter().map(|d| format!("{d}.{rest}")).collect()
            } else {
                interps.clone()
            }
        }
        None => vec![segs.join(".")],
    }
}

fn drop_headed_by(info: &mut UsesInfo, scope: &str, vars: &[String]) {
    if let Some(mentions) = info.scope_mentions.get_mut(scope) {
        mentions.retain(|g| {
            let head = g.split('.').next().unwrap_or(g);
            !vars.iter().any(|v| v == head)
        });
    }
}
