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

use crate::script::{Expr, FnDef, Stmt};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::warn;

/// Parameter and attribute names carrying dependency metadata.
const META_DEPENDS_ON: &str = "depends_on";
const META_CREATES: &str = "creates";
const META_USES: &str = "uses";
const META_FAST: &str = "fast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartKind {
    /// A top-level `fn`.
    Function,
    /// A top-level `let`.
    Binding,
}

/// Dependency metadata an operation declares about itself, merged from
/// parameter defaults and `#[...]` attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredMeta {
    pub depends_on: Vec<String>,
    pub creates: Vec<String>,
    pub uses: Vec<String>,
    /// Fast operations are trusted to be cheap and deterministic; their
    /// targets are not quarantined during execution.
    pub is_fast: bool,
}

impl DeclaredMeta {
    /// Read metadata from a function definition. Values come from default
    /// arguments named `depends_on` / `creates` / `uses` and from attributes
    /// of the same names; both sources contribute, attributes appended after
    /// defaults. `#[fast]` or a `fast = true` default marks a fast operation.
    pub fn from_function(def: &FnDef) -> DeclaredMeta {
        let mut meta = DeclaredMeta::default();
        for param in &def.params {
            let Some(default) = &param.default else { continue };
            match param.name.as_str() {
                META_DEPENDS_ON => meta.depends_on.extend(default.string_values()),
                META_CREATES => meta.creates.extend(default.string_values()),
                META_USES => meta.uses.extend(default.string_values()),
                META_FAST => {
                    if let Expr::Bool(b) = default {
                        meta.is_fast = *b;
                    }
                }
                _ => {}
            }
        }
        for attr in &def.attrs {
            let values = || attr.args.iter().flat_map(Expr::string_values);
            match attr.name.as_str() {
                META_DEPENDS_ON => meta.depends_on.extend(values()),
                META_CREATES => meta.creates.extend(values()),
                META_USES => meta.uses.extend(values()),
                META_FAST => meta.is_fast = true,
                other => {
                    warn!(function = %def.name, attribute = other, "unknown attribute ignored");
                }
            }
        }
        meta
    }
}

/// Structural identity of a part.
///
/// `Volatile` marks parts whose value cannot be compared structurally
/// (bindings containing lambdas). A volatile fingerprint compares unequal
/// to everything, itself included, so such parts always count as changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Fingerprint {
    Stable([u8; 32]),
    Volatile,
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Fingerprint::Stable(a), Fingerprint::Stable(b)) => a == b,
            _ => false,
        }
    }
}

impl Fingerprint {
    /// Fingerprint of a function: parameters, attributes and body, with a
    /// leading docstring expression dropped so editing documentation does
    /// not dirty downstream targets.
    pub fn of_function(def: &FnDef) -> Fingerprint {
        let body: Vec<&Stmt> = def
            .body
            .iter()
            .enumerate()
            .filter(|(i, s)| !(*i == 0 && matches!(s, Stmt::Expr(Expr::Str(_)))))
            .map(|(_, s)| s)
            .collect();
        let subject = (&def.params, &def.attrs, body);
        match bincode::serde::encode_to_vec(&subject, bincode::config::standard()) {
            Ok(bytes) => Fingerprint::Stable(Sha3_256::digest(&bytes).into()),
            Err(_) => Fingerprint::Volatile,
        }
    }

    /// Fingerprint of a top-level binding. Lambda-bearing values are
    /// volatile.
    pub fn of_binding(value: &Expr) -> Fingerprint {
        if value.contains_lambda() {
            return Fingerprint::Volatile;
        }
        match bincode::serde::encode_to_vec(value, bincode::config::standard()) {
            Ok(bytes) => Fingerprint::Stable(Sha3_256::digest(&bytes).into()),
            Err(_) => Fingerprint::Volatile,
        }
    }
}

/// One stored part of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPart {
    pub kind: PartKind,
    pub fingerprint: Fingerprint,
    pub meta: DeclaredMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_module;

    fn first_fn(src: &str) -> FnDef {
        parse_module(src).unwrap().functions().next().unwrap().clone()
    }

    #[test]
    fn test_meta_from_defaults_and_attrs() {
        let f = first_fn(
            r#"
            #[creates("out/b")]
            #[fast]
            fn build(creates = "out/a", depends_on = ("gen.flow", "src/x.csv")) {
                run()
            }
            "#,
        );
        let meta = DeclaredMeta::from_function(&f);
        assert_eq!(meta.creates, vec!["out/a", "out/b"]);
        assert_eq!(meta.depends_on, vec!["gen.flow", "src/x.csv"]);
        assert!(meta.is_fast);
    }

    #[test]
    fn test_docstring_does_not_change_fingerprint() {
        let a = first_fn("fn f() { \"old doc\"\n run() }");
        let b = first_fn("fn f() { \"new doc\"\n run() }");
        assert_eq!(Fingerprint::of_function(&a), Fingerprint::of_function(&b));
        let c = first_fn("fn f() { \"new doc\"\n run(1) }");
        assert_ne!(Fingerprint::of_function(&b), Fingerprint::of_function(&c));
    }

    #[test]
    fn test_volatile_never_equal() {
        let m = parse_module("let f = |x| x").unwrap();
        let Stmt::Let { value, .. } = &m.items[0] else { panic!() };
        let fp = Fingerprint::of_binding(value);
        assert_ne!(fp.clone(), fp);
    }
}
