//! Section extraction
//!
//! Splits a benchmark body into init / bench / verify statements. Markers are
//! labeled blocks (`'init: { .. }`, `'bench: { .. }`, `'verify: { .. }`): a
//! marker switches the active section and its contents are appended to it.
//! Statements between markers go to the active section, so an empty
//! `'init: {}` works as a bare marker line.

use proc_macro2::{TokenStream as TokenStream2, TokenTree};
use quote::ToTokens;
use syn::{Block, Expr, ExprBlock, Ident, Pat, Stmt};

/// Section kinds, in the order markers must appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionKind {
    Init,
    Bench,
    Verify,
}

impl SectionKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "init" => Some(SectionKind::Init),
            "bench" => Some(SectionKind::Bench),
            "verify" => Some(SectionKind::Verify),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SectionKind::Init => "'init",
            SectionKind::Bench => "'bench",
            SectionKind::Verify => "'verify",
        }
    }
}

/// The three extracted sections
#[derive(Default)]
pub struct SectionSet {
    pub init: Vec<Stmt>,
    pub bench: Vec<Stmt>,
    pub verify: Vec<Stmt>,
}

impl SectionSet {
    fn section_mut(&mut self, kind: SectionKind) -> &mut Vec<Stmt> {
        match kind {
            SectionKind::Init => &mut self.init,
            SectionKind::Bench => &mut self.bench,
            SectionKind::Verify => &mut self.verify,
        }
    }
}

fn marker(stmt: &Stmt) -> Option<(SectionKind, &ExprBlock)> {
    let Stmt::Expr(Expr::Block(block), _) = stmt else {
        return None;
    };
    let label = block.label.as_ref()?;
    SectionKind::from_label(&label.name.ident.to_string()).map(|kind| (kind, block))
}

/// Split `body` into sections.
///
/// Fails on code before the first marker and on duplicated or out-of-order
/// markers.
pub fn extract(body: &Block) -> syn::Result<SectionSet> {
    let mut sections = SectionSet::default();
    let mut active: Option<SectionKind> = None;
    let mut rejected: Vec<&Stmt> = Vec::new();

    for stmt in &body.stmts {
        if let Some((kind, block)) = marker(stmt) {
            if let Some(current) = active {
                if kind <= current {
                    return Err(syn::Error::new_spanned(
                        &block.label,
                        format!(
                            "section marker `{}` is duplicated or out of order; \
                             markers must appear as 'init, 'bench, 'verify",
                            kind.label()
                        ),
                    ));
                }
            }
            active = Some(kind);
            sections
                .section_mut(kind)
                .extend(block.block.stmts.iter().cloned());
            continue;
        }

        match active {
            Some(kind) => sections.section_mut(kind).push(stmt.clone()),
            None => rejected.push(stmt),
        }
    }

    if let Some(err) = rejected
        .iter()
        .map(|stmt| {
            syn::Error::new_spanned(
                stmt,
                "found code before the first section marker; \
                 benchmark bodies may only contain 'init, 'bench and 'verify sections",
            )
        })
        .reduce(|mut acc, e| {
            acc.combine(e);
            acc
        })
    {
        return Err(err);
    }

    normalize(&mut sections.init, false);
    normalize(&mut sections.bench, true);
    normalize(&mut sections.verify, false);

    Ok(sections)
}

/// Terminate trailing expressions so sections can be spliced next to each
/// other. In the bench section the value is routed through `black_box`.
fn normalize(stmts: &mut [Stmt], keep_value: bool) {
    for stmt in stmts.iter_mut() {
        match stmt {
            Stmt::Expr(expr, semi @ None) => {
                if keep_value {
                    *expr = syn::parse_quote!(::core::hint::black_box(#expr));
                }
                *semi = Some(Default::default());
            }
            Stmt::Macro(mac) if mac.semi_token.is_none() => {
                mac.semi_token = Some(Default::default());
            }
            _ => {}
        }
    }
}

/// Bindings introduced by top-level `let` statements in the bench section
/// that the verify section reads, in order of first appearance.
pub fn verify_bindings(sections: &SectionSet) -> Vec<Ident> {
    let mut bound = Vec::new();
    for stmt in &sections.bench {
        if let Stmt::Local(local) = stmt {
            pattern_bindings(&local.pat, &mut bound);
        }
    }

    let mut read = Vec::new();
    for stmt in &sections.verify {
        collect_reads(stmt.to_token_stream(), &mut read);
    }

    let mut result: Vec<Ident> = Vec::new();
    for ident in bound {
        if read.contains(&ident) && !result.contains(&ident) {
            result.push(ident);
        }
    }
    result
}

fn pattern_bindings(pat: &Pat, out: &mut Vec<Ident>) {
    match pat {
        Pat::Ident(p) => {
            out.push(p.ident.clone());
            if let Some((_, sub)) = &p.subpat {
                pattern_bindings(sub, out);
            }
        }
        Pat::Type(p) => pattern_bindings(&p.pat, out),
        Pat::Reference(p) => pattern_bindings(&p.pat, out),
        Pat::Paren(p) => pattern_bindings(&p.pat, out),
        Pat::Tuple(p) => p.elems.iter().for_each(|e| pattern_bindings(e, out)),
        Pat::TupleStruct(p) => p.elems.iter().for_each(|e| pattern_bindings(e, out)),
        Pat::Slice(p) => p.elems.iter().for_each(|e| pattern_bindings(e, out)),
        Pat::Struct(p) => p.fields.iter().for_each(|f| pattern_bindings(&f.pat, out)),
        Pat::Or(p) => {
            if let Some(first) = p.cases.first() {
                pattern_bindings(first, out);
            }
        }
        _ => {}
    }
}

/// Identifiers that can name a local: field and method names (after `.`)
/// and trailing path segments (after `::`) are skipped.
fn collect_reads(tokens: TokenStream2, out: &mut Vec<Ident>) {
    let mut previous: Option<char> = None;
    for tree in tokens {
        match tree {
            TokenTree::Ident(ident) => {
                if !matches!(previous, Some('.') | Some(':')) {
                    out.push(ident);
                }
                previous = None;
            }
            TokenTree::Group(group) => {
                collect_reads(group.stream(), out);
                previous = None;
            }
            TokenTree::Punct(punct) => previous = Some(punct.as_char()),
            TokenTree::Literal(_) => previous = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn names(bindings: &[Ident]) -> Vec<String> {
        bindings.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn test_block_sections() {
        let body: Block = parse_quote!({
            'init: {
                let x = 1;
            }
            'bench: {
                let y = x + 1;
            }
            'verify: {
                assert_eq!(y, 2);
            }
        });
        let sections = extract(&body).unwrap();
        assert_eq!(sections.init.len(), 1);
        assert_eq!(sections.bench.len(), 1);
        assert_eq!(sections.verify.len(), 1);
    }

    #[test]
    fn test_bare_markers_collect_following_statements() {
        let body: Block = parse_quote!({
            'init: {}
            let obj = 1;
            let other = 2;
            'bench: {}
            let y = obj + other;
        });
        let sections = extract(&body).unwrap();
        assert_eq!(sections.init.len(), 2);
        assert_eq!(sections.bench.len(), 1);
        assert!(sections.verify.is_empty());
    }

    #[test]
    fn test_verify_may_be_omitted() {
        let body: Block = parse_quote!({
            'init: { let v = vec![1, 2, 3]; }
            'bench: { v.iter().sum::<i32>() }
        });
        let sections = extract(&body).unwrap();
        assert!(sections.verify.is_empty());
        // Trailing expression is terminated and kept alive
        let bench = sections.bench[0].to_token_stream().to_string();
        assert!(bench.contains("black_box"));
        assert!(bench.trim_end().ends_with(';'));
    }

    #[test]
    fn test_code_before_first_marker_rejected() {
        let body: Block = parse_quote!({
            let stray = 1;
            'init: { let x = 1; }
            'bench: { let y = x; }
        });
        let err = extract(&body).err().map(|e| e.to_string());
        assert!(err.unwrap().contains("before the first section marker"));
    }

    #[test]
    fn test_out_of_order_marker_rejected() {
        let body: Block = parse_quote!({
            'bench: { let y = 1; }
            'init: { let x = 1; }
        });
        let err = extract(&body).err().map(|e| e.to_string());
        assert!(err.unwrap().contains("'init"));
    }

    #[test]
    fn test_duplicate_marker_rejected() {
        let body: Block = parse_quote!({
            'init: { let x = 1; }
            'init: { let z = 1; }
        });
        assert!(extract(&body).is_err());
    }

    #[test]
    fn test_other_labels_are_ordinary_statements() {
        let body: Block = parse_quote!({
            'init: {}
            'outer: {
                let ignored = 1;
            }
            'bench: {}
        });
        let sections = extract(&body).unwrap();
        assert_eq!(sections.init.len(), 1);
    }

    #[test]
    fn test_empty_body_is_well_formed() {
        let body: Block = parse_quote!({});
        let sections = extract(&body).unwrap();
        assert!(sections.init.is_empty() && sections.bench.is_empty());
    }

    #[test]
    fn test_verify_bindings_only_lists_read_names() {
        let body: Block = parse_quote!({
            'init: { let x = 1; }
            'bench: {
                let (a, mut b) = (x, x);
                let unused = a + b;
                let y: i32 = x + 1;
            }
            'verify: { assert_eq!(y + b, 3); }
        });
        let sections = extract(&body).unwrap();
        assert_eq!(names(&verify_bindings(&sections)), ["b", "y"]);
    }

    #[test]
    fn test_field_and_method_names_are_not_reads() {
        let body: Block = parse_quote!({
            'init: { let v = vec![1, 2, 3]; }
            'bench: {
                let len = v.len();
                let first = v[0];
                let max = 3;
            }
            'verify: { assert_eq!(v.len(), 3); assert!(std::cmp::max(v[0], 1) > 0); }
        });
        let sections = extract(&body).unwrap();
        assert!(verify_bindings(&sections).is_empty());
    }

    #[test]
    fn test_no_bindings_without_verify() {
        let body: Block = parse_quote!({
            'bench: { let y = 1; }
        });
        let sections = extract(&body).unwrap();
        assert!(verify_bindings(&sections).is_empty());
    }
}
