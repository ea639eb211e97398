use super::Domain;
use crate::analysis::heap::functions::{Symbol, SymbolKind, SyntheticOp};
use crate::analysis::heap::value::{SymbolicValue, ValueSet};
use heapscope_il::IlDisplay;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};

impl Domain {
    /// Shortest paths from the root to every reachable value, following only symbols that
    /// name program-visible locations.
    fn access_path_tree(&self) -> HashMap<SymbolicValue, (SymbolicValue, Symbol)> {
        let functions = &self.ctx.functions;
        let root = self.const_root();
        let mut parent = HashMap::new();
        let mut seen = ValueSet::new();
        seen.insert(root);
        let mut queue = VecDeque::from([root]);
        while let Some(v) = queue.pop_front() {
            let mut next = self.egraph().functions_of(v);
            next.sort_by_key(|(_, r)| *r);
            for (function, r) in next {
                if !functions.manifest_field(function) {
                    continue;
                }
                if seen.insert(r) {
                    parent.insert(r, (v, function));
                    queue.push_back(r);
                }
            }
        }
        parent
    }

    /// The symbols leading from the root to `v`, if it is reachable through program-visible
    /// locations.
    pub fn access_path_terms(&self, v: SymbolicValue) -> Option<Vec<Symbol>> {
        let v = self.find(v);
        let root = self.const_root();
        if v == root {
            return Some(vec![]);
        }
        let tree = self.access_path_tree();
        let mut path = vec![];
        let mut current = v;
        while current != root {
            let (p, function) = tree.get(&current)?;
            path.push(*function);
            current = *p;
        }
        path.reverse();
        Some(path)
    }

    fn render_path(&self, path: &[Symbol]) -> String {
        let md = self.metadata();
        let is_static = md.method(self.ctx.method).is_ok_and(|m| m.is_static);
        let mut out = String::new();
        for (i, function) in path.iter().enumerate() {
            match &**function {
                SymbolKind::Local(l) => out.push_str(&l.to_string()),
                SymbolKind::Parameter(p) if p.0 == 0 && !is_static => out.push_str("this"),
                SymbolKind::Parameter(p) => out.push_str(&p.to_string()),
                SymbolKind::Field(field) if i == 0 => {
                    if let Ok(info) = md.field(*field) {
                        out.push_str(&format!("{}.", info.declaring_type.display(md)));
                    }
                    out.push_str(&field.display(md).to_string());
                }
                SymbolKind::Field(field) => {
                    out.push('.');
                    out.push_str(&field.display(md).to_string());
                }
                SymbolKind::PseudoField(m) => {
                    if i > 0 {
                        out.push('.');
                    }
                    match md.method(*m) {
                        Ok(info) => out.push_str(&format!("{}()", info.name)),
                        Err(_) => out.push_str(&format!("{m}()")),
                    }
                }
                SymbolKind::Synthetic(SyntheticOp::Length) => out.push_str(".Length"),
                _ => {}
            }
        }
        out
    }

    /// A readable access path for `v`, such as `this.next.value`.
    pub fn access_path(&self, v: SymbolicValue) -> Option<String> {
        self.access_path_terms(v).map(|p| self.render_path(&p))
    }

    /// An access path to `v` that a caller could name as well: rooted at a parameter or a
    /// static field, and crossing only members visible outside their declaring type.
    pub fn caller_visible_access_path(&self, v: SymbolicValue) -> Option<String> {
        let functions = &self.ctx.functions;
        let md = self.metadata();
        let path = self.access_path_terms(v)?;
        let rooted = match path.first() {
            Some(first) => match **first {
                SymbolKind::Parameter(_) => true,
                SymbolKind::Field(_) => functions.is_static(md, *first).unwrap_or(false),
                _ => false,
            },
            None => false,
        };
        let visible = path.iter().all(|f| {
            !matches!(**f, SymbolKind::Field(_) | SymbolKind::PseudoField(_))
                || functions.is_externally_visible(md, *f).unwrap_or(false)
        });
        (rooted && visible).then(|| self.render_path(&path))
    }

    /// Access paths of every value held in a program-visible location.
    pub fn access_paths(&self) -> BTreeMap<String, SymbolicValue> {
        let value_of = self.ctx.functions.value_of;
        let tree = self.access_path_tree();
        let mut paths = BTreeMap::new();
        for (v, (_, function)) in &tree {
            if *function != value_of {
                continue;
            }
            if let Some(path) = self.access_path_terms(*v) {
                paths.insert(self.render_path(&path), *v);
            }
        }
        paths
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_bottom() {
            return writeln!(f, "Bottom");
        }
        for (path, v) in self.access_paths() {
            write!(f, "{path} = {v} : {}", self.label(v))?;
            if self.is_unmodified(v) {
                write!(f, " (unmodified)")?;
            }
            writeln!(f)?;
        }
        for (depth, frame) in self.old.iter().enumerate() {
            writeln!(f, "old scope {depth} opened at {}", frame.begin)?;
        }
        Ok(())
    }
}
