//! The symbol-table shared by all semantic passes

use crate::compiler::ast::{Ast, DeclId};
use std::collections::{HashMap, HashSet};

/// One lexical scope. The name map is created lazily on first insertion;
/// owner/parent/interfaces carry the inheritance metadata recorded when a
/// class or interface body is built.
#[derive(Debug, Default)]
struct Scope {
    symbols: Option<HashMap<String, DeclId>>,
    owner: Option<String>,
    parent: Option<String>,
    interfaces: Vec<String>,
}
impl Scope {
    fn get(&self, name: &str) -> Option<DeclId> {
        self.symbols.as_ref().and_then(|map| map.get(name).copied())
    }
}

/// Scope-stack symbol table with stable scope indices.
///
/// Pass 1 builds the scope vector; later passes replay the same indices by
/// advancing `scope_counter` in the identical DFS pre-order, so a node
/// re-entered in pass N lands on the scope built for it in pass 1.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    active: Vec<usize>,
    cur_scope: usize,
    scope_counter: usize,
    decl_counter: usize,
    trace: bool,
}

impl SymbolTable {
    pub fn new(trace: bool) -> SymbolTable {
        SymbolTable {
            scopes: vec![Scope::default()],
            active: vec![0],
            cur_scope: 0,
            scope_counter: 0,
            decl_counter: 0,
            trace,
        }
    }

    /// Clears the active stack and counters for another pass. The scope
    /// vector itself is preserved.
    pub fn reset(&mut self) {
        if self.trace {
            eprintln!("sttrace: ======== reset symbol table ========");
        }
        self.active.clear();
        self.active.push(0);
        self.cur_scope = 0;
        self.scope_counter = 0;
        self.decl_counter = 0;
    }

    /// Pushes a brand-new scope. Only called during the build pass.
    pub fn build_scope(&mut self) {
        self.scope_counter += 1;
        if self.trace {
            eprintln!("sttrace: build new scope {}", self.scope_counter);
        }
        self.scopes.push(Scope::default());
        self.active.push(self.scope_counter);
        self.cur_scope = self.scope_counter;
    }

    /// Pushes a brand-new scope owned by a class or interface body.
    pub fn build_scope_owned(&mut self, owner: &str) {
        self.build_scope();
        self.scopes[self.cur_scope].owner = Some(owner.to_string());
    }

    /// Re-enters the next already-built scope. Must mirror the build-pass
    /// order exactly.
    pub fn enter_scope(&mut self) {
        self.scope_counter += 1;
        if self.trace {
            eprintln!("sttrace: enter scope {}", self.scope_counter);
        }
        self.active.push(self.scope_counter);
        self.cur_scope = self.scope_counter;
    }

    pub fn exit_scope(&mut self) {
        if self.trace {
            eprintln!("sttrace: exit scope {}", self.cur_scope);
        }
        self.active.pop();
        self.cur_scope = *self.active.last().expect("global scope never popped");
    }

    /// Records the parent class on the current (class) scope.
    pub fn set_parent(&mut self, parent: &str) {
        self.scopes[self.cur_scope].parent = Some(parent.to_string());
    }

    /// Appends an implemented interface on the current (class) scope.
    pub fn add_interface(&mut self, interface: &str) {
        self.scopes[self.cur_scope].interfaces.push(interface.to_string());
    }

    /// Inserts a declaration into the current scope and returns its global
    /// symbol index.
    pub fn insert(&mut self, name: &str, decl: DeclId) -> usize {
        if self.trace {
            eprintln!("sttrace: insert {} into scope {}", name, self.cur_scope);
        }
        self.scopes[self.cur_scope]
            .symbols
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), decl);
        let idx = self.decl_counter;
        self.decl_counter += 1;
        idx
    }

    /// Looks a name up in the current scope only.
    pub fn local_lookup(&self, name: &str) -> Option<DeclId> {
        self.scopes[self.cur_scope].get(name)
    }

    /// Looks a name up in global scope 0 only.
    pub fn global_lookup(&self, name: &str) -> Option<DeclId> {
        self.scopes[0].get(name)
    }

    fn scope_of_owner(&self, owner: &str) -> Option<usize> {
        self.scopes
            .iter()
            .position(|s| s.owner.as_deref() == Some(owner))
    }

    /// Walks the parent-class chain starting at `scope`, guarded against
    /// cycles anywhere in the chain with a visited set.
    fn chain_lookup(&self, mut scope: usize, name: &str) -> Option<DeclId> {
        let mut visited = HashSet::new();
        visited.insert(scope);
        while let Some(parent) = self.scopes[scope].parent.as_deref() {
            let Some(parent_scope) = self.scope_of_owner(parent) else {
                return None;
            };
            if !visited.insert(parent_scope) {
                return None;
            }
            if let Some(decl) = self.scopes[parent_scope].get(name) {
                return Some(decl);
            }
            scope = parent_scope;
        }
        None
    }

    /// Looks a name up in all active scopes, walking each scope's
    /// parent-class chain before moving down the stack. A parent's symbol
    /// therefore shadows an outer scope's.
    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        if self.trace {
            eprintln!("sttrace: lookup {} from scope {}", name, self.cur_scope);
        }
        for &scope in self.active.iter().rev() {
            if let Some(decl) = self.scopes[scope].get(name) {
                return Some(decl);
            }
            if let Some(decl) = self.chain_lookup(scope, name) {
                return Some(decl);
            }
        }
        None
    }

    /// Looks a name up in the parent chain of the current scope only.
    pub fn lookup_parent(&self, name: &str) -> Option<DeclId> {
        self.chain_lookup(self.cur_scope, name)
    }

    /// Looks a name up in the interface scopes recorded on the current
    /// scope, in declaration order.
    pub fn lookup_interface(&self, name: &str) -> Option<DeclId> {
        for interface in &self.scopes[self.cur_scope].interfaces {
            if let Some(scope) = self.scope_of_owner(interface) {
                if let Some(decl) = self.scopes[scope].get(name) {
                    return Some(decl);
                }
            }
        }
        None
    }

    /// Looks `field` up as a member of the class or interface named `base`,
    /// following the parent-class chain on a miss.
    pub fn lookup_field(&self, base: &str, field: &str) -> Option<DeclId> {
        let scope = self.scope_of_owner(base)?;
        if let Some(decl) = self.scopes[scope].get(field) {
            return Some(decl);
        }
        self.chain_lookup(scope, field)
    }

    /// The class declaration `this` refers to in the current context: the
    /// innermost active scope with an owner, resolved through global scope.
    pub fn lookup_this(&self) -> Option<DeclId> {
        for &scope in self.active.iter().rev() {
            if let Some(owner) = self.scopes[scope].owner.as_deref() {
                return self.scopes[0].get(owner);
            }
        }
        None
    }

    /// `st` debug dump, one line per non-empty scope.
    pub fn print(&self, ast: &Ast) {
        eprintln!();
        eprintln!("======== Symbol Table ========");
        for (i, scope) in self.scopes.iter().enumerate() {
            if scope.symbols.is_none()
                && scope.owner.is_none()
                && scope.parent.is_none()
                && scope.interfaces.is_empty()
            {
                continue;
            }
            let mut line = format!("|- Scope {}:", i);
            if let Some(owner) = &scope.owner {
                line.push_str(&format!(" (owner: {})", owner));
            }
            if let Some(parent) = &scope.parent {
                line.push_str(&format!(" (parent: {})", parent));
            }
            if !scope.interfaces.is_empty() {
                line.push_str(&format!(" (interface: {})", scope.interfaces.join(" ")));
            }
            eprintln!("{}", line);
            if let Some(symbols) = &scope.symbols {
                let mut names: Vec<&String> = symbols.keys().collect();
                names.sort();
                for name in names {
                    let decl = symbols[name];
                    eprintln!("|  + {} {{{:?}}}", name, ast.decl(decl).idx);
                }
            }
        }
        eprintln!("======== Symbol Table ========");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(n: usize) -> DeclId {
        DeclId(n)
    }

    #[test]
    fn builds_and_replays_scopes() {
        // class A { int f() { { } } }
        let mut st = SymbolTable::new(false);
        st.insert("A", decl(0));
        st.build_scope_owned("A"); // scope 1
        st.insert("f", decl(1));
        st.build_scope(); // scope 2, formals + body
        st.build_scope(); // scope 3, block
        st.exit_scope();
        st.exit_scope();
        st.exit_scope();

        // a later pass re-enters the same indices in the same order
        st.reset();
        assert_eq!(st.lookup("A"), Some(decl(0)));
        st.enter_scope();
        assert_eq!(st.cur_scope, 1);
        assert_eq!(st.local_lookup("f"), Some(decl(1)));
        st.enter_scope();
        assert_eq!(st.cur_scope, 2);
        st.enter_scope();
        assert_eq!(st.cur_scope, 3);
        assert_eq!(st.lookup("f"), Some(decl(1)));
        st.exit_scope();
        st.exit_scope();
        st.exit_scope();
        assert_eq!(st.cur_scope, 0);
    }

    #[test]
    fn shadowing_and_scope_exit() {
        let mut st = SymbolTable::new(false);
        st.insert("x", decl(0));
        st.build_scope();
        assert_eq!(st.local_lookup("x"), None);
        assert_eq!(st.lookup("x"), Some(decl(0)));
        st.insert("x", decl(1));
        assert_eq!(st.lookup("x"), Some(decl(1)));
        st.exit_scope();
        assert_eq!(st.lookup("x"), Some(decl(0)));
    }

    #[test]
    fn parent_chain_lookup() {
        // class A { int a; }  class B extends A { }
        let mut st = SymbolTable::new(false);
        st.insert("A", decl(0));
        st.insert("B", decl(1));
        st.build_scope_owned("A");
        st.insert("a", decl(2));
        st.exit_scope();
        st.build_scope_owned("B");
        st.set_parent("A");
        // inside B's scope, members of A are visible
        assert_eq!(st.lookup("a"), Some(decl(2)));
        assert_eq!(st.lookup_parent("a"), Some(decl(2)));
        assert_eq!(st.local_lookup("a"), None);
        st.exit_scope();
        // field lookup follows the same chain from outside
        assert_eq!(st.lookup_field("B", "a"), Some(decl(2)));
        assert_eq!(st.lookup_field("A", "a"), Some(decl(2)));
        assert_eq!(st.lookup_field("C", "a"), None);
    }

    #[test]
    fn parent_cycle_is_guarded() {
        // class A extends B { }  class B extends A { }
        let mut st = SymbolTable::new(false);
        st.insert("A", decl(0));
        st.insert("B", decl(1));
        st.build_scope_owned("A");
        st.set_parent("B");
        st.exit_scope();
        st.build_scope_owned("B");
        st.set_parent("A");
        assert_eq!(st.lookup_parent("nope"), None);
        st.exit_scope();
        assert_eq!(st.lookup_field("A", "nope"), None);
    }

    #[test]
    fn interface_lookup_in_declaration_order() {
        let mut st = SymbolTable::new(false);
        st.insert("I", decl(0));
        st.insert("J", decl(1));
        st.insert("C", decl(2));
        st.build_scope_owned("I");
        st.insert("m", decl(3));
        st.exit_scope();
        st.build_scope_owned("J");
        st.insert("m", decl(4));
        st.exit_scope();
        st.build_scope_owned("C");
        st.add_interface("I");
        st.add_interface("J");
        assert_eq!(st.lookup_interface("m"), Some(decl(3)));
        assert_eq!(st.lookup_interface("absent"), None);
        st.exit_scope();
    }

    #[test]
    fn this_resolves_to_innermost_owner() {
        let mut st = SymbolTable::new(false);
        st.insert("A", decl(0));
        assert_eq!(st.lookup_this(), None);
        st.build_scope_owned("A");
        st.build_scope(); // method body
        assert_eq!(st.lookup_this(), Some(decl(0)));
        st.exit_scope();
        st.exit_scope();
        assert_eq!(st.lookup_this(), None);
    }
}
