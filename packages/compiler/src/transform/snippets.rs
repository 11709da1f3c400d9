//! Runtime Snippets
//!
//! Support routines referenced by generated code. They are written in the
//! source language and compiled by the same rules as user code, wrapped in
//! a module that stores each routine on the `_pj` container object.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snippet {
    pub name: &'static str,
    pub source: &'static str,
}

pub const IN: Snippet = Snippet {
    name: "_in",
    source: r#"def _in(left, right):
    from __globals__ import Array, typeof

    if isinstance(right, Array) or typeof(right) == 'string':
        return right.indexOf(left) > -1
    else:
        return left in right
"#,
};

pub const IN_ES6: Snippet = Snippet {
    name: "in_es6",
    source: r#"def in_es6(left, right):
    from __globals__ import Array, typeof, Map, Set, WeakMap, WeakSet

    if isinstance(right, Array) or typeof(right) == 'string':
        return right.indexOf(left) > -1
    elif isinstance(right, (Map, Set, WeakMap, WeakSet)):
        return right.has(left)
    else:
        return left in right
"#,
};

pub const SET_DECORATORS: Snippet = Snippet {
    name: "set_decorators",
    source: r#"def set_decorators(cls, props):
    from __globals__ import Function, Map, WeakMap, Object

    for p in dict(props):
        decos = props[p]
        def reducer(val, deco):
            return deco(val, cls, p)
        deco = decos.reduce(reducer, cls.prototype[p])
        if not isinstance(deco, (Function, Map, WeakMap)) and \
            isinstance(deco, Object) and (('value' in deco) or
                                          ('get' in deco)):
            del cls.prototype[p]
            Object.defineProperty(cls.prototype, p, deco)
        else:
            cls.prototype[p] = deco
"#,
};

pub const SET_CLASS_DECORATORS: Snippet = Snippet {
    name: "set_class_decorators",
    source: r#"def set_class_decorators(cls, decos):
    def reducer(val, deco):
        return deco(val, cls)
    return decos.reduce(reducer, cls)
"#,
};

pub const SET_PROPERTIES: Snippet = Snippet {
    name: "set_properties",
    source: r#"def set_properties(cls, props):
    from __globals__ import Function, Map, WeakMap, Object

    for p in dict(props):
        value = props[p]
        if not isinstance(value, (Map, WeakMap)) and isinstance(value, Object) \
           and 'get' in value and isinstance(value.get, Function):
            desc = value
        else:
            desc = {
                'value': value,
                'enumerable': False,
                'configurable': True,
                'writable': True
            }
        Object.defineProperty(cls.prototype, p, desc)
"#,
};

pub const ASSERT: Snippet = Snippet {
    name: "_assert",
    source: r#"def _assert(comp, msg):
    from __globals__ import Error, Object, typeof

    def PJAssertionError(self, message):
        self.name = 'PJAssertionError'
        self.message = message or 'Custom error PJAssertionError'
        if typeof(Error.captureStackTrace) == 'function':
            Error.captureStackTrace(self, self.constructor)
        else:
            self.stack = Error(message).stack

    PJAssertionError.prototype = Object.create(Error.prototype)
    PJAssertionError.prototype.constructor = PJAssertionError

    msg = msg or 'Assertion failed.'
    if not comp:
        raise PJAssertionError(msg)
"#,
};

const SNIPPETS_TEMPLATE: &str = "def _pj_snippets(container):\n{snippets}\n{assignments}\n    return container\n\n_pj = {}\n_pj_snippets(_pj)\n";

/// Render the wrapper module for `snippets`, in name order.
pub fn render(snippets: &BTreeMap<&'static str, Snippet>) -> String {
    let sources: Vec<&str> = snippets.values().map(|s| s.source.trim_end()).collect();
    let body = indent(&sources.join("\n"), "    ");
    let assignments: Vec<String> = snippets
        .keys()
        .map(|name| format!("    container['{}'] = {}", name, name))
        .collect();
    SNIPPETS_TEMPLATE
        .replace("{snippets}", &body)
        .replace("{assignments}", &assignments.join("\n"))
}

/// Prefix every non-blank line with `prefix`.
fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_snippets_sorted_by_name() {
        let mut snippets = BTreeMap::new();
        snippets.insert(SET_PROPERTIES.name, SET_PROPERTIES);
        snippets.insert(IN.name, IN);
        let src = render(&snippets);
        assert!(src.starts_with("def _pj_snippets(container):\n    def _in(left, right):\n"));
        let first = src.find("container['_in'] = _in").unwrap();
        let second = src.find("container['set_properties'] = set_properties").unwrap();
        assert!(first < second);
        assert!(src.ends_with("    return container\n\n_pj = {}\n_pj_snippets(_pj)\n"));
    }
}
