//! `System.register` envelope rendering
//!
//! The envelope is described by a small intermediate representation and turned
//! into text by [`Envelope::prologue`] and [`Envelope::epilogue`]. The emitted
//! chunk is `prologue + chunk + epilogue`:
//!
//! ```text
//! System.register('app', ["react"], function($__export) {
//!   var reactVar;
//!   function $__register__main__exports(exports) { ... }
//!   function $__wsr__interop(m) { ... }
//!   return {
//!     setters: [ function(m) { reactVar = $__wsr__interop(m); } ],
//!     execute: function() {
//!       <chunk>
//!     }
//!   };
//! });
//! ```
//!
//! The loader calls setter `i` whenever dependency `i` resolves, in whatever
//! order that happens, so the dependency array and the setter array are always
//! built from the same list.

use std::borrow::Cow;

use cow_utils::CowUtils;

use crate::stub::ExternalModuleBinding;

/// The loader's registration function
pub const REGISTER_CALL: &str = "System.register";
/// Parameter through which the loader passes its export function
pub const EXPORT_FN: &str = "$__export";
/// Helper that forwards an `exports` object to [`EXPORT_FN`]
pub const EXPORTS_HELPER: &str = "$__register__main__exports";
/// Helper applying the default-export interop rule
pub const INTEROP_HELPER: &str = "$__wsr__interop";
/// Variable holding the public path negotiated with the loader
pub const PUBLIC_PATH_VAR: &str = "$__wsr__public_path";

/// One external dependency as the envelope sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub request: String,
    pub local: String,
}

impl From<&ExternalModuleBinding> for Dependency {
    fn from(binding: &ExternalModuleBinding) -> Self {
        Self {
            request: binding.request.clone(),
            local: binding.local_name(),
        }
    }
}

/// Everything needed to render one envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub register_name: Option<String>,
    /// Declaration order; setters are rendered in the same order
    pub dependencies: Vec<Dependency>,
    /// Pass incoming namespaces through the interop helper
    pub interop: bool,
    /// Derive the public path from the loader's load record
    pub public_path: bool,
    /// Strip line breaks from prologue and epilogue
    pub minify: bool,
}

impl Envelope {
    pub fn new<'a>(bindings: impl IntoIterator<Item = &'a ExternalModuleBinding>) -> Self {
        Self {
            dependencies: bindings.into_iter().map(Dependency::from).collect(),
            interop: true,
            ..Self::default()
        }
    }

    /// Dependency array literal, e.g. `["react","react-dom"]`
    ///
    /// Built element by element, so the array always has exactly one entry per
    /// dependency and lines up with the setters.
    pub fn dependency_array(&self) -> String {
        let requests: Vec<String> = self
            .dependencies
            .iter()
            .map(|dep| json_string(&dep.request))
            .collect();
        format!("[{}]", requests.join(","))
    }

    fn register_call(&self) -> String {
        let name = self
            .register_name
            .as_deref()
            .map(|name| format!("'{name}', "))
            .unwrap_or_default();
        format!(
            "{REGISTER_CALL}({name}{}, function({EXPORT_FN}) {{",
            self.dependency_array()
        )
    }

    fn setter(&self, dep: &Dependency) -> String {
        let value = if self.interop {
            Cow::Owned(format!("{INTEROP_HELPER}(m)"))
        } else {
            Cow::Borrowed("m")
        };
        format!(
            "      function(m) {{\n        {} = {value};\n      }}",
            dep.local
        )
    }

    fn public_path_block(&self, out: &mut String) {
        let name = self.register_name.as_deref().unwrap_or_default();
        out.push_str(&format!("  var {PUBLIC_PATH_VAR} = (function() {{\n"));
        out.push_str(&format!("    var name = System.normalizeSync('{name}');\n"));
        out.push_str("    var loads = System._loader.loads;\n");
        out.push_str("    for (var i = 0; i < loads.length; i++) {\n");
        out.push_str("      if (loads[i].name === name) {\n");
        out.push_str("        var address = loads[i].address;\n");
        out.push_str("        return address.substring(0, address.lastIndexOf('/') + 1);\n");
        out.push_str("      }\n");
        out.push_str("    }\n");
        out.push_str(&format!(
            "    throw new Error(\"sysreg: SystemJS has no load record for '{name}', cannot \
             determine the public path\");\n"
        ));
        out.push_str("  })();\n\n");
    }

    /// Text placed before the chunk
    pub fn prologue(&self) -> String {
        let mut out = self.register_call();
        out.push('\n');

        if !self.dependencies.is_empty() {
            let locals: Vec<&str> = self.dependencies.iter().map(|d| d.local.as_str()).collect();
            out.push_str(&format!("  var {};\n", locals.join(", ")));
        }
        out.push('\n');

        out.push_str(&format!("  function {EXPORTS_HELPER}(exports) {{\n"));
        out.push_str("    for (var exportName in exports) {\n");
        out.push_str(&format!("      {EXPORT_FN}(exportName, exports[exportName]);\n"));
        out.push_str("    }\n");
        out.push_str("  }\n\n");

        if self.interop {
            out.push_str(&format!("  function {INTEROP_HELPER}(m) {{\n"));
            out.push_str("    return m && m.__useDefault ? m.default : m;\n");
            out.push_str("  }\n\n");
        }

        if self.public_path {
            self.public_path_block(&mut out);
        }

        out.push_str("  return {\n");
        if self.dependencies.is_empty() {
            out.push_str("    setters: [],\n");
        } else {
            let setters: Vec<String> = self.dependencies.iter().map(|d| self.setter(d)).collect();
            out.push_str("    setters: [\n");
            out.push_str(&setters.join(",\n"));
            out.push_str("\n    ],\n");
        }
        out.push_str("    execute: function() {\n");

        self.finish(out)
    }

    /// Text placed after the chunk
    pub fn epilogue(&self) -> String {
        self.finish("\n    }\n  };\n});\n".to_owned())
    }

    /// Wrap `chunk` in prologue and epilogue
    ///
    /// A minified epilogue has no leading line break, so a chunk whose last
    /// line is an unterminated `//` comment (a `sourceMappingURL` trailer, say)
    /// gets one `\n` appended first. Otherwise the epilogue would be commented out.
    pub fn wrap(&self, chunk: &str) -> String {
        let prologue = self.prologue();
        let epilogue = self.epilogue();
        let mut out = String::with_capacity(prologue.len() + chunk.len() + epilogue.len() + 1);
        out.push_str(&prologue);
        out.push_str(chunk);
        if self.minify && !ends_with_line_terminator(chunk) {
            out.push('\n');
        }
        out.push_str(&epilogue);
        out
    }

    fn finish(&self, text: String) -> String {
        if self.minify {
            strip_line_breaks(&text).into_owned()
        } else {
            text
        }
    }
}

/// Quote `text` as a JSON (and therefore JavaScript) string literal
fn json_string(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

/// JavaScript line terminators: LF, CR, LINE SEPARATOR, PARAGRAPH SEPARATOR
fn ends_with_line_terminator(chunk: &str) -> bool {
    chunk.is_empty() || chunk.ends_with(['\n', '\r', '\u{2028}', '\u{2029}'])
}

/// Remove every `\n` and `\r`
pub fn strip_line_breaks(text: &str) -> Cow<'_, str> {
    let without_lf = text.cow_replace('\n', "");
    if without_lf.contains('\r') {
        Cow::Owned(without_lf.cow_replace('\r', "").into_owned())
    } else {
        without_lf
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn dep(request: &str, local: &str) -> Dependency {
        Dependency {
            request: request.to_owned(),
            local: local.to_owned(),
        }
    }

    fn react_app() -> Envelope {
        Envelope {
            register_name: Some("app".to_owned()),
            dependencies: vec![dep("react", "reactVar")],
            interop: true,
            ..Envelope::default()
        }
    }

    #[test]
    fn test_prologue_starts_with_register_call() {
        let prologue = react_app().prologue();
        assert!(
            prologue.starts_with("System.register('app', [\"react\"], function($__export) {"),
            "{prologue}"
        );
    }

    #[test]
    fn test_single_setter_assigns_through_interop() {
        let prologue = react_app().prologue();
        assert_eq!(prologue.matches("function(m)").count(), 1);
        assert!(prologue.contains("reactVar = $__wsr__interop(m);"));
    }

    #[test]
    fn test_unnamed_registration() {
        let envelope = Envelope {
            dependencies: vec![dep("a", "aVar"), dep("b/c", "bCVar")],
            ..Envelope::default()
        };
        assert!(
            envelope
                .prologue()
                .starts_with("System.register([\"a\",\"b/c\"], function($__export) {")
        );
    }

    #[test]
    fn test_setters_follow_dependency_order() {
        let envelope = Envelope {
            dependencies: vec![dep("z", "zVar"), dep("a", "aVar"), dep("m", "mVar")],
            interop: true,
            ..Envelope::default()
        };
        let prologue = envelope.prologue();
        let positions: Vec<usize> = ["zVar = ", "aVar = ", "mVar = "]
            .iter()
            .map(|needle| prologue.find(needle).expect("setter present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(prologue.matches("function(m)").count(), 3);
        assert!(prologue.contains("var zVar, aVar, mVar;"));
    }

    #[test]
    fn test_no_dependencies() {
        let envelope = Envelope {
            interop: true,
            ..Envelope::default()
        };
        let prologue = envelope.prologue();
        assert!(prologue.starts_with("System.register([], function($__export) {"));
        assert!(prologue.contains("setters: [],"));
        assert!(!prologue.contains("var ;"));
    }

    #[test]
    fn test_without_interop_setters_assign_directly() {
        let envelope = Envelope {
            dependencies: vec![dep("react", "reactVar")],
            interop: false,
            ..Envelope::default()
        };
        let prologue = envelope.prologue();
        assert!(prologue.contains("reactVar = m;"));
        assert!(!prologue.contains(INTEROP_HELPER));
    }

    #[test]
    fn test_dependency_requests_are_escaped() {
        let envelope = Envelope {
            dependencies: vec![dep("we\"ird", "weIrdVar")],
            ..Envelope::default()
        };
        assert_eq!(envelope.dependency_array(), r#"["we\"ird"]"#);
    }

    #[test]
    fn test_public_path_block() {
        let envelope = Envelope {
            public_path: true,
            ..react_app()
        };
        let prologue = envelope.prologue();
        assert!(prologue.contains("System.normalizeSync('app')"));
        assert!(prologue.contains("throw new Error("));
        let block = prologue.find(PUBLIC_PATH_VAR).expect("block");
        let execute = prologue.find("execute: function()").expect("execute");
        assert!(block < execute);
    }

    #[test]
    fn test_minify_strips_line_breaks() {
        let envelope = Envelope {
            minify: true,
            public_path: true,
            ..react_app()
        };
        let prologue = envelope.prologue();
        let epilogue = envelope.epilogue();
        assert!(!prologue.contains('\n') && !prologue.contains('\r'));
        assert!(!epilogue.contains('\n'));
        assert_eq!(epilogue, "    }  };});");
    }

    #[test]
    fn test_wrap_keeps_chunk_verbatim() {
        let chunk = "line one\nline two\n";
        let wrapped = react_app().wrap(chunk);
        assert!(wrapped.contains(chunk));
        assert!(wrapped.ends_with("\n    }\n  };\n});\n"));
    }

    #[test]
    fn test_minified_wrap_terminates_trailing_line_comment() {
        let envelope = Envelope {
            minify: true,
            ..react_app()
        };
        let chunk = "var x = 1;\n//# sourceMappingURL=main.js.map";
        let wrapped = envelope.wrap(chunk);
        assert!(wrapped.ends_with("//# sourceMappingURL=main.js.map\n    }  };});"));

        let terminated = envelope.wrap("var x = 1;\n");
        assert!(terminated.ends_with("var x = 1;\n    }  };});"));
    }

    #[test]
    fn test_unminified_wrap_adds_no_separator() {
        let wrapped = react_app().wrap("run(); // done");
        assert!(wrapped.ends_with("run(); // done\n    }\n  };\n});\n"));
    }

    #[test]
    fn test_strip_line_breaks_borrows_when_clean() {
        assert!(matches!(strip_line_breaks("clean"), Cow::Borrowed("clean")));
        assert_eq!(strip_line_breaks("a\r\nb\n"), "ab");
    }
}
