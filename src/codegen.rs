//! Per-type routine builder
//!
//! A [`Codegen`] accumulates the listing of a specialized routine one line at
//! a time and, once complete, links it into a live closure over an explicit
//! captured scope with [`Codegen::eof`]. The closure itself is assembled by
//! the caller-supplied `link` function from pre-selected building blocks; the
//! listing is a faithful, readable rendering of the same plan, which can be
//! surfaced through `tracing` by enabling [verbose](set_verbose) mode.
//!
//! # Indentation
//!
//! Lines are indented automatically from the shape of the previous line:
//!   * after a line ending in `{` or `[`, indentation increases and stays
//!     increased until a line starting with `}` or `]`
//!   * after an unbraced `if`, `else if`, `while`, `for` or trailing `else`,
//!     exactly the next line is indented once more
//!   * after a case label (a line ending in `:`), indentation increases until
//!     a `break`, `continue` or `return` line
//!
//! # Availability
//!
//! Synthesis can be compiled out by disabling the `codegen` feature, in
//! which case [`supported`] reports `false` and every codec runs through its
//! reflective implementation.

use std::fmt::{Arguments, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Routes every listing to a `debug` event on target `protium::codegen`
/// before it is linked. Has no effect on the linked closures.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

#[must_use]
pub fn verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

lazy_static! {
    static ref SUPPORTED: bool = probe();
}

/// Whether synthesized routines are available in this build.
///
/// Computed once, by building and running a trivial routine.
#[must_use]
pub fn supported() -> bool {
    *SUPPORTED
}

fn probe() -> bool {
    cfg_if::cfg_if! {
        if #[cfg(feature = "codegen")] {
            let mut gen = Codegen::new(["a", "b"]);
            gen.line(format_args!("return a - b"));
            let sub = gen.eof("probe", (), |()| |a: i64, b: i64| a - b);
            sub(2, 1) == 1
        } else {
            false
        }
    }
}

/// Appends a formatted line to a [`Codegen`].
///
/// `gen!(cg, "if (m.has({}))", id)` is shorthand for
/// `cg.line(format_args!("if (m.has({}))", id))`.
#[macro_export]
macro_rules! gen {
    ($cg:expr, $($arg:tt)*) => {
        $cg.line(::std::format_args!($($arg)*))
    };
}

/// Textual routine builder with automatic indentation
#[derive(Clone, Debug)]
pub struct Codegen {
    params: Vec<String>,
    src: Vec<String>,
    indent: usize,
    in_case: bool,
}

impl Codegen {
    /// Starts a routine taking the named parameters.
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            src: Vec::new(),
            indent: 1,
            in_case: false,
        }
    }

    /// Appends one logical line, indented from the shape of the previous one.
    pub fn line(&mut self, args: Arguments<'_>) -> &mut Self {
        let mut line = String::new();
        let _ = line.write_fmt(args);
        let mut level = self.indent;
        if let Some(prev) = self.src.last() {
            if opens_block(prev) {
                self.indent += 1;
                level = self.indent;
            } else if is_branch(prev) {
                level += 1;
            }

            if is_case_label(prev) && !is_case_label(&line) {
                self.indent += 1;
                level = self.indent;
                self.in_case = true;
            } else if self.in_case && is_break(prev) {
                self.indent -= 1;
                level = self.indent;
                self.in_case = false;
            }

            if closes_block(&line) {
                self.indent = self.indent.saturating_sub(1);
                level = self.indent;
                if self.in_case {
                    self.indent = self.indent.saturating_sub(1);
                    level = self.indent;
                    self.in_case = false;
                }
            }
        }
        let mut indented = "\t".repeat(level);
        indented.push_str(&line);
        self.src.push(indented);
        self
    }

    /// Number of lines appended so far
    #[must_use]
    pub fn lines(&self) -> usize {
        self.src.len()
    }

    /// Renders the routine so far, tab-indented, under a sanitized `name`.
    #[must_use]
    pub fn str(&self, name: &str) -> String {
        let name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let mut out = format!("fn {}({}) {{\n", name, self.params.join(", "));
        for line in self.src.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out.push('}');
        out
    }

    /// Finishes the routine: emits the listing if verbose, then links it by
    /// handing `scope` to `link` and returning the result.
    pub fn eof<S, F, R>(&self, name: &str, scope: S, link: F) -> R
    where
        F: FnOnce(S) -> R,
    {
        if verbose() {
            let listing = self
                .str(name)
                .lines()
                .map(|l| format!("> {}", l.replace('\t', "  ")))
                .collect::<Vec<_>>()
                .join("\n");
            tracing::debug!(target: "protium::codegen", routine = name, "--- codegen ---\n{}", listing);
        }
        link(scope)
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn starts_with_word(s: &str, word: &str) -> bool {
    s.strip_prefix(word)
        .map_or(false, |rest| !rest.starts_with(is_word))
}

fn ends_with_word(s: &str, word: &str) -> bool {
    s.strip_suffix(word)
        .map_or(false, |rest| !rest.ends_with(is_word))
}

fn opens_block(line: &str) -> bool {
    line.ends_with('{') || line.ends_with('[')
}

fn closes_block(line: &str) -> bool {
    line.starts_with('}') || line.starts_with(']')
}

fn is_case_label(line: &str) -> bool {
    line.ends_with(':')
}

fn is_branch(line: &str) -> bool {
    let lead = line.trim_start();
    ["if", "else if", "while", "for"]
        .iter()
        .any(|kw| starts_with_word(lead, kw))
        || ends_with_word(line.trim_end(), "else")
}

fn is_break(line: &str) -> bool {
    let tail = line.strip_suffix(';').unwrap_or(line);
    ends_with_word(tail, "break")
        || ends_with_word(tail, "continue")
        || starts_with_word(line.trim_start(), "return")
}
