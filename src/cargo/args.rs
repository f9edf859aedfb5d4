//! `cargo install` argument handling
//!
//! User-supplied arguments arrive as one shell-quoted string. They are
//! tokenized once, stripped of the flags kiln owns (`--root`, `--color`),
//! and completed with a default `--path` when the user did not pick one.
//! [`Flag`] is the only place that decides whether a token is a given
//! flag, so filtering and "is it already set" checks always agree.

use crate::error::{KilnError, KilnResult};
use std::path::Path;

/// Stack id of the minimal run image, which needs statically linked binaries
pub const TINY_STACK_ID: &str = "io.paketo.stacks.tiny";

/// Target used on the tiny stack when the user did not choose one
pub const TINY_STACK_TARGET: &str = "x86_64-unknown-linux-musl";

/// A long flag that takes a value, either as `--flag value` or `--flag=value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag(&'static str);

impl Flag {
    /// Install root, owned by kiln
    pub const ROOT: Flag = Flag("--root");
    /// Output coloring, owned by kiln
    pub const COLOR: Flag = Flag("--color");
    /// Package location
    pub const PATH: Flag = Flag("--path");
    /// Compilation target triple
    pub const TARGET: Flag = Flag("--target");

    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Token is the flag alone, its value is the next token
    pub fn is_bare(&self, token: &str) -> bool {
        token == self.0
    }

    /// Token is the `--flag=value` form
    pub fn is_assigned(&self, token: &str) -> bool {
        token
            .strip_prefix(self.0)
            .is_some_and(|rest| rest.starts_with('='))
    }

    pub fn matches(&self, token: &str) -> bool {
        self.is_bare(token) || self.is_assigned(token)
    }

    /// Whether any token sets this flag
    pub fn is_set<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        tokens.iter().any(|t| self.matches(t.as_ref()))
    }

    /// `--flag=value`
    pub fn assign(&self, value: impl AsRef<str>) -> String {
        format!("{}={}", self.0, value.as_ref())
    }
}

/// Flags the user may not pass because kiln always appends its own
const OWNED_FLAGS: [Flag; 2] = [Flag::ROOT, Flag::COLOR];

/// Split a raw argument string using shell quoting rules
pub fn tokenize(raw: &str) -> KilnResult<Vec<String>> {
    shell_words::split(raw).map_err(|e| KilnError::ArgumentParse {
        input: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Remove kiln-owned flags (and their space-separated values) from `tokens`
pub fn strip_owned_flags(tokens: Vec<String>) -> Vec<String> {
    let mut filtered = Vec::with_capacity(tokens.len());
    let mut skip_next = false;

    for token in tokens {
        if skip_next {
            skip_next = false;
            continue;
        }
        if OWNED_FLAGS.iter().any(|f| f.is_bare(&token)) {
            skip_next = true;
            continue;
        }
        if OWNED_FLAGS.iter().any(|f| f.is_assigned(&token)) {
            continue;
        }
        filtered.push(token);
    }

    filtered
}

/// Tokenize user arguments and drop the flags kiln owns
pub fn filter_user_args(raw: &str) -> KilnResult<Vec<String>> {
    Ok(strip_owned_flags(tokenize(raw)?))
}

/// Append `--path=<default_path>` unless a `--path` is already present
pub fn add_default_path(mut args: Vec<String>, default_path: &str) -> Vec<String> {
    if !Flag::PATH.is_set(&args) {
        args.push(Flag::PATH.assign(default_path));
    }
    args
}

/// Append the musl target on the tiny stack unless a `--target` is present
pub fn add_default_target_for_stack(mut args: Vec<String>, stack: &str) -> Vec<String> {
    if stack == TINY_STACK_ID && !Flag::TARGET.is_set(&args) {
        args.push(Flag::TARGET.assign(TINY_STACK_TARGET));
    }
    args
}

/// Full `cargo install` argument vector for one invocation
pub fn build_install_args(
    raw: &str,
    output_root: &Path,
    default_path: &str,
) -> KilnResult<Vec<String>> {
    Ok(InstallArgs::parse(raw)?.build(output_root, default_path, ""))
}

/// Parsed, filtered user arguments for `cargo install`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallArgs {
    raw: String,
    tokens: Vec<String>,
}

impl InstallArgs {
    pub fn parse(raw: &str) -> KilnResult<Self> {
        Ok(Self {
            raw: raw.to_string(),
            tokens: filter_user_args(raw)?,
        })
    }

    /// The string as the user supplied it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// User tokens with kiln-owned flags removed
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Whether the user chose the package location explicitly
    pub fn is_path_set(&self) -> bool {
        Flag::PATH.is_set(&self.tokens)
    }

    /// `install` + user tokens + defaults + kiln-owned flags, in that order
    pub fn build(&self, output_root: &Path, default_path: &str, stack: &str) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        args.extend(self.tokens.iter().cloned());
        let mut args = add_default_path(args, default_path);
        args = add_default_target_for_stack(args, stack);
        args.push(Flag::COLOR.assign("never"));
        args.push(Flag::ROOT.assign(output_root.display().to_string()));
        args
    }
}
