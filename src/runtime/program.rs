//! Kernel program source.
//!
//! The program is a single text unit of CUDA C containing every entry point
//! the runtime launches. It is either read from a configured path or taken
//! from the copy embedded at build time.

use std::path::Path;

use crate::error::{ComputeError, Result};

const EMBEDDED_SOURCE: &str = include_str!("../../kernels/kernels.cu");

/// Source text of the kernel program plus where it came from.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    origin: String,
    text: String,
}

impl ProgramSource {
    /// The program shipped with the crate.
    pub fn embedded() -> Self {
        Self {
            origin: "<embedded kernels.cu>".to_string(),
            text: EMBEDDED_SOURCE.to_string(),
        }
    }

    /// Read the program from `path`. A missing or unreadable file is a hard error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ComputeError::ProgramLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            origin: path.display().to_string(),
            text,
        })
    }

    pub fn from_text(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Names of all `__global__ void name(...)` entry points, in source order.
    /// Declarations inside `//` and `/* */` comments are ignored.
    pub fn entry_points(&self) -> Vec<String> {
        let code = strip_comments(&self.text);
        let mut names = Vec::new();
        let mut rest = code.as_str();
        while let Some(pos) = rest.find("__global__") {
            rest = &rest[pos + "__global__".len()..];
            let Some(after_void) = rest.trim_start().strip_prefix("void") else {
                continue;
            };
            let name: String = after_void
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                names.push(name);
            }
        }
        names
    }
}

/// Replace comments with a single space, leaving string literals intact.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::names;

    #[test]
    fn test_entry_points_parsed() {
        let src = ProgramSource::from_text(
            "test",
            r#"
            extern "C" __global__ void vadd(const float* a, int n) {}
            __device__ float helper(float x) { return x; }
            extern "C" __global__   void
                vsum_final(const float* p) {}
            "#,
        );
        assert_eq!(src.entry_points(), vec!["vadd", "vsum_final"]);
    }

    #[test]
    fn test_embedded_declares_every_kernel() {
        let declared = ProgramSource::embedded().entry_points();
        for name in names::ALL {
            assert!(declared.iter().any(|d| d == name), "missing entry point {name}");
        }
    }

    #[test]
    fn test_missing_path_is_error() {
        let result = ProgramSource::load(Path::new("/nonexistent/kernels.cu"));
        assert!(matches!(result, Err(ComputeError::ProgramLoad { .. })));
    }

    #[test]
    fn test_commented_kernels_ignored() {
        let src = ProgramSource::from_text(
            "test",
            r#"
            // extern "C" __global__ void old_add(const float* a, int n) {}
            /* __global__ void disabled(int n) {}
               __global__ void also_disabled(int n) {} */
            extern "C" __global__ void vadd(const float* a, int n) {} // __global__ void trailing()
            const char* note = "/* not a comment */";
            __global__ void vsub(const float* a, int n) {}
            "#,
        );
        assert_eq!(src.entry_points(), vec!["vadd", "vsub"]);
    }
}
