//! `@import path` directives.
//!
//! A paragraph consisting only of import lines is replaced by the blocks of
//! the imported documents. Imported frontmatter is merged into the document
//! metadata (document values win). Nested imports resolve relative to the
//! importing file.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{Context, IMPORTS, Transform};
use crate::error::{ImportChain, PipelineError};
use crate::frontmatter;
use crate::markdown::parse_markdown;
use crate::tree::{Node, NodeKind};

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^@import\s+["'\[]?([^"'\]]+?)["'\]]?\s*$"#).expect("invalid import regex")
});

/// Expands `@import` directives.
#[derive(Debug, Default)]
pub struct Imports;

impl Transform for Imports {
    fn name(&self) -> &'static str {
        IMPORTS
    }

    fn run(&self, root: &mut Node, ctx: &mut Context<'_>) -> Result<(), PipelineError> {
        let base_dir = ctx.options.base_dir.clone();
        let mut run = ImportRun {
            stack: ctx
                .options
                .source_path
                .iter()
                .map(|p| normalize(&base_dir.join(p)))
                .collect(),
            ctx,
            cycle: None,
            imported: 0,
        };
        let blocks = std::mem::take(&mut root.children);
        root.children = run.expand(blocks, &base_dir, 1)?;
        tracing::debug!(files = run.imported, "Expanded imports");
        if run.imported > 0 {
            run.ctx.refresh_env();
        }

        if let Some(chain) = run.cycle {
            return Err(PipelineError::CircularImport {
                chain: ImportChain(chain),
            });
        }
        Ok(())
    }
}

struct ImportRun<'c, 'o> {
    ctx: &'c mut Context<'o>,
    /// Files currently being expanded, outermost first.
    stack: Vec<PathBuf>,
    /// First cycle found.
    cycle: Option<Vec<PathBuf>>,
    imported: usize,
}

impl ImportRun<'_, '_> {
    fn expand(
        &mut self,
        blocks: Vec<Node>,
        dir: &Path,
        depth: usize,
    ) -> Result<Vec<Node>, PipelineError> {
        let mut out = Vec::with_capacity(blocks.len());
        for mut node in blocks {
            if let Some(targets) = directives(&node) {
                let mut spliced = Vec::new();
                let mut kept = false;
                for target in targets {
                    match self.import(&target, dir, depth)? {
                        Some(blocks) => spliced.extend(blocks),
                        None => kept = true,
                    }
                }
                if kept {
                    // Any directive that could not be expanded keeps the
                    // whole paragraph as written.
                    out.extend(spliced);
                    out.push(node);
                } else {
                    out.extend(spliced);
                }
                continue;
            }
            if node.is_block_container() && !node.has_inline_children() {
                let children = std::mem::take(&mut node.children);
                node.children = self.expand(children, dir, depth)?;
            }
            out.push(node);
        }
        Ok(out)
    }

    /// Import one file. `None` leaves the directive in place.
    fn import(
        &mut self,
        target: &str,
        dir: &Path,
        depth: usize,
    ) -> Result<Option<Vec<Node>>, PipelineError> {
        let limit = self.ctx.options.max_import_depth;
        if depth > limit {
            return Err(PipelineError::ImportDepthExceeded { depth, limit });
        }
        self.ctx.check_deadline()?;

        let path = normalize(&dir.join(target));
        if self.stack.contains(&path) {
            let mut chain = self.stack.clone();
            chain.push(path.clone());
            tracing::warn!(path = %path.display(), "Circular import left unexpanded");
            self.cycle.get_or_insert(chain);
            return Ok(None);
        }

        let content = match self.ctx.options.read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Imported file not found");
                return Ok(None);
            }
            Err(source) => return Err(PipelineError::Import { path, source }),
        };

        let (imported, body) = frontmatter::parse(&content)?;
        let report = self.ctx.metadata.merge_imported(imported);
        for key in &report.conflicts {
            tracing::warn!(path = %path.display(), key = %key, "Imported key already set, keeping document value");
        }
        for key in &report.skipped {
            tracing::warn!(path = %path.display(), key = %key, "Reserved key not imported");
        }
        self.imported += 1;

        let blocks = parse_markdown(body).children;
        let nested_dir = path.parent().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
        self.stack.push(path);
        let result = self.expand(blocks, &nested_dir, depth + 1);
        self.stack.pop();
        result.map(Some)
    }
}

/// Import targets of a paragraph made only of `@import` lines.
fn directives(node: &Node) -> Option<Vec<String>> {
    if !matches!(node.kind, NodeKind::Paragraph) {
        return None;
    }
    let mut targets = Vec::new();
    for child in &node.children {
        match &child.kind {
            NodeKind::Text(line) => {
                let caps = DIRECTIVE.captures(line.trim())?;
                targets.push(caps[1].trim().to_owned());
            }
            NodeKind::SoftBreak | NodeKind::HardBreak => {}
            _ => return None,
        }
    }
    (!targets.is_empty()).then_some(targets)
}

/// Lexically normalize `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::Locale;
    use crate::metadata::Metadata;
    use crate::pipeline::ProcessingOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::time::Duration;

    fn in_memory(files: &[(&str, &str)]) -> ProcessingOptions {
        let files: HashMap<PathBuf, String> = files
            .iter()
            .map(|(p, c)| (PathBuf::from(p), (*c).to_owned()))
            .collect();
        ProcessingOptions::new()
            .with_base_dir("/docs")
            .with_read_file(move |path| {
                files
                    .get(path)
                    .cloned()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
            })
    }

    fn texts(root: &Node) -> Vec<String> {
        root.children.iter().map(Node::plain_text).collect()
    }

    #[test]
    fn test_import_splices_blocks_and_merges_metadata() {
        let options = in_memory(&[(
            "/docs/parts/terms.md",
            "---\nterm: 12 months\ntitle: Other\nlevel-one: \"Chapter %n\"\n---\nTerms one\n\nTerms two\n",
        )]);
        let mut root = parse_markdown("Intro\n\n@import parts/terms.md\n\nOutro\n");
        let mut ctx = Context::new(Metadata::from_value(json!({ "title": "Main" })), &options);
        Imports.run(&mut root, &mut ctx).unwrap();

        assert_eq!(texts(&root), vec!["Intro", "Terms one", "Terms two", "Outro"]);
        assert_eq!(ctx.metadata.get("term"), Some(&json!("12 months")));
        assert_eq!(ctx.metadata.get("title"), Some(&json!("Main")));
        assert!(!ctx.metadata.contains_key("level-one"));
    }

    #[test]
    fn test_imported_locale_and_today_apply() {
        let options = in_memory(&[(
            "/docs/settings.md",
            "---\nlocale: fr\ntoday: 2024-03-01\n---\nSettings\n",
        )]);
        let mut root = parse_markdown("@import settings.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        assert_eq!(ctx.env.locale, Locale::En);
        Imports.run(&mut root, &mut ctx).unwrap();
        assert_eq!(ctx.env.locale, Locale::Fr);
        assert_eq!(ctx.env.today, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_nested_imports_resolve_relative() {
        let options = in_memory(&[
            ("/docs/a/one.md", "One\n\n@import ../b/two.md\n"),
            ("/docs/b/two.md", "Two\n"),
        ]);
        let mut root = parse_markdown("@import a/one.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        Imports.run(&mut root, &mut ctx).unwrap();
        assert_eq!(texts(&root), vec!["One", "Two"]);
    }

    #[test]
    fn test_missing_file_left_literal() {
        let options = in_memory(&[]);
        let mut root = parse_markdown("@import nowhere.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        Imports.run(&mut root, &mut ctx).unwrap();
        assert_eq!(texts(&root), vec!["@import nowhere.md"]);
    }

    #[test]
    fn test_circular_import_fails_and_keeps_directive() {
        let options = in_memory(&[
            ("/docs/a.md", "From A\n\n@import b.md\n"),
            ("/docs/b.md", "From B\n\n@import a.md\n"),
        ])
        .with_source_path("a.md");
        let mut root = parse_markdown("From A\n\n@import b.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        let err = Imports.run(&mut root, &mut ctx).unwrap_err();

        match err {
            PipelineError::CircularImport { chain } => assert_eq!(
                chain.to_string(),
                "/docs/a.md -> /docs/b.md -> /docs/a.md"
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(texts(&root), vec!["From A", "From B", "@import a.md"]);
    }

    #[test]
    fn test_self_import_without_source_path_terminates() {
        let options = in_memory(&[("/docs/loop.md", "@import loop.md\n")]);
        let mut root = parse_markdown("@import loop.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        assert!(matches!(
            Imports.run(&mut root, &mut ctx),
            Err(PipelineError::CircularImport { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let options = in_memory(&[
            ("/docs/1.md", "@import 2.md\n"),
            ("/docs/2.md", "@import 3.md\n"),
            ("/docs/3.md", "deep\n"),
        ])
        .with_max_import_depth(2);
        let mut root = parse_markdown("@import 1.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        assert!(matches!(
            Imports.run(&mut root, &mut ctx),
            Err(PipelineError::ImportDepthExceeded { depth: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_timeout() {
        let options = in_memory(&[("/docs/x.md", "x\n")]).with_import_timeout(Duration::ZERO);
        let mut root = parse_markdown("@import x.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            Imports.run(&mut root, &mut ctx),
            Err(PipelineError::Timeout { .. })
        ));
    }

    #[test]
    fn test_io_error_propagates() {
        let options = ProcessingOptions::new().with_read_file(|_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        });
        let mut root = parse_markdown("@import secret.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        assert!(matches!(
            Imports.run(&mut root, &mut ctx),
            Err(PipelineError::Import { .. })
        ));
    }

    #[test]
    fn test_filesystem_import() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clause.md"), "---\nparty: Acme\n---\nClause text\n").unwrap();
        let options = ProcessingOptions::new().with_base_dir(dir.path());
        let mut root = parse_markdown("@import clause.md\n");
        let mut ctx = Context::new(Metadata::new(), &options);
        Imports.run(&mut root, &mut ctx).unwrap();
        assert_eq!(texts(&root), vec!["Clause text"]);
        assert_eq!(ctx.metadata.get("party"), Some(&json!("Acme")));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c.md")), PathBuf::from("/a/c.md"));
    }
}
