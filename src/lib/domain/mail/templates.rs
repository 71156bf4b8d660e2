//! Template store
//!
//! Templates live as flat files in a single directory. `welcome.txt` and
//! `welcome.html` both register under the name `welcome`, as its text and
//! HTML variants. When a base template name is given, the matching
//! `<base>.txt`/`<base>.html` file is compiled together with every template of
//! the same extension, so templates can `{% extends %}` it.

use std::{
    collections::HashMap,
    ffi::OsStr,
    fmt, fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tera::{Context, Tera};
use tracing::debug;

use super::errors::TemplateParseError;

const EXT_TEXT: &str = "txt";
const EXT_HTML: &str = "html";

/// The kind of content a template produces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    /// `text/plain` content
    Text,

    /// `text/html` content
    Html,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Html => f.write_str("html"),
        }
    }
}

impl ContentKind {
    fn extension(self) -> &'static str {
        match self {
            Self::Text => EXT_TEXT,
            Self::Html => EXT_HTML,
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str)? {
            EXT_TEXT => Some(Self::Text),
            EXT_HTML => Some(Self::Html),
            _ => None,
        }
    }
}

/// A template compiled together with its base, ready to execute
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    entry: String,
    tera: Tera,
}

impl CompiledTemplate {
    /// Executes the template, exposing `data` to it as `data`
    pub fn render(&self, data: &Value) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("data", data);

        self.tera.render(&self.entry, &context)
    }
}

/// Compiled templates keyed by name
///
/// Filled once at startup, then shared read-only between delivery workers.
#[derive(Debug, Default)]
pub struct TemplateStore {
    text: HashMap<String, CompiledTemplate>,
    html: HashMap<String, CompiledTemplate>,
}

impl TemplateStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the templates found in `dir`
    pub fn from_dir(dir: impl AsRef<Path>, base: Option<&str>) -> Result<Self, TemplateParseError> {
        let mut store = Self::new();
        store.parse_dir(dir, base)?;

        Ok(store)
    }

    /// Compiles every template directly inside `dir` into the store.
    ///
    /// Subdirectories are not visited. Files whose name starts with `base`
    /// are never registered as templates themselves.
    ///
    /// Templates compiled before a failing file stay in the store.
    ///
    /// # Errors
    /// A [`TemplateParseError`] naming the directory or files involved.
    pub fn parse_dir(
        &mut self,
        dir: impl AsRef<Path>,
        base: Option<&str>,
    ) -> Result<(), TemplateParseError> {
        let dir = dir.as_ref();
        let base = base.filter(|base| !base.is_empty());

        let read_dir_error = |source| TemplateParseError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = fs::read_dir(dir)
            .map_err(read_dir_error)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_dir_error)?;
        paths.sort();

        for path in paths {
            if !path.is_file() {
                continue;
            }

            let Some(kind) = ContentKind::from_path(&path) else {
                continue;
            };

            let (Some(filename), Some(name)) = (
                path.file_name().and_then(OsStr::to_str),
                path.file_stem().and_then(OsStr::to_str),
            ) else {
                continue;
            };

            if base.is_some_and(|base| filename.starts_with(base)) {
                continue;
            }

            let template = compile(dir, &path, filename, kind, base)?;

            debug!("registered {kind} template {name}");

            match kind {
                ContentKind::Text => self.text.insert(name.to_string(), template),
                ContentKind::Html => self.html.insert(name.to_string(), template),
            };
        }

        Ok(())
    }

    /// Whether a text or HTML template is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.text.contains_key(name) || self.html.contains_key(name)
    }

    /// The text template registered under `name`
    pub fn text(&self, name: &str) -> Option<&CompiledTemplate> {
        self.text.get(name)
    }

    /// The HTML template registered under `name`
    pub fn html(&self, name: &str) -> Option<&CompiledTemplate> {
        self.html.get(name)
    }

    /// Looks up the template of the given kind
    pub fn get(&self, kind: ContentKind, name: &str) -> Option<&CompiledTemplate> {
        match kind {
            ContentKind::Text => self.text(name),
            ContentKind::Html => self.html(name),
        }
    }
}

fn compile(
    dir: &Path,
    path: &Path,
    filename: &str,
    kind: ContentKind,
    base: Option<&str>,
) -> Result<CompiledTemplate, TemplateParseError> {
    let mut sources: Vec<(String, PathBuf)> = Vec::with_capacity(2);

    if let Some(base) = base {
        let base_name = format!("{base}.{}", kind.extension());
        let base_path = dir.join(&base_name);
        sources.push((base_name, base_path));
    }
    sources.push((filename.to_string(), path.to_path_buf()));

    let contents = sources
        .iter()
        .map(|(name, path)| {
            fs::read_to_string(path)
                .map(|source| (name.as_str(), source))
                .map_err(|source| TemplateParseError::Read {
                    path: path.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut tera = Tera::default();
    tera.autoescape_on(match kind {
        ContentKind::Text => vec![],
        ContentKind::Html => vec![".html"],
    });

    tera.add_raw_templates(contents)
        .map_err(|source| TemplateParseError::Parse {
            paths: sources.iter().map(|(_, path)| path.clone()).collect(),
            source,
        })?;

    Ok(CompiledTemplate {
        entry: filename.to_string(),
        tera,
    })
}

#[cfg(test)]
pub mod tests {
    use serde_json::json;
    use tempfile::TempDir;
    use testresult::TestResult;

    use super::*;

    /// Writes `files` into a fresh temporary directory
    pub fn template_dir(files: &[(&str, &str)]) -> TestResult<TempDir> {
        let dir = tempfile::tempdir()?;
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents)?;
        }

        Ok(dir)
    }

    #[test]
    fn test_parse_registers_text_and_html_under_one_name() -> TestResult {
        let dir = template_dir(&[
            ("welcome.txt", "Hi {{ data.Name }}"),
            ("welcome.html", "<b>Hi {{ data.Name }}</b>"),
            ("notes.md", "ignored"),
        ])?;

        let store = TemplateStore::from_dir(dir.path(), None)?;

        assert!(store.contains("welcome"));
        assert!(!store.contains("notes"));

        let data = json!({ "Name": "Bob" });
        assert_eq!(store.text("welcome").ok_or("missing text")?.render(&data)?, "Hi Bob");
        assert_eq!(
            store.html("welcome").ok_or("missing html")?.render(&data)?,
            "<b>Hi Bob</b>"
        );

        Ok(())
    }

    #[test]
    fn test_missing_name_is_not_found() -> TestResult {
        let dir = template_dir(&[("receipt.txt", "Thanks")])?;

        let store = TemplateStore::from_dir(dir.path(), None)?;

        assert!(!store.contains("welcome"));
        assert!(store.text("welcome").is_none());
        assert!(store.html("receipt").is_none());

        Ok(())
    }

    #[test]
    fn test_base_template_is_combined_and_not_registered() -> TestResult {
        let dir = template_dir(&[
            ("layout.html", "<main>{% block content %}{% endblock %}</main>"),
            (
                "reset.html",
                r#"{% extends "layout.html" %}{% block content %}Reset {{ data.code }}{% endblock %}"#,
            ),
            ("layout.txt", "== {% block content %}{% endblock %} =="),
            (
                "reset.txt",
                r#"{% extends "layout.txt" %}{% block content %}code {{ data.code }}{% endblock %}"#,
            ),
        ])?;

        let store = TemplateStore::from_dir(dir.path(), Some("layout"))?;

        assert!(!store.contains("layout"));

        let data = json!({ "code": "42" });
        assert_eq!(
            store.html("reset").ok_or("missing html")?.render(&data)?,
            "<main>Reset 42</main>"
        );
        assert_eq!(
            store.get(ContentKind::Text, "reset").ok_or("missing text")?.render(&data)?,
            "== code 42 =="
        );

        Ok(())
    }

    #[test]
    fn test_html_is_escaped_but_text_is_not() -> TestResult {
        let dir = template_dir(&[
            ("note.txt", "{{ data.body }}"),
            ("note.html", "<p>{{ data.body }}</p>"),
        ])?;

        let store = TemplateStore::from_dir(dir.path(), None)?;
        let data = json!({ "body": "<tag>" });

        assert_eq!(store.text("note").ok_or("missing text")?.render(&data)?, "<tag>");
        assert_eq!(
            store.html("note").ok_or("missing html")?.render(&data)?,
            "<p>&lt;tag&gt;</p>"
        );

        Ok(())
    }

    #[test]
    fn test_subdirectories_are_not_scanned() -> TestResult {
        let dir = template_dir(&[("top.txt", "top")])?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("nested").join("deep.txt"), "deep")?;

        let store = TemplateStore::from_dir(dir.path(), None)?;

        assert!(store.contains("top"));
        assert!(!store.contains("deep"));

        Ok(())
    }

    #[test]
    fn test_parse_error_keeps_earlier_templates() -> TestResult {
        let dir = template_dir(&[("a_good.txt", "fine"), ("b_broken.txt", "{% if %}")])?;

        let mut store = TemplateStore::new();
        let result = store.parse_dir(dir.path(), None);

        match result {
            Err(TemplateParseError::Parse { paths, .. }) => {
                assert_eq!(paths, vec![dir.path().join("b_broken.txt")]);
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
        assert!(store.contains("a_good"));
        assert!(!store.contains("b_broken"));

        Ok(())
    }

    #[test]
    fn test_missing_base_file_is_a_read_error() -> TestResult {
        let dir = template_dir(&[("welcome.txt", "Hi")])?;

        let result = TemplateStore::from_dir(dir.path(), Some("base"));

        assert!(matches!(result, Err(TemplateParseError::Read { path, .. }) if path == dir.path().join("base.txt")));

        Ok(())
    }

    #[test]
    fn test_missing_directory_is_a_read_dir_error() {
        let result = TemplateStore::from_dir("/definitely/not/here", None);

        assert!(matches!(result, Err(TemplateParseError::ReadDir { .. })));
    }
}
