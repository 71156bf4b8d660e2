//! Email message

use std::{
    fmt,
    fs::File,
    io::Read,
    path::Path,
};

use lettre::message::Mailbox;
use serde_json::Value;

use super::{
    attachment::Attachment,
    errors::{AttachmentError, RenderError, ValidationError},
    templates::{ContentKind, TemplateStore},
};

/// Email message
///
/// Content comes either from `body` (a *simple* message) or from the template
/// registered under `template_name`, executed against `template_data`.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Primary recipients
    pub to: Vec<Mailbox>,

    /// Carbon copy recipients
    pub cc: Vec<Mailbox>,

    /// Blind carbon copy recipients
    pub bcc: Vec<Mailbox>,

    /// The subject of the email
    pub subject: String,

    /// Plain text content, bypassing templates when non-empty
    pub body: String,

    /// Template name, without extension
    pub template_name: String,

    /// Data the template is executed against
    pub template_data: Value,

    /// Attached files, in order
    pub attachments: Vec<Attachment>,

    text_content: String,
    html_content: String,
}

impl Message {
    /// Creates an empty message with the given subject
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Adds a primary recipient
    pub fn to(mut self, mailbox: Mailbox) -> Self {
        self.to.push(mailbox);
        self
    }

    /// Adds a carbon copy recipient
    pub fn cc(mut self, mailbox: Mailbox) -> Self {
        self.cc.push(mailbox);
        self
    }

    /// Adds a blind carbon copy recipient
    pub fn bcc(mut self, mailbox: Mailbox) -> Self {
        self.bcc.push(mailbox);
        self
    }

    /// Sets the plain text body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Uses the named template, executed against `data`
    pub fn template(mut self, name: impl Into<String>, data: Value) -> Self {
        self.template_name = name.into();
        self.template_data = data;
        self
    }

    /// Adds an already built attachment
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Reads `reader` to the end and attaches its content as `filename`
    pub fn attach(
        &mut self,
        mut reader: impl Read,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<(), AttachmentError> {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|source| AttachmentError::Read {
                filename: filename.to_string(),
                source,
            })?;

        self.attachments
            .push(Attachment::from_bytes(filename, &content, content_type));

        Ok(())
    }

    /// Attaches the file at `path`, named after its last path component
    pub fn attach_file(
        &mut self,
        path: impl AsRef<Path>,
        content_type: Option<&str>,
    ) -> Result<(), AttachmentError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AttachmentError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.attach(file, &filename, content_type)
    }

    /// Rendered plain text content
    pub fn text_content(&self) -> &str {
        &self.text_content
    }

    /// Rendered HTML content
    pub fn html_content(&self) -> &str {
        &self.html_content
    }

    /// Whether the content is given directly rather than through a template
    pub fn is_simple(&self) -> bool {
        !self.body.is_empty()
    }

    /// Whether there is at least one `to` recipient
    pub fn has_recipients(&self) -> bool {
        !self.to.is_empty()
    }

    /// Whether rendering produced any content
    pub fn has_content(&self) -> bool {
        !self.text_content.is_empty() || !self.html_content.is_empty()
    }

    /// Whether anything is attached
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Fills the text and HTML content.
    ///
    /// Simple messages copy `body` into the text content. Otherwise the text
    /// and HTML templates registered under `template_name` are executed; a
    /// missing variant leaves its content empty.
    ///
    /// # Errors
    /// - [`RenderError::TemplateNotFound`] if no template is registered under the name.
    /// - [`RenderError::Execution`] if a template fails; HTML is not attempted
    ///   after a text failure.
    pub fn render(&mut self, templates: &TemplateStore) -> Result<(), RenderError> {
        if self.is_simple() {
            self.text_content = self.body.clone();
            return Ok(());
        }

        if self.template_name.is_empty() || !templates.contains(&self.template_name) {
            return Err(RenderError::TemplateNotFound(self.template_name.clone()));
        }

        if let Some(text) = self.execute(templates, ContentKind::Text)? {
            self.text_content = text;
        }

        if let Some(html) = self.execute(templates, ContentKind::Html)? {
            self.html_content = html;
        }

        Ok(())
    }

    fn execute(
        &self,
        templates: &TemplateStore,
        kind: ContentKind,
    ) -> Result<Option<String>, RenderError> {
        let Some(template) = templates.get(kind, &self.template_name) else {
            return Ok(None);
        };

        template
            .render(&self.template_data)
            .map(Some)
            .map_err(|source| RenderError::Execution {
                kind,
                name: self.template_name.clone(),
                source,
            })
    }

    /// Checks the message can be handed to a transport
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_recipients() {
            return Err(ValidationError::NoRecipients);
        }

        if !(self.has_content() || self.has_attachments()) {
            return Err(ValidationError::NoContent);
        }

        Ok(())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "To: ")?;
        for to in &self.to {
            write!(f, "{to}, ")?;
        }
        writeln!(f)?;

        if !self.cc.is_empty() {
            write!(f, "CC: ")?;
            for cc in &self.cc {
                write!(f, "{cc}, ")?;
            }
            writeln!(f)?;
        }

        if !self.bcc.is_empty() {
            write!(f, "BCC: ")?;
            for bcc in &self.bcc {
                write!(f, "{bcc}, ")?;
            }
            writeln!(f)?;
        }

        write!(f, "Subject: {}", self.subject)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;
    use testresult::TestResult;

    use crate::domain::mail::templates::tests::template_dir;

    use super::*;

    fn mailbox(address: &str) -> TestResult<Mailbox> {
        Ok(address.parse()?)
    }

    fn welcome_store() -> TestResult<TemplateStore> {
        let dir = template_dir(&[
            ("welcome.txt", "Hi {{ data.Name }}"),
            ("welcome.html", "<b>Hi {{ data.Name }}</b>"),
            ("digest.html", "<ul>{{ data.count }}</ul>"),
        ])?;

        Ok(TemplateStore::from_dir(dir.path(), None)?)
    }

    #[test]
    fn test_simple_message_renders_body_only() -> TestResult {
        let store = welcome_store()?;
        let mut message = Message::new("Hello")
            .body("hi")
            .template("welcome", json!({ "Name": "Bob" }));

        message.render(&store)?;

        assert_eq!(message.text_content(), "hi");
        assert_eq!(message.html_content(), "");

        Ok(())
    }

    #[test]
    fn test_templated_message_renders_both_variants() -> TestResult {
        let store = welcome_store()?;
        let mut message = Message::new("Welcome").template("welcome", json!({ "Name": "Bob" }));

        message.render(&store)?;

        assert_eq!(message.text_content(), "Hi Bob");
        assert_eq!(message.html_content(), "<b>Hi Bob</b>");

        Ok(())
    }

    #[test]
    fn test_missing_text_variant_is_not_an_error() -> TestResult {
        let store = welcome_store()?;
        let mut message = Message::new("Digest").template("digest", json!({ "count": 3 }));

        message.render(&store)?;

        assert_eq!(message.text_content(), "");
        assert_eq!(message.html_content(), "<ul>3</ul>");

        Ok(())
    }

    #[test]
    fn test_unknown_or_empty_template_is_not_found() -> TestResult {
        let store = welcome_store()?;

        let mut unknown = Message::new("Unknown").template("missing", Value::Null);
        let mut empty = Message::new("Empty");

        assert!(matches!(
            unknown.render(&store),
            Err(RenderError::TemplateNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            empty.render(&store),
            Err(RenderError::TemplateNotFound(name)) if name.is_empty()
        ));

        Ok(())
    }

    #[test]
    fn test_text_failure_stops_before_html() -> TestResult {
        let store = welcome_store()?;
        let mut message = Message::new("Welcome").template("welcome", Value::Null);

        let result = message.render(&store);

        assert!(matches!(
            result,
            Err(RenderError::Execution { kind: ContentKind::Text, .. })
        ));
        assert!(!message.has_content());

        Ok(())
    }

    #[test]
    fn test_validation() -> TestResult {
        let store = TemplateStore::new();

        let mut no_recipients = Message::new("Nobody").body("hi");
        no_recipients.render(&store)?;
        assert_eq!(no_recipients.validate(), Err(ValidationError::NoRecipients));

        let mut attachment_only = Message::new("Files")
            .to(mailbox("a@x.com")?)
            .with_attachment(Attachment::from_bytes("a.txt", b"a", None));
        assert!(!attachment_only.has_content());
        assert_eq!(attachment_only.validate(), Ok(()));

        attachment_only.attachments.clear();
        assert_eq!(attachment_only.validate(), Err(ValidationError::NoContent));

        Ok(())
    }

    #[test]
    fn test_attach_encodes_reader_content() -> TestResult {
        let mut message = Message::new("Report");

        message.attach(&b"col\n1\n"[..], "report.csv", None)?;

        let attachment = &message.attachments[0];
        assert_eq!(attachment.filename, "report.csv");
        assert_eq!(attachment.content_type, "text/csv");
        assert_eq!(STANDARD.decode(&attachment.content)?, b"col\n1\n".to_vec());

        Ok(())
    }

    #[test]
    fn test_attach_file_uses_file_name() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        file.write_all(b"%PDF-1.7 body")?;

        let mut message = Message::new("Invoice");
        message.attach_file(file.path(), None)?;

        let attachment = &message.attachments[0];
        let expected_name = file
            .path()
            .file_name()
            .ok_or("no file name")?
            .to_string_lossy()
            .into_owned();
        assert_eq!(attachment.filename, expected_name);
        assert_eq!(attachment.content_type, "application/pdf");

        Ok(())
    }

    #[test]
    fn test_attach_missing_file_fails() {
        let mut message = Message::new("Invoice");

        let result = message.attach_file("/definitely/not/here.pdf", None);

        assert!(matches!(result, Err(AttachmentError::Open { .. })));
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_display_lists_recipients_and_subject() -> TestResult {
        let message = Message::new("Hello")
            .to(mailbox("a@x.com")?)
            .to(mailbox("b@y.com")?)
            .bcc(mailbox("c@z.com")?);

        assert_eq!(
            message.to_string(),
            "To: a@x.com, b@y.com, \nBCC: c@z.com, \nSubject: Hello"
        );

        Ok(())
    }
}
